//! CLI argument parsing, validation, and startup helpers.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::error;
use url::Url;

use crate::ledger::{Filtro, Periodo};

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "las-aves",
    about = "Finance and administration client for the Las Aves facility"
)]
pub struct Args {
    /// Backend base URL
    #[arg(
        long,
        env = "LAS_AVES_API_URL",
        default_value = "http://localhost:3000",
        global = true
    )]
    pub api_url: String,

    /// File holding the session (tokens and cached profile)
    #[arg(
        long,
        env = "LAS_AVES_STORAGE",
        default_value = "las-aves-session.json",
        global = true
    )]
    pub storage: PathBuf,

    /// Give up on a token refresh after this many seconds (ends the session)
    #[arg(long, global = true)]
    pub refresh_timeout_secs: Option<u64>,

    /// Log output format
    #[arg(short, long, default_value = "pretty", global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Log in and store the session
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "LAS_AVES_PASSWORD", hide_env_values = true)]
        password: String,
        /// Ask the backend for a long-lived session
        #[arg(long)]
        recordarme: bool,
    },
    /// Revoke the session and clear it locally
    Logout,
    /// Show the logged-in user and the modules they can open
    Whoami,
    /// Dashboard totals
    Resumen,
    /// Period totals and latest movements
    Finanzas {
        /// general, dia, semana or mes
        #[arg(long, default_value = "general")]
        periodo: Periodo,
    },
    /// Paged history of incomes and expenses
    Bitacora {
        /// todos, ingresos or gastos
        #[arg(long, default_value = "todos")]
        filtro: Filtro,
        #[arg(long, default_value_t = 1)]
        pagina: usize,
    },
    /// Manage expenses
    Gasto {
        #[command(subcommand)]
        action: GastoCommand,
    },
    /// Manage incomes
    Ingreso {
        #[command(subcommand)]
        action: IngresoCommand,
    },
    /// Payment methods and services
    Catalogos,
    /// Download the financial report PDF
    Reporte {
        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        desde: String,
        /// End date (YYYY-MM-DD)
        #[arg(long)]
        hasta: String,
        #[arg(short, long, default_value = "reporte-financiero.pdf")]
        output: PathBuf,
    },
    /// List users, or replace one user's roles
    Usuarios {
        /// User to update
        #[arg(long, requires = "roles")]
        id: Option<i64>,
        /// New role set, comma separated
        #[arg(long, value_delimiter = ',', requires = "id")]
        roles: Vec<String>,
    },
    /// List roles
    Roles,
    /// Serve the offline shell in front of the web frontend
    Shell {
        #[arg(long, default_value = "127.0.0.1:8080")]
        listen: String,
        /// Frontend origin to cache and forward to
        #[arg(long, env = "LAS_AVES_FRONTEND_URL", default_value = "http://localhost:3001")]
        upstream: String,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum GastoCommand {
    Add {
        #[arg(long)]
        concepto: String,
        #[arg(long)]
        monto: f64,
        #[arg(long)]
        metodo_pago: i64,
        /// Defaults to now
        #[arg(long)]
        fecha: Option<String>,
        #[arg(long)]
        notas: Option<String>,
        /// Receipt file (sent as multipart)
        #[arg(long)]
        comprobante: Option<PathBuf>,
    },
    Edit {
        id: i64,
        #[arg(long)]
        concepto: Option<String>,
        #[arg(long)]
        monto: Option<f64>,
        #[arg(long)]
        metodo_pago: Option<i64>,
        #[arg(long)]
        notas: Option<String>,
    },
    Rm {
        id: i64,
    },
    Show {
        id: i64,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum IngresoCommand {
    Add {
        #[arg(long)]
        monto: f64,
        #[arg(long)]
        metodo_pago: i64,
        #[arg(long)]
        servicio: Option<i64>,
        #[arg(long)]
        concepto: Option<String>,
        /// Defaults to now
        #[arg(long)]
        fecha: Option<String>,
        #[arg(long)]
        notas: Option<String>,
        /// Receipt file (sent as multipart)
        #[arg(long)]
        comprobante: Option<PathBuf>,
    },
    Edit {
        id: i64,
        #[arg(long)]
        servicio: Option<i64>,
        #[arg(long)]
        concepto: Option<String>,
        #[arg(long)]
        monto: Option<f64>,
        #[arg(long)]
        metodo_pago: Option<i64>,
        #[arg(long)]
        notas: Option<String>,
    },
    Rm {
        id: i64,
    },
    Show {
        id: i64,
    },
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt().with_writer(std::io::stderr).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Compact => tracing_subscriber::fmt()
            .compact()
            .with_writer(std::io::stderr)
            .init(),
    }
}

/// Parse and validate a backend URL.
/// Returns None and logs an error if validation fails.
pub fn validate_api_url(api_url: &str) -> Option<Url> {
    let url = match Url::parse(api_url) {
        Ok(url) => url,
        Err(e) => {
            error!(url = %api_url, error = %e, "Invalid API URL");
            return None;
        }
    };

    if !matches!(url.scheme(), "http" | "https") {
        error!(url = %api_url, "API URL must use http or https");
        return None;
    }

    let is_https = url.scheme() == "https";
    let is_localhost = matches!(url.host_str(), Some("localhost" | "127.0.0.1" | "[::1]"));

    if !is_https && !is_localhost {
        error!("API URL must use HTTPS for non-localhost backends");
        return None;
    }

    Some(url)
}

/// Validated client settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: Url,
    pub storage: PathBuf,
    pub refresh_timeout: Option<Duration>,
}

/// Build ClientConfig from arguments, logging what is wrong.
pub fn build_config(args: &Args) -> Option<ClientConfig> {
    let api_url = validate_api_url(&args.api_url)?;
    if args.refresh_timeout_secs == Some(0) {
        error!("--refresh-timeout-secs must be greater than zero");
        return None;
    }
    Some(ClientConfig {
        api_url,
        storage: args.storage.clone(),
        refresh_timeout: args.refresh_timeout_secs.map(Duration::from_secs),
    })
}
