pub mod api;
pub mod auth;
pub mod authz;
pub mod cli;
pub mod commands;
pub mod error;
pub mod jwt;
pub mod ledger;
pub mod nav;
pub mod optimistic;
pub mod session;
pub mod shell;
pub mod storage;

use api::{AdministracionClient, EstadisticasClient, FinanzasClient, ReportesClient};
use auth::{AuthService, CoordinatorOptions};
use cli::ClientConfig;
use session::{Navigator, SessionController};
use std::sync::Arc;
use storage::{FileStorage, TokenStore};

pub use error::ApiError;

/// Everything a screen needs: the session and one client per backend area.
/// All of them share one token store and one refresh coordinator.
pub struct AppClient {
    pub session: SessionController,
    pub finanzas: FinanzasClient,
    pub estadisticas: EstadisticasClient,
    pub reportes: ReportesClient,
    pub administracion: AdministracionClient,
}

impl AppClient {
    /// Wire the clients around an existing auth service and hydrate the session.
    pub fn from_auth(auth: AuthService, navigator: Arc<dyn Navigator>) -> Self {
        let session = SessionController::new(auth.clone(), navigator);
        session.hydrate();
        Self {
            finanzas: FinanzasClient::new(auth.clone()),
            estadisticas: EstadisticasClient::new(auth.clone()),
            reportes: ReportesClient::new(auth.clone()),
            administracion: AdministracionClient::new(auth),
            session,
        }
    }

    pub fn auth(&self) -> &AuthService {
        self.session.auth()
    }
}

/// Create the client from validated configuration, with the session stored
/// in the configured file.
pub fn create_client(config: &ClientConfig, navigator: Arc<dyn Navigator>) -> AppClient {
    let tokens = TokenStore::new(FileStorage::new(&config.storage));
    let options = CoordinatorOptions {
        refresh_timeout: config.refresh_timeout,
        ..CoordinatorOptions::default()
    };
    let auth = AuthService::with_options(
        reqwest::Client::new(),
        config.api_url.as_str(),
        tokens,
        options,
    );
    AppClient::from_auth(auth, navigator)
}
