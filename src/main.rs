use std::sync::Arc;

use clap::Parser;
use las_aves::cli::{Args, build_config, init_logging};
use las_aves::commands;
use las_aves::create_client;
use las_aves::session::LogNavigator;
use tracing::error;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    let Some(config) = build_config(&args) else {
        std::process::exit(1);
    };

    let client = create_client(&config, Arc::new(LogNavigator));

    if let Err(e) = commands::run(&client, args.command).await {
        match e.api() {
            Some(api) if api.is_session_error() => {
                error!(error = %e, "Session ended, log in again with `las-aves login`");
            }
            _ => error!(error = %e, "Command failed"),
        }
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use las_aves::commands::CommandError;

    #[test]
    fn test_not_logged_in_message() {
        assert_eq!(CommandError::NotLoggedIn.to_string(), "No has iniciado sesión");
    }
}
