use std::{process::ExitCode, sync::Arc, time::Duration};

use colored::Colorize;
use log::{error, info, warn};
use partyline_collab::{
    Collab, Config, ConfigError, Database, DatabaseError, HttpTransport, MemoryDatabase,
    PgDatabase, ReqwestTransport, TransportError,
};
use thiserror::Error;

use crate::logging::LogColor;

mod logging;

#[derive(Debug, Error)]
enum PartylineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Could not initialize database: {0}")]
    Database(#[from] DatabaseError),

    #[error("Could not build http client: {0}")]
    Transport(#[from] TransportError),

    #[error("Server stopped: {0}")]
    Server(#[from] std::io::Error),
}

impl PartylineError {
    /// Configuration mistakes exit with 78 (EX_CONFIG), everything else with 1
    fn exit_status(&self) -> u8 {
        match self {
            PartylineError::Config(_) => 78,
            _ => 1,
        }
    }

    fn hint(&self) -> String {
        match self {
            PartylineError::Config(_) => "Set SPOTIFY_CLIENT_ID, SPOTIFY_CLIENT_SECRET and SPOTIFY_REDIRECT_URI in the environment or in a .env file, then try again.".to_string(),
            PartylineError::Database(_) => "This is a database error. Make sure DATABASE_URL points to a running PostgreSQL instance, or unset it to keep everything in memory.".to_string(),
            PartylineError::Transport(_) => "The TLS backend of the http client could not be initialized.".to_string(),
            PartylineError::Server(_) => "Make sure PARTYLINE_SERVER_PORT is a free port.".to_string(),
        }
    }
}

async fn connect_database() -> Result<Arc<dyn Database>, DatabaseError> {
    match std::env::var("DATABASE_URL") {
        Ok(url) => {
            info!("Connecting to database...");
            Ok(Arc::new(PgDatabase::new(&url).await?))
        }
        Err(_) => {
            warn!("DATABASE_URL is not set, state will not outlive this process");
            Ok(Arc::new(MemoryDatabase::new()))
        }
    }
}

async fn run() -> Result<(), PartylineError> {
    let config = Config::from_env()?;
    let database = connect_database().await?;

    let timeout: Duration = config.request_timeout;
    let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new(timeout)?);

    let collab = Collab::new(config, database, transport);

    info!("Initialized successfully.");
    partyline_server::run_server(collab).await?;

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    // Missing .env files are fine, the environment may already be set
    let _ = dotenvy::dotenv();

    if let Err(error) = logging::init_logger() {
        eprintln!("Could not initialize logging: {}", error);
    }

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!("{} Read the error below to troubleshoot the issue. If you think this might be a bug, please report it by making a GitHub issue.", "partyline failed to start!".bold().color(LogColor::RED));
            error!("{}", error);
            error!(
                "{}",
                format!("Hint: {}", error.hint())
                    .color(LogColor::DIMMED)
                    .italic()
            );

            ExitCode::from(error.exit_status())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startup_failures_exit_with_non_zero_code() {
        let config = PartylineError::Config(ConfigError::Missing("SPOTIFY_CLIENT_ID"));
        let server = PartylineError::Server(std::io::Error::new(
            std::io::ErrorKind::AddrInUse,
            "address in use",
        ));

        assert_eq!(config.exit_status(), 78);
        assert_eq!(server.exit_status(), 1);
    }
}
