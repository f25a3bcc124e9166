// Import and re-export the `error` module
pub use self::error::{Error, Result};
mod error;

use std::sync::Arc;

use clap::Parser;
use cli::{Cli, Commands, UserCommands};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use warden_core::Warden;
use warden_core::config::WardenConfig;
use warden_core::models::auth::CredentialStatus;
use warden_core::store::PgStore;

mod cli;
mod logging;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    logging::init();

    let args = Cli::parse();
    if let Err(e) = run(args).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(args: Cli) -> Result<()> {
    if let Commands::Version = args.command {
        println!("{} {}", env!("CARGO_BIN_NAME"), env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = WardenConfig {
        database_url: args.database_url,
        max_connections: args.max_connections,
        ..WardenConfig::from_env()
    };

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupted, cancelling");
                cancel.cancel();
            }
        }
    });

    let store = Arc::new(PgStore::connect(&config).await?);

    if let Commands::Migrate = args.command {
        info!("running database migrations");
        warden_core::migrate::migrate(&store).await?;
        println!("migrations applied");
        return Ok(());
    }

    let warden = Warden::from_backend(store, &config);
    match args.command {
        Commands::Sweep => {
            let report = warden.sweeper(&config).run_once(&cancel).await?;
            println!("expired sessions removed: {}", report.expired_sessions);
            println!("inactive codes removed: {}", report.inactive_codes);
        }
        Commands::User { command } => user(&warden, &cancel, command).await?,
        Commands::Revoke { request_id } => {
            let deleted = warden.revocation.revoke_grant(&cancel, &request_id).await?;
            println!("{deleted} artifacts revoked for request {request_id}");
        }
        Commands::Migrate | Commands::Version => {}
    }

    Ok(())
}

async fn user(warden: &Warden, cancel: &CancellationToken, command: UserCommands) -> Result<()> {
    match command {
        UserCommands::Add { username, password } => {
            let reg = warden
                .credentials
                .register(cancel, &username, &password)
                .await?;
            println!("{}", reg.credential.id);
            if reg.is_first {
                info!(username = %reg.credential.username, "first credential registered");
            }
        }
        UserCommands::Delete { id } => {
            if !warden.credentials.delete(cancel, id).await? {
                return Err(Error::Custom(format!("credential {id} not found")));
            }
            println!("credential {id} deleted");
        }
        UserCommands::Suspend { id } => {
            warden
                .credentials
                .set_status(cancel, id, CredentialStatus::Suspended)
                .await?;
            println!("credential {id} suspended");
        }
        UserCommands::Activate { id } => {
            warden
                .credentials
                .set_status(cancel, id, CredentialStatus::Active)
                .await?;
            println!("credential {id} activated");
        }
    }
    Ok(())
}
