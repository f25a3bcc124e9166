use clap::{Parser, Subcommand};
use warden_core::config::DEFAULT_DATABASE_URL;
use warden_core::models::auth::CredentialId;

#[derive(Parser, Debug)]
#[command(
    name = "warden",
    version,
    about = "Operate a warden credential and grant store"
)]
pub struct Cli {
    /// PostgreSQL connection URL.
    #[arg(
        long,
        global = true,
        env = "DATABASE_URL",
        default_value = DEFAULT_DATABASE_URL,
        hide_env_values = true
    )]
    pub database_url: String,

    /// Maximum number of database connections in the pool.
    #[arg(long, global = true, env = "WARDEN_MAX_CONNECTIONS", default_value_t = 5)]
    pub max_connections: u32,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Apply the embedded schema migrations.
    Migrate,

    /// Delete expired login sessions and old redeemed authorization codes.
    Sweep,

    /// Manage user credentials.
    User {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Delete every grant artifact issued under a request id.
    Revoke { request_id: String },

    /// Print version.
    Version,
}

#[derive(Subcommand, Debug)]
pub enum UserCommands {
    /// Register a new credential.
    Add {
        username: String,

        #[arg(long, env = "WARDEN_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Delete a credential with its sessions and grant artifacts.
    Delete { id: CredentialId },

    /// Suspend a credential.
    Suspend { id: CredentialId },

    /// Re-activate a suspended credential.
    Activate { id: CredentialId },
}
