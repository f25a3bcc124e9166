use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{}", .0)]
    Custom(String),

    #[error("Auth: {}", .0)]
    Auth(#[from] warden_core::auth::AuthError),

    #[error("Migrate::{:?}: {}", .0, .0)]
    Migrate(#[from] sqlx::migrate::MigrateError),
}
