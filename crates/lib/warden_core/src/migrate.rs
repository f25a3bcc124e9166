//! Schema migrations for the Postgres backend.

use crate::store::PgStore;

/// Apply the embedded schema (`warden_core/migrations/`) to the store's database.
pub async fn migrate(store: &PgStore) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(store.pool()).await
}
