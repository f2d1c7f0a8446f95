//! Database layer for the Attendly webhook subsystem.
//!
//! Models are plain structs with static async query methods taking a
//! [`sqlx::PgPool`]. Queries are runtime-checked so the crate builds without a
//! live database.

pub mod error;
pub mod models;

pub use error::DbError;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Embedded migrations for the webhook schema.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

/// Connect to Postgres with a bounded pool.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, DbError> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .map_err(DbError::ConnectionFailed)
}

/// Run all pending migrations.
pub async fn migrate(pool: &PgPool) -> Result<(), DbError> {
    MIGRATOR.run(pool).await.map_err(DbError::MigrationFailed)
}
