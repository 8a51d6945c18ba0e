#![allow(
    clippy::cognitive_complexity,
    reason = "migration logic involves multiple conditional branches"
)]
//! Embedded migration utilities.
//!
//! The schema ships inside the binary via [`embed_migrations!`]; jobs apply
//! it on startup so a fresh database file is usable without a separate
//! provisioning step.

use std::{error::Error as StdError, time::Duration};

use diesel::result::{Error as DieselError, QueryResult};
#[cfg(all(feature = "postgres", not(feature = "sqlite")))]
use diesel::{Connection, result::ConnectionError};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use thiserror::Error;
use tokio::time::timeout;
use tracing::info;

use super::connection::DbConnection;

/// Embedded database migrations for `SQLite`.
#[cfg(feature = "sqlite")]
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/sqlite");

/// Embedded database migrations for PostgreSQL.
#[cfg(all(feature = "postgres", not(feature = "sqlite")))]
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/postgres");

const MIGRATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Why an embedded migration run did not complete.
#[derive(Debug, Error)]
enum MigrationError {
    #[error("migration harness error: {0}")]
    Harness(#[source] Box<dyn StdError + Send + Sync>),
    #[cfg(all(feature = "postgres", not(feature = "sqlite")))]
    #[error("migration executor error: {0}")]
    Executor(#[from] tokio::task::JoinError),
    #[cfg(all(feature = "postgres", not(feature = "sqlite")))]
    #[error("migration connection error: {0}")]
    Connect(#[from] ConnectionError),
    #[error("migration execution exceeded {0:?}")]
    Timeout(Duration),
}

impl From<MigrationError> for DieselError {
    fn from(err: MigrationError) -> Self {
        Self::SerializationError(Box::new(err))
    }
}

/// Run embedded database migrations over an open connection.
///
/// Skips the apply when nothing is pending; the whole run is bounded by a
/// five second timeout.
///
/// # Errors
/// Returns any error produced by Diesel while running migrations.
#[cfg(feature = "sqlite")]
#[must_use = "handle the result"]
pub async fn run_migrations(conn: &mut DbConnection) -> QueryResult<()> {
    timeout(
        MIGRATION_TIMEOUT,
        conn.spawn_blocking(|c| {
            if let Ok(false) = c.has_pending_migration(MIGRATIONS) {
                info!("no pending migrations; skipping apply");
                return Ok(());
            }
            info!("applying pending migrations");
            c.run_pending_migrations(MIGRATIONS)
                .map(|_| ())
                .map_err(|e| DieselError::from(MigrationError::Harness(e)))
        }),
    )
    .await
    .map_err(|_| MigrationError::Timeout(MIGRATION_TIMEOUT))??;
    Ok(())
}

/// Run embedded database migrations against `database_url`.
///
/// Postgres migrations need a blocking connection, so this establishes its
/// own rather than borrowing an async one. Skips the apply when nothing is
/// pending; the whole run is bounded by a five second timeout.
///
/// # Errors
/// Returns any error produced by Diesel while running migrations.
#[cfg(all(feature = "postgres", not(feature = "sqlite")))]
#[must_use = "handle the result"]
pub async fn run_migrations(database_url: &str) -> QueryResult<()> {
    use diesel::pg::PgConnection;
    use tokio::task;

    let url = database_url.to_owned();
    timeout(
        MIGRATION_TIMEOUT,
        task::spawn_blocking(move || -> QueryResult<()> {
            let mut conn = PgConnection::establish(&url)
                .map_err(|e| DieselError::from(MigrationError::Connect(e)))?;
            if let Ok(false) = conn.has_pending_migration(MIGRATIONS) {
                info!("no pending migrations; skipping apply");
                return Ok(());
            }
            info!("applying pending migrations");
            conn.run_pending_migrations(MIGRATIONS)
                .map(|_| ())
                .map_err(|e| DieselError::from(MigrationError::Harness(e)))
        }),
    )
    .await
    .map_err(|_| MigrationError::Timeout(MIGRATION_TIMEOUT))?
    .map_err(MigrationError::from)??;
    Ok(())
}

/// Apply embedded migrations for the active backend; `SQLite` migrates over
/// `conn` and ignores the url.
///
/// # Errors
/// Returns any error produced by Diesel while running migrations.
#[cfg(feature = "sqlite")]
#[must_use = "handle the result"]
pub async fn apply_migrations(conn: &mut DbConnection, _database_url: &str) -> QueryResult<()> {
    run_migrations(conn).await
}

/// Apply embedded migrations for the active backend; PostgreSQL opens its
/// own blocking connection from `url` and ignores `conn`.
///
/// # Errors
/// Returns any error produced by Diesel while running migrations.
#[cfg(all(feature = "postgres", not(feature = "sqlite")))]
#[must_use = "handle the result"]
pub async fn apply_migrations(conn: &mut DbConnection, url: &str) -> QueryResult<()> {
    let _ = conn;
    run_migrations(url).await
}
