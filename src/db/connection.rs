//! Backend selection and pooled connections.
//!
//! Exactly one of the `sqlite` and `postgres` features picks the Diesel
//! backend; everything above this module works against the [`DbConnection`]
//! and [`DbPool`] aliases.

use diesel_async::pooled_connection::{AsyncDieselConnectionManager, PoolError, bb8::Pool};

#[cfg(all(feature = "sqlite", feature = "postgres", not(feature = "lint")))]
compile_error!("Either feature 'sqlite' or 'postgres' must be enabled, not both");
#[cfg(not(any(feature = "sqlite", feature = "postgres")))]
compile_error!("Either feature 'sqlite' or 'postgres' must be enabled");

/// Database backend type for `SQLite`.
#[cfg(feature = "sqlite")]
pub type Backend = diesel::sqlite::Sqlite;

/// Connection type for `SQLite` database access. The sync rusqlite-style
/// connection is wrapped so digest runs can drive it from async code.
#[cfg(feature = "sqlite")]
pub type DbConnection =
    diesel_async::sync_connection_wrapper::SyncConnectionWrapper<diesel::sqlite::SqliteConnection>;

/// Database backend type for PostgreSQL.
#[cfg(all(feature = "postgres", not(feature = "sqlite")))]
pub type Backend = diesel::pg::Pg;

/// Connection type for PostgreSQL database access.
#[cfg(all(feature = "postgres", not(feature = "sqlite")))]
pub type DbConnection = diesel_async::AsyncPgConnection;

/// Connection pool shared by the notification jobs.
pub type DbPool = Pool<DbConnection>;

/// Create a pooled connection to the configured database.
///
/// # Examples
///
/// ```no_run
/// use threadmail::db::establish_pool;
/// async fn example() {
///     let pool = establish_pool("threadmail.db")
///         .await
///         .expect("failed to build pool");
/// }
/// ```
///
/// # Errors
/// Returns any error reported by the underlying connection pool builder.
pub async fn establish_pool(database_url: &str) -> Result<DbPool, PoolError> {
    let config = AsyncDieselConnectionManager::<DbConnection>::new(database_url);
    Pool::builder().build(config).await
}
