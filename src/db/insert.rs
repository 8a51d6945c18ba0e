//! Row id retrieval for inserts without a `RETURNING` clause.

#[cfg(all(feature = "sqlite", not(feature = "returning_clauses_for_sqlite_3_35")))]
use diesel::{result::QueryResult, sql_types::Integer};
#[cfg(all(feature = "sqlite", not(feature = "returning_clauses_for_sqlite_3_35")))]
use diesel_async::RunQueryDsl;

#[cfg(all(feature = "sqlite", not(feature = "returning_clauses_for_sqlite_3_35")))]
use super::connection::DbConnection;

#[cfg(all(feature = "sqlite", not(feature = "returning_clauses_for_sqlite_3_35")))]
diesel::define_sql_function! {
    /// Row id assigned by the most recent successful insert on this
    /// connection.
    fn last_insert_rowid() -> Integer;
}

/// Fetch the row id assigned by the most recent insert.
///
/// Only meaningful on the same connection, immediately after the insert;
/// every `create_*` helper calls this back to back with its statement.
///
/// # Errors
/// Returns any error produced by the underlying query.
#[cfg(all(feature = "sqlite", not(feature = "returning_clauses_for_sqlite_3_35")))]
pub(super) async fn fetch_last_insert_rowid(conn: &mut DbConnection) -> QueryResult<i32> {
    diesel::select(last_insert_rowid()).get_result(conn).await
}
