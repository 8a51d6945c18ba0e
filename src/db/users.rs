//! User record helpers.

use diesel::{prelude::*, result::QueryResult};
use diesel_async::RunQueryDsl;

use super::connection::DbConnection;

/// Insert a new user record, returning its id.
///
/// # Errors
/// Returns any error produced by the insertion query.
#[must_use = "handle the result"]
pub async fn create_user(
    conn: &mut DbConnection,
    user: &crate::models::NewUser<'_>,
) -> QueryResult<i32> {
    use crate::schema::users::dsl::users;

    #[cfg(any(feature = "postgres", feature = "returning_clauses_for_sqlite_3_35"))]
    let inserted_id: i32 = {
        use crate::schema::users::dsl::id;
        diesel::insert_into(users)
            .values(user)
            .returning(id)
            .get_result(conn)
            .await?
    };

    #[cfg(all(feature = "sqlite", not(feature = "returning_clauses_for_sqlite_3_35")))]
    let inserted_id: i32 = {
        diesel::insert_into(users).values(user).execute(conn).await?;
        super::insert::fetch_last_insert_rowid(conn).await?
    };

    Ok(inserted_id)
}

/// Look up a user record by id.
///
/// # Errors
/// Returns any error produced by the underlying database query.
#[must_use = "handle the result"]
pub async fn get_user(
    conn: &mut DbConnection,
    user_id: i32,
) -> QueryResult<Option<crate::models::User>> {
    use crate::schema::users::dsl::users;
    users
        .find(user_id)
        .first::<crate::models::User>(conn)
        .await
        .optional()
}

/// Load user records for a set of ids, ordered by id.
///
/// # Errors
/// Returns any error produced by the underlying database query.
#[must_use = "handle the result"]
pub async fn get_users_by_ids(
    conn: &mut DbConnection,
    ids: &[i32],
) -> QueryResult<Vec<crate::models::User>> {
    use crate::schema::users::dsl as u;
    u::users
        .filter(u::id.eq_any(ids))
        .order(u::id.asc())
        .load::<crate::models::User>(conn)
        .await
}
