//! Forum record helpers.

use diesel::{prelude::*, result::QueryResult};
use diesel_async::RunQueryDsl;

use super::connection::DbConnection;
use crate::subscriptions::SubscriptionMode;

/// Insert a new forum record, returning its id.
///
/// # Errors
/// Returns any error produced by the insertion query.
#[must_use = "handle the result"]
pub async fn create_forum(
    conn: &mut DbConnection,
    forum: &crate::models::NewForum<'_>,
) -> QueryResult<i32> {
    use crate::schema::forums::dsl::forums;

    #[cfg(any(feature = "postgres", feature = "returning_clauses_for_sqlite_3_35"))]
    let inserted_id: i32 = {
        use crate::schema::forums::dsl::id;
        diesel::insert_into(forums)
            .values(forum)
            .returning(id)
            .get_result(conn)
            .await?
    };

    #[cfg(all(feature = "sqlite", not(feature = "returning_clauses_for_sqlite_3_35")))]
    let inserted_id: i32 = {
        diesel::insert_into(forums).values(forum).execute(conn).await?;
        super::insert::fetch_last_insert_rowid(conn).await?
    };

    Ok(inserted_id)
}

/// Look up a forum record by id.
///
/// # Errors
/// Returns any error produced by the underlying database query.
#[must_use = "handle the result"]
pub async fn get_forum(
    conn: &mut DbConnection,
    forum_id: i32,
) -> QueryResult<Option<crate::models::Forum>> {
    use crate::schema::forums::dsl::forums;
    forums
        .find(forum_id)
        .first::<crate::models::Forum>(conn)
        .await
        .optional()
}

/// List all forums belonging to a course, ordered by id.
///
/// # Errors
/// Returns any error produced by the underlying database query.
#[must_use = "handle the result"]
pub async fn forums_in_course(
    conn: &mut DbConnection,
    course: i32,
) -> QueryResult<Vec<crate::models::Forum>> {
    use crate::schema::forums::dsl as f;
    f::forums
        .filter(f::course_id.eq(course))
        .order(f::id.asc())
        .load::<crate::models::Forum>(conn)
        .await
}

/// Administrative change of a forum's subscription mode.
///
/// # Errors
/// Returns any error produced by the update query.
#[must_use = "handle the result"]
pub async fn set_subscription_mode(
    conn: &mut DbConnection,
    forum_id: i32,
    mode: SubscriptionMode,
) -> QueryResult<usize> {
    use crate::schema::forums::dsl as f;
    diesel::update(f::forums.filter(f::id.eq(forum_id)))
        .set(f::subscription_mode.eq(mode.raw()))
        .execute(conn)
        .await
}
