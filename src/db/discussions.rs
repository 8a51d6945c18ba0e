//! Discussion record helpers.

use diesel::{prelude::*, result::QueryResult};
use diesel_async::{AsyncConnection, RunQueryDsl};

use super::connection::DbConnection;

/// Insert a new discussion record, returning its id.
///
/// # Errors
/// Returns any error produced by the insertion query.
#[must_use = "handle the result"]
pub async fn create_discussion(
    conn: &mut DbConnection,
    discussion: &crate::models::NewDiscussion<'_>,
) -> QueryResult<i32> {
    use crate::schema::discussions::dsl::discussions;

    #[cfg(any(feature = "postgres", feature = "returning_clauses_for_sqlite_3_35"))]
    let inserted_id: i32 = {
        use crate::schema::discussions::dsl::id;
        diesel::insert_into(discussions)
            .values(discussion)
            .returning(id)
            .get_result(conn)
            .await?
    };

    #[cfg(all(feature = "sqlite", not(feature = "returning_clauses_for_sqlite_3_35")))]
    let inserted_id: i32 = {
        diesel::insert_into(discussions)
            .values(discussion)
            .execute(conn)
            .await?;
        super::insert::fetch_last_insert_rowid(conn).await?
    };

    Ok(inserted_id)
}

/// Look up a discussion record by id.
///
/// # Errors
/// Returns any error produced by the underlying database query.
#[must_use = "handle the result"]
pub async fn get_discussion(
    conn: &mut DbConnection,
    discussion_id: i32,
) -> QueryResult<Option<crate::models::Discussion>> {
    use crate::schema::discussions::dsl::discussions;
    discussions
        .find(discussion_id)
        .first::<crate::models::Discussion>(conn)
        .await
        .optional()
}

/// Delete a discussion together with its posts, queued digest entries, and
/// discussion-level subscription overrides.
///
/// # Errors
/// Returns any error produced within the deletion transaction.
#[must_use = "handle the result"]
pub async fn delete_discussion(conn: &mut DbConnection, discussion_id: i32) -> QueryResult<()> {
    conn.transaction::<_, diesel::result::Error, _>(|conn| {
        Box::pin(async move {
            {
                use crate::schema::discussion_subscriptions::dsl as ds;
                diesel::delete(
                    ds::discussion_subscriptions.filter(ds::discussion_id.eq(discussion_id)),
                )
                .execute(conn)
                .await?;
            }
            {
                use crate::schema::digest_queue::dsl as q;
                diesel::delete(q::digest_queue.filter(q::discussion_id.eq(discussion_id)))
                    .execute(conn)
                    .await?;
            }
            {
                use crate::schema::posts::dsl as p;
                diesel::delete(p::posts.filter(p::discussion_id.eq(discussion_id)))
                    .execute(conn)
                    .await?;
            }
            use crate::schema::discussions::dsl as d;
            diesel::delete(d::discussions.filter(d::id.eq(discussion_id)))
                .execute(conn)
                .await?;
            Ok(())
        })
    })
    .await
}
