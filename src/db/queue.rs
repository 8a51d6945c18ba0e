//! Persisted digest accumulator rows, drained by the digest flush.

use chrono::NaiveDateTime;
use diesel::{prelude::*, result::QueryResult};
use diesel_async::RunQueryDsl;

use super::connection::DbConnection;

/// Queue one post for a user's next daily digest.
///
/// # Errors
/// Returns any error produced by the insertion query.
#[must_use = "handle the result"]
pub async fn enqueue(
    conn: &mut DbConnection,
    entry: &crate::models::NewDigestQueueEntry,
) -> QueryResult<usize> {
    use crate::schema::digest_queue::dsl as q;
    diesel::insert_into(q::digest_queue)
        .values(entry)
        .execute(conn)
        .await
}

/// Queue entries queued strictly before `boundary`, ordered by user then id
/// so callers can group per user in one pass.
///
/// # Errors
/// Returns any error produced by the underlying database query.
#[must_use = "handle the result"]
pub async fn due_entries(
    conn: &mut DbConnection,
    boundary: NaiveDateTime,
) -> QueryResult<Vec<crate::models::DigestQueueEntry>> {
    use crate::schema::digest_queue::dsl as q;
    q::digest_queue
        .filter(q::queued_at.lt(boundary))
        .order((q::user_id.asc(), q::id.asc()))
        .load::<crate::models::DigestQueueEntry>(conn)
        .await
}

/// Remove a user's queue entries queued strictly before `boundary`.
///
/// # Errors
/// Returns any error produced by the deletion query.
#[must_use = "handle the result"]
pub async fn delete_for_user(
    conn: &mut DbConnection,
    user: i32,
    boundary: NaiveDateTime,
) -> QueryResult<usize> {
    use crate::schema::digest_queue::dsl as q;
    diesel::delete(
        q::digest_queue
            .filter(q::user_id.eq(user))
            .filter(q::queued_at.lt(boundary)),
    )
    .execute(conn)
    .await
}
