//! Digest preference row helpers.

use diesel::{prelude::*, result::QueryResult};
use diesel_async::RunQueryDsl;

use super::connection::DbConnection;

/// Fetch the stored digest preference for (user, forum), if any.
///
/// # Errors
/// Returns any error produced by the underlying database query.
#[must_use = "handle the result"]
pub async fn get_digest_row(
    conn: &mut DbConnection,
    user: i32,
    forum: i32,
) -> QueryResult<Option<i32>> {
    use crate::schema::forum_digests::dsl as fd;
    fd::forum_digests
        .filter(fd::user_id.eq(user))
        .filter(fd::forum_id.eq(forum))
        .select(fd::maildigest)
        .first::<i32>(conn)
        .await
        .optional()
}

/// Insert or update the digest preference row for (user, forum).
///
/// # Errors
/// Returns any error produced by the upsert query.
#[must_use = "handle the result"]
pub async fn upsert_digest(
    conn: &mut DbConnection,
    user: i32,
    forum: i32,
    maildigest: i32,
) -> QueryResult<usize> {
    use crate::schema::forum_digests::dsl as fd;
    let row = crate::models::NewForumDigest {
        user_id: user,
        forum_id: forum,
        maildigest,
    };
    diesel::insert_into(fd::forum_digests)
        .values(&row)
        .on_conflict((fd::user_id, fd::forum_id))
        .do_update()
        .set(fd::maildigest.eq(maildigest))
        .execute(conn)
        .await
}

/// Delete any digest preference row for (user, forum).
///
/// # Errors
/// Returns any error produced by the deletion query.
#[must_use = "handle the result"]
pub async fn delete_digest(conn: &mut DbConnection, user: i32, forum: i32) -> QueryResult<usize> {
    use crate::schema::forum_digests::dsl as fd;
    diesel::delete(
        fd::forum_digests
            .filter(fd::user_id.eq(user))
            .filter(fd::forum_id.eq(forum)),
    )
    .execute(conn)
    .await
}
