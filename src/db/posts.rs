//! Post record helpers, including unmailed-post selection for the batcher.

use chrono::NaiveDateTime;
use diesel::{prelude::*, result::QueryResult};
use diesel_async::RunQueryDsl;

use super::connection::DbConnection;

/// Mailing state of a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailedStatus {
    /// Notification obligations not yet discharged.
    Pending,
    /// Included in a send (immediate or digest); never re-sent.
    Sent,
    /// Processing failed permanently; excluded from future runs.
    Error,
}

impl MailedStatus {
    /// Raw column value for this status.
    #[must_use]
    pub const fn raw(self) -> i32 {
        match self {
            Self::Pending => 0,
            Self::Sent => 1,
            Self::Error => 2,
        }
    }
}

/// Insert a new post record, returning its id.
///
/// # Errors
/// Returns any error produced by the insertion query.
#[must_use = "handle the result"]
pub async fn create_post(
    conn: &mut DbConnection,
    post: &crate::models::NewPost<'_>,
) -> QueryResult<i32> {
    use crate::schema::posts::dsl::posts;

    #[cfg(any(feature = "postgres", feature = "returning_clauses_for_sqlite_3_35"))]
    let inserted_id: i32 = {
        use crate::schema::posts::dsl::id;
        diesel::insert_into(posts)
            .values(post)
            .returning(id)
            .get_result(conn)
            .await?
    };

    #[cfg(all(feature = "sqlite", not(feature = "returning_clauses_for_sqlite_3_35")))]
    let inserted_id: i32 = {
        diesel::insert_into(posts).values(post).execute(conn).await?;
        super::insert::fetch_last_insert_rowid(conn).await?
    };

    Ok(inserted_id)
}

/// Look up a post record by id.
///
/// # Errors
/// Returns any error produced by the underlying database query.
#[must_use = "handle the result"]
pub async fn get_post(
    conn: &mut DbConnection,
    post_id: i32,
) -> QueryResult<Option<crate::models::Post>> {
    use crate::schema::posts::dsl::posts;
    posts
        .find(post_id)
        .first::<crate::models::Post>(conn)
        .await
        .optional()
}

/// Select posts still awaiting notification within `[start, end)`.
///
/// A candidate post is `Pending`, was created at or after `start`, and was
/// last modified before `end`; bounding the upper edge on `modified` keeps a
/// freshly edited post out of the run until its edit settles. The
/// discussion's timed bounds (when set) must also admit `now`:
/// `timestart <= now` and `timeend` unset or `>= now`. Returns each post
/// paired with its discussion, ordered by post id.
///
/// # Errors
/// Returns any error produced by the underlying database query.
#[must_use = "handle the result"]
pub async fn unmailed_posts(
    conn: &mut DbConnection,
    start: NaiveDateTime,
    end: NaiveDateTime,
    now: NaiveDateTime,
) -> QueryResult<Vec<(crate::models::Post, crate::models::Discussion)>> {
    use crate::schema::{discussions::dsl as d, posts::dsl as p};
    p::posts
        .inner_join(d::discussions)
        .filter(p::mailed.eq(MailedStatus::Pending.raw()))
        .filter(p::created.ge(start))
        .filter(p::modified.lt(end))
        .filter(d::timestart.is_null().or(d::timestart.le(now)))
        .filter(d::timeend.is_null().or(d::timeend.ge(now)))
        .order(p::id.asc())
        .load::<(crate::models::Post, crate::models::Discussion)>(conn)
        .await
}

/// Update a post's mailing state.
///
/// # Errors
/// Returns any error produced by the update query.
#[must_use = "handle the result"]
pub async fn mark_mailed(
    conn: &mut DbConnection,
    post_id: i32,
    status: MailedStatus,
) -> QueryResult<usize> {
    use crate::schema::posts::dsl as p;
    diesel::update(p::posts.filter(p::id.eq(post_id)))
        .set(p::mailed.eq(status.raw()))
        .execute(conn)
        .await
}
