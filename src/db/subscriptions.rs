//! Durable CRUD for forum subscriptions and discussion-level overrides.
//!
//! No business logic lives here; the decision rules sit in
//! [`crate::subscriptions`]. Bulk queries exist so the in-process cache can
//! warm itself with one round trip instead of one query per user.

use diesel::{prelude::*, result::QueryResult};
use diesel_async::RunQueryDsl;

use super::connection::DbConnection;
use crate::subscriptions::DISCUSSION_UNSUBSCRIBED;

/// Whether a forum-level subscription row exists for (user, forum).
///
/// # Errors
/// Returns any error produced by the underlying database query.
#[must_use = "handle the result"]
pub async fn subscription_exists(
    conn: &mut DbConnection,
    user: i32,
    forum: i32,
) -> QueryResult<bool> {
    use crate::schema::forum_subscriptions::dsl as fs;
    diesel::select(diesel::dsl::exists(
        fs::forum_subscriptions
            .filter(fs::user_id.eq(user))
            .filter(fs::forum_id.eq(forum)),
    ))
    .get_result(conn)
    .await
}

/// Fetch the forum-level subscription row for (user, forum), if any.
///
/// # Errors
/// Returns any error produced by the underlying database query.
#[must_use = "handle the result"]
pub async fn get_subscription(
    conn: &mut DbConnection,
    user: i32,
    forum: i32,
) -> QueryResult<Option<crate::models::ForumSubscription>> {
    use crate::schema::forum_subscriptions::dsl as fs;
    fs::forum_subscriptions
        .filter(fs::user_id.eq(user))
        .filter(fs::forum_id.eq(forum))
        .first::<crate::models::ForumSubscription>(conn)
        .await
        .optional()
}

/// Insert a forum-level subscription row, returning its id.
///
/// # Errors
/// Returns any error produced by the insertion query.
#[must_use = "handle the result"]
pub async fn insert_subscription(
    conn: &mut DbConnection,
    user: i32,
    forum: i32,
) -> QueryResult<i32> {
    use crate::schema::forum_subscriptions::dsl as fs;
    let row = crate::models::NewForumSubscription {
        user_id: user,
        forum_id: forum,
    };

    #[cfg(any(feature = "postgres", feature = "returning_clauses_for_sqlite_3_35"))]
    let inserted_id: i32 = {
        diesel::insert_into(fs::forum_subscriptions)
            .values(&row)
            .returning(fs::id)
            .get_result(conn)
            .await?
    };

    #[cfg(all(feature = "sqlite", not(feature = "returning_clauses_for_sqlite_3_35")))]
    let inserted_id: i32 = {
        diesel::insert_into(fs::forum_subscriptions)
            .values(&row)
            .execute(conn)
            .await?;
        super::insert::fetch_last_insert_rowid(conn).await?
    };

    Ok(inserted_id)
}

/// Delete the forum-level subscription row for (user, forum).
///
/// Returns the number of rows removed; zero when none existed.
///
/// # Errors
/// Returns any error produced by the deletion query.
#[must_use = "handle the result"]
pub async fn delete_subscription(
    conn: &mut DbConnection,
    user: i32,
    forum: i32,
) -> QueryResult<usize> {
    use crate::schema::forum_subscriptions::dsl as fs;
    diesel::delete(
        fs::forum_subscriptions
            .filter(fs::user_id.eq(user))
            .filter(fs::forum_id.eq(forum)),
    )
    .execute(conn)
    .await
}

/// Ids of every user holding a forum-level subscription row for `forum`.
///
/// # Errors
/// Returns any error produced by the underlying database query.
#[must_use = "handle the result"]
pub async fn subscriber_ids(conn: &mut DbConnection, forum: i32) -> QueryResult<Vec<i32>> {
    use crate::schema::forum_subscriptions::dsl as fs;
    fs::forum_subscriptions
        .filter(fs::forum_id.eq(forum))
        .order(fs::user_id.asc())
        .select(fs::user_id)
        .load::<i32>(conn)
        .await
}

/// Per-forum subscription flags for one user across a course.
///
/// One query covering every forum in `course` whose mode is not FORCED,
/// yielding `(forum_id, subscribed)` pairs for cache warm-fill.
///
/// # Errors
/// Returns any error produced by the underlying database query.
#[must_use = "handle the result"]
pub async fn course_subscription_flags(
    conn: &mut DbConnection,
    course: i32,
    user: i32,
    forced_mode: i32,
) -> QueryResult<Vec<(i32, bool)>> {
    use crate::schema::{forum_subscriptions::dsl as fs, forums::dsl as f};
    let rows: Vec<(i32, Option<i32>)> = f::forums
        .filter(f::course_id.eq(course))
        .filter(f::subscription_mode.ne(forced_mode))
        .left_join(
            fs::forum_subscriptions
                .on(fs::forum_id.eq(f::id).and(fs::user_id.eq(user))),
        )
        .select((f::id, fs::id.nullable()))
        .load::<(i32, Option<i32>)>(conn)
        .await?;
    Ok(rows
        .into_iter()
        .map(|(forum_id, sub)| (forum_id, sub.is_some()))
        .collect())
}

/// Fetch the discussion-level override row for (user, discussion), if any.
///
/// # Errors
/// Returns any error produced by the underlying database query.
#[must_use = "handle the result"]
pub async fn get_discussion_override(
    conn: &mut DbConnection,
    user: i32,
    discussion: i32,
) -> QueryResult<Option<crate::models::DiscussionSubscription>> {
    use crate::schema::discussion_subscriptions::dsl as ds;
    ds::discussion_subscriptions
        .filter(ds::user_id.eq(user))
        .filter(ds::discussion_id.eq(discussion))
        .first::<crate::models::DiscussionSubscription>(conn)
        .await
        .optional()
}

/// Insert or update the discussion-level override for (user, discussion).
///
/// # Errors
/// Returns any error produced by the upsert query.
#[must_use = "handle the result"]
pub async fn upsert_discussion_override(
    conn: &mut DbConnection,
    row: &crate::models::NewDiscussionSubscription,
) -> QueryResult<usize> {
    use crate::schema::discussion_subscriptions::dsl as ds;
    diesel::insert_into(ds::discussion_subscriptions)
        .values(row)
        .on_conflict((ds::user_id, ds::discussion_id))
        .do_update()
        .set(ds::preference.eq(row.preference))
        .execute(conn)
        .await
}

/// Delete the override row for (user, discussion).
///
/// # Errors
/// Returns any error produced by the deletion query.
#[must_use = "handle the result"]
pub async fn delete_discussion_override(
    conn: &mut DbConnection,
    user: i32,
    discussion: i32,
) -> QueryResult<usize> {
    use crate::schema::discussion_subscriptions::dsl as ds;
    diesel::delete(
        ds::discussion_subscriptions
            .filter(ds::user_id.eq(user))
            .filter(ds::discussion_id.eq(discussion)),
    )
    .execute(conn)
    .await
}

/// All override rows for one user within one forum.
///
/// # Errors
/// Returns any error produced by the underlying database query.
#[must_use = "handle the result"]
pub async fn user_forum_overrides(
    conn: &mut DbConnection,
    user: i32,
    forum: i32,
) -> QueryResult<Vec<crate::models::DiscussionSubscription>> {
    use crate::schema::discussion_subscriptions::dsl as ds;
    ds::discussion_subscriptions
        .filter(ds::user_id.eq(user))
        .filter(ds::forum_id.eq(forum))
        .order(ds::discussion_id.asc())
        .load::<crate::models::DiscussionSubscription>(conn)
        .await
}

/// All override rows for a forum, across every user.
///
/// # Errors
/// Returns any error produced by the underlying database query.
#[must_use = "handle the result"]
pub async fn forum_overrides(
    conn: &mut DbConnection,
    forum: i32,
) -> QueryResult<Vec<crate::models::DiscussionSubscription>> {
    use crate::schema::discussion_subscriptions::dsl as ds;
    ds::discussion_subscriptions
        .filter(ds::forum_id.eq(forum))
        .order((ds::user_id.asc(), ds::discussion_id.asc()))
        .load::<crate::models::DiscussionSubscription>(conn)
        .await
}

/// Delete every override for (user, forum) whose preference is not the
/// UNSUBSCRIBED sentinel, returning the affected discussion ids so callers
/// can patch the in-process cache.
///
/// Used when a user-requested forum-level toggle makes the explicit
/// "subscribed" deltas redundant.
///
/// # Errors
/// Returns any error produced by the queries involved.
#[must_use = "handle the result"]
pub async fn purge_subscribed_overrides(
    conn: &mut DbConnection,
    user: i32,
    forum: i32,
) -> QueryResult<Vec<i32>> {
    use crate::schema::discussion_subscriptions::dsl as ds;
    let affected: Vec<i32> = ds::discussion_subscriptions
        .filter(ds::user_id.eq(user))
        .filter(ds::forum_id.eq(forum))
        .filter(ds::preference.ne(DISCUSSION_UNSUBSCRIBED))
        .select(ds::discussion_id)
        .load::<i32>(conn)
        .await?;
    if !affected.is_empty() {
        diesel::delete(
            ds::discussion_subscriptions
                .filter(ds::user_id.eq(user))
                .filter(ds::forum_id.eq(forum))
                .filter(ds::preference.ne(DISCUSSION_UNSUBSCRIBED)),
        )
        .execute(conn)
        .await?;
    }
    Ok(affected)
}

/// Delete every subscription artefact (forum-level rows, overrides, digest
/// preferences) a user holds in the given forums.
///
/// # Errors
/// Returns any error produced by the deletion queries.
#[must_use = "handle the result"]
pub async fn purge_user_forums(
    conn: &mut DbConnection,
    user: i32,
    forums: &[i32],
) -> QueryResult<()> {
    {
        use crate::schema::forum_subscriptions::dsl as fs;
        diesel::delete(
            fs::forum_subscriptions
                .filter(fs::user_id.eq(user))
                .filter(fs::forum_id.eq_any(forums)),
        )
        .execute(conn)
        .await?;
    }
    {
        use crate::schema::discussion_subscriptions::dsl as ds;
        diesel::delete(
            ds::discussion_subscriptions
                .filter(ds::user_id.eq(user))
                .filter(ds::forum_id.eq_any(forums)),
        )
        .execute(conn)
        .await?;
    }
    use crate::schema::forum_digests::dsl as fd;
    diesel::delete(
        fd::forum_digests
            .filter(fd::user_id.eq(user))
            .filter(fd::forum_id.eq_any(forums)),
    )
    .execute(conn)
    .await?;
    Ok(())
}

/// Users holding a forum-level subscription row for `forum`.
///
/// # Errors
/// Returns any error produced by the underlying database query.
#[must_use = "handle the result"]
pub async fn forum_subscribed_users(
    conn: &mut DbConnection,
    forum: i32,
) -> QueryResult<Vec<crate::models::User>> {
    use crate::schema::{forum_subscriptions::dsl as fs, users::dsl as u};
    u::users
        .inner_join(fs::forum_subscriptions.on(fs::user_id.eq(u::id)))
        .filter(fs::forum_id.eq(forum))
        .order(u::id.asc())
        .select((u::id, u::username, u::email, u::guest))
        .load::<crate::models::User>(conn)
        .await
}

/// Users holding a non-UNSUBSCRIBED discussion override within `forum`.
///
/// # Errors
/// Returns any error produced by the underlying database query.
#[must_use = "handle the result"]
pub async fn override_subscribed_users(
    conn: &mut DbConnection,
    forum: i32,
) -> QueryResult<Vec<crate::models::User>> {
    use crate::schema::{discussion_subscriptions::dsl as ds, users::dsl as u};
    u::users
        .inner_join(ds::discussion_subscriptions.on(ds::user_id.eq(u::id)))
        .filter(ds::forum_id.eq(forum))
        .filter(ds::preference.ne(DISCUSSION_UNSUBSCRIBED))
        .order(u::id.asc())
        .select((u::id, u::username, u::email, u::guest))
        .distinct()
        .load::<crate::models::User>(conn)
        .await
}

/// Forums in the user's enrolled courses where the user can unsubscribe:
/// mode is not `forced_mode` and an explicit subscription row exists.
///
/// # Errors
/// Returns any error produced by the underlying database query.
#[must_use = "handle the result"]
pub async fn explicit_subscriptions_in_enrolled_courses(
    conn: &mut DbConnection,
    user: i32,
    forced_mode: i32,
) -> QueryResult<Vec<crate::models::Forum>> {
    use crate::schema::{enrolments::dsl as e, forum_subscriptions::dsl as fs, forums::dsl as f};
    f::forums
        .inner_join(e::enrolments.on(e::course_id.eq(f::course_id)))
        .inner_join(fs::forum_subscriptions.on(fs::forum_id.eq(f::id)))
        .filter(e::user_id.eq(user))
        .filter(fs::user_id.eq(user))
        .filter(f::subscription_mode.ne(forced_mode))
        .order(f::id.asc())
        .select((f::id, f::course_id, f::name, f::subscription_mode, f::visible))
        .load::<crate::models::Forum>(conn)
        .await
}
