//! Subscription decision rules layered over the store and cache.
//!
//! Every operation takes its user id, forum or discussion record, cache, and
//! collaborator oracles explicitly; nothing here reads ambient state. The
//! mutating operations are idempotent: finding "no change needed" is a
//! result, not an error.
//!
//! One asymmetry is deliberate and load-bearing: when a discussion id is
//! supplied, the mere existence of an override row decides the answer —
//! except under forced mode, which is checked first and therefore ignores a
//! discussion-level UNSUBSCRIBED override entirely. Forum force beats the
//! override; the override beats optional forum-level state.

mod cache;
mod mode;


use chrono::Utc;
use diesel::result::QueryResult;
use thiserror::Error;

pub use self::{
    cache::SubscriptionCache,
    mode::{DISCUSSION_UNSUBSCRIBED, InvalidSubscriptionMode, SubscriptionMode},
};
use crate::{
    capability::{Actor, Capability, CapabilityOracle, Context, VisibilityFilter},
    db::{self, DbConnection},
    events::{
        DiscussionSubscriptionPayload,
        Event,
        EventError,
        EventSink,
        SubscriptionPayload,
    },
    models::{Discussion, Forum, User},
};

/// Failures surfaced by subscription operations.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    /// The referenced user does not exist.
    #[error("user {0} not found")]
    UserNotFound(i32),
    /// The referenced forum does not exist.
    #[error("forum {0} not found")]
    ForumNotFound(i32),
    /// The referenced discussion does not exist.
    #[error("discussion {0} not found")]
    DiscussionNotFound(i32),
    /// An event payload failed validation.
    #[error(transparent)]
    Event(#[from] EventError),
    /// The store reported a failure.
    #[error(transparent)]
    Storage(#[from] diesel::result::Error),
}

/// Result of [`subscribe_user`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeOutcome {
    /// The user was already subscribed; nothing changed.
    AlreadySubscribed,
    /// A subscription row was created with the given id.
    Subscribed(i32),
}

/// Whether the forum subscribes everyone unconditionally.
#[must_use]
pub fn is_forced(forum: &Forum) -> bool {
    forum.subscription_mode == SubscriptionMode::Forced.raw()
}

/// Whether the forum forbids subscriptions.
#[must_use]
pub fn is_disallowed(forum: &Forum) -> bool {
    forum.subscription_mode == SubscriptionMode::Disallowed.raw()
}

/// Whether the actor may choose their own subscription state for the forum.
#[must_use]
pub fn is_subscribable(forum: &Forum, actor: &Actor) -> bool {
    actor.authenticated && !actor.guest && !is_forced(forum) && !is_disallowed(forum)
}

/// Effective subscription state for a user, optionally at discussion level.
///
/// Forced mode with the force-subscribe capability short-circuits to `true`
/// before any discussion override is consulted. Otherwise an override row,
/// when present, is authoritative regardless of its value; only its absence
/// falls back to the forum-level state.
///
/// # Errors
/// Returns any error produced while filling the cache from the store.
pub async fn is_subscribed(
    conn: &mut DbConnection,
    cache: &mut SubscriptionCache,
    caps: &dyn CapabilityOracle,
    user_id: i32,
    forum: &Forum,
    discussion: Option<i32>,
    context: &Context,
) -> QueryResult<bool> {
    if is_forced(forum) && caps.has_capability(Capability::AllowForceSubscribe, context, user_id) {
        return Ok(true);
    }
    if let Some(discussion_id) = discussion {
        let overrides = cache
            .fetch_discussion_overrides(conn, forum.id, user_id)
            .await?;
        if let Some(preference) = overrides.get(&discussion_id) {
            return Ok(*preference != DISCUSSION_UNSUBSCRIBED);
        }
    }
    cache.fetch_forum(conn, forum.id, user_id).await
}

/// Subscribe a user to a forum. Idempotent.
///
/// When `user_requested`, explicit "subscribed" discussion overrides become
/// redundant and are purged; system-triggered calls leave them untouched.
/// Emits [`Event::SubscriptionCreated`] when a row is created.
///
/// # Errors
/// Returns storage or event-construction failures.
pub async fn subscribe_user(
    conn: &mut DbConnection,
    cache: &mut SubscriptionCache,
    caps: &dyn CapabilityOracle,
    events: &mut dyn EventSink,
    user_id: i32,
    forum: &Forum,
    context: &Context,
    user_requested: bool,
) -> Result<SubscribeOutcome, SubscriptionError> {
    if is_subscribed(conn, cache, caps, user_id, forum, None, context).await? {
        return Ok(SubscribeOutcome::AlreadySubscribed);
    }
    let subscription_id = db::insert_subscription(conn, user_id, forum.id).await?;
    cache.set_forum(user_id, forum.id, true);
    if user_requested {
        let affected = db::purge_subscribed_overrides(conn, user_id, forum.id).await?;
        for discussion_id in affected {
            cache.clear_discussion(user_id, forum.id, discussion_id);
        }
    }
    let payload = SubscriptionPayload::new(context, subscription_id, user_id, forum.id)?;
    events.emit(Event::SubscriptionCreated(payload));
    Ok(SubscribeOutcome::Subscribed(subscription_id))
}

/// Unsubscribe a user from a forum. Idempotent.
///
/// The digest preference row is removed unconditionally, even when no
/// subscription row exists. Emits [`Event::SubscriptionDeleted`] only when a
/// row was actually deleted.
///
/// # Errors
/// Returns storage or event-construction failures.
pub async fn unsubscribe_user(
    conn: &mut DbConnection,
    cache: &mut SubscriptionCache,
    events: &mut dyn EventSink,
    user_id: i32,
    forum: &Forum,
    context: &Context,
    user_requested: bool,
) -> Result<(), SubscriptionError> {
    db::delete_digest(conn, user_id, forum.id).await?;
    let Some(row) = db::get_subscription(conn, user_id, forum.id).await? else {
        return Ok(());
    };
    if user_requested {
        let affected = db::purge_subscribed_overrides(conn, user_id, forum.id).await?;
        for discussion_id in affected {
            cache.clear_discussion(user_id, forum.id, discussion_id);
        }
    }
    db::delete_subscription(conn, user_id, forum.id).await?;
    cache.set_forum(user_id, forum.id, false);
    let payload = SubscriptionPayload::new(context, row.id, user_id, forum.id)?;
    events.emit(Event::SubscriptionDeleted(payload));
    Ok(())
}

/// Record an explicit discussion-level subscription.
///
/// Returns `false` without side effects when the user is already subscribed
/// at discussion or forum level. A forum-subscribed user with a stale
/// UNSUBSCRIBED override gets the override deleted instead of flipped.
///
/// # Errors
/// Returns storage or event-construction failures.
pub async fn subscribe_user_to_discussion(
    conn: &mut DbConnection,
    cache: &mut SubscriptionCache,
    events: &mut dyn EventSink,
    user_id: i32,
    discussion: &Discussion,
    context: &Context,
) -> Result<bool, SubscriptionError> {
    let existing = db::get_discussion_override(conn, user_id, discussion.id).await?;
    if let Some(row) = &existing {
        if row.preference != DISCUSSION_UNSUBSCRIBED {
            return Ok(false);
        }
    }
    if db::subscription_exists(conn, user_id, discussion.forum_id).await? {
        if existing.is_some() {
            // Forum-subscribed with an UNSUBSCRIBED delta: the delta is now
            // moot, so remove it rather than flipping its value.
            db::delete_discussion_override(conn, user_id, discussion.id).await?;
            cache.clear_discussion(user_id, discussion.forum_id, discussion.id);
        } else {
            return Ok(false);
        }
    } else {
        let preference = Utc::now().timestamp();
        db::upsert_discussion_override(
            conn,
            &crate::models::NewDiscussionSubscription {
                user_id,
                discussion_id: discussion.id,
                forum_id: discussion.forum_id,
                preference,
            },
        )
        .await?;
        cache.set_discussion(user_id, discussion.forum_id, discussion.id, preference);
    }
    let payload =
        DiscussionSubscriptionPayload::new(context, user_id, discussion.id, discussion.forum_id)?;
    events.emit(Event::DiscussionSubscriptionCreated(payload));
    Ok(true)
}

/// Record an explicit discussion-level unsubscription.
///
/// Returns `false` without side effects when the user is already
/// unsubscribed at the discussion level. For a forum-subscribed user the
/// override is written as UNSUBSCRIBED; otherwise a now-redundant
/// "subscribed" override is deleted.
///
/// # Errors
/// Returns storage or event-construction failures.
pub async fn unsubscribe_user_from_discussion(
    conn: &mut DbConnection,
    cache: &mut SubscriptionCache,
    events: &mut dyn EventSink,
    user_id: i32,
    discussion: &Discussion,
    context: &Context,
) -> Result<bool, SubscriptionError> {
    let existing = db::get_discussion_override(conn, user_id, discussion.id).await?;
    if let Some(row) = &existing {
        if row.preference == DISCUSSION_UNSUBSCRIBED {
            return Ok(false);
        }
    }
    if db::subscription_exists(conn, user_id, discussion.forum_id).await? {
        db::upsert_discussion_override(
            conn,
            &crate::models::NewDiscussionSubscription {
                user_id,
                discussion_id: discussion.id,
                forum_id: discussion.forum_id,
                preference: DISCUSSION_UNSUBSCRIBED,
            },
        )
        .await?;
        cache.set_discussion(
            user_id,
            discussion.forum_id,
            discussion.id,
            DISCUSSION_UNSUBSCRIBED,
        );
    } else if existing.is_some() {
        db::delete_discussion_override(conn, user_id, discussion.id).await?;
        cache.clear_discussion(user_id, discussion.forum_id, discussion.id);
    } else {
        return Ok(false);
    }
    let payload =
        DiscussionSubscriptionPayload::new(context, user_id, discussion.id, discussion.forum_id)?;
    events.emit(Event::DiscussionSubscriptionDeleted(payload));
    Ok(true)
}

/// Forums in the actor's enrolled courses they can currently unsubscribe
/// from: mode is not forced and an explicit subscription row exists,
/// filtered by activity visibility.
///
/// # Errors
/// Returns storage failures, or [`SubscriptionError::UserNotFound`] when the
/// actor has no user record.
pub async fn unsubscribable_forums(
    conn: &mut DbConnection,
    actor: &Actor,
    visibility: &dyn VisibilityFilter,
) -> Result<Vec<Forum>, SubscriptionError> {
    if !actor.authenticated || actor.guest {
        return Ok(Vec::new());
    }
    let user = db::get_user(conn, actor.id)
        .await?
        .ok_or(SubscriptionError::UserNotFound(actor.id))?;
    let forums = db::explicit_subscriptions_in_enrolled_courses(
        conn,
        actor.id,
        SubscriptionMode::Forced.raw(),
    )
    .await?;
    Ok(forums
        .into_iter()
        .filter(|forum| {
            !visibility
                .filter_user_list(vec![user.clone()], forum)
                .is_empty()
        })
        .collect())
}

/// Everyone who should receive notifications for a post in `forum`.
///
/// Forced mode ignores the subscription table and takes every enrolled user
/// holding the view capability. Otherwise the forum-subscribed users are
/// taken, optionally unioned with non-UNSUBSCRIBED discussion overriders.
/// The guest account is always excluded, a group filter restricts to that
/// group's members, and the visibility filter has the final say.
///
/// # Errors
/// Returns any storage failure encountered.
pub async fn fetch_subscribed_users(
    conn: &mut DbConnection,
    caps: &dyn CapabilityOracle,
    visibility: &dyn VisibilityFilter,
    forum: &Forum,
    group: Option<i32>,
    include_discussion_subscriptions: bool,
    context: &Context,
) -> Result<Vec<User>, SubscriptionError> {
    let mut users = if is_forced(forum) {
        let enrolled = db::enrolled_user_ids(conn, forum.course_id).await?;
        let eligible: Vec<i32> = enrolled
            .into_iter()
            .filter(|&user| caps.has_capability(Capability::ViewDiscussion, context, user))
            .collect();
        db::get_users_by_ids(conn, &eligible).await?
    } else {
        let mut merged: std::collections::BTreeMap<i32, User> =
            db::forum_subscribed_users(conn, forum.id)
                .await?
                .into_iter()
                .map(|user| (user.id, user))
                .collect();
        if include_discussion_subscriptions {
            for user in db::override_subscribed_users(conn, forum.id).await? {
                merged.entry(user.id).or_insert(user);
            }
        }
        merged.into_values().collect()
    };
    if let Some(group_id) = group {
        let members: std::collections::HashSet<i32> =
            db::group_member_ids(conn, group_id).await?.into_iter().collect();
        users.retain(|user| members.contains(&user.id));
    }
    users.retain(|user| !user.guest);
    Ok(visibility.filter_user_list(users, forum))
}
