//! Reactions to host enrolment lifecycle events.
//!
//! The host platform raises these when a user leaves a course or gains a
//! role in one; they keep the subscription tables consistent without the
//! host knowing the table layout.

use tracing::debug;

use crate::{
    capability::{Capability, CapabilityOracle, Context},
    db::{self, DbConnection},
    events::EventSink,
    subscriptions::{self, SubscriptionCache, SubscriptionError, SubscriptionMode},
};

/// A user was unenrolled from a course: drop every subscription artefact
/// they hold in the course's forums.
///
/// # Errors
/// Returns any storage failure encountered.
pub async fn user_unenrolled(
    conn: &mut DbConnection,
    cache: &mut SubscriptionCache,
    user_id: i32,
    course_id: i32,
) -> Result<(), SubscriptionError> {
    let forums = db::forums_in_course(conn, course_id).await?;
    let forum_ids: Vec<i32> = forums.iter().map(|forum| forum.id).collect();
    if forum_ids.is_empty() {
        return Ok(());
    }
    db::purge_user_forums(conn, user_id, &forum_ids).await?;
    cache.invalidate_forum_cache();
    cache.invalidate_discussion_cache();
    debug!(user_id, course_id, forums = forum_ids.len(), "purged subscriptions on unenrol");
    Ok(())
}

/// A user gained a role in a course: auto-subscribe them to the course's
/// initial-subscription forums.
///
/// Only users who may be force-subscribed are enrolled this way, and the
/// subscribe is system-triggered, so existing discussion overrides are left
/// alone. Already-subscribed forums are skipped by idempotence.
///
/// # Errors
/// Returns any storage or event failure encountered.
pub async fn role_assigned(
    conn: &mut DbConnection,
    cache: &mut SubscriptionCache,
    caps: &dyn CapabilityOracle,
    events: &mut dyn EventSink,
    user_id: i32,
    course_id: i32,
) -> Result<(), SubscriptionError> {
    let forums = db::forums_in_course(conn, course_id).await?;
    for forum in forums {
        if forum.subscription_mode != SubscriptionMode::Initial.raw() {
            continue;
        }
        let context = Context::new(forum.id);
        if !caps.has_capability(Capability::AllowForceSubscribe, &context, user_id) {
            continue;
        }
        subscriptions::subscribe_user(
            conn, cache, caps, events, user_id, &forum, &context, false,
        )
        .await?;
    }
    Ok(())
}
