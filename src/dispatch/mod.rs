//! Outbound notification dispatch: per-post sends and daily digests.
//!
//! [`Dispatcher::run_pending`] walks the window of unmailed posts, resolves
//! each post's recipients through the subscription rules, and either hands an
//! immediate send to the transport or queues the post for the recipient's
//! next digest. [`Dispatcher::run_digests`] drains the queue into one digest
//! send per user. Both passes keep going past per-item failures; a run
//! reports totals instead of aborting on the first bad recipient.


use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
    capability::{CapabilityOracle, Context, VisibilityFilter},
    db::{self, DbConnection, MailedStatus},
    digest::{DigestMode, effective_digest},
    models::{Discussion, NewDigestQueueEntry, Post, User},
    subscriptions::{SubscriptionCache, fetch_subscribed_users},
};

/// Transport-level delivery failure.
#[derive(Debug, Error)]
#[error("delivery failed: {0}")]
pub struct DeliveryError(pub String);

/// Failures that abort a dispatch run outright.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The store reported a failure outside per-recipient handling.
    #[error(transparent)]
    Storage(#[from] diesel::result::Error),
    /// Recipient resolution failed for a post.
    #[error("recipient resolution failed: {0}")]
    Recipients(#[from] crate::subscriptions::SubscriptionError),
}

/// Rendered content for one post within a send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendering {
    /// Subject line.
    pub subject: String,
    /// Full body, absent for a subjects-only digest item.
    pub body: Option<String>,
}

impl Rendering {
    fn for_mode(post: &Post, mode: DigestMode) -> Self {
        Self {
            subject: post.subject.clone(),
            body: match mode {
                DigestMode::SubjectsOnly => None,
                DigestMode::Off | DigestMode::Full => Some(post.message.clone()),
            },
        }
    }
}

/// A single post sent to a single recipient as its own message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImmediateSend {
    /// The recipient.
    pub user: User,
    /// The post being delivered.
    pub post: Post,
    /// The post's discussion, for threading headers.
    pub discussion: Discussion,
    /// Rendered content.
    pub rendering: Rendering,
}

/// One post inside a digest, rendered per the recipient's mode at flush
/// time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestItem {
    /// The queued post.
    pub post: Post,
    /// Its discussion.
    pub discussion: Discussion,
    /// Rendered content; subjects-only items carry no body.
    pub rendering: Rendering,
}

/// One digest message covering everything queued for a recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestSend {
    /// The recipient.
    pub user: User,
    /// Queued items, oldest first.
    pub items: Vec<DigestItem>,
}

/// Anything the transport can be asked to deliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendUnit {
    /// A single-post message.
    Immediate(ImmediateSend),
    /// A per-user digest.
    Digest(DigestSend),
}

/// Delivery backend; the host wires in mail, and tests record.
#[async_trait]
pub trait MailTransport {
    /// Deliver one unit.
    ///
    /// # Errors
    /// Returns [`DeliveryError`] when the unit could not be handed off.
    async fn deliver(&mut self, unit: SendUnit) -> Result<(), DeliveryError>;
}

/// Totals for one [`Dispatcher::run_pending`] pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PendingSummary {
    /// Posts examined.
    pub posts: usize,
    /// Immediate messages handed to the transport.
    pub sent: usize,
    /// Posts queued for later digests (per recipient).
    pub queued: usize,
    /// Delivery or recipient failures skipped over.
    pub failures: usize,
}

/// Totals for one [`Dispatcher::run_digests`] pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DigestSummary {
    /// Users a digest was assembled for.
    pub users: usize,
    /// Items across all digests.
    pub items: usize,
    /// Digest deliveries that failed.
    pub failures: usize,
}

/// Timing knobs for the pending-post window.
#[derive(Debug, Clone, Copy)]
pub struct DispatchWindow {
    /// Posts newer than this are held back so authors can still edit.
    pub edit_grace: Duration,
    /// Posts older than this are abandoned rather than mailed late.
    pub max_mailing_age: Duration,
}

impl DispatchWindow {
    fn bounds(&self, now: NaiveDateTime) -> (NaiveDateTime, NaiveDateTime) {
        (now - self.max_mailing_age, now - self.edit_grace)
    }
}

/// Drives both dispatch passes against injected collaborators.
pub struct Dispatcher<'a> {
    caps: &'a dyn CapabilityOracle,
    visibility: &'a dyn VisibilityFilter,
    window: DispatchWindow,
    site_default: DigestMode,
}

impl<'a> Dispatcher<'a> {
    /// Dispatcher with the given oracles, window, and site-wide digest
    /// default.
    #[must_use]
    pub fn new(
        caps: &'a dyn CapabilityOracle,
        visibility: &'a dyn VisibilityFilter,
        window: DispatchWindow,
        site_default: DigestMode,
    ) -> Self {
        Self {
            caps,
            visibility,
            window,
            site_default,
        }
    }

    /// Process every unmailed post inside the window.
    ///
    /// Each post is marked `Sent` once handled, including posts with zero
    /// recipients, so it is never reconsidered. A post whose processing
    /// fails partway, recipient resolution included, stays `Pending` for the
    /// next run; a post with failed deliveries is marked `Error` for
    /// operator follow-up. Digest recipients get a queue row instead of a
    /// message.
    ///
    /// # Errors
    /// Returns any failure loading the candidate window itself.
    pub async fn run_pending(
        &self,
        conn: &mut DbConnection,
        transport: &mut dyn MailTransport,
        now: NaiveDateTime,
    ) -> Result<PendingSummary, DispatchError> {
        let (start, end) = self.window.bounds(now);
        let candidates = db::unmailed_posts(conn, start, end, now).await?;
        let mut cache = SubscriptionCache::new();
        let mut summary = PendingSummary::default();
        for candidate in candidates {
            summary.posts += 1;
            if let Err(err) = self
                .process_post(conn, &mut cache, transport, &candidate, now, &mut summary)
                .await
            {
                // Left Pending so the next run retries it.
                error!(post_id = candidate.0.id, %err, "post processing failed");
                summary.failures += 1;
            }
        }
        info!(
            posts = summary.posts,
            sent = summary.sent,
            queued = summary.queued,
            failures = summary.failures,
            "pending pass complete"
        );
        Ok(summary)
    }

    /// Handle one candidate post end to end, final state flip included.
    ///
    /// An error anywhere in here leaves the post `Pending`; already-made
    /// deliveries for it may then repeat on the next run.
    async fn process_post(
        &self,
        conn: &mut DbConnection,
        cache: &mut SubscriptionCache,
        transport: &mut dyn MailTransport,
        candidate: &(Post, Discussion),
        now: NaiveDateTime,
        summary: &mut PendingSummary,
    ) -> Result<(), DispatchError> {
        let (post, discussion) = candidate;
        let Some(forum) = db::get_forum(conn, discussion.forum_id).await? else {
            warn!(post_id = post.id, forum_id = discussion.forum_id, "post in missing forum");
            db::mark_mailed(conn, post.id, MailedStatus::Error).await?;
            summary.failures += 1;
            return Ok(());
        };
        let context = Context::new(forum.id);
        let recipients = fetch_subscribed_users(
            conn,
            self.caps,
            self.visibility,
            &forum,
            None,
            true,
            &context,
        )
        .await?;
        let mut delivery_failed = false;
        for user in recipients {
            if !crate::subscriptions::is_subscribed(
                conn,
                cache,
                self.caps,
                user.id,
                &forum,
                Some(discussion.id),
                &context,
            )
            .await?
            {
                continue;
            }
            let mode = effective_digest(conn, user.id, forum.id, self.site_default).await?;
            if mode == DigestMode::Off {
                let unit = SendUnit::Immediate(ImmediateSend {
                    user: user.clone(),
                    post: post.clone(),
                    discussion: discussion.clone(),
                    rendering: Rendering::for_mode(post, DigestMode::Off),
                });
                match transport.deliver(unit).await {
                    Ok(()) => summary.sent += 1,
                    Err(err) => {
                        warn!(post_id = post.id, user_id = user.id, %err, "delivery failed");
                        summary.failures += 1;
                        delivery_failed = true;
                    }
                }
            } else {
                db::enqueue(
                    conn,
                    &NewDigestQueueEntry {
                        user_id: user.id,
                        discussion_id: discussion.id,
                        post_id: post.id,
                        queued_at: now,
                    },
                )
                .await?;
                summary.queued += 1;
            }
        }
        let status = if delivery_failed {
            MailedStatus::Error
        } else {
            MailedStatus::Sent
        };
        db::mark_mailed(conn, post.id, status).await?;
        Ok(())
    }

    /// Flush queue entries queued strictly before `boundary` into one digest
    /// per user.
    ///
    /// Each item is rendered per the recipient's digest mode as it stands
    /// now, not as it stood when queued. A recipient whose preference has
    /// dropped back to `Off` since queueing still receives the already
    /// queued items, rendered as a full digest; only posts processed after
    /// the change become immediate sends. A user's rows are removed once
    /// their digest is assembled, whether or not delivery succeeded:
    /// failures are logged and counted, never redelivered.
    ///
    /// # Errors
    /// Returns storage failures outside per-user handling.
    pub async fn run_digests(
        &self,
        conn: &mut DbConnection,
        transport: &mut dyn MailTransport,
        boundary: NaiveDateTime,
    ) -> Result<DigestSummary, DispatchError> {
        let entries = db::due_entries(conn, boundary).await?;
        let mut summary = DigestSummary::default();
        let mut iter = entries.into_iter().peekable();
        while let Some(first) = iter.next() {
            let user_id = first.user_id;
            let mut batch = vec![first];
            while iter.peek().is_some_and(|entry| entry.user_id == user_id) {
                if let Some(entry) = iter.next() {
                    batch.push(entry);
                }
            }
            let Some(user) = db::get_user(conn, user_id).await? else {
                warn!(user_id, "queued digest for missing user; dropping entries");
                db::delete_for_user(conn, user_id, boundary).await?;
                continue;
            };
            let mut items = Vec::with_capacity(batch.len());
            for entry in &batch {
                let Some(post) = db::get_post(conn, entry.post_id).await? else {
                    continue;
                };
                let Some(discussion) = db::get_discussion(conn, entry.discussion_id).await?
                else {
                    continue;
                };
                let mode =
                    effective_digest(conn, user_id, discussion.forum_id, self.site_default)
                        .await?;
                let render_as = if mode == DigestMode::SubjectsOnly {
                    DigestMode::SubjectsOnly
                } else {
                    DigestMode::Full
                };
                items.push(DigestItem {
                    rendering: Rendering::for_mode(&post, render_as),
                    post,
                    discussion,
                });
            }
            if !items.is_empty() {
                summary.users += 1;
                summary.items += items.len();
                let unit = SendUnit::Digest(DigestSend {
                    user,
                    items,
                });
                if let Err(err) = transport.deliver(unit).await {
                    warn!(user_id, %err, "digest delivery failed");
                    summary.failures += 1;
                }
            }
            db::delete_for_user(conn, user_id, boundary).await?;
        }
        info!(
            users = summary.users,
            items = summary.items,
            failures = summary.failures,
            "digest pass complete"
        );
        Ok(summary)
    }
}
