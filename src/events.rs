//! Subscription lifecycle events emitted towards the host's event sink.
//!
//! Events are a flat tagged union with one payload struct per kind,
//! validated at construction. Emission is fire-and-forget; consumers are the
//! host platform's concern.

use serde::Serialize;
use thiserror::Error;

use crate::capability::Context;

/// Raised when an event payload carries a non-positive identifier.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("event field `{field}` must be a positive id, got {value}")]
pub struct EventError {
    /// Name of the offending payload field.
    pub field: &'static str,
    /// The rejected value.
    pub value: i32,
}

fn require_positive(field: &'static str, value: i32) -> Result<i32, EventError> {
    if value > 0 {
        Ok(value)
    } else {
        Err(EventError { field, value })
    }
}

/// Payload for forum-level subscription events.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SubscriptionPayload {
    /// Host context the mutation happened in.
    pub context_id: i32,
    /// Id of the subscription row created or deleted.
    pub subscription_id: i32,
    /// The user whose subscription state changed.
    pub user_id: i32,
    /// The forum concerned.
    pub forum_id: i32,
}

impl SubscriptionPayload {
    /// Build a validated payload.
    ///
    /// # Errors
    /// Returns [`EventError`] when any id is not positive.
    pub fn new(
        context: &Context,
        subscription_id: i32,
        user_id: i32,
        forum_id: i32,
    ) -> Result<Self, EventError> {
        Ok(Self {
            context_id: context.id,
            subscription_id: require_positive("subscription_id", subscription_id)?,
            user_id: require_positive("user_id", user_id)?,
            forum_id: require_positive("forum_id", forum_id)?,
        })
    }
}

/// Payload for discussion-level subscription events.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DiscussionSubscriptionPayload {
    /// Host context the mutation happened in.
    pub context_id: i32,
    /// The user whose override state changed.
    pub user_id: i32,
    /// The discussion concerned.
    pub discussion_id: i32,
    /// The discussion's owning forum.
    pub forum_id: i32,
}

impl DiscussionSubscriptionPayload {
    /// Build a validated payload.
    ///
    /// # Errors
    /// Returns [`EventError`] when any id is not positive.
    pub fn new(
        context: &Context,
        user_id: i32,
        discussion_id: i32,
        forum_id: i32,
    ) -> Result<Self, EventError> {
        Ok(Self {
            context_id: context.id,
            user_id: require_positive("user_id", user_id)?,
            discussion_id: require_positive("discussion_id", discussion_id)?,
            forum_id: require_positive("forum_id", forum_id)?,
        })
    }
}

/// Subscription lifecycle event kinds.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    /// A forum-level subscription row was created.
    SubscriptionCreated(SubscriptionPayload),
    /// A forum-level subscription row was deleted.
    SubscriptionDeleted(SubscriptionPayload),
    /// A discussion-level override now signals "subscribed".
    DiscussionSubscriptionCreated(DiscussionSubscriptionPayload),
    /// A discussion-level override now signals "unsubscribed".
    DiscussionSubscriptionDeleted(DiscussionSubscriptionPayload),
}

/// Fire-and-forget event consumer.
pub trait EventSink {
    /// Accept one event. Never fails; sinks swallow their own errors.
    fn emit(&mut self, event: Event);
}

/// Sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn emit(&mut self, _event: Event) {}
}

/// Sink that records events in order; intended for tests.
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    /// Events received so far, oldest first.
    pub events: Vec<Event>,
}

impl EventSink for RecordingEventSink {
    fn emit(&mut self, event: Event) { self.events.push(event); }
}
