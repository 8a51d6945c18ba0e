//! Forum-wide subscription modes and the discussion override sentinel.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Override preference value meaning "explicitly unsubscribed from this
/// discussion". Any other stored preference is the epoch second the user
/// explicitly subscribed.
pub const DISCUSSION_UNSUBSCRIBED: i64 = -1;

/// Raised when a raw mode value is outside the known set.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid subscription mode value {0}")]
pub struct InvalidSubscriptionMode(pub i32);

/// Forum-wide subscription policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionMode {
    /// Users choose whether to subscribe.
    Optional,
    /// Everyone is subscribed and cannot opt out.
    Forced,
    /// Users start subscribed but may opt out.
    Initial,
    /// Subscriptions are not permitted.
    Disallowed,
}

impl SubscriptionMode {
    /// Raw column value for this mode.
    #[must_use]
    pub const fn raw(self) -> i32 {
        match self {
            Self::Optional => 0,
            Self::Forced => 1,
            Self::Initial => 2,
            Self::Disallowed => 3,
        }
    }
}

impl TryFrom<i32> for SubscriptionMode {
    type Error = InvalidSubscriptionMode;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Optional),
            1 => Ok(Self::Forced),
            2 => Ok(Self::Initial),
            3 => Ok(Self::Disallowed),
            other => Err(InvalidSubscriptionMode(other)),
        }
    }
}
