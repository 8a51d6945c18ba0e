//! Per-user digest preferences layered over the store.
//!
//! A user's effective digest mode for a forum is the per-forum row when one
//! exists, otherwise the site default. Writing the sentinel
//! [`DIGEST_USE_DEFAULT`] deletes the per-forum row instead of storing it, so
//! "use the default" is always represented by absence.

use diesel::result::QueryResult;
use thiserror::Error;

use crate::db::{self, DbConnection};

/// Sentinel preference meaning "fall back to the site default"; stored by
/// deleting the per-forum row.
pub const DIGEST_USE_DEFAULT: i32 = -1;

/// Raised when a raw digest value is not a known mode.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid digest mode {0}")]
pub struct InvalidDigestMode(pub i32);

/// How posts in a forum reach a subscribed user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DigestMode {
    /// Every post is sent individually as it is dispatched.
    Off,
    /// One daily digest containing the complete posts.
    Full,
    /// One daily digest containing subjects only.
    SubjectsOnly,
}

impl DigestMode {
    /// Stored column value.
    #[must_use]
    pub const fn raw(self) -> i32 {
        match self {
            Self::Off => 0,
            Self::Full => 1,
            Self::SubjectsOnly => 2,
        }
    }

    /// Human-readable label for option listings.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Off => "No digest (single email per post)",
            Self::Full => "Complete digest (daily email with full posts)",
            Self::SubjectsOnly => "Subjects digest (daily email with subjects only)",
        }
    }
}

impl TryFrom<i32> for DigestMode {
    type Error = InvalidDigestMode;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Off),
            1 => Ok(Self::Full),
            2 => Ok(Self::SubjectsOnly),
            other => Err(InvalidDigestMode(other)),
        }
    }
}

/// Failures surfaced by digest preference operations.
#[derive(Debug, Error)]
pub enum DigestError {
    /// The supplied raw value is neither a mode nor the use-default sentinel.
    #[error(transparent)]
    InvalidMode(#[from] InvalidDigestMode),
    /// The store reported a failure.
    #[error(transparent)]
    Storage(#[from] diesel::result::Error),
}

/// Set a user's digest preference for one forum.
///
/// [`DIGEST_USE_DEFAULT`] deletes the per-forum row; a mode value upserts
/// it. Any other value is rejected before touching the store.
///
/// # Errors
/// Returns [`DigestError::InvalidMode`] for unknown values, or storage
/// failures.
pub async fn set_digest_option(
    conn: &mut DbConnection,
    user_id: i32,
    forum_id: i32,
    value: i32,
) -> Result<(), DigestError> {
    if value == DIGEST_USE_DEFAULT {
        db::delete_digest(conn, user_id, forum_id).await?;
        return Ok(());
    }
    let mode = DigestMode::try_from(value)?;
    db::upsert_digest(conn, user_id, forum_id, mode.raw()).await?;
    Ok(())
}

/// The digest mode actually in force for (user, forum).
///
/// A stored value that no longer parses as a mode is treated as absent
/// rather than failing the caller.
///
/// # Errors
/// Returns any error produced by the store lookup.
pub async fn effective_digest(
    conn: &mut DbConnection,
    user_id: i32,
    forum_id: i32,
    site_default: DigestMode,
) -> QueryResult<DigestMode> {
    let stored = db::get_digest_row(conn, user_id, forum_id).await?;
    Ok(stored
        .and_then(|raw| DigestMode::try_from(raw).ok())
        .unwrap_or(site_default))
}

/// The selectable options for a preference form, default first, then modes
/// in ascending raw order.
#[must_use]
pub fn digest_options(site_default: DigestMode) -> Vec<(i32, String)> {
    let mut options = vec![(
        DIGEST_USE_DEFAULT,
        format!("Default ({})", site_default.label()),
    )];
    for mode in [DigestMode::Off, DigestMode::Full, DigestMode::SubjectsOnly] {
        options.push((mode.raw(), mode.label().to_owned()));
    }
    options
}
