//! Injected host-platform interfaces: capability checks and visibility.
//!
//! The hosting platform owns permissions and activity visibility. This crate
//! consumes them as opaque oracles so the subscription rules stay testable
//! without the host's permission engine.

use crate::models::{Forum, User};

/// Capabilities consulted by the subscription rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// The user may read discussions in the forum; gates recipient
    /// eligibility when subscription is forced.
    ViewDiscussion,
    /// The user may be force-subscribed; gates the forced-mode bypass and
    /// automatic subscription to initial-subscribe forums.
    AllowForceSubscribe,
}

/// Module-level context a capability is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Context {
    /// Host context identifier for the forum instance.
    pub id: i32,
}

impl Context {
    /// Context for the given forum's host identifier.
    #[must_use]
    pub const fn new(id: i32) -> Self { Self { id } }
}

/// The acting user, passed explicitly instead of read from ambient state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    /// User id of the actor.
    pub id: i32,
    /// Whether the actor has an authenticated session.
    pub authenticated: bool,
    /// Whether the actor is the site guest account.
    pub guest: bool,
}

/// Opaque boolean oracle for host permission checks.
pub trait CapabilityOracle {
    /// Whether `user` holds `capability` in `context`.
    fn has_capability(&self, capability: Capability, context: &Context, user: i32) -> bool;
}

/// Strips users who cannot see a hidden or restricted forum.
pub trait VisibilityFilter {
    /// Retain only the users allowed to see `forum`.
    fn filter_user_list(&self, users: Vec<User>, forum: &Forum) -> Vec<User>;
}

/// Oracle granting every capability; useful for tests and trusted callers.
#[derive(Debug, Default, Clone, Copy)]
pub struct GrantAll;

impl CapabilityOracle for GrantAll {
    fn has_capability(&self, _capability: Capability, _context: &Context, _user: i32) -> bool {
        true
    }
}

/// Visibility filter that hides invisible forums from everyone and shows
/// visible forums to everyone.
#[derive(Debug, Default, Clone, Copy)]
pub struct VisibleOnly;

impl VisibilityFilter for VisibleOnly {
    fn filter_user_list(&self, users: Vec<User>, forum: &Forum) -> Vec<User> {
        if forum.visible { users } else { Vec::new() }
    }
}
