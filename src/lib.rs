//! Core library for the threadmail subscription and dispatch engine.
//!
//! This crate tracks who is subscribed to which forums and discussions,
//! resolves per-user digest preferences, and drives the batch passes that
//! turn unmailed posts into individual sends or daily digests. Only one
//! database backend (either `sqlite` or `postgres`) should be enabled at a
//! time.
cfg_if::cfg_if! {
    if #[cfg(all(feature = "sqlite", feature = "postgres", not(feature = "lint")))] {
        compile_error!("Choose either sqlite or postgres, not both");
    } else if #[cfg(feature = "sqlite")] {
        pub use diesel::sqlite::Sqlite as DbBackend;
    } else if #[cfg(feature = "postgres")] {
        pub use diesel::pg::Pg as DbBackend;
    } else {
        compile_error!("Either the 'sqlite' or 'postgres' feature must be enabled");
    }
}

pub mod capability;
pub mod db;
pub mod digest;
pub mod dispatch;
pub mod events;
pub mod job;
pub mod models;
pub mod observers;
pub mod schema;
pub mod subscriptions;
