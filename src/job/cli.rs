//! Command-line interface definitions for the threadmail job runner.
//!
//! Keeping these types in the library lets every binary expose an identical
//! configuration surface.

#![expect(
    non_snake_case,
    reason = "Clap/OrthoConfig derive macros generate helper modules with uppercase names"
)]
#![allow(
    missing_docs,
    reason = "OrthoConfig and Clap derive macros generate items that cannot be documented"
)]
#![allow(
    unfulfilled_lint_expectations,
    reason = "derive macros conditionally generate items"
)]

use clap::{Args, Parser, Subcommand};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

/// Arguments for the `set-digest` administrative subcommand.
#[expect(
    missing_docs,
    reason = "OrthoConfig derive macro generates items that cannot be documented"
)]
#[derive(Parser, OrthoConfig, Deserialize, Serialize, Default, Debug, Clone)]
#[ortho_config(prefix = "THREADMAIL_")]
pub struct SetDigestArgs {
    /// User the preference belongs to.
    pub user_id: Option<i32>,
    /// Forum the preference applies to.
    pub forum_id: Option<i32>,
    /// Digest value: 0 off, 1 full, 2 subjects only, -1 use the site
    /// default.
    pub value: Option<i32>,
}

/// CLI subcommands exposed by `threadmail`.
#[derive(Subcommand, Deserialize, Serialize, Debug, Clone)]
pub enum Commands {
    /// Process the window of unmailed posts.
    #[command(name = "run-pending")]
    RunPending,
    /// Flush queued digest entries.
    #[command(name = "run-digests")]
    RunDigests,
    /// Set a user's per-forum digest preference.
    #[command(name = "set-digest")]
    SetDigest(SetDigestArgs),
}

/// Runtime configuration shared by all binaries.
#[expect(
    missing_docs,
    reason = "OrthoConfig derive macro generates items that cannot be documented"
)]
#[derive(Args, OrthoConfig, Serialize, Deserialize, Default, Debug, Clone)]
#[ortho_config(prefix = "THREADMAIL_")]
pub struct AppConfig {
    /// Database connection string or path.
    #[ortho_config(default = "threadmail.db".to_owned())]
    #[arg(long, default_value_t = String::from("threadmail.db"))]
    pub database: String,
    /// Seconds a post is held back so its author can still edit it.
    #[ortho_config(default = 1800_i64)]
    #[arg(long, default_value_t = 1800)]
    pub edit_grace_secs: i64,
    /// Seconds after which an unmailed post is abandoned rather than mailed
    /// late.
    #[ortho_config(default = 172_800_i64)]
    #[arg(long, default_value_t = 172_800)]
    pub max_mailing_age_secs: i64,
    /// Site-wide default digest mode: 0 off, 1 full, 2 subjects only.
    #[ortho_config(default = 0)]
    #[arg(long, default_value_t = 0)]
    pub site_digest: i32,
}

/// Top-level CLI entry point consumed by binaries.
#[derive(Parser, Deserialize, Serialize, Debug, Clone)]
pub struct Cli {
    /// Application configuration.
    #[command(flatten)]
    pub config: AppConfig,
    /// Optional subcommand.
    #[command(subcommand)]
    pub command: Option<Commands>,
}
