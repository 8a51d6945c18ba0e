//! Job orchestration for the threadmail binary.
//!
//! This module exposes the command-line interface and the batch entry points
//! so the binary stays a thin wrapper that only needs to call [`run`].

pub mod cli;

use anyhow::{Context as _, Result};
use chrono::{Duration, Utc};
use clap::Parser;
use diesel_async::AsyncConnection;
use ortho_config::load_and_merge_subcommand_for;
use tracing::info;

pub use self::cli::{AppConfig, Cli, Commands, SetDigestArgs};
use crate::{
    capability::{GrantAll, VisibleOnly},
    db::{DbConnection, DbPool, apply_migrations, establish_pool},
    digest::{DigestMode, set_digest_option},
    dispatch::{
        DeliveryError,
        Dispatcher,
        DispatchWindow,
        MailTransport,
        SendUnit,
    },
};

/// Parse CLI arguments and execute the requested command.
///
/// # Errors
///
/// Returns any error emitted while parsing configuration or running the
/// requested pass.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    run_with_cli(cli).await
}

/// Execute the job logic using an already parsed [`Cli`].
///
/// Without a subcommand both passes run: pending posts first, then the
/// digest flush, so posts queued by the first pass with an already-elapsed
/// boundary go out in the same invocation.
///
/// # Errors
///
/// Propagates any failure reported by the selected pass.
pub async fn run_with_cli(cli: Cli) -> Result<()> {
    let Cli { config, command } = cli;
    match command {
        Some(Commands::RunPending) => run_pending(&config).await,
        Some(Commands::RunDigests) => run_digests(&config).await,
        Some(Commands::SetDigest(args)) => run_set_digest(args, &config).await,
        None => {
            run_pending(&config).await?;
            run_digests(&config).await
        }
    }
}

/// Transport that logs each send instead of mailing it. The host platform
/// supplies a real transport; the standalone binary only reports what it
/// would deliver.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTransport;

#[async_trait::async_trait]
impl MailTransport for LogTransport {
    async fn deliver(&mut self, unit: SendUnit) -> Result<(), DeliveryError> {
        match unit {
            SendUnit::Immediate(send) => {
                info!(
                    user = %send.user.username,
                    post_id = send.post.id,
                    subject = %send.rendering.subject,
                    "would send post"
                );
            }
            SendUnit::Digest(send) => {
                info!(
                    user = %send.user.username,
                    items = send.items.len(),
                    "would send digest"
                );
            }
        }
        Ok(())
    }
}

fn dispatch_window(cfg: &AppConfig) -> DispatchWindow {
    DispatchWindow {
        edit_grace: Duration::seconds(cfg.edit_grace_secs),
        max_mailing_age: Duration::seconds(cfg.max_mailing_age_secs),
    }
}

fn site_digest(cfg: &AppConfig) -> Result<DigestMode> {
    DigestMode::try_from(cfg.site_digest)
        .with_context(|| format!("invalid site_digest value {}", cfg.site_digest))
}

async fn setup_database(database: &str) -> Result<DbPool> {
    let pool = establish_pool(database)
        .await
        .context("failed to create database pool")?;
    let mut conn = pool.get().await.context("failed to get db connection")?;
    apply_migrations(&mut conn, database)
        .await
        .context("failed to run migrations")?;
    drop(conn);
    Ok(pool)
}

async fn run_pending(cfg: &AppConfig) -> Result<()> {
    let pool = setup_database(&cfg.database).await?;
    let mut conn = pool.get().await.context("failed to get db connection")?;
    let dispatcher = Dispatcher::new(&GrantAll, &VisibleOnly, dispatch_window(cfg), site_digest(cfg)?);
    let mut transport = LogTransport;
    let summary = dispatcher
        .run_pending(&mut conn, &mut transport, Utc::now().naive_utc())
        .await?;
    println!(
        "pending pass: {} posts, {} sent, {} queued, {} failures",
        summary.posts, summary.sent, summary.queued, summary.failures
    );
    Ok(())
}

async fn run_digests(cfg: &AppConfig) -> Result<()> {
    let pool = setup_database(&cfg.database).await?;
    let mut conn = pool.get().await.context("failed to get db connection")?;
    let dispatcher = Dispatcher::new(&GrantAll, &VisibleOnly, dispatch_window(cfg), site_digest(cfg)?);
    let mut transport = LogTransport;
    let summary = dispatcher
        .run_digests(&mut conn, &mut transport, Utc::now().naive_utc())
        .await?;
    println!(
        "digest pass: {} users, {} items, {} failures",
        summary.users, summary.items, summary.failures
    );
    Ok(())
}

async fn run_set_digest(args: SetDigestArgs, cfg: &AppConfig) -> Result<()> {
    let args = load_and_merge_subcommand_for::<SetDigestArgs>(&args)?;
    let user_id = args.user_id.ok_or_else(|| anyhow::anyhow!("missing user id"))?;
    let forum_id = args
        .forum_id
        .ok_or_else(|| anyhow::anyhow!("missing forum id"))?;
    let value = args.value.ok_or_else(|| anyhow::anyhow!("missing value"))?;

    let mut conn = DbConnection::establish(&cfg.database).await?;
    apply_migrations(&mut conn, &cfg.database).await?;
    set_digest_option(&mut conn, user_id, forum_id, value).await?;
    println!("Digest preference updated for user {user_id}");
    Ok(())
}
