//! Binary entry point for the threadmail job runner.
//!
//! The batch logic lives in `threadmail::job`, so this binary only sets up
//! logging and delegates to the shared library code.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    threadmail::job::run().await
}
