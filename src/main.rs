//! bench-sweep CLI
//!
//! Runs a sweep of load-test scenarios against an inference server.

use anyhow::Result;
use bench_sweep::cli::Cli;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let (cli, dropped) = Cli::parse_lenient();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    for option in &dropped {
        tracing::warn!(option = %option, "Ignoring unknown option");
    }

    cli.run().await?;

    Ok(())
}
