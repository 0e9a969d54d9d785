//! Causality CLI entry point

use anyhow::Context;
use clap::Parser;
use tracing::{debug, error};

use causality_cli::{app::CausalityApp, cli::Cli, commands::CommandDispatcher, config::AppConfig};

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    setup_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Load configuration
    let config = AppConfig::load_with_overrides(
        cli.config.as_deref(),
        cli.api_url.clone(),
        cli.relay_url.clone(),
        cli.data_dir.clone(),
    )
    .context("Failed to load configuration")?;
    debug!("Event index: {}, relay: {}", config.api.base_url, config.relay.url);

    // Create application
    let app = CausalityApp::new(config).context("Failed to initialize")?;

    // Execute the command
    CommandDispatcher::execute(cli, app).await?;
    Ok(())
}

/// Setup logging based on verbosity level
fn setup_logging(verbose: bool) {
    let log_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .init();
}
