use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod api;
mod auth;
mod cli;
mod config;
mod duration;
mod error;
mod fetcher;
mod filter;
mod models;
mod pipeline;
mod remover;
mod resolver;
#[cfg(test)]
mod testing;

use api::YouTubeClient;
use auth::Authenticator;
use cli::Cli;
use config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli).context("Failed to load configuration")?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.log_filter))
        .with_target(false)
        .init();

    println!("{}", pipeline::render_banner(&config.run));

    // Authentication failures end the run before any API work
    let authenticator = Authenticator::new(config.auth.clone(), config.api.timeout)
        .context("Failed to set up authentication")?;
    let access_token = authenticator
        .access_token()
        .await
        .context("Authentication failed")?;
    info!("Authenticated with YouTube");

    let client = YouTubeClient::new(&config.api.base_url, access_token, config.api.timeout)?;
    let classifier = config.run.classifier.build(&config.run.quota_keyword);

    let report = pipeline::run(&client, &config.run, classifier.as_ref())
        .await
        .context("Run aborted")?;

    print!("{}", pipeline::render_report(&report, &config.run, &cli));

    if report.has_fatal_interruption() {
        warn!("Run stopped on an unrecoverable error");
        anyhow::bail!("run stopped on an unrecoverable API error");
    }

    Ok(())
}
