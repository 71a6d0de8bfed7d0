//! herald binary: wire config, relays, generator and agent together,
//! then run the posting loop and DM listener until ctrl-c.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use herald::agent::Agent;
use herald::config::Config;
use herald::generator::{Generator, OpenRouterGenerator};
use herald::posting::run_posting_loop;
use herald::publisher::RelayPublisher;

#[derive(Parser, Debug)]
#[command(name = "herald", about = "Autonomous Nostr posting agent", version)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "herald.toml")]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let default_filter = if args.verbose { "herald=debug,info" } else { "herald=info,warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let config = Config::load(&args.config).context("failed to load config")?;
    let secret_key = Config::secret_key()?;
    let api_key = Config::api_key()?;
    let relays = Config::relays();
    let authorized = Config::authorized_pubkeys();

    let relay = Arc::new(
        RelayPublisher::connect(&relays, &secret_key)
            .await
            .context("failed to connect to relays")?,
    );
    tracing::info!("Agent pubkey: {}", relay.public_key());
    relay
        .set_metadata(&config.agent.name, "An autonomous posting agent")
        .await
        .context("failed to publish profile metadata")?;

    let generator = Arc::new(
        OpenRouterGenerator::new(&api_key, &Config::model_name(), &Config::base_url())
            .context("failed to build generator")?,
    );
    generator.set_system_prompt(&config.agent.personality);

    let agent = Arc::new(Agent::new(
        &config.agent.name,
        generator,
        Arc::clone(&relay) as Arc<dyn herald::publisher::Publisher>,
        &config.safety_settings(),
        authorized,
        config.guidance.enabled,
        config.guidance.commands_enabled,
        config.posting.interval_minutes,
    ));

    let cancel = CancellationToken::new();
    let (tx, mut rx) = mpsc::channel(32);

    let listener = {
        let relay = Arc::clone(&relay);
        let cancel = cancel.clone();
        tokio::spawn(async move { relay.listen(tx, cancel).await })
    };

    let dispatcher = {
        let agent = Arc::clone(&agent);
        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                agent.handle_message(&message).await;
            }
        })
    };

    let poster = tokio::spawn(run_posting_loop(Arc::clone(&agent), cancel.clone()));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    tracing::info!("Shutting down...");
    cancel.cancel();

    match listener.await {
        Ok(Err(e)) => tracing::warn!("DM listener exited with error: {}", e),
        Err(e) => tracing::warn!("DM listener task panicked: {}", e),
        _ => {}
    }
    // The listener dropped its sender, so the dispatcher drains and exits
    let _ = dispatcher.await;
    let _ = poster.await;
    relay.disconnect().await;

    tracing::info!("Goodbye");
    Ok(())
}
