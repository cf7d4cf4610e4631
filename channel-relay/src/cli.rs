//! CLI glue for channel-relay: argument parsing, collaborator wiring and the async entrypoint.
//!
//! All pipeline logic lives in `channel-relay-core`. This module only builds the concrete
//! feed, transformer and publisher from the loaded config and hands them to
//! [`channel_relay_core::relay::Relay`].
//!
//! - [`Cli`] / [`Commands`]: user-facing options
//! - [`run`]: programmatic entrypoint used by `main` and the integration tests
use crate::feed::TelegramFeed;
use crate::load_config::load_config;
use crate::publish::GraphPublisher;
use crate::transform::GeminiTransformer;
use anyhow::Result;
use channel_relay_core::audit::AuditStore;
use channel_relay_core::relay::Relay;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Relays recent channel posts to a page, rewriting captions on the way.
#[derive(Parser)]
#[clap(
    name = "channel-relay",
    version,
    about = "Relay recent channel posts to a page with rewritten captions"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one bounded relay batch
    Run {
        /// Optional YAML file overriding the run defaults
        #[clap(long)]
        config: Option<PathBuf>,
    },
}

/// Async CLI entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Run { config } => {
            let config = load_config(config.as_deref())?;
            tracing::info!(command = "run", "Starting relay run");

            let feed = TelegramFeed::new(&config.endpoints);
            let transformer =
                GeminiTransformer::new(&config.endpoints, &config.secrets.gemini_api_key);
            let publisher = GraphPublisher::new(
                &config.endpoints,
                &config.secrets.fb_page_id,
                &config.secrets.long_lived_user_token,
            );
            let store = AuditStore::new(&config.relay.audit_path);

            let relay = Relay::new(&config.relay, &feed, &transformer, &publisher);
            match relay.run(&store).await {
                Ok(report) => {
                    tracing::info!(command = "run", ?report, "Relay run complete");
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(command = "run", error = %e, "Relay run failed");
                    Err(anyhow::Error::new(e))
                }
            }
        }
    }
}
