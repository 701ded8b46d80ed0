mod headless;

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use streamfall_core::{
    bootstrap::{init_services, load_config},
    logging,
    models::{ContentKey, MediaType},
    EngineEvent,
};

use headless::HeadlessEngine;

#[derive(Parser, Debug)]
#[command(name = "streamfall")]
#[command(about = "Stream source resolution and playback recovery", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve a playable source for one piece of content
    Resolve {
        /// Content id (e.g. a TMDB id)
        #[arg(long)]
        id: String,

        /// movie or tv
        #[arg(long = "type", default_value = "movie")]
        media_type: MediaType,

        #[arg(long, requires = "episode")]
        season: Option<u32>,

        #[arg(long, requires = "season")]
        episode: Option<u32>,

        /// Simulate this many fatal transport errors after the first load
        #[arg(long, default_value = "0")]
        fail: usize,

        /// Also fetch every provider's list and print it
        #[arg(long)]
        all: bool,
    },

    /// Show the enabled providers in priority order
    Providers,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config()?;
    logging::init_logging(&config.logging)?;
    let services = init_services(&config)?;

    match args.command {
        Command::Providers => {
            let providers = services.availability.resolve().await;
            println!("{}", serde_json::to_string_pretty(&providers)?);
        }
        Command::Resolve {
            id,
            media_type,
            season,
            episode,
            fail,
            all,
        } => {
            let content_key = ContentKey {
                content_id: id,
                media_type,
                season,
                episode,
            };

            let engine = Arc::new(HeadlessEngine::new());
            let controller = services.controller(engine.clone());
            let mut events = controller.subscribe();

            info!(content = %content_key, "Resolving");
            let mut outcome = controller.load(content_key).await;

            for attempt in 1..=fail {
                if outcome.is_err() {
                    break;
                }
                warn!(attempt, "Simulating fatal transport error");
                outcome = controller
                    .handle_engine_event(EngineEvent::FatalTransportError {
                        detail: format!("simulated failure {attempt}"),
                    })
                    .await;
            }

            while let Ok(event) = events.try_recv() {
                println!("{}", serde_json::to_string(&event)?);
            }

            if all {
                let lists = controller.prefetch_providers().await?;
                println!("{}", serde_json::to_string_pretty(&lists)?);
            }
            if let Some(snapshot) = controller.snapshot() {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            }

            if let Err(e) = outcome {
                anyhow::bail!("{e}");
            }
            // Untouched playhead keeps any earlier saved position
            if engine.progress().is_some() {
                controller.save_position().await?;
            }
            controller.unload();
        }
    }

    Ok(())
}
