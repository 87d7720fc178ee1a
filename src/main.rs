use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vcplayer::config::BotConfig;

/// Telegram voice chat music player
#[derive(Debug, Parser)]
#[command(name = "vcplayer", version, about)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "VCPLAYER_CONFIG", default_value = "vcplayer.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vcplayer=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config = BotConfig::load(&args.config)
        .with_context(|| format!("failed to load {}", args.config.display()))?;

    info!("Starting vcplayer with {} stream endpoints", config.stream.endpoints.len());

    for dir in [&config.download.dir, &config.thumbnail.cache_dir] {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    vcplayer::bot::run(config).await?;

    Ok(())
}
