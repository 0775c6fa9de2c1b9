use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;

use tubecast::catalog::{Catalog, YouTubeClient};
use tubecast::config;

/// Look up channel ids by display name.
#[derive(Parser, Debug)]
struct Args {
    /// Path to YAML config
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Channel display name to search for
    name: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let query = args.name.join(" ");
    if query.trim().is_empty() {
        bail!("a channel name is required");
    }

    let cfg = config::load(Some(args.config.as_path()))?;
    let client = YouTubeClient::new(cfg.youtube.api_key.clone());

    let results = client.search_channels(query.trim()).await?;
    if results.is_empty() {
        println!("No channels found for {:?}", query.trim());
        return Ok(());
    }
    for c in results {
        println!("{}  {}", c.channel_id, c.channel_title);
        if !c.description.is_empty() {
            println!("    {}", c.description.lines().next().unwrap_or_default());
        }
    }
    Ok(())
}
