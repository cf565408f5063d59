//! `meeseeks crawl` command
//!
//! Imports the catalog into the local cache, resuming after the highest
//! episode already stored.
//!
//! # Usage
//! ```bash
//! meeseeks crawl                      # Resume with configured pacing
//! meeseeks crawl --delay-ms 500       # Faster
//! meeseeks crawl --max-episodes 5     # Only the next five episodes
//! ```

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::utils::Context;
use super::{GlobalArgs, Outcome};
use crate::core::crawl::{CrawlSettings, Crawler, StopReason};

#[derive(Args, Debug)]
pub struct CrawlArgs {
    /// Pause between episode requests (overrides crawl.delay_ms)
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// Episodes per committed batch (overrides crawl.batch_size)
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Stop after this many episodes (overrides crawl.max_episodes)
    #[arg(long)]
    pub max_episodes: Option<usize>,
}

impl CrawlArgs {
    fn settings(&self, base: CrawlSettings) -> CrawlSettings {
        CrawlSettings {
            delay: self
                .delay_ms
                .map(std::time::Duration::from_millis)
                .unwrap_or(base.delay),
            batch_size: self.batch_size.map(|n| n.max(1)).unwrap_or(base.batch_size),
            max_episodes: self.max_episodes.unwrap_or(base.max_episodes),
            max_retries: base.max_retries,
        }
    }
}

pub async fn run(global: &GlobalArgs, args: CrawlArgs) -> Result<Outcome> {
    let ctx = Context::load(global)?;
    let settings = args.settings(CrawlSettings::from(&ctx.config.crawl));
    let mut store = ctx.open_store()?;
    let client = ctx.client()?;

    println!(
        "{} {} into {}",
        "Crawling".bold(),
        client.base_url(),
        ctx.db_path.display()
    );

    let report = Crawler::new(&client, &mut store, settings)
        .run(|p| {
            let position = match p.total {
                Some(total) => format!("[{}/{}]", p.episode.remote_id, total),
                None => format!("[{}]", p.episode.remote_id),
            };
            println!(
                "{} {} {} {}",
                position.dimmed(),
                p.episode.code.cyan(),
                p.episode.name,
                format!("(+{} characters)", p.new_characters).dimmed()
            );
        })
        .await?;

    let stop = match report.stop {
        StopReason::EndOfCatalog => "end of catalog".green(),
        StopReason::IterationCap => "episode limit reached".yellow(),
    };
    println!(
        "\n{} {} episodes, {} characters, {} locations ({})",
        "Done:".green().bold(),
        report.episodes,
        report.characters,
        report.locations,
        stop
    );

    Ok(Outcome::Done)
}
