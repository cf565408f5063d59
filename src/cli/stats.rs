//! Stats command - Show cache statistics

use clap::Args;
use colored::Colorize;

use super::utils::Context;
use super::{GlobalArgs, Outcome};

/// Stats command arguments
#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute stats command
pub fn run(global: &GlobalArgs, args: StatsArgs) -> anyhow::Result<Outcome> {
    let ctx = Context::load(global)?;
    let store = ctx.open_store()?;
    let stats = store.stats()?;

    if args.json {
        let json = serde_json::json!({
            "episodes": stats.episodes,
            "characters": stats.characters,
            "locations": stats.locations,
            "appearances": stats.appearances,
            "highest_episode": stats.highest_episode,
            "database": ctx.db_path.display().to_string(),
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else {
        println!("{}\n", "Cache Statistics".bold());
        println!("  Episodes:     {}", stats.episodes);
        println!("  Characters:   {}", stats.characters);
        println!("  Locations:    {}", stats.locations);
        println!("  Appearances:  {}", stats.appearances);
        if stats.highest_episode > 0 {
            println!(
                "\n  Next crawl resumes at episode {}",
                (stats.highest_episode + 1).to_string().cyan()
            );
        } else {
            println!("\n  Nothing crawled yet. Run {}", "meeseeks crawl".cyan());
        }

        println!("\nDatabase: {}", ctx.db_path.display());
    }

    Ok(Outcome::Done)
}
