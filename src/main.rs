//! meeseeks CLI - Entry point
//!
//! Usage: meeseeks [-v] [--db PATH] <command> [options]

use std::process::ExitCode;

use colored::Colorize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use meeseeks::cli::{self, Outcome};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let invocation = cli::parse();

    // RUST_LOG wins over -v
    let default_filter = if invocation.global.verbose {
        "meeseeks=debug"
    } else {
        "meeseeks=warn"
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .init();

    match cli::run(invocation).await {
        Ok(Outcome::Done) => ExitCode::SUCCESS,
        Ok(Outcome::NoResults) => ExitCode::from(3),
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::from(cli::exit_code(&e))
        }
    }
}
