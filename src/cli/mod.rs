//! CLI module - Command definitions and handlers
//!
//! Built-in commands are clap derives; the lookup commands (`character`,
//! `episode`, `location`) are generated from the [`lookup::LOOKUPS`] table.

use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgMatches, Args, Command, FromArgMatches, Subcommand};

use crate::core::seek::SeekError;
use crate::remote::ApiError;

pub mod config;
pub mod crawl;
pub mod init;
pub mod lookup;
pub mod render;
pub mod stats;
pub mod utils;

use lookup::{LookupRequest, LookupSpec, LOOKUPS};

/// Options shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path
    #[arg(long, global = true, env = "MEESEEKS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Database file path
    #[arg(long, global = true, env = "MEESEEKS_DATABASE")]
    pub db: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Crawl the catalog into the local cache, resuming where the last run stopped
    #[command(visible_alias = "initialize")]
    Crawl(crawl::CrawlArgs),

    /// Initialize a .meeseeks directory (config + cache)
    Init(init::InitArgs),

    /// Get or set configuration
    Config(config::ConfigArgs),

    /// Show cache statistics
    Stats(stats::StatsArgs),
}

/// What to run
#[derive(Debug)]
pub enum Action {
    Builtin(Commands),
    Lookup(&'static LookupSpec, LookupRequest),
}

/// A parsed command line
#[derive(Debug)]
pub struct Invocation {
    pub global: GlobalArgs,
    pub action: Action,
}

/// How a successful command ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Done,
    NoResults,
}

/// The full command tree
pub fn command() -> Command {
    let cmd = Command::new("meeseeks")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Rick and Morty catalog crawler and cache")
        .propagate_version(true)
        .subcommand_required(true)
        .arg_required_else_help(true);

    let cmd = GlobalArgs::augment_args(cmd);
    let cmd = Commands::augment_subcommands(cmd);
    cmd.subcommands(LOOKUPS.iter().map(LookupSpec::command))
}

impl Invocation {
    pub fn from_matches(matches: &ArgMatches) -> Result<Self, clap::Error> {
        let global = GlobalArgs::from_arg_matches(matches)?;

        if let Some((name, sub)) = matches.subcommand() {
            if let Some(spec) = LOOKUPS.iter().find(|spec| spec.name == name) {
                return Ok(Self {
                    global,
                    action: Action::Lookup(spec, spec.request(sub)),
                });
            }
        }

        Ok(Self {
            global,
            action: Action::Builtin(Commands::from_arg_matches(matches)?),
        })
    }
}

/// Parse the process arguments, exiting on usage errors
pub fn parse() -> Invocation {
    let matches = command().get_matches();
    Invocation::from_matches(&matches).unwrap_or_else(|e| e.exit())
}

/// Parse an explicit argument list
pub fn try_parse_from<I, T>(args: I) -> Result<Invocation, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let matches = command().try_get_matches_from(args)?;
    Invocation::from_matches(&matches)
}

/// Run a parsed invocation
pub async fn run(invocation: Invocation) -> Result<Outcome> {
    let global = invocation.global;
    match invocation.action {
        Action::Builtin(Commands::Crawl(args)) => crawl::run(&global, args).await,
        Action::Builtin(Commands::Init(args)) => init::run(args),
        Action::Builtin(Commands::Config(args)) => config::run(&global, args),
        Action::Builtin(Commands::Stats(args)) => stats::run(&global, args),
        Action::Lookup(spec, request) => lookup::run(&global, spec, request).await,
    }
}

/// Process exit code for a failed command
///
/// `2` usage, `4` remote API, `5` local store, `1` anything else.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if cause.downcast_ref::<SeekError>().is_some() {
            return 2;
        }
        if cause.downcast_ref::<ApiError>().is_some() {
            return 4;
        }
        if cause.downcast_ref::<rusqlite::Error>().is_some() {
            return 5;
        }
    }
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::seek::Criterion;

    #[test]
    fn test_command_tree_is_valid() {
        command().debug_assert();
    }

    #[test]
    fn test_lookup_flag_priority() {
        let inv = try_parse_from(["meeseeks", "episode", "--name", "--code", "S01E01"]).unwrap();
        match inv.action {
            Action::Lookup(spec, request) => {
                assert_eq!(spec.name, "episode");
                assert_eq!(request.criterion, Criterion::Code);
                assert_eq!(request.query, "S01E01");
            }
            other => panic!("unexpected action: {:?}", other),
        }

        let inv = try_parse_from(["meeseeks", "location", "Earth"]).unwrap();
        match inv.action {
            Action::Lookup(_, request) => assert_eq!(request.criterion, Criterion::Name),
            other => panic!("unexpected action: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_criterion_is_a_usage_error() {
        let err = try_parse_from(["meeseeks", "episode", "--dimension", "C-137"]).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_crawl_alias_and_globals() {
        let inv = try_parse_from(["meeseeks", "initialize", "--db", "x.db", "-v"]).unwrap();
        assert!(matches!(inv.action, Action::Builtin(Commands::Crawl(_))));
        assert!(inv.global.verbose);
        assert_eq!(inv.global.db, Some(PathBuf::from("x.db")));
    }

    #[test]
    fn test_exit_codes() {
        let api = anyhow::Error::new(ApiError::Http { status: 500 }).context("lookup failed");
        assert_eq!(exit_code(&api), 4);

        let seek = anyhow::Error::new(SeekError::InvalidId("x".to_string()));
        assert_eq!(exit_code(&seek), 2);

        let store = anyhow::Error::new(rusqlite::Error::InvalidQuery).context("open");
        assert_eq!(exit_code(&store), 5);

        assert_eq!(exit_code(&anyhow::anyhow!("boom")), 1);
    }
}
