//! Lookup commands - `character`, `episode`, `location`
//!
//! Each command is one row of [`LOOKUPS`]: which kind it seeks, the criterion
//! flags in priority order, how the search string is cleaned and how the
//! resulting characters are shown.
//!
//! # Usage
//! ```bash
//! meeseeks character "Rick Sanchez"
//! meeseeks episode --code S01E02
//! meeseeks location --dimension "Dimension C-137"
//! ```

use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command};
use colored::Colorize;
use tracing::debug;

use super::render;
use super::utils::Context;
use super::{GlobalArgs, Outcome};
use crate::core::model::Kind;
use crate::core::seek::{Criterion, Lookup, Seek};

/// How matched characters are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Render {
    /// One name per line
    Names,
    Table,
}

/// A lookup command
#[derive(Debug)]
pub struct LookupSpec {
    pub name: &'static str,
    pub about: &'static str,
    pub kind: Kind,
    /// Highest priority first; the last one is the default
    pub criteria: &'static [Criterion],
    pub sanitize: fn(&str) -> String,
    pub render: Render,
    pub examples: &'static str,
}

pub static LOOKUPS: &[LookupSpec] = &[
    LookupSpec {
        name: "character",
        about: "Find characters by id or name",
        kind: Kind::Character,
        criteria: &[Criterion::Id, Criterion::Name],
        sanitize: trimmed,
        render: Render::Table,
        examples: "Examples:\n  meeseeks character Rick\n  meeseeks character --id 1",
    },
    LookupSpec {
        name: "episode",
        about: "List the characters of matching episodes",
        kind: Kind::Episode,
        criteria: &[Criterion::Id, Criterion::Code, Criterion::Name],
        sanitize: word_chars,
        render: Render::Names,
        examples: "Examples:\n  meeseeks episode Pilot\n  meeseeks episode --code S01E02\n  meeseeks episode --id 28",
    },
    LookupSpec {
        name: "location",
        about: "Show the residents of matching locations",
        kind: Kind::Location,
        criteria: &[Criterion::Id, Criterion::Dimension, Criterion::Name],
        sanitize: trimmed,
        render: Render::Table,
        examples: "Examples:\n  meeseeks location Earth\n  meeseeks location --dimension \"Dimension C-137\"",
    },
];

/// Criterion and search string picked from the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRequest {
    pub criterion: Criterion,
    pub query: String,
}

impl LookupSpec {
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(self.name)
            .about(self.about)
            .after_help(self.examples)
            .arg(
                Arg::new("query")
                    .value_name("SEARCH")
                    .help("What to look for")
                    .required(true),
            );

        for criterion in self.criteria {
            cmd = cmd.arg(
                Arg::new(criterion.flag())
                    .long(criterion.flag())
                    .help(criterion.help())
                    .action(ArgAction::SetTrue),
            );
        }
        cmd
    }

    /// The highest-priority flag given, or the default criterion
    pub fn request(&self, matches: &ArgMatches) -> LookupRequest {
        let criterion = self
            .criteria
            .iter()
            .copied()
            .find(|c| matches.get_flag(c.flag()))
            .unwrap_or_else(|| self.default_criterion());

        LookupRequest {
            criterion,
            query: matches.get_one::<String>("query").cloned().unwrap_or_default(),
        }
    }

    pub fn default_criterion(&self) -> Criterion {
        self.criteria.last().copied().unwrap_or(Criterion::Name)
    }
}

fn trimmed(raw: &str) -> String {
    raw.trim().to_string()
}

/// Keep letters, digits, underscores and whitespace
fn word_chars(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Execute a lookup command
pub async fn run(global: &GlobalArgs, spec: &LookupSpec, request: LookupRequest) -> Result<Outcome> {
    let query = (spec.sanitize)(&request.query);
    let seek = Seek::build(spec.kind, request.criterion, &query)?;

    let ctx = Context::load(global)?;
    let store = ctx.open_store()?;
    let client = ctx.client()?;
    let lookup = Lookup::new(&store, &client);

    let hits = lookup.seek(&seek).await?;
    eprintln!("{}", format!("(from {})", hits.target).dimmed());
    for record in &hits.records {
        debug!(kind = %record.kind(), id = record.remote_id(), name = record.name(), "matched");
    }

    let characters = lookup.characters_of_all(&hits.records).await?;
    if characters.is_empty() {
        println!("No results found");
        return Ok(Outcome::NoResults);
    }

    match spec.render {
        Render::Names => print!("{}", render::names(&characters)),
        Render::Table => println!("{}", render::table(&lookup, &characters).await?),
    }
    Ok(Outcome::Done)
}
