//! Crawl - sequential, resumable import of the catalog
//!
//! Walks episodes upward from the highest one already cached, storing each
//! episode with the characters it references and their locations.
//!
//! # Key Points
//! - Resumes at `highest cached episode + 1`
//! - The first "not found" episode ends the crawl successfully
//! - Characters never pull in their episodes (no recursion)
//! - Every `batch_size` episodes the open transaction is committed; a fatal
//!   error rolls back only the open batch

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::model::{Character, Episode, Kind, Location};
use super::storage::Store;
use crate::config::CrawlConfig;
use crate::remote::{ApiEpisode, ApiError, Catalog};

/// Pacing and guards for a crawl
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    /// Pause between episode fetches and between retries
    pub delay: Duration,
    pub batch_size: usize,
    pub max_episodes: usize,
    pub max_retries: u32,
}

impl From<&CrawlConfig> for CrawlSettings {
    fn from(config: &CrawlConfig) -> Self {
        Self {
            delay: Duration::from_millis(config.delay_ms),
            batch_size: config.batch_size.max(1),
            max_episodes: config.max_episodes,
            max_retries: config.max_retries,
        }
    }
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self::from(&CrawlConfig::default())
    }
}

/// Why a crawl stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The catalog answered "not found" for the next episode
    EndOfCatalog,
    /// `max_episodes` reached
    IterationCap,
}

/// Summary of a finished crawl
#[derive(Debug, Clone, Serialize)]
pub struct CrawlReport {
    pub started_at: DateTime<Utc>,
    /// First episode id requested
    pub resumed_at: i64,
    /// Records created by this run
    pub episodes: usize,
    pub characters: usize,
    pub locations: usize,
    pub stop: StopReason,
}

/// Emitted after each stored episode
#[derive(Debug)]
pub struct Progress<'e> {
    pub episode: &'e Episode,
    pub new_characters: usize,
    /// Episodes the catalog reports, when known
    pub total: Option<u64>,
}

#[derive(Debug, Default)]
struct Tally {
    episodes: usize,
    characters: usize,
    locations: usize,
}

/// Crawls the catalog into the store
pub struct Crawler<'a, C: Catalog> {
    api: &'a C,
    store: &'a mut Store,
    settings: CrawlSettings,
    tally: Tally,
}

impl<'a, C: Catalog> Crawler<'a, C> {
    pub fn new(api: &'a C, store: &'a mut Store, settings: CrawlSettings) -> Self {
        Self {
            api,
            store,
            settings,
            tally: Tally::default(),
        }
    }

    /// Run until the end of the catalog or the iteration cap
    pub async fn run(&mut self, mut on_episode: impl FnMut(&Progress)) -> Result<CrawlReport> {
        let started_at = Utc::now();
        self.tally = Tally::default();

        let resumed_at = self.store.highest_episode_remote_id()? + 1;
        let total = match self.api.episode_count().await {
            Ok(count) => count,
            Err(e) => {
                warn!(error = %e, "could not read the episode count, continuing without a total");
                None
            }
        };
        info!(resumed_at, ?total, "crawl starting");

        match self.crawl_from(resumed_at, total, &mut on_episode).await {
            Ok(stop) => {
                self.store.commit()?;
                self.store.clear();
                info!(
                    episodes = self.tally.episodes,
                    characters = self.tally.characters,
                    locations = self.tally.locations,
                    ?stop,
                    "crawl finished"
                );
                Ok(CrawlReport {
                    started_at,
                    resumed_at,
                    episodes: self.tally.episodes,
                    characters: self.tally.characters,
                    locations: self.tally.locations,
                    stop,
                })
            }
            Err(e) => {
                if let Err(rollback) = self.store.rollback() {
                    warn!(error = %rollback, "rollback failed");
                }
                error!(error = %e, "crawl aborted, open batch discarded");
                Err(e)
            }
        }
    }

    async fn crawl_from(
        &mut self,
        start: i64,
        total: Option<u64>,
        on_episode: &mut impl FnMut(&Progress),
    ) -> Result<StopReason> {
        let api = self.api;
        let mut pending = 0;

        for (iteration, id) in (start..).take(self.settings.max_episodes).enumerate() {
            if iteration > 0 {
                tokio::time::sleep(self.settings.delay).await;
            }

            let Some(dto) = with_retry(&self.settings, "episode", || api.episode(id)).await? else {
                info!(episode = id, "catalog exhausted");
                return Ok(StopReason::EndOfCatalog);
            };

            self.store.begin()?;
            let before = self.tally.characters;
            let episode = self.persist_episode(dto).await?;
            pending += 1;

            if pending >= self.settings.batch_size {
                self.store.commit()?;
                self.store.clear();
                info!(episode = id, size = pending, "batch committed");
                pending = 0;
            }

            on_episode(&Progress {
                episode: &episode,
                new_characters: self.tally.characters - before,
                total,
            });
        }

        warn!(
            max_episodes = self.settings.max_episodes,
            "iteration cap reached, stopping crawl"
        );
        Ok(StopReason::IterationCap)
    }

    /// Store an episode with its cast, fetching characters not yet cached
    async fn persist_episode(&mut self, dto: ApiEpisode) -> Result<Episode> {
        let mut episode = Episode::from(dto);

        let existed = self.store.local_id(Kind::Episode, episode.remote_id)?.is_some();
        let episode_id = self.store.insert_episode(&episode)?;
        episode.local_id = Some(episode_id);
        if !existed {
            self.tally.episodes += 1;
        }

        let mut cast = Vec::with_capacity(episode.character_ids.len());
        let mut missing = Vec::new();
        for remote_id in &episode.character_ids {
            match self.store.local_id(Kind::Character, *remote_id)? {
                Some(id) => cast.push(id),
                None => missing.push(*remote_id),
            }
        }

        if !missing.is_empty() {
            let api = self.api;
            let fetched = with_retry(&self.settings, "characters", || api.characters(&missing)).await?;

            for remote_id in &missing {
                if !fetched.iter().any(|c| c.id == *remote_id) {
                    warn!(
                        episode = episode.remote_id,
                        character = remote_id,
                        "dangling character reference, skipped"
                    );
                }
            }

            for dto in fetched {
                let character = Character::from(dto);
                // repeated reference within the same episode
                if let Some(id) = self.store.local_id(Kind::Character, character.remote_id)? {
                    cast.push(id);
                    continue;
                }

                let places: Vec<i64> = [&character.origin, &character.location]
                    .into_iter()
                    .flatten()
                    .map(|r| r.remote_id)
                    .collect();
                for place in places {
                    self.ensure_location(place).await?;
                }

                cast.push(self.store.insert_character(&character)?);
                self.tally.characters += 1;
            }
        }

        for character_id in cast {
            self.store.link(character_id, episode_id)?;
        }

        info!(episode = %episode.code, name = %episode.name, "episode stored");
        Ok(episode)
    }

    /// Make sure a referenced location is cached, local first
    async fn ensure_location(&mut self, remote_id: i64) -> Result<()> {
        if self.store.local_id(Kind::Location, remote_id)?.is_some() {
            return Ok(());
        }

        let api = self.api;
        match with_retry(&self.settings, "location", || api.location(remote_id)).await? {
            Some(dto) => {
                self.store.insert_location(&Location::from(dto))?;
                self.tally.locations += 1;
                debug!(location = remote_id, "location stored");
            }
            None => warn!(
                location = remote_id,
                "dangling location reference, stored as NULL"
            ),
        }
        Ok(())
    }
}

/// Retry transient failures up to `max_retries` times, pausing `delay` in between
async fn with_retry<T, F, Fut>(settings: &CrawlSettings, what: &str, mut op: F) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Err(e) if e.is_transient() && attempt < settings.max_retries => {
                attempt += 1;
                warn!(request = what, attempt, error = %e, "transient failure, retrying");
                tokio::time::sleep(settings.delay).await;
            }
            other => return other,
        }
    }
}
