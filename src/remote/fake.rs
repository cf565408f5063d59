//! In-memory catalog for tests

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use super::*;

const BASE: &str = "https://rickandmortyapi.com/api";

pub fn url(resource: &str, id: i64) -> String {
    format!("{}/{}/{}", BASE, resource, id)
}

/// Scripted failure for one episode id
#[derive(Debug, Clone, Copy)]
struct Failure {
    status: u16,
    /// `None` fails forever
    remaining: Option<usize>,
}

#[derive(Default)]
pub struct FakeCatalog {
    pub episodes: BTreeMap<i64, ApiEpisode>,
    pub characters: BTreeMap<i64, ApiCharacter>,
    pub locations: BTreeMap<i64, ApiLocation>,
    failures: RefCell<HashMap<i64, Failure>>,
    calls: RefCell<Vec<String>>,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_location(mut self, id: i64, name: &str, dimension: &str) -> Self {
        self.locations.insert(
            id,
            ApiLocation {
                id,
                name: name.to_string(),
                kind: "Planet".to_string(),
                dimension: dimension.to_string(),
                residents: Vec::new(),
                url: url("location", id),
                created: Utc.with_ymd_and_hms(2017, 11, 10, 12, 42, 4).unwrap(),
            },
        );
        self
    }

    pub fn with_character(
        mut self,
        id: i64,
        name: &str,
        origin: Option<i64>,
        location: Option<i64>,
    ) -> Self {
        let link = |loc: Option<i64>, locations: &BTreeMap<i64, ApiLocation>| match loc {
            Some(loc) => ApiLink {
                name: locations
                    .get(&loc)
                    .map(|l| l.name.clone())
                    .unwrap_or_default(),
                url: url("location", loc),
            },
            None => ApiLink {
                name: "unknown".to_string(),
                url: String::new(),
            },
        };

        let character = ApiCharacter {
            id,
            name: name.to_string(),
            status: "Alive".to_string(),
            species: "Human".to_string(),
            kind: String::new(),
            gender: "Male".to_string(),
            origin: link(origin, &self.locations),
            location: link(location, &self.locations),
            image: format!("{}/character/avatar/{}.jpeg", BASE, id),
            episode: Vec::new(),
            url: url("character", id),
            created: Utc.with_ymd_and_hms(2017, 11, 4, 18, 48, 46).unwrap(),
        };

        if let Some(loc) = location.and_then(|l| self.locations.get_mut(&l)) {
            loc.residents.push(url("character", id));
        }
        self.characters.insert(id, character);
        self
    }

    pub fn with_episode(mut self, id: i64, code: &str, name: &str, characters: &[i64]) -> Self {
        for c in characters {
            if let Some(character) = self.characters.get_mut(c) {
                character.episode.push(url("episode", id));
            }
        }
        self.episodes.insert(
            id,
            ApiEpisode {
                id,
                name: name.to_string(),
                air_date: "December 2, 2013".to_string(),
                episode: code.to_string(),
                characters: characters.iter().map(|c| url("character", *c)).collect(),
                url: url("episode", id),
                created: Utc.with_ymd_and_hms(2017, 11, 10, 12, 56, 33).unwrap(),
            },
        );
        self
    }

    /// Make `episode(id)` fail with `status`, `times` times (`None` = forever)
    pub fn fail_episode(&self, id: i64, status: u16, times: Option<usize>) {
        self.failures.borrow_mut().insert(
            id,
            Failure {
                status,
                remaining: times,
            },
        );
    }

    /// Every call made so far, e.g. `"episode 3"`
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    pub fn reset_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    fn record(&self, call: String) {
        self.calls.borrow_mut().push(call);
    }

    fn scripted_failure(&self, id: i64) -> Option<ApiError> {
        let mut failures = self.failures.borrow_mut();
        let failure = failures.get_mut(&id)?;
        match failure.remaining {
            Some(0) => None,
            Some(ref mut n) => {
                *n -= 1;
                Some(ApiError::Http {
                    status: failure.status,
                })
            }
            None => Some(ApiError::Http {
                status: failure.status,
            }),
        }
    }
}

fn contains(haystack: &str, needle: &Option<String>) -> bool {
    match needle {
        Some(n) => haystack.to_lowercase().contains(&n.to_lowercase()),
        None => true,
    }
}

#[async_trait(?Send)]
impl Catalog for FakeCatalog {
    async fn episode(&self, id: i64) -> Result<Option<ApiEpisode>, ApiError> {
        self.record(format!("episode {}", id));
        if let Some(err) = self.scripted_failure(id) {
            return Err(err);
        }
        Ok(self.episodes.get(&id).cloned())
    }

    async fn character(&self, id: i64) -> Result<Option<ApiCharacter>, ApiError> {
        self.record(format!("character {}", id));
        Ok(self.characters.get(&id).cloned())
    }

    async fn location(&self, id: i64) -> Result<Option<ApiLocation>, ApiError> {
        self.record(format!("location {}", id));
        Ok(self.locations.get(&id).cloned())
    }

    async fn characters(&self, ids: &[i64]) -> Result<Vec<ApiCharacter>, ApiError> {
        let list: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        self.record(format!("characters {}", list.join(",")));
        Ok(ids
            .iter()
            .filter_map(|id| self.characters.get(id).cloned())
            .collect())
    }

    async fn find_episodes(&self, filter: &EpisodeFilter) -> Result<Vec<ApiEpisode>, ApiError> {
        self.record(format!("find_episodes {:?}", filter));
        Ok(self
            .episodes
            .values()
            .filter(|e| contains(&e.name, &filter.name) && contains(&e.episode, &filter.episode))
            .cloned()
            .collect())
    }

    async fn find_locations(&self, filter: &LocationFilter) -> Result<Vec<ApiLocation>, ApiError> {
        self.record(format!("find_locations {:?}", filter));
        Ok(self
            .locations
            .values()
            .filter(|l| {
                contains(&l.name, &filter.name) && contains(&l.dimension, &filter.dimension)
            })
            .cloned()
            .collect())
    }

    async fn find_characters(
        &self,
        filter: &CharacterFilter,
    ) -> Result<Vec<ApiCharacter>, ApiError> {
        self.record(format!("find_characters {:?}", filter));
        Ok(self
            .characters
            .values()
            .filter(|c| contains(&c.name, &filter.name))
            .cloned()
            .collect())
    }

    async fn episode_count(&self) -> Result<Option<u64>, ApiError> {
        self.record("episode_count".to_string());
        Ok(Some(self.episodes.len() as u64))
    }
}
