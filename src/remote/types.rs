//! Remote API types
//!
//! DTOs for the catalog API, shaped after its JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

// ============== Resources ==============

/// Episode as returned by `/episode`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEpisode {
    pub id: i64,
    pub name: String,
    /// Free-form date, e.g. "December 2, 2013"
    #[serde(default)]
    pub air_date: String,
    /// Episode code, e.g. "S01E02"
    pub episode: String,
    /// Character urls
    #[serde(default)]
    pub characters: Vec<String>,
    pub url: String,
    pub created: DateTime<Utc>,
}

/// Location as returned by `/location`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiLocation {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub dimension: String,
    /// Character urls
    #[serde(default)]
    pub residents: Vec<String>,
    pub url: String,
    pub created: DateTime<Utc>,
}

/// Character as returned by `/character`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiCharacter {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub species: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub origin: ApiLink,
    #[serde(default)]
    pub location: ApiLink,
    #[serde(default)]
    pub image: String,
    /// Episode urls
    #[serde(default)]
    pub episode: Vec<String>,
    pub url: String,
    pub created: DateTime<Utc>,
}

/// Named reference to another resource. An empty url means "unknown".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiLink {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
}

impl ApiLink {
    /// Remote id of the linked resource, if the link is known
    pub fn remote_id(&self) -> Option<i64> {
        remote_id_from_url(&self.url)
    }
}

// ============== Collections ==============

/// Paging metadata of a filtered collection
#[derive(Debug, Clone, Deserialize)]
pub struct PageInfo {
    pub count: u64,
    #[serde(default)]
    pub pages: u64,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub prev: Option<String>,
}

/// One page of a filtered collection
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    pub info: PageInfo,
    pub results: Vec<T>,
}

/// Multi-id endpoints answer with an array, but a single id yields a bare object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

// ============== Filters ==============

/// Query for `/episode?name=&episode=`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EpisodeFilter {
    pub name: Option<String>,
    pub episode: Option<String>,
}

/// Query for `/location?name=&dimension=`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocationFilter {
    pub name: Option<String>,
    pub dimension: Option<String>,
}

/// Query for `/character?name=`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CharacterFilter {
    pub name: Option<String>,
}

/// Filters render themselves as query pairs
pub trait Filter {
    fn pairs(&self) -> Vec<(&'static str, &str)>;
}

impl Filter for EpisodeFilter {
    fn pairs(&self) -> Vec<(&'static str, &str)> {
        let mut pairs = Vec::new();
        if let Some(name) = &self.name {
            pairs.push(("name", name.as_str()));
        }
        if let Some(code) = &self.episode {
            pairs.push(("episode", code.as_str()));
        }
        pairs
    }
}

impl Filter for LocationFilter {
    fn pairs(&self) -> Vec<(&'static str, &str)> {
        let mut pairs = Vec::new();
        if let Some(name) = &self.name {
            pairs.push(("name", name.as_str()));
        }
        if let Some(dimension) = &self.dimension {
            pairs.push(("dimension", dimension.as_str()));
        }
        pairs
    }
}

impl Filter for CharacterFilter {
    fn pairs(&self) -> Vec<(&'static str, &str)> {
        self.name
            .as_deref()
            .map(|name| vec![("name", name)])
            .unwrap_or_default()
    }
}

/// Extract the trailing numeric id from a resource url.
///
/// `https://rickandmortyapi.com/api/character/12` -> `Some(12)`; empty or
/// malformed urls yield `None`.
pub fn remote_id_from_url(url: &str) -> Option<i64> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .last()?
        .parse()
        .ok()
}

/// Remote ids of a list of resource urls, skipping the ones that don't parse
pub fn remote_ids(urls: &[String]) -> Vec<i64> {
    urls.iter().filter_map(|u| remote_id_from_url(u)).collect()
}
