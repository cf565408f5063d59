//! Seek - looking records up by kind and criterion
//!
//! One [`Seeker`] trait, answered by the local store ([`StoreSeeker`]) or the
//! remote catalog ([`ApiSeeker`]). [`Lookup`] asks the store first and falls
//! back to the API only when the store has nothing.
//!
//! # Usage
//!
//! ```ignore
//! let seek = Seek::build(Kind::Location, Criterion::Name, "Earth")?;
//! let hits = Lookup::new(&store, &client).seek(&seek).await?;
//! println!("{} record(s) from {}", hits.records.len(), hits.target);
//! ```

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;

use super::model::{Character, Episode, Kind, Location, Record};
use super::storage::Store;
use crate::remote::{Catalog, CharacterFilter, EpisodeFilter, LocationFilter};

/// How a lookup matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Criterion {
    Id,
    Name,
    Code,
    Dimension,
}

impl Criterion {
    /// Long flag name on the command line
    pub fn flag(&self) -> &'static str {
        match self {
            Criterion::Id => "id",
            Criterion::Name => "name",
            Criterion::Code => "code",
            Criterion::Dimension => "dimension",
        }
    }

    pub fn help(&self) -> &'static str {
        match self {
            Criterion::Id => "Treat the search string as a remote id",
            Criterion::Name => "Match by name (exact first, then partial)",
            Criterion::Code => "Match by episode code, e.g. S01E02",
            Criterion::Dimension => "Match by dimension (exact)",
        }
    }
}

impl std::fmt::Display for Criterion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.flag())
    }
}

/// Criteria each kind can be looked up by
pub fn supports(kind: Kind, criterion: Criterion) -> bool {
    use Criterion::*;
    matches!(
        (kind, criterion),
        (Kind::Episode, Id | Name | Code)
            | (Kind::Location, Id | Name | Dimension)
            | (Kind::Character, Id | Name)
    )
}

/// Seek errors
#[derive(Debug, thiserror::Error)]
pub enum SeekError {
    #[error("looking up a {kind} by {criterion} is not supported")]
    Unsupported { kind: Kind, criterion: Criterion },

    #[error("invalid id: {0:?} (expected a positive number)")]
    InvalidId(String),

    #[error("search string is empty")]
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EpisodeBy {
    Id(i64),
    Name(String),
    Code(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationBy {
    Id(i64),
    Name(String),
    Dimension(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CharacterBy {
    Id(i64),
    Name(String),
}

/// A lookup request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Seek {
    Episode(EpisodeBy),
    Location(LocationBy),
    Character(CharacterBy),
}

impl Seek {
    /// Build a seek from runtime input
    pub fn build(kind: Kind, criterion: Criterion, raw: &str) -> Result<Self, SeekError> {
        if !supports(kind, criterion) {
            return Err(SeekError::Unsupported { kind, criterion });
        }

        let raw = raw.trim();
        if raw.is_empty() {
            return Err(SeekError::Empty);
        }

        let id = || -> Result<i64, SeekError> {
            raw.parse::<i64>()
                .ok()
                .filter(|id| *id > 0)
                .ok_or_else(|| SeekError::InvalidId(raw.to_string()))
        };
        let text = raw.to_string();

        let seek = match (kind, criterion) {
            (Kind::Episode, Criterion::Id) => Seek::Episode(EpisodeBy::Id(id()?)),
            (Kind::Episode, Criterion::Name) => Seek::Episode(EpisodeBy::Name(text)),
            (Kind::Episode, Criterion::Code) => Seek::Episode(EpisodeBy::Code(text)),
            (Kind::Location, Criterion::Id) => Seek::Location(LocationBy::Id(id()?)),
            (Kind::Location, Criterion::Name) => Seek::Location(LocationBy::Name(text)),
            (Kind::Location, Criterion::Dimension) => Seek::Location(LocationBy::Dimension(text)),
            (Kind::Character, Criterion::Id) => Seek::Character(CharacterBy::Id(id()?)),
            (Kind::Character, Criterion::Name) => Seek::Character(CharacterBy::Name(text)),
            _ => return Err(SeekError::Unsupported { kind, criterion }),
        };
        Ok(seek)
    }

    pub fn kind(&self) -> Kind {
        match self {
            Seek::Episode(_) => Kind::Episode,
            Seek::Location(_) => Kind::Location,
            Seek::Character(_) => Kind::Character,
        }
    }

    pub fn criterion(&self) -> Criterion {
        match self {
            Seek::Episode(EpisodeBy::Id(_))
            | Seek::Location(LocationBy::Id(_))
            | Seek::Character(CharacterBy::Id(_)) => Criterion::Id,
            Seek::Episode(EpisodeBy::Name(_))
            | Seek::Location(LocationBy::Name(_))
            | Seek::Character(CharacterBy::Name(_)) => Criterion::Name,
            Seek::Episode(EpisodeBy::Code(_)) => Criterion::Code,
            Seek::Location(LocationBy::Dimension(_)) => Criterion::Dimension,
        }
    }
}

/// Which side answered a seek
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Local,
    Remote,
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Local => write!(f, "cache"),
            Target::Remote => write!(f, "api"),
        }
    }
}

#[async_trait(?Send)]
pub trait Seeker {
    fn target(&self) -> Target;

    /// All matching records, best first
    async fn seek(&self, seek: &Seek) -> Result<Vec<Record>>;

    async fn seek_one(&self, seek: &Seek) -> Result<Option<Record>> {
        Ok(self.seek(seek).await?.into_iter().next())
    }
}

fn records<T: Into<Record>>(items: impl IntoIterator<Item = T>) -> Vec<Record> {
    items.into_iter().map(Into::into).collect()
}

// ============== Local ==============

/// Seeks against the local store
pub struct StoreSeeker<'a> {
    store: &'a Store,
}

impl<'a> StoreSeeker<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }
}

#[async_trait(?Send)]
impl Seeker for StoreSeeker<'_> {
    fn target(&self) -> Target {
        Target::Local
    }

    async fn seek(&self, seek: &Seek) -> Result<Vec<Record>> {
        let store = self.store;
        let found = match seek {
            Seek::Episode(EpisodeBy::Id(id)) => records(store.episode_by_remote_id(*id)?),
            Seek::Episode(EpisodeBy::Name(name)) => records(store.episodes_by_name(name)?),
            Seek::Episode(EpisodeBy::Code(code)) => records(store.episodes_by_code(code)?),
            Seek::Location(LocationBy::Id(id)) => records(store.location_by_remote_id(*id)?),
            Seek::Location(LocationBy::Name(name)) => records(store.locations_by_name(name)?),
            Seek::Location(LocationBy::Dimension(dim)) => {
                records(store.locations_by_dimension(dim)?)
            }
            Seek::Character(CharacterBy::Id(id)) => records(store.character_by_remote_id(*id)?),
            Seek::Character(CharacterBy::Name(name)) => records(store.characters_by_name(name)?),
        };

        tracing::debug!(?seek, hits = found.len(), "store seek");
        Ok(found)
    }
}

// ============== Remote ==============

/// Partial-match rule applied when no name matches exactly
#[derive(Debug, Clone, Copy)]
enum Partial {
    Prefix,
    Contains,
}

/// Keep exact name matches if there are any, otherwise the partial ones.
///
/// Exact is case-sensitive and partial is not, like the store's `=` and `LIKE`.
fn narrow_by_name<T>(items: Vec<T>, query: &str, rule: Partial, name: impl Fn(&T) -> &str) -> Vec<T> {
    if items.iter().any(|item| name(item) == query) {
        return items.into_iter().filter(|item| name(item) == query).collect();
    }

    let query = query.to_lowercase();
    items
        .into_iter()
        .filter(|item| {
            let candidate = name(item).to_lowercase();
            match rule {
                Partial::Prefix => candidate.starts_with(&query),
                Partial::Contains => candidate.contains(&query),
            }
        })
        .collect()
}

/// Seeks against the remote catalog
pub struct ApiSeeker<'a, C: Catalog> {
    api: &'a C,
}

impl<'a, C: Catalog> ApiSeeker<'a, C> {
    pub fn new(api: &'a C) -> Self {
        Self { api }
    }
}

#[async_trait(?Send)]
impl<C: Catalog> Seeker for ApiSeeker<'_, C> {
    fn target(&self) -> Target {
        Target::Remote
    }

    async fn seek(&self, seek: &Seek) -> Result<Vec<Record>> {
        let api = self.api;
        let found = match seek {
            Seek::Episode(EpisodeBy::Id(id)) => records(api.episode(*id).await?.map(Episode::from)),
            Seek::Episode(EpisodeBy::Name(name)) => {
                let filter = EpisodeFilter {
                    name: Some(name.clone()),
                    ..Default::default()
                };
                let found = api.find_episodes(&filter).await?;
                records(
                    narrow_by_name(found, name, Partial::Contains, |e| e.name.as_str())
                        .into_iter()
                        .map(Episode::from),
                )
            }
            Seek::Episode(EpisodeBy::Code(code)) => {
                let filter = EpisodeFilter {
                    episode: Some(code.clone()),
                    ..Default::default()
                };
                let found = api.find_episodes(&filter).await?;
                records(
                    found
                        .into_iter()
                        .filter(|e| e.episode.eq_ignore_ascii_case(code))
                        .map(Episode::from),
                )
            }
            Seek::Location(LocationBy::Id(id)) => {
                records(api.location(*id).await?.map(Location::from))
            }
            Seek::Location(LocationBy::Name(name)) => {
                let filter = LocationFilter {
                    name: Some(name.clone()),
                    ..Default::default()
                };
                let found = api.find_locations(&filter).await?;
                records(
                    narrow_by_name(found, name, Partial::Prefix, |l| l.name.as_str())
                        .into_iter()
                        .map(Location::from),
                )
            }
            Seek::Location(LocationBy::Dimension(dimension)) => {
                let filter = LocationFilter {
                    dimension: Some(dimension.clone()),
                    ..Default::default()
                };
                let found = api.find_locations(&filter).await?;
                records(
                    found
                        .into_iter()
                        .filter(|l| &l.dimension == dimension)
                        .map(Location::from),
                )
            }
            Seek::Character(CharacterBy::Id(id)) => {
                records(api.character(*id).await?.map(Character::from))
            }
            Seek::Character(CharacterBy::Name(name)) => {
                let filter = CharacterFilter {
                    name: Some(name.clone()),
                };
                let found = api.find_characters(&filter).await?;
                records(
                    narrow_by_name(found, name, Partial::Contains, |c| c.name.as_str())
                        .into_iter()
                        .map(Character::from),
                )
            }
        };

        tracing::debug!(?seek, hits = found.len(), "api seek");
        Ok(found)
    }
}

// ============== Lookup ==============

/// Records found by a seek and the side that answered
#[derive(Debug, Clone)]
pub struct Hits {
    pub target: Target,
    pub records: Vec<Record>,
}

impl Hits {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Local-first lookups with remote fallback
pub struct Lookup<'a, C: Catalog> {
    store: &'a Store,
    api: &'a C,
}

impl<'a, C: Catalog> Lookup<'a, C> {
    pub fn new(store: &'a Store, api: &'a C) -> Self {
        Self { store, api }
    }

    /// Run a seek against the store, then the API if the store has nothing
    pub async fn seek(&self, seek: &Seek) -> Result<Hits> {
        let local = StoreSeeker::new(self.store);
        let records = local.seek(seek).await?;
        if !records.is_empty() {
            return Ok(Hits {
                target: local.target(),
                records,
            });
        }

        let remote = ApiSeeker::new(self.api);
        let records = remote.seek(seek).await?;
        Ok(Hits {
            target: remote.target(),
            records,
        })
    }

    /// Resolve one character reference
    pub async fn resolve_character(&self, remote_id: i64) -> Result<Option<Character>> {
        let seek = Seek::Character(CharacterBy::Id(remote_id));
        Ok(match self.seek(&seek).await?.records.into_iter().next() {
            Some(Record::Character(c)) => Some(c),
            _ => None,
        })
    }

    /// Resolve one location reference
    pub async fn resolve_location(&self, remote_id: i64) -> Result<Option<Location>> {
        let seek = Seek::Location(LocationBy::Id(remote_id));
        Ok(match self.seek(&seek).await?.records.into_iter().next() {
            Some(Record::Location(l)) => Some(l),
            _ => None,
        })
    }

    /// Characters by remote id, in the given order.
    ///
    /// Cached ones come from the store; the rest are fetched in one request.
    /// Ids neither side knows are skipped with a warning.
    pub async fn characters(&self, ids: &[i64]) -> Result<Vec<Character>> {
        let mut found = Vec::with_capacity(ids.len());
        let mut missing = Vec::new();
        for id in ids {
            match self.store.character_by_remote_id(*id)? {
                Some(character) => found.push(character),
                None => missing.push(*id),
            }
        }

        if !missing.is_empty() {
            let fetched = self.api.characters(&missing).await?;
            for id in &missing {
                if !fetched.iter().any(|c| c.id == *id) {
                    tracing::warn!(character = id, "dangling character reference, skipped");
                }
            }
            found.extend(fetched.into_iter().map(Character::from));

            let order = |c: &Character| ids.iter().position(|id| *id == c.remote_id);
            found.sort_by_key(order);
        }

        Ok(found)
    }

    /// Characters a record points at: itself, an episode's cast, or a
    /// location's residents
    pub async fn characters_of(&self, record: &Record) -> Result<Vec<Character>> {
        match record {
            Record::Character(c) => Ok(vec![c.clone()]),
            Record::Episode(e) => self.characters(&e.character_ids).await,
            Record::Location(l) => self.characters(&l.resident_ids).await,
        }
    }

    /// Characters of every record, deduplicated by remote id in first-seen order
    pub async fn characters_of_all(&self, records: &[Record]) -> Result<Vec<Character>> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for record in records {
            for character in self.characters_of(record).await? {
                if seen.insert(character.remote_id) {
                    out.push(character);
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::fake::FakeCatalog;

    fn store_with(fake: &FakeCatalog) -> Result<Store> {
        let mut store = Store::open_memory()?;
        for location in fake.locations.values() {
            store.insert_location(&location.clone().into())?;
        }
        for character in fake.characters.values() {
            store.insert_character(&character.clone().into())?;
        }
        Ok(store)
    }

    fn names(records: &[Record]) -> Vec<&str> {
        records.iter().map(Record::name).collect()
    }

    #[test]
    fn test_compatibility_table() {
        assert!(supports(Kind::Episode, Criterion::Code));
        assert!(supports(Kind::Location, Criterion::Dimension));
        assert!(!supports(Kind::Episode, Criterion::Dimension));
        assert!(!supports(Kind::Character, Criterion::Code));

        let err = Seek::build(Kind::Character, Criterion::Dimension, "C-137").unwrap_err();
        assert!(matches!(err, SeekError::Unsupported { .. }));
        assert_eq!(
            err.to_string(),
            "looking up a character by dimension is not supported"
        );
    }

    #[test]
    fn test_build_parses_ids() {
        let seek = Seek::build(Kind::Episode, Criterion::Id, " 28 ").unwrap();
        assert_eq!(seek, Seek::Episode(EpisodeBy::Id(28)));
        assert_eq!(seek.kind(), Kind::Episode);
        assert_eq!(seek.criterion(), Criterion::Id);

        assert!(matches!(
            Seek::build(Kind::Episode, Criterion::Id, "pilot"),
            Err(SeekError::InvalidId(_))
        ));
        assert!(matches!(
            Seek::build(Kind::Location, Criterion::Id, "-3"),
            Err(SeekError::InvalidId(_))
        ));
        assert!(matches!(
            Seek::build(Kind::Location, Criterion::Name, "   "),
            Err(SeekError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_exact_name_wins() -> Result<()> {
        let fake = FakeCatalog::new()
            .with_character(1, "Rick Sanchez", None, None)
            .with_character(2, "Rick", None, None);
        let store = store_with(&fake)?;

        let seek = Seek::build(Kind::Character, Criterion::Name, "Rick")?;
        let local = StoreSeeker::new(&store).seek(&seek).await?;
        assert_eq!(names(&local), vec!["Rick"]);

        let remote = ApiSeeker::new(&fake).seek(&seek).await?;
        assert_eq!(names(&remote), vec!["Rick"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_name_falls_back_to_partial() -> Result<()> {
        let fake = FakeCatalog::new()
            .with_location(1, "Earth (C-137)", "Dimension C-137")
            .with_location(3, "Citadel of Ricks", "unknown")
            .with_character(1, "Rick Sanchez", None, None)
            .with_character(2, "Morty Smith", None, None);

        let seek = Seek::build(Kind::Character, Criterion::Name, "rick")?;
        let remote = ApiSeeker::new(&fake).seek(&seek).await?;
        assert_eq!(names(&remote), vec!["Rick Sanchez"]);

        // locations match by prefix only
        let seek = Seek::build(Kind::Location, Criterion::Name, "Ricks")?;
        assert!(ApiSeeker::new(&fake).seek(&seek).await?.is_empty());
        let seek = Seek::build(Kind::Location, Criterion::Name, "Earth")?;
        let remote = ApiSeeker::new(&fake).seek(&seek).await?;
        assert_eq!(names(&remote), vec!["Earth (C-137)"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_local_hit_makes_no_remote_calls() -> Result<()> {
        let fake = FakeCatalog::new().with_character(1, "Rick Sanchez", None, None);
        let store = store_with(&fake)?;
        let lookup = Lookup::new(&store, &fake);

        let hits = lookup.seek(&Seek::Character(CharacterBy::Id(1))).await?;
        assert_eq!(hits.target, Target::Local);
        assert_eq!(names(&hits.records), vec!["Rick Sanchez"]);
        assert_eq!(fake.call_count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_falls_back_to_remote() -> Result<()> {
        let fake = FakeCatalog::new()
            .with_character(1, "Rick Sanchez", None, None)
            .with_character(2, "Morty Smith", None, None)
            .with_episode(1, "S01E01", "Pilot", &[1, 2]);
        let store = Store::open_memory()?;
        let lookup = Lookup::new(&store, &fake);

        let hits = lookup
            .seek(&Seek::build(Kind::Episode, Criterion::Code, "s01e01")?)
            .await?;
        assert_eq!(hits.target, Target::Remote);
        assert_eq!(names(&hits.records), vec!["Pilot"]);

        let cast = lookup.characters_of_all(&hits.records).await?;
        let cast: Vec<&str> = cast.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(cast, vec!["Rick Sanchez", "Morty Smith"]);
        assert!(fake.calls().contains(&"characters 1,2".to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn test_miss_on_both_sides_is_empty() -> Result<()> {
        let fake = FakeCatalog::new();
        let store = Store::open_memory()?;
        let lookup = Lookup::new(&store, &fake);

        let hits = lookup.seek(&Seek::Episode(EpisodeBy::Id(99))).await?;
        assert!(hits.is_empty());
        assert!(lookup.resolve_location(7).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_resolve_character_prefers_store() -> Result<()> {
        let fake = FakeCatalog::new().with_character(1, "Rick Sanchez", None, None);
        let store = store_with(&fake)?;
        let lookup = Lookup::new(&store, &fake);

        let rick = lookup.resolve_character(1).await?.unwrap();
        assert_eq!(rick.name, "Rick Sanchez");
        assert!(rick.local_id.is_some());
        assert_eq!(fake.call_count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_resolve_character_falls_back_to_api() -> Result<()> {
        let fake = FakeCatalog::new().with_character(1, "Rick Sanchez", None, None);
        let store = Store::open_memory()?;
        let lookup = Lookup::new(&store, &fake);

        let rick = lookup.resolve_character(1).await?.unwrap();
        assert_eq!(rick.name, "Rick Sanchez");
        assert_eq!(fake.calls(), vec!["character 1".to_string()]);

        assert!(lookup.resolve_character(42).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_seek_one_takes_first_match() -> Result<()> {
        let fake = FakeCatalog::new()
            .with_character(3, "Summer Smith", None, None)
            .with_character(2, "Morty Smith", None, None)
            .with_character(1, "Rick Sanchez", None, None);
        let store = store_with(&fake)?;
        let local = StoreSeeker::new(&store);

        let seek = Seek::build(Kind::Character, Criterion::Name, "Smith")?;
        assert_eq!(names(&local.seek(&seek).await?), vec!["Morty Smith", "Summer Smith"]);

        let first = local.seek_one(&seek).await?.unwrap();
        assert_eq!(first.kind(), Kind::Character);
        assert_eq!(first.remote_id(), 2);

        let seek = Seek::build(Kind::Character, Criterion::Name, "Jerry")?;
        assert!(local.seek_one(&seek).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_characters_mix_cache_and_api_in_order() -> Result<()> {
        let fake = FakeCatalog::new()
            .with_character(1, "Rick Sanchez", None, None)
            .with_character(2, "Morty Smith", None, None)
            .with_character(3, "Summer Smith", None, None);
        let mut store = Store::open_memory()?;
        store.insert_character(&fake.characters[&2].clone().into())?;
        let lookup = Lookup::new(&store, &fake);

        // 42 is dangling and skipped
        let found = lookup.characters(&[3, 2, 42, 1]).await?;
        let found: Vec<i64> = found.iter().map(|c| c.remote_id).collect();
        assert_eq!(found, vec![3, 2, 1]);
        assert_eq!(fake.calls(), vec!["characters 3,42,1".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn test_characters_of_all_dedups() -> Result<()> {
        let fake = FakeCatalog::new()
            .with_location(1, "Earth (C-137)", "Dimension C-137")
            .with_location(20, "Earth (Replacement Dimension)", "Replacement Dimension")
            .with_character(1, "Rick Sanchez", Some(1), Some(20))
            .with_character(2, "Morty Smith", None, Some(20))
            .with_character(3, "Summer Smith", None, Some(1));
        let store = store_with(&fake)?;
        let lookup = Lookup::new(&store, &fake);

        let hits = lookup
            .seek(&Seek::build(Kind::Location, Criterion::Name, "Earth")?)
            .await?;
        assert_eq!(hits.target, Target::Local);

        let residents = lookup.characters_of_all(&hits.records).await?;
        let residents: Vec<i64> = residents.iter().map(|c| c.remote_id).collect();
        assert_eq!(residents, vec![3, 1, 2]);
        assert_eq!(fake.call_count(), 0);
        Ok(())
    }
}
