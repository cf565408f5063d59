//! Catalog records
//!
//! The three resource kinds as the rest of the crate sees them, whichever
//! side they came from.
//!
//! # Key Properties
//! - **local_id**: store primary key; `None` for records fresh from the API
//! - **remote_id**: the API's id, unique per kind in the store
//! - Relations are carried as remote ids, so a record reads the same from
//!   either side

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::remote::{remote_ids, ApiCharacter, ApiEpisode, ApiLink, ApiLocation};

/// Resource kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Episode,
    Location,
    Character,
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Kind::Episode => write!(f, "episode"),
            Kind::Location => write!(f, "location"),
            Kind::Character => write!(f, "character"),
        }
    }
}

/// An episode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub local_id: Option<i64>,
    pub remote_id: i64,
    pub name: String,
    pub air_date: Option<NaiveDate>,
    /// e.g. "S01E02"
    pub code: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
    /// Remote ids of the characters appearing in it
    pub character_ids: Vec<i64>,
}

/// A location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub local_id: Option<i64>,
    pub remote_id: i64,
    pub name: String,
    /// "Planet", "Space station", ...
    pub kind: String,
    pub dimension: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
    /// Remote ids of the characters last seen there
    pub resident_ids: Vec<i64>,
}

/// Reference from a character to a location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationRef {
    pub remote_id: i64,
    pub name: Option<String>,
}

impl LocationRef {
    /// `None` when the API reports the location as unknown (empty url)
    pub fn from_link(link: &ApiLink) -> Option<Self> {
        let remote_id = link.remote_id()?;
        let name = Some(link.name.trim())
            .filter(|n| !n.is_empty())
            .map(str::to_string);
        Some(Self { remote_id, name })
    }
}

/// A character
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub local_id: Option<i64>,
    pub remote_id: i64,
    pub name: String,
    pub status: String,
    pub species: String,
    pub kind: String,
    pub gender: String,
    pub image: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub origin: Option<LocationRef>,
    pub location: Option<LocationRef>,
    /// Remote ids of the episodes it appears in
    pub episode_ids: Vec<i64>,
}

/// Any record a seek can return
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Episode(Episode),
    Location(Location),
    Character(Character),
}

impl Record {
    pub fn kind(&self) -> Kind {
        match self {
            Record::Episode(_) => Kind::Episode,
            Record::Location(_) => Kind::Location,
            Record::Character(_) => Kind::Character,
        }
    }

    pub fn remote_id(&self) -> i64 {
        match self {
            Record::Episode(e) => e.remote_id,
            Record::Location(l) => l.remote_id,
            Record::Character(c) => c.remote_id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Record::Episode(e) => &e.name,
            Record::Location(l) => &l.name,
            Record::Character(c) => &c.name,
        }
    }
}

/// Parse the API's air date ("December 2, 2013")
pub fn parse_air_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%B %d, %Y").ok()
}

impl From<ApiEpisode> for Episode {
    fn from(dto: ApiEpisode) -> Self {
        Self {
            local_id: None,
            remote_id: dto.id,
            air_date: parse_air_date(&dto.air_date),
            name: dto.name,
            code: dto.episode,
            character_ids: remote_ids(&dto.characters),
            url: dto.url,
            created_at: dto.created,
        }
    }
}

impl From<ApiLocation> for Location {
    fn from(dto: ApiLocation) -> Self {
        Self {
            local_id: None,
            remote_id: dto.id,
            name: dto.name,
            kind: dto.kind,
            dimension: dto.dimension,
            resident_ids: remote_ids(&dto.residents),
            url: dto.url,
            created_at: dto.created,
        }
    }
}

impl From<ApiCharacter> for Character {
    fn from(dto: ApiCharacter) -> Self {
        Self {
            local_id: None,
            remote_id: dto.id,
            origin: LocationRef::from_link(&dto.origin),
            location: LocationRef::from_link(&dto.location),
            episode_ids: remote_ids(&dto.episode),
            name: dto.name,
            status: dto.status,
            species: dto.species,
            kind: dto.kind,
            gender: dto.gender,
            image: dto.image,
            url: dto.url,
            created_at: dto.created,
        }
    }
}

impl From<Episode> for Record {
    fn from(e: Episode) -> Self {
        Record::Episode(e)
    }
}

impl From<Location> for Record {
    fn from(l: Location) -> Self {
        Record::Location(l)
    }
}

impl From<Character> for Record {
    fn from(c: Character) -> Self {
        Record::Character(c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::fake::FakeCatalog;

    #[test]
    fn test_parse_air_date() {
        assert_eq!(
            parse_air_date("December 2, 2013"),
            NaiveDate::from_ymd_opt(2013, 12, 2)
        );
        assert_eq!(
            parse_air_date("April 14, 2014"),
            NaiveDate::from_ymd_opt(2014, 4, 14)
        );
        assert_eq!(parse_air_date("sometime in 2013"), None);
    }

    #[test]
    fn test_episode_from_dto_keeps_character_ids() {
        let fake = FakeCatalog::new()
            .with_character(1, "Rick Sanchez", None, None)
            .with_character(2, "Morty Smith", None, None)
            .with_episode(1, "S01E01", "Pilot", &[1, 2]);

        let episode = Episode::from(fake.episodes[&1].clone());
        assert_eq!(episode.local_id, None);
        assert_eq!(episode.code, "S01E01");
        assert_eq!(episode.character_ids, vec![1, 2]);
        assert_eq!(episode.air_date, NaiveDate::from_ymd_opt(2013, 12, 2));
    }

    #[test]
    fn test_unknown_location_is_absent() {
        let fake = FakeCatalog::new()
            .with_location(1, "Earth (C-137)", "Dimension C-137")
            .with_character(1, "Rick Sanchez", None, Some(1));

        let character = Character::from(fake.characters[&1].clone());
        assert_eq!(character.origin, None);
        assert_eq!(
            character.location,
            Some(LocationRef {
                remote_id: 1,
                name: Some("Earth (C-137)".to_string()),
            })
        );
    }
}
