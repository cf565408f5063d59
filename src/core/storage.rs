//! Storage - SQLite cache
//!
//! Local copy of everything crawled from the catalog.
//!
//! # Key Points
//! - `remote_id` is UNIQUE per table; it is the idempotency key for "already cached"
//! - Insert-only: a record is written once and never updated
//! - Episode <-> character lives in a single join table; both directions are
//!   derived queries over it
//! - Unit of work = one open transaction + an identity map (remote id -> local id),
//!   committed and cleared at batch checkpoints

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};

use super::model::{Character, Episode, Kind, Location, LocationRef};

const EPISODE_SELECT: &str =
    "SELECT e.id, e.remote_id, e.name, e.air_date, e.code, e.url, e.created_at FROM episode e";

const LOCATION_SELECT: &str =
    "SELECT l.id, l.remote_id, l.name, l.type, l.dimension, l.url, l.created_at FROM location l";

const CHARACTER_SELECT: &str = r#"
    SELECT c.id, c.remote_id, c.name, c.status, c.species, c.type, c.gender,
           c.image, c.url, c.created_at,
           o.remote_id, o.name, cur.remote_id, cur.name
    FROM character c
    LEFT JOIN location o ON o.id = c.origin_location_id
    LEFT JOIN location cur ON cur.id = c.location_id
"#;

fn table(kind: Kind) -> &'static str {
    match kind {
        Kind::Episode => "episode",
        Kind::Location => "location",
        Kind::Character => "character",
    }
}

/// Escape LIKE wildcards in user input (used with `ESCAPE '\'`)
fn like_escape(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Database storage
pub struct Store {
    conn: Connection,
    identity: HashMap<(Kind, i64), i64>,
    in_batch: bool,
}

impl Store {
    /// Open or create a database
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("Failed to open database at {}", path.display()))?;

        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000; PRAGMA foreign_keys=ON;",
        )?;

        let store = Self {
            conn,
            identity: HashMap::new(),
            in_batch: false,
        };
        store.init_schema()?;

        Ok(store)
    }

    /// Open an in-memory database (for testing)
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let store = Self {
            conn,
            identity: HashMap::new(),
            in_batch: false,
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS location (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                remote_id INTEGER NOT NULL UNIQUE,
                name TEXT NOT NULL,
                type TEXT NOT NULL,
                dimension TEXT NOT NULL,
                url TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS episode (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                remote_id INTEGER NOT NULL UNIQUE,
                name TEXT NOT NULL,
                air_date TEXT,
                code TEXT NOT NULL,
                url TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS character (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                remote_id INTEGER NOT NULL UNIQUE,
                name TEXT NOT NULL,
                status TEXT NOT NULL,
                species TEXT NOT NULL,
                type TEXT NOT NULL,
                gender TEXT NOT NULL,
                image TEXT NOT NULL,
                url TEXT NOT NULL,
                created_at TEXT NOT NULL,
                origin_location_id INTEGER REFERENCES location(id),
                location_id INTEGER REFERENCES location(id)
            );

            CREATE TABLE IF NOT EXISTS character_episode (
                character_id INTEGER NOT NULL REFERENCES character(id) ON DELETE CASCADE,
                episode_id INTEGER NOT NULL REFERENCES episode(id) ON DELETE CASCADE,
                PRIMARY KEY (character_id, episode_id)
            );

            CREATE INDEX IF NOT EXISTS idx_character_episode_episode
                ON character_episode(episode_id);
            CREATE INDEX IF NOT EXISTS idx_character_origin ON character(origin_location_id);
            CREATE INDEX IF NOT EXISTS idx_character_location ON character(location_id);
            CREATE INDEX IF NOT EXISTS idx_character_name ON character(name);
            CREATE INDEX IF NOT EXISTS idx_location_name ON location(name);
            CREATE INDEX IF NOT EXISTS idx_episode_code ON episode(code);
            "#,
        )?;

        Ok(())
    }

    // ============== Unit of work ==============

    /// Open a batch transaction (no-op if one is open)
    pub fn begin(&mut self) -> Result<()> {
        if !self.in_batch {
            self.conn.execute_batch("BEGIN IMMEDIATE")?;
            self.in_batch = true;
        }
        Ok(())
    }

    /// Flush the open batch to disk (no-op without one)
    pub fn commit(&mut self) -> Result<()> {
        if self.in_batch {
            self.conn
                .execute_batch("COMMIT")
                .context("Failed to commit batch")?;
            self.in_batch = false;
        }
        Ok(())
    }

    /// Discard the open batch; ids memoized during it are no longer valid
    pub fn rollback(&mut self) -> Result<()> {
        if self.in_batch {
            self.in_batch = false;
            self.identity.clear();
            self.conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }

    /// Drop the identity map
    pub fn clear(&mut self) {
        self.identity.clear();
    }

    /// Whether a batch transaction is open
    pub fn in_batch(&self) -> bool {
        self.in_batch
    }

    // ============== Writes ==============

    /// Local id for a remote id, through the identity map
    pub fn local_id(&mut self, kind: Kind, remote_id: i64) -> Result<Option<i64>> {
        if let Some(id) = self.identity.get(&(kind, remote_id)) {
            return Ok(Some(*id));
        }

        let sql = format!("SELECT id FROM {} WHERE remote_id = ?1", table(kind));
        let found: Option<i64> = self
            .conn
            .query_row(&sql, [remote_id], |row| row.get(0))
            .optional()?;

        if let Some(id) = found {
            self.identity.insert((kind, remote_id), id);
        }
        Ok(found)
    }

    /// Insert an episode, or return the existing row for its remote id
    pub fn insert_episode(&mut self, episode: &Episode) -> Result<i64> {
        if let Some(id) = self.local_id(Kind::Episode, episode.remote_id)? {
            return Ok(id);
        }

        self.conn.execute(
            r#"
            INSERT INTO episode (remote_id, name, air_date, code, url, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                episode.remote_id,
                episode.name,
                episode.air_date.map(|d| d.format("%Y-%m-%d").to_string()),
                episode.code,
                episode.url,
                episode.created_at.to_rfc3339(),
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        self.identity.insert((Kind::Episode, episode.remote_id), id);
        Ok(id)
    }

    /// Insert a location, or return the existing row for its remote id
    pub fn insert_location(&mut self, location: &Location) -> Result<i64> {
        if let Some(id) = self.local_id(Kind::Location, location.remote_id)? {
            return Ok(id);
        }

        self.conn.execute(
            r#"
            INSERT INTO location (remote_id, name, type, dimension, url, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                location.remote_id,
                location.name,
                location.kind,
                location.dimension,
                location.url,
                location.created_at.to_rfc3339(),
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        self.identity.insert((Kind::Location, location.remote_id), id);
        Ok(id)
    }

    /// Insert a character, or return the existing row for its remote id.
    ///
    /// Location references are resolved against the store; a reference to a
    /// location that isn't cached is stored as NULL.
    pub fn insert_character(&mut self, character: &Character) -> Result<i64> {
        if let Some(id) = self.local_id(Kind::Character, character.remote_id)? {
            return Ok(id);
        }

        let origin = self.location_ref_id(character.origin.as_ref())?;
        let location = self.location_ref_id(character.location.as_ref())?;

        self.conn.execute(
            r#"
            INSERT INTO character (
                remote_id, name, status, species, type, gender, image, url, created_at,
                origin_location_id, location_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                character.remote_id,
                character.name,
                character.status,
                character.species,
                character.kind,
                character.gender,
                character.image,
                character.url,
                character.created_at.to_rfc3339(),
                origin,
                location,
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        self.identity.insert((Kind::Character, character.remote_id), id);
        Ok(id)
    }

    fn location_ref_id(&mut self, reference: Option<&LocationRef>) -> Result<Option<i64>> {
        let Some(reference) = reference else {
            return Ok(None);
        };
        let id = self.local_id(Kind::Location, reference.remote_id)?;
        if id.is_none() {
            tracing::debug!(
                location = reference.remote_id,
                "location not cached, storing reference as NULL"
            );
        }
        Ok(id)
    }

    /// Link a character to an episode (both by local id). Idempotent.
    pub fn link(&self, character_id: i64, episode_id: i64) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO character_episode (character_id, episode_id) VALUES (?1, ?2)",
            params![character_id, episode_id],
        )?;
        Ok(())
    }

    /// Remove a character/episode link
    pub fn unlink(&self, character_id: i64, episode_id: i64) -> Result<()> {
        self.conn.execute(
            "DELETE FROM character_episode WHERE character_id = ?1 AND episode_id = ?2",
            params![character_id, episode_id],
        )?;
        Ok(())
    }

    // ============== Episodes ==============

    /// Highest remote episode id cached, 0 when empty
    pub fn highest_episode_remote_id(&self) -> Result<i64> {
        let highest: Option<i64> =
            self.conn
                .query_row("SELECT MAX(remote_id) FROM episode", [], |row| row.get(0))?;
        Ok(highest.unwrap_or(0))
    }

    pub fn episode_by_remote_id(&self, remote_id: i64) -> Result<Option<Episode>> {
        Ok(self
            .query_episodes("WHERE e.remote_id = ?1", params![remote_id])?
            .into_iter()
            .next())
    }

    /// Exact name first, then names containing the query
    pub fn episodes_by_name(&self, name: &str) -> Result<Vec<Episode>> {
        let exact = self.query_episodes("WHERE e.name = ?1", params![name])?;
        if !exact.is_empty() {
            return Ok(exact);
        }

        let pattern = format!("%{}%", like_escape(name));
        self.query_episodes("WHERE e.name LIKE ?1 ESCAPE '\\'", params![pattern])
    }

    /// Episode code, case-insensitive ("s01e02" finds "S01E02")
    pub fn episodes_by_code(&self, code: &str) -> Result<Vec<Episode>> {
        self.query_episodes("WHERE e.code = ?1 COLLATE NOCASE", params![code])
    }

    /// Episodes a character appears in (by the character's local id)
    pub fn episodes_of_character(&self, character_id: i64) -> Result<Vec<Episode>> {
        self.query_episodes(
            "JOIN character_episode ce ON ce.episode_id = e.id WHERE ce.character_id = ?1",
            params![character_id],
        )
    }

    fn query_episodes(&self, clause: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<Episode>> {
        let sql = format!("{} {} ORDER BY e.remote_id", EPISODE_SELECT, clause);
        let mut stmt = self.conn.prepare(&sql)?;
        let mut episodes = stmt
            .query_map(params, Self::row_to_episode)?
            .collect::<Result<Vec<_>, _>>()?;

        for episode in &mut episodes {
            if let Some(id) = episode.local_id {
                episode.character_ids = self.remote_ids(
                    r#"SELECT c.remote_id FROM character c
                       JOIN character_episode ce ON ce.character_id = c.id
                       WHERE ce.episode_id = ?1 ORDER BY c.remote_id"#,
                    id,
                )?;
            }
        }
        Ok(episodes)
    }

    // ============== Locations ==============

    pub fn location_by_remote_id(&self, remote_id: i64) -> Result<Option<Location>> {
        Ok(self
            .query_locations("WHERE l.remote_id = ?1", params![remote_id])?
            .into_iter()
            .next())
    }

    /// Exact name first, then names starting with the query
    /// ("Earth" finds "Earth (C-137)" and "Earth (Replacement Dimension)")
    pub fn locations_by_name(&self, name: &str) -> Result<Vec<Location>> {
        let exact = self.query_locations("WHERE l.name = ?1", params![name])?;
        if !exact.is_empty() {
            return Ok(exact);
        }

        let pattern = format!("{}%", like_escape(name));
        self.query_locations("WHERE l.name LIKE ?1 ESCAPE '\\'", params![pattern])
    }

    pub fn locations_by_dimension(&self, dimension: &str) -> Result<Vec<Location>> {
        self.query_locations("WHERE l.dimension = ?1", params![dimension])
    }

    fn query_locations(
        &self,
        clause: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<Location>> {
        let sql = format!("{} {} ORDER BY l.remote_id", LOCATION_SELECT, clause);
        let mut stmt = self.conn.prepare(&sql)?;
        let mut locations = stmt
            .query_map(params, Self::row_to_location)?
            .collect::<Result<Vec<_>, _>>()?;

        for location in &mut locations {
            if let Some(id) = location.local_id {
                location.resident_ids = self.remote_ids(
                    "SELECT remote_id FROM character WHERE location_id = ?1 ORDER BY remote_id",
                    id,
                )?;
            }
        }
        Ok(locations)
    }

    // ============== Characters ==============

    pub fn character_by_remote_id(&self, remote_id: i64) -> Result<Option<Character>> {
        Ok(self
            .query_characters("WHERE c.remote_id = ?1", params![remote_id])?
            .into_iter()
            .next())
    }

    /// Exact name first, then names containing the query anywhere
    /// ("Rick" finds "Rick Sanchez" and "Pickle Rick")
    pub fn characters_by_name(&self, name: &str) -> Result<Vec<Character>> {
        let exact = self.query_characters("WHERE c.name = ?1", params![name])?;
        if !exact.is_empty() {
            return Ok(exact);
        }

        let pattern = format!("%{}%", like_escape(name));
        self.query_characters("WHERE c.name LIKE ?1 ESCAPE '\\'", params![pattern])
    }

    /// Characters appearing in an episode (by the episode's local id)
    pub fn characters_of_episode(&self, episode_id: i64) -> Result<Vec<Character>> {
        self.query_characters(
            "JOIN character_episode ce ON ce.character_id = c.id WHERE ce.episode_id = ?1",
            params![episode_id],
        )
    }

    /// Characters last seen at a location (by its local id)
    pub fn residents_of(&self, location_id: i64) -> Result<Vec<Character>> {
        self.query_characters("WHERE c.location_id = ?1", params![location_id])
    }

    /// Characters originating from a location (by its local id)
    pub fn natives_of(&self, location_id: i64) -> Result<Vec<Character>> {
        self.query_characters("WHERE c.origin_location_id = ?1", params![location_id])
    }

    fn query_characters(
        &self,
        clause: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<Character>> {
        let sql = format!("{} {} ORDER BY c.remote_id", CHARACTER_SELECT, clause);
        let mut stmt = self.conn.prepare(&sql)?;
        let mut characters = stmt
            .query_map(params, Self::row_to_character)?
            .collect::<Result<Vec<_>, _>>()?;

        for character in &mut characters {
            if let Some(id) = character.local_id {
                character.episode_ids = self.remote_ids(
                    r#"SELECT e.remote_id FROM episode e
                       JOIN character_episode ce ON ce.episode_id = e.id
                       WHERE ce.character_id = ?1 ORDER BY e.remote_id"#,
                    id,
                )?;
            }
        }
        Ok(characters)
    }

    fn remote_ids(&self, sql: &str, local_id: i64) -> Result<Vec<i64>> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let ids = stmt
            .query_map([local_id], |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;
        Ok(ids)
    }

    // ============== Row mapping ==============

    fn row_to_episode(row: &Row) -> rusqlite::Result<Episode> {
        let air_date: Option<String> = row.get(3)?;
        Ok(Episode {
            local_id: Some(row.get(0)?),
            remote_id: row.get(1)?,
            name: row.get(2)?,
            air_date: air_date.and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
            code: row.get(4)?,
            url: row.get(5)?,
            created_at: timestamp(row, 6)?,
            character_ids: Vec::new(),
        })
    }

    fn row_to_location(row: &Row) -> rusqlite::Result<Location> {
        Ok(Location {
            local_id: Some(row.get(0)?),
            remote_id: row.get(1)?,
            name: row.get(2)?,
            kind: row.get(3)?,
            dimension: row.get(4)?,
            url: row.get(5)?,
            created_at: timestamp(row, 6)?,
            resident_ids: Vec::new(),
        })
    }

    fn row_to_character(row: &Row) -> rusqlite::Result<Character> {
        let origin_id: Option<i64> = row.get(10)?;
        let location_id: Option<i64> = row.get(12)?;

        Ok(Character {
            local_id: Some(row.get(0)?),
            remote_id: row.get(1)?,
            name: row.get(2)?,
            status: row.get(3)?,
            species: row.get(4)?,
            kind: row.get(5)?,
            gender: row.get(6)?,
            image: row.get(7)?,
            url: row.get(8)?,
            created_at: timestamp(row, 9)?,
            origin: origin_id.map(|remote_id| LocationRef {
                remote_id,
                name: row.get(11).ok(),
            }),
            location: location_id.map(|remote_id| LocationRef {
                remote_id,
                name: row.get(13).ok(),
            }),
            episode_ids: Vec::new(),
        })
    }

    // ============== Stats ==============

    /// Get database statistics
    pub fn stats(&self) -> Result<StoreStats> {
        let count = |sql: &str| -> Result<u64> {
            let n: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
            Ok(n as u64)
        };

        Ok(StoreStats {
            episodes: count("SELECT COUNT(*) FROM episode")?,
            locations: count("SELECT COUNT(*) FROM location")?,
            characters: count("SELECT COUNT(*) FROM character")?,
            appearances: count("SELECT COUNT(*) FROM character_episode")?,
            highest_episode: self.highest_episode_remote_id()?,
        })
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        // an unfinished batch never reaches disk
        if self.in_batch {
            let _ = self.conn.execute_batch("ROLLBACK");
        }
    }
}

fn timestamp(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Storage statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub episodes: u64,
    pub locations: u64,
    pub characters: u64,
    /// character/episode links
    pub appearances: u64,
    pub highest_episode: i64,
}
