//! Ordered favorites list keyed by image URL, with optional SQLite backing.
//!
//! The list lives in memory; attaching a store loads persisted rows in
//! insertion order and write-throughs every add/remove afterwards.

use std::fmt;
use std::path::Path;

use contracts::Pet;
use rusqlite::{params, Connection};

#[derive(Debug)]
pub enum FavoritesError {
    DuplicateUrl(String),
    NoActivePet,
    Sqlite(rusqlite::Error),
}

impl fmt::Display for FavoritesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateUrl(url) => write!(f, "favorite already saved for url {url}"),
            Self::NoActivePet => write!(f, "no active pet to save"),
            Self::Sqlite(err) => write!(f, "sqlite error: {err}"),
        }
    }
}

impl std::error::Error for FavoritesError {}

impl From<rusqlite::Error> for FavoritesError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

#[derive(Debug, Default)]
pub struct FavoritesStore {
    entries: Vec<Pet>,
    store: Option<SqliteFavoritesStore>,
}

impl FavoritesStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open (or create) the backing database and replace the in-memory list
    /// with its persisted rows.
    pub fn attach_sqlite(&mut self, path: impl AsRef<Path>) -> Result<(), FavoritesError> {
        let store = SqliteFavoritesStore::open(path)?;
        self.entries = store.load_all()?;
        self.store = Some(store);
        Ok(())
    }

    pub fn add(&mut self, pet: Pet) -> Result<(), FavoritesError> {
        if self.entries.iter().any(|entry| entry.image_url == pet.image_url) {
            return Err(FavoritesError::DuplicateUrl(pet.image_url));
        }
        if let Some(store) = self.store.as_ref() {
            store.insert(&pet)?;
        }
        self.entries.push(pet);
        Ok(())
    }

    pub fn remove(&mut self, image_url: &str) -> Result<bool, FavoritesError> {
        let Some(position) = self
            .entries
            .iter()
            .position(|entry| entry.image_url == image_url)
        else {
            return Ok(false);
        };

        if let Some(store) = self.store.as_ref() {
            store.delete(image_url)?;
        }
        self.entries.remove(position);
        Ok(true)
    }

    pub fn find(&self, image_url: &str) -> Option<&Pet> {
        self.entries.iter().find(|entry| entry.image_url == image_url)
    }

    pub fn list(&self) -> &[Pet] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug)]
struct SqliteFavoritesStore {
    conn: Connection,
}

impl SqliteFavoritesStore {
    fn open(path: impl AsRef<Path>) -> Result<Self, FavoritesError> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.configure()?;
        store.migrate()?;
        Ok(store)
    }

    fn configure(&self) -> Result<(), FavoritesError> {
        self.conn.pragma_update(None, "journal_mode", "WAL")?;
        self.conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(())
    }

    fn migrate(&self) -> Result<(), FavoritesError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS favorites (
                position INTEGER PRIMARY KEY AUTOINCREMENT,
                image_url TEXT NOT NULL UNIQUE,
                image_id TEXT NOT NULL,
                name TEXT NOT NULL,
                is_special INTEGER NOT NULL DEFAULT 0
            );",
        )?;
        Ok(())
    }

    fn insert(&self, pet: &Pet) -> Result<(), FavoritesError> {
        self.conn.execute(
            "INSERT INTO favorites (image_url, image_id, name, is_special)
             VALUES (?1, ?2, ?3, ?4)",
            params![pet.image_url, pet.image_id, pet.name, pet.is_special as i64],
        )?;
        Ok(())
    }

    fn delete(&self, image_url: &str) -> Result<(), FavoritesError> {
        self.conn
            .execute("DELETE FROM favorites WHERE image_url = ?1", params![image_url])?;
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<Pet>, FavoritesError> {
        let mut statement = self.conn.prepare(
            "SELECT image_id, image_url, name, is_special
             FROM favorites ORDER BY position ASC",
        )?;
        let rows = statement.query_map([], |row| {
            Ok(Pet {
                image_id: row.get(0)?,
                image_url: row.get(1)?,
                name: row.get(2)?,
                is_special: row.get::<_, i64>(3)? != 0,
            })
        })?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }
}
