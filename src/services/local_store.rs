//! SQLite-backed remote store.
//!
//! Stands in for the hosted backend in local mode and in tests: rows live in
//! a `rusqlite` database and every successful write is published on an
//! in-process [`ChangeFeed`].

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::services::change_feed::ChangeFeed;
use crate::services::remote_store::{RemoteStore, Subscription};
use crate::types::bookmark::{Bookmark, NewBookmark};
use crate::types::errors::StoreError;

struct StoreState {
    db: Database,
    last_created_micros: i64,
}

/// Remote store implementation over a local SQLite database.
pub struct LocalStore {
    state: Mutex<StoreState>,
    feed: ChangeFeed,
}

impl LocalStore {
    /// Opens (or creates) the database file at `path`.
    pub fn open<P: AsRef<Path>>(path: P, channel_capacity: usize) -> Result<Self, StoreError> {
        Self::with_database(Database::open(path)?, channel_capacity)
    }

    /// Opens a throwaway in-memory store.
    pub fn open_in_memory(channel_capacity: usize) -> Result<Self, StoreError> {
        Self::with_database(Database::open_in_memory()?, channel_capacity)
    }

    fn with_database(db: Database, channel_capacity: usize) -> Result<Self, StoreError> {
        let last_created_micros: i64 = db.connection().query_row(
            "SELECT COALESCE(MAX(created_at), 0) FROM bookmarks",
            [],
            |row| row.get(0),
        )?;
        Ok(Self {
            state: Mutex::new(StoreState {
                db,
                last_created_micros,
            }),
            feed: ChangeFeed::new(channel_capacity),
        })
    }

    /// The feed this store publishes to.
    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, StoreState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Database("store lock poisoned".to_string()))
    }

    /// Creation timestamps are strictly increasing so the sort key never ties
    /// for rows written through this store.
    fn next_created_at(state: &mut StoreState) -> Result<DateTime<Utc>, StoreError> {
        let now = Utc::now().timestamp_micros();
        let micros = now.max(state.last_created_micros.saturating_add(1));
        state.last_created_micros = micros;
        DateTime::<Utc>::from_timestamp_micros(micros)
            .ok_or_else(|| StoreError::Database(format!("timestamp out of range: {}", micros)))
    }

    fn row_to_bookmark(row: &rusqlite::Row) -> rusqlite::Result<Bookmark> {
        let micros: i64 = row.get(4)?;
        let created_at = DateTime::<Utc>::from_timestamp_micros(micros).ok_or_else(|| {
            rusqlite::Error::IntegralValueOutOfRange(4, micros)
        })?;
        Ok(Bookmark {
            id: row.get(0)?,
            user_id: row.get(1)?,
            title: row.get(2)?,
            url: row.get(3)?,
            created_at,
        })
    }
}

impl RemoteStore for LocalStore {
    fn list_bookmarks(&self, user_id: &str) -> Result<Vec<Bookmark>, StoreError> {
        let state = self.lock_state()?;
        let mut stmt = state.db.connection().prepare(
            "SELECT id, user_id, title, url, created_at FROM bookmarks \
             WHERE user_id = ?1 ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map(params![user_id], Self::row_to_bookmark)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    fn insert_bookmark(&self, new: &NewBookmark) -> Result<Bookmark, StoreError> {
        let bookmark = {
            let mut state = self.lock_state()?;
            let created_at = Self::next_created_at(&mut state)?;
            let bookmark = Bookmark {
                id: Uuid::new_v4().to_string(),
                user_id: new.user_id.clone(),
                title: new.title.clone(),
                url: new.url.clone(),
                created_at,
            };
            state.db.connection().execute(
                "INSERT INTO bookmarks (id, user_id, title, url, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    bookmark.id,
                    bookmark.user_id,
                    bookmark.title,
                    bookmark.url,
                    created_at.timestamp_micros()
                ],
            )?;
            bookmark
        };

        tracing::debug!(id = %bookmark.id, user_id = %bookmark.user_id, "bookmark inserted");
        self.feed.publish_insert(&bookmark);
        Ok(bookmark)
    }

    fn delete_bookmark(&self, id: &str) -> Result<(), StoreError> {
        let affected = {
            let state = self.lock_state()?;
            state
                .db
                .connection()
                .execute("DELETE FROM bookmarks WHERE id = ?1", params![id])?
        };

        if affected > 0 {
            tracing::debug!(id, "bookmark deleted");
            self.feed.publish_delete(id);
        }
        Ok(())
    }

    fn subscribe_changes(&self, user_id: &str) -> Result<Subscription, StoreError> {
        self.feed.subscribe(user_id)
    }
}
