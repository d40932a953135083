use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const IMAGES_TABLE: &str = "images";

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("unknown table: {0}")]
    UnknownTable(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store lock poisoned")]
    Poisoned,
}

/// Equality match on the owning user and the row name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RowFilter {
    pub user_id: String,
    pub name: String,
}

/// Column values to write. `None` leaves a column unchanged.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RowUpdate {
    pub name: Option<String>,
    pub notes: Option<String>,
    pub favorite: Option<bool>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RemoteRow {
    pub id: i64,
    pub user_id: String,
    pub name: String,
    pub notes: Option<String>,
    pub favorite: bool,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl RemoteRow {
    fn matches(&self, filter: &RowFilter) -> bool {
        self.user_id == filter.user_id && self.name == filter.name
    }

    fn apply(&mut self, update: &RowUpdate) {
        if let Some(name) = &update.name {
            self.name = name.clone();
        }
        if let Some(notes) = &update.notes {
            self.notes = Some(notes.clone());
        }
        if let Some(favorite) = update.favorite {
            self.favorite = favorite;
        }
        if update.updated_at.is_some() {
            self.updated_at = update.updated_at;
        }
        if update.deleted_at.is_some() {
            self.deleted_at = update.deleted_at;
        }
    }
}

/// A row-oriented remote store.
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Updates every row of `table` matching `filter` and returns the rows as
    /// they are after the update.
    async fn update_rows(
        &self,
        table: &str,
        filter: &RowFilter,
        update: &RowUpdate,
    ) -> Result<Vec<RemoteRow>, StoreError>;
}

/// In-process store, handy as a test double or for offline use.
#[derive(Debug, Default)]
pub struct MemoryRowStore {
    rows: Mutex<Vec<RemoteRow>>,
    failure: Mutex<Option<String>>,
    calls: AtomicUsize,
}

impl MemoryRowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user_id: &str, name: &str) -> Result<i64, StoreError> {
        let mut rows = self.rows.lock().map_err(|_| StoreError::Poisoned)?;
        let id = rows.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        rows.push(RemoteRow {
            id,
            user_id: user_id.to_string(),
            name: name.to_string(),
            notes: None,
            favorite: false,
            updated_at: None,
            deleted_at: None,
        });
        Ok(id)
    }

    /// Makes every following call fail with `message`.
    pub fn fail_with(&self, message: impl Into<String>) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = Some(message.into());
        }
    }

    pub fn rows(&self) -> Vec<RemoteRow> {
        self.rows.lock().map(|rows| rows.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RowStore for MemoryRowStore {
    async fn update_rows(
        &self,
        table: &str,
        filter: &RowFilter,
        update: &RowUpdate,
    ) -> Result<Vec<RemoteRow>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.failure.lock().map_err(|_| StoreError::Poisoned)?.clone() {
            return Err(StoreError::Unavailable(message));
        }
        if table != IMAGES_TABLE {
            return Err(StoreError::UnknownTable(table.to_string()));
        }

        let mut rows = self.rows.lock().map_err(|_| StoreError::Poisoned)?;
        let mut updated = Vec::new();
        for row in rows.iter_mut().filter(|row| row.matches(filter)) {
            row.apply(update);
            updated.push(row.clone());
        }
        Ok(updated)
    }
}
