//! Pushes local image metadata edits and deletions to the remote `images`
//! table. Rows are matched on the owning user and the filename taken from
//! the image's storage key.
//!
//! Tags are not stored remotely yet. A sync that carries tags still updates
//! the other columns and reports `tags_skipped` on its receipt.

mod sqlite;
mod store;

use chrono::Utc;
use serde::{Deserialize, Serialize};

pub use sqlite::SqliteRowStore;
pub use store::{
    MemoryRowStore, RemoteRow, RowFilter, RowStore, RowUpdate, StoreError, IMAGES_TABLE,
};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("missing {what}")]
    MissingIdentifier { what: &'static str },
    #[error("no matching row found for {filename}")]
    NoMatchingRow { filename: String },
    #[error("store error: {message}")]
    Transport { message: String },
}

impl SyncError {
    /// Only transport failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Transport { .. })
    }
}

/// Local fields of an image that may be pushed. `None` means unchanged.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImageMetadata {
    pub pose_name: Option<String>,
    pub notes: Option<String>,
    pub is_favorite: Option<bool>,
    pub tags: Option<Vec<String>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncReceipt {
    pub rows_updated: usize,
    /// Set when the metadata carried tags, which stay local.
    pub tags_skipped: bool,
}

#[derive(Clone, Debug)]
pub struct BatchItem {
    pub storage_key: String,
    pub metadata: ImageMetadata,
}

#[derive(Debug)]
pub struct BatchEntry {
    pub storage_key: String,
    pub result: Result<SyncReceipt, SyncError>,
}

#[derive(Debug)]
pub struct BatchReport {
    pub all_ok: bool,
    pub results: Vec<BatchEntry>,
}

pub trait SyncLog: Send + Sync {
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
}

/// Forwards to `tracing` under the `posevault_core::sync` target.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLog;

impl SyncLog for TracingLog {
    fn info(&self, message: &str) {
        tracing::info!(target: "posevault_core::sync", "{message}");
    }

    fn warn(&self, message: &str) {
        tracing::warn!(target: "posevault_core::sync", "{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!(target: "posevault_core::sync", "{message}");
    }
}

/// Final `/`-delimited segment of a storage key.
pub fn filename_key(storage_key: &str) -> &str {
    storage_key.rsplit('/').next().unwrap_or(storage_key)
}

pub struct SyncClient<S, L = TracingLog> {
    store: S,
    log: L,
}

impl<S: RowStore> SyncClient<S, TracingLog> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            log: TracingLog,
        }
    }
}

impl<S: RowStore, L: SyncLog> SyncClient<S, L> {
    pub fn with_log(store: S, log: L) -> Self {
        Self { store, log }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn sync_metadata(
        &self,
        storage_key: &str,
        metadata: &ImageMetadata,
        user_id: &str,
    ) -> Result<SyncReceipt, SyncError> {
        let filter = match row_filter(storage_key, user_id) {
            Ok(filter) => filter,
            Err(err) => {
                self.log.warn(&format!("sync_metadata: {err}"));
                return Err(err);
            }
        };

        let tags_skipped = metadata.tags.is_some();
        if tags_skipped {
            self.log.warn(&format!(
                "tags for {} stay local; the remote table has no tags column",
                filter.name
            ));
        }

        let update = RowUpdate {
            name: metadata.pose_name.clone(),
            notes: metadata.notes.clone(),
            favorite: metadata.is_favorite,
            updated_at: Some(Utc::now()),
            deleted_at: None,
        };
        let rows_updated = self.apply(&filter, &update, "sync").await?;
        self.log
            .info(&format!("synced {} ({rows_updated} row(s))", filter.name));
        Ok(SyncReceipt {
            rows_updated,
            tags_skipped,
        })
    }

    /// Soft delete: stamps `deleted_at` on the matching rows.
    pub async fn sync_deletion(
        &self,
        storage_key: &str,
        user_id: &str,
    ) -> Result<SyncReceipt, SyncError> {
        let filter = match row_filter(storage_key, user_id) {
            Ok(filter) => filter,
            Err(err) => {
                self.log.warn(&format!("sync_deletion: {err}"));
                return Err(err);
            }
        };

        let now = Utc::now();
        let update = RowUpdate {
            updated_at: Some(now),
            deleted_at: Some(now),
            ..RowUpdate::default()
        };
        let rows_updated = self.apply(&filter, &update, "delete sync").await?;
        self.log
            .info(&format!("marked {} deleted ({rows_updated} row(s))", filter.name));
        Ok(SyncReceipt {
            rows_updated,
            tags_skipped: false,
        })
    }

    /// Syncs each item in order, one at a time. A failed item does not stop
    /// the rest.
    pub async fn batch_sync(&self, items: &[BatchItem], user_id: &str) -> BatchReport {
        let mut results = Vec::with_capacity(items.len());
        for item in items {
            let result = self
                .sync_metadata(&item.storage_key, &item.metadata, user_id)
                .await;
            results.push(BatchEntry {
                storage_key: item.storage_key.clone(),
                result,
            });
        }
        let all_ok = results.iter().all(|entry| entry.result.is_ok());
        BatchReport { all_ok, results }
    }

    async fn apply(
        &self,
        filter: &RowFilter,
        update: &RowUpdate,
        action: &str,
    ) -> Result<usize, SyncError> {
        let rows = match self.store.update_rows(IMAGES_TABLE, filter, update).await {
            Ok(rows) => rows,
            Err(err) => {
                self.log.error(&format!("{action} failed for {}: {err}", filter.name));
                return Err(SyncError::Transport {
                    message: err.to_string(),
                });
            }
        };
        if rows.is_empty() {
            self.log
                .warn(&format!("no matching row found for {}", filter.name));
            return Err(SyncError::NoMatchingRow {
                filename: filter.name.clone(),
            });
        }
        Ok(rows.len())
    }
}

fn row_filter(storage_key: &str, user_id: &str) -> Result<RowFilter, SyncError> {
    let storage_key = storage_key.trim();
    if storage_key.is_empty() {
        return Err(SyncError::MissingIdentifier {
            what: "storage key",
        });
    }
    let user_id = user_id.trim();
    if user_id.is_empty() {
        return Err(SyncError::MissingIdentifier { what: "user id" });
    }
    let filename = filename_key(storage_key);
    if filename.is_empty() {
        return Err(SyncError::MissingIdentifier {
            what: "filename in storage key",
        });
    }
    Ok(RowFilter {
        user_id: user_id.to_string(),
        name: filename.to_string(),
    })
}
