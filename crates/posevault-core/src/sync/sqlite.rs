use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use super::store::{RemoteRow, RowFilter, RowStore, RowUpdate, StoreError, IMAGES_TABLE};

// `favoriate` is the column name as it exists in the remote schema.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS images (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    name TEXT NOT NULL,
    notes TEXT,
    favoriate INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT,
    deleted_at TEXT
);
CREATE INDEX IF NOT EXISTS images_user_name ON images (user_id, name);
"#;

const SELECT_COLUMNS: &str = "id, user_id, name, notes, favoriate, updated_at, deleted_at";

/// Local SQLite copy of the remote `images` table.
pub struct SqliteRowStore {
    conn: Mutex<Connection>,
}

impl SqliteRowStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|err| StoreError::Unavailable(format!("{}: {err}", parent.display())))?;
        }
        Self::initialize(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::initialize(Connection::open_in_memory()?)
    }

    fn initialize(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Registers an uploaded image so later metadata syncs can find it.
    pub fn insert_row(&self, user_id: &str, name: &str) -> Result<i64, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        conn.execute(
            "INSERT INTO images (user_id, name, created_at) VALUES (?1, ?2, ?3)",
            params![user_id, name, to_rfc3339(Utc::now())],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn rows_for_user(&self, user_id: &str) -> Result<Vec<RemoteRow>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM images WHERE user_id = ?1 ORDER BY id"
        ))?;
        let rows = stmt
            .query_map([user_id], read_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

#[async_trait]
impl RowStore for SqliteRowStore {
    async fn update_rows(
        &self,
        table: &str,
        filter: &RowFilter,
        update: &RowUpdate,
    ) -> Result<Vec<RemoteRow>, StoreError> {
        if table != IMAGES_TABLE {
            return Err(StoreError::UnknownTable(table.to_string()));
        }

        let mut conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let tx = conn.transaction()?;

        let ids = {
            let mut stmt = tx.prepare("SELECT id FROM images WHERE user_id = ?1 AND name = ?2")?;
            let ids = stmt
                .query_map(params![filter.user_id, filter.name], |row| row.get::<_, i64>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            ids
        };

        let (assignments, mut values) = assignments_for(update);
        if !assignments.is_empty() {
            let sql = format!(
                "UPDATE images SET {} WHERE id = ?{}",
                assignments.join(", "),
                values.len() + 1
            );
            values.push(Value::Null);
            let id_slot = values.len() - 1;
            for id in &ids {
                values[id_slot] = Value::Integer(*id);
                tx.execute(&sql, params_from_iter(values.iter()))?;
            }
        }

        let mut updated = Vec::with_capacity(ids.len());
        for id in &ids {
            let row = tx
                .query_row(
                    &format!("SELECT {SELECT_COLUMNS} FROM images WHERE id = ?1"),
                    [id],
                    read_row,
                )
                .optional()?;
            if let Some(row) = row {
                updated.push(row);
            }
        }
        tx.commit()?;
        Ok(updated)
    }
}

fn assignments_for(update: &RowUpdate) -> (Vec<String>, Vec<Value>) {
    let mut assignments = Vec::new();
    let mut values = Vec::new();
    let mut push = |column: &str, value: Value| {
        values.push(value);
        assignments.push(format!("{column} = ?{}", values.len()));
    };

    if let Some(name) = &update.name {
        push("name", Value::Text(name.clone()));
    }
    if let Some(notes) = &update.notes {
        push("notes", Value::Text(notes.clone()));
    }
    if let Some(favorite) = update.favorite {
        push("favoriate", Value::Integer(i64::from(favorite)));
    }
    if let Some(at) = update.updated_at {
        push("updated_at", Value::Text(to_rfc3339(at)));
    }
    if let Some(at) = update.deleted_at {
        push("deleted_at", Value::Text(to_rfc3339(at)));
    }
    (assignments, values)
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<RemoteRow> {
    Ok(RemoteRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        notes: row.get(3)?,
        favorite: row.get::<_, i64>(4)? != 0,
        updated_at: parse_rfc3339(row.get(5)?),
        deleted_at: parse_rfc3339(row.get(6)?),
    })
}

fn to_rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_rfc3339(raw: Option<String>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}
