//! rollcall-store — SQLite-backed identity store.
//!
//! One row per enrolled person; embeddings stored as little-endian f32
//! blobs, timestamps as RFC 3339 text, caller metadata as JSON text.

use chrono::{DateTime, Utc};
use rollcall_core::{Embedding, IdentityStore, PersonRecord, StoreError};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Mutex;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS persons (
    person_id            TEXT PRIMARY KEY,
    display_name         TEXT NOT NULL,
    embedding            BLOB,
    training_image_count INTEGER NOT NULL DEFAULT 0,
    enabled              INTEGER NOT NULL DEFAULT 1,
    last_trained_at      TEXT,
    metadata             TEXT NOT NULL DEFAULT 'null'
);
";

/// Encode an embedding as a little-endian f32 blob.
fn embedding_to_bytes(embedding: &Embedding) -> Vec<u8> {
    let mut out = Vec::with_capacity(embedding.values.len() * 4);
    for v in &embedding.values {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

fn bytes_to_embedding(bytes: &[u8]) -> Embedding {
    let values = bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    Embedding::new(values)
}

fn unavailable(e: rusqlite::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

/// SQLite implementation of [`IdentityStore`].
///
/// The connection sits behind a mutex: all store traffic comes from the
/// daemon's single engine thread, and the mutex only exists so the store is
/// `Sync` for tests and future callers.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and apply the schema.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Unavailable(format!("create {}: {e}", parent.display())))?;
        }
        let conn = Connection::open(path).map_err(unavailable)?;
        conn.execute_batch(SCHEMA).map_err(unavailable)?;
        tracing::info!(path = %path.display(), "identity store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory database, for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(unavailable)?;
        conn.execute_batch(SCHEMA).map_err(unavailable)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn row_to_record(row: &Row<'_>) -> rusqlite::Result<PersonRecord> {
        let embedding: Option<Vec<u8>> = row.get("embedding")?;
        let last_trained_at: Option<String> = row.get("last_trained_at")?;
        let metadata: String = row.get("metadata")?;
        Ok(PersonRecord {
            person_id: row.get("person_id")?,
            display_name: row.get("display_name")?,
            embedding: embedding.as_deref().map(bytes_to_embedding),
            training_image_count: row.get("training_image_count")?,
            enabled: row.get("enabled")?,
            last_trained_at: last_trained_at
                .as_deref()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|t| t.with_timezone(&Utc)),
            metadata: serde_json::from_str(&metadata).unwrap_or(serde_json::Value::Null),
        })
    }
}

impl IdentityStore for SqliteStore {
    fn load_enabled(&self) -> Result<Vec<PersonRecord>, StoreError> {
        let conn = self.conn.lock().unwrap_or_else(|p| p.into_inner());
        let mut stmt = conn
            .prepare("SELECT * FROM persons WHERE enabled = 1 ORDER BY person_id")
            .map_err(unavailable)?;
        let rows = stmt
            .query_map([], Self::row_to_record)
            .map_err(unavailable)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(unavailable)
    }

    fn fetch(&self, person_id: &str) -> Result<Option<PersonRecord>, StoreError> {
        let conn = self.conn.lock().unwrap_or_else(|p| p.into_inner());
        conn.query_row(
            "SELECT * FROM persons WHERE person_id = ?1",
            [person_id],
            Self::row_to_record,
        )
        .optional()
        .map_err(unavailable)
    }

    fn upsert(&self, record: &PersonRecord) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap_or_else(|p| p.into_inner());
        let metadata = serde_json::to_string(&record.metadata)
            .map_err(|e| StoreError::Unavailable(format!("metadata encode: {e}")))?;
        conn.execute(
            "INSERT INTO persons
                 (person_id, display_name, embedding, training_image_count,
                  enabled, last_trained_at, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(person_id) DO UPDATE SET
                 display_name = excluded.display_name,
                 embedding = excluded.embedding,
                 training_image_count = excluded.training_image_count,
                 enabled = excluded.enabled,
                 last_trained_at = excluded.last_trained_at,
                 metadata = excluded.metadata",
            params![
                record.person_id,
                record.display_name,
                record.embedding.as_ref().map(embedding_to_bytes),
                record.training_image_count,
                record.enabled,
                record.last_trained_at.map(|t| t.to_rfc3339()),
                metadata,
            ],
        )
        .map_err(unavailable)?;
        Ok(())
    }

    fn delete(&self, person_id: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap_or_else(|p| p.into_inner());
        let affected = conn
            .execute("DELETE FROM persons WHERE person_id = ?1", [person_id])
            .map_err(unavailable)?;
        if affected == 0 {
            return Err(StoreError::NotFound(person_id.to_string()));
        }
        Ok(())
    }

    fn set_enabled(&self, person_id: &str, enabled: bool) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap_or_else(|p| p.into_inner());
        let affected = conn
            .execute(
                "UPDATE persons SET enabled = ?2 WHERE person_id = ?1",
                params![person_id, enabled],
            )
            .map_err(unavailable)?;
        if affected == 0 {
            return Err(StoreError::NotFound(person_id.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, values: Vec<f32>) -> PersonRecord {
        PersonRecord {
            person_id: id.to_string(),
            display_name: format!("Student {id}"),
            embedding: Some(Embedding::new(values)),
            training_image_count: 3,
            enabled: true,
            last_trained_at: Some(Utc::now()),
            metadata: json!({"department": "CS"}),
        }
    }

    #[test]
    fn blob_roundtrip_preserves_values() {
        let e = Embedding::new(vec![0.25, -1.5, 3.0e-7]);
        let back = bytes_to_embedding(&embedding_to_bytes(&e));
        assert_eq!(e, back);
    }

    #[test]
    fn upsert_fetch_roundtrip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let r = record("s1", vec![1.0, 0.0, 0.5]);
        store.upsert(&r).unwrap();

        let got = store.fetch("s1").unwrap().unwrap();
        assert_eq!(got.display_name, "Student s1");
        assert_eq!(got.embedding.unwrap().values, vec![1.0, 0.0, 0.5]);
        assert_eq!(got.training_image_count, 3);
        assert!(got.enabled);
        assert!(got.last_trained_at.is_some());
        assert_eq!(got.metadata["department"], "CS");
    }

    #[test]
    fn fetch_missing_is_none() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.fetch("nobody").unwrap().is_none());
    }

    #[test]
    fn upsert_replaces_existing_row() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.upsert(&record("s1", vec![1.0, 0.0])).unwrap();
        let mut again = record("s1", vec![0.0, 1.0]);
        again.training_image_count = 5;
        store.upsert(&again).unwrap();

        let got = store.fetch("s1").unwrap().unwrap();
        assert_eq!(got.embedding.unwrap().values, vec![0.0, 1.0]);
        assert_eq!(got.training_image_count, 5);
        assert_eq!(store.load_enabled().unwrap().len(), 1);
    }

    #[test]
    fn load_enabled_skips_disabled() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.upsert(&record("s1", vec![1.0])).unwrap();
        store.upsert(&record("s2", vec![0.5])).unwrap();
        store.set_enabled("s2", false).unwrap();

        let loaded = store.load_enabled().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].person_id, "s1");

        store.set_enabled("s2", true).unwrap();
        assert_eq!(store.load_enabled().unwrap().len(), 2);
    }

    #[test]
    fn delete_missing_reports_not_found() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(matches!(
            store.delete("nobody"),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.set_enabled("nobody", false),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn untrained_person_has_null_embedding() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut r = record("s1", vec![]);
        r.embedding = None;
        r.training_image_count = 0;
        r.last_trained_at = None;
        store.upsert(&r).unwrap();

        let got = store.fetch("s1").unwrap().unwrap();
        assert!(got.embedding.is_none());
        assert!(got.last_trained_at.is_none());
    }
}
