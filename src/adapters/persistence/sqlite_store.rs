//! SQLite-backed material store via libsql. Implements MaterialStore.
//!
//! One database file (course_materials.db) in the data directory. The schema is
//! versioned with `PRAGMA user_version`; migrations only ever add tables and
//! indexes, so opening an older file never touches existing rows.

use crate::domain::{CourseMaterialBundle, DomainError, StoredCourseRecord};
use crate::ports::MaterialStore;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Database, params};
use std::path::{Path, PathBuf};
use tokio::sync::OnceCell;
use tracing::{debug, info};

pub const DB_FILE_NAME: &str = "course_materials.db";

/// Latest schema version. Bump together with a new entry in `MIGRATIONS`.
pub const SCHEMA_VERSION: i64 = 2;

const MATERIALS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS materials (
    course_id TEXT PRIMARY KEY,
    course_name TEXT NOT NULL,
    materials_json TEXT NOT NULL,
    last_updated TEXT NOT NULL
)"#;

/// Upload queue keyed by course. Only the schema is maintained here.
const UPLOAD_QUEUE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS upload_queue (
    course_id TEXT PRIMARY KEY,
    payload_json TEXT NOT NULL,
    queued_at TEXT NOT NULL
)"#;
const UPLOAD_QUEUE_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_upload_queue_queued_at ON upload_queue (queued_at)";

/// (version, statements). Applied in order when the file's version is lower.
const MIGRATIONS: &[(i64, &[&str])] = &[
    (1, &[MATERIALS_TABLE]),
    (2, &[UPLOAD_QUEUE_TABLE, UPLOAD_QUEUE_INDEX]),
];

fn repo_err(e: impl std::fmt::Display) -> DomainError {
    DomainError::Storage(e.to_string())
}

pub struct SqliteMaterialStore {
    db_path: PathBuf,
    db: OnceCell<Database>,
}

impl SqliteMaterialStore {
    /// Does not touch the disk; the database is opened on first use.
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            db_path: base_dir.as_ref().join(DB_FILE_NAME),
            db: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    async fn connection(&self) -> Result<Connection, DomainError> {
        let db = self
            .db
            .get_or_try_init(|| Self::open_database(&self.db_path))
            .await?;
        db.connect().map_err(repo_err)
    }

    async fn open_database(db_path: &Path) -> Result<Database, DomainError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(repo_err)?;
        }
        let path_str = db_path.to_string_lossy();
        let db = libsql::Builder::new_local(path_str.as_ref())
            .build()
            .await
            .map_err(repo_err)?;
        let conn = db.connect().map_err(repo_err)?;

        // PRAGMA returns a row; use query and drain (execute fails when rows are returned).
        for pragma in ["PRAGMA journal_mode=WAL", "PRAGMA synchronous=NORMAL"] {
            let mut rows = conn
                .query(pragma, ())
                .await
                .map_err(|e| DomainError::Storage(format!("{} failed: {}", pragma, e)))?;
            while rows.next().await.map_err(repo_err)?.is_some() {}
        }

        let from = Self::schema_version(&conn).await?;
        Self::migrate(&conn, from).await?;

        info!(
            path = %db_path.display(),
            from_version = from,
            version = SCHEMA_VERSION,
            "material store opened"
        );
        Ok(db)
    }

    async fn schema_version(conn: &Connection) -> Result<i64, DomainError> {
        let mut rows = conn.query("PRAGMA user_version", ()).await.map_err(repo_err)?;
        let version = match rows.next().await.map_err(repo_err)? {
            Some(row) => row.get::<i64>(0).map_err(repo_err)?,
            None => 0,
        };
        while rows.next().await.map_err(repo_err)?.is_some() {}
        Ok(version)
    }

    async fn migrate(conn: &Connection, from: i64) -> Result<(), DomainError> {
        for (version, statements) in MIGRATIONS.iter().filter(|(v, _)| *v > from) {
            for stmt in statements.iter() {
                conn.execute(stmt, ()).await.map_err(|e| {
                    DomainError::Storage(format!("migration v{} failed: {}", version, e))
                })?;
            }
            // PRAGMA does not accept bound parameters.
            conn.execute(&format!("PRAGMA user_version = {}", version), ())
                .await
                .map_err(repo_err)?;
            debug!(version, "applied schema migration");
        }
        Ok(())
    }

    fn encode_timestamp(ts: &DateTime<Utc>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
    }

    fn decode_timestamp(s: &str) -> Result<DateTime<Utc>, DomainError> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| DomainError::Storage(format!("bad last_updated '{}': {}", s, e)))
    }
}

#[async_trait::async_trait]
impl MaterialStore for SqliteMaterialStore {
    async fn open(&self) -> Result<(), DomainError> {
        self.connection().await.map(|_| ())
    }

    async fn save(&self, record: &StoredCourseRecord) -> Result<(), DomainError> {
        let materials_json = serde_json::to_string(&record.materials).map_err(repo_err)?;
        let bytes = materials_json.len();
        let conn = self.connection().await?;
        conn.execute(
            r#"
            INSERT INTO materials (course_id, course_name, materials_json, last_updated)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (course_id) DO UPDATE SET
                course_name = excluded.course_name,
                materials_json = excluded.materials_json,
                last_updated = excluded.last_updated
            "#,
            params![
                record.course_id.as_str(),
                record.course_name.as_str(),
                materials_json,
                Self::encode_timestamp(&record.last_updated)
            ],
        )
        .await
        .map_err(repo_err)?;
        info!(
            course_id = %record.course_id,
            bytes,
            "saved course materials"
        );
        Ok(())
    }

    async fn load(&self, course_id: &str) -> Result<Option<StoredCourseRecord>, DomainError> {
        let conn = self.connection().await?;
        let mut rows = conn
            .query(
                "SELECT course_id, course_name, materials_json, last_updated FROM materials WHERE course_id = ?1",
                params![course_id],
            )
            .await
            .map_err(repo_err)?;
        let Some(row) = rows.next().await.map_err(repo_err)? else {
            return Ok(None);
        };
        let course_id: String = row.get(0).map_err(repo_err)?;
        let course_name: String = row.get(1).map_err(repo_err)?;
        let materials_json: String = row.get(2).map_err(repo_err)?;
        let last_updated: String = row.get(3).map_err(repo_err)?;
        let materials: CourseMaterialBundle = serde_json::from_str(&materials_json)
            .map_err(|e| DomainError::Storage(format!("corrupt materials for {}: {}", course_id, e)))?;
        Ok(Some(StoredCourseRecord {
            course_id,
            course_name,
            materials,
            last_updated: Self::decode_timestamp(&last_updated)?,
        }))
    }

    async fn delete(&self, course_id: &str) -> Result<(), DomainError> {
        let conn = self.connection().await?;
        let removed = conn
            .execute("DELETE FROM materials WHERE course_id = ?1", params![course_id])
            .await
            .map_err(repo_err)?;
        debug!(course_id, removed, "deleted course materials");
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>, DomainError> {
        let conn = self.connection().await?;
        let mut rows = conn
            .query("SELECT course_id FROM materials ORDER BY course_id", ())
            .await
            .map_err(repo_err)?;
        let mut keys = Vec::new();
        while let Some(row) = rows.next().await.map_err(repo_err)? {
            keys.push(row.get::<String>(0).map_err(repo_err)?);
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FileRef;
    use serde_json::json;

    fn bundle() -> CourseMaterialBundle {
        CourseMaterialBundle {
            files: vec![FileRef {
                id: "1".into(),
                name: "syllabus.pdf".into(),
                url: "https://lms/files/1".into(),
                size: 2048,
                mime_type: "application/pdf".into(),
            }],
            ..Default::default()
        }
    }

    async fn table_exists(store: &SqliteMaterialStore, name: &str) -> bool {
        let conn = store.connection().await.unwrap();
        let mut rows = conn
            .query(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![name],
            )
            .await
            .unwrap();
        rows.next().await.unwrap().is_some()
    }

    #[tokio::test]
    async fn test_save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteMaterialStore::new(dir.path());
        let record = StoredCourseRecord::new("101", &json!("Biology"), bundle()).unwrap();
        store.save(&record).await.unwrap();

        let loaded = store.load("101").await.unwrap().unwrap();
        assert_eq!(loaded, record);
    }

    #[tokio::test]
    async fn test_coerced_name_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteMaterialStore::new(dir.path());
        let from_object =
            StoredCourseRecord::new("1", &json!({"name": "Chem"}), bundle()).unwrap();
        let from_number = StoredCourseRecord::new("2", &json!(17), bundle()).unwrap();
        store.save(&from_object).await.unwrap();
        store.save(&from_number).await.unwrap();

        assert_eq!(store.load("1").await.unwrap().unwrap().course_name, "Chem");
        assert_eq!(
            store.load("2").await.unwrap().unwrap().course_name,
            crate::domain::CourseName::PLACEHOLDER
        );
    }

    #[tokio::test]
    async fn test_load_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteMaterialStore::new(dir.path());
        assert!(store.load("never-written").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_overwrites_wholesale() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteMaterialStore::new(dir.path());
        store
            .save(&StoredCourseRecord::new("5", &json!("Old"), bundle()).unwrap())
            .await
            .unwrap();
        let replacement =
            StoredCourseRecord::new("5", &json!("New"), CourseMaterialBundle::default()).unwrap();
        store.save(&replacement).await.unwrap();

        let loaded = store.load("5").await.unwrap().unwrap();
        assert_eq!(loaded.course_name, "New");
        assert!(loaded.materials.files.is_empty());
        assert_eq!(store.list_keys().await.unwrap(), ["5"]);
    }

    #[tokio::test]
    async fn test_delete_and_list_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteMaterialStore::new(dir.path());
        for id in ["b", "a", "c"] {
            store
                .save(&StoredCourseRecord::new(id, &json!(id), bundle()).unwrap())
                .await
                .unwrap();
        }
        store.delete("b").await.unwrap();
        store.delete("missing").await.unwrap();
        assert_eq!(store.list_keys().await.unwrap(), ["a", "c"]);
    }

    #[tokio::test]
    async fn test_open_is_idempotent_and_creates_schema() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteMaterialStore::new(dir.path());
        store.open().await.unwrap();
        store.open().await.unwrap();
        assert!(table_exists(&store, "materials").await);
        assert!(table_exists(&store, "upload_queue").await);
        let conn = store.connection().await.unwrap();
        assert_eq!(
            SqliteMaterialStore::schema_version(&conn).await.unwrap(),
            SCHEMA_VERSION
        );
    }

    #[tokio::test]
    async fn test_upgrade_from_v1_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DB_FILE_NAME);
        {
            let db = libsql::Builder::new_local(path.to_string_lossy().as_ref())
                .build()
                .await
                .unwrap();
            let conn = db.connect().unwrap();
            conn.execute(MATERIALS_TABLE, ()).await.unwrap();
            conn.execute("PRAGMA user_version = 1", ()).await.unwrap();
            let json = serde_json::to_string(&bundle()).unwrap();
            conn.execute(
                "INSERT INTO materials VALUES (?1, ?2, ?3, ?4)",
                params!["9", "Legacy", json, "2024-01-01T00:00:00Z"],
            )
            .await
            .unwrap();
        }

        let store = SqliteMaterialStore::new(dir.path());
        store.open().await.unwrap();
        assert!(table_exists(&store, "upload_queue").await);
        let legacy = store.load("9").await.unwrap().unwrap();
        assert_eq!(legacy.course_name, "Legacy");
        assert_eq!(legacy.materials, bundle());
    }
}
