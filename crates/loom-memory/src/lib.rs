//! Default `MemoryStore` implementation (§4.N) backing the `Memory` task
//! kind: a `rusqlite` table behind an idempotent migrations list, mirroring
//! the teacher's `deepseek-store` convention of a `schema_migrations`
//! table plus a `MIGRATIONS: &[(i64, &str)]` array applied in order.

use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use loom_core::{MemoryRecord, MemoryRecordInput, MemoryStore, Result};
use rusqlite::{params, Connection};

const MIGRATIONS: &[(i64, &str)] = &[(
    1,
    "CREATE TABLE IF NOT EXISTS memory_records (
        id TEXT PRIMARY KEY,
        content TEXT NOT NULL,
        tags TEXT NOT NULL,
        active INTEGER NOT NULL,
        description TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );",
)];

pub struct SqliteMemoryStore {
    conn: Mutex<Connection>,
}

impl SqliteMemoryStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        init_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// An in-memory store, handy for tests and for the default config
    /// before a workspace has been initialized.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        );",
    )?;
    for (version, sql) in MIGRATIONS {
        let already: i64 = conn.query_row(
            "SELECT COUNT(1) FROM schema_migrations WHERE version = ?1",
            [*version],
            |r| r.get(0),
        )?;
        if already == 0 {
            conn.execute_batch(sql)?;
            conn.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                params![version, Utc::now().to_rfc3339()],
            )?;
        }
    }
    Ok(())
}

fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<MemoryRecord> {
    let tags_json: String = row.get("tags")?;
    let tags: Vec<String> = serde_json::from_str(&tags_json).unwrap_or_default();
    Ok(MemoryRecord {
        id: row.get("id")?,
        content: row.get("content")?,
        tags,
        active: row.get::<_, i64>("active")? != 0,
        description: row.get("description")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

impl MemoryStore for SqliteMemoryStore {
    fn create(&self, record: MemoryRecordInput) -> Result<MemoryRecord> {
        let conn = self.conn.lock().expect("memory store mutex poisoned");
        let now = Utc::now().to_rfc3339();
        let id = uuid_v7_like(&now);
        let tags_json = serde_json::to_string(&record.tags)?;
        conn.execute(
            "INSERT INTO memory_records (id, content, tags, active, description, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                id,
                record.content.clone().unwrap_or_default(),
                tags_json,
                record.active.unwrap_or(true) as i64,
                record.description,
                now,
            ],
        )?;
        Ok(MemoryRecord {
            id,
            content: record.content.unwrap_or_default(),
            tags: record.tags,
            active: record.active.unwrap_or(true),
            description: record.description,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    fn update(&self, id: &str, record: MemoryRecordInput) -> Result<MemoryRecord> {
        let conn = self.conn.lock().expect("memory store mutex poisoned");
        let existing = conn.query_row(
            "SELECT id, content, tags, active, description, created_at, updated_at
             FROM memory_records WHERE id = ?1",
            [id],
            row_to_record,
        );
        let existing = existing.map_err(|_| anyhow::anyhow!("no memory record with id '{id}'"))?;

        let now = Utc::now().to_rfc3339();
        let content = record.content.unwrap_or(existing.content);
        let tags = if record.tags.is_empty() {
            existing.tags
        } else {
            record.tags
        };
        let active = record.active.unwrap_or(existing.active);
        let description = record.description.or(existing.description);
        let tags_json = serde_json::to_string(&tags)?;

        conn.execute(
            "UPDATE memory_records SET content = ?1, tags = ?2, active = ?3, description = ?4, updated_at = ?5
             WHERE id = ?6",
            params![content, tags_json, active as i64, description, now, id],
        )?;

        Ok(MemoryRecord {
            id: id.to_string(),
            content,
            tags,
            active,
            description,
            created_at: existing.created_at,
            updated_at: now,
        })
    }

    fn get(&self, id: &str) -> Result<Option<MemoryRecord>> {
        let conn = self.conn.lock().expect("memory store mutex poisoned");
        let result = conn.query_row(
            "SELECT id, content, tags, active, description, created_at, updated_at
             FROM memory_records WHERE id = ?1",
            [id],
            row_to_record,
        );
        match result {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock().expect("memory store mutex poisoned");
        let affected = conn.execute("DELETE FROM memory_records WHERE id = ?1", [id])?;
        Ok(affected > 0)
    }

    fn list(&self, active_only: bool) -> Result<Vec<MemoryRecord>> {
        let conn = self.conn.lock().expect("memory store mutex poisoned");
        let mut stmt = if active_only {
            conn.prepare(
                "SELECT id, content, tags, active, description, created_at, updated_at
                 FROM memory_records WHERE active = 1 ORDER BY created_at",
            )?
        } else {
            conn.prepare(
                "SELECT id, content, tags, active, description, created_at, updated_at
                 FROM memory_records ORDER BY created_at",
            )?
        };
        let rows = stmt.query_map([], row_to_record)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Into::into)
    }
}

/// A short, sortable, collision-resistant id derived from a timestamp and
/// an in-process counter — the memory store has no need for `uuid`'s
/// stricter guarantees, just a stable identifier per record.
fn uuid_v7_like(now_rfc3339: &str) -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("mem-{}-{n:06}", now_rfc3339.replace([':', '.', '+'], "-"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_get_round_trips() {
        let store = SqliteMemoryStore::open_in_memory().expect("store");
        let created = store
            .create(MemoryRecordInput {
                content: Some("remember this".to_string()),
                tags: vec!["note".to_string()],
                active: Some(true),
                description: None,
            })
            .expect("create");
        let fetched = store.get(&created.id).expect("get").expect("present");
        assert_eq!(fetched.content, "remember this");
        assert_eq!(fetched.tags, vec!["note".to_string()]);
    }

    #[test]
    fn update_preserves_unspecified_fields() {
        let store = SqliteMemoryStore::open_in_memory().expect("store");
        let created = store
            .create(MemoryRecordInput {
                content: Some("v1".to_string()),
                tags: vec!["a".to_string()],
                active: Some(true),
                description: Some("desc".to_string()),
            })
            .expect("create");
        let updated = store
            .update(
                &created.id,
                MemoryRecordInput {
                    content: Some("v2".to_string()),
                    tags: Vec::new(),
                    active: None,
                    description: None,
                },
            )
            .expect("update");
        assert_eq!(updated.content, "v2");
        assert_eq!(updated.tags, vec!["a".to_string()]);
        assert_eq!(updated.description, Some("desc".to_string()));
    }

    #[test]
    fn delete_removes_record() {
        let store = SqliteMemoryStore::open_in_memory().expect("store");
        let created = store
            .create(MemoryRecordInput::default())
            .expect("create");
        assert!(store.delete(&created.id).expect("delete"));
        assert!(store.get(&created.id).expect("get").is_none());
    }

    #[test]
    fn list_filters_by_active() {
        let store = SqliteMemoryStore::open_in_memory().expect("store");
        store
            .create(MemoryRecordInput {
                active: Some(true),
                ..Default::default()
            })
            .expect("create");
        store
            .create(MemoryRecordInput {
                active: Some(false),
                ..Default::default()
            })
            .expect("create");
        assert_eq!(store.list(false).expect("list all").len(), 2);
        assert_eq!(store.list(true).expect("list active").len(), 1);
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("memory.sqlite3");
        let id = {
            let store = SqliteMemoryStore::open(&db_path).expect("open");
            store
                .create(MemoryRecordInput {
                    content: Some("durable".to_string()),
                    ..Default::default()
                })
                .expect("create")
                .id
        };
        let reopened = SqliteMemoryStore::open(&db_path).expect("reopen");
        assert_eq!(
            reopened.get(&id).expect("get").expect("present").content,
            "durable"
        );
    }
}
