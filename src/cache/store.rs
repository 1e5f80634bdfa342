//! Cache Stores
//!
//! Backends that persist [`CacheRecord`]s keyed by (base URL, resource).

use super::CacheRecord;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use moka::sync::Cache;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

/// Record store backing the response cache
pub trait CacheStore: Send + Sync {
    /// Find the record for (base_url, resource), fresh or not
    fn find(&self, base_url: &str, resource: &str) -> Result<Option<CacheRecord>>;

    /// Insert the record, replacing any record with the same key
    fn upsert(&self, record: CacheRecord) -> Result<()>;

    /// Delete records whose expiry is at or before `now`; returns how many
    fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize>;
}

type RecordKey = (String, String);

/// Process-local store.
///
/// Entries never expire on their own: an expired record stays readable so
/// the cache can report it as stale, until `purge_expired` drops it.
#[derive(Clone)]
pub struct MemoryStore {
    records: Cache<RecordKey, CacheRecord>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            records: Cache::builder().build(),
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.run_pending_tasks();
        self.records.entry_count() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryStore {
    fn find(&self, base_url: &str, resource: &str) -> Result<Option<CacheRecord>> {
        Ok(self
            .records
            .get(&(base_url.to_string(), resource.to_string())))
    }

    fn upsert(&self, record: CacheRecord) -> Result<()> {
        self.records.insert(record.key(), record);
        Ok(())
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let expired: Vec<RecordKey> = self
            .records
            .iter()
            .filter(|(_, record)| !record.is_fresh(now))
            .map(|(key, _)| (*key).clone())
            .collect();

        for key in &expired {
            self.records.invalidate(key);
        }
        Ok(expired.len())
    }
}

/// How long a writer waits on another process holding the database lock
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS api_cache (
    base_url              TEXT NOT NULL,
    resource              TEXT NOT NULL,
    request_args          TEXT NOT NULL,
    request_kwargs        TEXT NOT NULL,
    response_content      TEXT NOT NULL,
    response_content_json TEXT NOT NULL,
    expiry                INTEGER NOT NULL,
    updated_at            INTEGER NOT NULL,
    PRIMARY KEY (base_url, resource)
);
CREATE INDEX IF NOT EXISTS api_cache_expiry ON api_cache (expiry);
";

const UPSERT: &str = "
INSERT INTO api_cache (
    base_url, resource, request_args, request_kwargs,
    response_content, response_content_json, expiry, updated_at
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
ON CONFLICT (base_url, resource) DO UPDATE SET
    request_args = excluded.request_args,
    request_kwargs = excluded.request_kwargs,
    response_content = excluded.response_content,
    response_content_json = excluded.response_content_json,
    expiry = excluded.expiry,
    updated_at = excluded.updated_at
";

/// Store persisted in a SQLite database file.
///
/// Safe to share between processes: every write is a single statement and
/// concurrent writers wait on SQLite's lock instead of overwriting each other.
pub struct SqliteStore {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").field("path", &self.path).finish()
    }
}

impl SqliteStore {
    /// Open (or create) the database at `path`
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create cache dir {}", parent.display()))?;
        }

        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open cache database {}", path.display()))?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        tracing::debug!("Cache database {} in {} mode", path.display(), mode);
        conn.execute_batch(SCHEMA)
            .with_context(|| format!("Failed to create cache schema in {}", path.display()))?;

        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    /// Default location: `<cache_dir>/transtats/api_cache.db`
    pub fn default_path() -> Option<PathBuf> {
        dirs::cache_dir().map(|p| p.join("transtats").join("api_cache.db"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.conn.lock().map_err(|_| anyhow!("cache lock poisoned"))?;
        f(&conn)
    }
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<RawRecord> {
    Ok(RawRecord {
        base_url: row.get(0)?,
        resource: row.get(1)?,
        request_args: row.get(2)?,
        request_kwargs: row.get(3)?,
        response_content: row.get(4)?,
        response_content_json: row.get(5)?,
        expiry: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

/// Row as stored; JSON columns and timestamps still encoded
struct RawRecord {
    base_url: String,
    resource: String,
    request_args: String,
    request_kwargs: String,
    response_content: String,
    response_content_json: String,
    expiry: i64,
    updated_at: i64,
}

impl TryFrom<RawRecord> for CacheRecord {
    type Error = anyhow::Error;

    fn try_from(raw: RawRecord) -> Result<Self> {
        Ok(CacheRecord {
            request_args: serde_json::from_str(&raw.request_args)
                .context("Malformed request_args column")?,
            response_content_json: serde_json::from_str(&raw.response_content_json)
                .context("Malformed response_content_json column")?,
            expiry: timestamp(raw.expiry)?,
            updated_at: timestamp(raw.updated_at)?,
            base_url: raw.base_url,
            resource: raw.resource,
            request_kwargs: raw.request_kwargs,
            response_content: raw.response_content,
        })
    }
}

fn timestamp(millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| anyhow!("timestamp out of range: {}", millis))
}

impl CacheStore for SqliteStore {
    fn find(&self, base_url: &str, resource: &str) -> Result<Option<CacheRecord>> {
        let raw = self.with_conn(|conn| {
            conn.query_row(
                "SELECT base_url, resource, request_args, request_kwargs, response_content,
                        response_content_json, expiry, updated_at
                 FROM api_cache WHERE base_url = ?1 AND resource = ?2",
                params![base_url, resource],
                from_row,
            )
            .optional()
            .context("Cache lookup failed")
        })?;
        raw.map(CacheRecord::try_from).transpose()
    }

    fn upsert(&self, record: CacheRecord) -> Result<()> {
        let request_args = serde_json::to_string(&record.request_args)?;
        let response_json = serde_json::to_string(&record.response_content_json)?;
        self.with_conn(|conn| {
            conn.execute(
                UPSERT,
                params![
                    record.base_url,
                    record.resource,
                    request_args,
                    record.request_kwargs,
                    record.response_content,
                    response_json,
                    record.expiry.timestamp_millis(),
                    record.updated_at.timestamp_millis(),
                ],
            )
            .context("Cache upsert failed")?;
            Ok(())
        })
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM api_cache WHERE expiry <= ?1",
                params![now.timestamp_millis()],
            )
            .context("Cache purge failed")
        })
    }
}
