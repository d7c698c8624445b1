//! libSQL storage layer: layered TTL cache plus run tracking.
//!
//! The [`Storage`] struct wraps a local libSQL database holding the four
//! cache namespaces, research run records, final results, and the
//! prospect directory. One instance is opened per run and shared via
//! `Arc` with every component that needs it.

mod keys;
mod migrations;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use libsql::{Connection, Database, params};
use prospector_shared::{ProspectorError, Result};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

pub use keys::{canonical_url, company_key, person_key, query_key, url_key};

/// Logical cache partition. Search and scrape entries use the short TTL;
/// company and person entries use the long repository TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Search,
    Scrape,
    Company,
    Person,
}

impl Namespace {
    pub const ALL: [Namespace; 4] = [
        Namespace::Search,
        Namespace::Scrape,
        Namespace::Company,
        Namespace::Person,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Search => "search",
            Namespace::Scrape => "scrape",
            Namespace::Company => "company",
            Namespace::Person => "person",
        }
    }
}

/// A payload that carries no signal is treated as a miss, so an earlier
/// failed fetch never suppresses a retry.
fn is_empty_payload(payload: &str) -> bool {
    matches!(payload.trim(), "" | "null" | "[]" | "{}")
}

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl Storage {
    /// Open or create a database at `path` and apply pending migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ProspectorError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| ProspectorError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| ProspectorError::Storage(e.to_string()))?;

        let storage = Self { db, conn };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    ProspectorError::Storage(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    // -----------------------------------------------------------------------
    // Cache operations
    // -----------------------------------------------------------------------

    /// Look up a cache entry. Returns the payload only if the entry is
    /// fresh (`now - stored_at < ttl`) and non-empty; anything else is
    /// reported as a miss and left for the next put to overwrite.
    pub async fn cache_get(&self, ns: Namespace, key: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT payload, stored_at, ttl_secs FROM cache_entries
                 WHERE namespace = ?1 AND key = ?2",
                params![ns.as_str(), key],
            )
            .await
            .map_err(|e| ProspectorError::Storage(e.to_string()))?;

        let row = match rows.next().await {
            Ok(Some(row)) => row,
            Ok(None) => return Ok(None),
            Err(e) => return Err(ProspectorError::Storage(e.to_string())),
        };

        let payload: String = row
            .get(0)
            .map_err(|e| ProspectorError::Storage(e.to_string()))?;
        let stored_at: String = row
            .get(1)
            .map_err(|e| ProspectorError::Storage(e.to_string()))?;
        let ttl_secs: i64 = row
            .get(2)
            .map_err(|e| ProspectorError::Storage(e.to_string()))?;

        let stored_at = chrono::DateTime::parse_from_rfc3339(&stored_at)
            .map_err(|e| ProspectorError::Storage(format!("invalid stored_at: {e}")))?
            .with_timezone(&Utc);
        let age = Utc::now().signed_duration_since(stored_at);

        if age.num_seconds() >= ttl_secs || is_empty_payload(&payload) {
            return Ok(None);
        }
        Ok(Some(payload))
    }

    /// Store a cache entry, overwriting any existing row for the key.
    pub async fn cache_put(
        &self,
        ns: Namespace,
        key: &str,
        payload: &str,
        ttl: Duration,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO cache_entries (namespace, key, payload, stored_at, ttl_secs)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(namespace, key) DO UPDATE SET
                   payload = excluded.payload,
                   stored_at = excluded.stored_at,
                   ttl_secs = excluded.ttl_secs",
                params![
                    ns.as_str(),
                    key,
                    payload,
                    now.as_str(),
                    ttl.as_secs() as i64
                ],
            )
            .await
            .map_err(|e| ProspectorError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Delete every cache entry in every namespace.
    pub async fn cache_invalidate_all(&self) -> Result<u64> {
        let deleted = self
            .conn
            .execute("DELETE FROM cache_entries", params![])
            .await
            .map_err(|e| ProspectorError::Storage(e.to_string()))?;
        tracing::info!(deleted, "cache cleared");
        Ok(deleted)
    }

    /// Entry counts per namespace.
    pub async fn cache_stats(&self) -> Result<Vec<(String, u64)>> {
        let mut rows = self
            .conn
            .query(
                "SELECT namespace, COUNT(*) FROM cache_entries GROUP BY namespace ORDER BY namespace",
                params![],
            )
            .await
            .map_err(|e| ProspectorError::Storage(e.to_string()))?;

        let mut stats = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let ns: String = row
                .get(0)
                .map_err(|e| ProspectorError::Storage(e.to_string()))?;
            let count: i64 = row
                .get(1)
                .map_err(|e| ProspectorError::Storage(e.to_string()))?;
            stats.push((ns, count as u64));
        }
        Ok(stats)
    }

    /// Keys currently held in the company namespace. Company keys are the
    /// normalized names themselves, so this lists the cached repository.
    pub async fn list_cached_companies(&self) -> Result<Vec<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT key FROM cache_entries WHERE namespace = ?1 ORDER BY key",
                params![Namespace::Company.as_str()],
            )
            .await
            .map_err(|e| ProspectorError::Storage(e.to_string()))?;

        let mut names = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            names.push(
                row.get::<String>(0)
                    .map_err(|e| ProspectorError::Storage(e.to_string()))?,
            );
        }
        Ok(names)
    }

    // -----------------------------------------------------------------------
    // Research run operations
    // -----------------------------------------------------------------------

    /// Insert a new pending run record. Returns the generated run ID.
    pub async fn insert_run(&self, company_name: &str) -> Result<String> {
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO research_runs (id, company_name, status, progress_pct, started_at)
                 VALUES (?1, ?2, 'pending', 0, ?3)",
                params![id.as_str(), company_name, now.as_str()],
            )
            .await
            .map_err(|e| ProspectorError::Storage(e.to_string()))?;
        Ok(id)
    }

    /// Record a stage transition for a run.
    pub async fn update_run_progress(
        &self,
        run_id: &str,
        status: &str,
        progress_pct: u32,
        progress_msg: &str,
    ) -> Result<()> {
        self.conn
            .execute(
                "UPDATE research_runs SET status = ?1, progress_pct = ?2, progress_msg = ?3
                 WHERE id = ?4",
                params![status, progress_pct, progress_msg, run_id],
            )
            .await
            .map_err(|e| ProspectorError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Mark a run terminal (done or failed) with its final payload.
    pub async fn complete_run(
        &self,
        run_id: &str,
        status: &str,
        result_json: Option<&str>,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "UPDATE research_runs
                 SET status = ?1, progress_pct = 100, completed_at = ?2, result_json = ?3
                 WHERE id = ?4",
                params![status, now.as_str(), result_json, run_id],
            )
            .await
            .map_err(|e| ProspectorError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Get one run record by ID.
    pub async fn get_run(&self, run_id: &str) -> Result<Option<RunRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, company_name, status, progress_pct, progress_msg, started_at, completed_at
                 FROM research_runs WHERE id = ?1",
                params![run_id],
            )
            .await
            .map_err(|e| ProspectorError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_run_record(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(ProspectorError::Storage(e.to_string())),
        }
    }

    /// Most recent runs, newest first.
    pub async fn list_runs(&self, limit: u32) -> Result<Vec<RunRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, company_name, status, progress_pct, progress_msg, started_at, completed_at
                 FROM research_runs ORDER BY started_at DESC LIMIT ?1",
                params![limit],
            )
            .await
            .map_err(|e| ProspectorError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_run_record(&row)?);
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Result and prospect operations
    // -----------------------------------------------------------------------

    /// Persist a final scored result for a run. Returns the result ID.
    #[allow(clippy::too_many_arguments)]
    pub async fn insert_result(
        &self,
        run_id: &str,
        company_name: &str,
        fit_total: Option<u8>,
        fit_rating: Option<&str>,
        intelligence_json: &str,
        profiles_json: &str,
        source_urls_json: &str,
    ) -> Result<String> {
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO research_results
                 (id, run_id, company_name, fit_total, fit_rating, intelligence_json, profiles_json, source_urls_json, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    id.as_str(),
                    run_id,
                    company_name,
                    fit_total.map(i64::from),
                    fit_rating,
                    intelligence_json,
                    profiles_json,
                    source_urls_json,
                    now.as_str()
                ],
            )
            .await
            .map_err(|e| ProspectorError::Storage(e.to_string()))?;
        Ok(id)
    }

    /// Upsert a prospect directory row. Existing contact details are kept
    /// when the new row has none.
    pub async fn upsert_prospect(
        &self,
        company_name: &str,
        person_name: &str,
        email: Option<&str>,
        linkedin_url: Option<&str>,
        source: &str,
    ) -> Result<()> {
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO prospects (id, company_name, person_name, email, linkedin_url, source, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(company_name, person_name) DO UPDATE SET
                   email = COALESCE(excluded.email, prospects.email),
                   linkedin_url = COALESCE(excluded.linkedin_url, prospects.linkedin_url),
                   source = excluded.source",
                params![
                    id.as_str(),
                    company_name,
                    person_name,
                    email,
                    linkedin_url,
                    source,
                    now.as_str()
                ],
            )
            .await
            .map_err(|e| ProspectorError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Prospects recorded for a company.
    pub async fn list_prospects(&self, company_name: &str) -> Result<Vec<ProspectRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT person_name, email, linkedin_url, source FROM prospects
                 WHERE company_name = ?1 ORDER BY person_name",
                params![company_name],
            )
            .await
            .map_err(|e| ProspectorError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(ProspectRecord {
                person_name: row
                    .get::<String>(0)
                    .map_err(|e| ProspectorError::Storage(e.to_string()))?,
                email: row.get::<String>(1).ok(),
                linkedin_url: row.get::<String>(2).ok(),
                source: row
                    .get::<String>(3)
                    .map_err(|e| ProspectorError::Storage(e.to_string()))?,
            });
        }
        Ok(results)
    }
}

/// A row from `research_runs`.
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: String,
    pub company_name: String,
    pub status: String,
    pub progress_pct: u32,
    pub progress_msg: Option<String>,
    pub started_at: String,
    pub completed_at: Option<String>,
}

/// A row from the prospect directory.
#[derive(Debug, Clone)]
pub struct ProspectRecord {
    pub person_name: String,
    pub email: Option<String>,
    pub linkedin_url: Option<String>,
    pub source: String,
}

fn row_to_run_record(row: &libsql::Row) -> Result<RunRecord> {
    Ok(RunRecord {
        id: row
            .get::<String>(0)
            .map_err(|e| ProspectorError::Storage(e.to_string()))?,
        company_name: row
            .get::<String>(1)
            .map_err(|e| ProspectorError::Storage(e.to_string()))?,
        status: row
            .get::<String>(2)
            .map_err(|e| ProspectorError::Storage(e.to_string()))?,
        progress_pct: row.get::<i64>(3).map(|v| v as u32).unwrap_or(0),
        progress_msg: row.get::<String>(4).ok(),
        started_at: row
            .get::<String>(5)
            .map_err(|e| ProspectorError::Storage(e.to_string()))?,
        completed_at: row.get::<String>(6).ok(),
    })
}

// ---------------------------------------------------------------------------
// CacheSession
// ---------------------------------------------------------------------------

/// Per-run view of the cache. Carries the force-refresh flag (every get
/// misses, puts still land) and per-key in-flight locks so concurrent
/// identical fetches collapse into one.
pub struct CacheSession {
    storage: Arc<Storage>,
    force_refresh: bool,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl CacheSession {
    pub fn new(storage: Arc<Storage>, force_refresh: bool) -> Self {
        Self {
            storage,
            force_refresh,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    pub async fn get(&self, ns: Namespace, key: &str) -> Result<Option<String>> {
        if self.force_refresh {
            return Ok(None);
        }
        self.storage.cache_get(ns, key).await
    }

    pub async fn put(&self, ns: Namespace, key: &str, payload: &str, ttl: Duration) -> Result<()> {
        self.storage.cache_put(ns, key, payload, ttl).await
    }

    /// Acquire the in-flight lock for one key. Callers hold the guard
    /// across their check-miss/fetch/store sequence.
    pub async fn key_lock(&self, ns: Namespace, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.locks.lock().await;
            map.entry(format!("{}:{key}", ns.as_str()))
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}
