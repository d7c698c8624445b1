//! SQL migration definitions for the Prospector database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a set of SQL statements executed within a transaction.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: cache_entries, research_runs, research_results, prospects",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Layered TTL cache, partitioned by namespace
CREATE TABLE IF NOT EXISTS cache_entries (
    namespace TEXT NOT NULL,
    key       TEXT NOT NULL,
    payload   TEXT NOT NULL,
    stored_at TEXT NOT NULL,
    ttl_secs  INTEGER NOT NULL,
    PRIMARY KEY (namespace, key)
);

CREATE INDEX IF NOT EXISTS idx_cache_namespace ON cache_entries(namespace);

-- One row per company research attempt
CREATE TABLE IF NOT EXISTS research_runs (
    id           TEXT PRIMARY KEY,
    company_name TEXT NOT NULL,
    status       TEXT NOT NULL,
    progress_pct INTEGER NOT NULL DEFAULT 0,
    progress_msg TEXT,
    started_at   TEXT NOT NULL,
    completed_at TEXT,
    result_json  TEXT
);

CREATE INDEX IF NOT EXISTS idx_runs_company ON research_runs(company_name);
CREATE INDEX IF NOT EXISTS idx_runs_status ON research_runs(status);

-- Final scored results, one per completed run
CREATE TABLE IF NOT EXISTS research_results (
    id                TEXT PRIMARY KEY,
    run_id            TEXT NOT NULL REFERENCES research_runs(id) ON DELETE CASCADE,
    company_name      TEXT NOT NULL,
    fit_total         INTEGER,
    fit_rating        TEXT,
    intelligence_json TEXT NOT NULL,
    profiles_json     TEXT NOT NULL,
    source_urls_json  TEXT NOT NULL,
    created_at        TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_results_company ON research_results(company_name);

-- Prospect directory: contact identity plus provenance
CREATE TABLE IF NOT EXISTS prospects (
    id           TEXT PRIMARY KEY,
    company_name TEXT NOT NULL,
    person_name  TEXT NOT NULL,
    email        TEXT,
    linkedin_url TEXT,
    source       TEXT NOT NULL,
    created_at   TEXT NOT NULL,
    UNIQUE(company_name, person_name)
);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
