//! Application configuration for Prospector.
//!
//! User config lives at `~/.prospector/prospector.toml`.
//! CLI flags override config file values, which override defaults.
//! API keys are never stored; config holds env var names only.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ProspectorError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "prospector.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".prospector";

/// Default database file name under the config directory.
const DB_FILE_NAME: &str = "prospector.db";

// ---------------------------------------------------------------------------
// Config structs (matching prospector.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Concurrency limits per service class.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Search provider settings.
    #[serde(default)]
    pub search: SearchConfig,

    /// Scraper settings.
    #[serde(default)]
    pub scrape: ScrapeConfig,

    /// LLM provider settings.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Cache TTLs and database location.
    #[serde(default)]
    pub cache: CacheConfig,
}

/// `[limits]` section — one pool size per service class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Companies processed in parallel.
    #[serde(default = "default_company_concurrency")]
    pub company_concurrency: u32,

    /// Concurrent search requests across the whole batch.
    #[serde(default = "default_search_concurrency")]
    pub search_concurrency: u32,

    /// Concurrent scrape requests across the whole batch.
    #[serde(default = "default_scrape_concurrency")]
    pub scrape_concurrency: u32,

    /// Concurrent LLM requests across the whole batch.
    #[serde(default = "default_llm_concurrency")]
    pub llm_concurrency: u32,

    /// People researched in parallel, pooled separately from companies.
    #[serde(default = "default_person_concurrency")]
    pub person_concurrency: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            company_concurrency: default_company_concurrency(),
            search_concurrency: default_search_concurrency(),
            scrape_concurrency: default_scrape_concurrency(),
            llm_concurrency: default_llm_concurrency(),
            person_concurrency: default_person_concurrency(),
        }
    }
}

fn default_company_concurrency() -> u32 {
    5
}
fn default_search_concurrency() -> u32 {
    3
}
fn default_scrape_concurrency() -> u32 {
    10
}
fn default_llm_concurrency() -> u32 {
    5
}
fn default_person_concurrency() -> u32 {
    4
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Name of the env var holding the primary search API key.
    #[serde(default = "default_search_key_env")]
    pub api_key_env: String,

    /// Query templates issued per company, capped at the template count.
    #[serde(default = "default_max_queries")]
    pub max_queries_per_company: usize,

    /// Results requested per query.
    #[serde(default = "default_max_search_results")]
    pub max_search_results: usize,

    /// Queries issued per person.
    #[serde(default = "default_max_person_queries")]
    pub max_person_queries: usize,

    /// URLs kept after ranking, per company.
    #[serde(default = "default_max_urls")]
    pub max_urls: usize,

    /// Minimum ms between requests to the keyless fallback provider.
    #[serde(default = "default_free_min_interval_ms")]
    pub free_min_interval_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_search_key_env(),
            max_queries_per_company: default_max_queries(),
            max_search_results: default_max_search_results(),
            max_person_queries: default_max_person_queries(),
            max_urls: default_max_urls(),
            free_min_interval_ms: default_free_min_interval_ms(),
        }
    }
}

fn default_search_key_env() -> String {
    "PRIMARY_SEARCH_API_KEY".into()
}
fn default_max_queries() -> usize {
    6
}
fn default_max_search_results() -> usize {
    10
}
fn default_max_person_queries() -> usize {
    2
}
fn default_max_urls() -> usize {
    12
}
fn default_free_min_interval_ms() -> u64 {
    2000
}

/// `[scrape]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    /// Per-request timeout in seconds.
    #[serde(default = "default_scrape_timeout_secs")]
    pub timeout_secs: u64,

    /// Attempts per URL before the fetch unit fails.
    #[serde(default = "default_scrape_max_attempts")]
    pub max_attempts: u32,

    /// Extracted text is truncated near this length at a sentence boundary.
    #[serde(default = "default_content_max_chars")]
    pub content_max_chars: usize,

    /// Below this many total characters a company is marked insufficient data.
    #[serde(default = "default_min_content_chars")]
    pub min_content_chars: usize,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_scrape_timeout_secs(),
            max_attempts: default_scrape_max_attempts(),
            content_max_chars: default_content_max_chars(),
            min_content_chars: default_min_content_chars(),
        }
    }
}

fn default_scrape_timeout_secs() -> u64 {
    30
}
fn default_scrape_max_attempts() -> u32 {
    3
}
fn default_content_max_chars() -> usize {
    15_000
}
fn default_min_content_chars() -> usize {
    400
}

/// `[llm]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Name of the env var holding the primary provider key.
    #[serde(default = "default_anthropic_key_env")]
    pub anthropic_api_key_env: String,

    /// Name of the env var holding the fallback provider key.
    #[serde(default = "default_openai_key_env")]
    pub openai_api_key_env: String,

    /// Primary provider model.
    #[serde(default = "default_anthropic_model")]
    pub anthropic_model: String,

    /// Fallback provider model.
    #[serde(default = "default_openai_model")]
    pub openai_model: String,

    /// Hard deadline per LLM call; on expiry the call is cancelled and the
    /// chain moves to the next provider.
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            anthropic_api_key_env: default_anthropic_key_env(),
            openai_api_key_env: default_openai_key_env(),
            anthropic_model: default_anthropic_model(),
            openai_model: default_openai_model(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_anthropic_key_env() -> String {
    "ANTHROPIC_API_KEY".into()
}
fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_anthropic_model() -> String {
    "claude-sonnet-4-20250514".into()
}
fn default_openai_model() -> String {
    "gpt-4o".into()
}
fn default_llm_timeout_secs() -> u64 {
    120
}

/// `[cache]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL for the search and scrape namespaces.
    #[serde(default = "default_cache_ttl_days")]
    pub cache_ttl_days: u32,

    /// TTL for the company and person repository namespaces.
    #[serde(default = "default_repository_ttl_days")]
    pub repository_ttl_days: u32,

    /// Database file path; defaults to `~/.prospector/prospector.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_ttl_days: default_cache_ttl_days(),
            repository_ttl_days: default_repository_ttl_days(),
            db_path: None,
        }
    }
}

fn default_cache_ttl_days() -> u32 {
    7
}
fn default_repository_ttl_days() -> u32 {
    90
}

// ---------------------------------------------------------------------------
// Run options (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Per-run options merged from the config file and CLI flags.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Treat every cache lookup as a miss; writes still land.
    pub force_refresh: bool,
    /// Process at most this many companies from the batch.
    pub max_companies: Option<usize>,
    /// When non-empty, only companies whose name matches (case-insensitive)
    /// are processed.
    pub company_filter: Vec<String>,
}

impl RunOptions {
    /// True when `name` passes the filter (or no filter is set).
    pub fn allows(&self, name: &str) -> bool {
        self.company_filter.is_empty()
            || self
                .company_filter
                .iter()
                .any(|f| f.eq_ignore_ascii_case(name))
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.prospector/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ProspectorError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.prospector/prospector.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Resolve the database path from config, defaulting under the config dir.
pub fn db_path(config: &AppConfig) -> Result<PathBuf> {
    match &config.cache.db_path {
        Some(p) => Ok(PathBuf::from(p)),
        None => Ok(config_dir()?.join(DB_FILE_NAME)),
    }
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ProspectorError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        ProspectorError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ProspectorError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ProspectorError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ProspectorError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read an API key from the env var named in config. Empty values count
/// as unset.
pub fn read_api_key(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Some(val),
        _ => None,
    }
}

/// Check that at least one LLM provider key is available. Search can fall
/// back to the keyless provider, but extraction has no keyless path.
pub fn validate_llm_keys(config: &AppConfig) -> Result<()> {
    let anthropic = read_api_key(&config.llm.anthropic_api_key_env);
    let openai = read_api_key(&config.llm.openai_api_key_env);
    if anthropic.is_none() && openai.is_none() {
        return Err(ProspectorError::config(format!(
            "no LLM API key found. Set {} or {}.",
            config.llm.anthropic_api_key_env, config.llm.openai_api_key_env
        )));
    }
    Ok(())
}
