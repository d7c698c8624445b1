//! Shared types, error model, and configuration for Prospector.
//!
//! This crate is the foundation depended on by all other Prospector crates.
//! It provides:
//! - [`ProspectorError`] — the unified error type
//! - Domain types ([`CompanyInput`], [`CompanyIntelligence`], [`FitScore`], ...)
//! - Configuration ([`AppConfig`], config loading)
//! - The [`FallbackChain`] provider executor and the [`Governor`] pools

pub mod config;
pub mod error;
pub mod fallback;
pub mod governor;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CacheConfig, LimitsConfig, LlmConfig, RunOptions, ScrapeConfig, SearchConfig,
    config_dir, config_file_path, db_path, init_config, load_config, load_config_from,
    read_api_key, validate_llm_keys,
};
pub use error::{ProspectorError, Result};
pub use fallback::{FallbackChain, Provider, ProviderFailure};
pub use governor::{Governor, Pacer, ServiceClass, backoff_delay};
pub use types::{
    CompanyInput, CompanyIntelligence, CompanyOverview, CompanyResult, CompanySummary,
    ContactInfo, Education, FitScore, InteractionRecord, InvestmentCriteria, InvestmentStrategy,
    PersonProfile, PortfolioHighlights, Rating, RecentActivity, RunId, RunStatus, RankedUrl,
    ScrapedPage, SearchHit, WorkExperience,
};
