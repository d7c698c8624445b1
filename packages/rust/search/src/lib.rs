//! Search stage: query generation, search providers, and URL ranking.
//!
//! For each company a fixed set of targeted queries is issued through a
//! fallback chain (keyed API provider with inline scraping, then a
//! keyless HTML provider). Results are cached per query, then merged,
//! deduplicated by canonical URL, scored, and truncated.

pub mod providers;
pub mod ranker;
pub mod stage;
pub mod strategy;

pub use providers::{FreeSearchClient, PrimarySearchClient, SearchRequest, SearchResponse};
pub use ranker::rank_and_deduplicate;
pub use stage::{PersonSearchOutcome, SearchOutcome, SearchStage};
pub use strategy::{
    GeneratedQuery, company_queries, guess_domain, person_queries, team_page_query,
};
