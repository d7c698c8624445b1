//! Page acquisition: direct HTTP fetching with local text extraction,
//! reader-service fallback, truncation, and content quality scoring.

pub mod extract;
pub mod fetch;
pub mod providers;
pub mod stage;

pub use extract::{extract_text, score_content_quality, truncate_content};
pub use providers::{DirectFetchProvider, ReaderProvider, ScrapeRequest, ScrapeResponse};
pub use stage::ScrapeStage;
