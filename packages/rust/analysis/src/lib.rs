//! LLM-backed analysis: structured intelligence extraction, narrative
//! summaries, person profiles, and the deterministic fit score.

pub mod extraction;
pub mod llm;
pub mod person;
pub mod prompts;
pub mod scoring;
pub mod summary;

pub use extraction::{build_combined_content, extract_company_intelligence, extract_json};
pub use llm::{AnthropicProvider, LlmClient, LlmRequest, OpenAiProvider};
pub use person::extract_person_profile;
pub use scoring::{compute_fit_score, parse_aum_billions, parse_dollar_range};
pub use summary::generate_company_summary;
