//! Narrative company summary generated from validated intelligence.

use tracing::{instrument, warn};

use prospector_shared::{CompanyIntelligence, CompanySummary, Result};

use crate::extraction::extract_json;
use crate::llm::LlmClient;
use crate::prompts::summary_prompt;

const SUMMARY_MAX_TOKENS: u32 = 2000;
const SUMMARY_TEMPERATURE: f32 = 0.2;

/// Generate the three-part summary. The model only ever sees structured
/// data here, never raw page content. A non-JSON response is kept as a
/// plain-text overview instead of being discarded.
#[instrument(skip_all, fields(company = %company_name))]
pub async fn generate_company_summary(
    llm: &LlmClient,
    company_name: &str,
    intelligence: &CompanyIntelligence,
) -> Result<CompanySummary> {
    let prompt = summary_prompt(company_name, intelligence);
    let response = llm
        .complete(prompt, SUMMARY_MAX_TOKENS, SUMMARY_TEMPERATURE)
        .await?;

    match serde_json::from_str::<CompanySummary>(extract_json(&response)) {
        Ok(summary) => Ok(summary),
        Err(e) => {
            warn!(error = %e, "summary response did not parse, keeping raw text");
            let trimmed = response.trim();
            let mut end = trimmed.len().min(500);
            while end > 0 && !trimmed.is_char_boundary(end) {
                end -= 1;
            }
            Ok(CompanySummary {
                overview: trimmed[..end].to_string(),
                ..Default::default()
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_json_parses_into_struct() {
        let raw = r#"{"overview": "Ridge is a lender.", "credit_focus": "Senior secured.", "notable_details": "Fund V closed."}"#;
        let summary: CompanySummary = serde_json::from_str(extract_json(raw)).expect("parse");
        assert_eq!(summary.overview, "Ridge is a lender.");
        assert_eq!(summary.credit_focus.as_deref(), Some("Senior secured."));
    }
}
