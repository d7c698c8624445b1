//! Structured intelligence extraction from scraped content.

use tracing::{instrument, warn};

use prospector_shared::{CompanyIntelligence, Result, ScrapedPage};

use crate::llm::LlmClient;
use crate::prompts::extraction_prompt;

const EXTRACTION_MAX_TOKENS: u32 = 5000;

/// Pull the first valid JSON object out of a model response. Strips
/// markdown fences first, then falls back to a balanced-brace scan for
/// responses that wrap the JSON in prose.
pub fn extract_json(text: &str) -> &str {
    let mut cleaned = text.trim();
    cleaned = cleaned.strip_prefix("```json").unwrap_or(cleaned);
    cleaned = cleaned.strip_prefix("```").unwrap_or(cleaned);
    cleaned = cleaned.strip_suffix("```").unwrap_or(cleaned);
    let cleaned = cleaned.trim();

    if serde_json::from_str::<serde_json::Value>(cleaned).is_ok() {
        return cleaned;
    }

    let Some(start) = cleaned.find('{') else {
        return cleaned;
    };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape = false;
    for (offset, c) in cleaned[start..].char_indices() {
        if escape {
            escape = false;
            continue;
        }
        match c {
            '\\' => escape = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    let candidate = &cleaned[start..start + offset + 1];
                    if serde_json::from_str::<serde_json::Value>(candidate).is_ok() {
                        return candidate;
                    }
                    break;
                }
            }
            _ => {}
        }
    }

    cleaned
}

/// Concatenate page contents into one document with numbered source
/// banners, so extracted items can cite `[Source N]`. Returns the text
/// and the number of usable pages.
pub fn build_combined_content(pages: &[ScrapedPage]) -> (String, usize) {
    let banner = "=".repeat(80);
    let mut sections = Vec::new();
    let mut valid = 0usize;

    for page in pages {
        if !page.has_content() {
            continue;
        }
        valid += 1;
        sections.push(format!(
            "\n{banner}\nSOURCE {valid} of {total}\nURL: {url}\nPAGE TITLE: {title}\n{banner}\n\n{content}\n",
            total = pages.len(),
            url = page.url,
            title = page.title,
            content = page.content,
        ));
    }

    (sections.join("\n"), valid)
}

/// Extract structured intelligence from scraped pages. Skips the LLM
/// entirely when no page has content; a malformed model response
/// degrades to empty intelligence rather than failing the company.
#[instrument(skip_all, fields(company = %company_name))]
pub async fn extract_company_intelligence(
    llm: &LlmClient,
    company_name: &str,
    pages: &[ScrapedPage],
) -> Result<CompanyIntelligence> {
    let (combined, urls_processed) = build_combined_content(pages);
    if urls_processed == 0 {
        warn!("no usable content, skipping extraction");
        return Ok(CompanyIntelligence::default());
    }

    let today = chrono::Utc::now().format("%B %d, %Y").to_string();
    let prompt = extraction_prompt(company_name, &today, urls_processed, &combined);
    let response = llm.complete(prompt, EXTRACTION_MAX_TOKENS, 0.0).await?;

    match serde_json::from_str::<CompanyIntelligence>(extract_json(&response)) {
        Ok(intelligence) => Ok(intelligence),
        Err(e) => {
            warn!(error = %e, "intelligence response did not parse, treating as empty");
            Ok(CompanyIntelligence::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(url: &str, content: &str) -> ScrapedPage {
        ScrapedPage {
            url: url.to_string(),
            title: "Title".into(),
            content: content.to_string(),
            content_length: content.len(),
            quality_score: 50.0,
            error: None,
        }
    }

    #[test]
    fn strips_markdown_fences() {
        let raw = "```json\n{\"a\": 1}\n```";
        assert_eq!(extract_json(raw), "{\"a\": 1}");
    }

    #[test]
    fn salvages_json_wrapped_in_prose() {
        let raw = "Here is the result: {\"companyOverview\": {\"aum\": \"$5 billion\"}} hope that helps";
        let json = extract_json(raw);
        let intel: CompanyIntelligence = serde_json::from_str(json).expect("parse");
        assert_eq!(intel.company_overview.aum.as_deref(), Some("$5 billion"));
    }

    #[test]
    fn ignores_braces_inside_strings() {
        let raw = "{\"overview\": \"uses { and } freely\"} trailing";
        let json = extract_json(raw);
        assert!(serde_json::from_str::<serde_json::Value>(json).is_ok());
    }

    #[test]
    fn combined_content_numbers_only_usable_pages() {
        let pages = vec![
            page("https://a.com", "first page content"),
            ScrapedPage::failed("https://b.com", "HTTP 403"),
            page("https://c.com", "third page content"),
        ];
        let (combined, valid) = build_combined_content(&pages);
        assert_eq!(valid, 2);
        assert!(combined.contains("SOURCE 1 of 3"));
        assert!(combined.contains("SOURCE 2 of 3"));
        assert!(!combined.contains("b.com"));
    }

    #[test]
    fn camel_case_response_maps_to_snake_case_fields() {
        let raw = r#"{
            "companyOverview": {"companyType": "Direct Lender", "assetBackedFocus": true},
            "investmentStrategy": {"lendingTypes": ["Unitranche"], "syndicationApproach": "Lead Arranger"},
            "recentActivity": {"fundRaisings": ["March 2026 - Fund V [Source 1]"]}
        }"#;
        let intel: CompanyIntelligence = serde_json::from_str(extract_json(raw)).expect("parse");
        assert_eq!(
            intel.company_overview.company_type.as_deref(),
            Some("Direct Lender")
        );
        assert_eq!(intel.company_overview.asset_backed_focus, Some(true));
        assert_eq!(intel.investment_strategy.lending_types, vec!["Unitranche"]);
        assert_eq!(intel.recent_activity.news_count(), 1);
        assert!(!intel.is_empty());
    }
}
