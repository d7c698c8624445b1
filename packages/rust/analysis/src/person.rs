//! Person profile extraction from scraped profile pages.

use tracing::{instrument, warn};

use prospector_shared::{PersonProfile, Result, ScrapedPage};

use crate::extraction::{build_combined_content, extract_json};
use crate::llm::LlmClient;
use crate::prompts::person_prompt;

const PERSON_MAX_TOKENS: u32 = 3000;

/// Extract a person's professional background. With no usable content
/// the LLM is skipped and a bare named profile comes back; the person
/// pipeline fills in whatever it learned elsewhere (email, LinkedIn).
#[instrument(skip_all, fields(person = %person_name))]
pub async fn extract_person_profile(
    llm: &LlmClient,
    person_name: &str,
    company_name: &str,
    pages: &[ScrapedPage],
) -> Result<PersonProfile> {
    let (combined, urls_processed) = build_combined_content(pages);
    if urls_processed == 0 {
        warn!("no content found for person");
        return Ok(base_profile(person_name, company_name));
    }

    let prompt = person_prompt(person_name, company_name, &combined);
    let response = llm.complete(prompt, PERSON_MAX_TOKENS, 0.0).await?;

    match serde_json::from_str::<PersonProfile>(extract_json(&response)) {
        Ok(mut profile) => {
            profile.name = person_name.to_string();
            if profile.current_company.is_none() {
                profile.current_company = Some(company_name.to_string());
            }
            profile.source_urls = pages
                .iter()
                .filter(|p| p.has_content())
                .map(|p| p.url.clone())
                .collect();
            Ok(profile)
        }
        Err(e) => {
            warn!(error = %e, "person response did not parse");
            Ok(base_profile(person_name, company_name))
        }
    }
}

fn base_profile(person_name: &str, company_name: &str) -> PersonProfile {
    PersonProfile {
        current_company: Some(company_name.to_string()),
        ..PersonProfile::named(person_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn person_json_maps_camel_case_fields() {
        let raw = r#"{
            "currentTitle": "Managing Director",
            "currentCompany": "Ridge Capital",
            "tenureCurrent": "Since 2019",
            "linkedinUrl": "https://linkedin.com/in/jdoe",
            "priorExperience": [{"company": "Summit Bank", "title": "VP", "duration": "2012-2019"}],
            "education": [{"institution": "Wharton", "degree": "MBA", "years": "2012"}],
            "bioSummary": "Credit veteran."
        }"#;
        let profile: PersonProfile = serde_json::from_str(extract_json(raw)).expect("parse");
        assert_eq!(profile.current_title.as_deref(), Some("Managing Director"));
        assert_eq!(profile.tenure_current.as_deref(), Some("Since 2019"));
        assert_eq!(profile.prior_experience.len(), 1);
        assert_eq!(profile.prior_experience[0].company, "Summit Bank");
        assert_eq!(profile.education[0].institution, "Wharton");
    }

    #[test]
    fn missing_name_in_response_is_overwritten() {
        // The JSON skeleton has no "name" field; serde default gives "".
        let profile: PersonProfile =
            serde_json::from_str(r#"{"currentTitle": "Partner"}"#).expect("parse");
        assert!(profile.name.is_empty());
    }
}
