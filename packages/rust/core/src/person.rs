//! Person research: targeted search, LinkedIn URL detection, team-page
//! harvesting, profile extraction, and CRM enrichment.

use futures::future::join_all;
use tracing::{debug, instrument, warn};

use prospector_analysis::extract_person_profile;
use prospector_search::{rank_and_deduplicate, team_page_query};
use prospector_shared::{
    CompanyInput, ContactInfo, PersonProfile, ScrapedPage, SearchHit, ServiceClass,
};
use prospector_storage::{Namespace, person_key};

use crate::pipeline::ResearchPipeline;

/// Snippet pages carry less signal than scraped pages; fixed mid-low score.
const SNIPPET_QUALITY: f64 = 30.0;
/// Team directory pages are reliable for titles; fixed score above snippets.
const TEAM_PAGE_QUALITY: f64 = 60.0;
const SNIPPET_LINE_CAP: usize = 15;
const MAX_PERSON_URLS: usize = 5;
const TEAM_CONTENT_CAP: usize = 20_000;
const SNIPPET_SOURCE_URL: &str = "search-snippets://aggregated";

impl ResearchPipeline {
    /// Research every person listed for a company. The team page is
    /// fetched once and shared across all of them. Returns the profiles
    /// plus a degraded flag when any person fell short.
    pub(crate) async fn research_people(
        &self,
        company: &CompanyInput,
        domain: &str,
    ) -> (Vec<PersonProfile>, bool) {
        let people = company.all_people();
        if people.is_empty() {
            return (Vec::new(), false);
        }

        let team_content = self.find_team_content(company.search_name(), domain).await;

        let results = join_all(people.iter().map(|person| {
            self.research_person(company, person, domain, team_content.as_deref())
        }))
        .await;

        let mut profiles = Vec::with_capacity(results.len());
        let mut degraded = false;
        for (profile, person_degraded) in results {
            degraded |= person_degraded;
            profiles.push(profile);
        }
        (profiles, degraded)
    }

    /// One person end to end under the person-level permit. Never fails;
    /// at worst the profile is just the name plus any CSV contact data.
    #[instrument(skip_all, fields(person = %person_name))]
    async fn research_person(
        &self,
        company: &CompanyInput,
        person_name: &str,
        domain: &str,
        team_content: Option<&str>,
    ) -> (PersonProfile, bool) {
        let _permit = self.governor.acquire(ServiceClass::Person).await;

        let company_name = &company.company_name;
        let search_name = company.search_name();
        let contact = company
            .contacts
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(person_name));

        let key = person_key(person_name, company_name);
        let _guard = self.cache.key_lock(Namespace::Person, &key).await;

        if let Some(mut cached) = self.load_cached_person(&key).await {
            debug!("person served from cache");
            apply_contact(&mut cached, contact);
            self.enrich_person(company_name, &mut cached).await;
            return (cached, false);
        }

        let outcome = self
            .search
            .search_person(person_name, search_name, Some(domain))
            .await;
        let mut degraded = outcome.degraded;

        let search_linkedin = outcome
            .hits
            .iter()
            .find(|h| h.url.contains("linkedin.com/in/"))
            .map(|h| h.url.clone());

        // LinkedIn blocks scrapers; keep those hits for the URL only.
        let scrapable: Vec<SearchHit> = outcome
            .hits
            .iter()
            .filter(|h| !h.url.contains("linkedin.com"))
            .cloned()
            .collect();
        let ranked = rank_and_deduplicate(&scrapable, search_name, MAX_PERSON_URLS);

        let mut pages = self
            .scrape
            .scrape_urls(&ranked, search_name, &outcome.inline_content)
            .await;
        if let Some(page) = snippet_page(person_name, &outcome.hits) {
            pages.push(page);
        }
        if let Some(content) = team_content {
            pages.push(team_page(search_name, domain, content));
        }
        let pages: Vec<ScrapedPage> = pages.into_iter().filter(|p| p.has_content()).collect();

        let mut profile = if pages.is_empty() {
            degraded = true;
            person_base(person_name, search_name)
        } else {
            match extract_person_profile(&self.llm, person_name, search_name, &pages).await {
                Ok(profile) => profile,
                Err(e) => {
                    warn!(error = %e, "person extraction failed");
                    degraded = true;
                    person_base(person_name, search_name)
                }
            }
        };

        // CSV contact data beats anything found online.
        let extracted_linkedin = profile.linkedin_url.take();
        profile.linkedin_url = contact
            .and_then(|c| c.linkedin_url.clone())
            .or(search_linkedin)
            .or(extracted_linkedin);
        apply_contact(&mut profile, contact);

        self.cache_person(&key, &profile).await;
        self.enrich_person(company_name, &mut profile).await;
        (profile, degraded)
    }

    /// Fetch the company's team directory once. Inline search content
    /// wins; otherwise the top hit is scraped directly.
    pub(crate) async fn find_team_content(
        &self,
        search_name: &str,
        domain: &str,
    ) -> Option<String> {
        let query = team_page_query(domain);
        let response = match self.search.search_one(&query).await {
            Ok(response) => response,
            Err(e) => {
                debug!(error = %e, "team page search failed");
                return None;
            }
        };

        if !response.inline_content.is_empty() {
            let mut combined = String::new();
            for (url, markdown) in &response.inline_content {
                if combined.len() >= TEAM_CONTENT_CAP {
                    break;
                }
                combined.push_str(&format!("--- Team page: {url} ---\n"));
                let room = TEAM_CONTENT_CAP.saturating_sub(combined.len());
                let mut end = markdown.len().min(room);
                while end > 0 && !markdown.is_char_boundary(end) {
                    end -= 1;
                }
                combined.push_str(&markdown[..end]);
                combined.push('\n');
            }
            if !combined.trim().is_empty() {
                return Some(combined);
            }
        }

        let hit = response.hits.first()?;
        let page = self.scrape.scrape_page(&hit.url, &hit.title, search_name).await;
        page.has_content().then_some(page.content)
    }

    async fn load_cached_person(&self, key: &str) -> Option<PersonProfile> {
        match self.cache.get(Namespace::Person, key).await {
            Ok(Some(payload)) => serde_json::from_str(&payload).ok(),
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "person cache read failed");
                None
            }
        }
    }

    async fn cache_person(&self, key: &str, profile: &PersonProfile) {
        let stripped = profile.clone().without_crm();
        let Ok(payload) = serde_json::to_string(&stripped) else {
            return;
        };
        if let Err(e) = self
            .cache
            .put(Namespace::Person, key, &payload, self.repository_ttl())
            .await
        {
            warn!(error = %e, "person cache write failed");
        }
    }

    async fn enrich_person(&self, company_name: &str, profile: &mut PersonProfile) {
        if !self.crm.is_configured() {
            return;
        }
        if let Err(e) = self.crm.enrich(company_name, profile).await {
            warn!(person = %profile.name, error = %e, "CRM enrichment failed");
        }
    }
}

fn person_base(person_name: &str, company_name: &str) -> PersonProfile {
    let mut profile = PersonProfile::named(person_name);
    profile.current_company = Some(company_name.to_string());
    profile
}

fn apply_contact(profile: &mut PersonProfile, contact: Option<&ContactInfo>) {
    let Some(contact) = contact else { return };
    if let Some(email) = &contact.email {
        profile.email = Some(email.clone());
    }
    if profile.linkedin_url.is_none() {
        profile.linkedin_url = contact.linkedin_url.clone();
    }
}

/// Aggregate search snippets into a synthetic page. Snippets alone are
/// often enough to recover a title and tenure.
fn snippet_page(person_name: &str, hits: &[SearchHit]) -> Option<ScrapedPage> {
    let lines: Vec<String> = hits
        .iter()
        .filter(|h| !h.snippet.trim().is_empty())
        .take(SNIPPET_LINE_CAP)
        .map(|h| {
            let label = if h.url.contains("linkedin.com") {
                "LinkedIn".to_string()
            } else {
                let mut end = h.title.len().min(50);
                while end > 0 && !h.title.is_char_boundary(end) {
                    end -= 1;
                }
                h.title[..end].to_string()
            };
            format!("- [{label}] {}", h.snippet.trim())
        })
        .collect();
    if lines.is_empty() {
        return None;
    }

    let content = format!(
        "Search result snippets about {person_name}:\n{}",
        lines.join("\n")
    );
    let content_length = content.len();
    Some(ScrapedPage {
        url: SNIPPET_SOURCE_URL.to_string(),
        title: format!("Search snippets: {person_name}"),
        content,
        content_length,
        quality_score: SNIPPET_QUALITY,
        error: None,
    })
}

fn team_page(company_name: &str, domain: &str, content: &str) -> ScrapedPage {
    let content = content.to_string();
    let content_length = content.len();
    ScrapedPage {
        url: format!("https://{domain}/team"),
        title: format!("{company_name} Team Directory"),
        content,
        content_length,
        quality_score: TEAM_PAGE_QUALITY,
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(url: &str, title: &str, snippet: &str) -> SearchHit {
        SearchHit {
            url: url.into(),
            title: title.into(),
            snippet: snippet.into(),
            ..Default::default()
        }
    }

    #[test]
    fn snippet_page_labels_linkedin_hits() {
        let hits = vec![
            hit(
                "https://www.linkedin.com/in/jane-roe",
                "Jane Roe - Managing Director",
                "Jane Roe is a Managing Director at Meridian Credit Partners.",
            ),
            hit(
                "https://example.com/press",
                "Meridian announces new hire",
                "Jane Roe joins the structured credit team.",
            ),
        ];
        let page = snippet_page("Jane Roe", &hits).unwrap();
        assert_eq!(page.url, SNIPPET_SOURCE_URL);
        assert!(page.content.starts_with("Search result snippets about Jane Roe:"));
        assert!(page.content.contains("- [LinkedIn] Jane Roe is a Managing Director"));
        assert!(page.content.contains("- [Meridian announces new hire]"));
        assert_eq!(page.quality_score, SNIPPET_QUALITY);
    }

    #[test]
    fn snippet_page_skips_empty_snippets() {
        let hits = vec![hit("https://example.com/a", "Title", "   ")];
        assert!(snippet_page("Jane Roe", &hits).is_none());
    }

    #[test]
    fn snippet_page_truncates_long_titles_on_char_boundary() {
        let long_title = "é".repeat(60);
        let hits = vec![hit("https://example.com/a", &long_title, "some snippet")];
        let page = snippet_page("Jane Roe", &hits).unwrap();
        assert!(page.content.contains("- ["));
    }

    #[test]
    fn team_page_uses_domain_and_fixed_quality() {
        let page = team_page("Meridian Credit", "meridiancredit.com", "Our team ...");
        assert_eq!(page.url, "https://meridiancredit.com/team");
        assert_eq!(page.title, "Meridian Credit Team Directory");
        assert_eq!(page.quality_score, TEAM_PAGE_QUALITY);
    }

    #[test]
    fn contact_email_overrides_extracted() {
        let mut profile = PersonProfile::named("Jane Roe");
        profile.email = Some("old@example.com".into());
        let contact = ContactInfo {
            name: "Jane Roe".into(),
            email: Some("jane@meridiancredit.com".into()),
            linkedin_url: None,
        };
        apply_contact(&mut profile, Some(&contact));
        assert_eq!(profile.email.as_deref(), Some("jane@meridiancredit.com"));
    }
}
