//! Core domain types for the research pipeline.
//!
//! Model responses arrive with camelCase keys; the intelligence and
//! profile structs carry serde aliases so either casing deserializes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for research run identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Batch input
// ---------------------------------------------------------------------------

/// A contact row attached to a company in the input batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin_url: Option<String>,
}

/// One company in the input batch.
///
/// `search_name` is the name used in queries when it differs from the
/// display name (e.g. a fund family researched under its manager's name).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyInput {
    pub company_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub people: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contacts: Vec<ContactInfo>,
}

impl CompanyInput {
    pub fn new(company_name: impl Into<String>) -> Self {
        Self {
            company_name: company_name.into(),
            search_name: None,
            people: Vec::new(),
            contacts: Vec::new(),
        }
    }

    /// Name to put in search queries.
    pub fn search_name(&self) -> &str {
        self.search_name.as_deref().unwrap_or(&self.company_name)
    }

    /// People to research: explicit people plus named contacts, deduplicated.
    pub fn all_people(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for name in self
            .people
            .iter()
            .chain(self.contacts.iter().map(|c| &c.name))
        {
            let trimmed = name.trim();
            if !trimmed.is_empty() && !out.iter().any(|n| n.eq_ignore_ascii_case(trimmed)) {
                out.push(trimmed.to_string());
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Search results
// ---------------------------------------------------------------------------

/// A single result returned by a search provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchHit {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub snippet: String,
    /// Which query template produced this hit (e.g. `fund_activity`).
    #[serde(default)]
    pub query_purpose: String,
    /// 1-based rank within the provider's result list.
    #[serde(default)]
    pub position: usize,
}

/// A deduplicated, scored URL ready for scraping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedUrl {
    pub url: String,
    pub title: String,
    pub domain: String,
    pub quality_score: i32,
    /// Purposes of every query that surfaced this URL.
    pub source_queries: Vec<String>,
}

// ---------------------------------------------------------------------------
// Scraped content
// ---------------------------------------------------------------------------

/// The outcome of scraping one URL. A failed scrape keeps its slot in the
/// result list with `error` set and empty content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedPage {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub content_length: usize,
    /// 0-100 heuristic relevance score.
    #[serde(default)]
    pub quality_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScrapedPage {
    pub fn failed(url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: String::new(),
            content: String::new(),
            content_length: 0,
            quality_score: 0.0,
            error: Some(error.into()),
        }
    }

    pub fn has_content(&self) -> bool {
        self.error.is_none() && !self.content.trim().is_empty()
    }
}

// ---------------------------------------------------------------------------
// Company intelligence
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompanyOverview {
    /// e.g. "Direct Lender", "BDC", "Private Equity".
    #[serde(default, alias = "companyType", skip_serializing_if = "Option::is_none")]
    pub company_type: Option<String>,
    /// Assets under management, as stated in source text (e.g. "$5 billion").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aum: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headquarters: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub founded: Option<String>,
    #[serde(default, alias = "websiteUrl", skip_serializing_if = "Option::is_none")]
    pub website_url: Option<String>,
    /// True when the firm leads with asset-backed rather than cash-flow lending.
    #[serde(default, alias = "assetBackedFocus", skip_serializing_if = "Option::is_none")]
    pub asset_backed_focus: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecentActivity {
    #[serde(default, alias = "recentDeals", skip_serializing_if = "Vec::is_empty")]
    pub recent_deals: Vec<String>,
    #[serde(default, alias = "fundRaisings", skip_serializing_if = "Vec::is_empty")]
    pub fund_raisings: Vec<String>,
    #[serde(default, alias = "executiveChanges", skip_serializing_if = "Vec::is_empty")]
    pub executive_changes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub acquisitions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub partnerships: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub announcements: Vec<String>,
}

impl RecentActivity {
    /// Total countable news items, used by the growth score.
    pub fn news_count(&self) -> usize {
        self.fund_raisings.len()
            + self.executive_changes.len()
            + self.acquisitions.len()
            + self.partnerships.len()
            + self.announcements.len()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvestmentStrategy {
    /// e.g. "senior secured", "unitranche", "mezzanine".
    #[serde(default, alias = "lendingTypes", skip_serializing_if = "Vec::is_empty")]
    pub lending_types: Vec<String>,
    /// e.g. "revolver", "delayed draw term loan".
    #[serde(default, alias = "facilityStructures", skip_serializing_if = "Vec::is_empty")]
    pub facility_structures: Vec<String>,
    /// Free text mentioning lead/sole/club/bilateral roles.
    #[serde(default, alias = "syndicationApproach", skip_serializing_if = "Option::is_none")]
    pub syndication_approach: Option<String>,
    #[serde(default, alias = "targetIndustries", skip_serializing_if = "Vec::is_empty")]
    pub target_industries: Vec<String>,
    #[serde(default, alias = "geographicFocus", skip_serializing_if = "Vec::is_empty")]
    pub geographic_focus: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvestmentCriteria {
    /// Stated check sizes, as ranges or single amounts (e.g. "$10M-$50M").
    #[serde(default, alias = "checkSizes", skip_serializing_if = "Vec::is_empty")]
    pub check_sizes: Vec<String>,
    #[serde(default, alias = "targetCompanySize", skip_serializing_if = "Option::is_none")]
    pub target_company_size: Option<String>,
    #[serde(default, alias = "investmentHorizon", skip_serializing_if = "Option::is_none")]
    pub investment_horizon: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortfolioHighlights {
    #[serde(default, alias = "notableInvestments", skip_serializing_if = "Vec::is_empty")]
    pub notable_investments: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sectors: Vec<String>,
    #[serde(default, alias = "performanceNotes", skip_serializing_if = "Option::is_none")]
    pub performance_notes: Option<String>,
}

/// Structured intelligence extracted from scraped content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompanyIntelligence {
    #[serde(default, alias = "companyOverview")]
    pub company_overview: CompanyOverview,
    #[serde(default, alias = "recentActivity")]
    pub recent_activity: RecentActivity,
    #[serde(default, alias = "investmentStrategy")]
    pub investment_strategy: InvestmentStrategy,
    #[serde(default, alias = "investmentCriteria")]
    pub investment_criteria: InvestmentCriteria,
    #[serde(default, alias = "portfolioHighlights")]
    pub portfolio_highlights: PortfolioHighlights,
}

impl CompanyIntelligence {
    /// True when extraction produced no usable signal. Empty intelligence
    /// is never cached and marks the result as insufficient data.
    pub fn is_empty(&self) -> bool {
        self.company_overview.company_type.is_none()
            && self.company_overview.aum.is_none()
            && self.company_overview.description.is_none()
            && self.recent_activity.recent_deals.is_empty()
            && self.recent_activity.news_count() == 0
            && self.investment_strategy.lending_types.is_empty()
            && self.investment_strategy.facility_structures.is_empty()
            && self.investment_criteria.check_sizes.is_empty()
            && self.portfolio_highlights.notable_investments.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Person profiles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkExperience {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub company: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Education {
    #[serde(default)]
    pub institution: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degree: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub years: Option<String>,
}

/// One logged touchpoint from the CRM, attached during enrichment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InteractionRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub summary: String,
}

/// A researched person at a target company.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonProfile {
    /// Populated by the pipeline; model responses rarely echo it back.
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, alias = "currentTitle", skip_serializing_if = "Option::is_none")]
    pub current_title: Option<String>,
    #[serde(default, alias = "currentCompany", skip_serializing_if = "Option::is_none")]
    pub current_company: Option<String>,
    #[serde(default, alias = "tenureCurrent", skip_serializing_if = "Option::is_none")]
    pub tenure_current: Option<String>,
    #[serde(default, alias = "priorExperience", skip_serializing_if = "Vec::is_empty")]
    pub prior_experience: Vec<WorkExperience>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub education: Vec<Education>,
    #[serde(default, alias = "bioSummary", skip_serializing_if = "Option::is_none")]
    pub bio_summary: Option<String>,
    #[serde(default, alias = "linkedinUrl", skip_serializing_if = "Option::is_none")]
    pub linkedin_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_urls: Vec<String>,
    /// CRM fields below are re-fetched per run, never cached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crm_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_contacted: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interactions: Vec<InteractionRecord>,
}

impl PersonProfile {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Strip CRM-owned fields before the profile goes in the cache.
    pub fn without_crm(mut self) -> Self {
        self.crm_status = None;
        self.last_contacted = None;
        self.interactions.clear();
        self
    }
}

// ---------------------------------------------------------------------------
// Summary and fit score
// ---------------------------------------------------------------------------

/// Short narrative summary generated from structured intelligence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompanySummary {
    #[serde(default)]
    pub overview: String,
    #[serde(default, alias = "creditFocus", skip_serializing_if = "Option::is_none")]
    pub credit_focus: Option<String>,
    #[serde(default, alias = "notableDetails", skip_serializing_if = "Option::is_none")]
    pub notable_details: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    High,
    Medium,
    Low,
}

impl std::fmt::Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Rating::High => "High",
            Rating::Medium => "Medium",
            Rating::Low => "Low",
        };
        write!(f, "{s}")
    }
}

/// Deterministic 0-100 fit score with the per-component breakdown.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FitScore {
    pub total: u8,
    pub rating: Rating,
    pub deal_volume: u8,
    pub strategy_complexity: u8,
    pub growth_trajectory: u8,
    pub product_fit: u8,
}

// ---------------------------------------------------------------------------
// Run status and results
// ---------------------------------------------------------------------------

/// Lifecycle of a single company's research run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Searching,
    Scraping,
    Extracting,
    Scoring,
    Summarizing,
    PersonResearch,
    Done,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Searching => "searching",
            RunStatus::Scraping => "scraping",
            RunStatus::Extracting => "extracting",
            RunStatus::Scoring => "scoring",
            RunStatus::Summarizing => "summarizing",
            RunStatus::PersonResearch => "person_research",
            RunStatus::Done => "done",
            RunStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RunStatus::Pending),
            "searching" => Ok(RunStatus::Searching),
            "scraping" => Ok(RunStatus::Scraping),
            "extracting" => Ok(RunStatus::Extracting),
            "scoring" => Ok(RunStatus::Scoring),
            "summarizing" => Ok(RunStatus::Summarizing),
            "person_research" => Ok(RunStatus::PersonResearch),
            "done" => Ok(RunStatus::Done),
            "failed" => Ok(RunStatus::Failed),
            other => Err(format!("unknown run status: {other}")),
        }
    }
}

/// The assembled result for one company. Batch output preserves input
/// order, with failed companies present as error results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyResult {
    pub company_name: String,
    #[serde(default)]
    pub intelligence: CompanyIntelligence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<CompanySummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fit_score: Option<FitScore>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub person_profiles: Vec<PersonProfile>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_urls: Vec<String>,
    pub processed_at: DateTime<Utc>,
    /// The intelligence came from the repository cache.
    #[serde(default)]
    pub from_cache: bool,
    /// At least one stage fell back or was skipped after exhaustion.
    #[serde(default)]
    pub degraded: bool,
    /// Too little source content to trust the extraction.
    #[serde(default)]
    pub insufficient_data: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CompanyResult {
    /// Result slot for a company whose run failed outright.
    pub fn error_result(company_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            company_name: company_name.into(),
            intelligence: CompanyIntelligence::default(),
            summary: None,
            fit_score: None,
            person_profiles: Vec::new(),
            source_urls: Vec::new(),
            processed_at: Utc::now(),
            from_cache: false,
            degraded: false,
            insufficient_data: false,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_id_roundtrip() {
        let id = RunId::new();
        let s = id.to_string();
        let parsed: RunId = s.parse().expect("parse RunId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn intelligence_accepts_camel_case_keys() {
        let json = r#"{
            "companyOverview": {
                "companyType": "Direct Lender",
                "aum": "$5 billion",
                "assetBackedFocus": false
            },
            "investmentStrategy": {
                "lendingTypes": ["senior secured", "unitranche"],
                "syndicationApproach": "prefers to lead arrange"
            },
            "investmentCriteria": {"checkSizes": ["$25M"]}
        }"#;
        let intel: CompanyIntelligence = serde_json::from_str(json).expect("deserialize");
        assert_eq!(
            intel.company_overview.company_type.as_deref(),
            Some("Direct Lender")
        );
        assert_eq!(intel.investment_strategy.lending_types.len(), 2);
        assert_eq!(intel.investment_criteria.check_sizes, vec!["$25M"]);
        assert!(!intel.is_empty());
    }

    #[test]
    fn default_intelligence_is_empty() {
        assert!(CompanyIntelligence::default().is_empty());
    }

    #[test]
    fn all_people_merges_and_dedupes_contacts() {
        let input = CompanyInput {
            company_name: "Apex Credit".into(),
            search_name: None,
            people: vec!["Jane Roe".into(), " ".into()],
            contacts: vec![
                ContactInfo {
                    name: "jane roe".into(),
                    email: Some("jane@apex.example".into()),
                    linkedin_url: None,
                },
                ContactInfo {
                    name: "Sam Park".into(),
                    email: None,
                    linkedin_url: None,
                },
            ],
        };
        assert_eq!(input.all_people(), vec!["Jane Roe", "Sam Park"]);
    }

    #[test]
    fn run_status_roundtrip() {
        for status in [
            RunStatus::Pending,
            RunStatus::PersonResearch,
            RunStatus::Done,
            RunStatus::Failed,
        ] {
            let parsed: RunStatus = status.as_str().parse().expect("parse status");
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn without_crm_strips_crm_fields() {
        let profile = PersonProfile {
            name: "Jane Roe".into(),
            crm_status: Some("Active".into()),
            last_contacted: Some("2026-07-01".into()),
            interactions: vec![InteractionRecord {
                date: Some("2026-06-12".into()),
                channel: "email".into(),
                summary: "intro call follow-up".into(),
            }],
            ..Default::default()
        };
        let stripped = profile.without_crm();
        assert!(stripped.crm_status.is_none());
        assert!(stripped.interactions.is_empty());
    }
}
