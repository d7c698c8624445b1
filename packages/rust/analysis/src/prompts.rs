//! Prompt templates for intelligence extraction, company summaries, and
//! person profiles. Extraction prompts demand strict JSON with camelCase
//! keys; the shared types carry serde aliases for them.

use prospector_shared::CompanyIntelligence;

/// Structured company intelligence extraction. The model sees numbered
/// source banners so news items can cite `[Source N]`.
pub fn extraction_prompt(
    company_name: &str,
    today: &str,
    urls_processed: usize,
    combined_content: &str,
) -> String {
    format!(
        r#"You are analyzing {company_name} to create an intelligence profile for a private credit research tool.

**CRITICAL RULES:**
1. Extract ONLY information explicitly stated in the provided content
2. NEVER infer, assume, or generate information not present in the sources
3. When uncertain, omit the data point. Empty fields are better than wrong data
4. Use null for missing singular values, [] for missing arrays, false for missing booleans
5. For recent news: ONLY include items with a specific event AND at least an approximate timeframe
6. Today's date is {today}. Prioritize news from the last 12-18 months

**CONTENT TO ANALYZE**

You are analyzing content from {urls_processed} different web pages about {company_name}:

{combined_content}

**REQUIRED OUTPUT STRUCTURE**

Respond with ONLY valid JSON (no markdown, no explanations):

{{
  "companyOverview": {{
    "companyType": null,
    "aum": null,
    "founded": null,
    "headquarters": null,
    "websiteUrl": null,
    "assetBackedFocus": false,
    "description": null
  }},
  "recentActivity": {{
    "recentDeals": [],
    "fundRaisings": [],
    "executiveChanges": [],
    "acquisitions": [],
    "partnerships": [],
    "announcements": []
  }},
  "investmentStrategy": {{
    "lendingTypes": [],
    "facilityStructures": [],
    "syndicationApproach": null,
    "targetIndustries": [],
    "geographicFocus": []
  }},
  "investmentCriteria": {{
    "checkSizes": [],
    "targetCompanySize": null,
    "investmentHorizon": null
  }},
  "portfolioHighlights": {{
    "notableInvestments": [],
    "sectors": [],
    "performanceNotes": null
  }}
}}

**FIELD GUIDANCE**

**companyType**: PRIMARY business classification, only if the content clearly states it:
  "Direct Lender", "Private Credit Manager", "Private Equity Firm", "Multi-Strategy",
  "BDC", "Asset Manager", "CLO Manager", or null if unclear.

**aum**: Assets under management, most recent figure, preferring private credit AUM
  over firm-wide totals. Format: "$X billion" or "$X million".

**assetBackedFocus**: true only when the firm leads with asset-backed rather than
  cash-flow lending.

**lendingTypes**: Credit products they provide. Look for: First Lien, Unitranche,
  Second Lien, Mezzanine, Senior Secured, Subordinated, PIK, NAV Financing,
  Asset-Based Lending, Revolving Credit, Stretch Senior.

**facilityStructures**: Term Loan, Revolver, Delayed Draw, Bridge, Unitranche Facility.

**syndicationApproach**: A short phrase describing their role in deals, e.g.
  "Lead Arranger", "Sole Lender", "Club Deal", "Bilateral". null if not stated.

**checkSizes**: Per-deal commitment amounts. Look for "$X million", "hold sizes",
  "check sizes", "we can hold up to". Format as "$10M-$50M", "Up to $300 million".

**recentDeals**: Format: "Company Name - Deal Type - $Amount if stated [Source N]" (max 10).

**Recent activity items**: Each MUST include a timeframe.
  Format: "Month Year - Description [Source N]".

Extract all information now:"#
    )
}

fn fmt_list(items: &[String]) -> String {
    if items.is_empty() {
        "Not identified".to_string()
    } else {
        items.join(", ")
    }
}

fn fmt_opt(value: Option<&str>, fallback: &str) -> String {
    match value {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => fallback.to_string(),
    }
}

/// Narrative summary from validated intelligence. The model never sees
/// raw page content at this stage.
pub fn summary_prompt(company_name: &str, intelligence: &CompanyIntelligence) -> String {
    let overview = &intelligence.company_overview;
    let strategy = &intelligence.investment_strategy;
    let criteria = &intelligence.investment_criteria;
    let recent = &intelligence.recent_activity;

    let mut news: Vec<&String> = Vec::new();
    news.extend(&recent.fund_raisings);
    news.extend(&recent.executive_changes);
    news.extend(&recent.acquisitions);
    news.extend(&recent.partnerships);
    news.extend(&recent.announcements);
    let news_block = if news.is_empty() {
        "  No recent activity found".to_string()
    } else {
        news.iter()
            .map(|item| format!("  - {item}"))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let recent_deals: Vec<String> = recent.recent_deals.iter().take(5).cloned().collect();

    format!(
        r#"Summarize {company_name} for a sales research brief. Use ONLY the validated data below. Do not fabricate.

**COMPANY DATA:**
- Name: {company_name}
- Type: {company_type}
- AUM: {aum}
- Founded: {founded}
- HQ: {headquarters}
- Lending Types: {lending_types}
- Structures: {structures}
- Syndication Role: {syndication}
- Check Sizes: {check_sizes}
- Geography: {geography}
- Industries: {industries}
- Recent Deals: {deals}
- Recent News:
{news_block}

**OUTPUT:** Respond with ONLY valid JSON (no markdown):

{{
  "overview": "3-4 sentences: what {company_name} does, their scale, market positioning",
  "credit_focus": "2-3 sentences: their private credit / lending approach, strategies, deal preferences",
  "notable_details": "2-3 sentences: anything else noteworthy. Recent activity, growth signals, unique aspects"
}}

Be factual and concise. If data is missing, say so briefly rather than guessing."#,
        company_type = fmt_opt(overview.company_type.as_deref(), "Unknown"),
        aum = fmt_opt(overview.aum.as_deref(), "Not found"),
        founded = fmt_opt(overview.founded.as_deref(), "Not found"),
        headquarters = fmt_opt(overview.headquarters.as_deref(), "Not found"),
        lending_types = fmt_list(&strategy.lending_types),
        structures = fmt_list(&strategy.facility_structures),
        syndication = fmt_opt(strategy.syndication_approach.as_deref(), "Not identified"),
        check_sizes = fmt_list(&criteria.check_sizes),
        geography = fmt_list(&strategy.geographic_focus),
        industries = fmt_list(&strategy.target_industries),
        deals = fmt_list(&recent_deals),
    )
}

/// Person background extraction from scraped profile pages.
pub fn person_prompt(person_name: &str, company_name: &str, combined_content: &str) -> String {
    format!(
        r#"Extract professional background information for {person_name} who works at {company_name}.

**CONTENT TO ANALYZE:**

{combined_content}

**RULES:**
1. Extract ONLY information explicitly stated in the content. NEVER invent or guess
2. Do NOT fabricate titles, dates, companies, education, or career details
3. If information is not found, use null or empty arrays. Empty is always better than wrong
4. Do NOT generate a bioSummary without real facts about the person. Return null instead
5. Do NOT guess titles like "Managing Director" unless explicitly stated in the content

**OUTPUT:** Respond with ONLY valid JSON (no markdown):

{{
  "currentTitle": null,
  "currentCompany": "{company_name}",
  "tenureCurrent": null,
  "linkedinUrl": null,
  "priorExperience": [
    {{
      "company": "Previous Company Name",
      "title": "Their Title",
      "duration": "YYYY-YYYY (X years)"
    }}
  ],
  "education": [
    {{
      "institution": "University Name",
      "degree": "MBA, BS Finance, etc.",
      "years": "YYYY"
    }}
  ],
  "bioSummary": "2-3 sentence summary of their career trajectory and expertise"
}}

**FIELD NOTES:**
- **currentTitle**: Their current job title at {company_name}
- **tenureCurrent**: How long they have been at {company_name}, e.g. "3 years" or "Since 2019"
- **linkedinUrl**: Their LinkedIn profile URL if found in the content
- **priorExperience**: Previous jobs, most recent first
- **education**: Schools, degrees, graduation years
- **bioSummary**: Brief professional summary based on the facts found

Extract information for {person_name} now:"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_prompt_embeds_sources_and_schema() {
        let prompt = extraction_prompt("Ridge Capital", "August 30, 2026", 3, "SOURCE 1 ...");
        assert!(prompt.contains("Ridge Capital"));
        assert!(prompt.contains("3 different web pages"));
        assert!(prompt.contains("\"companyOverview\""));
        assert!(prompt.contains("\"lendingTypes\""));
    }

    #[test]
    fn summary_prompt_reports_missing_data() {
        let prompt = summary_prompt("Ridge Capital", &CompanyIntelligence::default());
        assert!(prompt.contains("Type: Unknown"));
        assert!(prompt.contains("AUM: Not found"));
        assert!(prompt.contains("No recent activity found"));
    }

    #[test]
    fn summary_prompt_lists_news_items() {
        let mut intel = CompanyIntelligence::default();
        intel
            .recent_activity
            .fund_raisings
            .push("March 2026 - Closed Fund V at $4 billion [Source 2]".into());
        let prompt = summary_prompt("Ridge Capital", &intel);
        assert!(prompt.contains("- March 2026 - Closed Fund V"));
    }

    #[test]
    fn person_prompt_names_person_and_company() {
        let prompt = person_prompt("Jane Doe", "Ridge Capital", "some page text");
        assert!(prompt.contains("Jane Doe"));
        assert!(prompt.contains("\"currentCompany\": \"Ridge Capital\""));
    }
}
