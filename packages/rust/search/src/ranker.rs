//! URL quality scoring, deduplication, and ranking.

use std::collections::HashMap;

use prospector_shared::{RankedUrl, SearchHit};
use url::Url;

/// Domain trust scores for private credit research.
const DOMAIN_SCORES: &[(&str, i32)] = &[
    ("pitchbook.com", 9),
    ("privatedebtinvestor.com", 9),
    ("middlemarketgrowth.org", 8),
    ("prnewswire.com", 8),
    ("businesswire.com", 8),
    ("globenewswire.com", 8),
    // Low: login walls block scraping; URLs still captured for profiles
    ("linkedin.com", 2),
    ("reuters.com", 7),
    ("bloomberg.com", 7),
    ("wsj.com", 7),
    ("ft.com", 7),
    ("sec.gov", 7),
    ("spglobal.com", 7),
    ("moodys.com", 6),
    ("pehub.com", 7),
    ("buyoutsinsider.com", 7),
    ("creditflux.com", 8),
    ("leveragedloan.com", 8),
];

/// Domains to deprioritize.
const DOMAIN_PENALTIES: &[(&str, i32)] = &[
    ("facebook.com", -10),
    ("instagram.com", -10),
    ("twitter.com", -5),
    ("x.com", -5),
    ("youtube.com", -3),
    ("wikipedia.org", -2),
    ("glassdoor.com", -8),
    ("indeed.com", -8),
    ("yelp.com", -10),
    ("reddit.com", -3),
    ("quora.com", -5),
];

/// Keywords that signal high relevance for private credit.
const RELEVANCE_KEYWORDS: &[&str] = &[
    "private credit",
    "direct lending",
    "middle market",
    "unitranche",
    "first lien",
    "senior secured",
    "portfolio",
    "fund",
    "aum",
    "credit facility",
    "leveraged",
    "mezzanine",
    "private debt",
    "credit agreement",
    "covenant",
];

/// Subpages that are high value on a company's own site.
const HIGH_VALUE_PATHS: &[&str] = &[
    "/credit",
    "/direct-lending",
    "/strategies",
    "/strategy",
    "/team",
    "/about",
    "/about-us",
    "/leadership",
    "/our-team",
    "/investment",
    "/investments",
    "/portfolio",
    "/funds",
];

/// Score, deduplicate, and rank search hits. Output has no duplicate
/// canonical URLs, is sorted by descending score (ties keep query
/// order), and is truncated to `max_urls`.
pub fn rank_and_deduplicate(
    hits: &[SearchHit],
    company_name: &str,
    max_urls: usize,
) -> Vec<RankedUrl> {
    let company_slug = clean_company_name(company_name);
    let mut by_key: HashMap<String, usize> = HashMap::new();
    let mut ranked: Vec<RankedUrl> = Vec::new();

    for hit in hits {
        let url = hit.url.trim();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            continue;
        }

        let key = normalize_url(url);
        if let Some(&idx) = by_key.get(&key) {
            // Track which queries rediscovered this URL; each extra
            // purpose boosts the score.
            let existing = &mut ranked[idx];
            if !existing
                .source_queries
                .iter()
                .any(|p| p == &hit.query_purpose)
            {
                existing.source_queries.push(hit.query_purpose.clone());
                existing.quality_score += 5;
            }
            continue;
        }

        let domain = extract_domain(url);
        let score = score_url(url, hit, &domain, &company_slug);

        by_key.insert(key, ranked.len());
        ranked.push(RankedUrl {
            url: url.to_string(),
            title: hit.title.clone(),
            domain,
            quality_score: score,
            source_queries: vec![hit.query_purpose.clone()],
        });
    }

    // Stable sort keeps insertion (query) order for equal scores.
    ranked.sort_by(|a, b| b.quality_score.cmp(&a.quality_score));
    ranked.truncate(max_urls);
    ranked
}

fn score_url(url: &str, hit: &SearchHit, domain: &str, company_slug: &str) -> i32 {
    let mut score = 50;

    // Company's own website gets a big boost.
    let is_company_site = is_company_domain(domain, company_slug);
    if is_company_site {
        score += 30;
        let path = url_path(url).to_lowercase();
        let path = path.trim_end_matches('/');
        if HIGH_VALUE_PATHS.iter().any(|hvp| path.contains(hvp)) {
            score += 10;
        }
    } else if let Some((_, bonus)) = DOMAIN_SCORES.iter().find(|(d, _)| domain.contains(d)) {
        score += bonus * 3;
    } else if let Some((_, penalty)) = DOMAIN_PENALTIES.iter().find(|(d, _)| domain.contains(d)) {
        score += penalty * 3;
    }

    // Lexical relevance from title and snippet.
    let combined = format!("{} {}", hit.title, hit.snippet).to_lowercase();
    let keyword_hits = RELEVANCE_KEYWORDS
        .iter()
        .filter(|kw| combined.contains(*kw))
        .count() as i32;
    score += (keyword_hits * 4).min(20);

    // Earlier positions in the provider's list score higher.
    if hit.position <= 3 {
        score += 10;
    } else if hit.position <= 6 {
        score += 5;
    } else if hit.position <= 10 {
        score += 2;
    }

    score
}

/// Squash a company name to a slug for domain matching.
fn clean_company_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}

/// A domain belongs to the company when its first label contains the
/// company slug. Short slugs are too ambiguous to match.
fn is_company_domain(domain: &str, company_slug: &str) -> bool {
    if company_slug.len() < 4 {
        return false;
    }
    let first_label = domain
        .trim_start_matches("www.")
        .split('.')
        .next()
        .unwrap_or_default();
    first_label.contains(company_slug)
}

/// Dedup key: host + path, lowercased, no trailing slash or fragment.
fn normalize_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => format!(
            "{}{}",
            parsed.host_str().unwrap_or_default(),
            parsed.path().trim_end_matches('/')
        )
        .to_lowercase(),
        Err(_) => url.trim_end_matches('/').to_lowercase(),
    }
}

fn extract_domain(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
        .unwrap_or_default()
}

fn url_path(url: &str) -> String {
    Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_default()
}
