//! Multi-query search strategy.
//!
//! Each company query targets a different aspect of credit intelligence;
//! person queries are capped hard to limit pressure on the keyless
//! fallback provider.

/// A query plus the purpose tag it was generated for. The purpose flows
/// through search hits into URL ranking.
#[derive(Debug, Clone)]
pub struct GeneratedQuery {
    pub query: String,
    pub purpose: &'static str,
}

/// Generate targeted queries for a company, truncated to `max`.
pub fn company_queries(search_name: &str, max: usize) -> Vec<GeneratedQuery> {
    let likely_domain = guess_domain(search_name);

    let queries = vec![
        GeneratedQuery {
            query: format!("\"{search_name}\" private credit direct lending"),
            purpose: "core_strategy",
        },
        GeneratedQuery {
            query: format!(
                "\"{search_name}\" site:{likely_domain} credit OR lending OR \"direct lending\""
            ),
            purpose: "company_site_credit",
        },
        GeneratedQuery {
            query: format!(
                "\"{search_name}\" AUM OR \"assets under management\" OR fund OR fundraise"
            ),
            purpose: "fund_activity",
        },
        GeneratedQuery {
            query: format!(
                "\"{search_name}\" unitranche OR \"first lien\" OR \"senior secured\" OR mezzanine"
            ),
            purpose: "deal_structure",
        },
        GeneratedQuery {
            query: format!(
                "\"{search_name}\" portfolio OR \"recent transaction\" OR deal OR \"credit facility\""
            ),
            purpose: "portfolio_deals",
        },
        GeneratedQuery {
            query: format!("\"{search_name}\" founded OR history OR \"about us\" OR team"),
            purpose: "about_team",
        },
    ];

    queries.into_iter().take(max).collect()
}

/// Generate queries for a person at a company. At most two: the combined
/// name query, then either a company-site search or an industry fallback.
pub fn person_queries(
    person_name: &str,
    company_name: &str,
    company_domain: Option<&str>,
) -> Vec<GeneratedQuery> {
    let mut queries = vec![GeneratedQuery {
        query: format!("\"{person_name}\" \"{company_name}\""),
        purpose: "person_at_company",
    }];

    match company_domain {
        Some(domain) => queries.push(GeneratedQuery {
            query: format!("site:{domain} \"{person_name}\""),
            purpose: "person_company_site",
        }),
        None => queries.push(GeneratedQuery {
            query: format!("\"{person_name}\" private credit OR direct lending"),
            purpose: "person_industry",
        }),
    }

    queries
}

/// Query to find the company's team or professionals directory page.
pub fn team_page_query(company_domain: &str) -> GeneratedQuery {
    GeneratedQuery {
        query: format!(
            "site:{company_domain} team OR professionals OR people OR \"our team\" OR leadership"
        ),
        purpose: "team_directory",
    }
}

const LEGAL_SUFFIXES: &[&str] = &[
    "inc",
    "llc",
    "lp",
    "ltd",
    "corp",
    "group",
    "holdings",
    "partners",
    "capital",
    "credit",
    "management",
    "advisors",
    "advisory",
    "asset management",
    "investments",
    "investment",
];

/// Guess the company's likely domain from its name.
///
/// e.g. "Golub Capital" -> "golub.com"
///      "Blackstone Credit (fka GSO)" -> "blackstone.com"
///      "PGIM Inc" -> "pgim.com"
pub fn guess_domain(search_name: &str) -> String {
    // Strip parenthetical aliases like "(fka GSO)"
    let mut cleaned = String::with_capacity(search_name.len());
    let mut depth = 0u32;
    for c in search_name.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => cleaned.push(c),
            _ => {}
        }
    }

    // Drop legal and business suffix words, then squash to a slug.
    let slug: String = cleaned
        .split_whitespace()
        .filter(|word| {
            let bare: String = word
                .chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .collect::<String>()
                .to_lowercase();
            !bare.is_empty() && !LEGAL_SUFFIXES.contains(&bare.as_str())
        })
        .collect::<Vec<_>>()
        .join("")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase();

    if slug.is_empty() {
        let fallback: String = search_name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        return format!("{fallback}.com");
    }
    format!("{slug}.com")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn company_queries_cover_all_purposes() {
        let queries = company_queries("Apex Credit Partners", 6);
        assert_eq!(queries.len(), 6);
        let purposes: Vec<_> = queries.iter().map(|q| q.purpose).collect();
        assert_eq!(
            purposes,
            vec![
                "core_strategy",
                "company_site_credit",
                "fund_activity",
                "deal_structure",
                "portfolio_deals",
                "about_team"
            ]
        );
        assert!(queries[0].query.contains("\"Apex Credit Partners\""));
    }

    #[test]
    fn company_queries_respect_cap() {
        assert_eq!(company_queries("Apex", 3).len(), 3);
    }

    #[test]
    fn person_queries_capped_at_two() {
        let with_domain = person_queries("Jane Roe", "Apex Credit", Some("apex.com"));
        assert_eq!(with_domain.len(), 2);
        assert!(with_domain[1].query.starts_with("site:apex.com"));

        let without_domain = person_queries("Jane Roe", "Apex Credit", None);
        assert_eq!(without_domain.len(), 2);
        assert_eq!(without_domain[1].purpose, "person_industry");
    }

    #[test]
    fn guess_domain_strips_suffixes_and_parentheticals() {
        assert_eq!(guess_domain("Golub Capital"), "golub.com");
        assert_eq!(guess_domain("Blackstone Credit (fka GSO)"), "blackstone.com");
        assert_eq!(guess_domain("PGIM Inc"), "pgim.com");
        assert_eq!(guess_domain("Ares Management Corp"), "ares.com");
    }

    #[test]
    fn guess_domain_falls_back_when_everything_is_stripped() {
        // Every word is a suffix, so the raw name is used instead.
        assert_eq!(guess_domain("Capital Group"), "capitalgroup.com");
    }
}
