//! Deterministic fit scoring. No LLM involvement: the same intelligence
//! always produces the same score, so scores are recomputed on every
//! run even when the intelligence came from cache.

use std::sync::OnceLock;

use regex::Regex;

use prospector_shared::{CompanyIntelligence, FitScore, Rating};

/// Compute the 0-100 fit score: four categories worth 25 points each.
pub fn compute_fit_score(intelligence: &CompanyIntelligence) -> FitScore {
    let deal_volume = score_deal_volume(intelligence);
    let strategy_complexity = score_strategy_complexity(intelligence);
    let growth_trajectory = score_growth_trajectory(intelligence);
    let product_fit = score_product_fit(intelligence);

    let total = deal_volume + strategy_complexity + growth_trajectory + product_fit;
    let rating = if total >= 70 {
        Rating::High
    } else if total >= 40 {
        Rating::Medium
    } else {
        Rating::Low
    };

    FitScore {
        total,
        rating,
        deal_volume,
        strategy_complexity,
        growth_trajectory,
        product_fit,
    }
}

/// AUM size plus recent deal activity.
fn score_deal_volume(intelligence: &CompanyIntelligence) -> u8 {
    let mut score = 0u32;

    if let Some(aum_billions) = parse_aum_billions(intelligence.company_overview.aum.as_deref()) {
        score += if aum_billions >= 10.0 {
            20
        } else if aum_billions >= 2.0 {
            15
        } else if aum_billions >= 0.5 {
            10
        } else {
            5
        };
    }

    score += match intelligence.recent_activity.recent_deals.len() {
        0 => 0,
        1 => 1,
        2..=4 => 3,
        _ => 5,
    };

    score.min(25) as u8
}

/// Breadth of lending products and structures, plus deal role. Only the
/// highest role counts.
fn score_strategy_complexity(intelligence: &CompanyIntelligence) -> u8 {
    let strategy = &intelligence.investment_strategy;
    let mut score = 0u32;

    score += (strategy.lending_types.len() as u32 * 2).min(10);
    score += (strategy.facility_structures.len() as u32 * 2).min(8);

    let role = strategy
        .syndication_approach
        .as_deref()
        .unwrap_or_default()
        .to_lowercase();
    score += if role.contains("lead") {
        7
    } else if role.contains("sole") {
        5
    } else if role.contains("club") {
        4
    } else if role.contains("bilateral") {
        3
    } else {
        0
    };

    score.min(25) as u8
}

/// News volume plus the strongest growth signals.
fn score_growth_trajectory(intelligence: &CompanyIntelligence) -> u8 {
    let recent = &intelligence.recent_activity;
    let mut score = 0u32;

    score += match recent.news_count() {
        0 => 0,
        1 => 4,
        2..=3 => 8,
        _ => 12,
    };

    if !recent.fund_raisings.is_empty() {
        score += 8;
    }
    if !recent.executive_changes.is_empty() {
        score += 5;
    }

    score.min(25) as u8
}

/// ICP alignment: how the firm classifies itself plus whether its check
/// sizes overlap the serviceable range.
fn score_product_fit(intelligence: &CompanyIntelligence) -> u8 {
    let overview = &intelligence.company_overview;
    let company_type = overview
        .company_type
        .as_deref()
        .unwrap_or_default()
        .to_lowercase();

    let mut score: i32 = if company_type.contains("direct lend") || company_type.contains("private credit") {
        15
    } else if company_type.contains("bdc") || company_type.contains("business development") {
        12
    } else if company_type.contains("clo") {
        10
    } else if company_type.contains("multi-strategy") || company_type.contains("multi strategy") {
        8
    } else if company_type.contains("asset manager") || company_type.contains("alternative") {
        7
    } else if company_type.contains("private equity") {
        5
    } else {
        0
    };

    if overview.asset_backed_focus == Some(true) {
        score = (score - 3).max(0);
    }

    for check_size in &intelligence.investment_criteria.check_sizes {
        let (low, high) = parse_dollar_range(check_size);
        let in_range = |v: Option<f64>| v.is_some_and(|m| (10.0..=500.0).contains(&m));
        if in_range(low) || in_range(high) {
            score += 10;
            break;
        }
    }

    score.clamp(0, 25) as u8
}

// ------- dollar parsing -------

/// Parse an AUM string to billions. None when unparseable.
pub fn parse_aum_billions(aum: Option<&str>) -> Option<f64> {
    static BILLIONS: OnceLock<Regex> = OnceLock::new();
    static MILLIONS: OnceLock<Regex> = OnceLock::new();
    static TRILLIONS: OnceLock<Regex> = OnceLock::new();
    let billions =
        BILLIONS.get_or_init(|| Regex::new(r"\$?([\d.]+)\s*(billion|bn\b|b\b)").unwrap());
    let millions =
        MILLIONS.get_or_init(|| Regex::new(r"\$?([\d.]+)\s*(million|mm\b|m\b)").unwrap());
    let trillions = TRILLIONS.get_or_init(|| Regex::new(r"\$?([\d.]+)\s*(trillion|t\b)").unwrap());

    let text = aum?.to_lowercase().replace(['+', ','], "");
    let num = |caps: regex::Captures<'_>| caps.get(1).and_then(|m| m.as_str().parse::<f64>().ok());

    if let Some(v) = billions.captures(&text).and_then(num) {
        return Some(v);
    }
    if let Some(v) = millions.captures(&text).and_then(num) {
        return Some(v / 1000.0);
    }
    if let Some(v) = trillions.captures(&text).and_then(num) {
        return Some(v * 1000.0);
    }
    None
}

fn to_millions(value: f64, unit: &str) -> f64 {
    if unit.contains("billion") || unit == "b" || unit == "bn" {
        value * 1000.0
    } else {
        value
    }
}

/// Parse check-size strings like "$10M-$50M" or "Up to $300 million"
/// into a (low, high) pair in millions.
pub fn parse_dollar_range(text: &str) -> (Option<f64>, Option<f64>) {
    static RANGE: OnceLock<Regex> = OnceLock::new();
    static UP_TO: OnceLock<Regex> = OnceLock::new();
    static SINGLE: OnceLock<Regex> = OnceLock::new();
    let range = RANGE.get_or_init(|| {
        Regex::new(
            r"\$?([\d.]+)\s*(million|billion|mm|m|bn|b)?\s*(?:-|–|to)+\s*\$?([\d.]+)\s*(million|billion|mm|m|bn|b)?",
        )
        .unwrap()
    });
    let up_to =
        UP_TO.get_or_init(|| Regex::new(r"up\s+to\s+\$?([\d.]+)\s*(million|billion|mm|m|bn|b)?").unwrap());
    let single =
        SINGLE.get_or_init(|| Regex::new(r"\$?([\d.]+)\s*(million|billion|mm|m|bn|b)").unwrap());

    let text = text.to_lowercase().replace(',', "");
    let parse = |m: Option<regex::Match<'_>>| m.and_then(|v| v.as_str().parse::<f64>().ok());

    if let Some(caps) = range.captures(&text) {
        let low_unit = caps.get(2).map(|m| m.as_str()).unwrap_or("m").to_string();
        let high_unit = caps.get(4).map(|m| m.as_str()).unwrap_or(&low_unit).to_string();
        if let (Some(low), Some(high)) = (parse(caps.get(1)), parse(caps.get(3))) {
            return (
                Some(to_millions(low, &low_unit)),
                Some(to_millions(high, &high_unit)),
            );
        }
    }

    if let Some(caps) = up_to.captures(&text) {
        let unit = caps.get(2).map(|m| m.as_str()).unwrap_or("m");
        if let Some(v) = parse(caps.get(1)) {
            return (Some(0.0), Some(to_millions(v, unit)));
        }
    }

    if let Some(caps) = single.captures(&text) {
        let unit = caps.get(2).map(|m| m.as_str()).unwrap_or("m");
        if let Some(v) = parse(caps.get(1)) {
            let v = to_millions(v, unit);
            return (Some(v), Some(v * 5.0));
        }
    }

    (None, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use prospector_shared::{
        CompanyOverview, InvestmentCriteria, InvestmentStrategy, RecentActivity,
    };

    fn strong_candidate() -> CompanyIntelligence {
        CompanyIntelligence {
            company_overview: CompanyOverview {
                company_type: Some("Direct Lender".into()),
                aum: Some("$5 billion".into()),
                ..Default::default()
            },
            recent_activity: RecentActivity {
                recent_deals: vec!["Acme - LBO - $40M [Source 1]".into(), "Beta - Refi [Source 2]".into()],
                fund_raisings: vec!["March 2026 - Fund V closed [Source 1]".into()],
                executive_changes: vec![],
                acquisitions: vec!["Jan 2026 - Bought platform [Source 3]".into()],
                partnerships: vec!["Feb 2026 - Bank partnership [Source 2]".into()],
                announcements: vec!["April 2026 - New office [Source 4]".into()],
            },
            investment_strategy: InvestmentStrategy {
                lending_types: vec!["Unitranche".into(), "Senior Secured".into()],
                facility_structures: vec!["Term Loan".into(), "Revolver".into()],
                syndication_approach: Some("Sole Lender".into()),
                ..Default::default()
            },
            investment_criteria: InvestmentCriteria {
                check_sizes: vec!["$10M-$50M".into()],
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn strong_candidate_scores_high() {
        let score = compute_fit_score(&strong_candidate());
        // AUM $5B (15) + 2 deals (3) = 18
        assert_eq!(score.deal_volume, 18);
        // 2 lending types (4) + 2 structures (4) + sole lender (5) = 13
        assert_eq!(score.strategy_complexity, 13);
        // 4 news items (12) + fund raise (8) = 20
        assert_eq!(score.growth_trajectory, 20);
        // direct lender (15) + in-range check size (10) = 25
        assert_eq!(score.product_fit, 25);
        assert_eq!(score.total, 76);
        assert_eq!(score.rating, Rating::High);
    }

    #[test]
    fn empty_intelligence_scores_zero() {
        let score = compute_fit_score(&CompanyIntelligence::default());
        assert_eq!(score.total, 0);
        assert_eq!(score.rating, Rating::Low);
    }

    #[test]
    fn rating_boundaries_are_exact() {
        // 70 is the lowest High: deal 18 + strategy (0+2+5) 7 + growth 20
        // + fit 25.
        let mut intel = strong_candidate();
        intel.investment_strategy.lending_types.clear();
        intel.investment_strategy.facility_structures.truncate(1);
        let score = compute_fit_score(&intel);
        assert_eq!(score.total, 70);
        assert_eq!(score.rating, Rating::High);

        // 69 is the highest Medium: same shape with club deal (4) instead
        // of sole lender (5).
        intel.investment_strategy.syndication_approach = Some("Club Deal".into());
        let score = compute_fit_score(&intel);
        assert_eq!(score.total, 69);
        assert_eq!(score.rating, Rating::Medium);

        // 40 is the lowest Medium: deal 18 + strategy (4+0+5) 9 + growth
        // (3 news) 8 + private equity 5.
        let mut intel = strong_candidate();
        intel.company_overview.company_type = Some("Private Equity".into());
        intel.investment_criteria.check_sizes.clear();
        intel.recent_activity.fund_raisings.clear();
        intel.investment_strategy.facility_structures.clear();
        let score = compute_fit_score(&intel);
        assert_eq!(score.total, 40);
        assert_eq!(score.rating, Rating::Medium);

        // 39 is the highest Low: same shape, club deal drops strategy to 8.
        intel.investment_strategy.syndication_approach = Some("Club Deal".into());
        let score = compute_fit_score(&intel);
        assert_eq!(score.total, 39);
        assert_eq!(score.rating, Rating::Low);
    }

    #[test]
    fn unparseable_aum_contributes_nothing() {
        let mut intel = CompanyIntelligence::default();
        intel.company_overview.aum = Some("substantial".into());
        let score = compute_fit_score(&intel);
        assert_eq!(score.deal_volume, 0);
    }

    #[test]
    fn asset_backed_focus_penalty_floors_at_zero() {
        let mut intel = CompanyIntelligence::default();
        intel.company_overview.asset_backed_focus = Some(true);
        let score = compute_fit_score(&intel);
        assert_eq!(score.product_fit, 0);
    }

    #[test]
    fn aum_parsing_handles_units() {
        assert_eq!(parse_aum_billions(Some("$12 billion")), Some(12.0));
        assert_eq!(parse_aum_billions(Some("$800 million")), Some(0.8));
        assert_eq!(parse_aum_billions(Some("$1.5B+")), Some(1.5));
        assert_eq!(parse_aum_billions(Some("$1 trillion")), Some(1000.0));
        assert_eq!(parse_aum_billions(Some("undisclosed")), None);
        assert_eq!(parse_aum_billions(None), None);
    }

    #[test]
    fn dollar_range_parsing() {
        assert_eq!(parse_dollar_range("$10M-$50M"), (Some(10.0), Some(50.0)));
        assert_eq!(
            parse_dollar_range("$100 million - $1 billion"),
            (Some(100.0), Some(1000.0))
        );
        assert_eq!(
            parse_dollar_range("Up to $300 million"),
            (Some(0.0), Some(300.0))
        );
        assert_eq!(parse_dollar_range("$25M+"), (Some(25.0), Some(125.0)));
        assert_eq!(parse_dollar_range("flexible"), (None, None));
    }

    #[test]
    fn out_of_range_check_sizes_earn_no_bonus() {
        let mut intel = CompanyIntelligence::default();
        intel.company_overview.company_type = Some("Direct Lender".into());
        intel.investment_criteria.check_sizes = vec!["$1B-$3B".into()];
        let score = compute_fit_score(&intel);
        assert_eq!(score.product_fit, 15);
    }
}
