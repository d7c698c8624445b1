//! HTML text extraction, truncation, and content quality scoring.

use chrono::Datelike;
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::OnceLock;

/// Keywords that mark a page as substantive private-credit material.
const QUALITY_KEYWORDS: &[&str] = &[
    "private credit",
    "direct lending",
    "senior secured",
    "unitranche",
    "mezzanine",
    "middle market",
    "credit facility",
    "term loan",
    "leveraged finance",
    "asset-based lending",
    "fund",
    "aum",
    "assets under management",
    "portfolio",
    "deal",
    "loan",
    "borrower",
    "lender",
    "investment",
    "capital",
    "billion",
    "million",
];

/// Minimum chars for structural extraction before falling back to a
/// plain tag-strip pass.
const MIN_STRUCTURAL_CHARS: usize = 100;

fn content_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| {
        Selector::parse("p, h1, h2, h3, h4, li, td, blockquote").unwrap()
    })
}

fn root_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| Selector::parse("main, article").unwrap())
}

/// Extract readable text from an HTML document. Prefers content inside
/// `main`/`article`, collecting block-level elements so boilerplate in
/// scripts and navigation never leaks through. Falls back to stripping
/// tags wholesale when the structural pass yields too little.
pub fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);

    let blocks: Vec<String> = match document.select(root_selector()).next() {
        Some(root) => collect_blocks(root),
        None => document
            .select(content_selector())
            .map(element_text)
            .filter(|t| !t.is_empty())
            .collect(),
    };

    let text = blocks.join("\n");
    if text.len() >= MIN_STRUCTURAL_CHARS {
        return text;
    }
    strip_tags(html)
}

fn collect_blocks(root: scraper::ElementRef<'_>) -> Vec<String> {
    root.select(content_selector())
        .map(element_text)
        .filter(|t| !t.is_empty())
        .collect()
}

fn element_text(el: scraper::ElementRef<'_>) -> String {
    let joined: String = el.text().collect::<Vec<_>>().join(" ");
    collapse_whitespace(&joined)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Last-resort extraction: drop script/style blocks, strip remaining
/// tags, collapse whitespace.
fn strip_tags(html: &str) -> String {
    static SCRIPT_RE: OnceLock<Regex> = OnceLock::new();
    static TAG_RE: OnceLock<Regex> = OnceLock::new();
    let script_re = SCRIPT_RE.get_or_init(|| {
        Regex::new(r"(?is)<(script|style|noscript)\b.*?</(script|style|noscript)>").unwrap()
    });
    let tag_re = TAG_RE.get_or_init(|| Regex::new(r"<[^>]+>").unwrap());

    let without_scripts = script_re.replace_all(html, " ");
    let without_tags = tag_re.replace_all(&without_scripts, " ");
    collapse_whitespace(&without_tags)
}

/// Truncate at a sentence or line boundary near the limit. Cuts
/// mid-text when no boundary falls in the last fifth of the window.
pub fn truncate_content(text: &str, max_chars: usize) -> String {
    if text.len() <= max_chars {
        return text.to_string();
    }

    let cut = floor_char_boundary(text, max_chars);
    let window = &text[..cut];
    let boundary = window.rfind(". ").into_iter().chain(window.rfind('\n')).max();

    match boundary {
        Some(at) if at as f64 > 0.8 * max_chars as f64 => {
            format!("{} [content truncated]", &window[..=at])
        }
        _ => format!("{window}... [content truncated]"),
    }
}

fn floor_char_boundary(text: &str, index: usize) -> usize {
    let mut i = index.min(text.len());
    while i > 0 && !text.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Heuristic quality score for extracted content, 0-100. Rewards
/// length, company-name presence, domain keywords, dollar amounts, and
/// recency markers.
pub fn score_content_quality(content: &str, company_name: &str) -> f64 {
    if content.len() < 200 {
        return 5.0;
    }

    let lower = content.to_lowercase();
    let mut score = (content.len() as f64 / 500.0).min(20.0);

    if lower.contains(&company_name.to_lowercase()) {
        score += 25.0;
    }

    let hits = QUALITY_KEYWORDS
        .iter()
        .filter(|kw| lower.contains(*kw))
        .count();
    score += ((hits * 4) as f64).min(30.0);

    static DOLLAR_RE: OnceLock<Regex> = OnceLock::new();
    let dollar_re = DOLLAR_RE
        .get_or_init(|| Regex::new(r"(?i)\$[\d,.]+\s*(million|billion|M|B|MM)").unwrap());
    if dollar_re.is_match(content) {
        score += 15.0;
    }

    let year = chrono::Utc::now().year();
    if content.contains(&year.to_string()) || content.contains(&(year - 1).to_string()) {
        score += 10.0;
    }

    score.min(100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_main_content_and_skips_scripts() {
        let html = r#"<html><head><script>var x = "junk that should never appear";</script></head>
            <body><nav>Home About</nav>
            <main><h1>Apex Credit Partners</h1>
            <p>Apex manages a senior secured direct lending strategy for middle market borrowers across North America and Europe.</p></main>
            </body></html>"#;
        let text = extract_text(html);
        assert!(text.contains("Apex Credit Partners"));
        assert!(text.contains("direct lending strategy"));
        assert!(!text.contains("junk"));
        assert!(!text.contains("Home About"));
    }

    #[test]
    fn falls_back_to_tag_strip_on_unstructured_html() {
        let html = "<html><body><div>Short page with no paragraph tags but enough \
                    prose about unitranche credit facilities to matter for analysis \
                    of the lender and its borrowers.</div></body></html>";
        let text = extract_text(html);
        assert!(text.contains("unitranche credit facilities"));
    }

    #[test]
    fn truncates_at_sentence_boundary_when_close_to_limit() {
        let sentence = "This is a filler sentence about private credit funds. ";
        let text = sentence.repeat(10);
        let out = truncate_content(&text, 500);
        assert!(out.len() <= 500 + " [content truncated]".len());
        assert!(out.ends_with(". [content truncated]"));
    }

    #[test]
    fn truncates_mid_text_when_no_late_boundary() {
        let text = "a".repeat(1000);
        let out = truncate_content(&text, 300);
        assert!(out.ends_with("... [content truncated]"));
    }

    #[test]
    fn short_text_passes_through_untouched() {
        assert_eq!(truncate_content("hello", 100), "hello");
    }

    #[test]
    fn thin_content_gets_floor_score() {
        assert_eq!(score_content_quality("too short", "Apex"), 5.0);
    }

    #[test]
    fn rich_content_scores_all_components() {
        let year = chrono::Utc::now().year();
        let body = format!(
            "Apex Credit Partners closed a $500 million unitranche credit facility \
             for a middle market borrower in {year}. The direct lending fund now \
             manages significant assets under management across its portfolio. {}",
            "Additional descriptive prose about the lender. ".repeat(20)
        );
        let score = score_content_quality(&body, "Apex Credit Partners");
        // length + name(25) + keywords(capped 30) + dollars(15) + recency(10)
        assert!(score > 80.0);
        assert!(score <= 100.0);
    }
}
