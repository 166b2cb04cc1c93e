// src/ingest/mod.rs
//! Text shaping shared by all providers: sanitizer, keyword classifier,
//! ticker extraction and timestamp normalization. Everything here is pure.

pub mod providers;
pub mod types;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;

use crate::ingest::types::Category;

/// Maximum length (in chars) of any sanitized text field.
pub const MAX_TEXT_CHARS: usize = 200;

/// Keyword table: categories in declaration order, each with its keywords.
pub type Lexicon = [(Category, &'static [&'static str])];

/// Common short English words that look like tickers in headlines.
const TICKER_STOPLIST: &[&str] = &[
    "THE", "AND", "FOR", "ARE", "BUT", "NOT", "YOU", "ALL", "CAN", "HER", "WAS", "ONE", "OUR",
    "OUT", "DAY", "GET", "HAS", "HIM", "HIS", "HOW", "MAN", "NEW", "NOW", "OLD", "SEE", "TWO",
    "WAY", "WHO", "BOY", "DID", "ITS", "LET", "PUT", "SAY", "SHE", "TOO", "USE",
];

fn re_tags() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("tag regex"))
}

fn re_entities() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"&#?[a-zA-Z0-9]+;").expect("entity regex"))
}

fn re_ws() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex"))
}

fn re_ticker() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"\b[A-Z]{1,5}(?:-[A-Z]{1,5})?\b").expect("ticker regex"))
}

fn re_img_src() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r#"<img[^>]+src="([^"]+)""#).expect("img regex"))
}

/// Strip markup, turn entities into spaces, collapse whitespace, cap length.
pub fn sanitize_text(s: &str) -> String {
    // 1) Strip tags
    let out = re_tags().replace_all(s, "");
    // 2) Entities -> space
    let out = re_entities().replace_all(&out, " ");
    // 3) Collapse whitespace
    let out = re_ws().replace_all(&out, " ");
    // 4) Length cap
    out.trim().chars().take(MAX_TEXT_CHARS).collect()
}

/// Sanitize an optional field; empty results become `None`.
pub fn sanitize_opt(s: Option<&str>) -> Option<String> {
    s.map(sanitize_text).filter(|t| !t.is_empty())
}

/// Lowercased text padded with spaces, punctuation folded to spaces, so that
/// `" kw "` matches whole words and multi-word phrases.
fn keyword_haystack(title: &str, description: Option<&str>) -> String {
    let raw = format!("{} {}", title, description.unwrap_or_default()).to_lowercase();
    let folded: String = raw
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    format!(" {} ", re_ws().replace_all(folded.trim(), " "))
}

/// First category (in lexicon order) with a whole-word keyword hit.
pub fn classify_with(lexicon: &Lexicon, title: &str, description: Option<&str>) -> Option<Category> {
    let hay = keyword_haystack(title, description);
    lexicon
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| hay.contains(&format!(" {kw} "))))
        .map(|(cat, _)| *cat)
}

/// Probable ticker symbols: uppercase tokens of 1-5 letters with an optional
/// `-XXXXX` suffix, minus stop-words, kept when 2..=6 chars long.
/// Distinct, in order of first appearance.
pub fn extract_tickers(title: &str, description: Option<&str>) -> Vec<String> {
    let text = format!("{} {}", title, description.unwrap_or_default());
    let mut out: Vec<String> = Vec::new();
    for m in re_ticker().find_iter(&text) {
        let t = m.as_str();
        if TICKER_STOPLIST.contains(&t) || !(2..=6).contains(&t.len()) {
            continue;
        }
        if !out.iter().any(|x| x == t) {
            out.push(t.to_string());
        }
    }
    out
}

/// Extractor for providers that never emit tickers.
pub fn no_tickers(_title: &str, _description: Option<&str>) -> Vec<String> {
    Vec::new()
}

/// First `<img src="...">` in an HTML fragment.
pub fn extract_image_url(content: &str) -> Option<String> {
    re_img_src()
        .captures(content)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Parse the timestamp shapes upstreams emit into unix seconds.
pub fn parse_timestamp(s: &str) -> Option<i64> {
    parse_datetime(s).map(|dt| dt.timestamp())
}

/// Re-emit any accepted timestamp as RFC 3339 UTC (`2024-05-01T10:00:00Z`).
pub fn normalize_timestamp(s: &str) -> Option<String> {
    parse_datetime(s).map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // NYT style: 2024-05-01T10:00:00+0000
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%z") {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|n| n.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEX: &Lexicon = &[
        (Category::World, &["election", "global"]),
        (Category::Tech, &["ai", "artificial intelligence"]),
        (Category::Finance, &["stock", "market"]),
    ];

    #[test]
    fn sanitize_strips_tags_entities_and_ws() {
        let s = "  <p>Hello&nbsp;&amp;\n\n <b>world</b></p>  ";
        assert_eq!(sanitize_text(s), "Hello world");
    }

    #[test]
    fn sanitize_truncates_to_limit() {
        let long = "x".repeat(500);
        assert_eq!(sanitize_text(&long).chars().count(), MAX_TEXT_CHARS);
    }

    #[test]
    fn sanitize_opt_drops_empty() {
        assert_eq!(sanitize_opt(Some("<br/>")), None);
        assert_eq!(sanitize_opt(None), None);
    }

    #[test]
    fn classify_first_match_in_declaration_order() {
        // both world and finance keywords present -> world wins
        let c = classify_with(LEX, "Global stock rout", None);
        assert_eq!(c, Some(Category::World));
    }

    #[test]
    fn classify_matches_whole_words_only() {
        // "said" must not trigger "ai"
        assert_eq!(classify_with(LEX, "He said nothing", None), None);
        assert_eq!(
            classify_with(LEX, "Artificial-intelligence boom", None),
            Some(Category::Tech)
        );
        assert_eq!(classify_with(LEX, "New AI chips", Some("")), Some(Category::Tech));
    }

    #[test]
    fn tickers_filter_stopwords_and_length() {
        let t = extract_tickers("AAPL and MSFT rally, THE end", Some("BTC-USD up; A dip; AAPL"));
        assert_eq!(t, vec!["AAPL".to_string(), "MSFT".to_string()]);
    }

    #[test]
    fn img_src_is_extracted() {
        let html = r#"<p>x</p><img class="a" src="https://img.test/1.jpg" alt="">"#;
        assert_eq!(extract_image_url(html).as_deref(), Some("https://img.test/1.jpg"));
        assert_eq!(extract_image_url("<p>none</p>"), None);
    }

    #[test]
    fn timestamps_normalize_to_rfc3339_utc() {
        assert_eq!(
            normalize_timestamp("Wed, 01 May 2024 12:00:00 +0200").as_deref(),
            Some("2024-05-01T10:00:00Z")
        );
        assert_eq!(
            normalize_timestamp("2024-05-01T10:00:00+0000").as_deref(),
            Some("2024-05-01T10:00:00Z")
        );
        assert_eq!(normalize_timestamp("yesterday"), None);
        assert!(parse_timestamp("2024-05-01T10:00:00Z").is_some());
    }
}
