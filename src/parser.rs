use regex::Regex;
use std::sync::OnceLock;

fn loc_pattern() -> &'static Regex {
    static LOC: OnceLock<Regex> = OnceLock::new();
    LOC.get_or_init(|| Regex::new(r"(?is)<loc>(.*?)</loc>").expect("Invalid loc pattern"))
}

fn index_pattern() -> &'static Regex {
    static INDEX: OnceLock<Regex> = OnceLock::new();
    INDEX.get_or_init(|| Regex::new(r"(?i)<sitemapindex[\s>]").expect("Invalid index pattern"))
}

/// Extract every `<loc>` body from a sitemap document.
///
/// The document is treated as a flat sequence of `<loc>...</loc>` elements, so
/// malformed XML around them is tolerated. Bodies are trimmed, CDATA wrappers
/// removed and the predefined XML entities decoded; empty bodies are skipped.
///
/// # Examples
/// ```
/// use sitemap_warmer::parser::extract_locs;
///
/// let xml = "<urlset><url><loc>https://example.com/a</loc></url></urlset>";
/// assert_eq!(extract_locs(xml), vec!["https://example.com/a"]);
/// ```
pub fn extract_locs(xml: &str) -> Vec<String> {
    loc_pattern()
        .captures_iter(xml)
        .filter_map(|caps| caps.get(1))
        .map(|body| clean_loc(body.as_str()))
        .filter(|loc| !loc.is_empty())
        .collect()
}

/// True when the document is a sitemap index (its `<loc>`s point at more sitemaps).
pub fn is_sitemap_index(xml: &str) -> bool {
    index_pattern().is_match(xml)
}

fn clean_loc(raw: &str) -> String {
    let trimmed = raw.trim();
    let unwrapped = trimmed
        .strip_prefix("<![CDATA[")
        .and_then(|rest| rest.strip_suffix("]]>"))
        .unwrap_or(trimmed)
        .trim();
    decode_entities(unwrapped)
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    // &amp; last so "&amp;lt;" decodes to "&lt;" and not "<".
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
