//! Detail-page slugs from harvested listing pages.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

static ROWS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("tbody tr").expect("Failed to parse row selector"));
static LINKS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("Failed to parse link selector"));
static RX_DETAIL_HREF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:/[a-z]{2}(?:-[a-z]{2})?)?/currencies/([^/#?]+)/?$")
        .expect("Failed to compile detail href regex")
});

/// Slug of a coin detail link such as `/currencies/bitcoin/` or
/// `/fr/currencies/bitcoin/`.
pub fn slug_from_href(href: &str) -> Option<&str> {
    RX_DETAIL_HREF
        .captures(href)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// One slug per table row, first detail link wins, duplicates dropped.
pub fn detail_slugs(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut slugs: Vec<String> = Vec::new();

    for row in document.select(&ROWS) {
        let slug = row
            .select(&LINKS)
            .filter_map(|a| a.value().attr("href"))
            .find_map(slug_from_href);
        if let Some(slug) = slug {
            if !slugs.iter().any(|s| s == slug) {
                slugs.push(slug.to_string());
            }
        }
    }

    slugs
}
