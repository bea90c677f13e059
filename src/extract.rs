//! One `CryptoRecord` per detail page.

use scraper::Html;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::locate::{locate, FieldSpec};
use crate::normalize::{normalize, SENTINEL};

/// Labeled statistics in the order they were requested.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stats(Vec<(String, String)>);

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces `key`, keeping the position of its first insertion.
    pub fn insert(&mut self, key: String, value: String) {
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Stats {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Stats {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct StatsVisitor;

        impl<'de> Visitor<'de> for StatsVisitor {
            type Value = Stats;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of statistic labels to display text")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Stats, A::Error> {
                let mut stats = Stats::new();
                while let Some((k, v)) = access.next_entry::<String, String>()? {
                    stats.insert(k, v);
                }
                Ok(stats)
            }
        }

        deserializer.deserialize_map(StatsVisitor)
    }
}

/// Structured data for one coin. Text fields hold `"N/A"` when they could not
/// be located; `ratio` is `null` unless both market cap and FDV parsed to
/// non-zero amounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CryptoRecord {
    pub name: String,
    pub price: String,
    pub market_cap: String,
    pub stats: Stats,
    pub ratio: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_link: Option<String>,
}

impl CryptoRecord {
    pub fn with_source_link(mut self, link: impl Into<String>) -> Self {
        self.source_link = Some(link.into());
        self
    }

    /// Progress line: `NNN | name | price | MC … | FDV … | ratio …`.
    pub fn summary_line(&self, index: usize) -> String {
        let ratio = self
            .ratio
            .map(|r| format!("{r:.4}"))
            .unwrap_or_else(|| SENTINEL.to_string());
        format!(
            "{index:03} | {} | {} | MC {} | FDV {} | ratio {ratio}",
            self.name,
            self.price,
            self.market_cap,
            self.stats.get(FDV_KEY).unwrap_or(SENTINEL),
        )
    }
}

/// Stats key always filled with the fully diluted valuation text.
pub const FDV_KEY: &str = "fdv";

/// Snake-case key for a stat label: `"Volume (24h)"` becomes `"volume_24h"`,
/// `"Cap. Marché"` becomes `"cap_marché"`.
pub fn stat_key(label: &str) -> String {
    label
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '_')
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// Market cap / FDV, defined only for two present, non-zero amounts.
pub fn compute_ratio(market_cap: Option<f64>, fdv: Option<f64>) -> Option<f64> {
    match (market_cap, fdv) {
        (Some(mc), Some(fdv)) if mc != 0.0 && fdv != 0.0 => {
            let r = mc / fdv;
            r.is_finite().then_some(r)
        }
        _ => None,
    }
}

/// Parses `html` and extracts a record. Never fails: unusable input yields a
/// record made of placeholders.
pub fn extract(html: &str, stat_labels: &[String]) -> CryptoRecord {
    let document = Html::parse_document(html);
    extract_document(&document, stat_labels)
}

pub fn extract_document(doc: &Html, stat_labels: &[String]) -> CryptoRecord {
    let text = |field: &FieldSpec| locate(doc, field).unwrap_or_else(|| SENTINEL.to_string());

    let market_cap = text(&FieldSpec::MarketCap);
    let fdv = text(&FieldSpec::FullyDilutedValue);

    let mut stats = Stats::new();
    stats.insert(FDV_KEY.to_string(), fdv.clone());
    for label in stat_labels {
        let field = FieldSpec::from_label(label);
        let value = match field {
            FieldSpec::MarketCap => market_cap.clone(),
            FieldSpec::FullyDilutedValue => fdv.clone(),
            ref other => text(other),
        };
        stats.insert(stat_key(label), value);
    }

    CryptoRecord {
        name: text(&FieldSpec::Name),
        price: text(&FieldSpec::Price),
        ratio: compute_ratio(normalize(&market_cap), normalize(&fdv)),
        market_cap,
        stats,
        source_link: None,
    }
}
