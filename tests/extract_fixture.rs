// tests/extract_fixture.rs
use crypto_ratio_scrapper::export::filter_by_ratio;
use crypto_ratio_scrapper::extract::{extract, FDV_KEY};
use crypto_ratio_scrapper::normalize::SENTINEL;

const BITCOIN: &str = include_str!("fixtures/bitcoin.html");
const LOWFLOAT: &str = include_str!("fixtures/lowfloat.html");

fn labels() -> Vec<String> {
    ["FDV", "Volume (24h)", "Total Supply", "Vol/Mkt Cap (24h)"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[test]
fn bitcoin_detail_page() {
    let r = extract(BITCOIN, &labels());
    assert_eq!(r.name, "Bitcoin");
    assert_eq!(r.price, "$67,000.00");
    assert_eq!(r.market_cap, "$1.32T");
    assert_eq!(r.stats.get(FDV_KEY), Some("$1.41T"));
    assert_eq!(r.stats.get("volume_24h"), Some("$35.2B"));
    assert_eq!(r.stats.get("total_supply"), Some("19.7M"));
    assert_eq!(r.stats.get("volmkt_cap_24h"), Some("2.66%"));

    let ratio = r.ratio.expect("ratio present");
    assert!((ratio - 1.32 / 1.41).abs() < 1e-9);
    assert!((ratio - 0.9362).abs() < 1e-4);
}

#[test]
fn bitcoin_threshold_boundary() {
    let r = extract(BITCOIN, &labels());
    assert_eq!(filter_by_ratio(vec![r.clone()], 1.0).len(), 1);
    assert!(filter_by_ratio(vec![r], 0.5).is_empty());
}

#[test]
fn french_definition_list_page() {
    let r = extract(LOWFLOAT, &["Offre Totale".to_string()]);
    assert_eq!(r.name, "Low Float LOW");
    assert_eq!(r.price, "0,12 €");
    assert_eq!(r.market_cap, "120,5M €");
    assert_eq!(r.stats.get(FDV_KEY), Some("1,2B €"));
    assert_eq!(r.stats.get("offre_totale"), Some("10B"));
    let ratio = r.ratio.unwrap();
    assert!((ratio - 120.5e6 / 1.2e9).abs() < 1e-9);
}

#[test]
fn extraction_is_deterministic() {
    assert_eq!(extract(BITCOIN, &labels()), extract(BITCOIN, &labels()));
}

#[test]
fn empty_document_yields_placeholders() {
    let r = extract("", &labels());
    assert_eq!(r.name, SENTINEL);
    assert_eq!(r.price, SENTINEL);
    assert_eq!(r.market_cap, SENTINEL);
    assert_eq!(r.ratio, None);
    assert_eq!(r.stats.len(), 4);
    assert!(r.stats.keys().all(|k| r.stats.get(k) == Some(SENTINEL)));
}
