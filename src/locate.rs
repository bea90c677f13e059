//! Field lookup over rendered coin detail pages.
//!
//! Each field owns a ranked list of [`Matcher`]s. The first matcher that finds
//! something wins; when none does the field is simply absent. Supporting a new
//! markup variant means appending a matcher to [`strategies`].

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

/// The fields a detail page can be asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSpec {
    Name,
    Price,
    MarketCap,
    FullyDilutedValue,
    Volume24h,
    TotalSupply,
    /// Any other statistic box, matched on its literal label text.
    Labeled(String),
}

impl FieldSpec {
    /// Maps a caller-supplied stat label onto a dedicated field when it names a
    /// well-known statistic (English or French wording), otherwise `Labeled`.
    pub fn from_label(label: &str) -> Self {
        let key = collapse_whitespace(label).to_lowercase();
        match key.as_str() {
            "market cap" | "marketcap" | "market capitalization" | "cap. marché"
            | "cap marché" | "capitalisation" | "capitalisation boursière" => {
                FieldSpec::MarketCap
            }
            "fdv" | "fully diluted valuation" | "fully diluted market cap"
            | "valorisation entièrement diluée" => FieldSpec::FullyDilutedValue,
            "volume (24h)" | "volume 24h" | "volume" => FieldSpec::Volume24h,
            "total supply" | "offre totale" => FieldSpec::TotalSupply,
            _ => FieldSpec::Labeled(label.to_string()),
        }
    }

    fn is_stat(&self) -> bool {
        !matches!(self, FieldSpec::Name | FieldSpec::Price)
    }
}

/// One lookup strategy.
pub trait Matcher: Send + Sync {
    fn find(&self, doc: &Html) -> Option<String>;
}

/// Both shapes of amount found in a statistic value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatValue {
    pub money: Option<String>,
    pub percent: Option<String>,
}

static COIN_NAME: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"[data-role="coin-name"]"#).expect("Failed to parse coin name selector")
});
static H1: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").expect("Failed to parse h1 selector"));
static H2: Lazy<Selector> = Lazy::new(|| Selector::parse("h2").expect("Failed to parse h2 selector"));
static PRICE_DISPLAY: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"[data-test="text-cdp-price-display"]"#)
        .expect("Failed to parse price display selector")
});
static PRICE_VALUE: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"[data-testid="price-value"]"#).expect("Failed to parse price value selector")
});
static WITH_CLASS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("[class]").expect("Failed to parse class selector"));
static STATS_BOX: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"div[class*="StatsInfoBox_base"]"#).expect("Failed to parse stats box selector")
});
static DT: Lazy<Selector> = Lazy::new(|| Selector::parse("dt").expect("Failed to parse dt selector"));
static DD: Lazy<Selector> = Lazy::new(|| Selector::parse("dd").expect("Failed to parse dd selector"));
static SPAN: Lazy<Selector> =
    Lazy::new(|| Selector::parse("span").expect("Failed to parse span selector"));

static RX_PRICE_CLASS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)priceValue").expect("Failed to compile price class regex"));
static RX_MONEY_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[$€£]\s?\d(?:[\d.,]|\s\d)*(?:\s?[KMBT]\b)?").expect("Failed to compile money regex")
});
static RX_MONEY_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d(?:[\d.,]|\s\d)*(?:\s?[KMBT])?\s?[$€£]").expect("Failed to compile money regex")
});
static RX_AMOUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d(?:[\d.,]|\s\d)*(?:\s?[KMBT]\b)?").expect("Failed to compile amount regex")
});
static RX_PERCENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[-+]?\d+(?:[.,]\d+)?\s?%").expect("Failed to compile percent regex")
});

static MARKET_CAP: Lazy<LabelPattern> = Lazy::new(|| {
    LabelPattern::new(
        r"capitalisation|market\s*cap|cap\.?\s*march[ée]",
        Some(r"march[ée]|market"),
        Some(r"dilu|\bfdv\b|vol\s*/"),
    )
});
static FDV: Lazy<LabelPattern> =
    Lazy::new(|| LabelPattern::new(r"\bfdv\b|dilu", Some(r"fully\s+diluted"), None));
static VOLUME_24H: Lazy<LabelPattern> = Lazy::new(|| {
    LabelPattern::new(r"volume\s*\(\s*24\s*h\s*\)", Some(r"^\s*volume"), None)
});
static TOTAL_SUPPLY: Lazy<LabelPattern> =
    Lazy::new(|| LabelPattern::new(r"total\s*supply|offre\s*totale", None, None));

/// Case-insensitive label test: primary or fallback must hit, exclude must not.
#[derive(Debug, Clone)]
pub struct LabelPattern {
    primary: Regex,
    fallback: Option<Regex>,
    exclude: Option<Regex>,
}

impl LabelPattern {
    fn new(primary: &str, fallback: Option<&str>, exclude: Option<&str>) -> Self {
        let ci = |p: &str| Regex::new(&format!("(?i){p}")).expect("Failed to compile label regex");
        Self {
            primary: ci(primary),
            fallback: fallback.map(ci),
            exclude: exclude.map(ci),
        }
    }

    /// Matches the label anywhere inside the box title, whitespace-insensitive.
    pub fn literal(label: &str) -> Self {
        let words: Vec<String> = label.split_whitespace().map(regex::escape).collect();
        let pattern = format!("(?i){}", words.join(r"\s+"));
        Self {
            primary: Regex::new(&pattern).expect("Failed to compile escaped label regex"),
            fallback: None,
            exclude: None,
        }
    }

    pub fn matches(&self, label: &str) -> bool {
        if self.exclude.as_ref().is_some_and(|rx| rx.is_match(label)) {
            return false;
        }
        self.primary.is_match(label) || self.fallback.as_ref().is_some_and(|rx| rx.is_match(label))
    }
}

/// `[data-role="coin-name"]`, title attribute first.
pub struct CoinNameRole;

impl Matcher for CoinNameRole {
    fn find(&self, doc: &Html) -> Option<String> {
        let el = doc.select(&COIN_NAME).next()?;
        el.value()
            .attr("title")
            .map(collapse_whitespace)
            .filter(|t| !t.is_empty())
            .or_else(|| non_empty(element_text(el)))
    }
}

/// First `h1`, then first `h2`.
pub struct FirstHeading;

impl Matcher for FirstHeading {
    fn find(&self, doc: &Html) -> Option<String> {
        [&*H1, &*H2]
            .into_iter()
            .find_map(|sel| doc.select(sel).next().and_then(|el| non_empty(element_text(el))))
    }
}

/// Price text under a fixed selector.
pub struct PriceBySelector(&'static Lazy<Selector>);

impl Matcher for PriceBySelector {
    fn find(&self, doc: &Html) -> Option<String> {
        let el = doc.select(self.0).next()?;
        price_text(el)
    }
}

/// Price text in the first element whose class looks like `priceValue`.
pub struct PriceByClass;

impl Matcher for PriceByClass {
    fn find(&self, doc: &Html) -> Option<String> {
        let el = doc
            .select(&WITH_CLASS)
            .find(|el| el.value().attr("class").is_some_and(|c| RX_PRICE_CLASS.is_match(c)))?;
        price_text(el)
    }
}

/// How label and value are laid out around a statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatLayout {
    /// `div.StatsInfoBox_base…` holding one `dt` and one `dd`.
    InfoBox,
    /// Bare `dt` followed by a sibling `dd`.
    DefinitionPair,
}

/// Statistic value located by its label.
pub struct StatMatcher {
    pub label: LabelPattern,
    pub layout: StatLayout,
    /// Accept a percentage when no currency-shaped amount is present.
    pub percent_fallback: bool,
}

impl StatMatcher {
    pub fn find_value(&self, doc: &Html) -> Option<StatValue> {
        match self.layout {
            StatLayout::InfoBox => doc.select(&STATS_BOX).find_map(|stat_box| {
                let dt = stat_box.select(&DT).next()?;
                if !self.label.matches(&element_text(dt)) {
                    return None;
                }
                stat_box.select(&DD).next().map(stat_value)
            }),
            StatLayout::DefinitionPair => doc
                .select(&DT)
                .filter(|dt| self.label.matches(&element_text(*dt)))
                .find_map(|dt| {
                    dt.next_siblings()
                        .filter_map(ElementRef::wrap)
                        .find(|sib| sib.value().name() == "dd")
                        .map(stat_value)
                }),
        }
    }
}

impl Matcher for StatMatcher {
    fn find(&self, doc: &Html) -> Option<String> {
        let value = self.find_value(doc)?;
        if self.percent_fallback {
            value.money.or(value.percent)
        } else {
            value.money
        }
    }
}

/// Ranked strategies for a field, highest priority first.
pub fn strategies(field: &FieldSpec) -> Vec<Box<dyn Matcher>> {
    match field {
        FieldSpec::Name => vec![Box::new(CoinNameRole), Box::new(FirstHeading)],
        FieldSpec::Price => vec![
            Box::new(PriceBySelector(&PRICE_DISPLAY)),
            Box::new(PriceBySelector(&PRICE_VALUE)),
            Box::new(PriceByClass),
        ],
        stat => stat_matchers(stat)
            .into_iter()
            .map(|m| Box::new(m) as Box<dyn Matcher>)
            .collect(),
    }
}

fn stat_matchers(field: &FieldSpec) -> Vec<StatMatcher> {
    let (label, percent_fallback) = match field {
        FieldSpec::MarketCap => (MARKET_CAP.clone(), false),
        FieldSpec::FullyDilutedValue => (FDV.clone(), false),
        FieldSpec::Volume24h => (VOLUME_24H.clone(), false),
        FieldSpec::TotalSupply => (TOTAL_SUPPLY.clone(), false),
        FieldSpec::Labeled(text) => (LabelPattern::literal(text), true),
        FieldSpec::Name | FieldSpec::Price => return Vec::new(),
    };
    [StatLayout::InfoBox, StatLayout::DefinitionPair]
        .into_iter()
        .map(|layout| StatMatcher {
            label: label.clone(),
            layout,
            percent_fallback,
        })
        .collect()
}

/// Best-effort text for `field`, or `None` when no strategy matched.
pub fn locate(doc: &Html, field: &FieldSpec) -> Option<String> {
    strategies(field).iter().find_map(|m| m.find(doc))
}

/// Money and percentage substrings of a statistic, from the first layout that
/// has a matching label.
pub fn locate_stat(doc: &Html, field: &FieldSpec) -> Option<StatValue> {
    if !field.is_stat() {
        return None;
    }
    stat_matchers(field).iter().find_map(|m| m.find_value(doc))
}

fn stat_value(dd: ElementRef<'_>) -> StatValue {
    let full = element_text(dd);
    let money = dd
        .select(&SPAN)
        .map(element_text)
        .find(|t| !t.is_empty())
        .and_then(|t| split_amounts(&t).money)
        .or_else(|| split_amounts(&full).money);
    StatValue {
        money,
        percent: split_amounts(&full).percent,
    }
}

/// Splits a value text into its currency-shaped amount and its percentage.
pub fn split_amounts(text: &str) -> StatValue {
    let percent = RX_PERCENT.find(text);
    let masked = mask_percents(text);
    let money = [&*RX_MONEY_PREFIX, &*RX_MONEY_SUFFIX, &*RX_AMOUNT]
        .into_iter()
        .find_map(|rx| rx.find(&masked))
        .map(|m| trim_amount(m.as_str()));
    StatValue {
        money,
        percent: percent.map(|m| m.as_str().to_string()),
    }
}

fn price_text(el: ElementRef<'_>) -> Option<String> {
    let text = non_empty(element_text(el))?;
    let masked = mask_percents(&text);
    let amount = [&*RX_MONEY_PREFIX, &*RX_MONEY_SUFFIX]
        .into_iter()
        .find_map(|rx| rx.find(&masked))
        .map(|m| trim_amount(m.as_str()));
    Some(amount.unwrap_or(text))
}

/// Blanks out every percentage so amount patterns cannot run into it. Byte
/// offsets are preserved.
fn mask_percents(text: &str) -> String {
    RX_PERCENT
        .replace_all(text, |caps: &regex::Captures<'_>| " ".repeat(caps[0].len()))
        .into_owned()
}

fn trim_amount(s: &str) -> String {
    s.trim().trim_end_matches([',', '.']).to_string()
}

/// All descendant text joined by single spaces.
pub fn element_text(el: ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<Vec<_>>().join(" "))
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(body: &str) -> Html {
        Html::parse_document(&format!("<html><body>{body}</body></html>"))
    }

    fn stat_box(label: &str, value: &str) -> String {
        format!(
            r#"<div class="StatsInfoBox_base__kP2xM"><dl><dt>{label}</dt><dd>{value}</dd></dl></div>"#
        )
    }

    #[test]
    fn name_prefers_title_attribute() {
        let d = doc(r#"<h1>Heading</h1><span data-role="coin-name" title="Bitcoin">BTC</span>"#);
        assert_eq!(locate(&d, &FieldSpec::Name).as_deref(), Some("Bitcoin"));
    }

    #[test]
    fn name_falls_back_to_text_then_heading() {
        let d = doc(r#"<span data-role="coin-name">Ethereum</span>"#);
        assert_eq!(locate(&d, &FieldSpec::Name).as_deref(), Some("Ethereum"));

        let d = doc("<h1>  Solana \n price </h1>");
        assert_eq!(locate(&d, &FieldSpec::Name).as_deref(), Some("Solana price"));

        let d = doc("<h2>Tether</h2>");
        assert_eq!(locate(&d, &FieldSpec::Name).as_deref(), Some("Tether"));
    }

    #[test]
    fn price_strategies_in_rank_order() {
        let d = doc(
            r#"<div class="sc-priceValue-x">$1.00</div>
               <span data-test="text-cdp-price-display">Price $67,000.00 today</span>"#,
        );
        assert_eq!(locate(&d, &FieldSpec::Price).as_deref(), Some("$67,000.00"));

        let d = doc(r#"<div data-testid="price-value">2 345,10 €</div>"#);
        assert_eq!(locate(&d, &FieldSpec::Price).as_deref(), Some("2 345,10 €"));

        let d = doc(r#"<div class="coin-PRICEVALUE">$0.42</div>"#);
        assert_eq!(locate(&d, &FieldSpec::Price).as_deref(), Some("$0.42"));
    }

    #[test]
    fn price_ignores_trailing_daily_change() {
        let d = doc(r#"<div class="sc-priceValue">$67,000.00 1.25%</div>"#);
        assert_eq!(locate(&d, &FieldSpec::Price).as_deref(), Some("$67,000.00"));

        let d = doc(r#"<span data-test="text-cdp-price-display">-0.8% 2 345,10 €</span>"#);
        assert_eq!(locate(&d, &FieldSpec::Price).as_deref(), Some("2 345,10 €"));
    }

    #[test]
    fn every_percentage_is_masked() {
        let v = split_amounts("1.2% $5.5B 3.4%");
        assert_eq!(v.money.as_deref(), Some("$5.5B"));
        assert_eq!(v.percent.as_deref(), Some("1.2%"));
    }

    #[test]
    fn price_without_amount_keeps_text() {
        let d = doc(r#"<span data-test="text-cdp-price-display">  unavailable </span>"#);
        assert_eq!(locate(&d, &FieldSpec::Price).as_deref(), Some("unavailable"));
    }

    #[test]
    fn stat_box_label_variants() {
        let d = doc(&[
            stat_box("Cap. Marché", "2,51% 1,92T €"),
            stat_box("FDV", "<span>2,01T €</span>"),
        ]
        .concat());
        assert_eq!(locate(&d, &FieldSpec::MarketCap).as_deref(), Some("1,92T €"));
        assert_eq!(locate(&d, &FieldSpec::FullyDilutedValue).as_deref(), Some("2,01T €"));

        let v = locate_stat(&d, &FieldSpec::MarketCap).unwrap();
        assert_eq!(v.percent.as_deref(), Some("2,51%"));
    }

    #[test]
    fn market_cap_ignores_diluted_box() {
        let d = doc(&[
            stat_box("Fully Diluted Market Cap", "$9.9T"),
            stat_box("Market cap<sup>1</sup>", "$1.32T"),
        ]
        .concat());
        assert_eq!(locate(&d, &FieldSpec::MarketCap).as_deref(), Some("$1.32T"));
    }

    #[test]
    fn definition_pair_fallback() {
        let d = doc("<dl><dt>Volume (24h)</dt><dd><a>$35.2B</a></dd></dl>");
        assert_eq!(locate(&d, &FieldSpec::Volume24h).as_deref(), Some("$35.2B"));
    }

    #[test]
    fn labeled_percent_only_stat() {
        let d = doc(&stat_box("Vol/Mkt Cap (24h) ⓘ", "3,55%"));
        let field = FieldSpec::from_label("Vol/Mkt Cap (24h)");
        assert_eq!(field, FieldSpec::Labeled("Vol/Mkt Cap (24h)".into()));
        assert_eq!(locate(&d, &field).as_deref(), Some("3,55%"));
        assert_eq!(locate(&d, &FieldSpec::MarketCap), None);
    }

    #[test]
    fn from_label_maps_known_names() {
        assert_eq!(FieldSpec::from_label("Cap. Marché"), FieldSpec::MarketCap);
        assert_eq!(FieldSpec::from_label(" FDV "), FieldSpec::FullyDilutedValue);
        assert_eq!(FieldSpec::from_label("Volume (24h)"), FieldSpec::Volume24h);
        assert_eq!(FieldSpec::from_label("Offre Totale"), FieldSpec::TotalSupply);
    }

    #[test]
    fn absent_is_none() {
        let d = doc("<p>nothing here</p>");
        for field in [
            FieldSpec::Name,
            FieldSpec::Price,
            FieldSpec::MarketCap,
            FieldSpec::TotalSupply,
            FieldSpec::Labeled("Max Supply".into()),
        ] {
            assert_eq!(locate(&d, &field), None, "{field:?}");
        }
    }

    #[test]
    fn split_amounts_shapes() {
        let v = split_amounts("#1 $1.32T");
        assert_eq!(v.money.as_deref(), Some("$1.32T"));
        let v = split_amounts("21M BTC");
        assert_eq!(v.money.as_deref(), Some("21M"));
        assert_eq!(v.percent, None);
    }
}
