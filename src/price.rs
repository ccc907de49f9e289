// src/price.rs
//! Best-effort price extraction from a product page.
//!
//! Layers, first hit wins:
//! 1. site-specific selectors (host fragment → ordered CSS selectors)
//! 2. `<meta>` / `itemprop` price metadata, then `application/ld+json` blocks
//! 3. currency patterns over the visible page text
//!
//! Matches are returned verbatim as display strings; nothing is parsed into numbers.

use once_cell::sync::OnceCell;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::config::SelectorRule;

/// Which layer produced a price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceLayer {
    Selector,
    Metadata,
    StructuredData,
    Pattern,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceHit {
    pub amount: String,
    pub layer: PriceLayer,
}

struct CompiledRule {
    host: String,
    selectors: Vec<Selector>,
}

pub struct PriceExtractor {
    rules: Vec<CompiledRule>,
}

impl PriceExtractor {
    /// Compile the selector table. Invalid selectors are logged and skipped.
    pub fn from_rules(rules: &[SelectorRule]) -> Self {
        let rules = rules
            .iter()
            .map(|r| CompiledRule {
                host: r.host.trim().to_ascii_lowercase(),
                selectors: r
                    .selectors
                    .iter()
                    .filter_map(|s| match Selector::parse(s) {
                        Ok(sel) => Some(sel),
                        Err(e) => {
                            tracing::warn!(host = %r.host, selector = %s, error = %e, "skipping invalid price selector");
                            None
                        }
                    })
                    .collect(),
            })
            .filter(|r| !r.host.is_empty())
            .collect();
        Self { rules }
    }

    pub fn extract(&self, url: &str, html: &str) -> Option<PriceHit> {
        let doc = Html::parse_document(html);
        let host = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
            .unwrap_or_default();

        self.from_selectors(&host, &doc)
            .map(|a| (a, PriceLayer::Selector))
            .or_else(|| from_metadata(&doc).map(|a| (a, PriceLayer::Metadata)))
            .or_else(|| from_ld_json(&doc).map(|a| (a, PriceLayer::StructuredData)))
            .or_else(|| scan_currency(&visible_text(&doc)).map(|a| (a, PriceLayer::Pattern)))
            .map(|(amount, layer)| PriceHit { amount, layer })
    }

    fn from_selectors(&self, host: &str, doc: &Html) -> Option<String> {
        let rule = self.rules.iter().find(|r| host.contains(r.host.as_str()))?;
        rule.selectors.iter().find_map(|sel| {
            let text = doc
                .select(sel)
                .map(|el| element_text(&el))
                .find(|t| !t.is_empty())?;
            scan_currency(&text)
        })
    }
}

fn currency_patterns() -> &'static [Regex] {
    static PATTERNS: OnceCell<Vec<Regex>> = OnceCell::new();
    PATTERNS.get_or_init(|| {
        const AMOUNT: &str = r"(?:\d[\d,]*\d|\d)(?:\.\d{1,2})?";
        [
            format!(r"₹\s?{AMOUNT}"),
            format!(r"(?i)\bRs\.?\s?{AMOUNT}"),
            format!(r"\bINR\s?{AMOUNT}"),
            format!(r"\$\s?{AMOUNT}"),
        ]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
    })
}

/// Patterns are tried in priority order; the first pattern with any match
/// returns its earliest match in the text.
pub fn scan_currency(text: &str) -> Option<String> {
    currency_patterns()
        .iter()
        .find_map(|re| re.find(text))
        .map(|m| m.as_str().trim().to_string())
}

fn element_text(el: &ElementRef) -> String {
    el.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

fn currency_symbol(code: &str) -> String {
    match code.trim().to_ascii_uppercase().as_str() {
        "INR" => "₹".to_string(),
        "USD" => "$".to_string(),
        "" => String::new(),
        other => format!("{other} "),
    }
}

/// Amount from metadata: keep an embedded currency match, else prefix the declared currency.
fn format_amount(amount: &str, currency: Option<&str>) -> Option<String> {
    let amount = amount.trim();
    if !amount.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    if let Some(found) = scan_currency(amount) {
        return Some(found);
    }
    Some(format!("{}{}", currency.map(currency_symbol).unwrap_or_default(), amount))
}

fn from_metadata(doc: &Html) -> Option<String> {
    static META: OnceCell<Selector> = OnceCell::new();
    static ITEMPROP: OnceCell<Selector> = OnceCell::new();
    let meta = META.get_or_init(|| Selector::parse("meta").unwrap());
    let itemprop = ITEMPROP.get_or_init(|| Selector::parse("[itemprop]").unwrap());

    let key_of = |el: &ElementRef| -> String {
        let v = el.value();
        v.attr("property")
            .or_else(|| v.attr("itemprop"))
            .or_else(|| v.attr("name"))
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
    };

    let currency = doc
        .select(itemprop)
        .chain(doc.select(meta))
        .find(|el| {
            let k = key_of(el);
            k.ends_with("price:currency") || k == "pricecurrency"
        })
        .and_then(|el| el.value().attr("content").map(str::to_string));

    let from_meta = doc.select(meta).find_map(|el| {
        let k = key_of(&el);
        if !(k.ends_with("price:amount") || k == "price") {
            return None;
        }
        format_amount(el.value().attr("content")?, currency.as_deref())
    });
    if from_meta.is_some() {
        return from_meta;
    }

    // microdata on regular elements: <span itemprop="price" content="...">₹79,900</span>
    doc.select(itemprop)
        .filter(|el| el.value().name() != "meta")
        .filter(|el| key_of(el) == "price")
        .find_map(|el| {
            // displayed text keeps the currency symbol; `content` is usually bare
            if let Some(shown) = scan_currency(&element_text(&el)) {
                return Some(shown);
            }
            let raw = el
                .value()
                .attr("content")
                .map(str::to_string)
                .unwrap_or_else(|| element_text(&el));
            format_amount(&raw, currency.as_deref())
        })
}

fn from_ld_json(doc: &Html) -> Option<String> {
    static LD: OnceCell<Selector> = OnceCell::new();
    static RE_PRICE: OnceCell<Regex> = OnceCell::new();
    static RE_CURRENCY: OnceCell<Regex> = OnceCell::new();
    let ld = LD.get_or_init(|| Selector::parse(r#"script[type="application/ld+json"]"#).unwrap());
    let re_price = RE_PRICE.get_or_init(|| {
        Regex::new(r#""(?:price|lowPrice)"\s*:\s*"?(\d[\d,]*(?:\.\d+)?)"?"#).unwrap()
    });
    let re_currency =
        RE_CURRENCY.get_or_init(|| Regex::new(r#""priceCurrency"\s*:\s*"([A-Za-z]{3})""#).unwrap());

    // Tolerant scan instead of JSON parsing: embedded blocks are often malformed.
    doc.select(ld).find_map(|el| {
        let raw: String = el.text().collect();
        let block = html_escape::decode_html_entities(&raw);
        let amount = re_price.captures(&block)?.get(1)?.as_str().to_string();
        let currency = re_currency
            .captures(&block)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());
        format_amount(&amount, currency.as_deref())
    })
}

/// Text a reader would see: no script/style/head content.
fn visible_text(doc: &Html) -> String {
    let mut out = String::new();
    for node in doc.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value().as_element().is_some_and(|e| {
                matches!(e.name(), "script" | "style" | "noscript" | "template" | "head")
            })
        });
        if !hidden {
            out.push_str(text);
            out.push(' ');
        }
    }
    out
}
