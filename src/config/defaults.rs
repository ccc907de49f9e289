// src/config/defaults.rs
//! Built-in tables used when no config file overrides them.

use super::{SelectorRule, SourceSpec, TierRule};

pub const RETAILER_LINK_LIMIT: usize = 3;

pub const ALLOWED_RETAIL_HOSTS: &[&str] = &[
    "amazon.",
    "flipkart.com",
    "croma.com",
    "reliancedigital.in",
    "vijaysales.com",
    "tatacliq.com",
    "snapdeal.com",
    "jiomart.com",
    "myntra.com",
    "ajio.com",
    "nykaa.com",
    "poorvika.com",
    "sangeethamobiles.com",
    "bestbuy.com",
    "walmart.com",
    "ebay.",
];

pub const DENIED_HOST_KEYWORDS: &[&str] = &[
    "wikipedia",
    "wikihow",
    "youtube",
    "youtu.be",
    "facebook",
    "instagram",
    "twitter",
    "tiktok",
    "pinterest",
    "linkedin",
    "reddit",
    "quora",
    "forum",
    "news",
    "blog",
    "medium.com",
    "duckduckgo",
    "bing.com",
    "google.",
];

pub const SHOPPING_HINTS: &[&str] = &[
    "shop", "store", "buy", "product", "cart", "checkout", "deal",
];

pub const BLOCKED_EXTENSIONS: &[&str] = &[
    "pdf", "jpg", "jpeg", "png", "gif", "webp", "svg", "ico", "zip", "rar", "gz", "tar", "7z",
    "mp3", "mp4", "avi", "mov", "doc", "docx", "xls", "xlsx",
];

pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn sources() -> Vec<SourceSpec> {
    vec![
        SourceSpec::search("duckduckgo", "https://html.duckduckgo.com/html/?q={query}"),
        SourceSpec::search("bing", "https://www.bing.com/search?q={query}&setlang=en-IN"),
        SourceSpec::search("google", "https://www.google.com/search?q={query}&hl=en&gl=in"),
        SourceSpec::retailer(
            "amazon_in",
            "https://www.amazon.in/s?k={query}",
            "https://www.amazon.in",
        ),
        SourceSpec::retailer(
            "flipkart",
            "https://www.flipkart.com/search?q={query}",
            "https://www.flipkart.com",
        ),
        SourceSpec::retailer(
            "croma",
            "https://www.croma.com/searchB?q={query}",
            "https://www.croma.com",
        ),
        SourceSpec::retailer(
            "reliance_digital",
            "https://www.reliancedigital.in/search?q={query}",
            "https://www.reliancedigital.in",
        ),
    ]
}

pub fn tiers() -> Vec<TierRule> {
    vec![
        TierRule {
            bonus: 30,
            domains: strings(&["amazon.", "flipkart.com"]),
        },
        TierRule {
            bonus: 20,
            domains: strings(&[
                "croma.com",
                "reliancedigital.in",
                "vijaysales.com",
                "tatacliq.com",
                "jiomart.com",
            ]),
        },
        TierRule {
            bonus: 10,
            domains: strings(&["snapdeal.com", "myntra.com", "ajio.com", "poorvika.com"]),
        },
    ]
}

pub fn price_selectors() -> Vec<SelectorRule> {
    let rule = |host: &str, selectors: &[&str]| SelectorRule {
        host: host.to_string(),
        selectors: strings(selectors),
    };
    vec![
        rule(
            "amazon.",
            &[
                "#corePriceDisplay_desktop_feature_div .a-price .a-offscreen",
                "#corePrice_feature_div .a-price .a-offscreen",
                "#priceblock_dealprice",
                "#priceblock_ourprice",
                ".a-price .a-offscreen",
            ],
        ),
        rule("flipkart.com", &["div.Nx9bqj.CxhGGd", "div.Nx9bqj", "div._30jeq3._16Jk6d", "div._30jeq3"]),
        rule("croma.com", &["#pdp-product-price", "span.amount"]),
        rule("reliancedigital.in", &[".pdp__offerPrice", ".product-price"]),
        rule("vijaysales.com", &["span.price", ".product-price"]),
        rule("tatacliq.com", &["h3[class*=ProductDescription__price]", "[class*=price]"]),
        rule("snapdeal.com", &["span.payBlkBig", "span.pdp-final-price"]),
        rule("jiomart.com", &["#price_section .final-price", ".jm-heading-xs"]),
    ]
}
