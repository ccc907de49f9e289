// src/normalize.rs
//! Anchor href → absolute, tracking-stripped URL.
//!
//! Rules, in order:
//! (a) absolute http(s) hrefs are kept, minus any `rut=` tracking suffix;
//! (b) redirect wrappers carrying `uddg=` are unwrapped (absolute wrappers included);
//! (c) root-relative hrefs on search-engine pages are searched for an embedded
//!     target in `url=` / `q=` / `u=` / `target=`;
//! (d) relative hrefs on retailer pages resolve against the retailer base.
//! Anything else is discarded.

use url::Url;

use crate::types::SourceKind;

const REDIRECT_MARKER: &str = "uddg=";
const EMBEDDED_TARGET_PARAMS: &[&str] = &["url", "q", "u", "target"];

const TRACKING_PARAMS: &[&str] = &[
    "gclid", "fbclid", "msclkid", "dclid", "yclid", "igshid", "mc_cid", "mc_eid", "rut",
    "srsltid", "ref", "ref_", "referrer", "tag", "affid", "_encoding", "psc", "sr", "qid",
    "sprefix", "crid", "keywords", "dib", "dib_tag", "spm", "otracker", "lid", "marketplace",
    "store", "srno", "iid", "ssid",
];
const TRACKING_PREFIXES: &[&str] = &["utm_", "pd_rd_", "pf_rd_"];

/// Normalize one anchor href found on `page` (a page of the given source kind).
pub fn normalize_href(href: &str, page: &Url, kind: &SourceKind) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|p| lower.starts_with(p))
    {
        return None;
    }

    let raw = if let Some(target) = unwrap_redirect(href) {
        target
    } else if is_absolute(&lower) {
        strip_rut(href).to_string()
    } else if let Some(rest) = href.strip_prefix("//") {
        strip_rut(&format!("https://{rest}")).to_string()
    } else if href.starts_with('/') && *kind == SourceKind::Search {
        embedded_target(href)?
    } else if *kind == SourceKind::Retailer {
        page.join(href).ok()?.to_string()
    } else {
        return None;
    };

    canonicalize(&raw)
}

fn is_absolute(lower: &str) -> bool {
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Drop a `&rut=` / `?rut=` tail added by meta-search redirectors.
fn strip_rut(url: &str) -> &str {
    ["&rut=", "?rut="]
        .iter()
        .filter_map(|m| url.find(m))
        .min()
        .map_or(url, |idx| &url[..idx])
}

/// (b): decode the substring after `uddg=` up to the next `&`.
fn unwrap_redirect(href: &str) -> Option<String> {
    let start = href.find(REDIRECT_MARKER)? + REDIRECT_MARKER.len();
    let tail = &href[start..];
    let encoded = tail.split('&').next().unwrap_or(tail);
    let decoded = urlencoding::decode(encoded).ok()?;
    let decoded = strip_rut(decoded.trim());
    is_absolute(&decoded.to_ascii_lowercase()).then(|| decoded.to_string())
}

/// (c): look for an absolute URL inside well-known redirect query params.
fn embedded_target(href: &str) -> Option<String> {
    let probe = Url::parse("https://redirect.invalid").ok()?.join(href).ok()?;
    probe.query_pairs().find_map(|(k, v)| {
        let key: &str = &k;
        let wanted = EMBEDDED_TARGET_PARAMS.contains(&key);
        let v = v.trim();
        (wanted && is_absolute(&v.to_ascii_lowercase())).then(|| strip_rut(v).to_string())
    })
}

fn is_tracking_param(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    TRACKING_PARAMS.contains(&key.as_str()) || TRACKING_PREFIXES.iter().any(|p| key.starts_with(p))
}

/// Absolute canonical form: http(s) only, no fragment, no tracking params,
/// no trailing slash. Idempotent.
pub fn canonicalize(raw: &str) -> Option<String> {
    let mut url = Url::parse(raw.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return None;
    }
    url.set_fragment(None);

    if url.query().is_some() {
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        let kept: Vec<&(String, String)> = pairs
            .iter()
            .filter(|(k, _)| !k.is_empty() && !is_tracking_param(k))
            .collect();
        if kept.is_empty() {
            url.set_query(None);
        } else if kept.len() != pairs.len() {
            url.query_pairs_mut()
                .clear()
                .extend_pairs(kept.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
    }

    let path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path.trim_end_matches('/');
        url.set_path(if trimmed.is_empty() { "/" } else { trimmed });
    }

    let mut out = url.to_string();
    if url.query().is_none() && out.ends_with('/') {
        out.pop();
    }
    Some(out)
}

/// Identity of a listing: canonical URL without scheme and `www.`.
pub fn dedup_key(url: &str) -> Option<String> {
    let canonical = canonicalize(url)?;
    let parsed = Url::parse(&canonical).ok()?;
    let host = parsed.host_str()?;
    let host = host.strip_prefix("www.").unwrap_or(host);
    let path = parsed.path().trim_end_matches('/');
    Some(match parsed.query() {
        Some(q) => format!("{host}{path}?{q}"),
        None => format!("{host}{path}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ddg() -> Url {
        Url::parse("https://html.duckduckgo.com/html/?q=iphone").unwrap()
    }

    #[test]
    fn absolute_href_loses_rut_suffix() {
        let out = normalize_href(
            "https://www.flipkart.com/apple-iphone-15/p/itm123&rut=abcdef",
            &ddg(),
            &SourceKind::Search,
        );
        assert_eq!(out.as_deref(), Some("https://www.flipkart.com/apple-iphone-15/p/itm123"));
    }

    #[test]
    fn uddg_wrapper_is_decoded() {
        let href = "//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.amazon.in%2Fdp%2FB0CHX1W1XY%3Fref%3Dsr_1_1&rut=deadbeef";
        let out = normalize_href(href, &ddg(), &SourceKind::Search);
        assert_eq!(out.as_deref(), Some("https://www.amazon.in/dp/B0CHX1W1XY"));
    }

    #[test]
    fn absolute_wrapper_is_unwrapped_too() {
        let href = "https://duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.croma.com%2Fp%2F300&rut=x";
        let out = normalize_href(href, &ddg(), &SourceKind::Search);
        assert_eq!(out.as_deref(), Some("https://www.croma.com/p/300"));
    }

    #[test]
    fn root_relative_redirect_on_search_page() {
        let google = Url::parse("https://www.google.com/search?q=iphone").unwrap();
        let href = "/url?q=https://www.croma.com/apple-iphone-15/p/300652&sa=U&ved=2ah";
        let out = normalize_href(href, &google, &SourceKind::Search);
        assert_eq!(out.as_deref(), Some("https://www.croma.com/apple-iphone-15/p/300652"));

        // no embedded absolute target -> discarded
        assert_eq!(normalize_href("/search?q=iphone", &google, &SourceKind::Search), None);
    }

    #[test]
    fn relative_href_on_retailer_page_resolves_against_base() {
        let base = Url::parse("https://www.amazon.in").unwrap();
        let out = normalize_href(
            "/Apple-iPhone-15-128-GB/dp/B0CHX1W1XY/ref=sr_1_1?keywords=iphone&qid=1700&sr=8-1",
            &base,
            &SourceKind::Retailer,
        );
        assert_eq!(
            out.as_deref(),
            Some("https://www.amazon.in/Apple-iPhone-15-128-GB/dp/B0CHX1W1XY/ref=sr_1_1")
        );
    }

    #[test]
    fn unmatched_hrefs_are_discarded() {
        assert_eq!(normalize_href("relative/path", &ddg(), &SourceKind::Search), None);
        assert_eq!(normalize_href("javascript:void(0)", &ddg(), &SourceKind::Retailer), None);
        assert_eq!(normalize_href("#top", &ddg(), &SourceKind::Retailer), None);
        assert_eq!(normalize_href("   ", &ddg(), &SourceKind::Search), None);
    }

    #[test]
    fn canonicalize_strips_tracking_and_trailing_slash() {
        assert_eq!(
            canonicalize("https://shop.example.com/item/42/?utm_source=x&color=red#reviews").as_deref(),
            Some("https://shop.example.com/item/42?color=red")
        );
        assert_eq!(canonicalize("https://shop.example.com/").as_deref(), Some("https://shop.example.com"));
        assert_eq!(canonicalize("ftp://files.example.com/a"), None);
    }

    #[test]
    fn normalization_is_idempotent() {
        let inputs = [
            "https://www.amazon.in/dp/B0CHX1W1XY/?tag=aff-21&th=1",
            "https://Shop.Example.com/a/b//",
            "https://example.com/?q=a%2Cb&utm_medium=mail",
            "https://example.com",
        ];
        for raw in inputs {
            let once = normalize_href(raw, &ddg(), &SourceKind::Search).unwrap();
            let twice = normalize_href(&once, &ddg(), &SourceKind::Search).unwrap();
            assert_eq!(once, twice, "not idempotent for {raw}");
        }
    }

    #[test]
    fn dedup_key_ignores_scheme_www_and_tracking() {
        let a = dedup_key("http://www.flipkart.com/p/itm1/?otracker=search").unwrap();
        let b = dedup_key("https://flipkart.com/p/itm1").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, "flipkart.com/p/itm1");
        assert_ne!(a, dedup_key("https://flipkart.com/p/itm2").unwrap());
    }
}
