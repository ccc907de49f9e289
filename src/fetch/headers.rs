// src/fetch/headers.rs
//! Rotation pool of browser-like request headers. Every call draws a fresh pair.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};

pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Mobile Safari/537.36",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.0.0",
];

pub const ACCEPT_LANGUAGES: &[&str] = &[
    "en-IN,en;q=0.9",
    "en-US,en;q=0.9",
    "en-GB,en;q=0.8,hi;q=0.6",
    "en-IN,hi-IN;q=0.8,en;q=0.7",
];

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Fresh (User-Agent, Accept-Language) pair plus a browser Accept header.
pub fn rotated() -> HeaderMap {
    let ua = USER_AGENTS[fastrand::usize(..USER_AGENTS.len())];
    let lang = ACCEPT_LANGUAGES[fastrand::usize(..ACCEPT_LANGUAGES.len())];
    let mut h = HeaderMap::new();
    h.insert(USER_AGENT, HeaderValue::from_static(ua));
    h.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(lang));
    h.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
    h
}
