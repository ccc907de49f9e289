// src/shopping.rs
//! Candidate vs. noise classification for normalized URLs.
//!
//! Deny rules win over allow rules. False negatives are acceptable; false
//! positives are weeded out later when no price can be extracted.

use url::Url;

use crate::config::RetailConfig;

#[derive(Debug, Clone)]
pub struct ShoppingFilter {
    allow: Vec<String>,
    deny: Vec<String>,
    hints: Vec<String>,
    blocked_extensions: Vec<String>,
}

impl ShoppingFilter {
    pub fn from_config(cfg: &RetailConfig) -> Self {
        let lower = |v: &[String]| -> Vec<String> {
            v.iter()
                .map(|s| s.trim().to_ascii_lowercase())
                .filter(|s| !s.is_empty())
                .collect()
        };
        Self {
            allow: lower(&cfg.allow),
            deny: lower(&cfg.deny),
            hints: lower(&cfg.shopping_hints),
            blocked_extensions: lower(&cfg.blocked_extensions)
                .into_iter()
                .map(|e| e.trim_start_matches('.').to_string())
                .collect(),
        }
    }

    pub fn accepts(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        if !matches!(parsed.scheme(), "http" | "https") {
            return false;
        }
        let Some(host) = parsed.host_str().map(|h| h.to_ascii_lowercase()) else {
            return false;
        };

        let path = parsed.path().to_ascii_lowercase();
        if self.has_blocked_extension(&path) {
            return false;
        }
        if self.deny.iter().any(|d| host.contains(d.as_str())) {
            return false;
        }
        if self.is_allowed_host(&host) {
            return true;
        }

        let path_and_query = match parsed.query() {
            Some(q) => format!("{path}?{}", q.to_ascii_lowercase()),
            None => path,
        };
        self.hints.iter().any(|h| path_and_query.contains(h.as_str()))
    }

    pub fn is_allowed_host(&self, host: &str) -> bool {
        self.allow.iter().any(|a| host.contains(a.as_str()))
    }

    fn has_blocked_extension(&self, path: &str) -> bool {
        let last = path.rsplit('/').next().unwrap_or_default();
        match last.rsplit_once('.') {
            Some((_, ext)) => self.blocked_extensions.iter().any(|b| b == ext),
            None => false,
        }
    }
}

impl Default for ShoppingFilter {
    fn default() -> Self {
        Self::from_config(&RetailConfig::default())
    }
}
