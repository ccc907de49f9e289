// src/config/mod.rs
//! Pipeline tuning + declarative tables (sources, retail lists, price selectors).
//!
//! Every field has a safe default; a missing config file is not an error.

pub mod defaults;
pub mod refine;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::types::SourceKind;
pub use refine::RefineConfig;

pub const ENV_CONFIG_PATH: &str = "PRICEWISE_CONFIG_PATH";
pub const DEFAULT_TOML_PATH: &str = "config/pricewise.toml";
pub const DEFAULT_JSON_PATH: &str = "config/pricewise.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    /// Concurrent fetch workers shared by both fan-out phases.
    pub workers: usize,
    pub fetch_timeout_ms: u64,
    pub retry_attempts: u32,
    pub backoff_base_ms: u64,
    /// Budget for one adapter (fetch + parse), on top of per-fetch timeouts.
    pub source_timeout_ms: u64,
    /// Overall deadline wrapping both fan-out phases of a request.
    pub request_deadline_ms: u64,
    pub cache_ttl_ms: u64,
    /// Candidates kept after dedup, before pricing.
    pub candidate_cap: usize,
    pub results_per_source: usize,
    pub default_max_results: usize,
    pub max_results_limit: usize,
    /// Keep candidates whose price could not be extracted.
    pub include_unpriced: bool,
    pub locale_suffix: Option<String>,
    pub proxy_url: Option<String>,
    pub sources: Vec<SourceSpec>,
    pub retail: RetailConfig,
    pub price_selectors: Vec<SelectorRule>,
    pub refine: RefineConfig,
    pub metrics: MetricsConfig,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            workers: 8,
            fetch_timeout_ms: 8_000,
            retry_attempts: 3,
            backoff_base_ms: 250,
            source_timeout_ms: 12_000,
            request_deadline_ms: 25_000,
            cache_ttl_ms: 120_000,
            candidate_cap: 30,
            results_per_source: 10,
            default_max_results: 5,
            max_results_limit: 20,
            include_unpriced: true,
            locale_suffix: Some("Buy in India".to_string()),
            proxy_url: None,
            sources: defaults::sources(),
            retail: RetailConfig::default(),
            price_selectors: defaults::price_selectors(),
            refine: RefineConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

/// One search engine or retailer search page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceSpec {
    pub name: String,
    /// URL with a `{query}` placeholder, filled with the form-encoded query.
    pub template: String,
    pub kind: SourceKind,
    /// Base for resolving relative links (retailers). Falls back to the fetched page URL.
    #[serde(default)]
    pub base: Option<String>,
    /// Per-source link cap; retailers default to a handful of links.
    #[serde(default)]
    pub limit: Option<usize>,
}

impl SourceSpec {
    pub fn search(name: &str, template: &str) -> Self {
        Self {
            name: name.to_string(),
            template: template.to_string(),
            kind: SourceKind::Search,
            base: None,
            limit: None,
        }
    }

    pub fn retailer(name: &str, template: &str, base: &str) -> Self {
        Self {
            name: name.to_string(),
            template: template.to_string(),
            kind: SourceKind::Retailer,
            base: Some(base.to_string()),
            limit: Some(defaults::RETAILER_LINK_LIMIT),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetailConfig {
    /// Known retail host fragments (substring match).
    pub allow: Vec<String>,
    /// Non-commercial host keywords (substring match).
    pub deny: Vec<String>,
    pub shopping_hints: Vec<String>,
    pub blocked_extensions: Vec<String>,
    pub tiers: Vec<TierRule>,
}

impl Default for RetailConfig {
    fn default() -> Self {
        Self {
            allow: defaults::strings(defaults::ALLOWED_RETAIL_HOSTS),
            deny: defaults::strings(defaults::DENIED_HOST_KEYWORDS),
            shopping_hints: defaults::strings(defaults::SHOPPING_HINTS),
            blocked_extensions: defaults::strings(defaults::BLOCKED_EXTENSIONS),
            tiers: defaults::tiers(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TierRule {
    pub bonus: u32,
    pub domains: Vec<String>,
}

/// Host fragment → ordered CSS selectors holding the displayed price.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SelectorRule {
    pub host: String,
    pub selectors: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
}

/// Default and ceiling for the per-request result count.
#[derive(Debug, Clone, Copy)]
pub struct ResultLimits {
    pub default: usize,
    pub limit: usize,
}

impl ResultLimits {
    /// Clamp a caller-requested result count into `1..=limit`.
    pub fn clamp(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.default).clamp(1, self.limit)
    }
}

impl ScrapeConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
    pub fn source_timeout(&self) -> Duration {
        Duration::from_millis(self.source_timeout_ms)
    }
    pub fn request_deadline(&self) -> Duration {
        Duration::from_millis(self.request_deadline_ms)
    }
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    pub fn result_limits(&self) -> ResultLimits {
        ResultLimits {
            default: self.default_max_results,
            limit: self.max_results_limit.max(1),
        }
    }

    /// Parse from TOML or JSON text.
    pub fn from_str_with_hint(s: &str, hint_ext: &str) -> Result<Self> {
        let cfg: ScrapeConfig = if hint_ext == "json" {
            serde_json::from_str(s).context("parsing json config")?
        } else {
            toml::from_str(s).context("parsing toml config")?
        };
        Ok(cfg.sanitized())
    }

    /// Apply `PRICEWISE_*` env overrides.
    pub fn with_env_overrides(mut self) -> Self {
        env_override("PRICEWISE_WORKERS", &mut self.workers);
        env_override("PRICEWISE_FETCH_TIMEOUT_MS", &mut self.fetch_timeout_ms);
        env_override("PRICEWISE_SOURCE_TIMEOUT_MS", &mut self.source_timeout_ms);
        env_override("PRICEWISE_DEADLINE_MS", &mut self.request_deadline_ms);
        env_override("PRICEWISE_CACHE_TTL_MS", &mut self.cache_ttl_ms);
        env_override("PRICEWISE_CANDIDATE_CAP", &mut self.candidate_cap);
        env_override("PRICEWISE_RESULTS_PER_SOURCE", &mut self.results_per_source);
        env_flag("PRICEWISE_INCLUDE_UNPRICED", &mut self.include_unpriced);
        env_flag("METRICS_ROUTES", &mut self.metrics.enabled);
        if let Ok(p) = std::env::var("PRICEWISE_PROXY_URL") {
            let p = p.trim();
            self.proxy_url = (!p.is_empty()).then(|| p.to_string());
        }
        self.sanitized()
    }

    fn sanitized(mut self) -> Self {
        self.workers = self.workers.max(1);
        self.retry_attempts = self.retry_attempts.max(1);
        self.candidate_cap = self.candidate_cap.max(1);
        self.results_per_source = self.results_per_source.max(1);
        self.max_results_limit = self.max_results_limit.max(1);
        self.default_max_results = self.default_max_results.clamp(1, self.max_results_limit);
        if self.fetch_timeout_ms == 0 {
            self.fetch_timeout_ms = 8_000;
        }
        if let Some(s) = &self.locale_suffix {
            if s.trim().is_empty() {
                self.locale_suffix = None;
            }
        }
        self
    }
}

fn env_override<T: FromStr>(name: &str, slot: &mut T) {
    let Ok(raw) = std::env::var(name) else {
        return;
    };
    let raw = raw.trim();
    match raw.parse::<T>() {
        Ok(v) => *slot = v,
        Err(_) => tracing::warn!(env = name, value = raw, "ignoring unparsable config override"),
    }
}

fn env_flag(name: &str, slot: &mut bool) {
    let Ok(raw) = std::env::var(name) else {
        return;
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => *slot = true,
        "0" | "false" | "no" | "off" => *slot = false,
        other => tracing::warn!(env = name, value = other, "ignoring unparsable flag override"),
    }
}

/// Load config from an explicit path. Supports TOML or JSON formats.
pub fn load_from(path: &Path) -> Result<ScrapeConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    ScrapeConfig::from_str_with_hint(&content, ext.as_str())
}

/// Load config using env var + fallbacks, then apply env overrides:
/// 1) $PRICEWISE_CONFIG_PATH
/// 2) config/pricewise.toml
/// 3) config/pricewise.json
/// 4) built-in defaults
pub fn load_default() -> Result<ScrapeConfig> {
    let base = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if !pb.exists() {
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
        load_from(&pb)?
    } else if Path::new(DEFAULT_TOML_PATH).exists() {
        load_from(Path::new(DEFAULT_TOML_PATH))?
    } else if Path::new(DEFAULT_JSON_PATH).exists() {
        load_from(Path::new(DEFAULT_JSON_PATH))?
    } else {
        ScrapeConfig::default()
    };
    Ok(base.with_env_overrides())
}
