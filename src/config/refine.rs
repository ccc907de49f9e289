// src/config/refine.rs
use serde::{Deserialize, Serialize};
use std::env;

fn default_daily_limit() -> u32 {
    200
}
fn default_timeout_ms() -> u64 {
    3_000
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

/// Settings for the optional query-rewriting collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefineConfig {
    #[serde(default)]
    pub enabled: bool,
    /// "openai" | "mock" (case-insensitive)
    #[serde(default)]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// "ENV" (or empty) means: read from OPENAI_API_KEY
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_daily_limit")]
    pub daily_limit: u32,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: String::new(),
            model: default_model(),
            api_key: String::new(),
            daily_limit: default_daily_limit(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl RefineConfig {
    /// Normalize provider name and resolve the API key from env when asked to.
    pub fn resolved(mut self) -> Self {
        self.provider = self.provider.trim().to_ascii_lowercase();
        let key = self.api_key.trim();
        if key.is_empty() || key.eq_ignore_ascii_case("env") {
            self.api_key = env::var("OPENAI_API_KEY").unwrap_or_default();
        }
        if self.timeout_ms == 0 {
            self.timeout_ms = default_timeout_ms();
        }
        self
    }
}
