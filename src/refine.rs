// src/refine.rs
//! Optional query refinement through an LLM.
//!
//! The refiner may only ever improve a query. Any failure (disabled, over the
//! daily limit, timeout, bad response) yields `None` and the caller keeps the
//! cleaned query it already has.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::RefineConfig;

pub const ENV_TEST_MODE: &str = "REFINE_TEST_MODE";
const MAX_REFINED_LEN: usize = 120;

pub trait QueryRefiner: Send + Sync {
    fn refine<'a>(&'a self, query: &'a str)
        -> Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>>;
    fn provider_name(&self) -> &'static str;
}

pub type DynRefiner = Arc<dyn QueryRefiner>;

/// Mock when `REFINE_TEST_MODE=mock`, otherwise the configured provider.
pub fn build_refiner(cfg: &RefineConfig) -> DynRefiner {
    if std::env::var(ENV_TEST_MODE).is_ok_and(|v| v.eq_ignore_ascii_case("mock")) {
        return Arc::new(MockRefiner);
    }
    let cfg = cfg.clone().resolved();
    if !cfg.enabled {
        return Arc::new(DisabledRefiner);
    }
    match cfg.provider.as_str() {
        "mock" => Arc::new(MockRefiner),
        "openai" if !cfg.api_key.is_empty() => match OpenAiRefiner::new(&cfg) {
            Ok(r) => Arc::new(r),
            Err(e) => {
                warn!(error = %e, "refiner http client failed to build; refinement disabled");
                Arc::new(DisabledRefiner)
            }
        },
        "openai" => {
            warn!("refine provider is openai but no API key is set; refinement disabled");
            Arc::new(DisabledRefiner)
        }
        other => {
            warn!(provider = other, "unknown refine provider; refinement disabled");
            Arc::new(DisabledRefiner)
        }
    }
}

/// Run `refiner` under `timeout`, falling back to `query` on any miss.
pub async fn refine_or_keep(refiner: &dyn QueryRefiner, query: &str, timeout: Duration) -> String {
    match tokio::time::timeout(timeout, refiner.refine(query)).await {
        Ok(Some(better)) => {
            debug!(provider = refiner.provider_name(), "query refined");
            better
        }
        Ok(None) => query.to_string(),
        Err(_) => {
            debug!(provider = refiner.provider_name(), "refiner timed out");
            query.to_string()
        }
    }
}

pub struct DisabledRefiner;

impl QueryRefiner for DisabledRefiner {
    fn refine<'a>(
        &'a self,
        _query: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>> {
        Box::pin(async { None })
    }
    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

/// Deterministic stand-in: returns the query single-spaced and trimmed.
pub struct MockRefiner;

impl QueryRefiner for MockRefiner {
    fn refine<'a>(
        &'a self,
        query: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>> {
        let out = sanitize(query);
        Box::pin(async move { out })
    }
    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// OpenAI chat-completions refiner with an in-memory daily call limit.
pub struct OpenAiRefiner {
    http: reqwest::Client,
    api_key: String,
    model: String,
    limit: DailyLimit,
}

impl OpenAiRefiner {
    pub fn new(cfg: &RefineConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("pricewise/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_millis(cfg.timeout_ms.max(1)))
            .build()?;
        Ok(Self {
            http,
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            limit: DailyLimit::new(cfg.daily_limit),
        })
    }

    async fn call(&self, query: &str) -> Option<String> {
        if !self.limit.try_take() {
            debug!("refine daily limit reached");
            return None;
        }

        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
            max_tokens: u32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: String,
        }

        let sys = "Rewrite the user's shopping query as a short product name with model and variant only. No prices, no marketing words, no punctuation. Output only the product name.";
        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: sys,
                },
                Msg {
                    role: "user",
                    content: query,
                },
            ],
            temperature: 0.0,
            max_tokens: 32,
        };

        let resp = self
            .http
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .ok()?;
        if !resp.status().is_success() {
            debug!(status = resp.status().as_u16(), "refine call rejected");
            return None;
        }
        let body: Resp = resp.json().await.ok()?;
        body.choices.first().and_then(|c| sanitize(&c.message.content))
    }
}

impl QueryRefiner for OpenAiRefiner {
    fn refine<'a>(
        &'a self,
        query: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>> {
        Box::pin(self.call(query))
    }
    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

/// Single line, no quotes, bounded length. Empty after cleanup is a miss.
fn sanitize(raw: &str) -> Option<String> {
    let line = raw.lines().find(|l| !l.trim().is_empty()).unwrap_or_default();
    let cleaned: String = line
        .trim()
        .trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(MAX_REFINED_LEN)
        .collect();
    (!cleaned.is_empty()).then_some(cleaned)
}

#[derive(Debug)]
struct DailyLimit {
    max: u32,
    state: Mutex<(u64, u32)>,
}

impl DailyLimit {
    fn new(max: u32) -> Self {
        Self {
            max,
            state: Mutex::new((today(), 0)),
        }
    }

    fn try_take(&self) -> bool {
        let mut g = self.state.lock().expect("refine limit mutex poisoned");
        let day = today();
        if g.0 != day {
            *g = (day, 0);
        }
        if g.1 >= self.max {
            return false;
        }
        g.1 += 1;
        true
    }
}

/// Days since the unix epoch.
fn today() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
        / 86_400
}
