// src/pipeline.rs
//! Aggregation orchestrator.
//!
//! One request walks `Init → FanOutSearch → CollectCandidates → Dedup →
//! FanOutPrice → Rank → Done`. Both fan-out phases draw from one process-wide
//! worker pool and share a single request deadline; anything still in flight
//! at the deadline is dropped and the request continues with what it has.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use metrics::{counter, histogram};
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cache::{CacheKey, ResultCache};
use crate::config::{ResultLimits, ScrapeConfig};
use crate::error::{ScrapeError, SourceError};
use crate::fetch::{FetchClient, Transport};
use crate::normalize::dedup_key;
use crate::price::PriceExtractor;
use crate::query::{anon_id, clean_query, normalize_for_key, with_locale_suffix};
use crate::rank::Ranker;
use crate::refine::{build_refiner, refine_or_keep, DynRefiner};
use crate::shopping::ShoppingFilter;
use crate::sources::{CandidateSource, WebSource};
use crate::types::{Candidate, ScrapeRequest, ScrapeResponse};

pub const NO_RESULTS_MESSAGE: &str = "No price results found";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    FanOutSearch,
    CollectCandidates,
    Dedup,
    FanOutPrice,
    Rank,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Init => "init",
            Stage::FanOutSearch => "fan_out_search",
            Stage::CollectCandidates => "collect_candidates",
            Stage::Dedup => "dedup",
            Stage::FanOutPrice => "fan_out_price",
            Stage::Rank => "rank",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

/// A serialized payload ready to send, plus where it came from.
#[derive(Debug, Clone)]
pub struct Served {
    pub payload: Arc<String>,
    pub cache: CacheStatus,
}

#[derive(Debug, Clone)]
struct Settings {
    source_timeout: Duration,
    deadline: Duration,
    candidate_cap: usize,
    include_unpriced: bool,
    locale_suffix: Option<String>,
    refine_timeout: Duration,
}

impl Settings {
    fn from_config(cfg: &ScrapeConfig) -> Self {
        Self {
            source_timeout: cfg.source_timeout(),
            deadline: cfg.request_deadline(),
            candidate_cap: cfg.candidate_cap.max(1),
            include_unpriced: cfg.include_unpriced,
            locale_suffix: cfg.locale_suffix.clone(),
            refine_timeout: Duration::from_millis(cfg.refine.timeout_ms.max(1)),
        }
    }
}

pub struct Aggregator {
    sources: Vec<Arc<dyn CandidateSource>>,
    fetcher: Arc<FetchClient>,
    extractor: PriceExtractor,
    ranker: Ranker,
    cache: Arc<ResultCache>,
    refiner: DynRefiner,
    permits: Arc<Semaphore>,
    settings: Settings,
    limits: ResultLimits,
}

impl Aggregator {
    /// Wire an aggregator from explicit sources and a fetch client (used for pricing).
    pub fn new(
        cfg: &ScrapeConfig,
        sources: Vec<Arc<dyn CandidateSource>>,
        fetcher: Arc<FetchClient>,
    ) -> Self {
        Self {
            sources,
            fetcher,
            extractor: PriceExtractor::from_rules(&cfg.price_selectors),
            ranker: Ranker::new(&cfg.retail.tiers),
            cache: Arc::new(ResultCache::new(cfg.cache_ttl())),
            refiner: build_refiner(&cfg.refine),
            permits: Arc::new(Semaphore::new(cfg.workers.max(1))),
            settings: Settings::from_config(cfg),
            limits: cfg.result_limits(),
        }
    }

    /// Configured web sources over the given transport.
    pub fn with_transport(cfg: &ScrapeConfig, transport: Arc<dyn Transport>) -> Self {
        let fetcher = Arc::new(FetchClient::new(
            transport,
            cfg.fetch_timeout(),
            crate::fetch::RetryPolicy {
                attempts: cfg.retry_attempts,
                base_backoff: Duration::from_millis(cfg.backoff_base_ms),
            },
        ));
        Self::from_fetcher(cfg, fetcher)
    }

    /// Production wiring: reqwest transport, configured sources.
    pub fn from_config(cfg: &ScrapeConfig) -> anyhow::Result<Self> {
        let fetcher = Arc::new(FetchClient::from_config(cfg)?);
        Ok(Self::from_fetcher(cfg, fetcher))
    }

    fn from_fetcher(cfg: &ScrapeConfig, fetcher: Arc<FetchClient>) -> Self {
        let filter = Arc::new(ShoppingFilter::from_config(&cfg.retail));
        let sources: Vec<Arc<dyn CandidateSource>> = cfg
            .sources
            .iter()
            .map(|spec| {
                Arc::new(WebSource::new(
                    spec.clone(),
                    fetcher.clone(),
                    filter.clone(),
                    cfg.results_per_source,
                )) as Arc<dyn CandidateSource>
            })
            .collect();
        Self::new(cfg, sources, fetcher)
    }

    pub fn with_refiner(mut self, refiner: DynRefiner) -> Self {
        self.refiner = refiner;
        self
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub async fn scrape(&self, req: &ScrapeRequest) -> Result<Served, ScrapeError> {
        counter!("scrape_requests_total").increment(1);
        let Some(raw) = req.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) else {
            debug!(target: "pricewise", stage = %Stage::Failed, "empty query rejected");
            return Err(ScrapeError::EmptyQuery);
        };

        let max = self.limits.clamp(req.max_results);
        let key: CacheKey = (normalize_for_key(raw), max);
        let id = anon_id(&key.0);
        debug!(target: "pricewise", q_id = %id, max, stage = %Stage::Init, "scrape request");

        if let Some(payload) = self.cache.get(&key) {
            counter!("scrape_cache_hits_total").increment(1);
            debug!(target: "pricewise", q_id = %id, stage = %Stage::Done, "served from cache");
            return Ok(Served {
                payload,
                cache: CacheStatus::Hit,
            });
        }
        counter!("scrape_cache_misses_total").increment(1);

        let started = Instant::now();
        let deadline = started + self.settings.deadline;
        let product = clean_query(raw);
        let refined =
            refine_or_keep(self.refiner.as_ref(), &product, self.settings.refine_timeout).await;
        let search_query = with_locale_suffix(&refined, self.settings.locale_suffix.as_deref());

        debug!(target: "pricewise", q_id = %id, stage = %Stage::FanOutSearch, sources = self.sources.len());
        let found = self.search_all(&search_query, deadline).await;

        debug!(target: "pricewise", q_id = %id, stage = %Stage::CollectCandidates);
        let Some(candidates) = self.collect(found) else {
            warn!(target: "pricewise", q_id = %id, attempted = self.sources.len(), "every source failed");
            return Err(ScrapeError::AllSourcesFailed {
                attempted: self.sources.len(),
            });
        };

        debug!(target: "pricewise", q_id = %id, stage = %Stage::Dedup, raw = candidates.len());
        let mut candidates = dedup(candidates);
        candidates.truncate(self.settings.candidate_cap);

        debug!(target: "pricewise", q_id = %id, stage = %Stage::FanOutPrice, candidates = candidates.len());
        self.price_all(&mut candidates, deadline).await;
        if !self.settings.include_unpriced {
            candidates.retain(Candidate::has_price);
        }

        debug!(target: "pricewise", q_id = %id, stage = %Stage::Rank);
        let results = self.ranker.rank(candidates, max);

        let response = ScrapeResponse {
            message: results.is_empty().then(|| NO_RESULTS_MESSAGE.to_string()),
            product,
            results,
        };
        let payload = Arc::new(serde_json::to_string(&response).unwrap_or_else(|_| "{}".to_string()));
        self.cache.insert(key, payload.clone());

        let elapsed_ms = started.elapsed().as_millis() as f64;
        histogram!("scrape_duration_ms").record(elapsed_ms);
        info!(
            target: "pricewise",
            q_id = %id,
            stage = %Stage::Done,
            results = response.results.len(),
            elapsed_ms,
            "scrape complete"
        );
        Ok(Served {
            payload,
            cache: CacheStatus::Miss,
        })
    }

    /// One outcome per configured source, in configured order; `None` means
    /// the request deadline cut it off.
    async fn search_all(
        &self,
        query: &str,
        deadline: Instant,
    ) -> Vec<Option<Result<Vec<Candidate>, SourceError>>> {
        let per_source = self.settings.source_timeout;
        fan_out(&self.permits, deadline, self.sources.iter(), |src| async move {
            tokio::time::timeout(per_source, src.search(query))
                .await
                .unwrap_or(Err(SourceError::Timeout))
        })
        .await
    }

    /// Merge source outcomes in configured order. `None` when no source succeeded.
    fn collect(
        &self,
        outcomes: Vec<Option<Result<Vec<Candidate>, SourceError>>>,
    ) -> Option<Vec<Candidate>> {
        let mut ok = 0usize;
        let mut merged = Vec::new();
        for (src, outcome) in self.sources.iter().zip(outcomes) {
            let err = match outcome {
                Some(Ok(found)) => {
                    ok += 1;
                    merged.extend(found);
                    continue;
                }
                Some(Err(e)) => e,
                None => SourceError::Timeout,
            };
            counter!("scrape_source_errors_total", "source" => src.name().to_string()).increment(1);
            warn!(target: "pricewise", source = src.name(), error = %err, "source contributed nothing");
        }
        (ok > 0).then_some(merged)
    }

    async fn price_all(&self, candidates: &mut [Candidate], deadline: Instant) {
        let to_price: Vec<(usize, String)> = candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.has_price())
            .map(|(i, c)| (i, c.url.clone()))
            .collect();

        let prices = fan_out(&self.permits, deadline, to_price.iter(), |entry| {
            self.price_of(&entry.1)
        })
        .await;

        for ((idx, _), price) in to_price.iter().zip(prices) {
            candidates[*idx].price = price.flatten();
        }
        let found = candidates.iter().filter(|c| c.has_price()).count();
        counter!("scrape_prices_found_total").increment(found as u64);
        counter!("scrape_prices_missing_total").increment((candidates.len() - found) as u64);
    }

    async fn price_of(&self, url: &str) -> Option<String> {
        let page = self.fetcher.fetch(url).await.ok()?;
        let hit = self.extractor.extract(url, &page.body)?;
        debug!(%url, layer = ?hit.layer, "price found");
        Some(hit.amount)
    }
}

/// Run `f` over `items` concurrently, at most one pool permit per task, until
/// all finish or `deadline` passes. Output order follows input order; tasks
/// still pending at the deadline are dropped and yield `None`.
pub async fn fan_out<I, F, Fut, T>(
    permits: &Semaphore,
    deadline: Instant,
    items: I,
    f: F,
) -> Vec<Option<T>>
where
    I: IntoIterator,
    F: Fn(I::Item) -> Fut,
    Fut: Future<Output = T>,
{
    let mut pending: FuturesUnordered<_> = items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            let work = f(item);
            async move {
                // a closed pool only happens at shutdown; run unthrottled then
                let _permit = permits.acquire().await.ok();
                (i, work.await)
            }
        })
        .collect();

    let mut out: Vec<Option<T>> = std::iter::repeat_with(|| None).take(pending.len()).collect();
    loop {
        match tokio::time::timeout_at(deadline, pending.next()).await {
            Ok(Some((i, value))) => out[i] = Some(value),
            Ok(None) => break,
            Err(_) => {
                warn!(target: "pricewise", abandoned = pending.len(), "request deadline reached");
                break;
            }
        }
    }
    out
}

/// First-seen wins, except that a priced duplicate replaces an unpriced keeper
/// (in the keeper's position).
pub fn dedup(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<Candidate> = Vec::with_capacity(candidates.len());
    for c in candidates {
        let key = dedup_key(&c.url).unwrap_or_else(|| c.url.clone());
        match index.get(&key) {
            Some(&i) => {
                if !out[i].has_price() && c.has_price() {
                    out[i] = c;
                }
            }
            None => {
                index.insert(key, out.len());
                out.push(c);
            }
        }
    }
    out
}
