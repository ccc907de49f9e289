// src/rank.rs
//! Ranking: `score = 100·has_price + tier_bonus(host)`, stable descending sort.
//!
//! The price term dominates: no tier bonus can lift an unpriced listing
//! above a priced one. Equal scores keep their incoming (dedup) order.

use url::Url;

use crate::config::TierRule;
use crate::types::Candidate;

pub const PRICE_WEIGHT: u32 = 100;

#[derive(Debug, Clone, Default)]
pub struct Ranker {
    tiers: Vec<TierRule>,
}

impl Ranker {
    pub fn new(tiers: &[TierRule]) -> Self {
        let tiers = tiers
            .iter()
            .map(|t| TierRule {
                bonus: t.bonus.min(PRICE_WEIGHT - 1),
                domains: t
                    .domains
                    .iter()
                    .map(|d| d.trim().to_ascii_lowercase())
                    .filter(|d| !d.is_empty())
                    .collect(),
            })
            .collect();
        Self { tiers }
    }

    /// First tier with a domain fragment contained in the host; 0 when none match.
    pub fn tier_bonus(&self, url: &str) -> u32 {
        let Some(host) = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
        else {
            return 0;
        };
        self.tiers
            .iter()
            .find(|t| t.domains.iter().any(|d| host.contains(d.as_str())))
            .map_or(0, |t| t.bonus)
    }

    pub fn score(&self, c: &Candidate) -> u32 {
        let priced = if c.has_price() { PRICE_WEIGHT } else { 0 };
        priced + self.tier_bonus(&c.url)
    }

    /// Sort descending by score and keep the first `max`.
    pub fn rank(&self, candidates: Vec<Candidate>, max: usize) -> Vec<Candidate> {
        let mut scored: Vec<(u32, Candidate)> =
            candidates.into_iter().map(|c| (self.score(&c), c)).collect();
        // sort_by is stable
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.into_iter().take(max).map(|(_, c)| c).collect()
    }
}
