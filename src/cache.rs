// src/cache.rs
//! In-process response cache keyed by (normalized query, max_results).
//!
//! Entries hold the serialized payload so a hit is byte-identical to the miss
//! that filled it. Expiry is lazy on read; a background sweeper can reclaim
//! memory held by keys that are never asked for again.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::debug;

pub type CacheKey = (String, usize);

#[derive(Debug, Clone)]
struct CacheEntry {
    payload: Arc<String>,
    inserted_at: Instant,
}

#[derive(Debug)]
pub struct ResultCache {
    inner: Mutex<HashMap<CacheKey, CacheEntry>>,
    ttl: Duration,
}

impl ResultCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh payload for `key`, evicting it first if it has expired.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<String>> {
        let mut map = self.inner.lock().expect("cache mutex poisoned");
        match map.get(key) {
            Some(e) if e.inserted_at.elapsed() < self.ttl => Some(e.payload.clone()),
            Some(_) => {
                map.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: CacheKey, payload: Arc<String>) {
        if self.ttl.is_zero() {
            return;
        }
        let mut map = self.inner.lock().expect("cache mutex poisoned");
        map.insert(
            key,
            CacheEntry {
                payload,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Drop every expired entry; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut map = self.inner.lock().expect("cache mutex poisoned");
        let before = map.len();
        map.retain(|_, e| e.inserted_at.elapsed() < self.ttl);
        before - map.len()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("cache mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Periodically purge expired entries. Stops once the cache is dropped elsewhere.
pub fn spawn_sweeper(cache: &Arc<ResultCache>, every: Duration) -> JoinHandle<()> {
    let weak = Arc::downgrade(cache);
    let every = every.max(Duration::from_millis(10));
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(every);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tick.tick().await;
        loop {
            tick.tick().await;
            let Some(cache) = weak.upgrade() else {
                break;
            };
            let removed = cache.purge_expired();
            if removed > 0 {
                debug!(target: "pricewise", removed, remaining = cache.len(), "cache sweep");
            }
        }
    })
}
