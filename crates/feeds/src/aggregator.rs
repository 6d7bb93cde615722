//! Rate aggregator for configured exchanges.
//!
//! Fetches every exchange concurrently, one task per route, and always
//! returns one rate per exchange in the order given: a failed fetch
//! degrades to an unavailable rate instead of failing the batch.

use crate::cache::TtlCache;
use crate::client::RateSource;
use crate::error::{FeedError, FeedResult};
use ratewatch_core::{Exchange, Rate};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

/// How long a fetched rate is served from cache.
pub const RATE_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Thread-safe, cloneable rate aggregator.
#[derive(Clone)]
pub struct RateAggregator {
    source: Arc<dyn RateSource>,
    /// Rates indexed by route.
    cache: Arc<TtlCache<String, Rate>>,
}

impl RateAggregator {
    pub fn new(source: Arc<dyn RateSource>) -> Self {
        Self::with_ttl(source, RATE_CACHE_TTL)
    }

    pub fn with_ttl(source: Arc<dyn RateSource>, ttl: Duration) -> Self {
        Self {
            source,
            cache: Arc::new(TtlCache::new(ttl)),
        }
    }

    /// Current rate of one exchange, served from cache when still live.
    pub async fn fetch(&self, exchange: &Exchange) -> FeedResult<Rate> {
        if let Some(mut rate) = self.cache.get(exchange.route.as_str()) {
            debug!(route = %exchange.route, "Rate served from cache");
            rate.name.clone_from(&exchange.name);
            return Ok(rate);
        }

        let value = self.source.rate(&exchange.route).await?;
        let rate = Rate::new(exchange.name.as_str(), value);
        self.cache.insert(exchange.route.clone(), rate.clone());
        Ok(rate)
    }

    /// Rates for every exchange, slot `i` belonging to `exchanges[i]`.
    pub async fn fetch_all(&self, exchanges: &[Exchange]) -> Vec<Rate> {
        let handles: Vec<_> = exchanges
            .iter()
            .cloned()
            .map(|exchange| {
                let this = self.clone();
                tokio::spawn(async move { this.fetch_or_degrade(&exchange).await })
            })
            .collect();

        let mut rates = Vec::with_capacity(exchanges.len());
        for (exchange, handle) in exchanges.iter().zip(handles) {
            let rate = match handle.await {
                Ok(rate) => rate,
                Err(e) => {
                    let err = FeedError::Task(e.to_string());
                    error!(route = %exchange.route, error = %err, "Unable to fetch rate");
                    Rate::unavailable(exchange.name.as_str())
                }
            };
            rates.push(rate);
        }

        rates
    }

    /// Drop expired cache entries. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.cache.delete_expired()
    }

    pub fn cached_routes(&self) -> usize {
        self.cache.len()
    }

    async fn fetch_or_degrade(&self, exchange: &Exchange) -> Rate {
        match self.fetch(exchange).await {
            Ok(rate) => rate,
            Err(e) => {
                error!(route = %exchange.route, error = %e, "Unable to fetch rate");
                let rate = Rate::unavailable(exchange.name.as_str());
                self.cache.insert(exchange.route.clone(), rate.clone());
                rate
            }
        }
    }
}
