//! Live exchange rate collection.
//!
//! This crate provides an HTTP client for the remote rate source and an
//! aggregator that fans out one fetch per configured exchange.
//!
//! ## Architecture
//!
//! - `client` - Upstream client behind the `RateSource` trait
//! - `aggregator` - Concurrent fan-out with a per-route TTL cache
//! - `cache` - Generic concurrent TTL cache

pub mod aggregator;
pub mod cache;
pub mod client;
pub mod error;
pub mod retry;

pub use aggregator::{RateAggregator, RATE_CACHE_TTL};
pub use cache::TtlCache;
pub use client::{RateItClient, RateItConfig, RateSource, DEFAULT_TIMEOUT, DEFAULT_UPSTREAM};
pub use error::*;
pub use retry::RetryPolicy;
