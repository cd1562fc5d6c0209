//! Metrics recorded by the `Live`/`Archive` engines, grounded on the
//! teacher's `triedb_metrics.rs` (`reth-metrics`-style `#[derive(Metrics)]`).
//! Recording is infallible and never gates correctness (spec.md's
//! Non-goals exclude a metrics exporter surface, not internal recording).

use reth_metrics::{
    metrics::{Counter, Histogram},
    Metrics,
};

/// Metrics for one engine instance (Live or an Archive handle).
#[derive(Metrics, Clone)]
#[metrics(scope = "rust.eth.triedb")]
pub(crate) struct TrieDbMetrics {
    /// Histogram of `Apply` durations (in seconds).
    pub(crate) apply_histogram: Histogram,
    /// Histogram of `GetHash` durations (in seconds).
    pub(crate) hash_histogram: Histogram,
    /// Histogram of `Flush` durations (in seconds).
    pub(crate) flush_histogram: Histogram,

    /// Counter of node-cache hits.
    pub(crate) cache_hit_counter: Counter,
    /// Counter of node-cache misses.
    pub(crate) cache_miss_counter: Counter,
    /// Counter of node-cache page evictions.
    pub(crate) cache_eviction_counter: Counter,
}

impl TrieDbMetrics {
    pub(crate) fn record_apply_duration(&self, seconds: f64) {
        self.apply_histogram.record(seconds);
    }

    pub(crate) fn record_hash_duration(&self, seconds: f64) {
        self.hash_histogram.record(seconds);
    }

    pub(crate) fn record_flush_duration(&self, seconds: f64) {
        self.flush_histogram.record(seconds);
    }

    pub(crate) fn record_cache_stats(&self, stats: rust_eth_triedb_nodepool::CacheStats) {
        self.cache_hit_counter.increment(stats.hits);
        self.cache_miss_counter.increment(stats.misses);
        self.cache_eviction_counter.increment(stats.evictions);
    }
}
