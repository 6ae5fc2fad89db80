//! In-memory front cache for webhook idempotency.
//!
//! The persistent webhook_log tree is the source of truth; this guard
//! short-circuits the common case of an acquirer retrying a delivery
//! seconds after the original without touching the store.
//! Uses IndexSet for O(1) lookup + ordered eviction.

use indexmap::IndexSet;

const CACHE_SIZE: usize = 10_000;

pub struct WebhookDedupGuard {
    cache: IndexSet<String>,
}

impl WebhookDedupGuard {
    pub fn new() -> Self {
        Self { cache: IndexSet::with_capacity(CACHE_SIZE) }
    }

    /// True if this provider event id was seen recently.
    pub fn seen(&self, provider_event_id: &str) -> bool {
        self.cache.contains(provider_event_id)
    }

    /// Record a processed event id, evicting the oldest when full.
    pub fn record(&mut self, provider_event_id: &str) {
        if self.cache.len() >= CACHE_SIZE {
            self.cache.shift_remove_index(0);
        }
        self.cache.insert(provider_event_id.to_string());
    }
}

impl Default for WebhookDedupGuard {
    fn default() -> Self {
        Self::new()
    }
}
