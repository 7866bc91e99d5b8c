//! Process-local lookup cache for history queries.
//!
//! Entries are written on the first miss for a key and kept for the lifetime
//! of the process: there is no TTL, no capacity bound and no invalidation when
//! the history store changes. A conversion saved after a key was cached is not
//! visible through that key until restart. Callers that need fresh data must
//! query the store directly.
//!
//! From-currency and to-currency lookups both key on the bare code, so a single
//! shared map would answer one with the other's results. The service keeps one
//! `LookupCache` per query family instead.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDateTime, Timelike};
use log::debug;
use tokio::sync::Mutex;

use crate::conversion_history::ConversionHistory;

pub const DATE_KEY_PREFIX: &str = "date_";

/// Key for by-from-currency and by-to-currency lookups.
pub fn currency_key(currency: &str) -> String {
    currency.to_uppercase()
}

/// Key for exact-date lookups: the prefix followed by the ISO-8601 local
/// date-time in its shortest form.
pub fn date_key(date: &NaiveDateTime) -> String {
    format!("{DATE_KEY_PREFIX}{}", canonical_date(date))
}

/// Seconds are omitted when they and the fraction are zero; the fraction is
/// printed in groups of 3, 6 or 9 digits.
pub fn canonical_date(date: &NaiveDateTime) -> String {
    if date.second() == 0 && date.nanosecond() == 0 {
        date.format("%Y-%m-%dT%H:%M").to_string()
    } else {
        date.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
    }
}

#[derive(Clone, Default)]
pub struct LookupCache {
    inner: Arc<Mutex<HashMap<String, Vec<ConversionHistory>>>>,
}

impl LookupCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> Option<Vec<ConversionHistory>> {
        let cache = self.inner.lock().await;
        let value = cache.get(key).cloned();
        if value.is_some() {
            debug!("Cache HIT for {key}");
        } else {
            debug!("Cache MISS for {key}");
        }
        value
    }

    /// Last writer wins for concurrent puts on the same key.
    pub async fn put(&self, key: String, value: Vec<ConversionHistory>) {
        let mut cache = self.inner.lock().await;
        debug!("Cache PUT for {key} ({} records)", value.len());
        cache.insert(key, value);
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    #[cfg(test)]
    pub(crate) async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}
