use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::exchange_rate::normalize_code;

/// `latest.json` payload as returned by the provider.
#[derive(Debug, Deserialize)]
pub struct LatestRates {
    pub base: Option<String>,
    pub timestamp: Option<i64>,
    pub rates: Option<HashMap<String, f64>>,
}

/// Point-in-time mapping from currency code to rate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateSnapshot {
    pub base: String,
    pub timestamp: DateTime<Utc>,
    pub rates: HashMap<String, f64>,
}

impl RateSnapshot {
    pub fn new(base: &str, timestamp: DateTime<Utc>, rates: HashMap<String, f64>) -> Self {
        Self {
            base: base.to_string(),
            timestamp,
            rates: rates
                .into_iter()
                .map(|(code, rate)| (normalize_code(&code), rate))
                .collect(),
        }
    }

    pub fn rate(&self, code: &str) -> Option<f64> {
        self.rates.get(&normalize_code(code)).copied()
    }
}

#[cfg(test)]
impl FromIterator<(&'static str, f64)> for RateSnapshot {
    fn from_iter<I: IntoIterator<Item = (&'static str, f64)>>(iter: I) -> Self {
        let rates = iter
            .into_iter()
            .map(|(code, rate)| (code.to_string(), rate))
            .collect();
        RateSnapshot::new("USD", Utc::now(), rates)
    }
}
