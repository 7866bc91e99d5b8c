use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Latest known rate of a currency against the provider's base currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyRate {
    #[serde(alias = "currencyCode")]
    pub code: String,
    pub rate: f64,
    pub last_updated: DateTime<Utc>,
    pub source: String,
}

impl CurrencyRate {
    pub fn new(code: &str, rate: f64, last_updated: DateTime<Utc>, source: &str) -> Self {
        Self {
            code: normalize_code(code),
            rate,
            last_updated,
            source: source.to_string(),
        }
    }
}

/// Body of `POST /api/currency-rates`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCurrencyRate {
    #[serde(alias = "currencyCode", default)]
    pub code: String,
    pub rate: f64,
    pub last_updated: Option<DateTime<Utc>>,
    pub source: Option<String>,
}

/// Body of `PUT /api/currency-rates/{code}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyRateUpdate {
    pub rate: f64,
    pub last_updated: Option<DateTime<Utc>>,
    pub source: Option<String>,
}

pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}
