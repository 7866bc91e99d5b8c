//! Client for the Open Exchange Rates `latest.json` endpoint.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use reqwest::{Client, Url};

use crate::config::ProviderConfig;
use crate::error::{AppError, Result};
use crate::exchange_rate::CurrencyRate;
use crate::rate_snapshot::{LatestRates, RateSnapshot};
use crate::store::RateStore;

#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Fetches the latest snapshot and records it in the rate store.
    async fn fetch_rates(&self) -> Result<RateSnapshot>;
}

pub struct ExchangeClient {
    client: Client,
    config: ProviderConfig,
    rates: Arc<dyn RateStore>,
}

impl ExchangeClient {
    pub fn new(config: ProviderConfig, rates: Arc<dyn RateStore>) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Can't build HTTP client: {e}")))?;
        Ok(Self {
            client,
            config,
            rates,
        })
    }

    fn url(&self) -> Result<Url> {
        Url::parse_with_params(
            &format!("{}/latest.json", self.config.base_url),
            &[("app_id", self.config.api_key.as_str())],
        )
        .map_err(|e| AppError::Config(format!("Invalid provider URL: {e}")))
    }

    async fn load_json(&self) -> Result<LatestRates> {
        let url = self.url()?;
        debug!("Requesting exchange rates from {}", url.path());

        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Request to {} failed: {e}", url.path())))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "Failed to fetch exchange rates: {status} - {body}"
            )));
        }

        let text = resp.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| AppError::Upstream(format!("Malformed exchange rate payload: {e}")))
    }
}

#[async_trait]
impl RateProvider for ExchangeClient {
    async fn fetch_rates(&self) -> Result<RateSnapshot> {
        if self.config.api_key.trim().is_empty() {
            return Err(AppError::Config(
                "API key for Open Exchange Rates is not provided".into(),
            ));
        }

        let latest = self.load_json().await?;
        let rates = match latest.rates {
            Some(rates) if !rates.is_empty() => rates,
            _ => {
                return Err(AppError::Upstream(
                    "Unable to fetch exchange rates: empty response".into(),
                ));
            }
        };

        let timestamp = latest
            .timestamp
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
            .unwrap_or_else(Utc::now);
        let snapshot = RateSnapshot::new(
            latest.base.as_deref().unwrap_or("USD"),
            timestamp,
            rates,
        );

        let rows: Vec<CurrencyRate> = snapshot
            .rates
            .iter()
            .map(|(code, rate)| CurrencyRate::new(code, *rate, timestamp, &self.config.source))
            .collect();
        let stored = self.rates.put_all(&rows).await?;
        info!(
            "Ingested {stored} exchange rates (base {}, as of {timestamp})",
            snapshot.base
        );

        Ok(snapshot)
    }
}
