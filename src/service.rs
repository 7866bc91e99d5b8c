//! Orchestration of rate refresh, conversion, history persistence and the
//! history lookup caches.

use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::cache::{LookupCache, currency_key, date_key};
use crate::conversion;
use crate::conversion_history::{ConversionHistory, HistoryPage, HistoryUpdate};
use crate::error::{AppError, Result};
use crate::exchange_client::RateProvider;
use crate::exchange_rate::{CurrencyRate, CurrencyRateUpdate, NewCurrencyRate, normalize_code};
use crate::store::{HistoryStore, RateStore, UserStore};

pub const MANUAL_SOURCE: &str = "manual";

#[derive(Debug, Clone, Deserialize)]
pub struct ConvertRequest {
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResult {
    pub from_currency: String,
    pub to_currency: String,
    pub converted_amount: f64,
}

pub fn require_non_blank(value: &str, message: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(message.to_string()));
    }
    Ok(())
}

pub fn require_positive(value: f64, message: &str) -> Result<()> {
    if !(value > 0.0 && value.is_finite()) {
        return Err(AppError::Validation(message.to_string()));
    }
    Ok(())
}

impl ConvertRequest {
    pub fn validate(&self) -> Result<()> {
        require_non_blank(&self.from, "From currency must not be blank")?;
        require_non_blank(&self.to, "To currency must not be blank")?;
        require_positive(self.amount, "Amount must be positive")
    }
}

/// Parses an ISO-8601 local date-time such as `2025-05-11T10:00:00`.
/// Seconds and fractions are optional; offsets are rejected.
pub fn parse_date(value: &str) -> Result<NaiveDateTime> {
    require_non_blank(value, "Date must not be blank")?;
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M"))
        .map_err(|_| {
            AppError::Validation(
                "Invalid date format. Use ISO format (e.g., 2025-05-11T10:00:00)".into(),
            )
        })
}

pub struct ConversionService {
    provider: Arc<dyn RateProvider>,
    rates: Arc<dyn RateStore>,
    history: Arc<dyn HistoryStore>,
    users: Arc<dyn UserStore>,
    from_cache: LookupCache,
    to_cache: LookupCache,
    date_cache: LookupCache,
    default_user_id: Option<i64>,
}

impl ConversionService {
    pub fn new(
        provider: Arc<dyn RateProvider>,
        rates: Arc<dyn RateStore>,
        history: Arc<dyn HistoryStore>,
        users: Arc<dyn UserStore>,
        default_user_id: Option<i64>,
    ) -> Self {
        Self {
            provider,
            rates,
            history,
            users,
            from_cache: LookupCache::new(),
            to_cache: LookupCache::new(),
            date_cache: LookupCache::new(),
            default_user_id,
        }
    }

    /// Refreshes rates from the provider, converts and records the result.
    pub async fn convert(&self, request: &ConvertRequest) -> Result<ConversionResult> {
        request.validate()?;
        let from = normalize_code(&request.from);
        let to = normalize_code(&request.to);

        let snapshot = self.provider.fetch_rates().await?;
        let converted_amount = conversion::convert(&from, &to, request.amount, &snapshot);

        let user = match self.default_user_id {
            Some(id) => {
                let user = self.users.find_by_id(id).await?;
                if user.is_none() {
                    warn!("Default user {id} not found, recording conversion without owner");
                }
                user
            }
            None => None,
        };

        let mut record =
            ConversionHistory::completed(&from, &to, request.amount, converted_amount, user);
        for code in [&from, &to] {
            if let Some(rate) = self.rates.get(code).await? {
                record.currency_rates.push(rate);
            }
        }

        let saved = self.history.save(&record).await?;
        info!(
            "Converted {} {from} to {converted_amount} {to} (history id {})",
            request.amount, saved.id
        );

        Ok(ConversionResult {
            from_currency: from,
            to_currency: to,
            converted_amount,
        })
    }

    pub async fn history_by_from_currency(&self, currency: &str) -> Result<Vec<ConversionHistory>> {
        require_non_blank(currency, "Currency must not be blank")?;
        let key = currency_key(currency.trim());
        if let Some(cached) = self.from_cache.get(&key).await {
            return Ok(cached);
        }

        let history = self.history.find_by_from_currency(&key).await?;
        self.from_cache.put(key, history.clone()).await;
        Ok(history)
    }

    pub async fn history_by_to_currency(&self, currency: &str) -> Result<Vec<ConversionHistory>> {
        require_non_blank(currency, "Currency must not be blank")?;
        let key = currency_key(currency.trim());
        if let Some(cached) = self.to_cache.get(&key).await {
            return Ok(cached);
        }

        let history = self.history.find_by_to_currency(&key).await?;
        self.to_cache.put(key, history.clone()).await;
        Ok(history)
    }

    pub async fn history_by_date(&self, date: &str) -> Result<Vec<ConversionHistory>> {
        let date = parse_date(date)?;
        let key = date_key(&date);
        if let Some(cached) = self.date_cache.get(&key).await {
            return Ok(cached);
        }

        let history = self.history.find_by_date(date).await?;
        self.date_cache.put(key, history.clone()).await;
        Ok(history)
    }

    pub async fn history_by_id(&self, id: i64) -> Result<ConversionHistory> {
        self.history
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("ConversionHistory not found with id: {id}")))
    }

    pub async fn history_by_user(&self, user_id: i64) -> Result<Vec<ConversionHistory>> {
        self.history.find_by_user_id(user_id).await
    }

    /// All records ordered by `converted_at`, oldest first.
    pub async fn history_sorted(&self) -> Result<Vec<ConversionHistory>> {
        let mut history = self.history.find_all().await?;
        history.sort_by(|a, b| a.converted_at.cmp(&b.converted_at));
        Ok(history)
    }

    pub async fn history_page(&self, page: i64, size: i64) -> Result<HistoryPage> {
        if page < 0 {
            return Err(AppError::Validation(
                "Page index must not be less than zero".into(),
            ));
        }
        if size < 1 {
            return Err(AppError::Validation(
                "Page size must not be less than one".into(),
            ));
        }
        let offset = page
            .checked_mul(size)
            .ok_or_else(|| AppError::Validation("Page index is too large".into()))?;
        let (content, total) = self.history.find_page(offset, size).await?;
        Ok(HistoryPage::new(content, page, size, total))
    }

    pub async fn update_history(&self, id: i64, update: HistoryUpdate) -> Result<ConversionHistory> {
        require_non_blank(&update.from_currency, "From currency must not be blank")?;
        require_non_blank(&update.to_currency, "To currency must not be blank")?;
        require_positive(update.amount, "Amount must be positive")?;

        let user = match update.user_id {
            Some(user_id) => Some(self.users.find_by_id(user_id).await?.ok_or_else(|| {
                AppError::Validation(format!("User not found with id: {user_id}"))
            })?),
            None => None,
        };

        let mut currency_rates = Vec::with_capacity(update.currency_codes.len());
        for code in &update.currency_codes {
            let rate = self.rates.get(code).await?.ok_or_else(|| {
                AppError::Validation(format!("CurrencyRate not found with code: {code}"))
            })?;
            currency_rates.push(rate);
        }

        let record = ConversionHistory {
            id,
            from_currency: normalize_code(&update.from_currency),
            to_currency: normalize_code(&update.to_currency),
            amount: update.amount,
            converted_amount: update.converted_amount,
            converted_at: update.converted_at,
            notes: update.notes,
            status: update.status,
            user,
            currency_rates,
        };
        self.history.update(id, &record).await
    }

    /// Removes only the history row; the lookup caches keep serving any list
    /// that already contains it.
    pub async fn delete_history(&self, id: i64) -> Result<()> {
        self.history.delete(id).await
    }

    pub async fn list_rates(&self) -> Result<Vec<CurrencyRate>> {
        self.rates.get_all().await
    }

    pub async fn get_rate(&self, code: &str) -> Result<CurrencyRate> {
        self.rates
            .get(code)
            .await?
            .ok_or_else(|| rate_not_found(code))
    }

    pub async fn create_rate(&self, new_rate: NewCurrencyRate) -> Result<CurrencyRate> {
        require_non_blank(&new_rate.code, "Currency code must not be blank")?;
        require_positive(new_rate.rate, "Rate must be positive")?;

        let rate = CurrencyRate::new(
            &new_rate.code,
            new_rate.rate,
            new_rate.last_updated.unwrap_or_else(Utc::now),
            new_rate.source.as_deref().unwrap_or(MANUAL_SOURCE),
        );
        self.rates.put(&rate).await
    }

    pub async fn update_rate(&self, code: &str, update: CurrencyRateUpdate) -> Result<CurrencyRate> {
        require_positive(update.rate, "Rate must be positive")?;

        let mut rate = self.get_rate(code).await?;
        rate.rate = update.rate;
        rate.last_updated = update.last_updated.unwrap_or_else(Utc::now);
        if let Some(source) = update.source {
            rate.source = source;
        }
        self.rates.put(&rate).await
    }

    pub async fn delete_rate(&self, code: &str) -> Result<()> {
        self.rates.delete(code).await
    }
}

fn rate_not_found(code: &str) -> AppError {
    AppError::NotFound(format!(
        "CurrencyRate not found with code: {}",
        normalize_code(code)
    ))
}
