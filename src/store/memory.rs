//! In-process stores used when no database is configured.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use tokio::sync::RwLock;

use super::{HistoryStore, RateStore, UserStore};
use crate::conversion_history::{ConversionHistory, User};
use crate::error::{AppError, Result};
use crate::exchange_rate::{CurrencyRate, normalize_code};

#[derive(Clone, Default)]
pub struct MemoryRateStore {
    rates: Arc<RwLock<BTreeMap<String, CurrencyRate>>>,
}

impl MemoryRateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateStore for MemoryRateStore {
    async fn get(&self, code: &str) -> Result<Option<CurrencyRate>> {
        Ok(self.rates.read().await.get(&normalize_code(code)).cloned())
    }

    async fn get_all(&self) -> Result<Vec<CurrencyRate>> {
        Ok(self.rates.read().await.values().cloned().collect())
    }

    async fn put(&self, rate: &CurrencyRate) -> Result<CurrencyRate> {
        let mut stored = rate.clone();
        stored.code = normalize_code(&rate.code);
        self.rates
            .write()
            .await
            .insert(stored.code.clone(), stored.clone());
        Ok(stored)
    }

    async fn put_all(&self, rates: &[CurrencyRate]) -> Result<usize> {
        let mut map = self.rates.write().await;
        for rate in rates {
            let mut stored = rate.clone();
            stored.code = normalize_code(&rate.code);
            map.insert(stored.code.clone(), stored);
        }
        Ok(rates.len())
    }

    async fn delete(&self, code: &str) -> Result<()> {
        let code = normalize_code(code);
        match self.rates.write().await.remove(&code) {
            Some(_) => Ok(()),
            None => Err(AppError::NotFound(format!(
                "CurrencyRate not found with code: {code}"
            ))),
        }
    }
}

#[derive(Clone, Default)]
pub struct MemoryUserStore {
    users: Arc<RwLock<HashMap<i64, User>>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, user: User) {
        self.users.write().await.insert(user.id, user);
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }
}

/// Stored form of a record: users and rates are kept as references and
/// resolved against their stores on every read.
#[derive(Clone)]
struct StoredHistory {
    record: ConversionHistory,
    user_id: Option<i64>,
    rate_codes: Vec<String>,
}

struct HistoryTable {
    next_id: i64,
    rows: BTreeMap<i64, StoredHistory>,
}

#[derive(Clone)]
pub struct MemoryHistoryStore {
    table: Arc<RwLock<HistoryTable>>,
    rates: MemoryRateStore,
    users: MemoryUserStore,
}

impl MemoryHistoryStore {
    pub fn new(rates: MemoryRateStore, users: MemoryUserStore) -> Self {
        Self {
            table: Arc::new(RwLock::new(HistoryTable {
                next_id: 1,
                rows: BTreeMap::new(),
            })),
            rates,
            users,
        }
    }

    fn to_stored(id: i64, record: &ConversionHistory) -> StoredHistory {
        let mut record = record.clone();
        record.id = id;
        StoredHistory {
            user_id: record.user.take().map(|u| u.id),
            rate_codes: record
                .currency_rates
                .drain(..)
                .map(|r| normalize_code(&r.code))
                .collect(),
            record,
        }
    }

    async fn resolve(&self, stored: StoredHistory) -> Result<ConversionHistory> {
        let mut record = stored.record;
        record.user = match stored.user_id {
            Some(id) => self.users.find_by_id(id).await?,
            None => None,
        };
        for code in &stored.rate_codes {
            if let Some(rate) = self.rates.get(code).await? {
                record.currency_rates.push(rate);
            }
        }
        Ok(record)
    }

    async fn select<F>(&self, predicate: F) -> Result<Vec<ConversionHistory>>
    where
        F: Fn(&StoredHistory) -> bool + Send,
    {
        let matched: Vec<StoredHistory> = self
            .table
            .read()
            .await
            .rows
            .values()
            .filter(|row| predicate(row))
            .cloned()
            .collect();

        let mut records = Vec::with_capacity(matched.len());
        for stored in matched {
            records.push(self.resolve(stored).await?);
        }
        Ok(records)
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn save(&self, record: &ConversionHistory) -> Result<ConversionHistory> {
        let stored = {
            let mut table = self.table.write().await;
            let id = table.next_id;
            table.next_id += 1;
            let stored = Self::to_stored(id, record);
            table.rows.insert(id, stored.clone());
            stored
        };
        self.resolve(stored).await
    }

    async fn update(&self, id: i64, record: &ConversionHistory) -> Result<ConversionHistory> {
        let stored = {
            let mut table = self.table.write().await;
            let Some(row) = table.rows.get_mut(&id) else {
                return Err(AppError::NotFound(format!(
                    "ConversionHistory not found with id: {id}"
                )));
            };
            *row = Self::to_stored(id, record);
            row.clone()
        };
        self.resolve(stored).await
    }

    async fn delete(&self, id: i64) -> Result<()> {
        match self.table.write().await.rows.remove(&id) {
            Some(_) => Ok(()),
            None => Err(AppError::NotFound(format!(
                "ConversionHistory not found with id: {id}"
            ))),
        }
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<ConversionHistory>> {
        let stored = self.table.read().await.rows.get(&id).cloned();
        match stored {
            Some(stored) => Ok(Some(self.resolve(stored).await?)),
            None => Ok(None),
        }
    }

    async fn find_by_from_currency(&self, currency: &str) -> Result<Vec<ConversionHistory>> {
        self.select(|row| row.record.from_currency == currency).await
    }

    async fn find_by_to_currency(&self, currency: &str) -> Result<Vec<ConversionHistory>> {
        self.select(|row| row.record.to_currency == currency).await
    }

    async fn find_by_date(&self, date: NaiveDateTime) -> Result<Vec<ConversionHistory>> {
        self.select(|row| row.record.converted_at == date).await
    }

    async fn find_by_user_id(&self, user_id: i64) -> Result<Vec<ConversionHistory>> {
        self.select(|row| row.user_id == Some(user_id)).await
    }

    async fn find_all(&self) -> Result<Vec<ConversionHistory>> {
        self.select(|_| true).await
    }

    async fn find_page(&self, offset: i64, limit: i64) -> Result<(Vec<ConversionHistory>, i64)> {
        let skip = usize::try_from(offset).unwrap_or(usize::MAX);
        let take = usize::try_from(limit).unwrap_or(0);
        let (rows, total) = {
            let table = self.table.read().await;
            let rows: Vec<StoredHistory> = table
                .rows
                .values()
                .skip(skip)
                .take(take)
                .cloned()
                .collect();
            (rows, table.rows.len() as i64)
        };

        let mut content = Vec::with_capacity(rows.len());
        for stored in rows {
            content.push(self.resolve(stored).await?);
        }
        Ok((content, total))
    }
}
