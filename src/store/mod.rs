//! Persistence contracts for rates, conversion history and users.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::conversion_history::{ConversionHistory, User};
use crate::error::Result;
use crate::exchange_rate::CurrencyRate;

pub use memory::{MemoryHistoryStore, MemoryRateStore, MemoryUserStore};
pub use postgres::{DatabasePool, PgHistoryStore, PgRateStore, PgUserStore};

#[async_trait]
pub trait RateStore: Send + Sync {
    async fn get(&self, code: &str) -> Result<Option<CurrencyRate>>;

    async fn get_all(&self) -> Result<Vec<CurrencyRate>>;

    /// Inserts or overwrites the row for `rate.code`.
    async fn put(&self, rate: &CurrencyRate) -> Result<CurrencyRate>;

    async fn put_all(&self, rates: &[CurrencyRate]) -> Result<usize>;

    /// Fails with `NotFound` when no row exists for `code`.
    async fn delete(&self, code: &str) -> Result<()>;
}

/// Rates are linked by code. A link whose rate has been deleted is skipped on
/// read and resolves again once a rate with that code is stored.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Persists a new record and returns it with its generated id.
    async fn save(&self, record: &ConversionHistory) -> Result<ConversionHistory>;

    /// Replaces every field of an existing record. Fails with `NotFound`.
    async fn update(&self, id: i64, record: &ConversionHistory) -> Result<ConversionHistory>;

    /// Fails with `NotFound`. Referenced users and rates are left in place.
    async fn delete(&self, id: i64) -> Result<()>;

    async fn find_by_id(&self, id: i64) -> Result<Option<ConversionHistory>>;

    async fn find_by_from_currency(&self, currency: &str) -> Result<Vec<ConversionHistory>>;

    async fn find_by_to_currency(&self, currency: &str) -> Result<Vec<ConversionHistory>>;

    /// Exact match on `converted_at`.
    async fn find_by_date(&self, date: NaiveDateTime) -> Result<Vec<ConversionHistory>>;

    async fn find_by_user_id(&self, user_id: i64) -> Result<Vec<ConversionHistory>>;

    async fn find_all(&self) -> Result<Vec<ConversionHistory>>;

    /// Up to `limit` records ordered by id, skipping the first `offset`,
    /// together with the total record count.
    async fn find_page(&self, offset: i64, limit: i64) -> Result<(Vec<ConversionHistory>, i64)>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>>;
}
