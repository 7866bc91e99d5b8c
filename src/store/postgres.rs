//! PostgreSQL-backed stores.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use log::info;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres, Transaction};

use super::{HistoryStore, RateStore, UserStore};
use crate::conversion_history::{ConversionHistory, ConversionStatus, User};
use crate::error::{AppError, Result};
use crate::exchange_rate::{CurrencyRate, normalize_code};

/// Connection pool wrapper.
#[derive(Clone)]
pub struct DatabasePool {
    pool: PgPool,
}

impl DatabasePool {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        info!("Connecting to database (max_connections={max_connections})");

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(url)
            .await?;

        info!("Database connection pool established");
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Migrations completed");
        Ok(())
    }

    pub fn inner(&self) -> &PgPool {
        &self.pool
    }
}

#[derive(Debug, FromRow)]
struct DbCurrencyRate {
    code: String,
    rate: f64,
    last_updated: DateTime<Utc>,
    source: String,
}

impl From<DbCurrencyRate> for CurrencyRate {
    fn from(row: DbCurrencyRate) -> Self {
        CurrencyRate {
            code: row.code,
            rate: row.rate,
            last_updated: row.last_updated,
            source: row.source,
        }
    }
}

#[derive(Clone)]
pub struct PgRateStore {
    pool: PgPool,
}

impl PgRateStore {
    pub fn new(db: &DatabasePool) -> Self {
        Self {
            pool: db.inner().clone(),
        }
    }
}

#[async_trait]
impl RateStore for PgRateStore {
    async fn get(&self, code: &str) -> Result<Option<CurrencyRate>> {
        let row = sqlx::query_as::<_, DbCurrencyRate>(
            "SELECT code, rate, last_updated, source FROM currency_rates WHERE code = $1",
        )
        .bind(normalize_code(code))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn get_all(&self) -> Result<Vec<CurrencyRate>> {
        let rows = sqlx::query_as::<_, DbCurrencyRate>(
            "SELECT code, rate, last_updated, source FROM currency_rates ORDER BY code",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn put(&self, rate: &CurrencyRate) -> Result<CurrencyRate> {
        let row = sqlx::query_as::<_, DbCurrencyRate>(
            r#"
            INSERT INTO currency_rates (code, rate, last_updated, source)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (code) DO UPDATE SET
                rate = EXCLUDED.rate,
                last_updated = EXCLUDED.last_updated,
                source = EXCLUDED.source
            RETURNING code, rate, last_updated, source
            "#,
        )
        .bind(normalize_code(&rate.code))
        .bind(rate.rate)
        .bind(rate.last_updated)
        .bind(&rate.source)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn put_all(&self, rates: &[CurrencyRate]) -> Result<usize> {
        if rates.is_empty() {
            return Ok(0);
        }

        let codes: Vec<String> = rates.iter().map(|r| normalize_code(&r.code)).collect();
        let values: Vec<f64> = rates.iter().map(|r| r.rate).collect();
        let updated: Vec<DateTime<Utc>> = rates.iter().map(|r| r.last_updated).collect();
        let sources: Vec<&str> = rates.iter().map(|r| r.source.as_str()).collect();

        sqlx::query(
            r#"
            INSERT INTO currency_rates (code, rate, last_updated, source)
            SELECT * FROM UNNEST($1::text[], $2::float8[], $3::timestamptz[], $4::text[])
            ON CONFLICT (code) DO UPDATE SET
                rate = EXCLUDED.rate,
                last_updated = EXCLUDED.last_updated,
                source = EXCLUDED.source
            "#,
        )
        .bind(&codes)
        .bind(&values)
        .bind(&updated)
        .bind(&sources)
        .execute(&self.pool)
        .await?;

        Ok(rates.len())
    }

    async fn delete(&self, code: &str) -> Result<()> {
        let code = normalize_code(code);
        let result = sqlx::query("DELETE FROM currency_rates WHERE code = $1")
            .bind(&code)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "CurrencyRate not found with code: {code}"
            )));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(db: &DatabasePool) -> Self {
        Self {
            pool: db.inner().clone(),
        }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        let row: Option<(i64, String)> =
            sqlx::query_as("SELECT id, username FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(id, username)| User { id, username }))
    }
}

const HISTORY_SELECT: &str = r#"
    SELECT h.id, h.from_currency, h.to_currency, h.amount, h.converted_amount,
           h.converted_at, h.notes, h.status, h.user_id, u.username
    FROM conversion_history h
    LEFT JOIN users u ON u.id = h.user_id
"#;

#[derive(Debug, FromRow)]
struct DbConversionHistory {
    id: i64,
    from_currency: String,
    to_currency: String,
    amount: f64,
    converted_amount: f64,
    converted_at: NaiveDateTime,
    notes: String,
    status: String,
    user_id: Option<i64>,
    username: Option<String>,
}

#[derive(Debug, FromRow)]
struct DbHistoryRate {
    history_id: i64,
    code: String,
    rate: f64,
    last_updated: DateTime<Utc>,
    source: String,
}

impl DbConversionHistory {
    fn into_record(self, currency_rates: Vec<CurrencyRate>) -> Result<ConversionHistory> {
        let status = self
            .status
            .parse::<ConversionStatus>()
            .map_err(AppError::Processing)?;
        let user = match (self.user_id, self.username) {
            (Some(id), Some(username)) => Some(User { id, username }),
            _ => None,
        };
        Ok(ConversionHistory {
            id: self.id,
            from_currency: self.from_currency,
            to_currency: self.to_currency,
            amount: self.amount,
            converted_amount: self.converted_amount,
            converted_at: self.converted_at,
            notes: self.notes,
            status,
            user,
            currency_rates,
        })
    }
}

#[derive(Clone)]
pub struct PgHistoryStore {
    pool: PgPool,
}

impl PgHistoryStore {
    pub fn new(db: &DatabasePool) -> Self {
        Self {
            pool: db.inner().clone(),
        }
    }

    /// Loads the referenced rates for every row and assembles the records,
    /// keeping the row order.
    async fn assemble(&self, rows: Vec<DbConversionHistory>) -> Result<Vec<ConversionHistory>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let rate_rows = sqlx::query_as::<_, DbHistoryRate>(
            r#"
            SELECT r.history_id, c.code, c.rate, c.last_updated, c.source
            FROM conversion_history_rates r
            JOIN currency_rates c ON c.code = r.currency_code
            WHERE r.history_id = ANY($1)
            ORDER BY r.history_id, r.position
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_history: HashMap<i64, Vec<CurrencyRate>> = HashMap::new();
        for row in rate_rows {
            by_history.entry(row.history_id).or_default().push(CurrencyRate {
                code: row.code,
                rate: row.rate,
                last_updated: row.last_updated,
                source: row.source,
            });
        }

        rows.into_iter()
            .map(|row| {
                let rates = by_history.remove(&row.id).unwrap_or_default();
                row.into_record(rates)
            })
            .collect()
    }

    async fn fetch_one(&self, id: i64) -> Result<Option<ConversionHistory>> {
        let sql = format!("{HISTORY_SELECT} WHERE h.id = $1");
        let row = sqlx::query_as::<_, DbConversionHistory>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(self.assemble(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn link_rates(
        tx: &mut Transaction<'_, Postgres>,
        history_id: i64,
        rates: &[CurrencyRate],
    ) -> Result<()> {
        if rates.is_empty() {
            return Ok(());
        }

        let positions: Vec<i32> = (0..rates.len() as i32).collect();
        let codes: Vec<String> = rates.iter().map(|r| normalize_code(&r.code)).collect();

        sqlx::query(
            r#"
            INSERT INTO conversion_history_rates (history_id, position, currency_code)
            SELECT $1::bigint, * FROM UNNEST($2::int[], $3::text[])
            "#,
        )
        .bind(history_id)
        .bind(&positions)
        .bind(&codes)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    fn not_found(id: i64) -> AppError {
        AppError::NotFound(format!("ConversionHistory not found with id: {id}"))
    }
}

#[async_trait]
impl HistoryStore for PgHistoryStore {
    async fn save(&self, record: &ConversionHistory) -> Result<ConversionHistory> {
        let mut tx = self.pool.begin().await?;

        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO conversion_history
                (from_currency, to_currency, amount, converted_amount, converted_at, notes, status, user_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(&record.from_currency)
        .bind(&record.to_currency)
        .bind(record.amount)
        .bind(record.converted_amount)
        .bind(record.converted_at)
        .bind(&record.notes)
        .bind(record.status.as_str())
        .bind(record.user.as_ref().map(|u| u.id))
        .fetch_one(&mut *tx)
        .await?;

        Self::link_rates(&mut tx, id, &record.currency_rates).await?;
        tx.commit().await?;

        self.fetch_one(id).await?.ok_or_else(|| Self::not_found(id))
    }

    async fn update(&self, id: i64, record: &ConversionHistory) -> Result<ConversionHistory> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE conversion_history SET
                from_currency = $2,
                to_currency = $3,
                amount = $4,
                converted_amount = $5,
                converted_at = $6,
                notes = $7,
                status = $8,
                user_id = $9
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&record.from_currency)
        .bind(&record.to_currency)
        .bind(record.amount)
        .bind(record.converted_amount)
        .bind(record.converted_at)
        .bind(&record.notes)
        .bind(record.status.as_str())
        .bind(record.user.as_ref().map(|u| u.id))
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Self::not_found(id));
        }

        sqlx::query("DELETE FROM conversion_history_rates WHERE history_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        Self::link_rates(&mut tx, id, &record.currency_rates).await?;
        tx.commit().await?;

        self.fetch_one(id).await?.ok_or_else(|| Self::not_found(id))
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM conversion_history WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Self::not_found(id));
        }
        Ok(())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<ConversionHistory>> {
        self.fetch_one(id).await
    }

    async fn find_by_from_currency(&self, currency: &str) -> Result<Vec<ConversionHistory>> {
        let sql = format!("{HISTORY_SELECT} WHERE h.from_currency = $1 ORDER BY h.id");
        let rows = sqlx::query_as::<_, DbConversionHistory>(&sql)
            .bind(currency)
            .fetch_all(&self.pool)
            .await?;
        self.assemble(rows).await
    }

    async fn find_by_to_currency(&self, currency: &str) -> Result<Vec<ConversionHistory>> {
        let sql = format!("{HISTORY_SELECT} WHERE h.to_currency = $1 ORDER BY h.id");
        let rows = sqlx::query_as::<_, DbConversionHistory>(&sql)
            .bind(currency)
            .fetch_all(&self.pool)
            .await?;
        self.assemble(rows).await
    }

    async fn find_by_date(&self, date: NaiveDateTime) -> Result<Vec<ConversionHistory>> {
        let sql = format!("{HISTORY_SELECT} WHERE h.converted_at = $1 ORDER BY h.id");
        let rows = sqlx::query_as::<_, DbConversionHistory>(&sql)
            .bind(date)
            .fetch_all(&self.pool)
            .await?;
        self.assemble(rows).await
    }

    async fn find_by_user_id(&self, user_id: i64) -> Result<Vec<ConversionHistory>> {
        let sql = format!("{HISTORY_SELECT} WHERE h.user_id = $1 ORDER BY h.id");
        let rows = sqlx::query_as::<_, DbConversionHistory>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        self.assemble(rows).await
    }

    async fn find_all(&self) -> Result<Vec<ConversionHistory>> {
        let sql = format!("{HISTORY_SELECT} ORDER BY h.id");
        let rows = sqlx::query_as::<_, DbConversionHistory>(&sql)
            .fetch_all(&self.pool)
            .await?;
        self.assemble(rows).await
    }

    async fn find_page(&self, offset: i64, limit: i64) -> Result<(Vec<ConversionHistory>, i64)> {
        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM conversion_history")
            .fetch_one(&self.pool)
            .await?;

        let sql = format!("{HISTORY_SELECT} ORDER BY h.id LIMIT $1 OFFSET $2");
        let rows = sqlx::query_as::<_, DbConversionHistory>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok((self.assemble(rows).await?, total))
    }
}
