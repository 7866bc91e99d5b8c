use std::fmt;
use std::str::FromStr;

use chrono::{Local, NaiveDateTime, SubsecRound};
use serde::{Deserialize, Serialize};

use crate::exchange_rate::CurrencyRate;

pub const AUTOMATED_NOTE: &str = "Automated conversion";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConversionStatus {
    Pending,
    Completed,
    Failed,
}

impl ConversionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversionStatus::Pending => "PENDING",
            ConversionStatus::Completed => "COMPLETED",
            ConversionStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for ConversionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(ConversionStatus::Pending),
            "COMPLETED" => Ok(ConversionStatus::Completed),
            "FAILED" => Ok(ConversionStatus::Failed),
            other => Err(format!("Unknown conversion status: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
}

/// A persisted conversion. `id` is 0 until the record has been saved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionHistory {
    pub id: i64,
    pub from_currency: String,
    pub to_currency: String,
    pub amount: f64,
    pub converted_amount: f64,
    pub converted_at: NaiveDateTime,
    pub notes: String,
    pub status: ConversionStatus,
    pub user: Option<User>,
    pub currency_rates: Vec<CurrencyRate>,
}

impl ConversionHistory {
    /// Record of a successful conversion, stamped with the current local time
    /// truncated to whole seconds so it can be looked up by date.
    pub fn completed(
        from_currency: &str,
        to_currency: &str,
        amount: f64,
        converted_amount: f64,
        user: Option<User>,
    ) -> Self {
        Self {
            id: 0,
            from_currency: from_currency.to_uppercase(),
            to_currency: to_currency.to_uppercase(),
            amount,
            converted_amount,
            converted_at: Local::now().naive_local().trunc_subsecs(0),
            notes: AUTOMATED_NOTE.to_string(),
            status: ConversionStatus::Completed,
            user,
            currency_rates: Vec::new(),
        }
    }
}

/// Body of `PUT /api/history/{id}`. Rates are referenced by code only.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryUpdate {
    pub from_currency: String,
    pub to_currency: String,
    pub amount: f64,
    pub converted_amount: f64,
    pub converted_at: NaiveDateTime,
    #[serde(default)]
    pub notes: String,
    pub status: ConversionStatus,
    pub user_id: Option<i64>,
    #[serde(default)]
    pub currency_codes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    pub content: Vec<ConversionHistory>,
    pub page: i64,
    pub size: i64,
    pub total_elements: i64,
    pub total_pages: i64,
}

impl HistoryPage {
    pub fn new(content: Vec<ConversionHistory>, page: i64, size: i64, total_elements: i64) -> Self {
        let total_pages = if size > 0 {
            total_elements / size + i64::from(total_elements % size != 0)
        } else {
            0
        };
        Self {
            content,
            page,
            size,
            total_elements,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_text() {
        for status in [
            ConversionStatus::Pending,
            ConversionStatus::Completed,
            ConversionStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<ConversionStatus>(), Ok(status));
        }
        assert!("DONE".parse::<ConversionStatus>().is_err());
    }

    #[test]
    fn test_completed_record() {
        let record = ConversionHistory::completed("usd", "eur", 10.0, 9.2, None);
        assert_eq!(record.from_currency, "USD");
        assert_eq!(record.to_currency, "EUR");
        assert_eq!(record.status, ConversionStatus::Completed);
        assert_eq!(record.notes, AUTOMATED_NOTE);
        assert_eq!(record.converted_at.and_utc().timestamp_subsec_nanos(), 0);
    }

    #[test]
    fn test_serialized_shape() {
        let record = ConversionHistory::completed("USD", "EUR", 10.0, 9.2, None);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["fromCurrency"], "USD");
        assert_eq!(json["convertedAmount"], 9.2);
        assert_eq!(json["status"], "COMPLETED");
        assert!(json["currencyRates"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_page_counts() {
        assert_eq!(HistoryPage::new(vec![], 0, 10, 0).total_pages, 0);
        assert_eq!(HistoryPage::new(vec![], 0, 10, 10).total_pages, 1);
        assert_eq!(HistoryPage::new(vec![], 2, 10, 21).total_pages, 3);
        assert_eq!(HistoryPage::new(vec![], 0, i64::MAX, 2).total_pages, 1);
        assert_eq!(HistoryPage::new(vec![], 0, 1, i64::MAX).total_pages, i64::MAX);
    }
}
