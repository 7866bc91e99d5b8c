//! Currency conversion arithmetic over a rate snapshot.

use crate::rate_snapshot::RateSnapshot;

/// Rate used for a code that the snapshot does not know. Unknown currencies
/// therefore convert at parity instead of failing.
pub const FALLBACK_RATE: f64 = 1.0;

/// Converts `amount` of `from` into `to` using rates quoted against the
/// snapshot's base currency: `(amount / from_rate) * to_rate`.
///
/// Codes are matched case-insensitively. `amount` is not validated here.
pub fn convert(from: &str, to: &str, amount: f64, snapshot: &RateSnapshot) -> f64 {
    let from_rate = snapshot.rate(from).unwrap_or(FALLBACK_RATE);
    let to_rate = snapshot.rate(to).unwrap_or(FALLBACK_RATE);
    (amount / from_rate) * to_rate
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> RateSnapshot {
        [("USD", 1.0), ("EUR", 0.92), ("JPY", 155.4), ("GBP", 0.79)]
            .into_iter()
            .collect()
    }

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
    }

    #[test]
    fn test_identity_conversion() {
        let rates = snapshot();
        for code in ["USD", "EUR", "JPY", "GBP"] {
            assert!(approx_eq(convert(code, code, 123.45, &rates), 123.45));
        }
    }

    #[test]
    fn test_linear_in_amount() {
        let rates = snapshot();
        let single = convert("EUR", "JPY", 40.0, &rates);
        let double = convert("EUR", "JPY", 80.0, &rates);
        assert!(approx_eq(double, 2.0 * single));
    }

    #[test]
    fn test_cross_rate() {
        let rates = snapshot();
        assert!(approx_eq(convert("USD", "EUR", 100.0, &rates), 92.0));
        assert!(approx_eq(convert("EUR", "USD", 92.0, &rates), 100.0));
    }

    #[test]
    fn test_unknown_code_converts_at_parity() {
        let rates: RateSnapshot = [("USD", 1.0)].into_iter().collect();
        assert_eq!(convert("XXX", "USD", 100.0, &rates), 100.0);
        assert_eq!(convert("USD", "XXX", 100.0, &rates), 100.0);
    }

    #[test]
    fn test_codes_are_case_insensitive() {
        let rates = snapshot();
        assert_eq!(
            convert("usd", "eur", 10.0, &rates),
            convert("USD", "EUR", 10.0, &rates)
        );
    }
}
