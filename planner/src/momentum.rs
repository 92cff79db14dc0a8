//! Momentum score (Glossary: `0.7*r1 + 0.3*r5`), shared by the Safety
//! Gate exit scan, the rule planner backend, and the Improvement Gate's
//! replay simulation.
//!
//! Deliberately pure: no async, no I/O, consistent with how
//! `scheduler::eligibility` keeps its checks free of side effects.

use chrono::{DateTime, Duration, Utc};
use types::PricePoint;

/// Returns the most recent price at or before `target`, scanning from the
/// newest entry backward since `history` is append-ordered.
fn price_at_or_before(history: &[PricePoint], target: DateTime<Utc>) -> Option<f64> {
    history
        .iter()
        .rev()
        .find(|p| p.ts <= target)
        .map(|p| p.price_usd)
}

/// Return over the trailing `minutes` window ending at `now`, or `None`
/// if `history` doesn't reach back far enough or the past price is zero.
pub fn trailing_return(history: &[PricePoint], now: DateTime<Utc>, minutes: i64) -> Option<f64> {
    let latest = history.last()?;
    let past = price_at_or_before(history, now - Duration::minutes(minutes))?;
    if past == 0.0 {
        return None;
    }
    Some(latest.price_usd / past - 1.0)
}

/// `0.7 * r1 + 0.3 * r5`. Windows with insufficient history contribute
/// zero rather than failing the whole score — a thin history should read
/// as "no signal yet", not as an error.
pub fn score(history: &[PricePoint], now: DateTime<Utc>) -> f64 {
    let r1 = trailing_return(history, now, 1).unwrap_or(0.0);
    let r5 = trailing_return(history, now, 5).unwrap_or(0.0);
    0.7 * r1 + 0.3 * r5
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(minutes_ago: i64, price: f64, now: DateTime<Utc>) -> PricePoint {
        PricePoint {
            ts: now - Duration::minutes(minutes_ago),
            price_usd: price,
        }
    }

    #[test]
    fn score_is_zero_with_no_history() {
        let now = Utc::now();
        assert_eq!(score(&[], now), 0.0);
    }

    #[test]
    fn score_weights_one_and_five_minute_returns() {
        let now = Utc::now();
        let history = vec![
            point(10, 100.0, now),
            point(5, 100.0, now),
            point(1, 110.0, now),
            point(0, 121.0, now),
        ];
        // r1 = 121/110 - 1 = 0.1, r5 = 121/100 - 1 = 0.21
        let s = score(&history, now);
        let expected = 0.7 * 0.1 + 0.3 * 0.21;
        assert!((s - expected).abs() < 1e-9);
    }

    #[test]
    fn trailing_return_none_when_window_not_covered() {
        let now = Utc::now();
        let history = vec![point(0, 100.0, now)];
        assert_eq!(trailing_return(&history, now, 5), None);
    }
}
