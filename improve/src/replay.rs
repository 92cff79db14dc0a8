//! Single-position replay (§4.9): walks a stored price history holding
//! at most one position at a time, entering on momentum and exiting on
//! take-profit/stop-loss/max-hold/momentum-reversal — the same exit
//! conditions the live Safety Gate uses, so a simulated candidate is
//! judged by the rules it would actually trade under.

use planner::momentum;
use types::{Policy, PricePoint};

/// Per-trade and aggregate results of one replay run.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayResult {
    /// Realized return (fraction, not percent) for each closed trade.
    pub trade_returns: Vec<f64>,
    /// Unrealized return of a position still open at the end of history,
    /// folded into `final_return_pct` but not into `trade_returns`.
    pub final_return_pct: f64,
    pub sharpe: f64,
    pub max_drawdown_pct: f64,
    pub win_rate: f64,
}

enum OpenPosition {
    None,
    Long { entry_price: f64, entry_index: usize },
}

/// Replays `history` under `policy`. Needs at least two points to do
/// anything; shorter histories replay as a no-op (zeroed result) rather
/// than an error, since a thin history is an expected state early in the
/// agent's life, not a failure.
pub fn simulate(history: &[PricePoint], policy: &Policy) -> ReplayResult {
    if history.len() < 2 {
        return ReplayResult {
            trade_returns: vec![],
            final_return_pct: 0.0,
            sharpe: 0.0,
            max_drawdown_pct: 0.0,
            win_rate: 0.0,
        };
    }

    let mut position = OpenPosition::None;
    let mut trade_returns = Vec::new();

    for i in 0..history.len() {
        let point = &history[i];
        let score = momentum::score(&history[..=i], point.ts);

        match position {
            OpenPosition::None => {
                if score >= policy.buy_momentum_threshold {
                    position = OpenPosition::Long {
                        entry_price: point.price_usd,
                        entry_index: i,
                    };
                }
            }
            OpenPosition::Long { entry_price, entry_index } => {
                if entry_price <= 0.0 {
                    position = OpenPosition::None;
                    continue;
                }
                let pnl_pct = point.price_usd / entry_price - 1.0;
                let hold_minutes = (point.ts - history[entry_index].ts).num_milliseconds() as f64 / 60_000.0;
                let should_exit = pnl_pct <= policy.stop_loss_pct
                    || pnl_pct >= policy.take_profit_pct
                    || hold_minutes >= policy.max_hold_minutes
                    || score <= policy.sell_momentum_threshold;

                if should_exit {
                    trade_returns.push(pnl_pct);
                    position = OpenPosition::None;
                }
            }
        }
    }

    let final_return_pct = match position {
        OpenPosition::None => 0.0,
        OpenPosition::Long { entry_price, .. } if entry_price > 0.0 => {
            history.last().unwrap().price_usd / entry_price - 1.0
        }
        OpenPosition::Long { .. } => 0.0,
    };

    ReplayResult {
        sharpe: sharpe_ratio(&trade_returns),
        max_drawdown_pct: max_drawdown(&trade_returns),
        win_rate: win_rate(&trade_returns),
        final_return_pct,
        trade_returns,
    }
}

/// Unannualized Sharpe: mean return over the sample standard deviation.
/// Zero with fewer than two trades (nothing to take a spread over).
fn sharpe_ratio(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64;
    let stdev = variance.sqrt();
    if stdev == 0.0 {
        0.0
    } else {
        mean / stdev
    }
}

/// Largest peak-to-trough drop along the cumulative equity curve built by
/// compounding `returns` in order, starting from a unit of equity.
fn max_drawdown(returns: &[f64]) -> f64 {
    let mut equity: f64 = 1.0;
    let mut peak: f64 = 1.0;
    let mut worst: f64 = 0.0;
    for r in returns {
        equity *= 1.0 + r;
        peak = peak.max(equity);
        let drawdown = (peak - equity) / peak;
        worst = worst.max(drawdown);
    }
    worst
}

fn win_rate(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let wins = returns.iter().filter(|r| **r > 0.0).count();
    wins as f64 / returns.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn point(minutes_ago: i64, price: f64, now: chrono::DateTime<Utc>) -> PricePoint {
        PricePoint {
            ts: now - Duration::minutes(minutes_ago),
            price_usd: price,
        }
    }

    #[test]
    fn too_short_history_replays_as_a_no_op() {
        let result = simulate(&[], &Policy::default_conservative());
        assert_eq!(result.trade_returns.len(), 0);
        assert_eq!(result.sharpe, 0.0);
    }

    #[test]
    fn enters_and_exits_on_take_profit() {
        let now = Utc::now();
        let mut policy = Policy::default_conservative();
        policy.buy_momentum_threshold = 0.001;
        policy.take_profit_pct = 0.05;
        policy.stop_loss_pct = -0.5;
        policy.sell_momentum_threshold = -0.5;

        let history = vec![
            point(10, 100.0, now),
            point(9, 100.0, now),
            point(8, 100.0, now),
            point(7, 100.0, now),
            point(6, 100.0, now),
            point(5, 105.0, now),
            point(4, 106.0, now),
            point(3, 107.0, now),
            point(2, 108.0, now),
            point(1, 109.0, now),
        ];
        let result = simulate(&history, &policy);
        assert_eq!(result.trade_returns.len(), 1);
        assert!(result.trade_returns[0] >= 0.05);
    }

    #[test]
    fn max_drawdown_tracks_the_worst_peak_to_trough_drop() {
        let drawdown = max_drawdown(&[0.1, -0.2, 0.05]);
        // equity: 1.1 -> 0.88 -> 0.924; worst drop is (1.1-0.88)/1.1
        assert!((drawdown - (1.1 - 0.88) / 1.1).abs() < 1e-9);
    }

    #[test]
    fn sharpe_is_zero_with_fewer_than_two_trades() {
        assert_eq!(sharpe_ratio(&[0.1]), 0.0);
        assert_eq!(sharpe_ratio(&[]), 0.0);
    }

    #[test]
    fn win_rate_counts_strictly_positive_returns() {
        assert_eq!(win_rate(&[0.1, -0.1, 0.0, 0.2]), 0.5);
    }
}
