use serde::{Deserialize, Serialize};

/// A clamp range for one numeric policy field, `[lo, hi]` inclusive.
#[derive(Debug, Clone, Copy)]
pub struct ClampRange {
    pub lo: f64,
    pub hi: f64,
}

impl ClampRange {
    pub const fn new(lo: f64, hi: f64) -> Self {
        Self { lo, hi }
    }

    pub fn clamp(&self, v: f64) -> f64 {
        v.clamp(self.lo, self.hi)
    }
}

/// The mutable rule table the rule-based planner, the Safety Gate's exit
/// scan, and the Improvement Gate all read (§3 `Policy`).
///
/// Every field has a hard-coded clamp range; `Policy::clamp_all` enforces
/// them after construction or mutation (used by the Improvement Gate when
/// it mutates a candidate, §4.9).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub buy_momentum_threshold: f64,
    pub sell_momentum_threshold: f64,
    pub take_profit_pct: f64,
    pub stop_loss_pct: f64,
    pub max_hold_minutes: f64,
    pub trade_allocation_pct: f64,
    pub min_trade_native: f64,
    pub max_trade_native: f64,
    pub max_open_positions: u32,
    pub sell_fraction: f64,
    pub intent_slippage_bps: u32,
}

macro_rules! ranges {
    ($($field:ident: $lo:expr, $hi:expr;)*) => {
        impl Policy {
            pub fn clamp_ranges() -> PolicyRanges {
                PolicyRanges {
                    $($field: ClampRange::new($lo, $hi),)*
                }
            }
        }
    };
}

pub struct PolicyRanges {
    pub buy_momentum_threshold: ClampRange,
    pub sell_momentum_threshold: ClampRange,
    pub take_profit_pct: ClampRange,
    pub stop_loss_pct: ClampRange,
    pub max_hold_minutes: ClampRange,
    pub trade_allocation_pct: ClampRange,
    pub sell_fraction: ClampRange,
    pub intent_slippage_bps: ClampRange,
}

ranges! {
    buy_momentum_threshold: 0.001, 0.03;
    sell_momentum_threshold: -0.03, -0.0005;
    take_profit_pct: 0.01, 0.25;
    stop_loss_pct: -0.25, -0.01;
    max_hold_minutes: 30.0, 1440.0;
    trade_allocation_pct: 0.01, 0.4;
    sell_fraction: 0.25, 1.0;
    intent_slippage_bps: 30.0, 500.0;
}

impl Policy {
    pub fn default_conservative() -> Self {
        Self {
            buy_momentum_threshold: 0.01,
            sell_momentum_threshold: -0.01,
            take_profit_pct: 0.08,
            stop_loss_pct: -0.05,
            max_hold_minutes: 240.0,
            trade_allocation_pct: 0.05,
            min_trade_native: 0.05,
            max_trade_native: 1.0,
            max_open_positions: 5,
            sell_fraction: 1.0,
            intent_slippage_bps: 100,
        }
    }

    /// Clamps every ranged field into its hard-coded domain and, if the
    /// mutation pushed `max_trade_native` below `min_trade_native`, raises
    /// `max_trade_native` to match (§4.9).
    pub fn clamp_all(&mut self) {
        let r = Self::clamp_ranges();
        self.buy_momentum_threshold = r.buy_momentum_threshold.clamp(self.buy_momentum_threshold);
        self.sell_momentum_threshold = r
            .sell_momentum_threshold
            .clamp(self.sell_momentum_threshold);
        self.take_profit_pct = r.take_profit_pct.clamp(self.take_profit_pct);
        self.stop_loss_pct = r.stop_loss_pct.clamp(self.stop_loss_pct);
        self.max_hold_minutes = r.max_hold_minutes.clamp(self.max_hold_minutes);
        self.trade_allocation_pct = r.trade_allocation_pct.clamp(self.trade_allocation_pct);
        self.sell_fraction = r.sell_fraction.clamp(self.sell_fraction);
        self.intent_slippage_bps =
            r.intent_slippage_bps.clamp(self.intent_slippage_bps as f64) as u32;
        self.max_open_positions = self.max_open_positions.clamp(1, 10);
        if self.min_trade_native < 0.01 {
            self.min_trade_native = 0.01;
        }
        if self.max_trade_native < self.min_trade_native {
            self.max_trade_native = self.min_trade_native;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_all_enforces_all_ranges() {
        let mut p = Policy {
            buy_momentum_threshold: 10.0,
            sell_momentum_threshold: -10.0,
            take_profit_pct: 10.0,
            stop_loss_pct: -10.0,
            max_hold_minutes: 1.0,
            trade_allocation_pct: 10.0,
            min_trade_native: 0.5,
            max_trade_native: 0.1,
            max_open_positions: 99,
            sell_fraction: 10.0,
            intent_slippage_bps: 10000,
        };
        p.clamp_all();
        assert_eq!(p.buy_momentum_threshold, 0.03);
        assert_eq!(p.sell_momentum_threshold, -0.03);
        assert_eq!(p.take_profit_pct, 0.25);
        assert_eq!(p.stop_loss_pct, -0.25);
        assert_eq!(p.max_hold_minutes, 1440.0);
        assert_eq!(p.trade_allocation_pct, 0.4);
        assert_eq!(p.sell_fraction, 1.0);
        assert_eq!(p.intent_slippage_bps, 500);
        assert_eq!(p.max_open_positions, 10);
        // max_trade raised to match min_trade since mutation left it below.
        assert_eq!(p.max_trade_native, 0.5);
    }
}
