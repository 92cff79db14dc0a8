//! Candidate policy mutation (§4.9): `v' = v * (1 + U(-s, +s))` per
//! ranged field, then re-clamped into the field's hard-coded domain.

use rand::Rng;
use types::Policy;

/// Produces a mutated candidate policy from `base`, scaling every ranged
/// field by a fresh `U(-scale, +scale)` draw. `Policy::clamp_all` brings
/// every field back into its valid range afterward, including raising
/// `max_trade_native` back up to `min_trade_native` if the mutation left
/// it inverted.
pub fn mutate_policy(base: &Policy, scale: f64) -> Policy {
    let mut rng = rand::thread_rng();
    let mut draw = || 1.0 + rng.gen_range(-scale..=scale);

    let mut candidate = Policy {
        buy_momentum_threshold: base.buy_momentum_threshold * draw(),
        sell_momentum_threshold: base.sell_momentum_threshold * draw(),
        take_profit_pct: base.take_profit_pct * draw(),
        stop_loss_pct: base.stop_loss_pct * draw(),
        max_hold_minutes: base.max_hold_minutes * draw(),
        trade_allocation_pct: base.trade_allocation_pct * draw(),
        min_trade_native: base.min_trade_native * draw(),
        max_trade_native: base.max_trade_native * draw(),
        max_open_positions: base.max_open_positions,
        sell_fraction: base.sell_fraction * draw(),
        intent_slippage_bps: base.intent_slippage_bps,
    };
    candidate.clamp_all();
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutated_policy_always_respects_clamp_ranges() {
        let base = Policy::default_conservative();
        for _ in 0..50 {
            let candidate = mutate_policy(&base, 0.5);
            let ranges = Policy::clamp_ranges();
            assert!((ranges.buy_momentum_threshold.lo..=ranges.buy_momentum_threshold.hi)
                .contains(&candidate.buy_momentum_threshold));
            assert!(candidate.max_trade_native >= candidate.min_trade_native);
        }
    }

    #[test]
    fn zero_scale_returns_the_base_policy_unchanged() {
        let base = Policy::default_conservative();
        let candidate = mutate_policy(&base, 0.0);
        assert_eq!(candidate, base);
    }
}
