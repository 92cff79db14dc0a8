//! Safety Gate (§4.5, C5): validates intents before they reach the
//! executor and emits stop-loss/take-profit/timeout/momentum-reversal
//! exits by scanning open positions every cycle.

mod base58;
mod validate;

pub use base58::looks_like_base58_mint;
pub use validate::{to_execution_result, validate, RejectReason, ValidationOutcome};

use bigamount::BigAmount;
use chrono::{DateTime, Utc};
use planner::momentum;
use types::{Action, AgentState, ExecutionIntent, IntentKind, Policy};
use uuid::Uuid;

/// Wrapped-SOL mint address, the native leg of every buy/sell intent.
pub const NATIVE_MINT: &str = "So11111111111111111111111111111111111111112";
/// When `sell_fraction >= 0.999`, sell this much instead of 100% to leave
/// routing dust and avoid route-simulation failures (§4.5b, §9).
const FULL_SELL_PPM: u64 = 995_000;

/// Scans `state`'s open positions and emits a sell intent for any
/// position whose stop-loss, take-profit, max-hold, or momentum-reversal
/// condition has tripped (§4.5b). Respects the shared per-key cooldown.
/// Exit intents bypass the planner entirely.
pub fn scan_exits(
    state: &AgentState,
    prices_usd: &std::collections::HashMap<String, f64>,
    native_price_usd: f64,
    policy: &Policy,
    now: DateTime<Utc>,
    now_ms: i64,
    min_intent_gap_ms: i64,
) -> Vec<ExecutionIntent> {
    if native_price_usd <= 0.0 {
        tracing::warn!("native price unavailable, skipping exit scan this cycle");
        return Vec::new();
    }

    let mut intents = Vec::new();

    for (mint, position) in &state.positions {
        if let Some(elapsed) = state.ms_since_last_intent(mint, now_ms) {
            if elapsed < min_intent_gap_ms {
                continue;
            }
        }

        let token_price = prices_usd.get(mint).copied().unwrap_or(0.0);
        if token_price <= 0.0 {
            continue;
        }

        let cost_basis_usd = (position.cost_lamports.as_f64_lossy() / 1e9) * native_price_usd;
        if cost_basis_usd <= 0.0 {
            continue;
        }
        let decimals_scale = 10f64.powi(position.decimals as i32);
        let market_value_usd = (position.raw_amount.as_f64_lossy() / decimals_scale) * token_price;
        let pnl_pct = market_value_usd / cost_basis_usd - 1.0;
        let hold_minutes = (now - position.opened_at).num_milliseconds() as f64 / 60_000.0;

        let history = state
            .market_history
            .get(mint)
            .map(|h| h.as_slice())
            .unwrap_or(&[]);
        let score = momentum::score(history, now);

        let should_exit = pnl_pct <= policy.stop_loss_pct
            || pnl_pct >= policy.take_profit_pct
            || hold_minutes >= policy.max_hold_minutes
            || score <= policy.sell_momentum_threshold;

        if !should_exit {
            continue;
        }

        let ppm = if policy.sell_fraction >= 0.999 {
            FULL_SELL_PPM
        } else {
            (policy.sell_fraction * 1_000_000.0) as u64
        };
        let sell_amount = position.raw_amount.mul_frac_ppm(ppm).unwrap_or_else(|_| BigAmount::zero());
        if sell_amount.is_zero() {
            continue;
        }

        intents.push(ExecutionIntent {
            kind: IntentKind::ExecutionIntent,
            id: Uuid::new_v4().to_string(),
            created_at: now,
            expires_at: None,
            action: Action::Sell,
            input_mint: mint.clone(),
            output_mint: NATIVE_MINT.to_string(),
            amount_lamports: sell_amount.to_decimal_string(),
            slippage_bps: policy.intent_slippage_bps,
            metadata: None,
        });
    }

    intents
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::PricePoint;

    fn make_policy() -> Policy {
        let mut p = Policy::default_conservative();
        p.stop_loss_pct = -0.05;
        p.take_profit_pct = 0.08;
        p.max_hold_minutes = 240.0;
        p.sell_momentum_threshold = -0.5; // effectively disabled for this test
        p.sell_fraction = 1.0;
        p
    }

    fn state_with_position(raw: u64, cost: u64, opened_minutes_ago: i64) -> AgentState {
        let mut state = AgentState::new(BigAmount::from_u64(10_000_000_000), Utc::now());
        let now = Utc::now();
        state.positions.insert(
            "M1".to_string(),
            types::Position {
                symbol: "MOCK".to_string(),
                decimals: 6,
                raw_amount: BigAmount::from_u64(raw),
                cost_lamports: BigAmount::from_u64(cost),
                opening_raw_amount: BigAmount::from_u64(raw),
                opened_at: now - chrono::Duration::minutes(opened_minutes_ago),
                updated_at: now,
            },
        );
        state.push_price(
            "M1",
            PricePoint {
                ts: now,
                price_usd: 1.0,
            },
            100,
        );
        state
    }

    #[test]
    fn stop_loss_triggers_sell_at_995_ppm_for_full_fraction() {
        let state = state_with_position(1_000_000, 10_000_000_000, 5);
        let mut prices = std::collections::HashMap::new();
        // cost_basis_usd = (10e9/1e9)*100 = 1000; market_value = (1e6/1e6)*0.5 = 0.5
        // pnl_pct = 0.5/1000 - 1 ≈ -1.0, well below stop_loss_pct
        prices.insert("M1".to_string(), 0.5);
        let policy = make_policy();

        let intents = scan_exits(&state, &prices, 100.0, &policy, Utc::now(), 10_000_000, 30_000);
        assert_eq!(intents.len(), 1);
        assert_eq!(intents[0].action, Action::Sell);
        assert_eq!(intents[0].amount_lamports, "995000");
    }

    #[test]
    fn no_exit_when_within_bounds() {
        let state = state_with_position(1_000_000, 1_000_000_000, 5);
        let mut prices = std::collections::HashMap::new();
        // cost_basis = 1.0 * 100 = 100; market_value = 1.0 * 100 = 100 -> pnl_pct = 0
        prices.insert("M1".to_string(), 100.0);
        let policy = make_policy();

        let intents = scan_exits(&state, &prices, 100.0, &policy, Utc::now(), 10_000_000, 30_000);
        assert!(intents.is_empty());
    }

    #[test]
    fn cooldown_suppresses_repeat_exit() {
        let mut state = state_with_position(1_000_000, 10_000_000_000, 5);
        state.mark_intent("M1", 10_000_000 - 1_000);
        let mut prices = std::collections::HashMap::new();
        prices.insert("M1".to_string(), 0.5);
        let policy = make_policy();

        let intents = scan_exits(&state, &prices, 100.0, &policy, Utc::now(), 10_000_000, 30_000);
        assert!(intents.is_empty());
    }

    #[test]
    fn missing_native_price_skips_scan() {
        let state = state_with_position(1_000_000, 10_000_000_000, 5);
        let prices = std::collections::HashMap::new();
        let policy = make_policy();
        let intents = scan_exits(&state, &prices, 0.0, &policy, Utc::now(), 10_000_000, 30_000);
        assert!(intents.is_empty());
    }
}
