//! Builds `ports::TokenContext` for one candidate mint (§4.7, step 1).

use chrono::{DateTime, Utc};
use ports::TokenContext;
use types::AgentState;

use crate::momentum;

/// One entry of the configured token universe the planner is allowed to
/// consider buying into, distinct from the agent's currently open
/// positions (which are always included regardless of universe).
#[derive(Debug, Clone)]
pub struct UniverseEntry {
    pub mint: String,
    pub symbol: String,
}

/// Builds the `token_context` the planner backend sees for `entry`,
/// reading `state` but never mutating it.
pub fn build(
    state: &AgentState,
    entry: &UniverseEntry,
    native_price_usd: f64,
    token_price_usd: f64,
    now: DateTime<Utc>,
    now_ms: i64,
    min_intent_gap_ms: i64,
) -> TokenContext {
    let history = state
        .market_history
        .get(&entry.mint)
        .map(|h| h.as_slice())
        .unwrap_or(&[]);
    let momentum_score = momentum::score(history, now);
    let price_history_usd = history.iter().map(|p| p.price_usd).collect();

    let position = state.positions.get(&entry.mint);
    let (pnl_pct, hold_minutes) = match position {
        Some(pos) if native_price_usd > 0.0 => {
            let cost_basis_usd = (pos.cost_lamports.as_f64_lossy() / 1e9) * native_price_usd;
            let decimals_scale = 10f64.powi(pos.decimals as i32);
            let market_value_usd = (pos.raw_amount.as_f64_lossy() / decimals_scale) * token_price_usd;
            let pnl_pct = if cost_basis_usd > 0.0 {
                Some(market_value_usd / cost_basis_usd - 1.0)
            } else {
                None
            };
            let hold_minutes = (now - pos.opened_at).num_milliseconds() as f64 / 60_000.0;
            (pnl_pct, Some(hold_minutes))
        }
        _ => (None, None),
    };

    let cooldown_remaining_ms = state
        .ms_since_last_intent(&entry.mint, now_ms)
        .map(|elapsed| (min_intent_gap_ms - elapsed).max(0))
        .unwrap_or(0);

    TokenContext {
        mint: entry.mint.clone(),
        symbol: entry.symbol.clone(),
        price_history_usd,
        momentum_score,
        has_open_position: position.is_some(),
        position_raw_amount: position
            .map(|p| p.raw_amount.to_decimal_string())
            .unwrap_or_else(|| "0".to_string()),
        cooldown_remaining_ms,
        pnl_pct,
        hold_minutes,
    }
}
