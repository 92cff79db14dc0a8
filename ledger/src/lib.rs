//! Portfolio ledger (§4.4, C4): applies fill/fail outcomes to positions
//! and cash using weighted-average cost basis.
//!
//! Every operation here is a pure function over `&mut AgentState` — no
//! I/O, no clock, no queue — mirroring how `executor::types` keeps its
//! `ExecutionOutcome` dispatch free of transport concerns and leaves
//! those to the trait boundary instead.

use bigamount::BigAmount;
use chrono::{DateTime, Utc};
use types::{Action, AgentState, ErrorKind, ExecutionIntent, ExecutionResult, PerpPosition, PerpSide, Position, ResultStatus};

/// Applies one `(intent, result)` pair to `state` (§4.4 `apply_result`).
///
/// On any status other than `filled`, only the counters move. On
/// `filled`, dispatches to `apply_buy`/`apply_sell`/perp variants by
/// `intent.action`.
pub fn apply_result(
    state: &mut AgentState,
    intent: &ExecutionIntent,
    result: &ExecutionResult,
    now: DateTime<Utc>,
) -> Result<(), ErrorKind> {
    if result.status != ResultStatus::Filled {
        state.failed_count += 1;
        return Ok(());
    }

    state.filled_count += 1;
    match intent.action {
        Action::Buy => apply_buy(state, intent, result, now),
        Action::Sell => apply_sell(state, intent, result, now),
        Action::PerpOpen | Action::PerpClose => {
            // Perp intents carry their own market/side/leverage in
            // metadata and are applied by the engine calling
            // apply_perp_open/apply_perp_close directly, since those
            // need parameters (fee rates) that don't fit the
            // ExecutionIntent/ExecutionResult shape. apply_result only
            // advances the fill counter for them.
            Ok(())
        }
    }
}

/// §4.4 `apply_buy`. Fails with `InvalidResult` if either reported
/// amount is zero. Merges into an existing position (summing
/// `raw_amount`/`cost_lamports`) or opens a new one. Cash is debited by
/// `input_amount` with saturating subtraction — it never goes negative,
/// even if the executor reports spending more than the agent holds.
pub fn apply_buy(
    state: &mut AgentState,
    intent: &ExecutionIntent,
    result: &ExecutionResult,
    now: DateTime<Utc>,
) -> Result<(), ErrorKind> {
    let spent = BigAmount::from_decimal_string(&result.input_amount)
        .map_err(|e| ErrorKind::InvalidResult(e.to_string()))?;
    let received = BigAmount::from_decimal_string(&result.output_amount)
        .map_err(|e| ErrorKind::InvalidResult(e.to_string()))?;

    if spent.is_zero() || received.is_zero() {
        return Err(ErrorKind::InvalidResult(
            "buy fill reported a zero amount".to_string(),
        ));
    }

    let before = state.cash_lamports.clone();
    if before < spent {
        tracing::warn!(
            mint = %intent.output_mint,
            spent = %spent.to_decimal_string(),
            held = %before.to_decimal_string(),
            "executor reported spending more than held cash; cash floored at zero"
        );
    }
    state.cash_lamports = state.cash_lamports.sub_saturating(&spent);

    let mint = intent.output_mint.clone();
    match state.positions.get_mut(&mint) {
        Some(position) => {
            position.raw_amount = position.raw_amount.add(&received);
            position.cost_lamports = position.cost_lamports.add(&spent);
            position.updated_at = now;
        }
        None => {
            state.positions.insert(
                mint,
                Position {
                    symbol: symbol_from_metadata(intent),
                    decimals: decimals_from_metadata(intent),
                    raw_amount: received.clone(),
                    cost_lamports: spent,
                    opening_raw_amount: received,
                    opened_at: now,
                    updated_at: now,
                },
            );
        }
    }

    Ok(())
}

/// §4.4 `apply_sell`. Locates the position by `intent.input_mint`; if
/// none exists, the proceeds are credited to cash and a "phantom sell"
/// is logged (should be rare — indicates the executor filled a sell for
/// a position the ledger had already closed or never opened). Otherwise
/// allocates cost proportionally, realizes PnL, and sweeps dust.
pub fn apply_sell(
    state: &mut AgentState,
    intent: &ExecutionIntent,
    result: &ExecutionResult,
    now: DateTime<Utc>,
) -> Result<(), ErrorKind> {
    let requested = BigAmount::from_decimal_string(&result.input_amount)
        .map_err(|e| ErrorKind::InvalidResult(e.to_string()))?;
    let proceeds = BigAmount::from_decimal_string(&result.output_amount)
        .map_err(|e| ErrorKind::InvalidResult(e.to_string()))?;

    if requested.is_zero() || proceeds.is_zero() {
        return Err(ErrorKind::InvalidResult(
            "sell fill reported a zero amount".to_string(),
        ));
    }

    let mint = intent.input_mint.clone();
    let Some(position) = state.positions.get_mut(&mint) else {
        tracing::warn!(
            mint = %mint,
            proceeds = %proceeds.to_decimal_string(),
            "phantom sell: no open position for filled sell, crediting cash only"
        );
        state.cash_lamports = state.cash_lamports.add(&proceeds);
        return Ok(());
    };

    let sold = BigAmount::min(&requested, &position.raw_amount);
    let allocated_cost = position.cost_lamports.mul_div(&sold, &position.raw_amount);

    let pnl_positive = proceeds >= allocated_cost;
    let pnl_delta = if pnl_positive {
        proceeds.sub_saturating(&allocated_cost)
    } else {
        allocated_cost.sub_saturating(&proceeds)
    };
    state.realized_pnl_lamports = state
        .realized_pnl_lamports
        .add_signed(&pnl_delta, pnl_positive);

    state.cash_lamports = state.cash_lamports.add(&proceeds);
    position.raw_amount = position.raw_amount.sub_saturating(&sold);
    position.cost_lamports = position.cost_lamports.sub_saturating(&allocated_cost);
    position.updated_at = now;

    if position.raw_amount <= position.dust_threshold() {
        state.positions.remove(&mint);
    }

    Ok(())
}

/// Auxiliary perpetual open (§4.4). Deducts `collateral_usd +
/// collateral_usd * leverage * fee_rate` from `state.perp_balance_usd`
/// and computes the liquidation price `entry * (1 ∓ 1/leverage)`
/// (`-` for long, `+` for short).
pub fn apply_perp_open(
    state: &mut AgentState,
    market: impl Into<String>,
    side: PerpSide,
    leverage: f64,
    collateral_usd: f64,
    entry_price_usd: f64,
    fee_rate: f64,
    now: DateTime<Utc>,
) {
    let open_fee = collateral_usd * leverage * fee_rate;
    state.perp_balance_usd -= collateral_usd + open_fee;

    let liquidation_price_usd = match side {
        PerpSide::Long => entry_price_usd * (1.0 - 1.0 / leverage),
        PerpSide::Short => entry_price_usd * (1.0 + 1.0 / leverage),
    };

    let market = market.into();
    state.perp_positions.insert(
        market.clone(),
        PerpPosition {
            market,
            side,
            leverage,
            collateral_usd,
            entry_price_usd,
            liquidation_price_usd,
            opened_at: now,
        },
    );
}

/// Auxiliary perpetual close (§4.4). Realizes `size * price_change *
/// sign(side) - borrow_fee - close_fee` into `perp_realized_pnl_usd`,
/// where `size = collateral_usd * leverage`.
pub fn apply_perp_close(
    state: &mut AgentState,
    market: &str,
    close_price_usd: f64,
    borrow_fee_usd: f64,
    close_fee_usd: f64,
) -> Option<f64> {
    let position = state.perp_positions.remove(market)?;
    let size = position.collateral_usd * position.leverage;
    let price_change = close_price_usd - position.entry_price_usd;
    let pnl = size * price_change * position.side.sign() / position.entry_price_usd
        - borrow_fee_usd
        - close_fee_usd;

    state.perp_balance_usd += position.collateral_usd + pnl;
    state.perp_realized_pnl_usd += pnl;
    Some(pnl)
}

fn symbol_from_metadata(intent: &ExecutionIntent) -> String {
    intent
        .metadata
        .as_ref()
        .and_then(|m| m.get("symbol"))
        .and_then(|v| v.as_str())
        .unwrap_or(&intent.output_mint)
        .to_string()
}

fn decimals_from_metadata(intent: &ExecutionIntent) -> u8 {
    intent
        .metadata
        .as_ref()
        .and_then(|m| m.get("decimals"))
        .and_then(|v| v.as_u64())
        .map(|d| d as u8)
        .unwrap_or(9)
}
