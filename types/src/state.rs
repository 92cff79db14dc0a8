use std::collections::BTreeMap;

use bigamount::{BigAmount, SignedAmount};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::position::Position;

/// One observed price point, truncated to the newest `history_keep_points`
/// entries per mint (see `AgentState::truncate_history`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub ts: DateTime<Utc>,
    pub price_usd: f64,
}

/// An open perpetual-futures position (§4.4, auxiliary action).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerpPosition {
    pub market: String,
    pub side: PerpSide,
    pub leverage: f64,
    pub collateral_usd: f64,
    pub entry_price_usd: f64,
    pub liquidation_price_usd: f64,
    pub opened_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PerpSide {
    Long,
    Short,
}

impl PerpSide {
    pub fn sign(&self) -> f64 {
        match self {
            PerpSide::Long => 1.0,
            PerpSide::Short => -1.0,
        }
    }
}

/// The full persisted agent state (§3, §6 `state.json`).
///
/// The engine is the sole writer (single-writer, single-reader, §4.3); the
/// cross-process synchronization point is the intent queue, not this
/// struct. `AgentState` round-trips through JSON with bit-exact field
/// names — see `types::state::tests::serde_field_names` below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    pub cycle: u64,
    pub cash_lamports: BigAmount,
    pub initial_cash_lamports: BigAmount,
    pub realized_pnl_lamports: SignedAmount,
    pub positions: BTreeMap<String, Position>,
    pub market_history: BTreeMap<String, Vec<PricePoint>>,
    pub last_intent_at: BTreeMap<String, i64>,
    #[serde(default)]
    pub perp_positions: BTreeMap<String, PerpPosition>,
    #[serde(default)]
    pub perp_balance_usd: f64,
    #[serde(default)]
    pub perp_realized_pnl_usd: f64,
    pub filled_count: u64,
    pub failed_count: u64,
    pub updated_at: DateTime<Utc>,
}

impl AgentState {
    pub fn new(initial_cash_lamports: BigAmount, now: DateTime<Utc>) -> Self {
        Self {
            cycle: 0,
            cash_lamports: initial_cash_lamports.clone(),
            initial_cash_lamports,
            realized_pnl_lamports: SignedAmount::zero(),
            positions: BTreeMap::new(),
            market_history: BTreeMap::new(),
            last_intent_at: BTreeMap::new(),
            perp_positions: BTreeMap::new(),
            perp_balance_usd: 0.0,
            perp_realized_pnl_usd: 0.0,
            filled_count: 0,
            failed_count: 0,
            updated_at: now,
        }
    }

    /// Appends a price observation for `mint` and truncates the series to
    /// the newest `keep` points (§3, `market_history`).
    pub fn push_price(&mut self, mint: &str, point: PricePoint, keep: usize) {
        let series = self.market_history.entry(mint.to_string()).or_default();
        series.push(point);
        if series.len() > keep {
            let overflow = series.len() - keep;
            series.drain(0..overflow);
        }
    }

    /// Time since the key (mint or perp market) last had an intent
    /// emitted for it, in milliseconds. `None` if never.
    pub fn ms_since_last_intent(&self, key: &str, now_ms: i64) -> Option<i64> {
        self.last_intent_at.get(key).map(|&t| now_ms - t)
    }

    pub fn mark_intent(&mut self, key: &str, now_ms: i64) {
        self.last_intent_at.insert(key.to_string(), now_ms);
    }

    /// Sanitizes ranges and canonicalizes big-amount fields. Applied on
    /// both load and save (§4.3). Clamps negative counters to zero and
    /// truncates all price histories to `history_keep_points`.
    pub fn sanitize(&mut self, history_keep_points: usize) {
        for series in self.market_history.values_mut() {
            if series.len() > history_keep_points {
                let overflow = series.len() - history_keep_points;
                series.drain(0..overflow);
            }
        }
        // filled_count/failed_count are u64 and cannot go negative by
        // construction, but corrupt JSON could still carry a parse that
        // produced an out-of-domain value for other fields; amounts
        // re-canonicalize through BigAmount's own parser on deserialize.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_field_names() {
        let now = Utc::now();
        let state = AgentState::new(BigAmount::from_u64(10_000_000_000), now);
        let json = serde_json::to_value(&state).unwrap();
        for field in [
            "cycle",
            "cash_lamports",
            "initial_cash_lamports",
            "realized_pnl_lamports",
            "positions",
            "market_history",
            "last_intent_at",
            "filled_count",
            "failed_count",
            "updated_at",
        ] {
            assert!(json.get(field).is_some(), "missing field {field}");
        }
    }

    #[test]
    fn push_price_truncates_to_keep() {
        let mut state = AgentState::new(BigAmount::zero(), Utc::now());
        for i in 0..10 {
            state.push_price(
                "M1",
                PricePoint {
                    ts: Utc::now(),
                    price_usd: i as f64,
                },
                5,
            );
        }
        assert_eq!(state.market_history["M1"].len(), 5);
        // Oldest points dropped; newest retained.
        assert_eq!(state.market_history["M1"].last().unwrap().price_usd, 9.0);
    }

    #[test]
    fn round_trip_preserves_equality_modulo_updated_at() {
        let mut state = AgentState::new(BigAmount::from_u64(1_000), Utc::now());
        state.cycle = 5;
        let json = serde_json::to_string(&state).unwrap();
        let back: AgentState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, back);
    }
}
