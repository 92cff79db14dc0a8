use bigamount::BigAmount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A held token position, keyed by `mint` in `AgentState::positions`.
///
/// Invariant P1 (`raw_amount == 0 ⇔ position absent from state`) is
/// enforced by the ledger, not by this type — `Position` itself can be
/// constructed with a zero `raw_amount` only transiently, during a sell,
/// before the ledger removes it from the map.
///
/// Invariant P2: `cost_lamports` is the *total* lamports paid for the
/// currently held `raw_amount`, reduced proportionally on partial sells
/// (weighted-average cost basis, not FIFO lots — see `ledger::apply_sell`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub decimals: u8,
    pub raw_amount: BigAmount,
    pub cost_lamports: BigAmount,
    /// `raw_amount` as of the buy that opened this position. Fixed for the
    /// life of the position; used only to compute `dust_threshold`, since
    /// the 1% convention is relative to the *opening* size, not the
    /// current (already-reduced) size.
    pub opening_raw_amount: BigAmount,
    pub opened_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Position {
    /// 1% of the position's opening raw amount. Remainders at or below
    /// this are swept on sell rather than left as unclosable dust (§9,
    /// "Dust threshold" — this spec uses the 1% convention, not the 0.5%
    /// variant seen in one code path of the original system).
    pub fn dust_threshold(&self) -> BigAmount {
        self.opening_raw_amount
            .mul_frac_ppm(10_000)
            .unwrap_or_else(|_| BigAmount::zero())
    }
}
