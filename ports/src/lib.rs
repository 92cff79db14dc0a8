//! Collaborator trait interfaces (§1, §5, §6).
//!
//! The core consumes four capabilities through these traits —
//! `PriceFeed`, `WalletExecutor`, `Planner`, `Clock` — and treats their
//! concrete implementations (Jupiter HTTP client, wallet signer subprocess,
//! LLM transport, OS clock) as black boxes, the same way
//! `executor/src/types.rs` in the teacher repo hosts `MarketReader`,
//! `SwapBuilder`, `TonClient`, and `Notifier` as small `async_trait`
//! abstractions the concrete `executor` crate is generic over.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use types::{ErrorKind, ExecutionIntent, ExecutionResult, Policy};

/// Fetches current USD prices for a set of mints (§6, "Price feed").
#[async_trait]
pub trait PriceFeed: Send + Sync {
    async fn get_prices_usd(
        &self,
        mints: &[String],
        deadline: Duration,
    ) -> Result<HashMap<String, f64>, ErrorKind>;
}

/// Executes a validated intent against the wallet/signer backend (§6,
/// "Wallet executor RPC"). Transport and counterparty failures are caught
/// by the implementation and surfaced as a `failed` `ExecutionResult`
/// (§7) rather than an `Err` — only a logic error in the adapter itself
/// should ever panic or bubble as `anyhow::Error` above this trait.
#[async_trait]
pub trait WalletExecutor: Send + Sync {
    async fn execute(&self, intent: &ExecutionIntent, deadline: Duration) -> ExecutionResult;
}

/// Per-candidate-mint context assembled by the Planner Adapter and handed
/// to whichever backend (rule-based or LLM) is in use (§4.7, step 1).
#[derive(Debug, Clone, serde::Serialize)]
pub struct TokenContext {
    pub mint: String,
    pub symbol: String,
    pub price_history_usd: Vec<f64>,
    pub momentum_score: f64,
    pub has_open_position: bool,
    pub position_raw_amount: String,
    pub cooldown_remaining_ms: i64,
    pub pnl_pct: Option<f64>,
    pub hold_minutes: Option<f64>,
}

/// The canonical planner decision shape (§4.7): every field optional,
/// unknown fields ignored, sizes always re-clamped by the adapter.
#[derive(Debug, Clone, Default, serde::Deserialize, serde::Serialize)]
pub struct RawDecision {
    #[serde(default)]
    pub mint: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub amount_lamports: Option<String>,
    #[serde(default)]
    pub slippage_bps: Option<u32>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// The canonical planner output shape (§4.7): `{notes, intents}`.
#[derive(Debug, Clone, Default, serde::Deserialize, serde::Serialize)]
pub struct PlannerOutput {
    #[serde(default)]
    pub notes: Vec<String>,
    #[serde(default)]
    pub intents: Vec<RawDecision>,
}

/// A pluggable planner backend: the pure-rule backend or an LLM transport
/// (HTTP chat-completions or subprocess), both normalized to the same
/// `PlannerOutput` shape by the adapter that calls them (§4.7).
#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(
        &self,
        contexts: &[TokenContext],
        notes: &[String],
        deadline: Duration,
    ) -> Result<PlannerOutput, ErrorKind>;

    /// Pushes a new live policy into the backend, e.g. after an accepted
    /// Improvement Gate verdict (§4.9). A no-op for backends that have no
    /// internal policy state (the LLM transports read thresholds out of
    /// the prompt/context each call instead).
    fn update_policy(&self, _policy: &Policy) {}
}

/// Wall-clock and cancellable-sleep capability (§4.2).
///
/// `now_ms` must be monotonically non-decreasing *within a process* — if
/// the OS clock regresses, implementations clamp to the last observed
/// value rather than let `now_ms` go backwards.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Cooperative cancellation signal shared between the scheduler loop and
/// whatever drives process shutdown (SIGINT/SIGTERM, §6).
#[async_trait]
pub trait CancelSignal: Send + Sync {
    /// Resolves once cancellation has been requested.
    async fn cancelled(&self);
    fn is_cancelled(&self) -> bool;
}
