use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// §3/§6 `ExecutionIntent` — a request to execute a trade, written to
/// `<root>/intents/` and claimed by the executor side of the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionIntent {
    #[serde(rename = "type")]
    pub kind: IntentKind,
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub action: Action,
    pub input_mint: String,
    pub output_mint: String,
    pub amount_lamports: String,
    pub slippage_bps: u32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub metadata: Option<BTreeMap<String, Value>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntentKind {
    #[serde(rename = "execution-intent")]
    ExecutionIntent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Buy,
    Sell,
    /// Auxiliary perpetual actions: market/side live in `metadata` (§3).
    PerpOpen,
    PerpClose,
}

/// §3/§6 `ExecutionResult` — the outcome of attempting to execute an
/// intent, written to `<root>/results/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    #[serde(rename = "type")]
    pub kind: ResultKind,
    pub intent_id: String,
    pub created_at: DateTime<Utc>,
    pub status: ResultStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    pub input_amount: String,
    pub output_amount: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultKind {
    #[serde(rename = "execution-result")]
    ExecutionResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Filled,
    Failed,
    Rejected,
    Expired,
}

impl ResultStatus {
    /// The archive-suffix the intent queue uses when moving a claimed
    /// intent file into `_processed/` (§4.6).
    pub fn archive_suffix(&self) -> &'static str {
        match self {
            ResultStatus::Filled => "filled",
            ResultStatus::Failed => "failed",
            ResultStatus::Rejected => "rejected",
            ResultStatus::Expired => "expired",
        }
    }
}

impl ExecutionResult {
    pub fn new(intent_id: impl Into<String>, now: DateTime<Utc>, status: ResultStatus) -> Self {
        Self {
            kind: ResultKind::ExecutionResult,
            intent_id: intent_id.into(),
            created_at: now,
            status,
            tx_hash: None,
            input_amount: "0".to_string(),
            output_amount: "0".to_string(),
            error: None,
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_amounts(mut self, input: impl Into<String>, output: impl Into<String>) -> Self {
        self.input_amount = input.into();
        self.output_amount = output.into();
        self
    }

    pub fn with_tx_hash(mut self, tx_hash: impl Into<String>) -> Self {
        self.tx_hash = Some(tx_hash.into());
        self
    }
}
