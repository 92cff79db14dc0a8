use thiserror::Error;

/// Contract-level error kinds shared across the engine (§7).
///
/// These are not always surfaced as Rust `Error` trait objects directly —
/// several (e.g. `IntentExpired`) are deliberately ordinary values the
/// Safety Gate and Cycle Engine branch on to pick an `ExecutionResult`
/// status, mirroring how `executor::types::ExecutionOutcome` and
/// `ExecutionError` sit side by side in the teacher repo.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid intent: {0}")]
    InvalidIntent(String),

    #[error("intent expired")]
    IntentExpired,

    #[error("executor transport error: {0}")]
    ExecutorTransport(String),

    #[error("executor rejected: {0}")]
    ExecutorRejected(String),

    #[error("planner unavailable: {0}")]
    PlannerUnavailable(String),

    #[error("queue file corrupt: {0}")]
    QueueCorrupt(String),

    #[error("state file corrupt: {0}")]
    StateCorrupt(String),

    #[error("price feed unavailable: {0}")]
    PriceFeedUnavailable(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid execution result: {0}")]
    InvalidResult(String),
}
