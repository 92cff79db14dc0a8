pub mod init;
pub mod macros;
pub mod trace_id;

pub use init::init_tracing;
pub use macros::{child_span, root_span};
pub use trace_id::TraceId;

use std::future::Future;
use std::time::Duration;

/// Runs `fut` and emits a `tracing::warn!` if it takes longer than `max`.
///
/// Used to flag slow collaborator calls (price feed, planner, wallet
/// executor) without turning the timeout into a hard failure — the caller
/// still gets the result, just with a log line for the latency outlier.
pub async fn warn_if_slow<F, T>(label: &'static str, max: Duration, fut: F) -> T
where
    F: Future<Output = T>,
{
    let start = std::time::Instant::now();
    let out = fut.await;
    let elapsed = start.elapsed();
    if elapsed > max {
        tracing::warn!(
            target: "performance",
            label = label,
            elapsed_ms = elapsed.as_millis() as u64,
            budget_ms = max.as_millis() as u64,
            "slow collaborator call"
        );
    }
    out
}
