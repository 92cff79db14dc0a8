//! Improvement Gate (§4.9, C9): mutates the live policy into a
//! candidate, replays both against stored price history, and produces
//! an `ImprovementProposal` the Verdict Judge accepts or rejects.
//!
//! The replay treats each mint's `market_history` as an independent
//! single-position backtest (Open Question, resolved in `DESIGN.md`:
//! the portfolio can hold several positions at once, but the gate only
//! needs a relative comparison between P₀ and P′, so replaying per-mint
//! and averaging is sufficient and keeps the simulation from needing a
//! second, parallel ledger).

mod mutate;
mod replay;

pub use mutate::mutate_policy;
pub use replay::{simulate, ReplayResult};

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use types::improvement::{ProposalKind, VerdictKind};
use types::{
    Decision, GateConfig, GateThresholds, ImprovementProposal, ImprovementVerdict, Policy,
    PricePoint, ProposalMetrics, VerdictDecision,
};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default)]
struct AggregateReplay {
    mean_return_pct: f64,
    sharpe: f64,
    max_drawdown_pct: f64,
    win_rate: f64,
}

/// Replays `policy` against every mint's history independently and
/// averages the results. Mints with fewer than two price points
/// contribute nothing (too thin to simulate).
fn aggregate_replay(market_history: &BTreeMap<String, Vec<PricePoint>>, policy: &Policy) -> AggregateReplay {
    let mut totals = AggregateReplay::default();
    let mut count = 0u32;

    for history in market_history.values() {
        if history.len() < 2 {
            continue;
        }
        let result = replay::simulate(history, policy);
        let compounded = result
            .trade_returns
            .iter()
            .fold(1.0, |equity, r| equity * (1.0 + r))
            * (1.0 + result.final_return_pct)
            - 1.0;

        totals.mean_return_pct += compounded;
        totals.sharpe += result.sharpe;
        totals.max_drawdown_pct += result.max_drawdown_pct;
        totals.win_rate += result.win_rate;
        count += 1;
    }

    if count == 0 {
        return AggregateReplay::default();
    }
    let n = count as f64;
    AggregateReplay {
        mean_return_pct: totals.mean_return_pct / n,
        sharpe: totals.sharpe / n,
        max_drawdown_pct: totals.max_drawdown_pct / n,
        win_rate: totals.win_rate / n,
    }
}

pub fn to_thresholds(gate: &GateConfig) -> GateThresholds {
    GateThresholds {
        min_pnl_delta_pct: gate.min_pnl_delta_pct,
        min_sharpe_delta: gate.min_sharpe_delta,
        max_drawdown_delta_pct: gate.max_drawdown_delta_pct,
        min_test_pass_rate: gate.min_test_pass_rate,
    }
}

/// Produces a candidate policy and an `ImprovementProposal` scoring it
/// against the live policy on the stored histories. The candidate policy
/// itself travels in `artifacts` so an accepted verdict can recover it
/// without re-running the mutation (mutation is random; re-deriving it
/// would not reproduce the policy that was actually judged).
pub fn propose(
    market_history: &BTreeMap<String, Vec<PricePoint>>,
    base_policy: &Policy,
    gate: &GateConfig,
    now: DateTime<Utc>,
) -> ImprovementProposal {
    let candidate_policy = mutate::mutate_policy(base_policy, gate.mutation_scale);
    let baseline = aggregate_replay(market_history, base_policy);
    let candidate = aggregate_replay(market_history, &candidate_policy);

    let metrics = ProposalMetrics {
        pnl_delta_pct: candidate.mean_return_pct - baseline.mean_return_pct,
        sharpe_delta: candidate.sharpe - baseline.sharpe,
        max_drawdown_delta_pct: candidate.max_drawdown_pct - baseline.max_drawdown_pct,
        test_pass_rate: candidate.win_rate,
    };

    tracing::debug!(
        pnl_delta_pct = metrics.pnl_delta_pct,
        sharpe_delta = metrics.sharpe_delta,
        max_drawdown_delta_pct = metrics.max_drawdown_delta_pct,
        "improvement candidate scored"
    );

    ImprovementProposal {
        kind: ProposalKind::ImprovementProposal,
        id: Uuid::new_v4().to_string(),
        created_at: now,
        candidate_id: Uuid::new_v4().to_string(),
        metrics,
        artifacts: Some(serde_json::json!({ "policy": candidate_policy })),
        notes: None,
    }
}

/// Recovers the candidate policy a proposal carries in `artifacts`, for
/// an engine that has observed an `accept` verdict and needs to apply it.
pub fn extract_candidate_policy(proposal: &ImprovementProposal) -> Option<Policy> {
    proposal
        .artifacts
        .as_ref()?
        .get("policy")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}

/// The Verdict Judge (§4.9): accepts iff all four gate thresholds hold.
pub fn judge(proposal: &ImprovementProposal, gate: &GateConfig, now: DateTime<Utc>) -> ImprovementVerdict {
    let thresholds = to_thresholds(gate);
    let (decision, reason) = match thresholds.evaluate(&proposal.metrics) {
        Decision::Accept => (VerdictDecision::Accept, "all gate thresholds satisfied".to_string()),
        Decision::Reject(reason) => (VerdictDecision::Reject, reason),
    };

    ImprovementVerdict {
        kind: VerdictKind::ImprovementVerdict,
        proposal_id: proposal.id.clone(),
        candidate_id: proposal.candidate_id.clone(),
        created_at: now,
        decision,
        reason,
        metrics: proposal.metrics,
        gate: thresholds,
    }
}
