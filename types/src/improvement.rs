use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// §3/§6 `ImprovementProposal` — candidate-policy performance deltas
/// measured by a simulated replay against stored price history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImprovementProposal {
    #[serde(rename = "type")]
    pub kind: ProposalKind,
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub candidate_id: String,
    pub metrics: ProposalMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalKind {
    #[serde(rename = "improvement-proposal")]
    ImprovementProposal,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProposalMetrics {
    pub pnl_delta_pct: f64,
    pub sharpe_delta: f64,
    pub max_drawdown_delta_pct: f64,
    pub test_pass_rate: f64,
}

/// The quantitative thresholds a proposal is judged against (§4.9).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GateThresholds {
    pub min_pnl_delta_pct: f64,
    pub min_sharpe_delta: f64,
    pub max_drawdown_delta_pct: f64,
    pub min_test_pass_rate: f64,
}

impl GateThresholds {
    /// Evaluates a proposal's metrics against these thresholds. All four
    /// conditions must hold for acceptance (§4.9).
    pub fn evaluate(&self, metrics: &ProposalMetrics) -> Decision {
        if metrics.sharpe_delta < self.min_sharpe_delta {
            return Decision::Reject(format!(
                "sharpeDelta {:.4} < {:.4}",
                metrics.sharpe_delta, self.min_sharpe_delta
            ));
        }
        if metrics.pnl_delta_pct < self.min_pnl_delta_pct {
            return Decision::Reject(format!(
                "pnlDelta {:.4} < {:.4}",
                metrics.pnl_delta_pct, self.min_pnl_delta_pct
            ));
        }
        if metrics.max_drawdown_delta_pct > self.max_drawdown_delta_pct {
            return Decision::Reject(format!(
                "maxDrawdownDelta {:.4} > {:.4}",
                metrics.max_drawdown_delta_pct, self.max_drawdown_delta_pct
            ));
        }
        if metrics.test_pass_rate < self.min_test_pass_rate {
            return Decision::Reject(format!(
                "testPassRate {:.4} < {:.4}",
                metrics.test_pass_rate, self.min_test_pass_rate
            ));
        }
        Decision::Accept
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Accept,
    Reject(String),
}

/// §3/§6 `ImprovementVerdict`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImprovementVerdict {
    #[serde(rename = "type")]
    pub kind: VerdictKind,
    pub proposal_id: String,
    pub candidate_id: String,
    pub created_at: DateTime<Utc>,
    pub decision: VerdictDecision,
    pub reason: String,
    pub metrics: ProposalMetrics,
    pub gate: GateThresholds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerdictKind {
    #[serde(rename = "improvement-verdict")]
    ImprovementVerdict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerdictDecision {
    Accept,
    Reject,
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scenario F from §8: candidate metrics fail on sharpe_delta alone.
    #[test]
    fn scenario_f_rejects_on_sharpe_delta() {
        let gate = GateThresholds {
            min_pnl_delta_pct: 0.2,
            min_sharpe_delta: 0.05,
            max_drawdown_delta_pct: 2.0,
            min_test_pass_rate: 0.95,
        };
        let metrics = ProposalMetrics {
            pnl_delta_pct: 0.1,
            sharpe_delta: -0.02,
            max_drawdown_delta_pct: 1.0,
            test_pass_rate: 0.99,
        };
        match gate.evaluate(&metrics) {
            Decision::Reject(reason) => assert!(reason.contains("sharpeDelta")),
            Decision::Accept => panic!("expected reject"),
        }
    }

    #[test]
    fn accepts_when_all_thresholds_hold() {
        let gate = GateThresholds {
            min_pnl_delta_pct: 0.0,
            min_sharpe_delta: 0.0,
            max_drawdown_delta_pct: 5.0,
            min_test_pass_rate: 0.5,
        };
        let metrics = ProposalMetrics {
            pnl_delta_pct: 0.05,
            sharpe_delta: 0.1,
            max_drawdown_delta_pct: 1.0,
            test_pass_rate: 0.9,
        };
        assert_eq!(gate.evaluate(&metrics), Decision::Accept);
    }
}
