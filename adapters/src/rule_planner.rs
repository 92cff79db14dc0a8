//! Pure-rule `Planner` backend (§4.7): buys when momentum clears
//! `buy_momentum_threshold`, leaves exits entirely to the Safety Gate's
//! scan. This is also the `hybrid`-mode fallback when the LLM backend
//! times out or errors.

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use ports::{Planner, PlannerOutput, RawDecision, TokenContext};
use types::{ErrorKind, Policy};

/// Reads `policy` fresh on every `plan()` call so an accepted Improvement
/// Gate proposal (which replaces the live policy) takes effect on the
/// very next cycle without recreating this planner.
pub struct RuleBasedPlanner {
    policy: RwLock<Policy>,
}

impl RuleBasedPlanner {
    pub fn new(policy: Policy) -> Self {
        Self {
            policy: RwLock::new(policy),
        }
    }

    pub fn set_policy(&self, policy: Policy) {
        *self.policy.write().unwrap() = policy;
    }
}

#[async_trait]
impl Planner for RuleBasedPlanner {
    async fn plan(
        &self,
        contexts: &[TokenContext],
        _notes: &[String],
        _deadline: Duration,
    ) -> Result<PlannerOutput, ErrorKind> {
        let policy = self.policy.read().unwrap().clone();
        let mut intents = Vec::new();

        for ctx in contexts {
            if ctx.has_open_position || ctx.cooldown_remaining_ms > 0 {
                continue;
            }
            if ctx.momentum_score >= policy.buy_momentum_threshold {
                intents.push(RawDecision {
                    mint: Some(ctx.mint.clone()),
                    symbol: Some(ctx.symbol.clone()),
                    action: Some("buy".to_string()),
                    amount_lamports: None,
                    slippage_bps: Some(policy.intent_slippage_bps),
                    metadata: None,
                });
            }
        }

        Ok(PlannerOutput {
            notes: vec![],
            intents,
        })
    }

    fn update_policy(&self, policy: &Policy) {
        self.set_policy(policy.clone());
    }
}
