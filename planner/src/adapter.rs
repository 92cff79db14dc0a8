//! Planner Adapter (§4.7, C7): calls a planner backend, then normalizes
//! its output into validated intents against a *simulated* view of cash
//! and open positions so that several intents emitted in the same cycle
//! respect the same caps.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use bigamount::BigAmount;
use chrono::{DateTime, Utc};
use ports::{Planner, PlannerOutput, RawDecision, TokenContext};
use types::{Action, AgentConfig, AgentState, ExecutionIntent, IntentKind, PlannerMode};
use uuid::Uuid;

use crate::context::{self, UniverseEntry};

/// Why a raw decision was dropped during normalization, for logging —
/// never returned as an error, since a dropped decision is an expected
/// outcome, not a failure (§9, "Never trust the planner for size
/// discipline").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    UnresolvedMint,
    UnknownAction,
    MaxIntentsPerCycleReached,
    CooldownActive,
    MaxOpenPositionsReached,
    ZeroAmountAfterClamp,
    BelowMinTradeValue,
}

pub struct PlannerAdapter {
    pub backend: Arc<dyn Planner>,
    pub fallback: Option<Arc<dyn Planner>>,
}

impl PlannerAdapter {
    pub fn new(backend: Arc<dyn Planner>, fallback: Option<Arc<dyn Planner>>) -> Self {
        Self { backend, fallback }
    }

    /// Runs one planning pass: builds `token_context` for every entry in
    /// `universe` plus every currently open position, invokes the
    /// backend (falling back to `fallback` in hybrid mode on error),
    /// then normalizes the result into a validated intent list.
    pub async fn plan(
        &self,
        state: &AgentState,
        config: &AgentConfig,
        universe: &[UniverseEntry],
        prices_usd: &HashMap<String, f64>,
        native_price_usd: f64,
        now: DateTime<Utc>,
        now_ms: i64,
    ) -> Vec<ExecutionIntent> {
        let mut all_entries: Vec<UniverseEntry> = universe.to_vec();
        for mint in state.positions.keys() {
            if !all_entries.iter().any(|e| &e.mint == mint) {
                all_entries.push(UniverseEntry {
                    mint: mint.clone(),
                    symbol: state.positions[mint].symbol.clone(),
                });
            }
        }

        let contexts: Vec<TokenContext> = all_entries
            .iter()
            .map(|entry| {
                let token_price = prices_usd.get(&entry.mint).copied().unwrap_or(0.0);
                context::build(
                    state,
                    entry,
                    native_price_usd,
                    token_price,
                    now,
                    now_ms,
                    config.min_intent_gap_ms,
                )
            })
            .collect();

        let output = self.invoke_backend(&contexts, config).await;
        self.normalize(output, &all_entries, state, prices_usd, config, now, now_ms)
    }

    async fn invoke_backend(&self, contexts: &[TokenContext], config: &AgentConfig) -> PlannerOutput {
        match self.backend.plan(contexts, &[], config.planner_timeout).await {
            Ok(out) => out,
            Err(err) => {
                tracing::warn!(error = %err, "planner backend failed");
                match (config.planner_mode, &self.fallback) {
                    (PlannerMode::Hybrid, Some(fallback)) => fallback
                        .plan(contexts, &[], config.planner_timeout)
                        .await
                        .unwrap_or_default(),
                    _ => PlannerOutput {
                        notes: vec![format!("planner unavailable: {err}")],
                        intents: vec![],
                    },
                }
            }
        }
    }

    fn normalize(
        &self,
        output: PlannerOutput,
        universe: &[UniverseEntry],
        state: &AgentState,
        prices_usd: &HashMap<String, f64>,
        config: &AgentConfig,
        now: DateTime<Utc>,
        now_ms: i64,
    ) -> Vec<ExecutionIntent> {
        let mut simulated_cash = state.cash_lamports.clone();
        let mut simulated_open: HashSet<String> = state.positions.keys().cloned().collect();
        let mut emitted_this_cycle: HashSet<String> = HashSet::new();
        let mut intents = Vec::new();

        for decision in output.intents {
            if intents.len() >= config.max_intents_per_cycle {
                tracing::debug!("max_intents_per_cycle reached, dropping remaining decisions");
                break;
            }

            let Some(mint) = resolve_mint(&decision, universe) else {
                log_skip(&decision, SkipReason::UnresolvedMint);
                continue;
            };

            let Some(action) = parse_action(&decision) else {
                log_skip(&decision, SkipReason::UnknownAction);
                continue;
            };

            if emitted_this_cycle.contains(&mint) {
                log_skip(&decision, SkipReason::CooldownActive);
                continue;
            }
            let cooldown_remaining = state
                .ms_since_last_intent(&mint, now_ms)
                .map(|elapsed| elapsed < config.min_intent_gap_ms)
                .unwrap_or(false);
            if cooldown_remaining {
                log_skip(&decision, SkipReason::CooldownActive);
                continue;
            }

            let intent = match action {
                Action::Buy => {
                    if !simulated_open.contains(&mint)
                        && simulated_open.len() >= config.policy.max_open_positions as usize
                    {
                        log_skip(&decision, SkipReason::MaxOpenPositionsReached);
                        continue;
                    }

                    let amount = resolve_buy_amount(&decision, &config.policy, &simulated_cash);
                    if amount.is_zero() {
                        log_skip(&decision, SkipReason::ZeroAmountAfterClamp);
                        continue;
                    }

                    simulated_cash = simulated_cash.sub_saturating(&amount);
                    simulated_open.insert(mint.clone());

                    build_intent(
                        Action::Buy,
                        "So11111111111111111111111111111111111111112".to_string(),
                        mint.clone(),
                        amount,
                        resolve_slippage(&decision, config),
                        now,
                    )
                }
                Action::Sell => {
                    let Some(position) = state.positions.get(&mint) else {
                        log_skip(&decision, SkipReason::UnresolvedMint);
                        continue;
                    };
                    let token_price = prices_usd.get(&mint).copied().unwrap_or(0.0);
                    let decimals_scale = 10f64.powi(position.decimals as i32);
                    let market_value_usd =
                        (position.raw_amount.as_f64_lossy() / decimals_scale) * token_price;
                    if market_value_usd < config.min_trade_value_usd {
                        log_skip(&decision, SkipReason::BelowMinTradeValue);
                        continue;
                    }

                    let amount = decision
                        .amount_lamports
                        .as_deref()
                        .and_then(|s| BigAmount::from_decimal_string(s).ok())
                        .unwrap_or_else(|| position.raw_amount.clone())
                        .min(position.raw_amount.clone());

                    simulated_open.remove(&mint);
                    build_intent(
                        Action::Sell,
                        mint.clone(),
                        "So11111111111111111111111111111111111111112".to_string(),
                        amount,
                        resolve_slippage(&decision, config),
                        now,
                    )
                }
                Action::PerpOpen | Action::PerpClose => {
                    log_skip(&decision, SkipReason::UnknownAction);
                    continue;
                }
            };

            emitted_this_cycle.insert(mint);
            intents.push(intent);
        }

        intents
    }
}

fn resolve_mint(decision: &RawDecision, universe: &[UniverseEntry]) -> Option<String> {
    if let Some(mint) = &decision.mint {
        return Some(mint.clone());
    }
    let symbol = decision.symbol.as_ref()?;
    universe
        .iter()
        .find(|e| &e.symbol == symbol)
        .map(|e| e.mint.clone())
}

fn parse_action(decision: &RawDecision) -> Option<Action> {
    match decision.action.as_deref()? {
        "buy" => Some(Action::Buy),
        "sell" => Some(Action::Sell),
        _ => None,
    }
}

fn resolve_buy_amount(decision: &RawDecision, policy: &types::Policy, simulated_cash: &BigAmount) -> BigAmount {
    const LAMPORTS_PER_NATIVE: f64 = 1_000_000_000.0;

    let parsed = decision
        .amount_lamports
        .as_deref()
        .and_then(|s| BigAmount::from_decimal_string(s).ok());

    let raw = parsed.unwrap_or_else(|| {
        let default_native = policy.max_trade_native.min(
            simulated_cash.as_f64_lossy() / LAMPORTS_PER_NATIVE,
        );
        BigAmount::from_u64((default_native.max(0.0) * LAMPORTS_PER_NATIVE) as u64)
    });

    let min_lamports = BigAmount::from_u64((policy.min_trade_native * LAMPORTS_PER_NATIVE) as u64);
    let max_lamports = BigAmount::from_u64((policy.max_trade_native * LAMPORTS_PER_NATIVE) as u64);

    let clamped = BigAmount::min(&BigAmount::min(&raw, &max_lamports), simulated_cash);
    if clamped < min_lamports {
        BigAmount::zero()
    } else {
        clamped
    }
}

fn resolve_slippage(decision: &RawDecision, config: &AgentConfig) -> u32 {
    decision
        .slippage_bps
        .map(|bps| bps.clamp(1, config.max_slippage_bps))
        .unwrap_or(config.policy.intent_slippage_bps)
}

fn build_intent(
    action: Action,
    input_mint: String,
    output_mint: String,
    amount: BigAmount,
    slippage_bps: u32,
    now: DateTime<Utc>,
) -> ExecutionIntent {
    ExecutionIntent {
        kind: IntentKind::ExecutionIntent,
        id: Uuid::new_v4().to_string(),
        created_at: now,
        expires_at: None,
        action,
        input_mint,
        output_mint,
        amount_lamports: amount.to_decimal_string(),
        slippage_bps,
        metadata: None,
    }
}

fn log_skip(decision: &RawDecision, reason: SkipReason) {
    tracing::debug!(
        mint = decision.mint.as_deref().unwrap_or(""),
        symbol = decision.symbol.as_deref().unwrap_or(""),
        reason = ?reason,
        "planner decision skipped during normalization"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ports::PlannerOutput;
    use std::time::Duration;
    use types::ErrorKind;

    struct StubPlanner(PlannerOutput);

    #[async_trait]
    impl Planner for StubPlanner {
        async fn plan(
            &self,
            _contexts: &[TokenContext],
            _notes: &[String],
            _deadline: Duration,
        ) -> Result<PlannerOutput, ErrorKind> {
            Ok(self.0.clone())
        }
    }

    struct FailingPlanner;

    #[async_trait]
    impl Planner for FailingPlanner {
        async fn plan(
            &self,
            _contexts: &[TokenContext],
            _notes: &[String],
            _deadline: Duration,
        ) -> Result<PlannerOutput, ErrorKind> {
            Err(ErrorKind::PlannerUnavailable("boom".to_string()))
        }
    }

    fn config() -> AgentConfig {
        AgentConfig::from_env().unwrap()
    }

    fn buy_decision(mint: &str) -> RawDecision {
        RawDecision {
            mint: Some(mint.to_string()),
            symbol: None,
            action: Some("buy".to_string()),
            amount_lamports: Some("500000000".to_string()),
            slippage_bps: Some(75),
            metadata: None,
        }
    }

    #[tokio::test]
    async fn emits_a_validated_buy_intent() {
        let backend = Arc::new(StubPlanner(PlannerOutput {
            notes: vec![],
            intents: vec![buy_decision("M1")],
        }));
        let adapter = PlannerAdapter::new(backend, None);
        let state = AgentState::new(BigAmount::from_u64(10_000_000_000), Utc::now());
        let cfg = config();

        let intents = adapter
            .plan(&state, &cfg, &[], &HashMap::new(), 100.0, Utc::now(), 0)
            .await;

        assert_eq!(intents.len(), 1);
        assert_eq!(intents[0].output_mint, "M1");
        assert_eq!(intents[0].action, Action::Buy);
    }

    #[tokio::test]
    async fn cooldown_suppresses_repeat_intent_for_same_mint() {
        let backend = Arc::new(StubPlanner(PlannerOutput {
            notes: vec![],
            intents: vec![buy_decision("M1")],
        }));
        let adapter = PlannerAdapter::new(backend, None);
        let mut state = AgentState::new(BigAmount::from_u64(10_000_000_000), Utc::now());
        state.mark_intent("M1", 0);
        let mut cfg = config();
        cfg.min_intent_gap_ms = 30_000;

        let intents_early = adapter
            .plan(&state, &cfg, &[], &HashMap::new(), 100.0, Utc::now(), 20_000)
            .await;
        assert!(intents_early.is_empty());

        let intents_late = adapter
            .plan(&state, &cfg, &[], &HashMap::new(), 100.0, Utc::now(), 31_000)
            .await;
        assert_eq!(intents_late.len(), 1);
    }

    #[tokio::test]
    async fn hybrid_mode_falls_back_to_rule_backend_on_error() {
        let backend = Arc::new(FailingPlanner);
        let fallback = Arc::new(StubPlanner(PlannerOutput {
            notes: vec![],
            intents: vec![buy_decision("M1")],
        }));
        let adapter = PlannerAdapter::new(backend, Some(fallback));
        let state = AgentState::new(BigAmount::from_u64(10_000_000_000), Utc::now());
        let mut cfg = config();
        cfg.planner_mode = PlannerMode::Hybrid;

        let intents = adapter
            .plan(&state, &cfg, &[], &HashMap::new(), 100.0, Utc::now(), 0)
            .await;
        assert_eq!(intents.len(), 1);
    }

    #[tokio::test]
    async fn max_open_positions_caps_new_buys_within_one_cycle() {
        let backend = Arc::new(StubPlanner(PlannerOutput {
            notes: vec![],
            intents: vec![buy_decision("M1"), buy_decision("M2")],
        }));
        let adapter = PlannerAdapter::new(backend, None);
        let state = AgentState::new(BigAmount::from_u64(10_000_000_000), Utc::now());
        let mut cfg = config();
        cfg.policy.max_open_positions = 1;

        let intents = adapter
            .plan(&state, &cfg, &[], &HashMap::new(), 100.0, Utc::now(), 0)
            .await;
        assert_eq!(intents.len(), 1);
    }
}
