//! Cycle Engine (§4.8, C8): orchestrates one cycle end-to-end —
//! price refresh, Safety Gate exits, the Planner Adapter, sequential
//! intent execution through the Intent Queue, an occasional Improvement
//! Gate pass, and state persistence.
//!
//! Owns the only mutable `AgentState` in the process (single-writer,
//! §4.3) and is driven by `clockrt::run_loop`, which supplies cycle
//! pacing and cancellation; this crate only ever runs one cycle at a
//! time and never checks cancellation itself — the loop lets an
//! in-flight cycle finish through step 7 before stopping (§5).

pub mod counters;

pub use counters::{Counters, CountersSnapshot};

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use ports::{PriceFeed, WalletExecutor};
use tracing::Instrument;
use types::{Action, AgentConfig, AgentState, Policy, PricePoint, ResultStatus, VerdictDecision};

/// Wires every collaborator the Cycle Engine needs: a durable state store,
/// the filesystem intent queue, the live price feed and wallet executor,
/// and the Planner Adapter (already holding its own backend/fallback).
pub struct CycleEngine {
    config: AgentConfig,
    live_policy: RwLock<Policy>,
    state_store: state::StateStore,
    queue: queue::IntentQueue,
    price_feed: Arc<dyn PriceFeed>,
    wallet_executor: Arc<dyn WalletExecutor>,
    planner_adapter: planner::PlannerAdapter,
    state: tokio::sync::Mutex<AgentState>,
    counters: Counters,
}

impl CycleEngine {
    /// Initializes the queue directories and loads (or seeds) `AgentState`
    /// from the configured state path.
    pub async fn new(
        config: AgentConfig,
        state_store: state::StateStore,
        queue: queue::IntentQueue,
        price_feed: Arc<dyn PriceFeed>,
        wallet_executor: Arc<dyn WalletExecutor>,
        planner_adapter: planner::PlannerAdapter,
    ) -> anyhow::Result<Self> {
        queue.init_dirs().await?;
        let state = state_store.load(&config.initial_cash_lamports).await?;
        let live_policy = RwLock::new(config.policy.clone());

        Ok(Self {
            config,
            live_policy,
            state_store,
            queue,
            price_feed,
            wallet_executor,
            planner_adapter,
            state: tokio::sync::Mutex::new(state),
            counters: Counters::default(),
        })
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    /// Runs exactly one cycle, wrapped in a root tracing span so every log
    /// line the cycle produces carries the same trace id.
    pub async fn run_cycle(&self) -> anyhow::Result<()> {
        let trace_id = common::logger::TraceId::generate();
        let span = common::logger::root_span("cycle", &trace_id);
        self.run_cycle_inner().instrument(span).await
    }

    async fn run_cycle_inner(&self) -> anyhow::Result<()> {
        let now = Utc::now();
        let now_ms = now.timestamp_millis();

        let mut state = self.state.lock().await;
        state.cycle += 1;
        self.counters.record_cycle();

        // The effective policy is the live (possibly mutated-and-accepted)
        // policy, not whatever `AgentConfig::from_env` loaded at startup.
        let policy = self.live_policy.read().unwrap().clone();
        let mut effective_config = self.config.clone();
        effective_config.policy = policy.clone();

        let prices_usd = self.fetch_prices(&mut state, now).await;
        let native_price_usd = prices_usd.get(safety::NATIVE_MINT).copied().unwrap_or(0.0);

        let exit_intents = safety::scan_exits(
            &state,
            &prices_usd,
            native_price_usd,
            &policy,
            now,
            now_ms,
            self.config.min_intent_gap_ms,
        );

        let universe: Vec<planner::UniverseEntry> = self
            .config
            .token_universe
            .iter()
            .map(|e| planner::UniverseEntry {
                mint: e.mint.clone(),
                symbol: e.symbol.clone(),
            })
            .collect();
        let planner_intents = self
            .planner_adapter
            .plan(&state, &effective_config, &universe, &prices_usd, native_price_usd, now, now_ms)
            .await;

        let mut all_intents = exit_intents;
        all_intents.extend(planner_intents);

        self.execute_intents(&mut state, &all_intents, &effective_config, now, now_ms).await;
        self.maybe_propose_improvement(&mut state, &policy, now).await;

        self.state_store.save(&mut state).await?;

        let snap = self.counters.snapshot();
        tracing::info!(
            cycle = state.cycle,
            intents_emitted = snap.intents_emitted,
            intents_filled = snap.intents_filled,
            intents_failed = snap.intents_failed,
            intents_rejected = snap.intents_rejected,
            intents_expired = snap.intents_expired,
            "cycle complete"
        );

        Ok(())
    }

    /// §4.8 step 2: prices for SOL plus the configured token universe plus
    /// every currently open position, appended to `market_history`. A
    /// failed fetch is logged and treated as an empty price set — exits
    /// and the planner both already degrade gracefully on missing prices.
    async fn fetch_prices(&self, state: &mut AgentState, now: chrono::DateTime<Utc>) -> HashMap<String, f64> {
        let mut mints = vec![safety::NATIVE_MINT.to_string()];
        for entry in &self.config.token_universe {
            if !mints.contains(&entry.mint) {
                mints.push(entry.mint.clone());
            }
        }
        for mint in state.positions.keys() {
            if !mints.contains(mint) {
                mints.push(mint.clone());
            }
        }

        let prices = common::logger::warn_if_slow(
            "price_feed",
            self.config.price_feed_timeout,
            self.price_feed.get_prices_usd(&mints, self.config.price_feed_timeout),
        )
        .await;

        match prices {
            Ok(prices) => {
                for (mint, price) in &prices {
                    state.push_price(mint, PricePoint { ts: now, price_usd: *price }, self.config.history_keep_points);
                }
                prices
            }
            Err(err) => {
                tracing::warn!(error = %err, "price feed unavailable this cycle, continuing with no fresh prices");
                HashMap::new()
            }
        }
    }

    /// §4.8 step 5: publishes every generated intent into the queue,
    /// claims up to `max_per_cycle`, then validates/executes/applies/
    /// archives them one at a time — the queue claim/archive cycle is
    /// exercised by the engine's own intents as well as any an external
    /// producer drops into `intents/` directly (§4.6, "the lab").
    async fn execute_intents(
        &self,
        state: &mut AgentState,
        intents: &[types::ExecutionIntent],
        effective_config: &AgentConfig,
        now: chrono::DateTime<Utc>,
        now_ms: i64,
    ) {
        for intent in intents {
            if let Err(err) = self.queue.publish_intent(intent).await {
                tracing::warn!(error = %err, intent_id = %intent.id, "failed to publish intent to queue");
            }
        }

        let claimed = match self.queue.claim_batch(self.config.max_per_cycle).await {
            Ok(claimed) => claimed,
            Err(err) => {
                tracing::warn!(error = %err, "failed to claim intents from queue this cycle");
                Vec::new()
            }
        };

        for claimed_intent in &claimed {
            let intent = &claimed_intent.intent;
            let outcome = safety::validate(intent, effective_config, now);
            let result = match outcome {
                safety::ValidationOutcome::Valid => {
                    common::logger::warn_if_slow(
                        "wallet_executor",
                        self.config.wallet_executor_timeout,
                        self.wallet_executor.execute(intent, self.config.wallet_executor_timeout),
                    )
                    .await
                }
                non_valid => safety::to_execution_result(intent, non_valid, now)
                    .expect("a non-Valid outcome always yields an ExecutionResult"),
            };

            if let Err(err) = self.queue.publish_result(&result).await {
                tracing::warn!(error = %err, intent_id = %intent.id, "failed to publish execution result");
            }
            self.counters.record_intent_outcome(result.status);

            if let Err(err) = ledger::apply_result(state, intent, &result, now) {
                tracing::warn!(error = %err, intent_id = %intent.id, "failed to apply execution result to ledger");
            }

            if matches!(result.status, ResultStatus::Filled | ResultStatus::Failed) {
                let key = match intent.action {
                    Action::Buy => &intent.output_mint,
                    _ => &intent.input_mint,
                };
                state.mark_intent(key, now_ms);
            }

            if let Err(err) = self.queue.archive(claimed_intent, result.status.archive_suffix()).await {
                tracing::warn!(error = %err, intent_id = %intent.id, "failed to archive processed intent");
            }
        }
    }

    /// §4.8 step 6 / §4.9: proposes and judges a candidate policy every
    /// `proposal_every_cycles` cycles once enough trades have closed to
    /// make the replay meaningful, adopting it immediately on accept.
    ///
    /// `filled_count` stands in for "closed trades" here — the state
    /// schema has no separate counter for fully-closed round trips, and a
    /// filled buy or sell is the closest proxy available without adding
    /// one.
    async fn maybe_propose_improvement(&self, state: &mut AgentState, policy: &Policy, now: chrono::DateTime<Utc>) {
        if self.config.proposal_every_cycles == 0
            || state.cycle % self.config.proposal_every_cycles != 0
            || state.filled_count < self.config.minimum_closed_trades_for_proposal
        {
            return;
        }

        let proposal = improve::propose(&state.market_history, policy, &self.config.gate, now);
        let verdict = improve::judge(&proposal, &self.config.gate, now);
        self.counters.record_proposal();

        tracing::info!(
            proposal_id = %proposal.id,
            decision = ?verdict.decision,
            reason = %verdict.reason,
            "improvement proposal judged"
        );

        if let Err(err) = self.queue.publish_proposal(&proposal).await {
            tracing::warn!(error = %err, proposal_id = %proposal.id, "failed to publish improvement proposal");
        }
        if let Err(err) = self.queue.publish_verdict(&verdict).await {
            tracing::warn!(error = %err, proposal_id = %proposal.id, "failed to publish improvement verdict");
        }

        if verdict.decision != VerdictDecision::Accept {
            return;
        }
        let Some(candidate) = improve::extract_candidate_policy(&proposal) else {
            tracing::error!(proposal_id = %proposal.id, "accepted verdict but proposal carried no recoverable policy");
            return;
        };

        *self.live_policy.write().unwrap() = candidate.clone();
        self.planner_adapter.backend.update_policy(&candidate);
        if let Some(fallback) = &self.planner_adapter.fallback {
            fallback.update_policy(&candidate);
        }
    }
}
