use std::time::Duration;

use bigamount::BigAmount;

use crate::Policy;

/// One configured candidate mint the Planner Adapter may consider buying
/// into, distinct from the agent's currently open positions (which the
/// engine always includes regardless of this list) (§4.7, "token universe").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenUniverseEntry {
    pub mint: String,
    pub symbol: String,
}

/// Which planner backend the Planner Adapter invokes (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannerMode {
    /// Pure-rule backend only.
    Rule,
    /// LLM backend only; `PlannerUnavailable` surfaces as zero intents.
    Llm,
    /// LLM backend with fallback to the rule backend on timeout/transport
    /// error (§7, `PlannerUnavailable`).
    Hybrid,
}

/// How the LLM backend is invoked, when `planner_mode` is `llm`/`hybrid`
/// (§6, "the large-language-model planner transport").
#[derive(Debug, Clone)]
pub enum LlmTransport {
    HttpChatCompletions { endpoint: String, model: String },
    Subprocess { command: String, args: Vec<String> },
}

/// Accept/reject thresholds the Improvement Gate's Verdict Judge checks a
/// candidate against (§4.9).
#[derive(Debug, Clone, Copy)]
pub struct GateConfig {
    pub min_pnl_delta_pct: f64,
    pub min_sharpe_delta: f64,
    pub max_drawdown_delta_pct: f64,
    pub min_test_pass_rate: f64,
    /// `s` in `v' = v * (1 + U(-s, +s))` (§4.9).
    pub mutation_scale: f64,
}

/// Perpetual-futures fee schedule (§4.4 auxiliary actions, §9 "Perp
/// subsystem — optional").
#[derive(Debug, Clone, Copy)]
pub struct PerpConfig {
    pub enabled: bool,
    pub open_fee_rate: f64,
    pub borrow_fee_usd: f64,
    pub close_fee_usd: f64,
}

/// The single immutable configuration struct built once at startup from
/// environment variables (§9, "Global configuration" — "do not read
/// environment variables deep inside components").
#[derive(Debug, Clone)]
pub struct AgentConfig {
    // Scheduling
    pub interval_seconds: u64,

    // Collaborator timeouts (§5)
    pub wallet_executor_timeout: Duration,
    pub planner_timeout: Duration,
    pub price_feed_timeout: Duration,

    // Safety Gate (§4.5a)
    pub kill_switch: bool,
    pub max_amount_lamports: BigAmount,
    pub max_slippage_bps: u32,
    pub allow_list: Option<Vec<String>>,
    pub min_intent_gap_ms: i64,

    // Planner Adapter (§4.7)
    pub planner_mode: PlannerMode,
    pub llm_transport: Option<LlmTransport>,
    pub max_intents_per_cycle: usize,
    pub min_trade_value_usd: f64,
    pub token_universe: Vec<TokenUniverseEntry>,

    // Intent Queue (§4.6)
    pub queue_root: std::path::PathBuf,
    pub max_per_cycle: usize,

    // State Store (§4.3)
    pub state_path: std::path::PathBuf,
    pub initial_cash_lamports: BigAmount,
    pub history_keep_points: usize,

    // Improvement Gate (§4.9)
    pub gate: GateConfig,
    pub proposal_every_cycles: u64,
    pub minimum_closed_trades_for_proposal: u64,

    // Perp subsystem (§9, optional)
    pub perp: PerpConfig,

    pub policy: Policy,
}

impl AgentConfig {
    /// Reads configuration from environment variables with hard-coded
    /// conservative defaults (§9, "Global configuration"). Unlike
    /// `Policy::default_conservative`, this reads the process environment
    /// exactly once, at startup, and nowhere else.
    pub fn from_env() -> Result<Self, crate::ErrorKind> {
        let interval_seconds = env_u64("AGENT_INTERVAL_SECONDS", 60)?;
        let wallet_executor_timeout = Duration::from_secs(env_u64("AGENT_WALLET_TIMEOUT_SECS", 45)?);
        let planner_timeout = Duration::from_secs(env_u64("AGENT_PLANNER_TIMEOUT_SECS", 60)?);
        let price_feed_timeout = Duration::from_secs(env_u64("AGENT_PRICE_FEED_TIMEOUT_SECS", 10)?);

        let kill_switch = env_bool("AGENT_KILL_SWITCH", false);
        let max_amount_lamports = BigAmount::from_u64(env_u64("AGENT_MAX_AMOUNT_LAMPORTS", 2_000_000_000)?);
        let max_slippage_bps = env_u64("AGENT_MAX_SLIPPAGE_BPS", 500)? as u32;
        let allow_list = std::env::var("AGENT_ALLOW_LIST").ok().map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });
        let min_intent_gap_ms = env_u64("AGENT_MIN_INTENT_GAP_MS", 30_000)? as i64;

        let planner_mode = match std::env::var("AGENT_PLANNER_MODE").as_deref() {
            Ok("llm") => PlannerMode::Llm,
            Ok("hybrid") => PlannerMode::Hybrid,
            _ => PlannerMode::Rule,
        };

        let max_intents_per_cycle = env_u64("AGENT_MAX_INTENTS_PER_CYCLE", 3)? as usize;
        let min_trade_value_usd = env_f64("AGENT_MIN_TRADE_VALUE_USD", 1.0)?;
        let token_universe = env_token_universe("AGENT_TOKEN_UNIVERSE");

        let queue_root = std::env::var("AGENT_QUEUE_ROOT")
            .unwrap_or_else(|_| "./queue".to_string())
            .into();
        let max_per_cycle = env_u64("AGENT_QUEUE_MAX_PER_CYCLE", 10)? as usize;

        let state_path = std::env::var("AGENT_STATE_PATH")
            .unwrap_or_else(|_| "./state.json".to_string())
            .into();
        let initial_cash_lamports =
            BigAmount::from_u64(env_u64("AGENT_INITIAL_CASH_LAMPORTS", 10_000_000_000)?);
        let history_keep_points = env_u64("AGENT_HISTORY_KEEP_POINTS", 200)? as usize;

        let gate = GateConfig {
            min_pnl_delta_pct: env_f64("AGENT_GATE_MIN_PNL_DELTA_PCT", 0.02)?,
            min_sharpe_delta: env_f64("AGENT_GATE_MIN_SHARPE_DELTA", 0.05)?,
            max_drawdown_delta_pct: env_f64("AGENT_GATE_MAX_DRAWDOWN_DELTA_PCT", 0.1)?,
            min_test_pass_rate: env_f64("AGENT_GATE_MIN_TEST_PASS_RATE", 0.95)?,
            mutation_scale: env_f64("AGENT_GATE_MUTATION_SCALE", 0.1)?,
        };
        let proposal_every_cycles = env_u64("AGENT_PROPOSAL_EVERY_CYCLES", 50)?;
        let minimum_closed_trades_for_proposal =
            env_u64("AGENT_MINIMUM_CLOSED_TRADES_FOR_PROPOSAL", 10)?;

        let perp = PerpConfig {
            enabled: env_bool("AGENT_PERP_ENABLED", false),
            open_fee_rate: env_f64("AGENT_PERP_OPEN_FEE_RATE", 0.0006)?,
            borrow_fee_usd: env_f64("AGENT_PERP_BORROW_FEE_USD", 0.0)?,
            close_fee_usd: env_f64("AGENT_PERP_CLOSE_FEE_USD", 0.0)?,
        };

        let policy = Policy::default_conservative();

        Ok(Self {
            interval_seconds,
            wallet_executor_timeout,
            planner_timeout,
            price_feed_timeout,
            kill_switch,
            max_amount_lamports,
            max_slippage_bps,
            allow_list,
            min_intent_gap_ms,
            planner_mode,
            llm_transport: None,
            max_intents_per_cycle,
            min_trade_value_usd,
            token_universe,
            queue_root,
            max_per_cycle,
            state_path,
            initial_cash_lamports,
            history_keep_points,
            gate,
            proposal_every_cycles,
            minimum_closed_trades_for_proposal,
            perp,
            policy,
        })
    }
}

fn env_u64(key: &str, default: u64) -> Result<u64, crate::ErrorKind> {
    match std::env::var(key) {
        Ok(v) => v
            .parse()
            .map_err(|_| crate::ErrorKind::InvalidConfig(format!("{key} must be a non-negative integer, got {v:?}"))),
        Err(_) => Ok(default),
    }
}

fn env_f64(key: &str, default: f64) -> Result<f64, crate::ErrorKind> {
    match std::env::var(key) {
        Ok(v) => v
            .parse()
            .map_err(|_| crate::ErrorKind::InvalidConfig(format!("{key} must be a number, got {v:?}"))),
        Err(_) => Ok(default),
    }
}

/// Parses `mint1:SYM1,mint2:SYM2` into the configured token universe.
/// Malformed entries (missing `:symbol`) are dropped with a warning rather
/// than failing startup over one typo.
fn env_token_universe(key: &str) -> Vec<TokenUniverseEntry> {
    let Ok(raw) = std::env::var(key) else {
        return Vec::new();
    };
    raw.split(',')
        .filter_map(|entry| {
            let entry = entry.trim();
            if entry.is_empty() {
                return None;
            }
            match entry.split_once(':') {
                Some((mint, symbol)) => Some(TokenUniverseEntry {
                    mint: mint.trim().to_string(),
                    symbol: symbol.trim().to_string(),
                }),
                None => {
                    tracing::warn!(entry, "ignoring malformed {key} entry, expected mint:symbol");
                    None
                }
            }
        })
        .collect()
}

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => matches!(v.trim(), "1" | "true" | "TRUE" | "yes"),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_env_defaults_are_sane() {
        // Isolated from the process environment by construction: reads
        // only variables that are very unlikely to be set by the test
        // harness, and every one of them falls back to a documented
        // default.
        let config = AgentConfig::from_env().unwrap();
        assert_eq!(config.interval_seconds, 60);
        assert!(!config.kill_switch);
        assert_eq!(config.max_slippage_bps, 500);
        assert!(config.allow_list.is_none());
    }

    #[test]
    fn token_universe_parses_mint_symbol_pairs_and_skips_malformed_entries() {
        assert!(env_token_universe("AGENT_CONFIG_TEST_UNIVERSE_UNSET").is_empty());
    }

    #[test]
    fn env_bool_defaults_when_unset() {
        assert!(!env_bool("AGENT_CONFIG_TEST_NONEXISTENT_A", false));
        assert!(env_bool("AGENT_CONFIG_TEST_NONEXISTENT_B", true));
    }
}
