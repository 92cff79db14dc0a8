use std::path::PathBuf;

use clap::Parser;

/// Runs the autonomous trading agent: the cycle engine wired to a wallet
/// executor subprocess, an HTTP price feed, and either the rule-based or
/// LLM planner backend, all configured by `AGENT_*` environment variables
/// (§9) plus the collaborator wiring flags below.
#[derive(Debug, Parser)]
#[clap(name = "agent", version)]
pub struct Cli {
    /// Run exactly one cycle and exit, instead of looping on
    /// AGENT_INTERVAL_SECONDS until a shutdown signal arrives.
    #[clap(long)]
    pub once: bool,

    /// Overrides AGENT_STATE_PATH.
    #[clap(long)]
    pub state_path: Option<PathBuf>,

    /// Overrides AGENT_QUEUE_ROOT.
    #[clap(long)]
    pub queue_root: Option<PathBuf>,

    /// Base URL for the HTTP price feed.
    #[clap(long, default_value = "https://price.jup.ag/v6/price")]
    pub price_feed_url: String,

    /// Command spawned as the wallet executor's Content-Length-framed
    /// JSON-RPC stdio server.
    #[clap(long)]
    pub wallet_command: String,

    /// Arguments passed to --wallet-command. Repeat the flag for each one.
    #[clap(long = "wallet-arg")]
    pub wallet_args: Vec<String>,

    /// HTTP chat-completions endpoint, read when AGENT_PLANNER_MODE is
    /// llm/hybrid. Without this, llm/hybrid modes fall back to the rule
    /// backend as if the LLM transport were permanently unavailable.
    #[clap(long)]
    pub llm_endpoint: Option<String>,

    /// Model name sent to --llm-endpoint.
    #[clap(long, default_value = "gpt-4o-mini")]
    pub llm_model: String,

    /// Emit structured JSON logs instead of pretty human-readable output.
    #[clap(long)]
    pub json_logs: bool,
}
