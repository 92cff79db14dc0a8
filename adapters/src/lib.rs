//! Collaborator implementations for the four `ports` traits (§6): the
//! wallet executor RPC transport, the HTTP price feed, and the two
//! planner backends (pure-rule and LLM).

pub mod llm_planner;
pub mod price_feed;
pub mod rule_planner;
pub mod wallet_rpc;

pub use llm_planner::{HttpLlmPlanner, SubprocessLlmPlanner};
pub use price_feed::HttpPriceFeed;
pub use rule_planner::RuleBasedPlanner;
pub use wallet_rpc::WalletRpcClient;
