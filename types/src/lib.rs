pub mod config;
pub mod error;
pub mod improvement;
pub mod intent;
pub mod policy;
pub mod position;
pub mod state;

pub use config::{AgentConfig, GateConfig, LlmTransport, PerpConfig, PlannerMode, TokenUniverseEntry};
pub use error::ErrorKind;
pub use improvement::{
    Decision, GateThresholds, ImprovementProposal, ImprovementVerdict, ProposalMetrics,
    VerdictDecision,
};
pub use intent::{Action, ExecutionIntent, ExecutionResult, IntentKind, ResultKind, ResultStatus};
pub use policy::Policy;
pub use position::Position;
pub use state::{AgentState, PerpPosition, PerpSide, PricePoint};
