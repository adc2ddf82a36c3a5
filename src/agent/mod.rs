//! Agents and their per-round behavior

pub mod behavior;
pub mod state;

pub use behavior::{step_agent_at, Action, BehaviorRules, StepContext, StepOutcome};
pub use state::{Agent, AgentRecord, Species};
