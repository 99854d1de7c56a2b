//! Conversation turn orchestration.

pub mod machine;
pub mod orchestrator;
pub mod types;

pub use machine::{Effect, TurnEvent, TurnMachine};
pub use orchestrator::{OrchestratorHandle, OrchestratorSettings, TurnOrchestrator};
pub use types::{
    ConversationHistory, ConversationTurn, Notice, NoticeKind, OrchestratorEvent,
    OrchestratorState, Role, Severity, Snapshot, TurnToken,
};
