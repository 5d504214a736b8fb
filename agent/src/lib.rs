pub mod config;
pub mod core;
pub mod errors;
pub mod livekit;

// Re-export commonly used items for convenience
pub use config::AgentConfig;
pub use errors::{OrchestratorError, OrchestratorResult, TurnStage};
