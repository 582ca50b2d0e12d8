//! 核心编排层：错误、循环状态、编排循环、构建器、优雅关闭

pub mod builder;
pub mod error;
pub mod orchestrator;
pub mod shutdown;
pub mod state;

pub use builder::AssistantBuilder;
pub use error::{AssistantError, ToolError};
pub use orchestrator::{
    is_affirmative, Orchestrator, OrchestratorSettings, RunExit, MSG_BACKEND_UNAVAILABLE,
    MSG_CANCELLED, MSG_GOODBYE, MSG_NOT_UNDERSTOOD,
};
pub use shutdown::{ShutdownManager, ShutdownReason};
pub use state::{ConfirmationOutcome, LoopState, TurnTrace};
