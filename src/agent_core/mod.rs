//! Agent Core — orchestration layer for TableTalk.
//!
//! Submodules:
//! - `transcript`: Append-only conversation history per session
//! - `dispatcher`: Drives the model/tool round trip for each question
//! - `errors`: Agent-level error types

pub mod dispatcher;
pub mod errors;
pub mod transcript;

// Re-exports for convenience
pub use dispatcher::{Dispatcher, QuestionOutcome, SYSTEM_PROMPT};
pub use errors::AgentError;
pub use transcript::{Transcript, Turn};
