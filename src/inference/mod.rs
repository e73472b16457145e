//! Model Gateway — OpenAI-compatible API client for chat completions.
//!
//! This module owns all communication with the model endpoint:
//! - Request building from transcript messages and tool schemas
//! - Bounded, jittered retry on transient transport failures
//! - Interpretation of completions into answers or tool requests
//!
//! The client speaks the OpenAI Chat Completions API, making the model
//! interchangeable via config. Switching models or endpoints is a config
//! change, not a code change.

pub mod client;
pub mod errors;
pub mod types;

// Re-exports for convenience
pub use client::{InferenceClient, ModelGateway};
pub use errors::GatewayError;
pub use types::{ChatMessage, ModelReply, Role, ToolCallRequest, ToolDefinition};
