//! Agent Core error types.

use thiserror::Error;

use crate::inference::errors::GatewayError;

/// Fatal failures that end a question without an answer.
///
/// Recoverable failures (guard rejections, execution errors, malformed tool
/// arguments, ticket write failures) never appear here: the dispatcher folds
/// those back into the conversation as repair turns.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The model endpoint failed outright, or retries ran out.
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// The model requested a tool outside the advertised schema.
    #[error("unknown tool: '{name}'")]
    UnknownTool { name: String },
}
