//! Store error types.

use thiserror::Error;

use super::guard::RejectReason;

/// Errors from the catalog store and ticket sink.
///
/// `QueryRejected` and `QueryFailed` are recoverable at the agent level:
/// the dispatcher folds them back into the conversation instead of ending
/// the question.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Could not open the catalog database.
    #[error("failed to open catalog at {path}: {reason}")]
    OpenFailed { path: String, reason: String },

    /// The guard refused the statement during re-validation.
    #[error("query rejected: {reason}")]
    QueryRejected { reason: RejectReason },

    /// SQLite reported an error while running a guard-accepted statement.
    #[error("query execution failed: {message}")]
    QueryFailed { message: String },

    /// Appending to the ticket store failed.
    #[error("ticket store failure: {reason}")]
    TicketIo { reason: String },
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::QueryFailed {
            message: e.to_string(),
        }
    }
}
