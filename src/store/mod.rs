//! Catalog store and ticket sink.
//!
//! Everything that touches disk on behalf of the agent lives here:
//! - `guard`: read-only validation policy for model-proposed SQL
//! - `executor`: query execution over a read-only SQLite handle
//! - `tickets`: append-only CSV support ticket sink

pub mod errors;
pub mod executor;
pub mod guard;
pub mod tickets;

// Re-exports for convenience
pub use errors::StoreError;
pub use executor::{DatasetSummary, QueryExecutor, QueryResult, MAX_RESULT_ROWS};
pub use guard::{validate, RejectReason, Verdict};
pub use tickets::{Ticket, TicketOrigin, TicketPriority, TicketSink};
