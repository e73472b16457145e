//! CSV-backed support ticket sink.
//!
//! Tickets are append-only: one line per ticket, header written when the
//! file is first created. No update or delete path exists.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::errors::StoreError;

/// Column header written when the ticket file is first created.
const CSV_HEADER: &str = "ticket_id,summary,description,priority,origin,created_at\n";

// ─── Ticket types ────────────────────────────────────────────────────────────

/// Ticket priority, as advertised in the tool schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl TicketPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketPriority::Low => "low",
            TicketPriority::Medium => "medium",
            TicketPriority::High => "high",
        }
    }
}

/// Who filed the ticket: the model via its tool, or the user directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketOrigin {
    Agent,
    Manual,
}

impl TicketOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketOrigin::Agent => "agent",
            TicketOrigin::Manual => "manual",
        }
    }
}

/// Receipt for a filed ticket, also folded back to the model.
#[derive(Debug, Clone, Serialize)]
pub struct Ticket {
    pub ticket_id: String,
    pub summary: String,
    pub description: String,
    pub priority: TicketPriority,
    pub origin: TicketOrigin,
    pub created_at: String,
}

// ─── Sink ────────────────────────────────────────────────────────────────────

/// Appends tickets to a CSV file, creating it with a header on first use.
pub struct TicketSink {
    path: PathBuf,
}

impl TicketSink {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// File a ticket and return its receipt.
    ///
    /// Commas and newlines in the free-text fields flatten to spaces so one
    /// ticket stays one CSV line.
    pub fn create(
        &self,
        summary: &str,
        description: &str,
        priority: TicketPriority,
        origin: TicketOrigin,
    ) -> Result<Ticket, StoreError> {
        self.ensure_store()?;

        let now = Utc::now();
        let ticket_id = format!("T-{}", now.timestamp());
        let created_at = now.to_rfc3339_opts(SecondsFormat::Secs, true);
        let line = format!(
            "{},{},{},{},{},{}\n",
            ticket_id,
            flatten(summary),
            flatten(description),
            priority.as_str(),
            origin.as_str(),
            created_at,
        );

        let mut file = fs::OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| StoreError::TicketIo {
                reason: format!("failed to open {}: {e}", self.path.display()),
            })?;
        file.write_all(line.as_bytes())
            .map_err(|e| StoreError::TicketIo {
                reason: format!("failed to append to {}: {e}", self.path.display()),
            })?;

        tracing::info!(
            ticket_id = %ticket_id,
            priority = priority.as_str(),
            origin = origin.as_str(),
            "created support ticket"
        );

        Ok(Ticket {
            ticket_id,
            summary: summary.to_string(),
            description: description.to_string(),
            priority,
            origin,
            created_at,
        })
    }

    /// Create the parent directory and the headered file when missing.
    fn ensure_store(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| StoreError::TicketIo {
                    reason: format!("failed to create {}: {e}", parent.display()),
                })?;
            }
        }
        if !self.path.exists() {
            fs::write(&self.path, CSV_HEADER).map_err(|e| StoreError::TicketIo {
                reason: format!("failed to create {}: {e}", self.path.display()),
            })?;
        }
        Ok(())
    }
}

/// Replace line breaks and commas with spaces.
fn flatten(text: &str) -> String {
    text.replace(['\n', '\r', ','], " ")
}

// ─── Tests ───────────────────────────────────────────────────────────────────
