//! Read-only query execution against the catalog.
//!
//! The connection is opened with `SQLITE_OPEN_READ_ONLY`, so a statement
//! that somehow slipped past the guard still cannot mutate anything.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use serde::Serialize;
use serde_json::{Map, Value};

use super::errors::StoreError;
use super::guard::{self, Verdict};

/// Hard cap on rows returned from a single query. Results past the cap are
/// dropped and the payload is marked `truncated`.
pub const MAX_RESULT_ROWS: usize = 200;

// ─── Results ─────────────────────────────────────────────────────────────────

/// Result of one executed query.
///
/// `columns` preserves the statement's column order; row objects serialize
/// with sorted keys, so the payload folded into a transcript is
/// deterministic for a given dataset.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
    pub truncated: bool,
}

impl QueryResult {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Catalog statistics for the startup banner.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetSummary {
    pub total_rows: i64,
    pub unique_titles: i64,
    /// `None` when the catalog is empty.
    pub latest_release_year: Option<i64>,
    /// `(type, count)` pairs, most common first.
    pub titles_by_type: Vec<(String, i64)>,
}

// ─── Executor ────────────────────────────────────────────────────────────────

/// Executes guard-accepted SQL against a read-only SQLite handle.
///
/// rusqlite connections are not `Sync`; the mutex serializes sessions over
/// the single shared handle. Queries run synchronously and never hold the
/// lock across an await point.
pub struct QueryExecutor {
    conn: Mutex<Connection>,
}

impl QueryExecutor {
    /// Open the catalog in read-only mode. Fails if the file is missing.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| StoreError::OpenFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        tracing::info!(path = %path.display(), "opened catalog read-only");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Execute a statement the guard has accepted.
    ///
    /// Re-validates before touching SQLite, collects at most
    /// [`MAX_RESULT_ROWS`] rows, and logs the statement with its row count.
    pub fn run(&self, query: &str) -> Result<QueryResult, StoreError> {
        let normalized = match guard::validate(query) {
            Verdict::Accepted { normalized } => normalized,
            Verdict::Rejected { reason } => {
                tracing::warn!(reason = reason.as_str(), query, "re-validation rejected query");
                return Err(StoreError::QueryRejected { reason });
            }
        };

        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&normalized)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

        let mut rows = stmt.query([])?;
        let mut collected: Vec<Map<String, Value>> = Vec::new();
        let mut truncated = false;
        while let Some(row) = rows.next()? {
            if collected.len() == MAX_RESULT_ROWS {
                truncated = true;
                break;
            }
            let mut record = Map::new();
            for (idx, name) in columns.iter().enumerate() {
                record.insert(name.clone(), column_value(row.get_ref(idx)?));
            }
            collected.push(record);
        }

        tracing::info!(
            query = %normalized,
            rows = collected.len(),
            truncated,
            "executed query"
        );

        Ok(QueryResult {
            columns,
            rows: collected,
            truncated,
        })
    }

    /// Fixed catalog statistics: row count, distinct titles, latest release
    /// year, and counts per type.
    pub fn summary(&self) -> Result<DatasetSummary, StoreError> {
        let conn = self.lock_conn()?;

        let total_rows: i64 = conn.query_row("SELECT COUNT(*) FROM titles", [], |r| r.get(0))?;
        let unique_titles: i64 =
            conn.query_row("SELECT COUNT(DISTINCT title) FROM titles", [], |r| r.get(0))?;
        let latest_release_year: Option<i64> =
            conn.query_row("SELECT MAX(release_year) FROM titles", [], |r| r.get(0))?;

        let mut stmt = conn.prepare(
            "SELECT type, COUNT(*) AS count FROM titles GROUP BY type ORDER BY count DESC",
        )?;
        let titles_by_type = stmt
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
            .collect::<Result<Vec<(String, i64)>, _>>()?;

        Ok(DatasetSummary {
            total_rows,
            unique_titles,
            latest_release_year,
            titles_by_type,
        })
    }

    fn lock_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|e| StoreError::QueryFailed {
            message: format!("catalog lock poisoned: {e}"),
        })
    }
}

/// Map a SQLite value to JSON: lossless for null, integers, reals, and
/// text; blobs render as lowercase hex.
fn column_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(b.iter().map(|byte| format!("{byte:02x}")).collect()),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
