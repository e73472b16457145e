pub mod agent_core;
pub mod config;
pub mod inference;
pub mod store;

/// Return the platform-standard data directory for TableTalk.
///
/// - macOS: `~/Library/Application Support/tabletalk/`
/// - Windows: `{FOLDERID_RoamingAppData}\tabletalk\`
/// - Linux: `$XDG_DATA_HOME/tabletalk/` (fallback `~/.local/share/tabletalk/`)
///
/// Falls back to `~/.tabletalk/` only if none of the above can be resolved.
pub fn data_dir() -> std::path::PathBuf {
    if let Some(dir) = dirs::data_dir() {
        return dir.join("tabletalk");
    }
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".tabletalk")
}

/// Initialize the tracing subscriber — writes structured logs to the data
/// directory, keeping the terminal free for the conversation.
///
/// On each startup:
/// 1. Rotates existing logs (tabletalk.log → tabletalk.log.1 → .2 → .3, keeps last 3).
/// 2. Opens a fresh tabletalk.log with a line-flushing writer for crash resilience.
/// 3. Logs a startup banner with the data directory path for discoverability.
pub fn init_tracing() {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = data_dir();
    let _ = std::fs::create_dir_all(&log_dir);

    let log_path = log_dir.join("tabletalk.log");

    // Rotate: tabletalk.log.2 → .3, .1 → .2, tabletalk.log → .1
    rotate_log_file(&log_path, 3);

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .expect("failed to open tabletalk.log");

    let flushing_writer = FlushingWriter::new(log_file);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tabletalk=info,warn"));

    fmt::fmt()
        .with_env_filter(filter)
        .with_writer(flushing_writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .init();

    // Startup banner — makes it easy to find the right log file
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        data_dir = %log_dir.display(),
        log_file = %log_path.display(),
        pid = std::process::id(),
        "=== TableTalk starting ==="
    );
}

/// Rotate log files: `tabletalk.log` → `tabletalk.log.1` → `.2` → … → `.{keep}`.
///
/// Oldest file beyond `keep` is deleted. Missing files in the chain are skipped.
fn rotate_log_file(base_path: &std::path::Path, keep: u32) {
    // Delete the oldest
    let oldest = format!("{}.{keep}", base_path.display());
    let _ = std::fs::remove_file(&oldest);

    // Shift: .{n-1} → .{n}
    for i in (1..keep).rev() {
        let from = format!("{}.{i}", base_path.display());
        let to = format!("{}.{}", base_path.display(), i + 1);
        let _ = std::fs::rename(&from, &to);
    }

    // Current → .1
    if base_path.exists() {
        let to = format!("{}.1", base_path.display());
        let _ = std::fs::rename(base_path, &to);
    }
}

/// A writer that wraps `std::fs::File` and flushes after every write.
///
/// `tracing-subscriber` buffers log output internally. Without explicit
/// flushing, log entries may sit in OS buffers and be lost on crash.
/// This wrapper ensures each log line is on disk immediately.
///
/// Performance impact is minimal for a chat loop (a handful of lines per
/// question).
#[derive(Clone)]
struct FlushingWriter {
    file: std::sync::Arc<std::sync::Mutex<std::fs::File>>,
}

impl FlushingWriter {
    fn new(file: std::fs::File) -> Self {
        Self {
            file: std::sync::Arc::new(std::sync::Mutex::new(file)),
        }
    }
}

impl std::io::Write for FlushingWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut f = self
            .file
            .lock()
            .map_err(|e| std::io::Error::other(format!("lock poisoned: {e}")))?;
        let n = std::io::Write::write(&mut *f, buf)?;
        std::io::Write::flush(&mut *f)?;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut f = self
            .file
            .lock()
            .map_err(|e| std::io::Error::other(format!("lock poisoned: {e}")))?;
        std::io::Write::flush(&mut *f)
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for FlushingWriter {
    type Writer = FlushingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
