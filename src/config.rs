//! Runtime configuration loading and validation.
//!
//! Reads `tabletalk.yaml` and resolves environment variables. Config is the
//! single source of truth for the model endpoint, store paths, and sampling
//! settings; every component receives its section explicitly at construction.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Configuration loading or validation error.
#[derive(Debug, Error)]
#[error("config error: {reason}")]
pub struct ConfigError {
    pub reason: String,
}

// ─── Public Types ────────────────────────────────────────────────────────────

/// Model endpoint configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// OpenAI-compatible endpoint base, e.g. `https://api.openai.com/v1`.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Model identifier sent in the request body.
    #[serde(default = "default_model_name")]
    pub model_name: String,
    /// Name of the environment variable holding the API key. The key itself
    /// never appears in the config file.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

/// Catalog store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite catalog, opened read-only.
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

/// Support ticket sink configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TicketConfig {
    /// Path to the append-only ticket CSV.
    #[serde(default = "default_csv_path")]
    pub csv_path: String,
}

/// Top-level configuration (mirrors `tabletalk.yaml`).
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub tickets: TicketConfig,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model_name() -> String {
    "gpt-4o-mini".into()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_db_path() -> String {
    "data/titles.db".into()
}
fn default_csv_path() -> String {
    "data/support_tickets.csv".into()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model_name: default_model_name(),
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

impl Default for TicketConfig {
    fn default() -> Self {
        Self {
            csv_path: default_csv_path(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            store: StoreConfig::default(),
            tickets: TicketConfig::default(),
        }
    }
}

// ─── Loading ─────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load `tabletalk.yaml` if one can be found, otherwise fall back to
    /// built-in defaults. A file that exists but fails to parse is an error,
    /// not a silent fallback.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        match find_config_path(&cwd) {
            Some(path) => {
                let config = load_config(&path)?;
                tracing::info!(path = %path.display(), "loaded configuration");
                Ok(config)
            }
            None => {
                tracing::info!("no tabletalk.yaml found, using built-in defaults");
                Ok(Self::default())
            }
        }
    }
}

/// Resolve the configuration file path.
///
/// `TABLETALK_CONFIG` takes precedence when it points at an existing file;
/// otherwise the search walks upward from `start` looking for `tabletalk.yaml`.
pub fn find_config_path(start: &Path) -> Option<PathBuf> {
    // 1. Check env var
    if let Ok(explicit) = std::env::var("TABLETALK_CONFIG") {
        let candidate = PathBuf::from(expand_tilde(&explicit));
        if candidate.exists() {
            return Some(candidate);
        }
        tracing::warn!(path = %candidate.display(), "TABLETALK_CONFIG points at a missing file");
    }

    // 2. Walk upward from `start`
    let mut dir = start.to_path_buf();
    loop {
        let candidate = dir.join("tabletalk.yaml");
        if candidate.exists() {
            return Some(candidate);
        }
        if !dir.pop() {
            break;
        }
    }

    None
}

/// Load and parse a configuration file.
///
/// Performs environment-variable interpolation on string values matching
/// `${VAR_NAME}` or `${VAR_NAME:-default}`.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError {
        reason: format!("failed to read {}: {e}", path.display()),
    })?;

    let interpolated = interpolate_env_vars(&raw);

    let config: AppConfig = serde_yaml::from_str(&interpolated).map_err(|e| ConfigError {
        reason: format!("failed to parse {}: {e}", path.display()),
    })?;

    Ok(config)
}

// ─── Env-var interpolation ───────────────────────────────────────────────────

/// Replace `${VAR}` and `${VAR:-default}` in a string.
fn interpolate_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_expr = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_expr.push(c);
            }
            let resolved = resolve_var_expr(&var_expr);
            result.push_str(&resolved);
        } else {
            result.push(ch);
        }
    }

    result
}

/// Resolve a variable expression like `VAR` or `VAR:-default`.
fn resolve_var_expr(expr: &str) -> String {
    if let Some(idx) = expr.find(":-") {
        let var_name = &expr[..idx];
        let default = &expr[idx + 2..];
        std::env::var(var_name).unwrap_or_else(|_| expand_tilde(default))
    } else {
        std::env::var(expr).unwrap_or_default()
    }
}

/// Expand a leading `~` to the user's home directory.
///
/// Uses `dirs::home_dir()` for cross-platform support (works on macOS,
/// Linux, and Windows where `$HOME` may not be set).
fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return format!("{}{rest}", home.display());
        }
    }
    path.to_string()
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolate_env_vars_with_default() {
        // When env var is NOT set, use default
        std::env::remove_var("__TABLETALK_NONEXISTENT_VAR__");
        let input = "${__TABLETALK_NONEXISTENT_VAR__:-/fallback/path}";
        let result = interpolate_env_vars(input);
        assert_eq!(result, "/fallback/path");
    }

    #[test]
    fn test_interpolate_env_vars_with_value() {
        std::env::set_var("__TABLETALK_CONFIG_VAR__", "/custom/path");
        let input = "${__TABLETALK_CONFIG_VAR__:-/fallback/path}";
        let result = interpolate_env_vars(input);
        assert_eq!(result, "/custom/path");
        std::env::remove_var("__TABLETALK_CONFIG_VAR__");
    }

    #[test]
    fn test_interpolate_no_vars() {
        let input = "plain text with no variables";
        assert_eq!(interpolate_env_vars(input), input);
    }

    #[test]
    fn test_expand_tilde() {
        let result = expand_tilde("~/Documents");
        assert!(!result.starts_with('~'), "tilde should be expanded");
        assert!(result.ends_with("/Documents"));
    }

    #[test]
    fn test_defaults_fill_missing_sections() {
        let yaml = r#"
            model:
              model_name: gpt-4o
        "#;
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.model.model_name, "gpt-4o");
        assert_eq!(config.model.base_url, "https://api.openai.com/v1");
        assert_eq!(config.store.db_path, "data/titles.db");
        assert_eq!(config.tickets.csv_path, "data/support_tickets.csv");
    }

    #[test]
    fn test_load_config_rejects_bad_yaml() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("tabletalk.yaml");
        std::fs::write(&path, "model: [not-a-map").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_find_config_path_walks_upward() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("tabletalk.yaml"), "{}").unwrap();
        let nested = dir.path().join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();
        let found = find_config_path(&nested).unwrap();
        assert_eq!(found, dir.path().join("tabletalk.yaml"));
    }
}
