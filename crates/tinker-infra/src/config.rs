//! Configuration and data directory resolution.
//!
//! Reads `config.toml` from the data directory (`~/.tinker/` in production)
//! and deserializes it into [`TinkerConfig`]. Falls back to defaults when the
//! file is missing or malformed.

use std::path::{Path, PathBuf};

use tinker_types::agent_loop::DEFAULT_MAX_ITERATIONS;
use tinker_types::config::TinkerConfig;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "TINKER_DATA_DIR";

/// Config file name inside the data directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Load configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`TinkerConfig::default()`].
/// - If the file exists but cannot be read or parsed, logs a warning and
///   returns the default.
/// - A `max_iterations` of 0 is replaced by the default bound.
pub async fn load_config(data_dir: &Path) -> TinkerConfig {
    let config_path = data_dir.join(CONFIG_FILE);

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return TinkerConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return TinkerConfig::default();
        }
    };

    match toml::from_str::<TinkerConfig>(&content) {
        Ok(mut config) => {
            if config.max_iterations == 0 {
                tracing::warn!(
                    "max_iterations = 0 in {} is invalid, using {DEFAULT_MAX_ITERATIONS}",
                    config_path.display()
                );
                config.max_iterations = DEFAULT_MAX_ITERATIONS;
            }
            config
        }
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            TinkerConfig::default()
        }
    }
}

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `TINKER_DATA_DIR` environment variable
/// 2. `~/.tinker`
/// 3. `.tinker` in the current directory
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".tinker");
    }

    PathBuf::from(".tinker")
}
