//! Global configuration types for Tinker.
//!
//! `TinkerConfig` represents the top-level `config.toml` in the data
//! directory. Every field has a default so an empty file is valid.

use serde::{Deserialize, Serialize};

use crate::agent_loop::DEFAULT_MAX_ITERATIONS;
use crate::task::DEFAULT_WORKING_DIR;

/// Which reasoning backend plans the work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OracleKind {
    /// No reasoning service: the task text is treated as the command.
    #[default]
    Direct,
    /// Anthropic Messages API with tool calling.
    Anthropic,
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TinkerConfig {
    #[serde(default)]
    pub oracle: OracleKind,

    /// Model identifier used by the Anthropic oracle.
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Default iteration bound for the agent loop.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Ask the oracle for one combined narrative after executing actions.
    #[serde(default = "default_true")]
    pub synthesize: bool,

    /// Direct mode runs task text verbatim when it starts with one of these.
    #[serde(default = "default_direct_command_prefixes")]
    pub direct_command_prefixes: Vec<String>,

    #[serde(default)]
    pub executor: ExecutorConfig,
}

/// Settings for the shell executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Run commands inside this docker container instead of on the host.
    #[serde(default)]
    pub container: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_working_dir")]
    pub working_dir: String,
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_max_iterations() -> u32 {
    DEFAULT_MAX_ITERATIONS
}

fn default_direct_command_prefixes() -> Vec<String> {
    vec!["echo ".to_string()]
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_working_dir() -> String {
    DEFAULT_WORKING_DIR.to_string()
}

impl Default for TinkerConfig {
    fn default() -> Self {
        Self {
            oracle: OracleKind::default(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            max_iterations: default_max_iterations(),
            synthesize: true,
            direct_command_prefixes: default_direct_command_prefixes(),
            executor: ExecutorConfig::default(),
        }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            container: None,
            timeout_secs: default_timeout_secs(),
            working_dir: default_working_dir(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = TinkerConfig::default();
        assert_eq!(config.oracle, OracleKind::Direct);
        assert_eq!(config.max_iterations, 10);
        assert!(config.synthesize);
        assert_eq!(config.direct_command_prefixes, vec!["echo "]);
        assert_eq!(config.executor.timeout_secs, 60);
        assert!(config.executor.container.is_none());
    }

    #[test]
    fn test_config_deserialize_empty() {
        let config: TinkerConfig = toml::from_str("").unwrap();
        assert_eq!(config.max_tokens, 1024);
        assert_eq!(config.executor.working_dir, "/workspace");
    }

    #[test]
    fn test_config_deserialize_with_values() {
        let toml_str = r#"
oracle = "anthropic"
model = "claude-haiku"
max_iterations = 4
synthesize = false
direct_command_prefixes = ["git ", "ls"]

[executor]
container = "tinker-sandbox"
timeout_secs = 5
"#;
        let config: TinkerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.oracle, OracleKind::Anthropic);
        assert_eq!(config.model, "claude-haiku");
        assert_eq!(config.max_iterations, 4);
        assert!(!config.synthesize);
        assert_eq!(config.direct_command_prefixes, vec!["git ", "ls"]);
        assert_eq!(config.executor.container.as_deref(), Some("tinker-sandbox"));
        assert_eq!(config.executor.timeout_secs, 5);
        assert_eq!(config.executor.working_dir, "/workspace");
    }
}
