//! Configuration System (§4.J)
//!
//! Loads in order:
//! - `config.toml` (base configuration)
//! - `config.local.toml` (git-ignored local overrides)
//! - Environment variables (`REGRAPH_` prefix, `__` nesting separator)

use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub rewriting: RewritingConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Bounds applied to [`crate::matcher::find_matching`] search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Caps the number of matches a single `find_matching` call will
    /// enumerate before truncating; `0` means unbounded.
    #[serde(default)]
    pub max_matches: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        MatchingConfig { max_matches: 0 }
    }
}

/// Behavior of the rewrite engine and hierarchy propagation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewritingConfig {
    /// Default value for `strict` on [`crate::hierarchy::Hierarchy::rewrite`]
    /// when a caller does not specify one explicitly.
    #[serde(default)]
    pub default_strict: bool,
}

impl Default for RewritingConfig {
    fn default() -> Self {
        RewritingConfig { default_strict: false }
    }
}

/// Revision-history retention settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Directory commits are exported to by `to_json`-backed tooling; not
    /// read by the in-memory revision DAG itself.
    #[serde(default = "default_history_dir")]
    pub history_dir: PathBuf,
}

fn default_history_dir() -> PathBuf {
    PathBuf::from("./history")
}

impl Default for AuditConfig {
    fn default() -> Self {
        AuditConfig { history_dir: default_history_dir() }
    }
}

/// Logging configuration consumed by the tracing subscriber a binary
/// embedding this crate installs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `trace`, `debug`, `info`, `warn`, or `error`.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// `text` or `json`.
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig { level: default_log_level(), format: default_log_format() }
    }
}

impl Config {
    /// Loads from the default locations, merging base config, local
    /// overrides, then environment variables, in that order.
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file("config.toml"))
            .merge(Toml::file("config.local.toml"))
            .merge(Env::prefixed("REGRAPH_").split("__"))
            .extract()
    }

    pub fn from_file(path: &str) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("REGRAPH_").split("__"))
            .extract()
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            matching: MatchingConfig::default(),
            rewriting: RewritingConfig::default(),
            audit: AuditConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
