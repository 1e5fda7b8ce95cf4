//! Configuration file support for dealscope
//!
//! Reads from .dealscope/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration structure
#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq)]
pub struct Config {
    /// HTTP API settings
    #[serde(default)]
    pub serve: ServeConfig,

    /// How credits and money are shown
    #[serde(default)]
    pub display: DisplayConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ServeConfig {
    /// Default: 3001
    #[serde(default = "default_port")]
    pub port: u16,

    /// Artificial pause before analysis responses, in milliseconds.
    /// Default: 0 (off)
    #[serde(default)]
    pub analysis_delay_ms: u64,
}

fn default_port() -> u16 {
    3001
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            analysis_delay_ms: 0,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DisplayConfig {
    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,

    /// Money value of one credit
    #[serde(default = "default_usd_per_credit")]
    pub usd_per_credit: f64,
}

fn default_currency_symbol() -> String {
    "$".to_string()
}

fn default_usd_per_credit() -> f64 {
    1.0
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            currency_symbol: default_currency_symbol(),
            usd_per_credit: default_usd_per_credit(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    /// tracing filter directive, used when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load config from .dealscope/config.toml
    /// Returns default config if file doesn't exist or can't be parsed
    pub fn load() -> Self {
        if let Some(path) = Self::find_config_path() {
            if let Ok(contents) = std::fs::read_to_string(&path) {
                match Self::parse(&contents) {
                    Some(config) => return config,
                    None => eprintln!("Ignoring unreadable config at {}", path.display()),
                }
            }
        }
        Self::default()
    }

    /// Parse config text; `None` if it isn't valid TOML for this shape
    pub fn parse(contents: &str) -> Option<Self> {
        toml::from_str(contents).ok()
    }

    /// Find config.toml by walking up directory tree
    fn find_config_path() -> Option<PathBuf> {
        let current_dir = std::env::current_dir().ok()?;
        let mut dir = current_dir.as_path();

        loop {
            let config_path = dir.join(".dealscope").join("config.toml");
            if config_path.exists() {
                return Some(config_path);
            }

            match dir.parent() {
                Some(parent) => dir = parent,
                None => break,
            }
        }
        None
    }

    /// Credits expressed in the configured currency, e.g. "$6.30"
    pub fn format_money(&self, credits: f64) -> String {
        crate::scenario::format_currency(credits * self.display.usd_per_credit, &self.display.currency_symbol)
    }
}
