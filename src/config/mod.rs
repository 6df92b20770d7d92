//! Configuration module for the CFP review backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::fmt;
use std::net::{AddrParseError, SocketAddr};
use std::path::PathBuf;

/// A configuration value that could not be used.
#[derive(Debug)]
pub enum ConfigError {
    /// `CFP_BIND_ADDR` is not a socket address
    BindAddr(AddrParseError),
    /// A boolean variable holds something other than a recognised flag
    InvalidFlag { var: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::BindAddr(e) => write!(f, "Invalid CFP_BIND_ADDR: {}", e),
            ConfigError::InvalidFlag { var, value } => write!(
                f,
                "Invalid {} value '{}' (expected true/false, yes/no, on/off or 1/0)",
                var, value
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::BindAddr(e) => Some(e),
            ConfigError::InvalidFlag { .. } => None,
        }
    }
}

impl From<AddrParseError> for ConfigError {
    fn from(err: AddrParseError) -> Self {
        ConfigError::BindAddr(err)
    }
}

/// Output format for the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    fn from_env_value(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key for API authentication (required in production)
    pub api_psk: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Path to Tantivy proposal index directory
    pub index_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    pub log_format: LogFormat,
    /// Whether a completed evaluation may be submitted again (overwrites it)
    pub allow_resubmission: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let api_psk = env::var("CFP_API_PSK").ok().filter(|k| !k.is_empty());

        let db_path = env::var("CFP_DB_PATH")
            .unwrap_or_else(|_| "./data/cfp.sqlite".to_string())
            .into();

        let index_path = env::var("CFP_INDEX_PATH")
            .unwrap_or_else(|_| "./data/index".to_string())
            .into();

        let bind_addr = env::var("CFP_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()?;

        let log_level = env::var("CFP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let log_format = env::var("CFP_LOG_FORMAT")
            .map(|v| LogFormat::from_env_value(&v))
            .unwrap_or(LogFormat::Text);

        let allow_resubmission = flag_from_env("CFP_ALLOW_RESUBMISSION", true)?;

        Ok(Self {
            api_psk,
            db_path,
            index_path,
            bind_addr,
            log_level,
            log_format,
            allow_resubmission,
        })
    }
}

/// Read a boolean variable, refusing values that are not a recognised flag.
fn flag_from_env(var: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(var) {
        Ok(value) if value.trim().is_empty() => Ok(default),
        Ok(value) => parse_flag(&value).ok_or(ConfigError::InvalidFlag { var, value }),
        Err(_) => Ok(default),
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
