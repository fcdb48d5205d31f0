// SPDX-FileCopyrightText: © 2025 FabricFlow Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Layered configuration: compiled-in defaults, an optional TOML file, and
//! `FF_`-prefixed environment variables, in that order of precedence.

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn default_address() -> String {
    "127.0.0.1:4600".to_string()
}

fn default_uid() -> String {
    "fabric-local".to_string()
}

const fn default_true() -> bool {
    true
}

fn default_setup_path() -> String {
    "/fabric/setup".to_string()
}

fn default_run_path() -> String {
    "/fabric/run".to_string()
}

fn default_notify_path() -> String {
    "/fabric/notify".to_string()
}

const fn default_request_timeout_ms() -> u64 {
    5_000
}

/// HTTP server and wire-path configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ServerConfig {
    /// Address this connector listens on.
    #[serde(default = "default_address")]
    pub address: String,
    /// This connector's identity, used as the prefix of generated chain ids.
    #[serde(default = "default_uid")]
    pub uid: String,
    #[serde(default = "default_setup_path")]
    pub setup_path: String,
    #[serde(default = "default_run_path")]
    pub run_path: String,
    #[serde(default = "default_notify_path")]
    pub notify_path: String,
    /// Timeout for outbound peer POSTs.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Target ids this connector can materialize a local node for, when
    /// named in an inbound setup broadcast's `remoteConfigs.services`.
    #[serde(default)]
    pub local_services: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            uid: default_uid(),
            setup_path: default_setup_path(),
            run_path: default_run_path(),
            notify_path: default_notify_path(),
            request_timeout_ms: default_request_timeout_ms(),
            local_services: Vec::new(),
        }
    }
}

/// Static peer table: `target_id -> base_url`, backing the default host resolver.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct PeersConfig {
    #[serde(default)]
    pub hosts: HashMap<String, String>,
}

/// Log level, mirroring `tracing::Level` with a `Default` impl for config ergonomics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Info
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(value: LogLevel) -> Self {
        match value {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

/// Logging configuration for console and file output.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LogConfig {
    #[serde(default = "default_true")]
    pub console_enable: bool,
    #[serde(default)]
    pub file_enable: bool,
    #[serde(default)]
    pub console_level: LogLevel,
    #[serde(default)]
    pub file_level: LogLevel,
    #[serde(default = "default_log_file_path")]
    pub file_path: String,
}

fn default_log_file_path() -> String {
    "./fabricd.log".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            console_enable: true,
            file_enable: false,
            console_level: LogLevel::default(),
            file_level: LogLevel::Info,
            file_path: default_log_file_path(),
        }
    }
}

/// Root configuration for the `fabricd` connector.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub peers: PeersConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// Outcome of [`load`]: the resolved config plus whether the config file was missing.
#[derive(Debug)]
pub struct ConfigLoadResult {
    pub config: Config,
    pub file_missing: Option<String>,
}

/// Loads configuration from compiled-in defaults, an optional TOML file, and
/// `FF_`-prefixed environment variables (double-underscore nesting, e.g.
/// `FF_SERVER__ADDRESS`).
///
/// # Errors
///
/// Returns an error if the config file contains invalid TOML, or if an
/// environment variable's value cannot be coerced into its target field type.
pub fn load(config_path: &str) -> Result<ConfigLoadResult, Box<figment::Error>> {
    let mut figment =
        Figment::new().merge(figment::providers::Serialized::defaults(Config::default()));

    let mut file_missing = None;
    if std::path::Path::new(config_path).exists() {
        figment = figment.merge(Toml::file(config_path));
    } else {
        file_missing = Some(config_path.to_string());
    }

    let config: Config =
        figment.merge(Env::prefixed("FF_").split("__")).extract().map_err(Box::new)?;

    Ok(ConfigLoadResult { config, file_missing })
}

/// Renders the compiled-in defaults as TOML, for the `config default` CLI subcommand.
///
/// # Errors
///
/// Returns an error if the default config cannot be serialized (should never happen).
pub fn generate_default() -> Result<String, toml::ser::Error> {
    toml::to_string_pretty(&Config::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let result = load("/nonexistent/fabricd.toml").unwrap();
        assert!(result.file_missing.is_some());
        assert_eq!(result.config.server.address, default_address());
    }

    #[test]
    fn default_config_round_trips_through_toml() {
        let toml_string = generate_default().unwrap();
        let parsed: Config = toml::from_str(&toml_string).unwrap();
        assert_eq!(parsed.server.uid, default_uid());
    }
}
