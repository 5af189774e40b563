//! Application configuration.
//!
//! ```text
//! portico.toml ─▶ Config::load ─▶ with_env_overrides ─▶ AppBuilder::config
//! ```
//!
//! Every field has a default so a minimal (or empty) file is valid. Config
//! is read once at boot and is immutable afterwards.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::negotiate::Format;

/// Deployment environment. Decides how unhandled failures reach the client.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Unhandled failures become a generic 500 result.
    #[default]
    Production,
    /// Unhandled failures are rendered as a diagnostic page.
    Development,
}

impl FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "development" | "dev" => Ok(Self::Development),
            other => Err(Error::Config(format!("unknown environment `{other}`"))),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" | "text" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(Error::Config(format!("unknown log format `{other}`"))),
        }
    }
}

/// Logging settings. `RUST_LOG`, when set, wins over `level`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: "info".to_owned(), format: LogFormat::Compact }
    }
}

/// Root configuration.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct Config {
    pub environment: Environment,

    /// `host:port` for the HTTP transport.
    pub bind_address: String,

    /// Prepended to conventional template names.
    pub template_prefix: String,

    /// Format used when neither the classifier nor `Accept` decides.
    pub default_format: Format,

    /// Message sent to clients for unhandled failures in production.
    pub generic_error_message: String,

    pub log: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: Environment::Production,
            bind_address: "127.0.0.1:8080".to_owned(),
            template_prefix: String::new(),
            default_format: Format::Document,
            generic_error_message: "Something went wrong. Please try again later.".to_owned(),
            log: LogConfig::default(),
        }
    }
}

impl Config {
    /// Reads and parses a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Applies `PORTICO_ENV`, `PORTICO_BIND` and `PORTICO_LOG_FORMAT`.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Same as [`with_env_overrides`](Self::with_env_overrides) with an
    /// arbitrary variable source.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(env) = lookup("PORTICO_ENV") {
            self.environment = env.parse()?;
        }
        if let Some(bind) = lookup("PORTICO_BIND") {
            self.bind_address = bind;
        }
        if let Some(format) = lookup("PORTICO_LOG_FORMAT") {
            self.log.format = format.parse()?;
        }
        Ok(self)
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        assert_eq!(Config::from_toml_str("").unwrap(), Config::default());
    }

    #[test]
    fn partial_document_keeps_remaining_defaults() {
        let config = Config::from_toml_str(
            r#"
            environment = "development"
            default_format = "json"
            template_prefix = "pages/"

            [log]
            format = "json"
            "#,
        )
        .unwrap();

        assert!(config.is_development());
        assert_eq!(config.default_format, Format::Json);
        assert_eq!(config.template_prefix, "pages/");
        assert_eq!(config.log.format, LogFormat::Json);
        assert_eq!(config.log.level, "info");
        assert_eq!(config.bind_address, "127.0.0.1:8080");
    }

    #[test]
    fn unknown_enum_value_is_a_config_error() {
        let err = Config::from_toml_str(r#"environment = "staging""#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn overrides_replace_file_values() {
        let vars = HashMap::from([
            ("PORTICO_ENV", "dev"),
            ("PORTICO_BIND", "0.0.0.0:3000"),
        ]);
        let config = Config::default()
            .with_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.bind_address, "0.0.0.0:3000");
        assert_eq!(config.log.format, LogFormat::Compact);
    }

    #[test]
    fn bad_override_is_rejected() {
        let err = Config::default()
            .with_overrides(|key| (key == "PORTICO_LOG_FORMAT").then(|| "xml".to_owned()))
            .unwrap_err();
        assert_eq!(err.to_string(), "config: unknown log format `xml`");
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = Config::load("/nonexistent/portico.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/portico.toml"));
    }
}
