//! Configuration and environment selection.
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Environment variable that overrides the API base URL for every client.
pub const BASE_URL_ENV: &str = "TAWQI_ZATCA_BASE_URL";

/// ZATCA environment selection.
///
/// Decides the API base URL and, for CSRs, whether the production certificate template is
/// requested.
/// - NonProduction: the developer portal ("Integration Sandbox").
/// - Simulation: the simulation test environment.
/// - Production: the live environment.
///
/// # Examples
/// ```rust
/// use std::str::FromStr;
/// use tawqi_core::config::EnvironmentType;
///
/// let env = EnvironmentType::from_str("simulation")?;
/// assert_eq!(env, EnvironmentType::Simulation);
/// assert!(!env.is_production());
/// # Ok::<(), tawqi_core::config::EnvironmentParseError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentType {
    NonProduction,
    Simulation,
    Production,
}

/// Error returned when parsing an [`EnvironmentType`] from a string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvironmentParseError {
    #[error("invalid environment type: {input}")]
    Invalid { input: String },
}

impl FromStr for EnvironmentType {
    type Err = EnvironmentParseError;
    fn from_str(env: &str) -> Result<EnvironmentType, EnvironmentParseError> {
        match env.trim().to_ascii_lowercase().as_str() {
            "non_production" | "sandbox" => Ok(EnvironmentType::NonProduction),
            "simulation" => Ok(EnvironmentType::Simulation),
            "production" => Ok(EnvironmentType::Production),
            _ => Err(EnvironmentParseError::Invalid {
                input: env.to_string(),
            }),
        }
    }
}

impl EnvironmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvironmentType::NonProduction => "non_production",
            EnvironmentType::Simulation => "simulation",
            EnvironmentType::Production => "production",
        }
    }

    pub fn endpoint_url(&self) -> &'static str {
        match self {
            EnvironmentType::NonProduction => {
                "https://gw-fatoora.zatca.gov.sa/e-invoicing/developer-portal/"
            }
            EnvironmentType::Simulation => {
                "https://gw-fatoora.zatca.gov.sa/e-invoicing/simulation/"
            }
            EnvironmentType::Production => "https://gw-fatoora.zatca.gov.sa/e-invoicing/core/",
        }
    }

    /// Only the live environment uses the production certificate template.
    pub fn is_production(&self) -> bool {
        matches!(self, EnvironmentType::Production)
    }
}

/// Configuration for the CSID API client.
///
/// # Examples
/// ```rust
/// use tawqi_core::config::{Config, EnvironmentType};
///
/// let config = Config::new(EnvironmentType::Simulation)
///     .with_base_url("http://localhost:8080/zatca");
/// assert_eq!(config.base_url(), "http://localhost:8080/zatca/");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    env: EnvironmentType,
    base_url: Option<String>,
}

impl Config {
    pub fn new(env: EnvironmentType) -> Self {
        Self {
            env,
            base_url: None,
        }
    }

    /// Use `base_url` instead of the environment's gateway URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn env(&self) -> EnvironmentType {
        self.env
    }

    pub fn has_base_url_override(&self) -> bool {
        self.base_url.is_some()
    }

    /// Base URL with a trailing `/`: explicit override, then the environment's gateway.
    pub fn base_url(&self) -> String {
        match &self.base_url {
            Some(url) => with_trailing_slash(url.clone()),
            None => self.env.endpoint_url().to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::new(EnvironmentType::NonProduction)
    }
}

pub(crate) fn with_trailing_slash(value: String) -> String {
    if value.ends_with('/') {
        value
    } else {
        format!("{value}/")
    }
}
