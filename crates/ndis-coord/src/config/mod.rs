use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::workflows::coordination::{CoordinationConfig, MatchWeights};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub coordination: CoordinationConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            coordination: load_coordination()?,
        })
    }
}

fn load_coordination() -> Result<CoordinationConfig, ConfigError> {
    let defaults = CoordinationConfig::default();

    let compliance_warning_days = match env::var("APP_COMPLIANCE_WARNING_DAYS") {
        Ok(value) => value
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|days| *days >= 0)
            .ok_or(ConfigError::InvalidWarningDays { value })?,
        Err(_) => defaults.compliance_warning_days,
    };

    let weights = defaults.match_weights;
    let match_weights = MatchWeights {
        specialization: weight("APP_MATCH_WEIGHT_SPECIALIZATION", weights.specialization)?,
        proximity: weight("APP_MATCH_WEIGHT_PROXIMITY", weights.proximity)?,
        availability: weight("APP_MATCH_WEIGHT_AVAILABILITY", weights.availability)?,
        rating: weight("APP_MATCH_WEIGHT_RATING", weights.rating)?,
    };
    if match_weights.total() <= 0.0 {
        return Err(ConfigError::ZeroMatchWeights);
    }

    Ok(CoordinationConfig {
        compliance_warning_days,
        match_weights,
    })
}

fn weight(key: &'static str, default: f64) -> Result<f64, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|weight| weight.is_finite() && *weight >= 0.0)
            .ok_or(ConfigError::InvalidMatchWeight { key, value }),
        Err(_) => Ok(default),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidWarningDays { value: String },
    InvalidMatchWeight { key: &'static str, value: String },
    ZeroMatchWeights,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidWarningDays { value } => write!(
                f,
                "APP_COMPLIANCE_WARNING_DAYS must be a non-negative day count, got '{value}'"
            ),
            ConfigError::InvalidMatchWeight { key, value } => {
                write!(f, "{key} must be a non-negative number, got '{value}'")
            }
            ConfigError::ZeroMatchWeights => {
                write!(f, "at least one APP_MATCH_WEIGHT_* value must be positive")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidWarningDays { .. }
            | ConfigError::InvalidMatchWeight { .. }
            | ConfigError::ZeroMatchWeights => None,
        }
    }
}
