use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::workflows::intake::{
    DocumentPolicy, StageGates, DEFAULT_MAX_ATTACHMENT_BYTES, DEFAULT_SESSION_IDLE_TIMEOUT,
};

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
    pub intake: IntakeConfig,
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
            intake: IntakeConfig::from_env()?,
        })
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

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Collaborator endpoints and document rules for the intake workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntakeConfig {
    pub catalog_url: Option<String>,
    pub catalog_page_size: u32,
    pub submit_url: Option<String>,
    pub submit_timeout: Duration,
    pub require_guardian_id: bool,
    pub max_attachment_bytes: u64,
    pub session_idle_timeout: Duration,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            catalog_url: None,
            catalog_page_size: 50,
            submit_url: None,
            submit_timeout: Duration::from_secs(30),
            require_guardian_id: false,
            max_attachment_bytes: DEFAULT_MAX_ATTACHMENT_BYTES,
            session_idle_timeout: DEFAULT_SESSION_IDLE_TIMEOUT,
        }
    }
}

impl IntakeConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let catalog_page_size = parse_var("INTAKE_CATALOG_PAGE_SIZE")?
            .filter(|size: &u32| *size > 0)
            .unwrap_or(defaults.catalog_page_size);
        let submit_timeout = parse_var("INTAKE_SUBMIT_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.submit_timeout);
        let max_attachment_bytes =
            parse_var("INTAKE_MAX_ATTACHMENT_BYTES")?.unwrap_or(defaults.max_attachment_bytes);
        let session_idle_timeout = parse_var("INTAKE_SESSION_IDLE_SECS")?
            .filter(|secs: &u64| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.session_idle_timeout);
        let require_guardian_id = match optional_var("INTAKE_REQUIRE_GUARDIAN_ID") {
            Some(raw) => parse_flag("INTAKE_REQUIRE_GUARDIAN_ID", &raw)?,
            None => defaults.require_guardian_id,
        };

        Ok(Self {
            catalog_url: optional_var("INTAKE_CATALOG_URL"),
            catalog_page_size,
            submit_url: optional_var("INTAKE_SUBMIT_URL"),
            submit_timeout,
            require_guardian_id,
            max_attachment_bytes,
            session_idle_timeout,
        })
    }

    pub fn document_policy(&self) -> DocumentPolicy {
        DocumentPolicy::new(self.require_guardian_id, self.max_attachment_bytes)
    }

    pub fn stage_gates(&self) -> StageGates {
        StageGates::new(self.document_policy())
    }
}

fn optional_var(key: &'static str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_var<T: std::str::FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    optional_var(key)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|_| ConfigError::InvalidNumber { key, value: raw })
        })
        .transpose()
}

fn parse_flag(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidFlag {
            key,
            value: raw.to_string(),
        }),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str, value: String },
    InvalidFlag { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key, value } => {
                write!(f, "{key} must be a non-negative integer (found '{value}')")
            }
            ConfigError::InvalidFlag { key, value } => {
                write!(f, "{key} must be true or false (found '{value}')")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidNumber { .. }
            | ConfigError::InvalidFlag { .. } => None,
        }
    }
}
