use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use chrono::Duration;

use crate::scheduling::{EmailPolicy, RescheduleSettings, SchedulerSettings, SlotCatalog, TimeSlot};

/// Longest reschedule-link lifetime accepted from the environment (one year).
pub const MAX_TOKEN_TTL_HOURS: i64 = 24 * 365;

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
    pub scheduling: SchedulingConfig,
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
            scheduling: SchedulingConfig::from_env()?,
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

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Slot catalog and reschedule-link settings.
#[derive(Debug, Clone)]
pub struct SchedulingConfig {
    pub slots: Vec<TimeSlot>,
    pub public_url: String,
    pub token_ttl_hours: i64,
    pub email_policy: EmailPolicy,
}

impl SchedulingConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let slots = match env::var("SCHEDULE_SLOTS") {
            Ok(raw) => parse_slots(&raw)?,
            Err(_) => SlotCatalog::default().slots().to_vec(),
        };

        let public_url =
            env::var("APP_PUBLIC_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());

        let token_ttl_hours = env::var("RESCHEDULE_TOKEN_TTL_HOURS")
            .unwrap_or_else(|_| "48".to_string())
            .parse::<i64>()
            .ok()
            .filter(|hours| (1..=MAX_TOKEN_TTL_HOURS).contains(hours))
            .ok_or(ConfigError::InvalidTokenTtl)?;

        let email_policy = env::var("RESCHEDULE_EMAIL_POLICY")
            .unwrap_or_else(|_| "required".to_string())
            .parse::<EmailPolicy>()
            .map_err(|_| ConfigError::InvalidEmailPolicy)?;

        Ok(Self {
            slots,
            public_url,
            token_ttl_hours,
            email_policy,
        })
    }

    pub fn scheduler_settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            catalog: SlotCatalog::new(self.slots.iter().copied()),
            reschedule: RescheduleSettings {
                token_ttl: Duration::hours(self.token_ttl_hours),
                public_url: self.public_url.clone(),
                email_policy: self.email_policy,
            },
        }
    }
}

fn parse_slots(raw: &str) -> Result<Vec<TimeSlot>, ConfigError> {
    let slots = raw
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry.parse::<TimeSlot>().map_err(|_| ConfigError::InvalidSlot {
                value: entry.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if slots.is_empty() {
        return Err(ConfigError::InvalidSlot {
            value: raw.to_string(),
        });
    }
    Ok(slots)
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidSlot { value: String },
    InvalidTokenTtl,
    InvalidEmailPolicy,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidSlot { value } => {
                write!(f, "SCHEDULE_SLOTS entry '{value}' is not an HH:MM time")
            }
            ConfigError::InvalidTokenTtl => {
                write!(
                    f,
                    "RESCHEDULE_TOKEN_TTL_HOURS must be between 1 and {MAX_TOKEN_TTL_HOURS} hours"
                )
            }
            ConfigError::InvalidEmailPolicy => {
                write!(f, "RESCHEDULE_EMAIL_POLICY must be 'required' or 'best_effort'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidSlot { .. }
            | ConfigError::InvalidTokenTtl
            | ConfigError::InvalidEmailPolicy => None,
        }
    }
}
