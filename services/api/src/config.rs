use chrono_tz::Tz;
use std::net::SocketAddr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
///
/// Collaborator credentials are optional. Missing ones surface as typed
/// errors when a booking is completed, not at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub public_base_url: String,
    pub database_url: Option<String>,
    pub log_level: Level,
    pub google_calendar_id: Option<String>,
    pub google_calendar_token: Option<String>,
    pub calendar_timezone: Tz,
    pub event_duration_minutes: i64,
    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<String>,
    pub twilio_from_number: Option<String>,
    pub forwarding_enabled: bool,
    pub forward_number: Option<String>,
    pub max_retries: u32,
    /// Age after which an unfinished call session is swept away.
    pub session_ttl_minutes: i64,
    pub restaurant_name: String,
    pub voice_language: String,
}

/// Reads an optional variable, treating an empty value as unset.
fn optional_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match optional_var(name) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        None => Ok(default),
    }
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let public_base_url = optional_var("PUBLIC_BASE_URL")
            .ok_or_else(|| ConfigError::MissingVar("PUBLIC_BASE_URL".to_string()))?;
        if !public_base_url.starts_with("http://") && !public_base_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "PUBLIC_BASE_URL".to_string(),
                format!("'{}' is not an http(s) URL", public_base_url),
            ));
        }
        let public_base_url = public_base_url.trim_end_matches('/').to_string();

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let event_duration_minutes = parse_var("EVENT_DURATION_MINUTES", 120i64)?;
        if event_duration_minutes <= 0 {
            return Err(ConfigError::InvalidValue(
                "EVENT_DURATION_MINUTES".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let calendar_timezone = parse_var("CALENDAR_TIMEZONE", chrono_tz::Europe::Rome)?;

        let session_ttl_minutes = parse_var("SESSION_TTL_MINUTES", 30i64)?;
        if session_ttl_minutes <= 0 {
            return Err(ConfigError::InvalidValue(
                "SESSION_TTL_MINUTES".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            bind_address,
            public_base_url,
            database_url: optional_var("DATABASE_URL"),
            log_level,
            google_calendar_id: optional_var("GOOGLE_CALENDAR_ID"),
            google_calendar_token: optional_var("GOOGLE_CALENDAR_TOKEN"),
            calendar_timezone,
            event_duration_minutes,
            twilio_account_sid: optional_var("TWILIO_ACCOUNT_SID"),
            twilio_auth_token: optional_var("TWILIO_AUTH_TOKEN"),
            twilio_from_number: optional_var("TWILIO_FROM_NUMBER"),
            forwarding_enabled: parse_var("FORWARDING_ENABLED", false)?,
            forward_number: optional_var("FORWARD_NUMBER"),
            max_retries: parse_var("MAX_RETRIES", 2u32)?,
            session_ttl_minutes,
            restaurant_name: optional_var("RESTAURANT_NAME")
                .unwrap_or_else(|| "il ristorante".to_string()),
            voice_language: optional_var("VOICE_LANGUAGE").unwrap_or_else(|| "it-IT".to_string()),
        })
    }

    pub fn calendar_configured(&self) -> bool {
        self.google_calendar_id.is_some() && self.google_calendar_token.is_some()
    }

    pub fn messaging_configured(&self) -> bool {
        self.twilio_account_sid.is_some()
            && self.twilio_auth_token.is_some()
            && self.twilio_from_number.is_some()
    }

    pub fn forwarding_configured(&self) -> bool {
        self.forwarding_enabled && self.forward_number.is_some()
    }
}
