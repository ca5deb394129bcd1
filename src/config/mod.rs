use chrono::FixedOffset;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub booking: BookingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub base_url: String,
    #[serde(default)]
    pub secure_cookies: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub session_duration_hours: i64,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct BookingConfig {
    /// Offset of the office's wall clock from UTC. Booking forms take local
    /// dates and times; they are converted with this offset before storage.
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

impl BookingConfig {
    /// Fails for offsets of a full day or more.
    pub fn offset(&self) -> Result<FixedOffset, ConfigError> {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                ConfigError::Message(format!(
                    "booking.utc_offset_minutes must be between -1439 and 1439, got {}",
                    self.utc_offset_minutes
                ))
            })
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.base_url", "http://localhost:8080")?
            .set_default("server.secure_cookies", false)?
            .set_default("database.url", "sqlite://intranet.db?mode=rwc")?
            .set_default("database.max_connections", 10)?
            .set_default("auth.session_duration_hours", 24)?
            .set_default("booking.utc_offset_minutes", 0)?

            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))

            // Add environment variables (with INTRANET__ prefix, double underscore separates levels)
            .add_source(Environment::with_prefix("INTRANET").separator("__"))

            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.booking.offset()?;
        Ok(settings)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                base_url: "http://localhost:8080".to_string(),
                secure_cookies: false,
            },
            database: DatabaseConfig {
                url: "sqlite://intranet.db?mode=rwc".to_string(),
                max_connections: 10,
            },
            auth: AuthConfig {
                session_duration_hours: 24,
            },
            booking: BookingConfig {
                utc_offset_minutes: 0,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_in_range() {
        let booking = BookingConfig { utc_offset_minutes: -300 };
        assert_eq!(booking.offset().unwrap().local_minus_utc(), -300 * 60);
    }

    #[test]
    fn test_offset_out_of_range_is_an_error() {
        for minutes in [1440, -1440, i32::MAX, i32::MIN] {
            let booking = BookingConfig { utc_offset_minutes: minutes };
            assert!(booking.offset().is_err(), "{} minutes accepted", minutes);
        }
    }
}
