use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::workflows::marketplace::domain::{Currency, InvalidCurrency};

const DEFAULT_CURRENCY: &str = "EUR";
const DEFAULT_URGENT_WITHIN_DAYS: u32 = 3;

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

/// Top-level configuration for the marketplace service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub marketplace: MarketplaceConfig,
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

        let marketplace = MarketplaceConfig::from_env()?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            marketplace,
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

/// Business dials for RFQ intake and deadline classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketplaceConfig {
    /// Currency applied to RFQs created without an explicit one.
    pub default_currency: Currency,
    /// Deadlines this many calendar days out (or closer) count as urgent.
    pub urgent_within_days: u32,
}

impl MarketplaceConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let default_currency = match env::var("MARKETPLACE_DEFAULT_CURRENCY") {
            Ok(raw) => Currency::parse(&raw).map_err(ConfigError::InvalidCurrency)?,
            Err(_) => Currency::parse(DEFAULT_CURRENCY).map_err(ConfigError::InvalidCurrency)?,
        };

        let urgent_within_days = match env::var("MARKETPLACE_URGENT_WITHIN_DAYS") {
            Ok(raw) => raw
                .trim()
                .parse::<u32>()
                .map_err(|_| ConfigError::InvalidUrgencyWindow(raw))?,
            Err(_) => DEFAULT_URGENT_WITHIN_DAYS,
        };

        Ok(Self {
            default_currency,
            urgent_within_days,
        })
    }
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            default_currency: Currency::eur(),
            urgent_within_days: DEFAULT_URGENT_WITHIN_DAYS,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidCurrency(InvalidCurrency),
    InvalidUrgencyWindow(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidCurrency(err) => {
                write!(f, "MARKETPLACE_DEFAULT_CURRENCY is invalid: {err}")
            }
            ConfigError::InvalidUrgencyWindow(raw) => write!(
                f,
                "MARKETPLACE_URGENT_WITHIN_DAYS must be a non-negative integer (found '{raw}')"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidUrgencyWindow(_) => None,
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidCurrency(err) => Some(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        env::remove_var("APP_ENV");
        env::remove_var("APP_HOST");
        env::remove_var("APP_PORT");
        env::remove_var("APP_LOG_LEVEL");
        env::remove_var("MARKETPLACE_DEFAULT_CURRENCY");
        env::remove_var("MARKETPLACE_URGENT_WITHIN_DAYS");
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.marketplace, MarketplaceConfig::default());
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn marketplace_overrides_are_normalized() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("MARKETPLACE_DEFAULT_CURRENCY", " czk ");
        env::set_var("MARKETPLACE_URGENT_WITHIN_DAYS", "5");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.marketplace.default_currency.as_str(), "CZK");
        assert_eq!(config.marketplace.urgent_within_days, 5);
        reset_env();
    }

    #[test]
    fn rejects_malformed_marketplace_settings() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("MARKETPLACE_DEFAULT_CURRENCY", "euro");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidCurrency(_))
        ));

        reset_env();
        env::set_var("MARKETPLACE_URGENT_WITHIN_DAYS", "-1");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidUrgencyWindow(_))
        ));
        reset_env();
    }
}
