use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

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
    pub database: DatabaseConfig,
    pub otp: OtpConfig,
    pub sms: Option<SmsConfig>,
    pub content: ContentConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "8000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_format = LogFormat::from_str(
            &env::var("APP_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string()),
        )?;

        let database = DatabaseConfig {
            url: non_empty_var("MONGODB_URL"),
            name: env::var("MONGODB_DATABASE").unwrap_or_else(|_| "hunt_property".to_string()),
        };

        let otp = OtpConfig {
            ttl_minutes: parse_var("OTP_TTL_MINUTES", 10)?,
            expose_code: match non_empty_var("OTP_EXPOSE_CODE") {
                Some(raw) => parse_bool("OTP_EXPOSE_CODE", &raw)?,
                None => environment != AppEnvironment::Production,
            },
        };

        let sms = match (non_empty_var("SMS_API_URL"), non_empty_var("SMS_API_KEY")) {
            (Some(api_url), Some(api_key)) => Some(SmsConfig {
                api_url,
                api_key,
                sender_id: env::var("SMS_SENDER_ID").unwrap_or_else(|_| "HUNTPR".to_string()),
            }),
            (None, None) => None,
            _ => return Err(ConfigError::IncompleteSms),
        };

        let content = ContentConfig {
            public_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| format!("http://{host}:{port}")),
            uploads_dir: PathBuf::from(
                env::var("UPLOADS_DIR").unwrap_or_else(|_| "uploads".to_string()),
            ),
            upload_max_bytes: parse_var("UPLOAD_MAX_BYTES", 10 * 1024 * 1024)?,
            home_default_city: env::var("HOME_DEFAULT_CITY")
                .unwrap_or_else(|_| "Chennai".to_string()),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                log_format,
            },
            database,
            otp,
            sms,
            content,
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_var<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match non_empty_var(key) {
        Some(raw) => raw.parse::<T>().map_err(|_| ConfigError::InvalidNumber { key }),
        None => Ok(default),
    }
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidFlag { key }),
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

/// Output layout for the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    fn from_str(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" | "text" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            _ => Err(ConfigError::InvalidLogFormat {
                value: value.to_string(),
            }),
        }
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub log_format: LogFormat,
}

/// Document database location. Without a URL the service runs on the in-memory backend.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct OtpConfig {
    pub ttl_minutes: i64,
    /// Echo freshly issued codes in the API response (never enabled in production by default).
    pub expose_code: bool,
}

#[derive(Debug, Clone)]
pub struct SmsConfig {
    pub api_url: String,
    pub api_key: String,
    pub sender_id: String,
}

/// Settings consumed by handlers that build URLs or touch the filesystem.
#[derive(Debug, Clone)]
pub struct ContentConfig {
    pub public_base_url: String,
    pub uploads_dir: PathBuf,
    pub upload_max_bytes: usize,
    pub home_default_city: String,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            public_base_url: "http://127.0.0.1:8000".to_string(),
            uploads_dir: PathBuf::from("uploads"),
            upload_max_bytes: 10 * 1024 * 1024,
            home_default_city: "Chennai".to_string(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str },
    InvalidFlag { key: &'static str },
    InvalidLogFormat { value: String },
    IncompleteSms,
    MissingVar { key: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key } => write!(f, "{key} must be a valid number"),
            ConfigError::InvalidFlag { key } => write!(f, "{key} must be true or false"),
            ConfigError::InvalidLogFormat { value } => {
                write!(f, "APP_LOG_FORMAT '{value}' must be 'compact' or 'json'")
            }
            ConfigError::IncompleteSms => {
                write!(f, "SMS_API_URL and SMS_API_KEY must be set together")
            }
            ConfigError::MissingVar { key } => write!(f, "{key} must be set"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
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
        for key in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "APP_LOG_FORMAT",
            "MONGODB_URL",
            "MONGODB_DATABASE",
            "OTP_TTL_MINUTES",
            "OTP_EXPOSE_CODE",
            "SMS_API_URL",
            "SMS_API_KEY",
            "SMS_SENDER_ID",
            "PUBLIC_BASE_URL",
            "UPLOADS_DIR",
            "UPLOAD_MAX_BYTES",
            "HOME_DEFAULT_CITY",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.telemetry.log_format, LogFormat::Compact);
        assert!(config.database.url.is_none());
        assert_eq!(config.database.name, "hunt_property");
        assert_eq!(config.otp.ttl_minutes, 10);
        assert!(config.otp.expose_code);
        assert!(config.sms.is_none());
        assert_eq!(config.content.upload_max_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn production_hides_otp_codes_by_default() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_ENV", "production");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.environment, AppEnvironment::Production);
        assert!(!config.otp.expose_code);
    }

    #[test]
    fn rejects_half_configured_sms_gateway() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("SMS_API_URL", "https://sms.example.test/send");
        let err = AppConfig::load().expect_err("sms config requires a key");
        assert!(matches!(err, ConfigError::IncompleteSms));
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 8000));
    }
}
