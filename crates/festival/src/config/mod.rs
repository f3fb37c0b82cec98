use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

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

/// Top-level configuration for the festival service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub storage: StorageConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("FESTIVAL_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("FESTIVAL_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("FESTIVAL_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("FESTIVAL_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let database = match env::var("FESTIVAL_DATABASE") {
            Ok(raw) if raw.trim().is_empty() => return Err(ConfigError::EmptyDatabasePath),
            Ok(raw) => Some(PathBuf::from(raw.trim())),
            Err(_) => None,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            storage: StorageConfig { database },
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

/// Where registrations are persisted. `None` keeps everything in memory.
#[derive(Debug, Clone, Default)]
pub struct StorageConfig {
    pub database: Option<PathBuf>,
}

impl StorageConfig {
    /// The configured database file, for commands that only work against persisted data.
    pub fn require_database(&self) -> Result<&Path, ConfigError> {
        self.database
            .as_deref()
            .ok_or(ConfigError::MissingDatabase)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    EmptyDatabasePath,
    MissingDatabase,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "FESTIVAL_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "FESTIVAL_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::EmptyDatabasePath => {
                write!(f, "FESTIVAL_DATABASE is set but empty; unset it to use memory")
            }
            ConfigError::MissingDatabase => {
                write!(f, "no database configured; set FESTIVAL_DATABASE or pass --database")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort
            | ConfigError::EmptyDatabasePath
            | ConfigError::MissingDatabase => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
