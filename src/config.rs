/// Configuration management for the DID registry
use crate::error::{RegistryError, RegistryResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub authentication: AuthConfig,
    pub notifications: NotificationConfig,
    pub jobs: JobsConfig,
    pub logging: LoggingConfig,
}

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn from_str(s: &str) -> RegistryResult<Self> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(RegistryError::Config(format!("Invalid environment: {}", s))),
        }
    }
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub environment: Environment,
    pub version: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub database: PathBuf,
    pub max_connections: u32,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

/// Notification channels
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Push gateway endpoint; push is disabled when unset
    pub push_url: Option<String>,
    pub push_api_key: Option<String>,
    /// Buffered messages per live subscriber
    pub socket_buffer: usize,
}

/// Background job intervals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    pub stats_interval_secs: u64,
    pub health_interval_secs: u64,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl RegistryConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> RegistryResult<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable source
    pub fn from_lookup<F>(var: F) -> RegistryResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let name = var("DID_REGISTRY_NAME").unwrap_or_else(|| "did-registry".to_string());
        let environment = match var("DID_REGISTRY_ENV") {
            Some(env) => Environment::from_str(&env)?,
            None => Environment::Production,
        };
        let version = env!("CARGO_PKG_VERSION").to_string();

        let data_directory: PathBuf = var("DID_REGISTRY_DATA_DIRECTORY")
            .unwrap_or_else(|| "./data".to_string())
            .into();
        let database = var("DID_REGISTRY_DB_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_directory.join("registry.sqlite"));
        let max_connections = parse_or(&var, "DID_REGISTRY_DB_MAX_CONNECTIONS", 10)?;

        let jwt_secret = var("DID_REGISTRY_JWT_SECRET")
            .ok_or_else(|| RegistryError::Config("JWT secret required".to_string()))?;

        let push_url = var("DID_REGISTRY_PUSH_URL").filter(|s| !s.is_empty());
        let push_api_key = var("DID_REGISTRY_PUSH_API_KEY").filter(|s| !s.is_empty());
        let socket_buffer = parse_or(&var, "DID_REGISTRY_SOCKET_BUFFER", 256)?;

        let stats_interval_secs = parse_or(&var, "DID_REGISTRY_STATS_INTERVAL_SECS", 300)?;
        let health_interval_secs = parse_or(&var, "DID_REGISTRY_HEALTH_INTERVAL_SECS", 60)?;

        let level = var("RUST_LOG").unwrap_or_else(|| "info".to_string());
        let format = match var("DID_REGISTRY_LOG_FORMAT").as_deref() {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(RegistryError::Config(format!("Invalid log format: {}", other)))
            }
        };

        Ok(RegistryConfig {
            service: ServiceConfig {
                name,
                environment,
                version,
            },
            storage: StorageConfig {
                data_directory,
                database,
                max_connections,
            },
            authentication: AuthConfig { jwt_secret },
            notifications: NotificationConfig {
                push_url,
                push_api_key,
                socket_buffer,
            },
            jobs: JobsConfig {
                stats_interval_secs,
                health_interval_secs,
            },
            logging: LoggingConfig { level, format },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> RegistryResult<()> {
        if self.service.name.is_empty() {
            return Err(RegistryError::Config("Service name cannot be empty".to_string()));
        }

        if self.authentication.jwt_secret.len() < 32 {
            return Err(RegistryError::Config(
                "JWT secret must be at least 32 characters".to_string(),
            ));
        }

        if self.storage.max_connections == 0 {
            return Err(RegistryError::Config(
                "Database pool needs at least one connection".to_string(),
            ));
        }

        if self.notifications.socket_buffer == 0 {
            return Err(RegistryError::Config("Socket buffer cannot be zero".to_string()));
        }

        if self.jobs.stats_interval_secs == 0 || self.jobs.health_interval_secs == 0 {
            return Err(RegistryError::Config("Job intervals must be positive".to_string()));
        }

        if let Some(url) = &self.notifications.push_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(RegistryError::Config(format!("Invalid push URL: {}", url)));
            }
        }

        Ok(())
    }

    /// Whether error responses may carry internal detail
    pub fn expose_internal_errors(&self) -> bool {
        self.service.environment == Environment::Development
    }
}

fn parse_or<F, T>(var: &F, key: &str, default: T) -> RegistryResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| RegistryError::Config(format!("Invalid value for {}: {}", key, raw))),
        None => Ok(default),
    }
}
