//! Configuration management for Routing Core

use anyhow::{bail, Context, Result};
use std::env;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server host
    pub http_host: String,
    /// HTTP server port
    pub http_port: u16,
    /// Which config store backs the engine
    pub store: StoreBackend,
    /// Database configuration (MySQL backend only)
    pub database: Option<DatabaseConfig>,
    pub routing: RoutingConfig,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    MySql,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub run_migrations: bool,
}

#[derive(Debug, Clone)]
pub struct RoutingConfig {
    /// Attempts per optimistic read-modify-write (at least 1)
    pub conflict_retry_attempts: u32,
    /// Period of the background cleanup; `None` disables it
    pub cleanup_interval_secs: Option<u64>,
    pub user_search_limit: usize,
    /// `id:username[:role],...` seed for the in-memory user directory
    pub user_directory_seed: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// `text` or `json`
    pub log_format: String,
    pub metrics_enabled: bool,
    pub tracing_enabled: bool,
    pub otlp_endpoint: Option<String>,
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
            metrics_enabled: true,
            tracing_enabled: false,
            otlp_endpoint: None,
            service_name: "routing-core".to_string(),
        }
    }
}

fn flag(value: Option<String>, default: bool) -> bool {
    value
        .map(|s| matches!(s.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its value
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let store = match lookup("STORE_BACKEND")
            .unwrap_or_else(|| "memory".to_string())
            .to_lowercase()
            .as_str()
        {
            "memory" => StoreBackend::Memory,
            "mysql" => StoreBackend::MySql,
            other => bail!("Invalid STORE_BACKEND '{}', expected memory or mysql", other),
        };

        let database = match store {
            StoreBackend::Memory => None,
            StoreBackend::MySql => Some(DatabaseConfig {
                url: lookup("DATABASE_URL").context("DATABASE_URL is required for mysql")?,
                max_connections: lookup("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|| "10".to_string())
                    .parse()
                    .unwrap_or(10),
                min_connections: lookup("DATABASE_MIN_CONNECTIONS")
                    .unwrap_or_else(|| "2".to_string())
                    .parse()
                    .unwrap_or(2),
                run_migrations: flag(lookup("DATABASE_RUN_MIGRATIONS"), true),
            }),
        };

        let conflict_retry_attempts: u32 = lookup("CONFLICT_RETRY_ATTEMPTS")
            .unwrap_or_else(|| "3".to_string())
            .parse()
            .context("Invalid CONFLICT_RETRY_ATTEMPTS")?;
        if conflict_retry_attempts == 0 {
            bail!("CONFLICT_RETRY_ATTEMPTS must be at least 1");
        }

        let cleanup_interval_secs = match lookup("CLEANUP_INTERVAL_SECS") {
            Some(v) if !v.trim().is_empty() => {
                let secs: u64 = v.trim().parse().context("Invalid CLEANUP_INTERVAL_SECS")?;
                (secs > 0).then_some(secs)
            }
            _ => None,
        };

        Ok(Self {
            http_host: lookup("HTTP_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            http_port: lookup("HTTP_PORT")
                .unwrap_or_else(|| "8080".to_string())
                .parse()
                .context("Invalid HTTP_PORT")?,
            store,
            database,
            routing: RoutingConfig {
                conflict_retry_attempts,
                cleanup_interval_secs,
                user_search_limit: lookup("USER_SEARCH_LIMIT")
                    .unwrap_or_else(|| "20".to_string())
                    .parse()
                    .unwrap_or(20),
                user_directory_seed: lookup("USER_DIRECTORY_SEED"),
            },
            telemetry: TelemetryConfig {
                log_format: lookup("LOG_FORMAT").unwrap_or_else(|| "text".to_string()),
                metrics_enabled: flag(lookup("METRICS_ENABLED"), true),
                tracing_enabled: flag(lookup("OTEL_TRACING_ENABLED"), false),
                otlp_endpoint: lookup("OTEL_EXPORTER_OTLP_ENDPOINT"),
                service_name: lookup("OTEL_SERVICE_NAME")
                    .unwrap_or_else(|| "routing-core".to_string()),
            },
        })
    }

    /// Get HTTP server address
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }
}
