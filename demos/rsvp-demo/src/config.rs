//! Configuration for the demo binary.
//!
//! Loads configuration from environment variables with sensible defaults.

use rsvp_postgres::PostgresConfig;
use rsvp_runtime::EngineConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Demo configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Admission engine settings
    pub engine: EngineConfig,
    /// `PostgreSQL` connection pool settings
    pub postgres: PostgresConfig,
    /// Observability settings
    pub server: ServerConfig,
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Log filter (trace, debug, info, warn, error, or a full directive)
    pub log_level: String,
    /// Host the scrape text is meant to be exposed on
    pub metrics_host: String,
    /// Metrics server port
    pub metrics_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: "info,rsvp_runtime=debug".to_string(),
            metrics_host: "0.0.0.0".to_string(),
            metrics_port: 9090,
        }
    }
}

impl ServerConfig {
    /// Address the metrics endpoint binds to.
    ///
    /// An unparseable host falls back to all interfaces.
    #[must_use]
    pub fn metrics_addr(&self) -> SocketAddr {
        let host = self
            .metrics_host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        SocketAddr::new(host, self.metrics_port)
    }
}

impl Config {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = ServerConfig::default();

        Self {
            engine: EngineConfig::from_env(),
            postgres: PostgresConfig::from_env(),
            server: ServerConfig {
                log_level: env::var("RUST_LOG").unwrap_or(defaults.log_level),
                metrics_host: env::var("METRICS_HOST").unwrap_or(defaults.metrics_host),
                metrics_port: env::var("METRICS_PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.metrics_port),
            },
        }
    }
}
