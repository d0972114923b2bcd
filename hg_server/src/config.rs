//! Server configuration.
//!
//! Consolidates all environment variable reads; CLI flags override env.

use std::net::SocketAddr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Game HTTP/WebSocket bind address.
    pub bind: SocketAddr,
    /// JWT signing secret for anonymous access tokens.
    pub jwt_secret: String,
    /// Prometheus scrape listener, if enabled.
    pub metrics_bind: Option<SocketAddr>,
}

impl ServerConfig {
    /// Load configuration from the environment, applying CLI overrides.
    pub fn from_env(bind_override: Option<SocketAddr>) -> Result<Self, ConfigError> {
        let bind = match bind_override {
            Some(bind) => bind,
            None => {
                let raw =
                    std::env::var("SERVER_BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
                raw.parse().map_err(|_| ConfigError::Invalid {
                    name: "SERVER_BIND",
                    value: raw,
                })?
            }
        };

        let jwt_secret = std::env::var("JWT_SECRET")
            .unwrap_or_else(|_| "default_jwt_secret_change_in_production".to_string());

        let metrics_bind = match std::env::var("METRICS_BIND") {
            Ok(raw) if !raw.is_empty() => {
                Some(raw.parse().map_err(|_| ConfigError::Invalid {
                    name: "METRICS_BIND",
                    value: raw,
                })?)
            }
            _ => None,
        };

        Ok(Self {
            bind,
            jwt_secret,
            metrics_bind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_override_wins() {
        let bind: SocketAddr = "0.0.0.0:9000".parse().unwrap();
        let config = ServerConfig::from_env(Some(bind)).unwrap();
        assert_eq!(config.bind, bind);
    }
}
