// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration loading from environment variables.

use std::time::Duration;

/// ordersync configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite connection URL for the local store
    pub database_url: String,
    /// Maximum pooled store connections
    pub max_connections: u32,
    /// Timeout applied to every partner REST request
    pub partner_timeout: Duration,
    /// Actor recorded in audit columns when a command does not name one
    pub default_actor: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `ORDERSYNC_DATABASE_URL`: SQLite connection string
    ///
    /// Optional (with defaults):
    /// - `ORDERSYNC_DB_MAX_CONNECTIONS`: pool size (default: 5)
    /// - `ORDERSYNC_PARTNER_TIMEOUT_MS`: partner request timeout (default: 30000)
    /// - `ORDERSYNC_ACTOR`: default audit actor (default: "ordersync")
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("ORDERSYNC_DATABASE_URL")
            .map_err(|_| ConfigError::Missing("ORDERSYNC_DATABASE_URL"))?;

        let max_connections: u32 = std::env::var("ORDERSYNC_DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .ok()
            .filter(|n| *n > 0)
            .ok_or(ConfigError::Invalid(
                "ORDERSYNC_DB_MAX_CONNECTIONS",
                "must be a positive integer",
            ))?;

        let partner_timeout_ms: u64 = std::env::var("ORDERSYNC_PARTNER_TIMEOUT_MS")
            .unwrap_or_else(|_| "30000".to_string())
            .parse()
            .map_err(|_| {
                ConfigError::Invalid(
                    "ORDERSYNC_PARTNER_TIMEOUT_MS",
                    "must be a number of milliseconds",
                )
            })?;

        let default_actor =
            std::env::var("ORDERSYNC_ACTOR").unwrap_or_else(|_| "ordersync".to_string());
        if default_actor.trim().is_empty() {
            return Err(ConfigError::Invalid("ORDERSYNC_ACTOR", "must not be empty"));
        }

        Ok(Self {
            database_url,
            max_connections,
            partner_timeout: Duration::from_millis(partner_timeout_ms),
            default_actor,
        })
    }

    /// Load a `.env` file (if present) and then read the environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}
