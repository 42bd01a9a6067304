// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration loading from environment variables.

/// Gantry engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// PostgreSQL connection URL
    pub database_url: String,
    /// Plugin gateway host (scheme-less, e.g. `gateway.internal:19110`)
    pub gateway_url: String,
    /// Whether outbound plugin calls use HTTPS
    pub https_enabled: bool,
    /// Maximum connections held by the database pool
    pub max_db_connections: u32,
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `GANTRY_DATABASE_URL`: PostgreSQL connection string
    /// - `GANTRY_GATEWAY_URL`: plugin gateway host, without scheme
    ///
    /// Optional (with defaults):
    /// - `GANTRY_HTTPS_ENABLED`: `true`/`false` (default: false)
    /// - `GANTRY_MAX_DB_CONNECTIONS`: pool size (default: 16)
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("GANTRY_DATABASE_URL")
            .map_err(|_| ConfigError::Missing("GANTRY_DATABASE_URL"))?;

        let gateway_url = std::env::var("GANTRY_GATEWAY_URL")
            .map_err(|_| ConfigError::Missing("GANTRY_GATEWAY_URL"))?;

        let https_enabled: bool = std::env::var("GANTRY_HTTPS_ENABLED")
            .unwrap_or_else(|_| "false".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("GANTRY_HTTPS_ENABLED", "must be true or false"))?;

        let max_db_connections: u32 = std::env::var("GANTRY_MAX_DB_CONNECTIONS")
            .unwrap_or_else(|_| "16".to_string())
            .parse()
            .map_err(|_| {
                ConfigError::Invalid("GANTRY_MAX_DB_CONNECTIONS", "must be a positive integer")
            })?;

        Ok(Self {
            database_url,
            gateway_url,
            https_enabled,
            max_db_connections,
        })
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to serialize tests that modify environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Helper to set env vars for a test and restore them after
    struct EnvGuard {
        vars: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new() -> Self {
            Self { vars: Vec::new() }
        }

        fn set(&mut self, key: &str, value: &str) {
            let old = env::var(key).ok();
            self.vars.push((key.to_string(), old));
            // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
            unsafe { env::set_var(key, value) };
        }

        fn remove(&mut self, key: &str) {
            let old = env::var(key).ok();
            self.vars.push((key.to_string(), old));
            // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
            unsafe { env::remove_var(key) };
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in self.vars.drain(..).rev() {
                // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
                unsafe {
                    match value {
                        Some(v) => env::set_var(&key, v),
                        None => env::remove_var(&key),
                    }
                }
            }
        }
    }

    #[test]
    fn test_config_from_env_with_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();

        guard.set("GANTRY_DATABASE_URL", "postgres://localhost/gantry");
        guard.set("GANTRY_GATEWAY_URL", "gateway.internal:19110");
        guard.remove("GANTRY_HTTPS_ENABLED");
        guard.remove("GANTRY_MAX_DB_CONNECTIONS");

        let config = EngineConfig::from_env().unwrap();

        assert_eq!(config.database_url, "postgres://localhost/gantry");
        assert_eq!(config.gateway_url, "gateway.internal:19110");
        assert!(!config.https_enabled);
        assert_eq!(config.max_db_connections, 16);
    }

    #[test]
    fn test_config_from_env_all_custom() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();

        guard.set("GANTRY_DATABASE_URL", "postgres://user:pass@db:5432/prod");
        guard.set("GANTRY_GATEWAY_URL", "gw.prod:443");
        guard.set("GANTRY_HTTPS_ENABLED", "true");
        guard.set("GANTRY_MAX_DB_CONNECTIONS", "64");

        let config = EngineConfig::from_env().unwrap();

        assert_eq!(config.gateway_url, "gw.prod:443");
        assert!(config.https_enabled);
        assert_eq!(config.max_db_connections, 64);
    }

    #[test]
    fn test_config_missing_database_url() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();

        guard.remove("GANTRY_DATABASE_URL");
        guard.set("GANTRY_GATEWAY_URL", "gw:80");

        let result = EngineConfig::from_env();
        assert!(result.is_err());

        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::Missing("GANTRY_DATABASE_URL")));
        assert!(err.to_string().contains("GANTRY_DATABASE_URL"));
    }

    #[test]
    fn test_config_missing_gateway_url() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();

        guard.set("GANTRY_DATABASE_URL", "postgres://localhost/gantry");
        guard.remove("GANTRY_GATEWAY_URL");

        let result = EngineConfig::from_env();
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::Missing("GANTRY_GATEWAY_URL")
        ));
    }

    #[test]
    fn test_config_invalid_https_flag() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();

        guard.set("GANTRY_DATABASE_URL", "postgres://localhost/gantry");
        guard.set("GANTRY_GATEWAY_URL", "gw:80");
        guard.set("GANTRY_HTTPS_ENABLED", "yes");

        let result = EngineConfig::from_env();
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::Invalid("GANTRY_HTTPS_ENABLED", _)
        ));
    }

    #[test]
    fn test_config_invalid_max_connections() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();

        guard.set("GANTRY_DATABASE_URL", "postgres://localhost/gantry");
        guard.set("GANTRY_GATEWAY_URL", "gw:80");
        guard.set("GANTRY_MAX_DB_CONNECTIONS", "-5");

        let result = EngineConfig::from_env();
        assert!(result.is_err());
    }

    #[test]
    fn test_config_error_display() {
        let missing = ConfigError::Missing("MY_VAR");
        assert_eq!(
            missing.to_string(),
            "missing required environment variable: MY_VAR"
        );

        let invalid = ConfigError::Invalid("MY_VAR", "must be a number");
        assert_eq!(
            invalid.to_string(),
            "invalid value for MY_VAR: must be a number"
        );
    }
}
