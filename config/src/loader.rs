//! # Environment Variable Loader
//!
//! Loads configuration from environment variables following 12-factor app
//! principles.
//!
//! # Naming Convention
//! - `E2E_MONGO_*`: MongoDB container settings
//! - `E2E_READY_*`: readiness poll settings
//! - `E2E_LOG_LEVEL`: logging level
//! - `E2E_CONFIG_FILE`: optional TOML/YAML file loaded beneath the environment

use crate::config::{HarnessConfig, MongoConfig, ObservabilityConfig, ReadinessConfig};
use crate::file_loader::load_from_file;
use crate::validation::validate;
use errors::HarnessError;
use std::env;
use std::path::Path;

/// Path of an optional configuration file.
pub const CONFIG_FILE_ENV: &str = "E2E_CONFIG_FILE";

/// Load the effective harness configuration.
///
/// Precedence: environment variables > configuration file > defaults. The
/// merged configuration is validated before it is returned.
pub fn load() -> Result<HarnessConfig, HarnessError> {
    let base = match env::var(CONFIG_FILE_ENV) {
        Ok(path) => {
            tracing::debug!("Loading harness configuration from {}", path);
            load_from_file(Path::new(&path)).map_err(|e| HarnessError::Configuration {
                message: e.to_string()
            })?
        }
        Err(_) => HarnessConfig::default()
    };

    let config = apply_env(base);
    validate(&config).map_err(|e| HarnessError::Configuration {
        message: e.to_string()
    })?;
    Ok(config)
}

/// Load configuration from environment variables over the defaults.
///
/// ## Environment Variables
/// ### MongoDB (`E2E_MONGO_*`)
/// - `E2E_MONGO_IMAGE`: image name (default: "mongo")
/// - `E2E_MONGO_TAG`: image tag (default: "latest")
/// - `E2E_MONGO_USERNAME`: root username (default: "mongo")
/// - `E2E_MONGO_PASSWORD`: root password (default: "mongo")
/// - `E2E_MONGO_DATABASE`: database in the URI (default: "mongo")
/// - `E2E_MONGO_AUTH_SOURCE`: authentication database (default: "admin")
/// - `E2E_MONGO_PORT`: container-internal port (default: 27017)
/// - `E2E_MONGO_STARTUP_TIMEOUT_SECONDS`: container start timeout
///   (default: 120)
///
/// ### Readiness (`E2E_READY_*`)
/// - `E2E_READY_INITIAL_INTERVAL_MS`: first backoff interval (default: 500)
/// - `E2E_READY_MAX_INTERVAL_MS`: backoff interval cap (default: 5000)
/// - `E2E_READY_MAX_ELAPSED_SECONDS`: total poll budget (default: 60)
/// - `E2E_READY_ATTEMPT_TIMEOUT_MS`: per-attempt timeout (default: 2000)
///
/// ### Logging
/// - `E2E_LOG_LEVEL`: trace/debug/info/warn/error (default: "info")
pub fn load_from_env() -> HarnessConfig {
    apply_env(HarnessConfig::default())
}

/// Override `base` with every `E2E_*` variable that is set and parses.
pub fn apply_env(base: HarnessConfig) -> HarnessConfig {
    HarnessConfig {
        mongo: load_mongo_from_env(base.mongo),
        readiness: load_readiness_from_env(base.readiness),
        observability: load_observability_from_env(base.observability)
    }
}

fn load_mongo_from_env(base: MongoConfig) -> MongoConfig {
    MongoConfig {
        image: env::var("E2E_MONGO_IMAGE").unwrap_or(base.image),
        tag: env::var("E2E_MONGO_TAG").unwrap_or(base.tag),
        username: env::var("E2E_MONGO_USERNAME").unwrap_or(base.username),
        password: env::var("E2E_MONGO_PASSWORD").unwrap_or(base.password),
        database: env::var("E2E_MONGO_DATABASE").unwrap_or(base.database),
        auth_source: env::var("E2E_MONGO_AUTH_SOURCE").unwrap_or(base.auth_source),
        port: parse_env("E2E_MONGO_PORT").unwrap_or(base.port),
        startup_timeout_seconds: parse_env("E2E_MONGO_STARTUP_TIMEOUT_SECONDS")
            .unwrap_or(base.startup_timeout_seconds)
    }
}

fn load_readiness_from_env(base: ReadinessConfig) -> ReadinessConfig {
    ReadinessConfig {
        initial_interval_ms: parse_env("E2E_READY_INITIAL_INTERVAL_MS")
            .unwrap_or(base.initial_interval_ms),
        max_interval_ms: parse_env("E2E_READY_MAX_INTERVAL_MS").unwrap_or(base.max_interval_ms),
        max_elapsed_seconds: parse_env("E2E_READY_MAX_ELAPSED_SECONDS")
            .unwrap_or(base.max_elapsed_seconds),
        attempt_timeout_ms: parse_env("E2E_READY_ATTEMPT_TIMEOUT_MS")
            .unwrap_or(base.attempt_timeout_ms)
    }
}

fn load_observability_from_env(base: ObservabilityConfig) -> ObservabilityConfig {
    ObservabilityConfig {
        logging_level: env::var("E2E_LOG_LEVEL").unwrap_or(base.logging_level)
    }
}

fn parse_env<T>(key: &str) -> Result<T, Box<dyn std::error::Error>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static
{
    match env::var(key) {
        Ok(s) => s.parse::<T>().map_err(|e| {
            tracing::warn!("Ignoring unparseable {}={:?}: {}", key, s, e);
            Box::new(e) as Box<dyn std::error::Error>
        }),
        Err(e) => Err(Box::new(e) as Box<dyn std::error::Error>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    #[serial]
    fn test_load_from_env_defaults() {
        unsafe {
            env::remove_var("E2E_MONGO_IMAGE");
            env::remove_var("E2E_MONGO_TAG");
            env::remove_var("E2E_READY_MAX_ELAPSED_SECONDS");
            env::remove_var("E2E_LOG_LEVEL");
        }
        let config = load_from_env();
        assert_eq!(config.mongo.image, "mongo");
        assert_eq!(config.mongo.tag, "latest");
        assert_eq!(config.readiness.max_elapsed_seconds, 60);
        assert_eq!(config.observability.logging_level, "info");
    }

    #[test]
    #[serial]
    fn test_load_from_env_overrides() {
        unsafe {
            env::set_var("E2E_MONGO_TAG", "7.0");
            env::set_var("E2E_MONGO_PORT", "27018");
            env::set_var("E2E_READY_MAX_ELAPSED_SECONDS", "5");
        }

        let config = load_from_env();
        assert_eq!(config.mongo.tag, "7.0");
        assert_eq!(config.mongo.port, 27018);
        assert_eq!(config.readiness.max_elapsed_seconds, 5);

        unsafe {
            env::remove_var("E2E_MONGO_TAG");
            env::remove_var("E2E_MONGO_PORT");
            env::remove_var("E2E_READY_MAX_ELAPSED_SECONDS");
        }
    }

    #[test]
    #[serial]
    fn test_unparseable_value_keeps_base() {
        unsafe {
            env::set_var("E2E_MONGO_PORT", "not_a_port");
        }
        let config = load_from_env();
        assert_eq!(config.mongo.port, 27017);
        unsafe {
            env::remove_var("E2E_MONGO_PORT");
        }
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[mongo]\ntag = \"6.0\"\nusername = \"root\"\n\n[readiness]\nmax_elapsed_seconds = 30"
        )
        .unwrap();

        unsafe {
            env::set_var(CONFIG_FILE_ENV, file.path());
            env::set_var("E2E_MONGO_TAG", "7.0");
        }

        let config = load().unwrap();
        assert_eq!(config.mongo.tag, "7.0");
        assert_eq!(config.mongo.username, "root");
        assert_eq!(config.readiness.max_elapsed_seconds, 30);

        unsafe {
            env::remove_var(CONFIG_FILE_ENV);
            env::remove_var("E2E_MONGO_TAG");
        }
    }

    #[test]
    #[serial]
    fn test_load_rejects_invalid_merged_config() {
        unsafe {
            env::set_var("E2E_MONGO_PASSWORD", "p@ss");
        }
        let result = load();
        assert!(matches!(result, Err(HarnessError::Configuration { .. })));
        unsafe {
            env::remove_var("E2E_MONGO_PASSWORD");
        }
    }

    #[test]
    #[serial]
    fn test_load_missing_file_is_configuration_error() {
        unsafe {
            env::set_var(CONFIG_FILE_ENV, "/nonexistent/harness.toml");
        }
        let result = load();
        assert!(matches!(result, Err(HarnessError::Configuration { .. })));
        unsafe {
            env::remove_var(CONFIG_FILE_ENV);
        }
    }

    #[test]
    fn test_parse_env_missing() {
        let result: Result<u32, _> = parse_env("E2E_NONEXISTENT_VAR");
        assert!(result.is_err());
    }
}
