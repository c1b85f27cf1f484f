//! # Configuration Structures
//!
//! All configuration structures:
//! - Use `serde` for serialization/deserialization
//! - Use `validator` for input validation
//! - Fall back to a field-level default when a value is missing from a file

use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

/// Top-level configuration for the test harness.
///
/// ## Usage
/// ```rust,no_run
/// use config::HarnessConfig;
///
/// let config = HarnessConfig::default();
/// assert_eq!(config.mongo.image, "mongo");
/// ```
///
/// ## Fields
/// - `mongo`: the container to provision and the credentials it starts with
/// - `readiness`: backoff budget for the readiness poll
/// - `observability`: logging level
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default, PartialEq)]
pub struct HarnessConfig {
    #[serde(default)]
    #[validate(nested)]
    pub mongo: MongoConfig,

    #[serde(default)]
    #[validate(nested)]
    pub readiness: ReadinessConfig,

    #[serde(default)]
    #[validate(nested)]
    pub observability: ObservabilityConfig
}

/// MongoDB container configuration.
///
/// ## Fields
/// - `image`: image name (default: "mongo")
/// - `tag`: image tag (default: "latest")
/// - `username`: root user created at init (default: "mongo")
/// - `password`: root password created at init (default: "mongo")
/// - `database`: database named in the connection URI (default: "mongo")
/// - `auth_source`: database the credentials live in (default: "admin")
/// - `port`: container-internal port (default: 27017)
/// - `startup_timeout_seconds`: how long the backend may take to start the
///   container (default: 120)
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct MongoConfig {
    #[serde(default = "default_mongo_image")]
    #[validate(length(min = 1, max = 255))]
    pub image: String,

    #[serde(default = "default_mongo_tag")]
    #[validate(length(min = 1, max = 128))]
    pub tag: String,

    #[serde(default = "default_mongo_username")]
    #[validate(length(min = 1, max = 63), custom(function = "validate_credential"))]
    pub username: String,

    #[serde(default = "default_mongo_password")]
    #[validate(length(min = 1), custom(function = "validate_credential"))]
    pub password: String,

    #[serde(default = "default_mongo_database")]
    #[validate(length(min = 1, max = 63), custom(function = "validate_credential"))]
    pub database: String,

    #[serde(default = "default_mongo_auth_source")]
    #[validate(length(min = 1, max = 63), custom(function = "validate_credential"))]
    pub auth_source: String,

    #[serde(default = "default_mongo_port")]
    #[validate(range(min = 1, max = 65535))]
    pub port: u16,

    #[serde(default = "default_mongo_startup_timeout")]
    #[validate(range(min = 1, max = 600))]
    pub startup_timeout_seconds: u64
}

fn default_mongo_image() -> String {
    "mongo".to_string()
}

fn default_mongo_tag() -> String {
    "latest".to_string()
}

fn default_mongo_username() -> String {
    "mongo".to_string()
}

fn default_mongo_password() -> String {
    "mongo".to_string()
}

fn default_mongo_database() -> String {
    "mongo".to_string()
}

fn default_mongo_auth_source() -> String {
    "admin".to_string()
}

fn default_mongo_port() -> u16 {
    27017
}

fn default_mongo_startup_timeout() -> u64 {
    120
}

// Values end up verbatim in the connection URI.
fn validate_credential(value: &str) -> Result<(), validator::ValidationError> {
    if value.contains([':', '@', '/', '?', '#']) {
        return Err(validator::ValidationError::new(
            "URI reserved characters are not allowed"
        ));
    }
    Ok(())
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            image: default_mongo_image(),
            tag: default_mongo_tag(),
            username: default_mongo_username(),
            password: default_mongo_password(),
            database: default_mongo_database(),
            auth_source: default_mongo_auth_source(),
            port: default_mongo_port(),
            startup_timeout_seconds: default_mongo_startup_timeout()
        }
    }
}

impl MongoConfig {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_seconds)
    }

    /// Environment the container is started with.
    pub fn init_env(&self) -> Vec<(String, String)> {
        vec![
            (
                "MONGO_INITDB_ROOT_USERNAME".to_string(),
                self.username.clone()
            ),
            (
                "MONGO_INITDB_ROOT_PASSWORD".to_string(),
                self.password.clone()
            ),
        ]
    }
}

/// Backoff budget for the readiness poll.
///
/// The interval starts at `initial_interval_ms`, doubles after every failed
/// attempt up to `max_interval_ms`, and the poll gives up once
/// `max_elapsed_seconds` would be exceeded. Each attempt is itself bounded by
/// `attempt_timeout_ms`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
#[validate(schema(function = "validate_intervals"))]
pub struct ReadinessConfig {
    #[serde(default = "default_initial_interval_ms")]
    #[validate(range(min = 1, max = 60000))]
    pub initial_interval_ms: u64,

    #[serde(default = "default_max_interval_ms")]
    #[validate(range(min = 1, max = 300000))]
    pub max_interval_ms: u64,

    #[serde(default = "default_max_elapsed_seconds")]
    #[validate(range(min = 1, max = 3600))]
    pub max_elapsed_seconds: u64,

    #[serde(default = "default_attempt_timeout_ms")]
    #[validate(range(min = 1, max = 60000))]
    pub attempt_timeout_ms: u64
}

fn default_initial_interval_ms() -> u64 {
    500
}

fn default_max_interval_ms() -> u64 {
    5000
}

fn default_max_elapsed_seconds() -> u64 {
    60
}

fn default_attempt_timeout_ms() -> u64 {
    2000
}

fn validate_intervals(config: &ReadinessConfig) -> Result<(), validator::ValidationError> {
    if config.max_interval_ms < config.initial_interval_ms {
        return Err(validator::ValidationError::new(
            "max_interval_ms below initial_interval_ms"
        ));
    }
    Ok(())
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            initial_interval_ms: default_initial_interval_ms(),
            max_interval_ms: default_max_interval_ms(),
            max_elapsed_seconds: default_max_elapsed_seconds(),
            attempt_timeout_ms: default_attempt_timeout_ms()
        }
    }
}

impl ReadinessConfig {
    pub fn initial_interval(&self) -> Duration {
        Duration::from_millis(self.initial_interval_ms)
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval_ms)
    }

    pub fn max_elapsed(&self) -> Duration {
        Duration::from_secs(self.max_elapsed_seconds)
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }
}

/// Logging configuration.
///
/// `RUST_LOG`, when set, takes precedence over `logging_level`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct ObservabilityConfig {
    #[serde(default = "default_logging_level")]
    #[validate(custom(function = "validate_logging_level"))]
    pub logging_level: String
}

fn default_logging_level() -> String {
    "info".to_string()
}

fn validate_logging_level(value: &str) -> Result<(), validator::ValidationError> {
    match value {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(validator::ValidationError::new("Invalid logging level"))
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            logging_level: default_logging_level()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mongo_config() {
        let config = MongoConfig::default();
        assert_eq!(config.image, "mongo");
        assert_eq!(config.tag, "latest");
        assert_eq!(config.username, "mongo");
        assert_eq!(config.password, "mongo");
        assert_eq!(config.database, "mongo");
        assert_eq!(config.auth_source, "admin");
        assert_eq!(config.port, 27017);
    }

    #[test]
    fn test_init_env_carries_credentials() {
        let config = MongoConfig::default();
        assert_eq!(
            config.init_env(),
            vec![
                (
                    "MONGO_INITDB_ROOT_USERNAME".to_string(),
                    "mongo".to_string()
                ),
                (
                    "MONGO_INITDB_ROOT_PASSWORD".to_string(),
                    "mongo".to_string()
                ),
            ]
        );
    }

    #[test]
    fn test_readiness_durations() {
        let readiness = ReadinessConfig::default();
        assert_eq!(readiness.initial_interval(), Duration::from_millis(500));
        assert_eq!(readiness.max_interval(), Duration::from_secs(5));
        assert_eq!(readiness.max_elapsed(), Duration::from_secs(60));
        assert_eq!(readiness.attempt_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn test_partial_toml_uses_field_defaults() {
        let config: HarnessConfig = toml::from_str(
            r#"
            [mongo]
            tag = "7.0"
            "#
        )
        .unwrap();
        assert_eq!(config.mongo.tag, "7.0");
        assert_eq!(config.mongo.image, "mongo");
        assert_eq!(config.readiness, ReadinessConfig::default());
    }
}
