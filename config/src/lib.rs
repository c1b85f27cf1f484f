//! # Harness Configuration
//!
//! Configuration for the end-to-end test harness.
//!
//! This crate provides:
//! - Configuration structures for the MongoDB container, the readiness poll
//!   and logging
//! - Environment variable loading (`E2E_*`)
//! - Configuration file loading (TOML/YAML)
//! - Configuration precedence (env > file > defaults)
//! - Configuration validation

pub mod config;
pub mod file_loader;
pub mod loader;
pub mod validation;

pub use config::{HarnessConfig, MongoConfig, ObservabilityConfig, ReadinessConfig};
pub use file_loader::{ConfigFileError, load_from_file, load_from_toml, load_from_yaml};
pub use loader::{CONFIG_FILE_ENV, apply_env, load, load_from_env};
pub use validation::validate;
