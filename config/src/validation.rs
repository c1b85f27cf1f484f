//! # Configuration Validation
//!
//! Validation rules for the harness configuration using the `validator`
//! crate.
//!
//! ## Validation Rules
//! ### MongoDB
//! - `image`: 1-255 characters
//! - `tag`: 1-128 characters
//! - `username`, `database`, `auth_source`: 1-63 characters, no URI reserved
//!   characters
//! - `password`: 1+ characters, no URI reserved characters
//! - `port`: 1-65535
//! - `startup_timeout_seconds`: 1-600
//!
//! ### Readiness
//! - `initial_interval_ms`: 1-60000
//! - `max_interval_ms`: 1-300000, not below `initial_interval_ms`
//! - `max_elapsed_seconds`: 1-3600
//! - `attempt_timeout_ms`: 1-60000
//!
//! ### Observability
//! - `logging_level`: "trace", "debug", "info", "warn" or "error"

use crate::config::HarnessConfig;
use validator::{Validate, ValidationErrors};

pub fn validate(config: &HarnessConfig) -> Result<(), ValidationErrors> {
    config.validate()
}
