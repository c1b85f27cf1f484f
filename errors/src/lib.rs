//! # Harness Errors
//!
//! Error handling for the end-to-end test harness.
//!
//! Errors fall into two tiers:
//! - fatal: the environment the suite needs could not be established or
//!   released, so the process aborts after teardown
//! - contained: a single test or probe attempt went wrong and is reported
//!   without stopping the run

use thiserror::Error;

/// Errors raised by the test lifecycle controller and its helpers.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("Could not connect to container backend: {reason}")]
    BackendUnavailable { reason: String },

    #[error("Could not start {image}:{tag} container: {reason}")]
    StartFailed {
        image: String,
        tag: String,
        reason: String
    },

    #[error("Could not resolve mapped port {port} of container {container}: {reason}")]
    EndpointUnavailable {
        container: String,
        port: u16,
        reason: String
    },

    #[error("Readiness probe failed: {reason}")]
    ProbeFailed { reason: String },

    #[error("Could not connect to {service} after {attempts} attempts in {elapsed_ms}ms: {reason}")]
    NotReady {
        service: String,
        attempts: u32,
        elapsed_ms: u64,
        reason: String
    },

    #[error("Could not purge container {container}: {reason}")]
    PurgeFailed { container: String, reason: String },

    #[error("Teardown failed for {} container(s): {}", .failures.len(), .failures.join("; "))]
    TeardownFailed { failures: Vec<String> },

    #[error("Recovered from panic: {message}")]
    Panicked { message: String, backtrace: String },

    #[error("Test failed: {reason}")]
    TestFailed { reason: String },

    #[error("Operation exceeded deadline of {timeout_ms}ms")]
    DeadlineExceeded { timeout_ms: u64 },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid lifecycle transition: {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String }
}

impl HarnessError {
    /// Whether the error means the run cannot continue and the process must
    /// abort once teardown has finished.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::BackendUnavailable { .. }
                | Self::StartFailed { .. }
                | Self::EndpointUnavailable { .. }
                | Self::NotReady { .. }
                | Self::TeardownFailed { .. }
                | Self::InvalidTransition { .. }
                | Self::Configuration { .. }
        )
    }
}
