//! Orchestration backend seam.
//!
//! The lifecycle controller only needs four things from a container backend:
//! start an instance, find where it is reachable from the host, remove it,
//! and a backoff budget for polling it until it is ready.

use async_trait::async_trait;
use config::{MongoConfig, ReadinessConfig};
use errors::HarnessError;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_retry::strategy::ExponentialBackoff;

/// What to start: image, startup environment and the port to map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub image: String,
    pub tag: String,
    pub env: Vec<(String, String)>,
    pub port: u16,
    pub startup_timeout: Duration
}

impl ContainerSpec {
    pub fn mongo(config: &MongoConfig) -> Self {
        Self {
            image: config.image.clone(),
            tag: config.tag.clone(),
            env: config.init_env(),
            port: config.port,
            startup_timeout: config.startup_timeout()
        }
    }
}

/// Host-side address of a mapped container port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[async_trait]
pub trait Orchestrator: Send + Sync {
    type Instance: Send + Sync;

    async fn run(&self, spec: &ContainerSpec) -> Result<Self::Instance, HarnessError>;

    /// Resolve the host endpoint for `internal_port`. Ports are assigned
    /// dynamically, so this is only known after the instance exists.
    async fn endpoint(
        &self,
        instance: &Self::Instance,
        internal_port: u16
    ) -> Result<Endpoint, HarnessError>;

    async fn purge(&self, instance: Self::Instance) -> Result<(), HarnessError>;

    fn instance_id(&self, instance: &Self::Instance) -> String;

    fn retry_policy(&self) -> &RetryPolicy;
}

/// Bounded exponential backoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub max_elapsed: Duration
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&ReadinessConfig::default())
    }
}

impl From<&ReadinessConfig> for RetryPolicy {
    fn from(config: &ReadinessConfig) -> Self {
        Self {
            initial_interval: config.initial_interval(),
            max_interval: config.max_interval(),
            max_elapsed: config.max_elapsed()
        }
    }
}

impl RetryPolicy {
    /// Delays between attempts: the initial interval, doubling up to the cap.
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        let initial_ms = self.initial_interval.as_millis() as u64;
        std::iter::once(self.initial_interval.min(self.max_interval)).chain(
            ExponentialBackoff::from_millis(2)
                .factor(initial_ms.max(1))
                .max_delay(self.max_interval)
        )
    }
}

/// The retry budget ran out; carries the error of the final attempt.
#[derive(Debug)]
pub struct Exhausted<E> {
    pub attempts: u32,
    pub elapsed: Duration,
    pub last_error: E
}

/// Run `operation` until it succeeds or the next delay would overrun
/// `policy.max_elapsed`.
pub async fn retry<F, Fut, T, E>(policy: &RetryPolicy, mut operation: F) -> Result<T, Exhausted<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display
{
    let started = Instant::now();
    let mut delays = policy.delays();
    let mut attempts = 0;

    loop {
        attempts += 1;
        match operation().await {
            Ok(value) => {
                tracing::debug!(
                    attempts,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Retry succeeded"
                );
                return Ok(value);
            }
            Err(e) => {
                let elapsed = started.elapsed();
                match delays.next() {
                    Some(delay) if elapsed + delay <= policy.max_elapsed => {
                        tracing::debug!(
                            attempt = attempts,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "Attempt failed, backing off"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    _ => {
                        return Err(Exhausted {
                            attempts,
                            elapsed,
                            last_error: e
                        });
                    }
                }
            }
        }
    }
}
