//! # Test Session
//!
//! The lifecycle controller's state for one test process: the backend
//! handle, every instance started through it, the published connection
//! descriptor and the run outcome.
//!
//! ```text
//! Uninitialized -> Provisioning -> Probing -> Ready -> Running -> TearingDown -> Exited
//!                       |             |         |                    ^
//!                       +-------------+---------+--------------------+
//! ```
//!
//! Setup failures jump straight to `TearingDown` with a fatal error recorded.
//! [`Session::teardown`] consumes the session, so it runs at most once.

use crate::descriptor::{CONNECTION_URI_ENV, ConfigSink, ConnectionDescriptor};
use crate::guard::{Fault, catch};
use crate::orchestrator::{ContainerSpec, Orchestrator, retry};
use crate::probe::ReadinessProbe;
use crate::suite::Suite;
use config::HarnessConfig;
use errors::HarnessError;
use std::fmt;
use std::future::Future;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Provisioning,
    Probing,
    Ready,
    Running,
    TearingDown,
    Exited
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Provisioning => "provisioning",
            Self::Probing => "probing",
            Self::Ready => "ready",
            Self::Running => "running",
            Self::TearingDown => "tearing_down",
            Self::Exited => "exited"
        };
        f.write_str(name)
    }
}

impl Phase {
    pub fn can_transition_to(self, next: Phase) -> bool {
        use Phase::*;
        match (self, next) {
            (Uninitialized, Provisioning)
            | (Provisioning, Probing)
            | (Probing, Ready)
            | (Ready, Running)
            | (TearingDown, Exited) => true,
            (TearingDown | Exited, TearingDown) => false,
            (_, TearingDown) => true,
            _ => false
        }
    }

    fn advance(self, next: Phase) -> Result<Phase, HarnessError> {
        if !self.can_transition_to(next) {
            return Err(HarnessError::InvalidTransition {
                from: self.to_string(),
                to: next.to_string()
            });
        }
        tracing::debug!(from = %self, to = %next, "Lifecycle transition");
        Ok(next)
    }
}

/// How the process should end once teardown is done.
#[derive(Debug)]
pub enum Termination {
    Exit(i32),
    Abort(HarnessError)
}

impl Termination {
    /// Terminate the process. Nothing runs after this.
    pub fn exit(self) -> ! {
        match self {
            Self::Exit(code) => {
                tracing::info!(code, "Exiting test run");
                std::process::exit(code)
            }
            Self::Abort(err) => {
                tracing::error!(error = %err, "Aborting test run");
                panic!("{}", err)
            }
        }
    }
}

pub struct Session<O: Orchestrator> {
    config: HarnessConfig,
    orchestrator: Option<O>,
    resources: Vec<O::Instance>,
    descriptor: Option<ConnectionDescriptor>,
    phase: Phase,
    code: i32,
    fatal: Option<HarnessError>,
    fault: Option<Fault>
}

impl<O: Orchestrator> Session<O> {
    pub fn new(config: HarnessConfig) -> Self {
        Self {
            config,
            orchestrator: None,
            resources: Vec::new(),
            descriptor: None,
            phase: Phase::Uninitialized,
            code: 0,
            fatal: None,
            fault: None
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn descriptor(&self) -> Option<&ConnectionDescriptor> {
        self.descriptor.as_ref()
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    /// Connect to the backend, start MongoDB, publish its URI and poll it
    /// until the primary answers a ping.
    ///
    /// The started instance is recorded before anything else can fail, so
    /// teardown releases it even when a later step errors or panics.
    pub async fn setup<C, Fut, P>(
        &mut self,
        connect: C,
        probe: &P,
        sink: &dyn ConfigSink
    ) -> Result<(), HarnessError>
    where
        C: FnOnce(HarnessConfig) -> Fut,
        Fut: Future<Output = Result<O, HarnessError>>,
        P: ReadinessProbe + ?Sized
    {
        self.phase = self.phase.advance(Phase::Provisioning)?;

        let orchestrator = connect(self.config.clone()).await?;
        let orchestrator = self.orchestrator.insert(orchestrator);

        let spec = ContainerSpec::mongo(&self.config.mongo);
        let instance = orchestrator.run(&spec).await?;
        let container = orchestrator.instance_id(&instance);
        self.resources.push(instance);

        let endpoint = match self.resources.last() {
            Some(instance) => orchestrator.endpoint(instance, spec.port).await?,
            None => {
                return Err(HarnessError::EndpointUnavailable {
                    container,
                    port: spec.port,
                    reason: "instance not recorded".to_string()
                });
            }
        };

        let descriptor = ConnectionDescriptor::new(&self.config.mongo, &endpoint);
        sink.publish(CONNECTION_URI_ENV, &descriptor.uri());
        tracing::info!(
            container = %container,
            "Published {}={}",
            CONNECTION_URI_ENV,
            descriptor.redacted()
        );
        let uri = descriptor.uri();
        self.descriptor = Some(descriptor);

        self.phase = self.phase.advance(Phase::Probing)?;
        let orchestrator = self
            .orchestrator
            .as_ref()
            .ok_or_else(|| HarnessError::BackendUnavailable {
                reason: "backend handle missing after connect".to_string()
            })?;

        retry(orchestrator.retry_policy(), || probe.probe(&uri))
            .await
            .map_err(|exhausted| HarnessError::NotReady {
                service: format!("{}:{}", spec.image, spec.tag),
                attempts: exhausted.attempts,
                elapsed_ms: exhausted.elapsed.as_millis() as u64,
                reason: exhausted.last_error.to_string()
            })?;

        self.phase = self.phase.advance(Phase::Ready)?;
        tracing::info!(container = %container, "MongoDB is ready");
        Ok(())
    }

    /// Run the suite and record its status code.
    pub async fn run(&mut self, suite: &Suite) -> Result<i32, HarnessError> {
        self.phase = self.phase.advance(Phase::Running)?;
        let report = suite.run().await;
        self.code = report.exit_code();
        Ok(self.code)
    }

    /// Record a fatal error; the run aborts after teardown. The first one
    /// wins.
    pub fn abort(&mut self, err: HarnessError) {
        tracing::error!(phase = %self.phase, error = %err, "Fatal harness error");
        if self.fatal.is_none() {
            self.fatal = Some(err);
        }
    }

    /// Record a panic caught outside any test body.
    pub fn recover(&mut self, fault: Fault) {
        self.fault = Some(fault);
    }

    /// Release everything and decide how the process ends.
    ///
    /// Every recorded instance is purged in creation order. A failed or
    /// panicking release does not stop the others; any failure turns the
    /// result into an abort.
    pub async fn teardown(mut self) -> Termination {
        self.phase = Phase::TearingDown;
        tracing::info!("Tearing down tests");

        if let Some(fault) = self.fault.take() {
            fault.log("teardown");
            if self.code == 0 {
                self.code = 1;
            }
        }

        let mut failures = Vec::new();
        if let Some(orchestrator) = &self.orchestrator {
            for instance in self.resources.drain(..) {
                let container = orchestrator.instance_id(&instance);
                match catch(orchestrator.purge(instance)).await {
                    Ok(Ok(())) => tracing::info!(container = %container, "Purged container"),
                    Ok(Err(e)) => {
                        tracing::error!(container = %container, error = %e, "Could not purge container");
                        failures.push(format!("{}: {}", container, e));
                    }
                    Err(fault) => {
                        fault.log(&format!("purge {}", container));
                        failures.push(format!("{}: panicked: {}", container, fault.message));
                    }
                }
            }
        }

        self.phase = Phase::Exited;

        match self.fatal.take() {
            Some(err) => {
                if !failures.is_empty() {
                    tracing::error!(
                        "Teardown also failed after a fatal error: {}",
                        failures.join("; ")
                    );
                }
                Termination::Abort(err)
            }
            None if !failures.is_empty() => {
                Termination::Abort(HarnessError::TeardownFailed { failures })
            }
            None => Termination::Exit(self.code)
        }
    }
}
