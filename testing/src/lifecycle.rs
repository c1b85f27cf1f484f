//! # Test Lifecycle
//!
//! Entry point for a `harness = false` test target:
//!
//! ```rust,no_run
//! use testing::suite::Suite;
//!
//! fn main() {
//!     let suite = Suite::from_args().trial("ping", || async { Ok(()) });
//!     testing::lifecycle::main(suite)
//! }
//! ```
//!
//! Setup, the suite and teardown run strictly in sequence. Teardown always
//! runs, whatever happened before it, and the process exits only after it.

use crate::descriptor::{ConfigSink, ProcessEnv};
use crate::docker::DockerOrchestrator;
use crate::guard::{self, catch};
use crate::logging::init_tracing;
use crate::orchestrator::Orchestrator;
use crate::probe::{MongoProbe, ReadinessProbe};
use crate::session::{Session, Termination};
use crate::suite::Suite;
use config::HarnessConfig;
use errors::HarnessError;
use std::future::Future;

/// Drive one full session and return how the process should end.
pub async fn run<O, C, Fut, P>(
    config: HarnessConfig,
    connect: C,
    probe: &P,
    sink: &dyn ConfigSink,
    suite: &Suite
) -> Termination
where
    O: Orchestrator,
    C: FnOnce(HarnessConfig) -> Fut,
    Fut: Future<Output = Result<O, HarnessError>>,
    P: ReadinessProbe + ?Sized
{
    let mut session = Session::<O>::new(config);

    tracing::info!("Setting up tests");
    match catch(session.setup(connect, probe, sink)).await {
        Ok(Ok(())) => {
            tracing::info!("Running tests");
            match catch(session.run(suite)).await {
                Ok(Ok(code)) => tracing::info!(code, "Test suite finished"),
                Ok(Err(err)) => session.abort(err),
                Err(fault) => session.recover(fault)
            }
        }
        Ok(Err(err)) => session.abort(err),
        Err(fault) => {
            session.abort(fault.to_error());
            session.recover(fault);
        }
    }

    session.teardown().await
}

/// Answer `--list`, or a filter that selects no trial, without touching the
/// container backend.
pub fn preflight(suite: &Suite) -> Option<Termination> {
    if suite.is_listing() {
        suite.print_list();
        return Some(Termination::Exit(0));
    }
    if suite.selected_count() == 0 {
        tracing::info!("No tests selected, skipping MongoDB setup");
        return Some(Termination::Exit(suite.report_unselected().exit_code()));
    }
    None
}

/// Load configuration, provision MongoDB in Docker, run `suite`, tear down
/// and exit with the suite's status.
pub fn main(suite: Suite) -> ! {
    guard::install_panic_hook();

    let config = config::load();
    let level = config
        .as_ref()
        .map(|c| c.observability.logging_level.clone())
        .unwrap_or_else(|_| "info".to_string());
    if !suite.is_listing() {
        init_tracing(&level);
    }

    if let Some(termination) = preflight(&suite) {
        termination.exit()
    }

    let config = match config {
        Ok(config) => config,
        Err(err) => Termination::Abort(err).exit()
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => Termination::Abort(HarnessError::Configuration {
            message: format!("could not build Tokio runtime: {}", e)
        })
        .exit()
    };

    let probe = MongoProbe::new(config.readiness.attempt_timeout());
    let termination = runtime.block_on(run(
        config,
        DockerOrchestrator::connect,
        &probe,
        &ProcessEnv,
        &suite
    ));

    termination.exit()
}
