//! End-to-end test harness for MongoDB-backed code.
//!
//! Starts one MongoDB container per test process, publishes its URI as
//! `MONGO_CONNECTION_URI`, waits until the primary answers, runs the suite
//! and removes the container again, whatever the suite did.
//!
//! - [`lifecycle`]: the `main` for `harness = false` test targets
//! - [`session`]: lifecycle state and the setup/run/teardown steps
//! - [`orchestrator`], [`docker`]: the container backend seam and its
//!   testcontainers implementation
//! - [`probe`]: readiness probing
//! - [`guard`], [`context`]: per-test panic containment and deadlines
//! - [`fixtures`]: helpers test bodies use to reach the database

pub mod context;
pub mod descriptor;
pub mod docker;
pub mod fixtures;
pub mod guard;
pub mod lifecycle;
pub mod logging;
pub mod orchestrator;
pub mod probe;
pub mod session;
pub mod suite;

pub use context::{TEST_TIMEOUT, TestContext, new_test_context};
pub use descriptor::{CONNECTION_URI_ENV, ConfigSink, ConnectionDescriptor, ProcessEnv};
pub use fixtures::*;
pub use guard::panic_guard;
pub use session::{Phase, Session, Termination};
pub use suite::{Suite, SuiteReport, Trial};
