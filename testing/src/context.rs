//! Bounded per-test context.

use errors::HarnessError;
use std::future::IntoFuture;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Deadline every test context carries.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// A deadline plus a cancellation token.
///
/// Child tokens from [`TestContext::token`] are cancelled when the deadline
/// passes, when [`TestContext::cancel`] is called, or when the context is
/// dropped, so work handed a token stops with the test that issued it.
pub struct TestContext {
    deadline: Instant,
    timeout: Duration,
    token: CancellationToken
}

/// Context bounded by [`TEST_TIMEOUT`].
///
/// Must be called from within a Tokio runtime for the deadline to cancel
/// outstanding child tokens on its own.
pub fn new_test_context() -> TestContext {
    TestContext::with_timeout(TEST_TIMEOUT)
}

impl TestContext {
    pub fn with_timeout(timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        let token = CancellationToken::new();

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let watcher = token.clone();
            handle.spawn(async move {
                tokio::select! {
                    () = tokio::time::sleep_until(deadline) => watcher.cancel(),
                    () = watcher.cancelled() => {}
                }
            });
        }

        Self {
            deadline,
            timeout,
            token
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn token(&self) -> CancellationToken {
        self.token.child_token()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Drive `future` until it completes, the deadline passes, or the context
    /// is cancelled. On deadline the context is cancelled too.
    pub async fn run<F: IntoFuture>(&self, future: F) -> Result<F::Output, HarnessError> {
        let future = future.into_future();
        tokio::select! {
            biased;
            () = self.token.cancelled() => Err(self.cancelled_error()),
            () = tokio::time::sleep_until(self.deadline) => {
                self.token.cancel();
                Err(self.deadline_error())
            }
            output = future => Ok(output),
        }
    }

    fn cancelled_error(&self) -> HarnessError {
        if Instant::now() >= self.deadline {
            self.deadline_error()
        } else {
            HarnessError::Cancelled
        }
    }

    fn deadline_error(&self) -> HarnessError {
        HarnessError::DeadlineExceeded {
            timeout_ms: self.timeout.as_millis() as u64
        }
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
