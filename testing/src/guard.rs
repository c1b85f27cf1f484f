//! Panic containment.
//!
//! A panic unwinding out of a test body, out of setup, or out of a single
//! release during teardown is turned into a value at a fixed boundary so the
//! rest of the run, and in particular teardown, still happens.

use errors::HarnessError;
use futures_util::FutureExt;
use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Once;

thread_local! {
    static LAST_BACKTRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

/// Chain a hook that records a backtrace for the panicking thread in front of
/// the existing one. Idempotent.
pub fn install_panic_hook() {
    HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let backtrace = Backtrace::force_capture().to_string();
            LAST_BACKTRACE.with(|slot| *slot.borrow_mut() = Some(backtrace));
            previous(info);
        }));
    });
}

/// A caught panic: its message and the stack at the point it was raised.
#[derive(Debug, Clone)]
pub struct Fault {
    pub message: String,
    pub backtrace: String
}

impl Fault {
    fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };

        let backtrace = LAST_BACKTRACE
            .with(|slot| slot.borrow_mut().take())
            .unwrap_or_else(|| "<backtrace unavailable>".to_string());

        Self { message, backtrace }
    }

    pub fn log(&self, context: &str) {
        tracing::error!(
            "{}: recovered from panic: {}\n{}",
            context,
            self.message,
            self.backtrace
        );
    }

    pub fn to_error(&self) -> HarnessError {
        HarnessError::Panicked {
            message: self.message.clone(),
            backtrace: self.backtrace.clone()
        }
    }
}

/// Poll `future` to completion, catching a panic raised while polling it.
pub async fn catch<F: Future>(future: F) -> Result<F::Output, Fault> {
    install_panic_hook();
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .map_err(Fault::from_payload)
}

/// Run a test body, turning a panic or an `Err` into a failed-test result.
///
/// ```rust,no_run
/// use testing::guard::panic_guard;
///
/// # async fn example() {
/// let result = panic_guard("inserts_document", async {
///     assert_eq!(1 + 1, 2);
///     Ok(())
/// })
/// .await;
/// assert!(result.is_ok());
/// # }
/// ```
pub async fn panic_guard<F, T>(name: &str, future: F) -> Result<T, HarnessError>
where
    F: Future<Output = anyhow::Result<T>>
{
    match catch(future).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            tracing::warn!(test = name, "Test failed: {:#}", e);
            Err(HarnessError::TestFailed {
                reason: format!("{:#}", e)
            })
        }
        Err(fault) => {
            fault.log(name);
            Err(fault.to_error())
        }
    }
}
