//! Fire-and-forget execution of long-running work.
//!
//! Interactive triggers must be acknowledged within a few seconds, while the
//! creation pipeline can take longer. [`AsyncDispatcher::dispatch`] spawns the
//! work onto the runtime and returns at once. The spawned task:
//!
//! - is not tied to the caller's future, so dropping or timing out the caller
//!   does not cancel it
//! - runs inside a span that is a child of the caller's current span, so log
//!   lines keep the request's fields
//! - logs its error instead of returning it
//!
//! There is no ordering between dispatched units.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info_span, warn, Instrument};

#[derive(Clone, Default)]
pub struct AsyncDispatcher {
    limiter: Option<Arc<Semaphore>>,
}

impl AsyncDispatcher {
    /// Dispatcher with no bound on concurrent units.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatcher that runs at most `max_in_flight` units at a time; extra
    /// units wait for a slot inside their own task.
    #[must_use]
    pub fn bounded(max_in_flight: usize) -> Self {
        Self {
            limiter: Some(Arc::new(Semaphore::new(max_in_flight.max(1)))),
        }
    }

    /// Units currently allowed to start without waiting, if bounded.
    #[must_use]
    pub fn available_slots(&self) -> Option<usize> {
        self.limiter.as_ref().map(|l| l.available_permits())
    }

    /// Run `work` in the background.
    ///
    /// The returned handle only needs awaiting in tests; callers normally drop
    /// it. Must be called from within a Tokio runtime.
    pub fn dispatch<F, E>(&self, task: &'static str, work: F) -> JoinHandle<()>
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let span = info_span!("dispatched", task);
        let limiter = self.limiter.clone();

        tokio::spawn(
            async move {
                let _permit = match limiter {
                    Some(limiter) => match limiter.acquire_owned().await {
                        Ok(permit) => Some(permit),
                        Err(e) => {
                            warn!(error = %e, "Dispatch limiter closed, running unbounded");
                            None
                        }
                    },
                    None => None,
                };

                debug!("Dispatched work started");
                match work.await {
                    Ok(()) => debug!("Dispatched work finished"),
                    Err(e) => error!(error = %e, "Dispatched work failed"),
                }
            }
            .instrument(span),
        )
    }
}
