//! Per-invocation context carried through the processing chain.

use crate::logging::FunctionLogger;
use crate::runtime::server::HostRequest;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::time::Instant;

/// Why an invocation's lifetime was cut short.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextError {
    /// The connecting peer went away or the invocation was abandoned.
    Canceled,
    /// The invocation deadline elapsed.
    DeadlineExceeded,
}

impl std::fmt::Display for ContextError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContextError::Canceled => f.write_str("context canceled"),
            ContextError::DeadlineExceeded => f.write_str("deadline exceeded"),
        }
    }
}

impl std::error::Error for ContextError {}

const ACTIVE: u8 = 0;
const CANCELED: u8 = 1;
const DEADLINE: u8 = 2;

struct CancelState {
    state: AtomicU8,
    notify: Notify,
}

/// Ambient values of one invocation: the connecting host request, the
/// scoped logger, the deadline and the cancellation state.
///
/// Passed by reference through every layer instead of being smuggled
/// through task-local storage. One context per invocation, never
/// shared across invocations.
pub struct InvocationContext {
    host_request: Option<Arc<HostRequest>>,
    logger: Option<FunctionLogger>,
    deadline: Instant,
    cancel: CancelState,
}

impl InvocationContext {
    /// Create a context with the given deadline and nothing attached.
    pub fn new(deadline: Instant) -> Self {
        Self {
            host_request: None,
            logger: None,
            deadline,
            cancel: CancelState {
                state: AtomicU8::new(ACTIVE),
                notify: Notify::new(),
            },
        }
    }

    pub(crate) fn with_host_request(mut self, request: Arc<HostRequest>) -> Self {
        self.host_request = Some(request);
        self
    }

    pub(crate) fn with_logger(mut self, logger: FunctionLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// The original connecting request from the host.
    ///
    /// Panics when queried before the bridge attached it; asking for it
    /// outside an invocation is a programming error, not a recoverable
    /// condition.
    pub fn host_request(&self) -> &HostRequest {
        match &self.host_request {
            Some(request) => request,
            None => panic!("invocation context has no host request attached"),
        }
    }

    /// The scoped logger of this invocation.
    ///
    /// Panics when queried before the bridge attached it.
    pub fn logger(&self) -> &FunctionLogger {
        match &self.logger {
            Some(logger) => logger,
            None => panic!("invocation context has no logger attached"),
        }
    }

    /// Deadline by which the invocation must settle.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Why the invocation was cut short, if it was.
    pub fn err(&self) -> Option<ContextError> {
        match self.cancel.state.load(Ordering::Acquire) {
            CANCELED => Some(ContextError::Canceled),
            DEADLINE => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Cancel the invocation. Idempotent; the first cause to land
    /// sticks.
    pub fn cancel(&self) {
        self.cancel_with(CANCELED);
    }

    pub(crate) fn mark_deadline_exceeded(&self) {
        self.cancel_with(DEADLINE);
    }

    fn cancel_with(&self, cause: u8) {
        if self
            .cancel
            .state
            .compare_exchange(ACTIVE, cause, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.cancel.notify.notify_waiters();
        }
    }

    /// Resolve when the invocation is canceled or its deadline passes,
    /// whichever comes first. Handler code awaits this to abort long
    /// work cooperatively.
    pub async fn cancelled(&self) {
        let notified = self.cancel.notify.notified();
        tokio::pin!(notified);
        // Register interest before checking state so a cancellation
        // landing in between is not lost.
        notified.as_mut().enable();
        if self.err().is_some() {
            return;
        }
        tokio::select! {
            _ = notified => {}
            _ = tokio::time::sleep_until(self.deadline) => {
                self.mark_deadline_exceeded();
            }
        }
    }
}

/// Cancels the context when dropped. Guards an invocation future so
/// that abandoning it mid-flight cancels the handler's context.
pub(crate) struct CancelGuard {
    ctx: Arc<InvocationContext>,
}

impl CancelGuard {
    pub(crate) fn new(ctx: Arc<InvocationContext>) -> Self {
        Self { ctx }
    }
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        self.ctx.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn context() -> InvocationContext {
        InvocationContext::new(Instant::now() + Duration::from_secs(600))
    }

    #[tokio::test]
    #[should_panic(expected = "no host request")]
    async fn test_host_request_panics_when_unpopulated() {
        context().host_request();
    }

    #[tokio::test]
    #[should_panic(expected = "no logger")]
    async fn test_logger_panics_when_unpopulated() {
        context().logger();
    }

    #[tokio::test]
    async fn test_cancel_sets_err() {
        let ctx = context();
        assert_eq!(ctx.err(), None);
        ctx.cancel();
        assert_eq!(ctx.err(), Some(ContextError::Canceled));
    }

    #[tokio::test]
    async fn test_first_cancellation_cause_sticks() {
        let ctx = context();
        ctx.mark_deadline_exceeded();
        ctx.cancel();
        assert_eq!(ctx.err(), Some(ContextError::DeadlineExceeded));
    }

    #[tokio::test]
    async fn test_cancelled_resolves_after_cancel() {
        let ctx = Arc::new(context());
        let waiter = {
            let ctx = ctx.clone();
            tokio::spawn(async move { ctx.cancelled().await })
        };
        tokio::task::yield_now().await;
        ctx.cancel();
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_resolves_when_already_cancelled() {
        let ctx = context();
        ctx.cancel();
        ctx.cancelled().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_resolves_at_deadline() {
        let ctx = InvocationContext::new(Instant::now() + Duration::from_secs(5));
        ctx.cancelled().await;
        assert_eq!(ctx.err(), Some(ContextError::DeadlineExceeded));
    }

    #[tokio::test]
    async fn test_guard_cancels_on_drop() {
        let ctx = Arc::new(context());
        {
            let _guard = CancelGuard::new(ctx.clone());
        }
        assert_eq!(ctx.err(), Some(ContextError::Canceled));
    }
}
