//! Retry notification hook.

/// Owner of deferred client requests.
///
/// Whenever the manager frees objects (unlock, abort, reset) it calls
/// [`execute_queued_events`](EventExecutor::execute_queued_events) once, so
/// requests that were answered with `Delayed` can be driven through
/// `store_object` again. The manager is still mutably borrowed during the
/// call; implementations should only schedule the re-drive.
pub trait EventExecutor: Send + Sync {
    /// Re-drives queued requests that were deferred.
    fn execute_queued_events(&self);
}

impl<F> EventExecutor for F
where
    F: Fn() + Send + Sync,
{
    fn execute_queued_events(&self) {
        self()
    }
}

/// An executor that ignores notifications.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopExecutor;

impl EventExecutor for NoopExecutor {
    fn execute_queued_events(&self) {}
}
