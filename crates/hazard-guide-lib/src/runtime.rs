//! Task spawning helpers
//!
//! Background work is spawned through [`spawn`] so every task carries a profiling scope,
//! and [`in_runtime_context`] lets synchronous callers degrade gracefully when no Tokio
//! runtime is driving them.

/// Spawn an async task on the current Tokio runtime.
///
/// Panics if called outside a runtime; check [`in_runtime_context`] first when the
/// caller may be synchronous.
pub fn spawn<F>(future: F) -> tokio::task::JoinHandle<F::Output>
where
    F: std::future::Future + Send + 'static,
    F::Output: Send + 'static,
{
    #[cfg(feature = "profiling")]
    {
        tokio::spawn(async move {
            // Tag the scope with the future type so traces can be filtered by task kind
            profiling::scope!(
                "runtime::spawn",
                format!("task_type={}", std::any::type_name::<F>()).as_str()
            );
            future.await
        })
    }
    #[cfg(not(feature = "profiling"))]
    {
        tokio::spawn(future)
    }
}

/// Run CPU-bound work on the blocking pool
pub fn spawn_blocking<F, R>(f: F) -> tokio::task::JoinHandle<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        profiling::scope!("runtime::spawn_blocking");
        f()
    })
}

/// Check if we're running inside a Tokio runtime context
pub fn in_runtime_context() -> bool {
    tokio::runtime::Handle::try_current().is_ok()
}

/// Recover the guard of a poisoned lock instead of propagating the panic
pub(crate) fn recover<G>(result: std::sync::LockResult<G>) -> G {
    result.unwrap_or_else(|poisoned| {
        tracing::warn!("Lock poisoned; recovering");
        poisoned.into_inner()
    })
}
