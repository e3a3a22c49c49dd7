//! Spawning of background work that must not block the render thread.

use tracing::debug;

use crate::spawn;

/// Run `f` on a worker. Callers must be inside a tokio runtime; nothing ever
/// joins the worker, progress is observed through whatever channel `f`
/// writes to.
pub fn perform_work<F>(f: F)
where
    F: FnOnce() + Send + 'static,
{
    spawn! {async {
        debug!("Starting background task");
        f();
    }}
}

/// Spawn an async task on the runtime.
#[macro_export]
macro_rules! spawn {
    ($task:expr) => {
        tokio::spawn($task);
    };
}
