//! Tokio runtime spawner for processor tasks.

use std::future::Future;
use std::sync::Arc;

use tokio::runtime::{Builder, Handle, Runtime};
use tracing::Instrument;

use crate::core::Spawn;

/// Runs processors as tokio tasks, inside the span active at dispatch.
#[derive(Clone)]
pub struct TokioSpawner {
    handle: Handle,
    // Dropping the last clone shuts an owned runtime down.
    owned: Option<Arc<OwnedRuntime>>,
}

/// Runtime owned by a spawner.
///
/// The last spawner clone usually lives inside the scheduler, which a
/// finishing processor task may drop from one of this runtime's own workers.
/// Tokio refuses a blocking shutdown from async context, so there the
/// runtime shuts down in the background instead.
struct OwnedRuntime(Option<Runtime>);

impl Drop for OwnedRuntime {
    fn drop(&mut self) {
        let Some(runtime) = self.0.take() else {
            return;
        };
        if Handle::try_current().is_ok() {
            runtime.shutdown_background();
        } else {
            drop(runtime);
        }
    }
}

impl std::fmt::Debug for TokioSpawner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokioSpawner")
            .field("owns_runtime", &self.owned.is_some())
            .finish()
    }
}

impl TokioSpawner {
    /// Spawn onto the runtime behind `handle`.
    pub const fn new(handle: Handle) -> Self {
        Self {
            handle,
            owned: None,
        }
    }

    /// Spawner for the runtime the caller is running on.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    /// Dedicated multi-threaded runtime for processors, kept alive as long as
    /// any clone of the spawner exists.
    pub fn with_worker_threads(worker_threads: usize) -> Result<Self, std::io::Error> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(worker_threads)
            .thread_name("job-processor")
            .enable_all()
            .build()?;
        Ok(Self {
            handle: runtime.handle().clone(),
            owned: Some(Arc::new(OwnedRuntime(Some(runtime)))),
        })
    }
}

impl Spawn for TokioSpawner {
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handle.spawn(fut.in_current_span());
    }
}
