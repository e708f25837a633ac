//! Shared Tokio runtime for synchronous callers
//!
//! The template API is async. Callers without a runtime of their own (batch
//! jobs, FFI shims) can drive it on this shared runtime instead.

use orabatch_core::Result;
use parking_lot::Mutex;
use std::sync::OnceLock;
use tokio::runtime::Runtime;

static TOKIO_RUNTIME: OnceLock<Runtime> = OnceLock::new();
static TOKIO_RUNTIME_INIT: Mutex<()> = parking_lot::const_mutex(());

/// Get or create the shared Tokio runtime.
///
/// Only one runtime is ever built, even when several threads ask for it at
/// once. Fails with [`orabatch_core::BatchError::Io`] when the runtime cannot
/// be created.
pub fn get_tokio_runtime() -> Result<&'static Runtime> {
    if let Some(runtime) = TOKIO_RUNTIME.get() {
        return Ok(runtime);
    }
    let _init = TOKIO_RUNTIME_INIT.lock();
    if let Some(runtime) = TOKIO_RUNTIME.get() {
        return Ok(runtime);
    }
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .thread_name("orabatch-runtime")
        .build()?;
    tracing::debug!("created shared Tokio runtime");
    Ok(TOKIO_RUNTIME.get_or_init(|| runtime))
}

/// Run a batch future to completion on the shared runtime.
///
/// Blocks the current thread. Must not be called from within an async
/// context.
///
/// # Example
///
/// ```ignore
/// let counts = block_on_tokio(template.batch_update(sql, &mut binder))?;
/// ```
pub fn block_on_tokio<F, T>(future: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    get_tokio_runtime()?.block_on(future)
}
