//! Background threads driving a single-threaded tokio runtime.

use std::future::Future;
use std::sync::Arc;
use std::thread::JoinHandle;

use ipsocket_core::logging::targets;
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::error::{NetworkError, Result};
use crate::shared::Shared;
use crate::state::TransceiverState;

/// Build the runtime for one background thread.
///
/// Sockets that need a reactor must be created while this runtime is
/// entered (see [`Runtime::enter`]) so they are driven by it.
pub(crate) fn build_runtime() -> Result<Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_io()
        .enable_time()
        .build()
        .map_err(|e| NetworkError::Runtime(e.to_string()))
}

/// A running background thread and the token that stops it.
#[derive(Debug)]
pub(crate) struct Worker {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Run `task` to completion on a new thread.
    ///
    /// If the task returns without having been cancelled, the transceiver
    /// stopped on its own (single-shot client, listener fault) and its state
    /// becomes `Closed`.
    pub(crate) fn spawn<F>(
        name: String,
        runtime: Runtime,
        span: tracing::Span,
        shared: Arc<Shared>,
        cancel: CancellationToken,
        task: F,
    ) -> Result<Self>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = cancel.clone();
        let handle = std::thread::Builder::new()
            .name(name)
            .spawn(move || {
                runtime.block_on(task.instrument(span));
                if !token.is_cancelled() {
                    shared.set_state(TransceiverState::Closed);
                }
            })
            .map_err(|e| NetworkError::Runtime(e.to_string()))?;

        Ok(Self {
            cancel,
            handle: Some(handle),
        })
    }

    /// Whether the thread has already exited.
    pub(crate) fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Cancel the task and wait for the thread to exit.
    ///
    /// Called from a slot running on the worker thread itself, this only
    /// cancels; the thread finishes once the slot returns.
    pub(crate) fn stop(mut self) {
        self.cancel.cancel();
        let Some(handle) = self.handle.take() else {
            return;
        };
        if handle.thread().id() == std::thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            tracing::error!(target: targets::NET, "background thread panicked");
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
