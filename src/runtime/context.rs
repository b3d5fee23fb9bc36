//! Execution contexts: one OS thread per launched worker
//!
//! Each context owns a current-thread tokio runtime (so async handlers can
//! be awaited), its own action-set state, and the context side of the call
//! channel. The [`ContextHandle`] returned to the caller is how the context
//! is inspected and terminated.

use std::cell::Cell;
use std::fmt;
use std::io;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{oneshot, watch};
use uuid::Uuid;

use super::actions::ActionSet;
use super::channel::Endpoint;
use super::dispatcher::Dispatcher;
use super::error::ActionError;
use super::module::WorkerModule;
use super::signal::SharedSignal;

/// Exit code of a context that stopped cleanly.
pub const EXIT_CLEAN: i32 = 0;

/// Exit code of a context that failed to start or whose thread panicked.
pub const EXIT_FAILURE: i32 = 1;

thread_local! {
    static IN_CONTEXT: Cell<bool> = const { Cell::new(false) };
}

/// Whether the current thread is an execution context.
pub fn is_execution_context() -> bool {
    IN_CONTEXT.with(Cell::get)
}

/// Unique identifier of an execution context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextId(pub Uuid);

impl ContextId {
    /// Create a new random ContextId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of an execution context.
#[derive(Debug, Clone, PartialEq)]
pub enum ContextStatus {
    /// Thread spawned, initializer not finished yet
    Starting,
    /// Dispatcher attached and serving calls
    Ready,
    /// Startup failed; reported out of band, never through a call
    Failed(ActionError),
    /// Thread finished with the given exit code
    Exited(i32),
}

/// Outcome of a termination request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The context stopped with this exit code
    Exited(i32),
    /// The context had already been terminated; nothing happened
    AlreadyTerminated,
}

impl Termination {
    /// The exit code, if this call actually terminated the context.
    pub fn code(&self) -> Option<i32> {
        match self {
            Termination::Exited(code) => Some(*code),
            Termination::AlreadyTerminated => None,
        }
    }
}

/// State shared between a handle and its context thread.
struct Shared {
    status: watch::Sender<ContextStatus>,
    // Keeps the channel open after a startup failure so calls hang instead
    // of erroring, until the context is terminated.
    parked: Mutex<Option<Endpoint>>,
}

struct ContextInner {
    id: ContextId,
    module: WorkerModule,
    launched_at: DateTime<Utc>,
    shared: Arc<Shared>,
    stop: Mutex<Option<oneshot::Sender<()>>>,
    thread: Mutex<Option<JoinHandle<i32>>>,
}

/// Handle to a launched execution context.
///
/// Cheap to clone; every clone refers to the same context.
#[derive(Clone)]
pub struct ContextHandle {
    inner: Arc<ContextInner>,
}

impl ContextHandle {
    /// Spawn a context thread serving `actions` on `endpoint`.
    pub(crate) fn spawn<S>(
        id: ContextId,
        actions: ActionSet<S>,
        module: WorkerModule,
        endpoint: Endpoint,
        signal: Arc<SharedSignal>,
    ) -> io::Result<Self>
    where
        S: Send + Sync + 'static,
    {
        let (status, _) = watch::channel(ContextStatus::Starting);
        let shared = Arc::new(Shared {
            status,
            parked: Mutex::new(None),
        });
        let (stop_tx, stop_rx) = oneshot::channel();

        let thread = {
            let shared = shared.clone();
            let module = module.clone();
            thread::Builder::new()
                .name(format!("sync-actions-{}", id.0.simple()))
                .spawn(move || run_context(id, actions, module, endpoint, signal, stop_rx, shared))?
        };

        Ok(Self {
            inner: Arc::new(ContextInner {
                id,
                module,
                launched_at: Utc::now(),
                shared,
                stop: Mutex::new(Some(stop_tx)),
                thread: Mutex::new(Some(thread)),
            }),
        })
    }

    /// Context identifier.
    pub fn id(&self) -> ContextId {
        self.inner.id
    }

    /// The module this context was started from.
    pub fn module(&self) -> &WorkerModule {
        &self.inner.module
    }

    /// When the context was launched.
    pub fn launched_at(&self) -> DateTime<Utc> {
        self.inner.launched_at
    }

    /// Current lifecycle status.
    pub fn status(&self) -> ContextStatus {
        self.inner.shared.status.borrow().clone()
    }

    /// Whether the context thread is still alive.
    pub fn is_running(&self) -> bool {
        self.inner
            .thread
            .lock()
            .as_ref()
            .is_some_and(|thread| !thread.is_finished())
    }

    /// Wait until the context leaves [`ContextStatus::Starting`] and return
    /// its startup failure, if it had one.
    ///
    /// This is the only place a startup failure is reported. Calls made on a
    /// context that failed to start never complete.
    pub async fn startup_failure(&self) -> Option<ActionError> {
        let mut status = self.inner.shared.status.subscribe();
        let settled = status
            .wait_for(|status| !matches!(status, ContextStatus::Starting))
            .await
            .ok()?;
        match &*settled {
            ContextStatus::Failed(failure) => Some(failure.clone()),
            _ => None,
        }
    }

    /// Ask the context to stop without waiting for it.
    ///
    /// Returns `false` if termination had already been requested.
    pub fn request_termination(&self) -> bool {
        match self.inner.stop.lock().take() {
            Some(stop) => {
                tracing::debug!(context = %self.inner.id, "Requesting context termination");
                let _ = stop.send(());
                true
            }
            None => false,
        }
    }

    /// Wait for a context whose termination was requested to finish.
    pub fn join(&self) -> Termination {
        let Some(thread) = self.inner.thread.lock().take() else {
            return Termination::AlreadyTerminated;
        };
        let code = thread.join().unwrap_or_else(|_| {
            tracing::error!(context = %self.inner.id, "Execution context thread panicked");
            self.inner
                .shared
                .status
                .send_replace(ContextStatus::Exited(EXIT_FAILURE));
            EXIT_FAILURE
        });
        self.inner.shared.parked.lock().take();
        tracing::debug!(context = %self.inner.id, code, "Context terminated");
        Termination::Exited(code)
    }

    /// Stop the context and wait for it to finish.
    ///
    /// A second call reports [`Termination::AlreadyTerminated`]. A handler
    /// that is mid-await is dropped at its next suspension point; a handler
    /// blocking its thread delays termination until it returns.
    ///
    /// Terminating while a caller is blocked in a call leaves that caller
    /// blocked forever: the response signal is never raised. Callers must not
    /// terminate a context they are still calling into.
    pub fn terminate(&self) -> Termination {
        self.request_termination();
        self.join()
    }
}

impl fmt::Debug for ContextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextHandle")
            .field("id", &self.inner.id)
            .field("module", &self.inner.module.path())
            .field("status", &self.status())
            .finish()
    }
}

fn run_context<S>(
    id: ContextId,
    actions: ActionSet<S>,
    module: WorkerModule,
    mut endpoint: Endpoint,
    signal: Arc<SharedSignal>,
    mut stop: oneshot::Receiver<()>,
    shared: Arc<Shared>,
) -> i32
where
    S: Send + Sync + 'static,
{
    IN_CONTEXT.with(|flag| flag.set(true));

    let startup = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(ActionError::from)
        .and_then(|runtime| {
            let state = std::panic::catch_unwind(AssertUnwindSafe(|| actions.initialize(&module)))
                .unwrap_or_else(|payload| Err(ActionError::panicked("<startup>", payload)))?;
            Ok((runtime, state))
        });

    let (runtime, state) = match startup {
        Ok(started) => started,
        Err(failure) => {
            tracing::error!(context = %id, error = %failure, "Execution context failed to start");
            shared.status.send_replace(ContextStatus::Failed(failure));
            *shared.parked.lock() = Some(endpoint);
            return EXIT_FAILURE;
        }
    };

    let dispatcher = Dispatcher::new(actions, state);
    shared.status.send_replace(ContextStatus::Ready);
    tracing::debug!(context = %id, module = %module.path().display(), "Execution context ready");

    runtime.block_on(async {
        loop {
            let message = tokio::select! {
                _ = &mut stop => break,
                message = endpoint.recv() => match message {
                    Some(message) => message,
                    None => break,
                },
            };

            let reply = tokio::select! {
                _ = &mut stop => break,
                reply = dispatcher.handle(message) => reply,
            };

            if endpoint.post_message(reply).is_err() {
                tracing::debug!(context = %id, "Caller went away before the reply");
            }
            signal.notify();
        }
    });
    drop(dispatcher);

    shared.status.send_replace(ContextStatus::Exited(EXIT_CLEAN));
    EXIT_CLEAN
}
