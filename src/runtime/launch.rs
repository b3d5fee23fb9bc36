//! Launch controller
//!
//! A [`SyncWorker`] pairs a source reference with an action set. Every
//! [`launch`](SyncWorker::launch) wires a fresh shared signal and call
//! channel to a new execution context, registers it, and hands back the
//! client proxy together with the context handle.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::LaunchConfig;
use super::actions::ActionSet;
use super::channel::MessageChannel;
use super::client::Client;
use super::context::{ContextHandle, ContextId, is_execution_context};
use super::error::LaunchResult;
use super::module::{CopyPreparer, ModulePreparer, prepare_module};
use super::registry::ContextRegistry;
use super::signal::SharedSignal;

/// A worker definition: source, actions, and where its contexts get registered.
pub struct SyncWorker<S> {
    source: PathBuf,
    actions: ActionSet<S>,
    registry: ContextRegistry,
    config: Option<LaunchConfig>,
    preparer: Arc<dyn ModulePreparer>,
}

/// What [`SyncWorker::launch`] produced.
///
/// Both fields are `None` when launching was a no-op: the crate is disabled
/// or the caller is itself running inside an execution context.
#[derive(Debug)]
pub struct Launched {
    /// Blocking proxy for the new context
    pub client: Option<Client>,
    /// Handle for inspecting and terminating the new context
    pub context: Option<ContextHandle>,
}

impl Launched {
    fn inert() -> Self {
        Self {
            client: None,
            context: None,
        }
    }

    /// Whether nothing was launched.
    pub fn is_inert(&self) -> bool {
        self.client.is_none()
    }
}

impl<S: Send + Sync + 'static> SyncWorker<S> {
    /// Define a worker.
    ///
    /// Unless [`with_config`](Self::with_config) overrides it, configuration
    /// is read from the environment on every launch; see
    /// [`LaunchConfig::from_env`].
    pub fn define(
        source: impl Into<PathBuf>,
        actions: ActionSet<S>,
        registry: &ContextRegistry,
    ) -> Self {
        Self {
            source: source.into(),
            actions,
            registry: registry.clone(),
            config: None,
            preparer: Arc::new(CopyPreparer),
        }
    }

    /// Use a fixed configuration instead of the environment.
    pub fn with_config(mut self, config: LaunchConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Replace the module preparer.
    pub fn with_preparer(mut self, preparer: impl ModulePreparer + 'static) -> Self {
        self.preparer = Arc::new(preparer);
        self
    }

    /// The source this worker is defined from.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// The worker's actions.
    pub fn actions(&self) -> &ActionSet<S> {
        &self.actions
    }

    /// The configuration the next launch will use.
    pub fn config(&self) -> LaunchConfig {
        self.config.clone().unwrap_or_else(LaunchConfig::from_env)
    }

    /// Start a new execution context.
    ///
    /// Returns an inert [`Launched`] when disabled or when called from
    /// inside a context. A module preparation failure is fatal unless the
    /// cache location refused the write, in which case the original source
    /// is used. A startup failure inside the new context is not reported
    /// here; see [`ContextHandle::startup_failure`].
    pub fn launch(&self) -> LaunchResult<Launched> {
        let config = self.config();
        if config.disabled {
            tracing::debug!(source = %self.source.display(), "Sync actions disabled, not launching");
            return Ok(Launched::inert());
        }
        if is_execution_context() {
            tracing::debug!(source = %self.source.display(), "Already inside an execution context, not launching");
            return Ok(Launched::inert());
        }

        let signal = Arc::new(SharedSignal::new());
        let (client_end, context_end) = MessageChannel::new();

        let module = prepare_module(&self.source, &config, self.preparer.as_ref())?;

        let id = ContextId::new();
        let context = ContextHandle::spawn(
            id,
            self.actions.clone(),
            module,
            context_end,
            signal.clone(),
        )?;
        self.registry.register(context.clone());

        tracing::debug!(
            context = %id,
            module = %context.module().path().display(),
            "Launched execution context"
        );

        Ok(Launched {
            client: Some(Client::new(context.clone(), signal, client_end)),
            context: Some(context),
        })
    }
}

impl<S> fmt::Debug for SyncWorker<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncWorker")
            .field("source", &self.source)
            .field("actions", &self.actions)
            .field("config", &self.config)
            .finish()
    }
}
