//! Synchronous call runtime and its configuration
//!
//! This module wires the pieces together: a launch controller that spawns
//! execution contexts, a client proxy that blocks on a shared signal, and
//! the dispatcher that runs actions on the context side.

use std::path::PathBuf;
use serde::{Deserialize, Serialize};

// Submodules
pub mod actions;
pub mod channel;
pub mod client;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod launch;
pub mod module;
pub mod protocol;
pub mod registry;
pub mod signal;
pub mod value;

/// Environment variable that turns every launch into a no-op when non-empty.
pub const DISABLE_ENV: &str = "DISABLE_SYNC_ACTIONS";

/// Environment variable overriding where prepared modules are written.
pub const TEMP_DIR_ENV: &str = "SYNC_ACTIONS_TEMP_DIR";

/// Configuration for launching workers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchConfig {
    /// Launch nothing and return inert handles
    pub disabled: bool,

    /// Base directory for prepared modules (default: `<cwd>/target`)
    pub temp_dir: Option<PathBuf>,
}

impl LaunchConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |key: &str| lookup(key).filter(|value| !value.is_empty());
        Self {
            disabled: set(DISABLE_ENV).is_some(),
            temp_dir: set(TEMP_DIR_ENV).map(PathBuf::from),
        }
    }
}

// Re-export commonly used types
pub use actions::{ActionSet, ActionSetBuilder, Args, Method};
pub use channel::{Endpoint, Message, MessageChannel};
pub use client::Client;
pub use context::{ContextHandle, ContextId, ContextStatus, Termination};
pub use error::{ActionError, CallError, FailureKind, LaunchError};
pub use launch::{Launched, SyncWorker};
pub use module::{CopyPreparer, ModulePreparer, WorkerModule};
pub use registry::ContextRegistry;
pub use signal::SharedSignal;
pub use value::{Transferable, Value};
