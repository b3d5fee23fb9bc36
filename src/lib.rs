//! Sync Actions – blocking calls into actions running on another thread
//!
//! This crate lets a caller run a function inside a separate, concurrently
//! scheduled execution context as if it were an ordinary blocking call:
//! - A launch controller spawns contexts from a worker definition
//! - A client proxy posts the request and parks on a shared signal
//! - A dispatcher in the context runs the (possibly async) handler, posts
//!   the response, and raises the signal
//! - Handler failures cross back as data and are raised at the call site
//! - A registry tracks every context for bulk termination

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// Runtime modules implementing the synchronous call protocol
pub mod runtime;

// Re-export key types for convenience
pub use runtime::{
    ActionError, ActionSet, CallError, Client, ContextHandle, ContextRegistry, LaunchConfig,
    Launched, Method, SyncWorker, Termination, Value,
};

/// Current version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
