//! Error types for sync actions
//!
//! Handler failures are converted to data on the context side and only
//! raised again on the caller's thread. Everything else the crate can fail
//! with is a `thiserror` enum, matching the rest of the runtime.

use std::any::Any;
use std::fmt;
use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

use super::context::ContextId;

/// `name` property stamped on failures for methods missing from the action set.
pub const UNKNOWN_ACTION: &str = "UnknownActionError";

/// `name` property stamped on failures for arguments a typed handler rejected.
pub const INVALID_ARGUMENTS: &str = "InvalidArgumentsError";

/// `name` property stamped on failures raised by a panicking handler.
pub const PANICKED: &str = "PanicError";

/// A failure raised by an action, in the shape it crosses the context boundary.
///
/// Only the message and the failure's own fields survive the trip. The
/// original error type is gone by the time the caller sees it, so a custom
/// error reports itself through the `name` property instead.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct ActionError {
    message: String,
    #[serde(default)]
    properties: Map<String, JsonValue>,
}

/// Classification of an [`ActionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The requested method is not part of the action set.
    UnknownAction,
    /// A typed handler could not decode its arguments.
    InvalidArguments,
    /// The handler panicked while running.
    Panicked,
    /// Any failure raised by handler code, passed through untouched.
    Opaque,
}

impl ActionError {
    /// Create a failure with a message and no extra fields.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            properties: Map::new(),
        }
    }

    /// Create a failure carrying a `name` property.
    pub fn named(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(message).with_property("name", name.into())
    }

    /// Rebuild a failure from its marshaled parts.
    pub fn from_parts(message: impl Into<String>, properties: Map<String, JsonValue>) -> Self {
        Self {
            message: message.into(),
            properties,
        }
    }

    /// Attach an extra field.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// The failure's message text.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The `name` property, or `"Error"` when none was set.
    pub fn name(&self) -> &str {
        self.properties
            .get("name")
            .and_then(JsonValue::as_str)
            .unwrap_or("Error")
    }

    /// Look up one extra field.
    pub fn property(&self, key: &str) -> Option<&JsonValue> {
        self.properties.get(key)
    }

    /// All extra fields.
    pub fn properties(&self) -> &Map<String, JsonValue> {
        &self.properties
    }

    /// Split into message and fields.
    pub fn into_parts(self) -> (String, Map<String, JsonValue>) {
        (self.message, self.properties)
    }

    /// Classify the failure by its `name` property.
    pub fn kind(&self) -> FailureKind {
        match self.name() {
            UNKNOWN_ACTION => FailureKind::UnknownAction,
            INVALID_ARGUMENTS => FailureKind::InvalidArguments,
            PANICKED => FailureKind::Panicked,
            _ => FailureKind::Opaque,
        }
    }

    pub(crate) fn unknown_action(method: &str) -> Self {
        Self::named(UNKNOWN_ACTION, format!("actions.{method} is not a function"))
            .with_property("method", method)
    }

    pub(crate) fn invalid_arguments(method: &str, detail: impl fmt::Display) -> Self {
        Self::named(
            INVALID_ARGUMENTS,
            format!("invalid arguments for {method}: {detail}"),
        )
        .with_property("method", method)
    }

    pub(crate) fn panicked(method: &str, payload: Box<dyn Any + Send>) -> Self {
        let detail = if let Some(text) = payload.downcast_ref::<&str>() {
            (*text).to_string()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            "handler panicked".to_string()
        };
        Self::named(PANICKED, detail).with_property("method", method)
    }
}

impl From<io::Error> for ActionError {
    fn from(error: io::Error) -> Self {
        Self::new(error.to_string()).with_property("code", format!("{:?}", error.kind()))
    }
}

impl From<serde_json::Error> for ActionError {
    fn from(error: serde_json::Error) -> Self {
        Self::new(error.to_string())
    }
}

impl From<anyhow::Error> for ActionError {
    fn from(error: anyhow::Error) -> Self {
        Self::new(format!("{error:#}"))
    }
}

/// Errors on the wire between a client and its execution context.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Payload could not be encoded or decoded.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Payload referenced a transfer slot that was not attached.
    #[error("transfer slot {0} is missing from the message")]
    MissingTransfer(usize),
}

/// Errors surfaced by a blocking call through a [`Client`](super::client::Client).
#[derive(Debug, Error)]
pub enum CallError {
    /// The action failed; its message and fields were carried back.
    #[error("{0}")]
    Action(#[from] ActionError),

    /// The request or response could not be (de)serialised.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The execution context is gone and no longer accepts requests.
    #[error("execution context {0} is no longer accepting calls")]
    Disconnected(ContextId),

    /// The signal was raised but no response was waiting on the channel.
    #[error("execution context {0} signalled without a response")]
    MissingResponse(ContextId),

    /// The response could not be converted into the caller's expected type.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl CallError {
    /// The marshaled action failure, if this is one.
    pub fn as_action(&self) -> Option<&ActionError> {
        match self {
            CallError::Action(error) => Some(error),
            _ => None,
        }
    }
}

/// Errors that make [`launch`](super::launch::SyncWorker::launch) fail.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// The module preparer failed with something other than a storage permission problem.
    #[error("failed to prepare worker module from {path}: {source}")]
    Prepare {
        /// Source file that was being prepared
        path: PathBuf,
        /// Underlying preparation failure
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    /// The execution context thread could not be spawned.
    #[error("failed to spawn execution context: {0}")]
    Spawn(#[from] io::Error),
}

/// Result type for blocking calls
pub type CallResult<T> = std::result::Result<T, CallError>;

/// Result type for launching
pub type LaunchResult<T> = std::result::Result<T, LaunchError>;
