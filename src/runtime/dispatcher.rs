//! Action dispatcher running inside an execution context
//!
//! Every request ends in exactly one response followed by one signal,
//! whatever the handler does: returns, fails, panics, or does not exist.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;

use super::actions::ActionSet;
use super::channel::Message;
use super::error::ActionError;
use super::protocol::{CallRequest, CallResponse};

/// Serves calls for one context against its own state instance.
pub struct Dispatcher<S> {
    actions: ActionSet<S>,
    state: Arc<S>,
}

impl<S: Send + Sync + 'static> Dispatcher<S> {
    /// Bind an action set to a state instance.
    pub fn new(actions: ActionSet<S>, state: S) -> Self {
        Self {
            actions,
            state: Arc::new(state),
        }
    }

    /// Run one call to completion.
    pub async fn dispatch(&self, request: CallRequest) -> CallResponse {
        let CallRequest { method, args } = request;
        let Some(handler) = self.actions.handler(&method) else {
            tracing::debug!(method = %method, "Unknown action requested");
            return CallResponse::Err(ActionError::unknown_action(&method));
        };

        tracing::debug!(method = %method, args = args.len(), "Dispatching action");

        let state = self.state.clone();
        let future = match std::panic::catch_unwind(AssertUnwindSafe(|| handler(state, args))) {
            Ok(future) => future,
            Err(payload) => return CallResponse::Err(ActionError::panicked(&method, payload)),
        };

        match AssertUnwindSafe(future).catch_unwind().await {
            Ok(result) => result.into(),
            Err(payload) => CallResponse::Err(ActionError::panicked(&method, payload)),
        }
    }

    /// Decode a request message, run it, and encode the reply message.
    pub async fn handle(&self, message: Message) -> Message {
        let response = match CallRequest::decode(message) {
            Ok(request) => self.dispatch(request).await,
            Err(err) => CallResponse::Err(
                ActionError::named("ProtocolError", format!("malformed request: {err}")),
            ),
        };

        match response.encode() {
            Ok(message) => message,
            Err(err) => encode_failure(ActionError::new(format!(
                "failed to encode response: {err}"
            ))),
        }
    }
}

fn encode_failure(failure: ActionError) -> Message {
    CallResponse::Err(failure).encode().unwrap_or_else(|_| {
        Message::new(br#"{"error":"failed to encode response","properties":{}}"#.to_vec())
    })
}
