//! Client proxy: blocking calls into an execution context
//!
//! A call posts the request, parks the calling thread on the shared signal,
//! drains the one response waiting on the channel, resets the signal, and
//! returns the result or raises the marshaled failure. The caller's thread
//! does nothing else while it waits.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;

use super::actions::{Args, Method};
use super::channel::Endpoint;
use super::context::ContextHandle;
use super::error::{CallError, CallResult, ProtocolError};
use super::protocol::{CallRequest, CallResponse};
use super::signal::SharedSignal;
use super::value::Value;

struct ClientInner {
    context: ContextHandle,
    signal: Arc<SharedSignal>,
    // Held for the whole round trip: one call in flight per context.
    endpoint: Mutex<Endpoint>,
}

/// Caller-side proxy for one execution context.
///
/// Clones share the same context and are serialised against each other.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    pub(crate) fn new(context: ContextHandle, signal: Arc<SharedSignal>, endpoint: Endpoint) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                context,
                signal,
                endpoint: Mutex::new(endpoint),
            }),
        }
    }

    /// The context this client talks to.
    pub fn context(&self) -> &ContextHandle {
        &self.inner.context
    }

    /// Call an action by name and block until it completes.
    ///
    /// Transferable arguments are moved to the context; everything else is
    /// copied. There is no timeout: if the context is terminated while this
    /// call is in flight, or failed to start, this never returns.
    pub fn call(&self, method: &str, args: Vec<Value>) -> CallResult<Value> {
        let inner = &*self.inner;
        let id = inner.context.id();
        let mut endpoint = inner.endpoint.lock();

        let request = CallRequest::new(method, args).encode()?;
        endpoint
            .post_message(request)
            .map_err(|_| CallError::Disconnected(id))?;

        inner.signal.wait();
        let reply = endpoint.receive_message();
        inner.signal.reset();

        let reply = reply.ok_or(CallError::MissingResponse(id))?;
        match CallResponse::decode(reply)? {
            CallResponse::Ok(value) => Ok(value),
            CallResponse::Err(failure) => Err(CallError::Action(failure)),
        }
    }

    /// Call a typed method and block until it completes.
    pub fn invoke<A, R>(&self, method: &Method<A, R>, args: A) -> CallResult<R>
    where
        A: Args,
        R: DeserializeOwned,
    {
        let args = args.encode().map_err(ProtocolError::from)?;
        let value = self.call(method.name(), args)?;
        let data = value.into_json().ok_or_else(|| {
            CallError::MalformedResponse(format!("{} returned a port or file", method.name()))
        })?;
        serde_json::from_value(data).map_err(|err| {
            CallError::MalformedResponse(format!("{} returned {err}", method.name()))
        })
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("context", &self.inner.context.id())
            .finish()
    }
}
