//! Request/response messages exchanged over the call channel
//!
//! Wire shape of the body (JSON):
//! - Request: `{"method": string, "args": [wire value, ...]}`
//! - Response: `{"result": wire value}` or `{"error": string, "properties": {..}}`
//!
//! A wire value is `{"data": ..}` for copied data or `{"transfer": n}` for the
//! n-th entry of the message's transfer list.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use super::channel::Message;
use super::error::{ActionError, ProtocolError};
use super::value::{Transferable, Value, WireValue};

/// A single blocking call on its way to an execution context.
#[derive(Debug)]
pub struct CallRequest {
    /// Name of the action to run
    pub method: String,
    /// Ordered arguments
    pub args: Vec<Value>,
}

/// Outcome of a call on its way back to the caller.
#[derive(Debug)]
pub enum CallResponse {
    /// The action returned a value
    Ok(Value),
    /// The action failed
    Err(ActionError),
}

#[derive(Serialize, Deserialize)]
struct RequestBody {
    method: String,
    #[serde(default)]
    args: Vec<WireValue>,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ResponseBody {
    Ok {
        result: WireValue,
    },
    Err {
        error: String,
        #[serde(default)]
        properties: Map<String, JsonValue>,
    },
}

impl CallRequest {
    /// Create a request.
    pub fn new(method: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            method: method.into(),
            args,
        }
    }

    /// Serialise into a message, moving every transferable argument.
    pub fn encode(self) -> Result<Message, ProtocolError> {
        let mut transfer = Vec::new();
        let args = self
            .args
            .into_iter()
            .map(|arg| arg.into_wire(&mut transfer))
            .collect();
        let body = serde_json::to_vec(&RequestBody {
            method: self.method,
            args,
        })?;
        Ok(Message { body, transfer })
    }

    /// Rebuild a request from a received message.
    pub fn decode(message: Message) -> Result<Self, ProtocolError> {
        let body: RequestBody = serde_json::from_slice(&message.body)?;
        let mut slots = into_slots(message.transfer);
        let args = body
            .args
            .into_iter()
            .map(|wire| Value::from_wire(wire, &mut slots))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            method: body.method,
            args,
        })
    }
}

impl CallResponse {
    /// Serialise into a message, moving the result if it is transferable.
    pub fn encode(self) -> Result<Message, ProtocolError> {
        let mut transfer = Vec::new();
        let body = match self {
            CallResponse::Ok(result) => ResponseBody::Ok {
                result: result.into_wire(&mut transfer),
            },
            CallResponse::Err(failure) => {
                let (error, properties) = failure.into_parts();
                ResponseBody::Err { error, properties }
            }
        };
        let body = serde_json::to_vec(&body)?;
        Ok(Message { body, transfer })
    }

    /// Rebuild a response from a received message.
    pub fn decode(message: Message) -> Result<Self, ProtocolError> {
        let body: ResponseBody = serde_json::from_slice(&message.body)?;
        match body {
            ResponseBody::Ok { result } => {
                let mut slots = into_slots(message.transfer);
                Ok(CallResponse::Ok(Value::from_wire(result, &mut slots)?))
            }
            ResponseBody::Err { error, properties } => {
                Ok(CallResponse::Err(ActionError::from_parts(error, properties)))
            }
        }
    }

    /// Convert into a plain `Result`.
    pub fn into_result(self) -> Result<Value, ActionError> {
        match self {
            CallResponse::Ok(value) => Ok(value),
            CallResponse::Err(failure) => Err(failure),
        }
    }
}

impl From<Result<Value, ActionError>> for CallResponse {
    fn from(result: Result<Value, ActionError>) -> Self {
        match result {
            Ok(value) => CallResponse::Ok(value),
            Err(failure) => CallResponse::Err(failure),
        }
    }
}

fn into_slots(transfer: Vec<Transferable>) -> Vec<Option<Transferable>> {
    transfer.into_iter().map(Some).collect()
}
