//! Values crossing the context boundary
//!
//! Structured data is serialised into the message body and therefore
//! copied. Raw buffers, channel endpoints and open files are transferable:
//! they are moved out of band in the message's transfer list and the body
//! only records their slot.

use std::fs::File;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::channel::Endpoint;
use super::error::ProtocolError;

/// A call argument or return value.
#[derive(Debug)]
pub enum Value {
    /// Structured data, copied across the boundary
    Data(JsonValue),
    /// Raw binary buffer
    Buffer(Vec<u8>),
    /// One end of a message channel
    Port(Endpoint),
    /// An open file handle
    File(File),
}

/// A value moved rather than copied.
#[derive(Debug)]
pub enum Transferable {
    /// Raw binary buffer
    Buffer(Vec<u8>),
    /// One end of a message channel
    Port(Endpoint),
    /// An open file handle
    File(File),
}

/// How a value appears in a serialised message body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum WireValue {
    Data(JsonValue),
    Transfer(usize),
}

impl Value {
    /// The unit/absent value.
    pub fn null() -> Self {
        Value::Data(JsonValue::Null)
    }

    /// Whether the value is moved instead of copied.
    pub fn is_transferable(&self) -> bool {
        !matches!(self, Value::Data(_))
    }

    /// Borrow the structured data, if this is data.
    pub fn as_data(&self) -> Option<&JsonValue> {
        match self {
            Value::Data(data) => Some(data),
            _ => None,
        }
    }

    /// Take the structured data, if this is data.
    pub fn into_data(self) -> Option<JsonValue> {
        match self {
            Value::Data(data) => Some(data),
            _ => None,
        }
    }

    /// Borrow the raw bytes, if this is a buffer.
    pub fn as_buffer(&self) -> Option<&[u8]> {
        match self {
            Value::Buffer(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Take the raw bytes, if this is a buffer.
    pub fn into_buffer(self) -> Option<Vec<u8>> {
        match self {
            Value::Buffer(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Take the endpoint, if this is a port.
    pub fn into_port(self) -> Option<Endpoint> {
        match self {
            Value::Port(port) => Some(port),
            _ => None,
        }
    }

    /// Take the file handle, if this is a file.
    pub fn into_file(self) -> Option<File> {
        match self {
            Value::File(file) => Some(file),
            _ => None,
        }
    }

    /// Lower into structured data for typed decoding.
    ///
    /// Buffers become arrays of bytes. Ports and files have no structured form.
    pub(crate) fn into_json(self) -> Option<JsonValue> {
        match self {
            Value::Data(data) => Some(data),
            Value::Buffer(bytes) => Some(JsonValue::from(bytes)),
            Value::Port(_) | Value::File(_) => None,
        }
    }

    /// Encode for the wire, moving transferables into `transfer`.
    pub(crate) fn into_wire(self, transfer: &mut Vec<Transferable>) -> WireValue {
        let moved = match self {
            Value::Data(data) => return WireValue::Data(data),
            Value::Buffer(bytes) => Transferable::Buffer(bytes),
            Value::Port(port) => Transferable::Port(port),
            Value::File(file) => Transferable::File(file),
        };
        transfer.push(moved);
        WireValue::Transfer(transfer.len() - 1)
    }

    /// Decode from the wire, claiming transferables from `slots`.
    pub(crate) fn from_wire(
        wire: WireValue,
        slots: &mut [Option<Transferable>],
    ) -> Result<Self, ProtocolError> {
        match wire {
            WireValue::Data(data) => Ok(Value::Data(data)),
            WireValue::Transfer(index) => slots
                .get_mut(index)
                .and_then(Option::take)
                .map(Value::from)
                .ok_or(ProtocolError::MissingTransfer(index)),
        }
    }
}

impl From<Transferable> for Value {
    fn from(moved: Transferable) -> Self {
        match moved {
            Transferable::Buffer(bytes) => Value::Buffer(bytes),
            Transferable::Port(port) => Value::Port(port),
            Transferable::File(file) => Value::File(file),
        }
    }
}

impl From<JsonValue> for Value {
    fn from(data: JsonValue) -> Self {
        Value::Data(data)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Data(JsonValue::from(text))
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::Data(JsonValue::from(text))
    }
}

impl From<i64> for Value {
    fn from(number: i64) -> Self {
        Value::Data(JsonValue::from(number))
    }
}

impl From<bool> for Value {
    fn from(flag: bool) -> Self {
        Value::Data(JsonValue::from(flag))
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value::Buffer(bytes)
    }
}

impl From<Endpoint> for Value {
    fn from(port: Endpoint) -> Self {
        Value::Port(port)
    }
}

impl From<File> for Value {
    fn from(file: File) -> Self {
        Value::File(file)
    }
}
