//! Call channel: a private, bidirectional message pipe
//!
//! A [`MessageChannel`] produces two linked [`Endpoint`]s. Whatever one end
//! posts, the other end receives. Endpoints are themselves transferable, so
//! a caller can hand a fresh pipe to an action.

use std::fmt;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

use super::value::Transferable;

/// A message as it travels through an endpoint.
///
/// `body` is an already-serialised payload, so structured data is always
/// copied. `transfer` holds the values that are moved instead.
#[derive(Debug, Default)]
pub struct Message {
    /// Serialised payload
    pub body: Vec<u8>,
    /// Values moved alongside the payload
    pub transfer: Vec<Transferable>,
}

impl Message {
    /// Create a message with no transferred values.
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            transfer: Vec::new(),
        }
    }

    /// Attach values to move with this message.
    pub fn with_transfer(mut self, transfer: Vec<Transferable>) -> Self {
        self.transfer = transfer;
        self
    }
}

/// The peer endpoint has been dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("endpoint is closed")]
pub struct Closed;

/// Factory for linked endpoint pairs.
pub struct MessageChannel;

impl MessageChannel {
    /// Create two linked endpoints.
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (Endpoint, Endpoint) {
        let (left_tx, left_rx) = mpsc::unbounded_channel();
        let (right_tx, right_rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        (
            Endpoint {
                id,
                tx: right_tx,
                rx: left_rx,
            },
            Endpoint {
                id,
                tx: left_tx,
                rx: right_rx,
            },
        )
    }
}

/// One end of a [`MessageChannel`].
pub struct Endpoint {
    id: Uuid,
    tx: UnboundedSender<Message>,
    rx: UnboundedReceiver<Message>,
}

impl Endpoint {
    /// Identifier shared by both ends of the channel.
    pub fn channel_id(&self) -> Uuid {
        self.id
    }

    /// Post a message to the peer. Never blocks.
    pub fn post_message(&self, message: Message) -> Result<(), Closed> {
        self.tx.send(message).map_err(|_| Closed)
    }

    /// Take one already-delivered message, if any. Never blocks.
    pub fn receive_message(&mut self) -> Option<Message> {
        self.rx.try_recv().ok()
    }

    /// Wait for the next message. `None` once the peer is gone.
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }

    /// Whether the peer endpoint has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("channel", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}
