//! Transport abstraction layer for streamrpc.
//!
//! Envelopes travel as opaque byte frames. This crate provides the
//! [`Connection`] trait that the rest of the stack talks to, and an
//! in-process implementation, [`MemoryConnection`].
//!
//! A connection must deliver frames in the order they were sent; stream
//! frames rely on that for their state machine to make sense.

#![allow(async_fn_in_trait)]

mod error;
mod memory;

pub use error::TransportError;
pub use memory::{MemoryConfig, MemoryConnection};

use std::fmt;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A single ordered connection that can send and receive byte frames.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Sends one frame to the remote peer.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Receives the next frame from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Closes the connection.
    async fn close(&self) -> Result<(), Self::Error>;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
