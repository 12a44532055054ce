//! In-process transport: two connection ends joined by `tokio` channels.
//!
//! Each direction is one bounded mpsc channel, so frames arrive in the
//! order they were sent. Useful for tests and for running a client and a
//! service inside the same process.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, mpsc};

use crate::{Connection, ConnectionId, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> ConnectionId {
    ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
}

/// Settings for a [`MemoryConnection`] pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryConfig {
    /// Frames buffered per direction before `send` waits.
    ///
    /// Default: 64.
    pub capacity: usize,

    /// Largest frame `send` accepts, in bytes. 0 means no limit.
    ///
    /// Default: 0.
    pub max_frame_len: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            capacity: 64,
            max_frame_len: 0,
        }
    }
}

/// One end of an in-memory connection.
pub struct MemoryConnection {
    id: ConnectionId,
    /// `None` once this end has been closed.
    tx: Mutex<Option<mpsc::Sender<Vec<u8>>>>,
    rx: Mutex<mpsc::Receiver<Vec<u8>>>,
    max_frame_len: usize,
}

impl MemoryConnection {
    /// Creates two connected ends with default settings.
    pub fn pair() -> (Self, Self) {
        Self::pair_with(MemoryConfig::default())
    }

    /// Creates two connected ends with the given settings.
    ///
    /// A zero `capacity` is raised to 1, the smallest buffer a `tokio`
    /// channel supports.
    pub fn pair_with(config: MemoryConfig) -> (Self, Self) {
        let capacity = config.capacity.max(1);
        let (a_tx, b_rx) = mpsc::channel(capacity);
        let (b_tx, a_rx) = mpsc::channel(capacity);

        let a = Self {
            id: next_id(),
            tx: Mutex::new(Some(a_tx)),
            rx: Mutex::new(a_rx),
            max_frame_len: config.max_frame_len,
        };
        let b = Self {
            id: next_id(),
            tx: Mutex::new(Some(b_tx)),
            rx: Mutex::new(b_rx),
            max_frame_len: config.max_frame_len,
        };
        tracing::debug!(a = %a.id, b = %b.id, capacity, "memory pair created");
        (a, b)
    }
}

impl Connection for MemoryConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        if self.max_frame_len > 0 && data.len() > self.max_frame_len {
            return Err(TransportError::FrameTooLarge {
                len: data.len(),
                max: self.max_frame_len,
            });
        }

        let guard = self.tx.lock().await;
        let tx = guard.as_ref().ok_or_else(|| {
            TransportError::ConnectionClosed(format!("{} closed locally", self.id))
        })?;
        tx.send(data.to_vec()).await.map_err(|_| {
            TransportError::ConnectionClosed(format!("{} peer dropped", self.id))
        })
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        Ok(self.rx.lock().await.recv().await)
    }

    /// Closes the sending half. The other end drains what was already
    /// sent and then sees a clean close.
    async fn close(&self) -> Result<(), Self::Error> {
        if self.tx.lock().await.take().is_some() {
            tracing::debug!(id = %self.id, "memory connection closed");
        }
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
