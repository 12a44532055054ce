//! One end of a streamrpc conversation.
//!
//! A [`Peer`] ties the layers together for a single connection:
//! transport → codec → stream tracker. It does not dispatch methods or
//! correlate responses; it moves envelopes and keeps stream state honest
//! in both directions.

use serde::{Serialize, de::DeserializeOwned};
use streamrpc_protocol::{
    Codec, Id, JsonCodec, Message, StreamState, builders,
};
use streamrpc_stream::{StreamStats, StreamTracker, TrackerError};
use streamrpc_transport::{Connection, ConnectionId, TransportError};

use crate::{PeerConfig, StreamRpcError};

/// A connection plus a codec plus the stream table for that connection.
///
/// Outgoing and incoming envelopes both go through the same tracker, so
/// either side refuses to send a frame for a stream that already ended
/// and notices when the other side does.
///
/// Ended streams are remembered up to
/// [`StreamConfig::max_ended_streams`](streamrpc_stream::StreamConfig),
/// which bounds the table on long-lived connections. Call
/// [`Peer::cleanup_terminal`] to forget them sooner.
///
/// # Example
///
/// ```rust
/// use serde_json::json;
/// use streamrpc::prelude::*;
///
/// # async fn demo() -> Result<(), StreamRpcError> {
/// let (a, b) = MemoryConnection::pair();
/// let mut client = Peer::new(a);
/// let mut service = Peer::new(b);
///
/// client.send(builders::stream_request("tail", json!({}), "s1")).await?;
/// let req: Option<Message> = service.recv().await?;
/// assert_eq!(req.map(|m| m.kind()), Some(MessageKind::StreamRequest));
/// # Ok(())
/// # }
/// ```
pub struct Peer<C, K = JsonCodec> {
    conn: C,
    codec: K,
    tracker: StreamTracker,
    reject_post_terminal: bool,
}

impl<C> Peer<C, JsonCodec>
where
    C: Connection<Error = TransportError>,
{
    /// Creates a peer with the JSON codec and default settings.
    pub fn new(conn: C) -> Self {
        Self::with_config(conn, JsonCodec, PeerConfig::default())
    }
}

impl<C, K> Peer<C, K>
where
    C: Connection<Error = TransportError>,
    K: Codec,
{
    pub fn with_config(conn: C, codec: K, config: PeerConfig) -> Self {
        Self {
            conn,
            codec,
            tracker: StreamTracker::new(config.stream),
            reject_post_terminal: config.reject_post_terminal,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.conn.id()
    }

    /// Encodes and sends one envelope.
    ///
    /// A stream request starts tracking its stream; a stream frame
    /// advances it. Nothing is sent if the tracker refuses the envelope,
    /// and the stream is only advanced once the connection accepted the
    /// frame.
    ///
    /// # Errors
    /// - [`StreamRpcError::Protocol`] if encoding fails
    /// - [`StreamRpcError::Stream`] if the frame's stream is unknown or
    ///   already ended, or the open-stream limit is reached
    /// - [`StreamRpcError::Transport`] if the connection rejects the frame
    pub async fn send<T: Serialize>(
        &mut self,
        msg: impl Into<Message<T>>,
    ) -> Result<(), StreamRpcError> {
        let msg = msg.into();
        let bytes = self.codec.encode(&msg)?;
        let step = self.tracker.prepare(&msg)?;

        tracing::debug!(conn = %self.conn.id(), kind = %msg.kind(), "sending envelope");
        self.conn.send(&bytes).await?;

        if let Some(step) = step {
            self.tracker.commit(step);
        }
        Ok(())
    }

    /// Receives, decodes and tracks the next envelope.
    ///
    /// Returns `Ok(None)` once the other end has closed the connection.
    ///
    /// # Errors
    /// - [`StreamRpcError::Transport`] if receiving fails
    /// - [`StreamRpcError::Protocol`] if the frame is not a valid envelope
    /// - [`StreamRpcError::Stream`] on a stream violation (a frame after
    ///   the end only when `reject_post_terminal` is set)
    pub async fn recv<T: DeserializeOwned>(
        &mut self,
    ) -> Result<Option<Message<T>>, StreamRpcError> {
        let Some(bytes) = self.conn.recv().await? else {
            tracing::info!(conn = %self.conn.id(), "connection closed by peer");
            return Ok(None);
        };

        let msg: Message<T> = self.codec.decode_message(&bytes)?;
        tracing::debug!(conn = %self.conn.id(), kind = %msg.kind(), "received envelope");

        match self.tracker.observe(&msg) {
            Ok(_) => {}
            Err(TrackerError::AfterTerminal { .. })
                if !self.reject_post_terminal => {}
            Err(err) => return Err(err.into()),
        }
        Ok(Some(msg))
    }

    /// Tells the other side about a local failure with an error response.
    ///
    /// Use `Id::Null` when the failing envelope's id is unknown, e.g.
    /// because it could not be decoded.
    pub async fn report(
        &mut self,
        err: &StreamRpcError,
        id: impl Into<Id>,
    ) -> Result<(), StreamRpcError> {
        let reply = builders::error_response(err.to_error_context(), id);
        self.send(reply).await
    }

    /// Closes the connection. The other end sees a clean close once it
    /// has drained what was already sent.
    pub async fn close(&self) -> Result<(), StreamRpcError> {
        self.conn.close().await?;
        Ok(())
    }

    pub fn stream_state(&self, stream_id: &Id) -> Option<StreamState> {
        self.tracker.state(stream_id)
    }

    pub fn open_streams(&self) -> usize {
        self.tracker.open_count()
    }

    /// Forgets streams that have ended. Late frames for them then read
    /// as unknown streams.
    pub fn cleanup_terminal(&mut self) -> usize {
        self.tracker.cleanup_terminal()
    }

    pub fn stats(&self) -> StreamStats {
        self.tracker.stats()
    }
}
