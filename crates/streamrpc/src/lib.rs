//! # streamrpc
//!
//! JSON-RPC 2.0 compatible envelopes, extended with acks and streamed
//! responses.
//!
//! This crate re-exports the layers and adds [`Peer`], which runs them
//! over one connection:
//!
//! - `streamrpc-protocol`: envelopes, builders, error taxonomy, codec
//! - `streamrpc-stream`: per-connection stream bookkeeping
//! - `streamrpc-transport`: the [`Connection`](streamrpc_transport::Connection)
//!   trait and an in-memory pair
//!
//! ## Quick Start
//!
//! ```rust
//! use serde_json::json;
//! use streamrpc::prelude::*;
//!
//! let frame = builders::stream_data(json!({ "line": "hi" }), "s1");
//! let bytes = JsonCodec.encode(&frame).unwrap();
//!
//! let decoded: Message = JsonCodec.decode_message(&bytes).unwrap();
//! assert_eq!(decoded.kind(), MessageKind::StreamData);
//! assert_eq!(decoded.id(), None);
//! ```

mod config;
mod error;
mod peer;

pub use config::PeerConfig;
pub use error::StreamRpcError;
pub use peer::Peer;

pub use streamrpc_protocol as protocol;
pub use streamrpc_stream as stream;
pub use streamrpc_transport as transport;

/// Everything needed to build, send and receive envelopes.
pub mod prelude {
    pub use crate::{Peer, PeerConfig, StreamRpcError};
    pub use streamrpc_protocol::{
        Ack, Codec, ErrorCode, ErrorContext, ErrorResponse, FrameKind, Id,
        JsonCodec, Message, MessageKind, ProtocolError, Request,
        RequestOptions, SendStatus, StreamAbort, StreamData, StreamDone,
        StreamError, StreamFlag, StreamRequest, StreamState,
        SuccessResponse, Version, builders,
    };
    pub use streamrpc_stream::{
        StreamConfig, StreamStats, StreamTracker, TrackerError,
    };
    pub use streamrpc_transport::{
        Connection, ConnectionId, MemoryConfig, MemoryConnection,
        TransportError,
    };
}
