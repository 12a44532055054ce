//! Unified error type for streamrpc.

use streamrpc_protocol::{ErrorContext, ProtocolError, SendStatus};
use streamrpc_stream::TrackerError;
use streamrpc_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum StreamRpcError {
    /// A transport-level error (connection closed, frame too large).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid envelope).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A stream bookkeeping violation.
    #[error(transparent)]
    Stream(#[from] TrackerError),
}

impl StreamRpcError {
    /// The error to put on the wire when reporting this failure to the
    /// other side.
    pub fn to_error_context(&self) -> ErrorContext {
        match self {
            Self::Transport(TransportError::ConnectionClosed(_)) => {
                ErrorContext::send_failure(SendStatus::ConnClosed)
            }
            Self::Transport(TransportError::FrameTooLarge { .. }) => {
                ErrorContext::send_failure(SendStatus::PacketDropped)
            }
            Self::Protocol(err) => ErrorContext::from(err),
            Self::Stream(err) => err.to_error_context(),
        }
    }
}
