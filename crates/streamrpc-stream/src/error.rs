//! Error types for stream bookkeeping.

use streamrpc_protocol::{ErrorCode, ErrorContext, Id, StreamState};

/// Errors raised while tracking streams.
///
/// Each one is a protocol violation by one of the two peers. None of them
/// is swallowed: the tracker logs it and hands it back to the caller.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// A stream request reused the id of a stream that is still live.
    #[error("stream {0} is already open")]
    AlreadyOpen(Id),

    /// A frame arrived for an id no stream request initiated (or one that
    /// was cleaned up after it ended).
    #[error("frame for unknown stream {0}")]
    UnknownStream(Id),

    /// A frame arrived after the stream's terminal frame.
    #[error("frame for stream {stream_id} after it ended ({state})")]
    AfterTerminal { stream_id: Id, state: StreamState },

    /// Starting another stream would exceed `max_open_streams`.
    #[error("too many open streams (limit {limit})")]
    TooManyStreams { limit: usize },
}

impl TrackerError {
    /// The stream the error is about, if any.
    pub fn stream_id(&self) -> Option<&Id> {
        match self {
            Self::AlreadyOpen(id) | Self::UnknownStream(id) => Some(id),
            Self::AfterTerminal { stream_id, .. } => Some(stream_id),
            Self::TooManyStreams { .. } => None,
        }
    }

    /// The error a service would report back for this violation.
    pub fn to_error_context(&self) -> ErrorContext {
        let context = match self {
            Self::AlreadyOpen(_) => ErrorContext::duplicate(),
            Self::UnknownStream(_) => ErrorContext::not_found()
                .with_code(ErrorCode::RpcResourceNotFound),
            Self::AfterTerminal { .. } => ErrorContext::invalid_request(),
            Self::TooManyStreams { .. } => ErrorContext::generic()
                .with_code(ErrorCode::RpcTooManyRequests)
                .with_title(ErrorCode::RpcTooManyRequests.title()),
        };
        context.with_message(self.to_string())
    }
}
