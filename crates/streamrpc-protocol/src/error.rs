//! Error types for the protocol layer.
//!
//! These are *local* failures: bytes that would not encode, bytes that
//! would not decode, or a decoded object that is not a valid envelope.
//! Remote failures never show up here. They travel as data inside an
//! [`ErrorContext`](crate::ErrorContext).

use crate::{ErrorCode, MessageKind};

/// Errors that can occur while encoding, decoding, or classifying an
/// envelope.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust value into bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed input, a missing required field,
    /// an unknown version literal, or an error code outside the taxonomy.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The object decoded, but none of the discriminating fields
    /// (`method`, `stream`, `result`, `error`, `ack`) identify it.
    #[error("unclassifiable envelope: {0}")]
    Unclassifiable(&'static str),

    /// The object matched a message kind but also carries a field that
    /// kind must never have, e.g. `result` next to `error`.
    #[error("{kind} envelope must not carry `{field}`")]
    ConflictingFields {
        kind: MessageKind,
        field: &'static str,
    },

    /// An integer that is not part of the [`ErrorCode`] enumeration.
    #[error("unknown error code {0}")]
    UnknownErrorCode(i32),
}

impl ProtocolError {
    /// The taxonomy code a peer should be told about this failure.
    ///
    /// Anything that fails to parse or classify is a parse error;
    /// an envelope that classifies but breaks exclusivity is an invalid
    /// request.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Encode(_) => ErrorCode::RpcInternalError,
            Self::Decode(_)
            | Self::Unclassifiable(_)
            | Self::UnknownErrorCode(_) => ErrorCode::RpcParseError,
            Self::ConflictingFields { .. } => ErrorCode::RpcInvalidRequest,
        }
    }
}
