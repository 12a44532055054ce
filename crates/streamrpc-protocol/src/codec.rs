//! Codec trait and implementations for serializing/deserializing envelopes.
//!
//! The envelope model does not care HOW messages become bytes, only that
//! field presence survives the trip (presence is what classification
//! keys off). Anything implementing [`Codec`] will do; [`JsonCodec`] is
//! the one we ship.

use serde::{Serialize, de::DeserializeOwned};

use crate::message::RawEnvelope;
use crate::{Message, ProtocolError};

/// A codec that can encode Rust values to bytes and decode bytes back.
///
/// `Send + Sync + 'static` so a codec can live inside a connection task
/// for as long as the connection does.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;

    /// Decodes and classifies an envelope in one step.
    ///
    /// Unlike `decode::<Message<T>>`, classification failures come back
    /// as their own [`ProtocolError`] variants instead of being folded
    /// into a generic decode error.
    ///
    /// # Errors
    /// - `ProtocolError::Decode`: the bytes are not an envelope object
    /// - `ProtocolError::Unclassifiable`: no discriminating field matched
    /// - `ProtocolError::ConflictingFields`: fields of two kinds at once
    fn decode_message<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<Message<T>, ProtocolError> {
        let raw: RawEnvelope<T> = self.decode(data)?;
        raw.classify()
    }
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ## Example
///
/// ```rust
/// use serde_json::json;
/// use streamrpc_protocol::{Codec, JsonCodec, Message, MessageKind, builders};
///
/// let codec = JsonCodec;
///
/// let frame = builders::stream_done(json!({ "lines": 42 }), "s1");
/// let bytes = codec.encode(&frame).unwrap();
///
/// let decoded: Message = codec.decode_message(&bytes).unwrap();
/// assert_eq!(decoded.kind(), MessageKind::StreamDone);
/// assert_eq!(decoded, Message::from(frame));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::builders;

    #[test]
    fn test_decode_garbage_returns_decode_error() {
        let result: Result<Message, _> =
            JsonCodec.decode_message(b"not json at all");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_decode_non_object_returns_decode_error() {
        let result: Result<Message, _> = JsonCodec.decode_message(b"[1, 2]");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_decode_message_keeps_classification_error() {
        let result: Result<Message, _> =
            JsonCodec.decode_message(br#"{"jsonrpc": "3.0"}"#);
        assert!(matches!(result, Err(ProtocolError::Unclassifiable(_))));
    }

    #[test]
    fn test_plain_decode_folds_classification_error() {
        // Through serde's Deserialize impl the same failure is a decode
        // error carrying the classification message.
        let result: Result<Message, _> = JsonCodec.decode(br#"{"jsonrpc": "3.0"}"#);
        let err = result.unwrap_err();
        assert!(matches!(err, ProtocolError::Decode(_)));
        assert!(err.to_string().contains("unclassifiable"));
    }

    #[test]
    fn test_encode_decode_typed_payload() {
        #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
        struct Line {
            text: String,
        }

        let frame = builders::stream_data(Line { text: "hi".into() }, "s1");
        let bytes = JsonCodec.encode(&frame).unwrap();
        let decoded: Message<Line> = JsonCodec.decode_message(&bytes).unwrap();

        let Message::StreamData(decoded) = decoded else {
            panic!("expected stream data");
        };
        assert_eq!(decoded.data(), Some(&Line { text: "hi".into() }));
    }

    #[test]
    fn test_encode_is_compact_json() {
        let bytes = JsonCodec.encode(&builders::ack(1, json!(true))).unwrap();
        assert_eq!(bytes, br#"{"jsonrpc":"3.0","id":1,"ack":true}"#.to_vec());
    }
}
