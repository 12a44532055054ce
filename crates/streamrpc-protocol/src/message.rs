//! The envelope model: one Rust type per message kind, and the tagged
//! [`Message`] sum a receiver decodes into.
//!
//! On the wire there is no explicit tag. Plain JSON-RPC 2.0 has none, and
//! we stay compatible with it. Instead the *presence* of a few fields
//! says what a message is:
//!
//! ```text
//!  method, options.stream falsy   → Request
//!  method, options.stream truthy  → StreamRequest
//!  stream + stream.data           → StreamData
//!  stream + result                → StreamDone
//!  stream + error                 → StreamError / StreamAbort
//!  result                         → SuccessResponse
//!  error                          → ErrorResponse
//!  ack                            → Ack
//! ```
//!
//! The decoder applies those rules once, in order, and hands back a
//! tagged value. Nobody downstream re-derives the kind from field
//! presence.
//!
//! Every variant struct keeps its fields private. Values come from the
//! builders in [`crate::builders`] or from the decoder, and both only
//! produce field combinations that classify back to the same kind.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, de};
use serde_json::Value;

use crate::stream::FrameKind;
use crate::types::{lenient_options, present, present_nullable};
use crate::{ErrorContext, Id, ProtocolError, RequestOptions, StreamFlag, Version};

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// A call that expects at most one response.
///
/// With no `id` it is fire-and-forget (a notification).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request<P = Value> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) jsonrpc: Option<Version>,
    pub(crate) method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) params: Option<P>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) id: Option<Id>,
    /// Only ever holds options whose `stream` flag is falsy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) options: Option<RequestOptions>,
}

impl<P> Request<P> {
    pub fn version(&self) -> Option<Version> {
        self.jsonrpc
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn params(&self) -> Option<&P> {
        self.params.as_ref()
    }

    /// The correlation id, if one was sent.
    pub fn id(&self) -> Option<&Id> {
        self.id.as_ref()
    }

    pub fn options(&self) -> Option<&RequestOptions> {
        self.options.as_ref()
    }

    /// A request without an id expects no response.
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    pub fn into_params(self) -> Option<P> {
        self.params
    }
}

/// A call that fans out into stream frames.
///
/// `options.stream` is always truthy. When `options.abort` is also set,
/// the request cancels the stream started earlier under the same id
/// instead of starting a new one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamRequest<P = Value> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) jsonrpc: Option<Version>,
    pub(crate) method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) params: Option<P>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) id: Option<Id>,
    pub(crate) options: RequestOptions,
}

impl<P> StreamRequest<P> {
    pub fn version(&self) -> Option<Version> {
        self.jsonrpc
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn params(&self) -> Option<&P> {
        self.params.as_ref()
    }

    pub fn id(&self) -> Option<&Id> {
        self.id.as_ref()
    }

    pub fn options(&self) -> &RequestOptions {
        &self.options
    }

    /// Returns `true` for a follow-up request that cancels a stream.
    pub fn is_abort(&self) -> bool {
        self.options.is_abort()
    }

    /// The id the stream's frames will carry in `stream.id`.
    ///
    /// If `options.stream` names an id, frames use it; otherwise they
    /// reuse the request's correlation id.
    pub fn stream_id(&self) -> Id {
        match &self.options.stream {
            Some(StreamFlag::Id(id)) if id.is_truthy() => id.clone(),
            _ => self.id.clone().unwrap_or(Id::Null),
        }
    }

    /// Makes the stream's frames carry `stream_id` instead of the
    /// request id.
    pub fn with_stream_id(mut self, stream_id: impl Into<Id>) -> Self {
        let stream_id = stream_id.into();
        // A falsy id would turn this back into a plain request.
        if stream_id.is_truthy() {
            self.options.stream = Some(StreamFlag::Id(stream_id));
        }
        self
    }

    pub fn into_params(self) -> Option<P> {
        self.params
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// The final result of a request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuccessResponse<R = Value> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) jsonrpc: Option<Version>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) id: Option<Id>,
    pub(crate) result: R,
}

impl<R> SuccessResponse<R> {
    pub fn version(&self) -> Option<Version> {
        self.jsonrpc
    }

    pub fn id(&self) -> Option<&Id> {
        self.id.as_ref()
    }

    pub fn result(&self) -> &R {
        &self.result
    }

    pub fn into_result(self) -> R {
        self.result
    }
}

/// A request failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorResponse<E = Value> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) jsonrpc: Option<Version>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) id: Option<Id>,
    pub(crate) error: ErrorContext<E>,
}

impl<E> ErrorResponse<E> {
    pub fn version(&self) -> Option<Version> {
        self.jsonrpc
    }

    pub fn id(&self) -> Option<&Id> {
        self.id.as_ref()
    }

    pub fn error(&self) -> &ErrorContext<E> {
        &self.error
    }

    pub fn into_error(self) -> ErrorContext<E> {
        self.error
    }
}

/// Receipt of a request, sent before (and distinct from) its result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ack<A = Value> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) jsonrpc: Option<Version>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) id: Option<Id>,
    pub(crate) ack: A,
}

impl<A> Ack<A> {
    pub fn version(&self) -> Option<Version> {
        self.jsonrpc
    }

    pub fn id(&self) -> Option<&Id> {
        self.id.as_ref()
    }

    pub fn ack(&self) -> &A {
        &self.ack
    }
}

// ---------------------------------------------------------------------------
// Stream frames
// ---------------------------------------------------------------------------

/// The `stream` object of a terminal frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamRef {
    pub(crate) id: Id,
}

/// The `stream` object of a data frame.
///
/// `data` is always written: the key's presence is what marks the frame
/// as data rather than a terminal frame. `None` is written as `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataFrame<D> {
    pub(crate) id: Id,
    pub(crate) data: Option<D>,
}

/// One partial update of a stream. Carries no top-level id, no result
/// and no error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamData<D = Value> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) jsonrpc: Option<Version>,
    pub(crate) stream: DataFrame<D>,
}

impl<D> StreamData<D> {
    pub fn version(&self) -> Option<Version> {
        self.jsonrpc
    }

    pub fn stream_id(&self) -> &Id {
        &self.stream.id
    }

    /// The frame's payload.
    ///
    /// A `null` on the wire reads back as `Some` when `D` has a null form
    /// (`Value::Null`) and as `None` when it does not.
    pub fn data(&self) -> Option<&D> {
        self.stream.data.as_ref()
    }

    pub fn into_data(self) -> Option<D> {
        self.stream.data
    }
}

impl StreamData {
    /// A data frame whose payload is `null`, e.g. a keep-alive tick.
    pub fn empty(stream_id: impl Into<Id>) -> Self {
        Self {
            jsonrpc: Some(Version::LATEST),
            stream: DataFrame {
                id: stream_id.into(),
                data: Some(Value::Null),
            },
        }
    }
}

/// Terminal success frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamDone<R = Value> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) jsonrpc: Option<Version>,
    pub(crate) stream: StreamRef,
    pub(crate) result: R,
}

impl<R> StreamDone<R> {
    pub fn version(&self) -> Option<Version> {
        self.jsonrpc
    }

    pub fn stream_id(&self) -> &Id {
        &self.stream.id
    }

    pub fn result(&self) -> &R {
        &self.result
    }

    pub fn into_result(self) -> R {
        self.result
    }
}

/// Terminal failure frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamError<E = Value> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) jsonrpc: Option<Version>,
    pub(crate) stream: StreamRef,
    pub(crate) error: ErrorContext<E>,
}

impl<E> StreamError<E> {
    pub fn version(&self) -> Option<Version> {
        self.jsonrpc
    }

    pub fn stream_id(&self) -> &Id {
        &self.stream.id
    }

    pub fn error(&self) -> &ErrorContext<E> {
        &self.error
    }
}

/// Terminal frame for a stream the client cancelled.
///
/// Structurally a [`StreamError`], but its code is always
/// [`ErrorCode::RpcClientCancelledRequest`](crate::ErrorCode): the only
/// ways to get one are [`StreamAbort::for_stream`] and the decoder, which
/// refines a stream error carrying that code into this type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamAbort<E = Value> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) jsonrpc: Option<Version>,
    pub(crate) stream: StreamRef,
    pub(crate) error: ErrorContext<E>,
}

impl<E> StreamAbort<E> {
    /// Cancels the stream identified by `stream_id`.
    pub fn for_stream(stream_id: impl Into<Id>) -> Self {
        Self {
            jsonrpc: Some(Version::LATEST),
            stream: StreamRef {
                id: stream_id.into(),
            },
            error: ErrorContext::client_cancelled().without_data(),
        }
    }

    pub fn version(&self) -> Option<Version> {
        self.jsonrpc
    }

    pub fn stream_id(&self) -> &Id {
        &self.stream.id
    }

    pub fn error(&self) -> &ErrorContext<E> {
        &self.error
    }
}

// ---------------------------------------------------------------------------
// MessageKind
// ---------------------------------------------------------------------------

/// The classification of an envelope, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Request,
    StreamRequest,
    StreamData,
    StreamDone,
    StreamError,
    StreamAbort,
    Success,
    Error,
    Ack,
}

impl MessageKind {
    /// `true` for frames that live under a `stream` object.
    pub fn is_stream_frame(self) -> bool {
        matches!(
            self,
            Self::StreamData
                | Self::StreamDone
                | Self::StreamError
                | Self::StreamAbort
        )
    }

    /// `true` for messages that end an exchange.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::StreamDone
                | Self::StreamError
                | Self::StreamAbort
                | Self::Success
                | Self::Error
        )
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Request => "Request",
            Self::StreamRequest => "StreamRequest",
            Self::StreamData => "StreamData",
            Self::StreamDone => "StreamDone",
            Self::StreamError => "StreamError",
            Self::StreamAbort => "StreamAbort",
            Self::Success => "SuccessResponse",
            Self::Error => "ErrorResponse",
            Self::Ack => "Ack",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// Any envelope, tagged with its kind.
///
/// `T` is the payload type used for every opaque slot (params, result,
/// ack, stream data, error data). It defaults to [`serde_json::Value`];
/// use a concrete type when both ends agree on one.
///
/// Serialization writes the inner envelope as-is (`untagged`).
/// Deserialization runs the discrimination rules in the module docs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Message<T = Value> {
    Request(Request<T>),
    StreamRequest(StreamRequest<T>),
    StreamData(StreamData<T>),
    StreamDone(StreamDone<T>),
    StreamError(StreamError<T>),
    StreamAbort(StreamAbort<T>),
    Success(SuccessResponse<T>),
    Error(ErrorResponse<T>),
    Ack(Ack<T>),
}

impl<T> Message<T> {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Request(_) => MessageKind::Request,
            Self::StreamRequest(_) => MessageKind::StreamRequest,
            Self::StreamData(_) => MessageKind::StreamData,
            Self::StreamDone(_) => MessageKind::StreamDone,
            Self::StreamError(_) => MessageKind::StreamError,
            Self::StreamAbort(_) => MessageKind::StreamAbort,
            Self::Success(_) => MessageKind::Success,
            Self::Error(_) => MessageKind::Error,
            Self::Ack(_) => MessageKind::Ack,
        }
    }

    /// The top-level correlation id. Always `None` for stream frames.
    pub fn id(&self) -> Option<&Id> {
        match self {
            Self::Request(m) => m.id(),
            Self::StreamRequest(m) => m.id(),
            Self::Success(m) => m.id(),
            Self::Error(m) => m.id(),
            Self::Ack(m) => m.id(),
            Self::StreamData(_)
            | Self::StreamDone(_)
            | Self::StreamError(_)
            | Self::StreamAbort(_) => None,
        }
    }

    /// The `stream.id` of a stream frame.
    pub fn stream_id(&self) -> Option<&Id> {
        match self {
            Self::StreamData(m) => Some(m.stream_id()),
            Self::StreamDone(m) => Some(m.stream_id()),
            Self::StreamError(m) => Some(m.stream_id()),
            Self::StreamAbort(m) => Some(m.stream_id()),
            _ => None,
        }
    }

    pub fn version(&self) -> Option<Version> {
        match self {
            Self::Request(m) => m.version(),
            Self::StreamRequest(m) => m.version(),
            Self::StreamData(m) => m.version(),
            Self::StreamDone(m) => m.version(),
            Self::StreamError(m) => m.version(),
            Self::StreamAbort(m) => m.version(),
            Self::Success(m) => m.version(),
            Self::Error(m) => m.version(),
            Self::Ack(m) => m.version(),
        }
    }

    /// How a stream frame moves its stream's state machine.
    pub fn frame_kind(&self) -> Option<FrameKind> {
        match self {
            Self::StreamData(_) => Some(FrameKind::Data),
            Self::StreamDone(_) => Some(FrameKind::Done),
            Self::StreamError(m) => Some(FrameKind::Error(m.error().code())),
            Self::StreamAbort(_) => Some(FrameKind::Abort),
            _ => None,
        }
    }
}

impl<T> From<Request<T>> for Message<T> {
    fn from(m: Request<T>) -> Self {
        Self::Request(m)
    }
}

impl<T> From<StreamRequest<T>> for Message<T> {
    fn from(m: StreamRequest<T>) -> Self {
        Self::StreamRequest(m)
    }
}

impl<T> From<StreamData<T>> for Message<T> {
    fn from(m: StreamData<T>) -> Self {
        Self::StreamData(m)
    }
}

impl<T> From<StreamDone<T>> for Message<T> {
    fn from(m: StreamDone<T>) -> Self {
        Self::StreamDone(m)
    }
}

/// A stream error carrying the cancellation code *is* an abort, and is
/// tagged as one here exactly as the decoder would tag it.
impl<T> From<StreamError<T>> for Message<T> {
    fn from(m: StreamError<T>) -> Self {
        if m.error.is_cancellation() {
            Self::StreamAbort(StreamAbort {
                jsonrpc: m.jsonrpc,
                stream: m.stream,
                error: m.error,
            })
        } else {
            Self::StreamError(m)
        }
    }
}

impl<T> From<StreamAbort<T>> for Message<T> {
    fn from(m: StreamAbort<T>) -> Self {
        Self::StreamAbort(m)
    }
}

impl<T> From<SuccessResponse<T>> for Message<T> {
    fn from(m: SuccessResponse<T>) -> Self {
        Self::Success(m)
    }
}

impl<T> From<ErrorResponse<T>> for Message<T> {
    fn from(m: ErrorResponse<T>) -> Self {
        Self::Error(m)
    }
}

impl<T> From<Ack<T>> for Message<T> {
    fn from(m: Ack<T>) -> Self {
        Self::Ack(m)
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Every field any envelope may carry, with presence preserved.
///
/// `#[serde(default, deserialize_with = "present")]` turns an absent key
/// into `None` and a key holding `null` into `Some(..)`. The explicit
/// `bound` is needed because serde does not infer bounds for fields with
/// a custom deserializer.
#[derive(Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub(crate) struct RawEnvelope<T> {
    #[serde(default)]
    jsonrpc: Option<Version>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default, deserialize_with = "present")]
    params: Option<T>,
    #[serde(default, deserialize_with = "present")]
    id: Option<Id>,
    #[serde(default, deserialize_with = "lenient_options")]
    options: Option<RequestOptions>,
    #[serde(default)]
    stream: Option<RawStream<T>>,
    #[serde(default, deserialize_with = "present")]
    result: Option<T>,
    #[serde(default)]
    error: Option<ErrorContext<T>>,
    #[serde(default, deserialize_with = "present")]
    ack: Option<T>,
}

/// The `stream` object. `data` is doubly optional: the outer layer
/// records whether the key exists, the inner one whether it holds a
/// payload of type `T`.
#[derive(Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct RawStream<T> {
    id: Id,
    #[serde(default, deserialize_with = "present_nullable")]
    data: Option<Option<T>>,
}

/// Fails if any of the listed fields is present.
fn reject_foreign(
    kind: MessageKind,
    fields: &[(&'static str, bool)],
) -> Result<(), ProtocolError> {
    match fields.iter().find(|(_, set)| *set) {
        Some(&(field, _)) => {
            tracing::debug!(%kind, field, "rejecting envelope");
            Err(ProtocolError::ConflictingFields { kind, field })
        }
        None => Ok(()),
    }
}

impl<T> RawEnvelope<T> {
    /// Applies the discrimination rules, first match wins, then rejects
    /// the envelope if it also carries a field foreign to its kind.
    pub(crate) fn classify(self) -> Result<Message<T>, ProtocolError> {
        let Self {
            jsonrpc,
            method,
            params,
            id,
            options,
            stream,
            result,
            error,
            ack,
        } = self;

        let has_result = result.is_some();
        let has_error = error.is_some();
        let has_ack = ack.is_some();
        let streaming = options.as_ref().is_some_and(RequestOptions::is_stream);

        // 1 + 2: requests.
        if let Some(method) = method {
            if streaming {
                reject_foreign(
                    MessageKind::StreamRequest,
                    &[
                        ("stream", stream.is_some()),
                        ("result", has_result),
                        ("error", has_error),
                        ("ack", has_ack),
                    ],
                )?;
                return Ok(Message::StreamRequest(StreamRequest {
                    jsonrpc,
                    method,
                    params,
                    id,
                    options: options.unwrap_or_else(RequestOptions::stream),
                }));
            }

            if stream.is_none() {
                reject_foreign(
                    MessageKind::Request,
                    &[
                        ("result", has_result),
                        ("error", has_error),
                        ("ack", has_ack),
                    ],
                )?;
                return Ok(Message::Request(Request {
                    jsonrpc,
                    method,
                    params,
                    id,
                    options,
                }));
            }

            // `method` next to a top-level `stream` is not a request.
            return Err(ProtocolError::ConflictingFields {
                kind: MessageKind::StreamData,
                field: "method",
            });
        }

        // 3 - 5: stream frames.
        if let Some(RawStream { id: stream_id, data }) = stream {
            let stream_ref = StreamRef { id: stream_id };

            if let Some(data) = data {
                reject_foreign(
                    MessageKind::StreamData,
                    &[
                        ("id", id.is_some()),
                        ("result", has_result),
                        ("error", has_error),
                        ("ack", has_ack),
                    ],
                )?;
                return Ok(Message::StreamData(StreamData {
                    jsonrpc,
                    stream: DataFrame {
                        id: stream_ref.id,
                        data,
                    },
                }));
            }

            if let Some(result) = result {
                reject_foreign(
                    MessageKind::StreamDone,
                    &[
                        ("id", id.is_some()),
                        ("error", has_error),
                        ("ack", has_ack),
                    ],
                )?;
                return Ok(Message::StreamDone(StreamDone {
                    jsonrpc,
                    stream: stream_ref,
                    result,
                }));
            }

            if let Some(error) = error {
                let kind = if error.is_cancellation() {
                    MessageKind::StreamAbort
                } else {
                    MessageKind::StreamError
                };
                reject_foreign(kind, &[("id", id.is_some()), ("ack", has_ack)])?;

                return Ok(if error.is_cancellation() {
                    Message::StreamAbort(StreamAbort {
                        jsonrpc,
                        stream: stream_ref,
                        error,
                    })
                } else {
                    Message::StreamError(StreamError {
                        jsonrpc,
                        stream: stream_ref,
                        error,
                    })
                });
            }

            return Err(ProtocolError::Unclassifiable(
                "stream frame carries neither data, result nor error",
            ));
        }

        // 6 - 8: responses.
        if let Some(result) = result {
            reject_foreign(
                MessageKind::Success,
                &[("error", has_error), ("ack", has_ack)],
            )?;
            return Ok(Message::Success(SuccessResponse {
                jsonrpc,
                id,
                result,
            }));
        }

        if let Some(error) = error {
            reject_foreign(MessageKind::Error, &[("ack", has_ack)])?;
            return Ok(Message::Error(ErrorResponse { jsonrpc, id, error }));
        }

        if let Some(ack) = ack {
            return Ok(Message::Ack(Ack { jsonrpc, id, ack }));
        }

        Err(ProtocolError::Unclassifiable(
            "no method, stream, result, error or ack",
        ))
    }
}

impl<'de, T> Deserialize<'de> for Message<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        RawEnvelope::<T>::deserialize(deserializer)?
            .classify()
            .map_err(de::Error::custom)
    }
}
