//! The error taxonomy: one flat, signed code space plus the canonical
//! [`ErrorContext`] shape every failure is reported in.
//!
//! Two numbering spaces share the enumeration:
//!
//! ```text
//!    400 ..=    521   conventional, HTTP-style status semantics
//! -32001 ..= -32040   extended RPC conditions (incl. send failures)
//! -32600 ..= -32800   JSON-RPC reserved range + client cancellation
//! ```
//!
//! The numeric values are part of the external contract: remote peers
//! key behavior off them, so they must never change.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// Every error code a peer may send or receive.
///
/// `#[repr(i32)]` pins each variant to its wire value, so `code as i32`
/// is the number that goes on the wire. Serde goes through `i32` in both
/// directions, which makes decoding reject integers outside the set.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(into = "i32", try_from = "i32")]
#[repr(i32)]
pub enum ErrorCode {
    // -- Conventional --
    BadRequest = 400,
    Unauthenticated = 401,
    PaymentRequired = 402,
    Unauthorized = 403,
    NotFound = 404,
    MethodNotAllowed = 405,
    Timeout = 408,
    Conflict = 409,
    /// Too early: the server is not ready yet.
    NotReady = 425,
    TooManyRequests = 429,
    InternalError = 500,
    MethodNotImplemented = 501,
    /// Overloaded, unable to complete the request.
    ServerBusy = 503,
    ServerDown = 521,

    // -- JSON-RPC reserved --
    RpcInvalidRequest = -32600,
    RpcMethodNotFound = -32601,
    RpcInvalidParams = -32602,
    RpcInternalError = -32603,
    RpcParseError = -32700,
    /// Voluntary abort by the client. Never a genuine failure.
    RpcClientCancelledRequest = -32800,

    // -- Extended RPC conditions --
    RpcUnauthenticated = -32001,
    RpcForbidden = -32003,
    RpcResourceNotFound = -32004,
    RpcMethodNotSupported = -32005,
    RpcTimeout = -32008,
    RpcConflict = -32009,
    RpcPreconditionFailed = -32012,
    RpcPayloadTooLarge = -32013,
    RpcTooManyRequests = -32029,
    RpcConnectFailure = -32030,

    // -- Send failures: base -32040, see `SendStatus` --
    RpcSendConnClosed = -32038,
    RpcSendPacketDropped = -32039,
    RpcSendFailure = -32040,
}

impl ErrorCode {
    /// Upper end of the send-failure block (`-32040 + 10`).
    ///
    /// It lands on the same value as [`ErrorCode::RpcConnectFailure`], so
    /// it is an alias rather than a variant of its own.
    pub const RPC_SEND_FAILURE_MAX: ErrorCode = ErrorCode::RpcConnectFailure;

    /// Every code, in declaration order.
    pub const ALL: [ErrorCode; 33] = [
        Self::BadRequest,
        Self::Unauthenticated,
        Self::PaymentRequired,
        Self::Unauthorized,
        Self::NotFound,
        Self::MethodNotAllowed,
        Self::Timeout,
        Self::Conflict,
        Self::NotReady,
        Self::TooManyRequests,
        Self::InternalError,
        Self::MethodNotImplemented,
        Self::ServerBusy,
        Self::ServerDown,
        Self::RpcInvalidRequest,
        Self::RpcMethodNotFound,
        Self::RpcInvalidParams,
        Self::RpcInternalError,
        Self::RpcParseError,
        Self::RpcClientCancelledRequest,
        Self::RpcUnauthenticated,
        Self::RpcForbidden,
        Self::RpcResourceNotFound,
        Self::RpcMethodNotSupported,
        Self::RpcTimeout,
        Self::RpcConflict,
        Self::RpcPreconditionFailed,
        Self::RpcPayloadTooLarge,
        Self::RpcTooManyRequests,
        Self::RpcConnectFailure,
        Self::RpcSendConnClosed,
        Self::RpcSendPacketDropped,
        Self::RpcSendFailure,
    ];

    /// The wire value.
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Looks a wire value up in the enumeration.
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }

    /// `true` for the conventional (HTTP-style) block.
    pub fn is_conventional(self) -> bool {
        self.code() > 0
    }

    /// `true` for any negative, RPC-specific code.
    pub fn is_rpc(self) -> bool {
        self.code() < 0
    }

    /// `true` for the reserved client-cancellation code.
    pub fn is_cancellation(self) -> bool {
        matches!(self, Self::RpcClientCancelledRequest)
    }

    /// `true` for the three named send-failure codes.
    pub fn is_send_failure(self) -> bool {
        matches!(
            self,
            Self::RpcSendFailure
                | Self::RpcSendPacketDropped
                | Self::RpcSendConnClosed
        )
    }

    /// Human-readable label used when an error arrives without a title.
    pub fn title(self) -> &'static str {
        match self {
            Self::BadRequest => "Bad Request",
            Self::Unauthenticated | Self::RpcUnauthenticated => {
                "UnAuthenticated"
            }
            Self::PaymentRequired => "Payment Required",
            Self::Unauthorized | Self::RpcForbidden => "UnAuthorized",
            Self::NotFound
            | Self::RpcMethodNotFound
            | Self::RpcResourceNotFound => "NotFound",
            Self::MethodNotAllowed | Self::RpcMethodNotSupported => {
                "Method Not Allowed"
            }
            Self::Timeout | Self::RpcTimeout => "Timeout",
            Self::Conflict | Self::RpcConflict => "Already Exists",
            Self::NotReady => "Not Ready",
            Self::TooManyRequests | Self::RpcTooManyRequests => {
                "Too Many Requests"
            }
            Self::InternalError | Self::RpcInternalError => "Error",
            Self::MethodNotImplemented => "Not Implemented",
            Self::ServerBusy => "Server Busy",
            Self::ServerDown => "Server Down",
            Self::RpcInvalidRequest => "Invalid Request",
            Self::RpcInvalidParams => "Invalid Params",
            Self::RpcParseError => "Parse Error",
            Self::RpcClientCancelledRequest => "Cancelled",
            Self::RpcPreconditionFailed => "Precondition Failed",
            Self::RpcPayloadTooLarge => "Payload Too Large",
            Self::RpcConnectFailure => "Connect Failure",
            Self::RpcSendConnClosed
            | Self::RpcSendPacketDropped
            | Self::RpcSendFailure => "Send Failure",
        }
    }
}

impl From<ErrorCode> for i32 {
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

impl TryFrom<i32> for ErrorCode {
    type Error = ProtocolError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or(ProtocolError::UnknownErrorCode(code))
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.title(), self.code())
    }
}

// ---------------------------------------------------------------------------
// SendStatus
// ---------------------------------------------------------------------------

/// Why a transport failed to send, as an offset into the send-failure
/// block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SendStatus {
    /// Generic failure, offset 0.
    Failed,
    /// The packet was dropped, offset 1.
    PacketDropped,
    /// The connection closed underneath the send, offset 2.
    ConnClosed,
    /// Sentinel at the top of the block, offset 10.
    Exhausted,
}

impl SendStatus {
    /// Offset from [`ErrorCode::RpcSendFailure`].
    pub const fn offset(self) -> i32 {
        match self {
            Self::Failed => 0,
            Self::PacketDropped => 1,
            Self::ConnClosed => 2,
            Self::Exhausted => 10,
        }
    }

    /// Maps a raw transport status. Unknown statuses collapse to the
    /// sentinel so the result always stays inside the taxonomy.
    pub fn from_raw(status: u8) -> Self {
        match status {
            0 => Self::Failed,
            1 => Self::PacketDropped,
            2 => Self::ConnClosed,
            _ => Self::Exhausted,
        }
    }

    /// The taxonomy code for this status.
    pub fn code(self) -> ErrorCode {
        match self {
            Self::Failed => ErrorCode::RpcSendFailure,
            Self::PacketDropped => ErrorCode::RpcSendPacketDropped,
            Self::ConnClosed => ErrorCode::RpcSendConnClosed,
            Self::Exhausted => ErrorCode::RPC_SEND_FAILURE_MAX,
        }
    }
}

// ---------------------------------------------------------------------------
// ErrorContext
// ---------------------------------------------------------------------------

/// The canonical shape of every failure on the wire.
///
/// ```json
/// { "code": -32601, "title": "NotFound", "message": "no such user" }
/// ```
///
/// `title` is never empty. `message` and `data` are optional and
/// consumers must not assume either is present. `data` is opaque to the
/// protocol: any structured diagnostic payload the caller likes.
///
/// Build one with the canonical constructors (`not_found()`,
/// `timeout()`, ...) and refine it with the `with_*` methods.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorContext<D = Value> {
    code: ErrorCode,
    title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<D>,
}

impl ErrorContext {
    fn canonical(code: ErrorCode, title: &str) -> Self {
        Self {
            code,
            title: title.to_owned(),
            message: None,
            data: None,
        }
    }

    /// The client gave up on a request or stream.
    ///
    /// This is the only constructor that produces
    /// [`ErrorCode::RpcClientCancelledRequest`].
    pub fn client_cancelled() -> Self {
        Self::canonical(ErrorCode::RpcClientCancelledRequest, "Cancelled")
            .with_message("Request cancelled by Client")
    }

    /// The resource already exists.
    pub fn duplicate() -> Self {
        Self::canonical(ErrorCode::RpcConflict, "Already Exists")
    }

    pub fn invalid_request() -> Self {
        Self::canonical(ErrorCode::RpcInvalidRequest, "Invalid Request")
    }

    pub fn not_found() -> Self {
        Self::canonical(ErrorCode::RpcMethodNotFound, "NotFound")
    }

    /// A transport could not deliver a message.
    pub fn send_failure(status: SendStatus) -> Self {
        Self::canonical(status.code(), "Send Failure")
            .with_message("Send Failure")
    }

    pub fn timeout() -> Self {
        Self::canonical(ErrorCode::RpcTimeout, "Timeout")
    }

    pub fn unauthenticated() -> Self {
        Self::canonical(ErrorCode::RpcUnauthenticated, "UnAuthenticated")
    }

    pub fn unauthorized() -> Self {
        Self::canonical(ErrorCode::RpcForbidden, "UnAuthorized")
    }

    /// Fallback for anything else. Title and code can be overridden.
    pub fn generic() -> Self {
        Self::canonical(ErrorCode::RpcInternalError, "Error")
    }

    /// Wraps an arbitrary Rust error as a generic error context, keeping
    /// its display text as the message.
    pub fn from_error(err: &dyn std::error::Error) -> Self {
        Self::generic().with_message(err.to_string())
    }
}

impl<D> ErrorContext<D> {
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn data(&self) -> Option<&D> {
        self.data.as_ref()
    }

    /// Returns `true` if this context reports a client cancellation.
    pub fn is_cancellation(&self) -> bool {
        self.code.is_cancellation()
    }

    /// Sets the human-readable message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Reports the same logical error under another code, e.g. a timeout
    /// as the conventional `408` instead of `-32008`.
    ///
    /// The cancellation code is reserved for [`ErrorContext::client_cancelled`];
    /// asking for it here leaves the code unchanged.
    pub fn with_code(mut self, code: ErrorCode) -> Self {
        if code.is_cancellation() && !self.code.is_cancellation() {
            tracing::warn!(
                title = %self.title,
                "ignoring override to the reserved cancellation code"
            );
            return self;
        }
        self.code = code;
        self
    }

    /// Replaces the title. An empty title is ignored.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        let title = title.into();
        if !title.is_empty() {
            self.title = title;
        }
        self
    }

    /// Attaches a diagnostic payload, changing the payload type if needed.
    pub fn with_data<E>(self, data: E) -> ErrorContext<E> {
        ErrorContext {
            code: self.code,
            title: self.title,
            message: self.message,
            data: Some(data),
        }
    }

    /// Drops any payload, so the context fits an envelope of another
    /// payload type.
    pub fn without_data<E>(self) -> ErrorContext<E> {
        ErrorContext {
            code: self.code,
            title: self.title,
            message: self.message,
            data: None,
        }
    }
}

impl From<&ProtocolError> for ErrorContext {
    fn from(err: &ProtocolError) -> Self {
        let code = err.error_code();
        Self::canonical(code, code.title()).with_message(err.to_string())
    }
}

/// Plain JSON-RPC 2.0 peers send `{code, message}` with no title, so a
/// missing or empty title is filled from the code's canonical label.
impl<'de, D> Deserialize<'de> for ErrorContext<D>
where
    D: Deserialize<'de>,
{
    fn deserialize<De>(deserializer: De) -> Result<Self, De::Error>
    where
        De: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(bound(deserialize = "W: Deserialize<'de>"))]
        struct Wire<W> {
            code: ErrorCode,
            #[serde(default)]
            title: Option<String>,
            #[serde(default)]
            message: Option<String>,
            #[serde(default, deserialize_with = "crate::types::nullable")]
            data: Option<W>,
        }

        let wire = Wire::<D>::deserialize(deserializer)?;
        let title = match wire.title {
            Some(title) if !title.is_empty() => title,
            _ => wire.code.title().to_owned(),
        };

        Ok(Self {
            code: wire.code,
            title,
            message: wire.message,
            data: wire.data,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    // =====================================================================
    // ErrorCode
    // =====================================================================

    #[test]
    fn test_error_code_values_are_bit_exact() {
        assert_eq!(ErrorCode::BadRequest.code(), 400);
        assert_eq!(ErrorCode::NotReady.code(), 425);
        assert_eq!(ErrorCode::ServerDown.code(), 521);
        assert_eq!(ErrorCode::RpcInvalidRequest.code(), -32600);
        assert_eq!(ErrorCode::RpcMethodNotFound.code(), -32601);
        assert_eq!(ErrorCode::RpcParseError.code(), -32700);
        assert_eq!(ErrorCode::RpcClientCancelledRequest.code(), -32800);
        assert_eq!(ErrorCode::RpcPreconditionFailed.code(), -32012);
        assert_eq!(ErrorCode::RpcConnectFailure.code(), -32030);
    }

    #[test]
    fn test_send_failure_block_offsets() {
        let base = ErrorCode::RpcSendFailure.code();
        assert_eq!(base, -32040);
        assert_eq!(ErrorCode::RpcSendPacketDropped.code(), base + 1);
        assert_eq!(ErrorCode::RpcSendConnClosed.code(), base + 2);
        assert_eq!(ErrorCode::RPC_SEND_FAILURE_MAX.code(), base + 10);
    }

    #[test]
    fn test_all_codes_are_distinct_and_round_trip() {
        for code in ErrorCode::ALL {
            assert_eq!(ErrorCode::from_code(code.code()), Some(code));
            let n = ErrorCode::ALL
                .iter()
                .filter(|c| c.code() == code.code())
                .count();
            assert_eq!(n, 1, "duplicate value for {code:?}");
        }
    }

    #[test]
    fn test_error_code_serializes_as_integer() {
        let json = serde_json::to_string(&ErrorCode::RpcTimeout).unwrap();
        assert_eq!(json, "-32008");

        let code: ErrorCode = serde_json::from_str("404").unwrap();
        assert_eq!(code, ErrorCode::NotFound);
    }

    #[test]
    fn test_unknown_error_code_is_rejected() {
        let result: Result<ErrorCode, _> = serde_json::from_str("-1");
        assert!(result.is_err());
        assert!(matches!(
            ErrorCode::try_from(418),
            Err(ProtocolError::UnknownErrorCode(418))
        ));
    }

    #[test]
    fn test_error_code_number_spaces() {
        assert!(ErrorCode::ServerBusy.is_conventional());
        assert!(!ErrorCode::ServerBusy.is_rpc());
        assert!(ErrorCode::RpcForbidden.is_rpc());
        assert!(ErrorCode::RpcClientCancelledRequest.is_cancellation());
        assert!(!ErrorCode::RpcInternalError.is_cancellation());
        assert!(ErrorCode::RpcSendPacketDropped.is_send_failure());
        assert!(!ErrorCode::RpcConnectFailure.is_send_failure());
    }

    #[test]
    fn test_error_code_display() {
        assert_eq!(ErrorCode::RpcTimeout.to_string(), "Timeout (-32008)");
    }

    // =====================================================================
    // SendStatus
    // =====================================================================

    #[test]
    fn test_send_status_from_raw() {
        assert_eq!(SendStatus::from_raw(0), SendStatus::Failed);
        assert_eq!(SendStatus::from_raw(1), SendStatus::PacketDropped);
        assert_eq!(SendStatus::from_raw(2), SendStatus::ConnClosed);
        assert_eq!(SendStatus::from_raw(10), SendStatus::Exhausted);
        assert_eq!(SendStatus::from_raw(7), SendStatus::Exhausted);
    }

    #[test]
    fn test_send_status_code_matches_offset() {
        for status in [
            SendStatus::Failed,
            SendStatus::PacketDropped,
            SendStatus::ConnClosed,
            SendStatus::Exhausted,
        ] {
            assert_eq!(
                status.code().code(),
                ErrorCode::RpcSendFailure.code() + status.offset()
            );
        }
    }

    // =====================================================================
    // ErrorContext
    // =====================================================================

    #[test]
    fn test_not_found_json_format() {
        let err = ErrorContext::not_found().with_message("no such user");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(
            json,
            json!({ "code": -32601, "title": "NotFound", "message": "no such user" })
        );
    }

    #[test]
    fn test_canonical_titles_and_codes() {
        let cases = [
            (ErrorContext::duplicate(), ErrorCode::RpcConflict, "Already Exists"),
            (
                ErrorContext::invalid_request(),
                ErrorCode::RpcInvalidRequest,
                "Invalid Request",
            ),
            (ErrorContext::timeout(), ErrorCode::RpcTimeout, "Timeout"),
            (
                ErrorContext::unauthenticated(),
                ErrorCode::RpcUnauthenticated,
                "UnAuthenticated",
            ),
            (ErrorContext::unauthorized(), ErrorCode::RpcForbidden, "UnAuthorized"),
            (ErrorContext::generic(), ErrorCode::RpcInternalError, "Error"),
        ];

        for (err, code, title) in cases {
            assert_eq!(err.code(), code);
            assert_eq!(err.title(), title);
            assert!(err.message().is_none());
            assert!(err.data().is_none());
        }
    }

    #[test]
    fn test_client_cancelled() {
        let err = ErrorContext::client_cancelled();
        assert_eq!(err.code(), ErrorCode::RpcClientCancelledRequest);
        assert_eq!(err.title(), "Cancelled");
        assert_eq!(err.message(), Some("Request cancelled by Client"));
        assert!(err.is_cancellation());
    }

    #[test]
    fn test_send_failure_context() {
        let err = ErrorContext::send_failure(SendStatus::ConnClosed);
        assert_eq!(err.code(), ErrorCode::RpcSendConnClosed);
        assert_eq!(err.title(), "Send Failure");
        assert_eq!(err.message(), Some("Send Failure"));
    }

    #[test]
    fn test_code_override() {
        let err = ErrorContext::timeout().with_code(ErrorCode::Timeout);
        assert_eq!(err.code(), ErrorCode::Timeout);
        assert_eq!(err.title(), "Timeout");
    }

    #[test]
    fn test_code_override_cannot_forge_cancellation() {
        let err = ErrorContext::generic()
            .with_code(ErrorCode::RpcClientCancelledRequest);
        assert_eq!(err.code(), ErrorCode::RpcInternalError);
        assert!(!err.is_cancellation());
    }

    #[test]
    fn test_generic_title_override_ignores_empty() {
        let err = ErrorContext::generic().with_title("Quota");
        assert_eq!(err.title(), "Quota");

        let err = ErrorContext::generic().with_title("");
        assert_eq!(err.title(), "Error");
    }

    #[test]
    fn test_with_data_changes_payload_type() {
        let err = ErrorContext::duplicate().with_data(vec![1u8, 2]);
        assert_eq!(err.data(), Some(&vec![1u8, 2]));
        assert_eq!(err.code(), ErrorCode::RpcConflict);

        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["data"], json!([1, 2]));
    }

    #[test]
    fn test_from_error_keeps_display_text() {
        let io = std::io::Error::other("disk on fire");
        let err = ErrorContext::from_error(&io);
        assert_eq!(err.code(), ErrorCode::RpcInternalError);
        assert_eq!(err.message(), Some("disk on fire"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ErrorContext::from(&ProtocolError::Unclassifiable("empty"));
        assert_eq!(err.code(), ErrorCode::RpcParseError);
        assert_eq!(err.title(), "Parse Error");
        assert!(err.message().is_some_and(|m| m.contains("empty")));
    }

    #[test]
    fn test_missing_title_filled_from_code() {
        // A plain JSON-RPC 2.0 error object has no title.
        let err: ErrorContext =
            serde_json::from_str(r#"{"code": -32601, "message": "nope"}"#)
                .unwrap();
        assert_eq!(err.title(), "NotFound");
        assert_eq!(err.message(), Some("nope"));
    }

    #[test]
    fn test_empty_title_filled_from_code() {
        let err: ErrorContext =
            serde_json::from_str(r#"{"code": 408, "title": ""}"#).unwrap();
        assert_eq!(err.title(), "Timeout");
    }

    #[test]
    fn test_error_context_rejects_unknown_code() {
        let result: Result<ErrorContext, _> =
            serde_json::from_str(r#"{"code": 7, "title": "Odd"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_error_context_round_trip_with_data() {
        let err = ErrorContext::invalid_request()
            .with_message("bad params")
            .with_data(json!({ "field": "id" }));
        let bytes = serde_json::to_vec(&err).unwrap();
        let decoded: ErrorContext = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(err, decoded);
    }

    #[test]
    fn test_error_context_null_data_survives_round_trip() {
        let err = ErrorContext::generic().with_data(Value::Null);
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["data"], Value::Null);
        assert!(json.as_object().is_some_and(|o| o.contains_key("data")));

        let decoded: ErrorContext = serde_json::from_value(json).unwrap();
        assert_eq!(decoded.data(), Some(&Value::Null));
        assert_eq!(err, decoded);
    }
}
