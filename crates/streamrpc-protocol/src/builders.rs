//! One constructor per message kind.
//!
//! Each builder takes only the fields that are legal for its kind and
//! fills in the rest (version, field exclusivity) itself. They are plain
//! functions: no validation, no failure mode. A wrong id type is a
//! compile error, not a runtime one.
//!
//! ```rust
//! use serde_json::json;
//! use streamrpc_protocol::builders::{request, stream_data};
//!
//! let req = request("getUser", json!({ "id": 7 }), 1);
//! assert_eq!(
//!     serde_json::to_value(&req).unwrap(),
//!     json!({ "jsonrpc": "3.0", "method": "getUser", "params": { "id": 7 }, "id": 1 })
//! );
//!
//! let frame = stream_data(json!({ "line": "hi" }), "s1");
//! assert_eq!(
//!     serde_json::to_value(&frame).unwrap(),
//!     json!({ "jsonrpc": "3.0", "stream": { "id": "s1", "data": { "line": "hi" } } })
//! );
//! ```

use crate::message::{DataFrame, StreamRef};
use crate::{
    Ack, ErrorContext, ErrorResponse, Id, Request, RequestOptions,
    StreamAbort, StreamData, StreamDone, StreamError, StreamRequest,
    SuccessResponse, Version,
};

/// A request expecting a response under `id`.
pub fn request<P>(
    method: impl Into<String>,
    params: P,
    id: impl Into<Id>,
) -> Request<P> {
    Request {
        jsonrpc: Some(Version::LATEST),
        method: method.into(),
        params: Some(params),
        id: Some(id.into()),
        options: None,
    }
}

/// A fire-and-forget request: no id, so no response.
pub fn notification<P>(method: impl Into<String>, params: P) -> Request<P> {
    Request {
        jsonrpc: Some(Version::LATEST),
        method: method.into(),
        params: Some(params),
        id: None,
        options: None,
    }
}

/// A request whose answer is a stream of frames keyed by `id`.
pub fn stream_request<P>(
    method: impl Into<String>,
    params: P,
    id: impl Into<Id>,
) -> StreamRequest<P> {
    StreamRequest {
        jsonrpc: Some(Version::LATEST),
        method: method.into(),
        params: Some(params),
        id: Some(id.into()),
        options: RequestOptions::stream(),
    }
}

/// Asks the peer to stop the stream it started for request `id`.
pub fn abort_request(
    method: impl Into<String>,
    id: impl Into<Id>,
) -> StreamRequest {
    StreamRequest {
        jsonrpc: Some(Version::LATEST),
        method: method.into(),
        params: None,
        id: Some(id.into()),
        options: RequestOptions {
            abort: Some(true),
            ..RequestOptions::stream()
        },
    }
}

/// The successful result of request `id`.
pub fn response<R>(result: R, id: impl Into<Id>) -> SuccessResponse<R> {
    SuccessResponse {
        jsonrpc: Some(Version::LATEST),
        id: Some(id.into()),
        result,
    }
}

/// The failure of request `id`.
pub fn error_response<E>(
    error: ErrorContext<E>,
    id: impl Into<Id>,
) -> ErrorResponse<E> {
    ErrorResponse {
        jsonrpc: Some(Version::LATEST),
        id: Some(id.into()),
        error,
    }
}

/// Acknowledges request `id` ahead of its result.
pub fn ack<A>(id: impl Into<Id>, ack: A) -> Ack<A> {
    Ack {
        jsonrpc: Some(Version::LATEST),
        id: Some(id.into()),
        ack,
    }
}

/// One partial frame of stream `id`.
pub fn stream_data<D>(data: D, id: impl Into<Id>) -> StreamData<D> {
    StreamData {
        jsonrpc: Some(Version::LATEST),
        stream: DataFrame {
            id: id.into(),
            data: Some(data),
        },
    }
}

/// Ends stream `id` with a result.
pub fn stream_done<R>(result: R, id: impl Into<Id>) -> StreamDone<R> {
    StreamDone {
        jsonrpc: Some(Version::LATEST),
        stream: StreamRef { id: id.into() },
        result,
    }
}

/// Ends stream `id` with an error.
///
/// A cancellation context here is still a cancellation: converting the
/// frame into a [`Message`](crate::Message) tags it `StreamAbort`, the
/// same as the decoder does. Prefer [`stream_abort`].
pub fn stream_error<E>(
    error: ErrorContext<E>,
    id: impl Into<Id>,
) -> StreamError<E> {
    StreamError {
        jsonrpc: Some(Version::LATEST),
        stream: StreamRef { id: id.into() },
        error,
    }
}

/// Cancels stream `id`.
pub fn stream_abort(id: impl Into<Id>) -> StreamAbort {
    StreamAbort::for_stream(id)
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::{ErrorCode, Message, MessageKind};

    #[test]
    fn test_request_json_format() {
        let json = serde_json::to_value(request("getUser", json!({ "id": 7 }), 1))
            .unwrap();
        assert_eq!(
            json,
            json!({ "jsonrpc": "3.0", "method": "getUser", "params": { "id": 7 }, "id": 1 })
        );
    }

    #[test]
    fn test_notification_has_no_id_key() {
        let note = notification("log", json!(["hello"]));
        assert!(note.is_notification());

        let json = serde_json::to_value(&note).unwrap();
        assert!(json.get("id").is_none());
    }

    #[test]
    fn test_stream_request_sets_stream_option() {
        let req = stream_request("tail", json!({ "file": "a.log" }), "s1");
        let json = serde_json::to_value(&req).unwrap();

        assert_eq!(json["options"]["stream"], json!(true));
        assert_eq!(req.stream_id(), Id::from("s1"));
        assert!(!req.is_abort());
    }

    #[test]
    fn test_stream_request_with_explicit_stream_id() {
        let req = stream_request("tail", json!({}), 1).with_stream_id("t-1");
        assert_eq!(req.stream_id(), Id::from("t-1"));

        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["options"]["stream"], json!("t-1"));
        assert_eq!(json["id"], json!(1));
    }

    #[test]
    fn test_stream_request_ignores_falsy_stream_id() {
        let req = stream_request("tail", json!({}), 1).with_stream_id("");
        assert_eq!(req.stream_id(), Id::from(1));
        assert!(req.options().is_stream());
    }

    #[test]
    fn test_abort_request_json_format() {
        let req = abort_request("tail", "s1");
        assert!(req.is_abort());
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(
            json,
            json!({
                "jsonrpc": "3.0", "method": "tail", "id": "s1",
                "options": { "stream": true, "abort": true }
            })
        );
    }

    #[test]
    fn test_response_with_null_id() {
        let resp = response(json!("pong"), Id::Null);
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json, json!({ "jsonrpc": "3.0", "id": null, "result": "pong" }));
    }

    #[test]
    fn test_error_response_json_format() {
        let resp = error_response(ErrorContext::timeout(), 5);
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(
            json,
            json!({
                "jsonrpc": "3.0", "id": 5,
                "error": { "code": -32008, "title": "Timeout" }
            })
        );
        assert!(json.get("result").is_none());
    }

    #[test]
    fn test_ack_json_format() {
        let json = serde_json::to_value(ack(3, json!({}))).unwrap();
        assert_eq!(json, json!({ "jsonrpc": "3.0", "id": 3, "ack": {} }));
    }

    #[test]
    fn test_stream_data_json_format() {
        let json = serde_json::to_value(stream_data(json!({ "line": "hi" }), "s1"))
            .unwrap();
        assert_eq!(
            json,
            json!({ "jsonrpc": "3.0", "stream": { "id": "s1", "data": { "line": "hi" } } })
        );
        assert!(json.get("id").is_none());
    }

    #[test]
    fn test_empty_stream_data_keeps_data_key() {
        let json = serde_json::to_value(StreamData::empty("s1")).unwrap();
        assert_eq!(json["stream"], json!({ "id": "s1", "data": null }));
    }

    #[test]
    fn test_stream_done_json_format() {
        let json = serde_json::to_value(stream_done(json!({ "lines": 42 }), "s1"))
            .unwrap();
        assert_eq!(
            json,
            json!({ "jsonrpc": "3.0", "stream": { "id": "s1" }, "result": { "lines": 42 } })
        );
    }

    #[test]
    fn test_stream_abort_json_format() {
        let json = serde_json::to_value(stream_abort("s1")).unwrap();
        assert_eq!(
            json,
            json!({
                "jsonrpc": "3.0",
                "stream": { "id": "s1" },
                "error": {
                    "code": -32800,
                    "title": "Cancelled",
                    "message": "Request cancelled by Client"
                }
            })
        );
    }

    #[test]
    fn test_stream_abort_code_is_fixed() {
        let abort = stream_abort(9);
        assert_eq!(abort.error().code(), ErrorCode::RpcClientCancelledRequest);
        assert_eq!(abort.stream_id(), &Id::from(9));
    }

    #[test]
    fn test_stream_error_has_no_top_level_id() {
        let frame = stream_error(ErrorContext::generic().with_message("boom"), "s1");
        let json = serde_json::to_value(&frame).unwrap();
        assert!(json.get("id").is_none());
        assert!(json.get("result").is_none());
        assert_eq!(json["error"]["code"], json!(-32603));
    }

    #[test]
    fn test_builder_kinds() {
        let cases: Vec<(Message, MessageKind)> = vec![
            (request("m", Value::Null, 1).into(), MessageKind::Request),
            (stream_request("m", Value::Null, 1).into(), MessageKind::StreamRequest),
            (response(Value::Null, 1).into(), MessageKind::Success),
            (error_response(ErrorContext::generic(), 1).into(), MessageKind::Error),
            (ack(1, Value::Null).into(), MessageKind::Ack),
            (stream_data(Value::Null, 1).into(), MessageKind::StreamData),
            (stream_done(Value::Null, 1).into(), MessageKind::StreamDone),
            (stream_error(ErrorContext::timeout(), 1).into(), MessageKind::StreamError),
            (stream_abort(1).into(), MessageKind::StreamAbort),
        ];

        for (msg, kind) in cases {
            assert_eq!(msg.kind(), kind);
        }
    }
}
