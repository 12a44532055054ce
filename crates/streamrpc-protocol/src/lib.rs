//! Wire protocol for streamrpc.
//!
//! This crate defines the envelopes a client and a service exchange, a
//! JSON-RPC 2.0 compatible model extended with acks and streams:
//!
//! - **Envelopes** ([`Request`], [`StreamRequest`], [`SuccessResponse`],
//!   [`ErrorResponse`], [`Ack`], [`StreamData`], [`StreamDone`],
//!   [`StreamError`], [`StreamAbort`]): one type per message kind, all
//!   gathered in the tagged [`Message`] a receiver decodes into.
//! - **Builders** ([`builders`]): the only way to make a well-formed
//!   envelope from scratch.
//! - **Error taxonomy** ([`ErrorCode`], [`ErrorContext`]): every remote
//!   failure as a stable `(code, title)` pair.
//! - **Stream states** ([`StreamState`], [`FrameKind`]): what a frame
//!   does to its stream.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): envelopes to bytes and
//!   back.
//!
//! # Architecture
//!
//! The protocol layer is pure data. It has no I/O, no shared state, and
//! no idea which streams are open:
//!
//! ```text
//! Transport (bytes) → Protocol (Message) → Stream tracker (per-id state)
//! ```

mod codec;
mod error;
mod error_code;
mod message;
mod stream;
mod types;

pub mod builders;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use error_code::{ErrorCode, ErrorContext, SendStatus};
pub use message::{
    Ack, DataFrame, ErrorResponse, Message, MessageKind, Request,
    StreamAbort, StreamData, StreamDone, StreamError, StreamRef,
    StreamRequest, SuccessResponse,
};
pub use stream::{FrameKind, StreamState};
pub use types::{Id, RequestOptions, StreamFlag, Version};
