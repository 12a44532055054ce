//! Framing types shared by every envelope: the protocol version, the
//! correlation id, and the request options that turn a request into a
//! stream.
//!
//! None of these carry payload. They are the small, fixed vocabulary a
//! receiver inspects to decide what kind of message it is looking at.

use std::fmt;

use std::marker::PhantomData;

use serde::de::{self, IntoDeserializer, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Number, Value};

// ---------------------------------------------------------------------------
// Version
// ---------------------------------------------------------------------------

/// The `jsonrpc` field of an envelope.
///
/// Only two literals exist on the wire. Anything else fails to
/// deserialize, so an unknown version is a decode error rather than a
/// value we silently carry around.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub enum Version {
    /// Plain JSON-RPC 2.0. Peers speaking it never send acks or streams.
    #[serde(rename = "2.0")]
    V2_0,

    /// The streaming-capable revision.
    #[serde(rename = "3.0")]
    V3_0,
}

impl Version {
    /// The newest released version. Every builder stamps this value.
    pub const LATEST: Version = Version::V3_0;

    /// The literal used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::V2_0 => "2.0",
            Self::V3_0 => "3.0",
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Id
// ---------------------------------------------------------------------------

/// A correlation id: pairs a request with its response, or names a stream.
///
/// `#[serde(untagged)]` lets the JSON value itself pick the variant:
/// `7` becomes `Num(7)`, `"s1"` becomes `Str("s1")`, and `null` becomes
/// `Null`. An explicit `null` is a real id ("no id"), which is different
/// from the field being absent altogether. Envelopes model absence with
/// `Option<Id>`.
///
/// Any JSON number is a valid id, including fractions and values past
/// `i64`. `1` and `1.0` are different ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    Num(Number),
    Str(String),
    Null,
}

impl Id {
    /// Returns `true` for `Id::Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Scripting-style truthiness, used when an id is given as the
    /// `options.stream` flag: `0`, `""` and `null` are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Num(n) => n.as_f64().is_some_and(|f| f != 0.0),
            Self::Str(s) => !s.is_empty(),
            Self::Null => false,
        }
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num(n) => write!(f, "{n}"),
            Self::Str(s) => f.write_str(s),
            Self::Null => f.write_str("null"),
        }
    }
}

impl From<i32> for Id {
    fn from(n: i32) -> Self {
        Self::Num(n.into())
    }
}

impl From<i64> for Id {
    fn from(n: i64) -> Self {
        Self::Num(n.into())
    }
}

impl From<u32> for Id {
    fn from(n: u32) -> Self {
        Self::Num(n.into())
    }
}

impl From<u64> for Id {
    fn from(n: u64) -> Self {
        Self::Num(n.into())
    }
}

impl From<Number> for Id {
    fn from(n: Number) -> Self {
        Self::Num(n)
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl From<String> for Id {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

// ---------------------------------------------------------------------------
// Request options
// ---------------------------------------------------------------------------

/// The value of `options.stream`: either a plain flag or an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StreamFlag {
    Enabled(bool),
    Id(Id),
}

impl StreamFlag {
    /// Whether this flag asks for a stream.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Enabled(on) => *on,
            Self::Id(id) => id.is_truthy(),
        }
    }
}

/// The `options` object of a request.
///
/// A request whose `stream` is truthy fans out into stream frames.
/// `abort` marks a follow-up request that cancels the stream started
/// under the same correlation id. Any other keys are application
/// options; they are kept in `extra` and written back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<StreamFlag>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abort: Option<bool>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RequestOptions {
    /// Options for a stream-producing request.
    pub fn stream() -> Self {
        Self {
            stream: Some(StreamFlag::Enabled(true)),
            ..Self::default()
        }
    }

    /// Returns `true` if `options.stream` is truthy.
    pub fn is_stream(&self) -> bool {
        self.stream.as_ref().is_some_and(StreamFlag::is_truthy)
    }

    /// Returns `true` if `options.abort` is set.
    pub fn is_abort(&self) -> bool {
        self.abort.unwrap_or(false)
    }
}

// ---------------------------------------------------------------------------
// Field presence
// ---------------------------------------------------------------------------

/// Deserializes a field that is known to be present.
///
/// Paired with `#[serde(default)]`, an absent key yields `None` while a
/// key holding `null` yields `Some(..)` of whatever `null` decodes to.
/// Plain `Option<T>` cannot tell those two apart, and field presence is
/// exactly what envelope classification keys off.
pub(crate) fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Deserializes an optional payload slot where `null` is itself a value.
///
/// `null` becomes `Some(..)` when `T` has a null form (as `Value` does)
/// and `None` otherwise, so a payload of `null` survives a round trip.
/// Pair with `#[serde(default)]` to read an absent key as `None`.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    struct NullableVisitor<T>(PhantomData<T>);

    impl<'de, T: Deserialize<'de>> Visitor<'de> for NullableVisitor<T> {
        type Value = Option<T>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("any value or null")
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            let unit: de::value::UnitDeserializer<E> = ().into_deserializer();
            Ok(T::deserialize(unit).ok())
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            self.visit_none()
        }

        fn visit_some<D2>(self, deserializer: D2) -> Result<Self::Value, D2::Error>
        where
            D2: Deserializer<'de>,
        {
            T::deserialize(deserializer).map(Some)
        }
    }

    deserializer.deserialize_option(NullableVisitor(PhantomData))
}

/// [`nullable`] for a key whose presence matters: absent is the outer
/// `None` (via `#[serde(default)]`), present is `Some(nullable(..))`.
pub(crate) fn present_nullable<'de, D, T>(
    deserializer: D,
) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    nullable(deserializer).map(Some)
}

/// Reads the `options` field of an envelope.
///
/// Options are opaque to plain JSON-RPC peers, so a value that is not an
/// object carries no stream flag and is dropped instead of failing the
/// whole envelope.
pub(crate) fn lenient_options<'de, D>(
    deserializer: D,
) -> Result<Option<RequestOptions>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Object(map) => serde_json::from_value(Value::Object(map))
            .map(Some)
            .map_err(de::Error::custom),
        Value::Null => Ok(None),
        other => {
            tracing::debug!(options = %other, "ignoring non-object request options");
            Ok(None)
        }
    }
}
