//! The `codec` module owns the Topica wire format.
//!
//! - `value`: the closed set of wire types and their pack/unpack rules.
//! - `frame`: request encoding (client → broker) and data-frame decoding
//!   (broker → client), plus the broker-side halves used by tooling and tests.
//!
//! Nothing in here touches the network; every function works on byte slices.

pub mod frame;
pub mod value;

pub use frame::{DataFrame, MAX_PATH_LEN, Method, Request, decode_data_frame, decode_request};
pub use value::{Value, ValueType};

/// Errors raised while encoding or decoding a single frame.
///
/// A codec error only ever aborts the operation or frame at hand; the
/// connection it happened on stays usable.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The encoded path does not fit the 12-bit length field.
    #[error("topic path is {0} bytes, the wire allows at most 4095")]
    PathTooLong(usize),
    /// A type tag outside `0x01..=0x08`.
    #[error("unknown value type tag 0x{0:02x}")]
    UnknownType(u8),
    /// A textual type name that matches no wire type.
    #[error("unknown value type name `{0}`")]
    UnknownTypeName(String),
    /// The frame ended before the named section was complete.
    #[error("frame truncated while reading {0}")]
    Truncated(&'static str),
    /// A fixed-width payload with the wrong number of bytes.
    #[error("{ty} payload must be {expected} bytes, got {actual}")]
    InvalidLength {
        ty: ValueType,
        expected: usize,
        actual: usize,
    },
    /// Path or string payload that is not valid UTF-8.
    #[error("invalid UTF-8 on the wire: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
    /// A literal that cannot be parsed as the requested type.
    #[error("cannot parse `{literal}` as {ty}")]
    InvalidLiteral { ty: ValueType, literal: String },
    /// A payload whose length does not fit the 32-bit length field.
    #[error("payload of {0} bytes exceeds the 32-bit length field")]
    PayloadTooLarge(usize),
}
