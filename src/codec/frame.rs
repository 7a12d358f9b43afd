//! Frame layout
//!
//! Every frame starts with a two byte header:
//!
//! ```text
//! byte0: [method:4][path_len_hi:4]
//! byte1: path_len_lo:8            (12-bit big-endian path length)
//! bytes[2..2+path_len): UTF-8 path
//! ```
//!
//! Requests then carry a method specific tail (`SUBSCRIBE`: u32 interval,
//! `SET`: typed value). Data frames pushed by the broker always carry a typed
//! value: one tag byte, a u32 big-endian payload length, the payload.

use super::CodecError;
use super::value::{Value, ValueType};

/// Largest path length the 12-bit header field can describe.
pub const MAX_PATH_LEN: usize = 0x0FFF;

/// The 4-bit method code in the high nibble of the first header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Set,
    Subscribe,
    Data,
}

impl Method {
    pub fn code(self) -> u8 {
        match self {
            Method::Get => 0b0001,
            Method::Set => 0b0010,
            Method::Subscribe => 0b0011,
            Method::Data => 0b1000,
        }
    }

    pub fn from_code(code: u8) -> Option<Method> {
        match code {
            0b0001 => Some(Method::Get),
            0b0010 => Some(Method::Set),
            0b0011 => Some(Method::Subscribe),
            0b1000 => Some(Method::Data),
            _ => None,
        }
    }
}

/// A client → broker request.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Get { path: String },
    Set { path: String, value: Value },
    Subscribe { path: String, interval_ms: u32 },
}

impl Request {
    pub fn method(&self) -> Method {
        match self {
            Request::Get { .. } => Method::Get,
            Request::Set { .. } => Method::Set,
            Request::Subscribe { .. } => Method::Subscribe,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Request::Get { path } | Request::Set { path, .. } | Request::Subscribe { path, .. } => {
                path
            }
        }
    }

    /// Encodes the request into a single binary frame.
    ///
    /// Paths longer than [`MAX_PATH_LEN`] bytes are rejected rather than
    /// sent with a clamped length field.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let mut out = encode_header(self.method(), self.path())?;
        match self {
            Request::Get { .. } => {}
            Request::Set { value, .. } => put_typed(&mut out, value)?,
            Request::Subscribe { interval_ms, .. } => {
                out.extend_from_slice(&interval_ms.to_be_bytes());
            }
        }
        Ok(out)
    }
}

/// A broker → client frame carrying the current value of one topic.
#[derive(Debug, Clone, PartialEq)]
pub struct DataFrame {
    pub path: String,
    pub value: Value,
}

impl DataFrame {
    pub fn new(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            path: path.into(),
            value: value.into(),
        }
    }

    /// Encodes the frame the way the broker does.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let mut out = encode_header(Method::Data, &self.path)?;
        put_typed(&mut out, &self.value)?;
        Ok(out)
    }
}

/// Decodes an inbound data frame.
///
/// Returns `Ok(None)` for frames that are not data frames or that are too
/// short to carry a header; those are ignored by the caller.
pub fn decode_data_frame(bytes: &[u8]) -> Result<Option<DataFrame>, CodecError> {
    // The method nibble decides first, so other frames never reach path parsing.
    match bytes.first() {
        Some(&b) if b >> 4 == Method::Data.code() => {}
        _ => return Ok(None),
    }
    let Some((_, path, rest)) = split_header(bytes)? else {
        return Ok(None);
    };

    let value = take_typed(rest)?;
    Ok(Some(DataFrame { path, value }))
}

/// Decodes a client request, as the broker would.
pub fn decode_request(bytes: &[u8]) -> Result<Option<Request>, CodecError> {
    let Some((method, path, rest)) = split_header(bytes)? else {
        return Ok(None);
    };

    let request = match Method::from_code(method) {
        Some(Method::Get) => Request::Get { path },
        Some(Method::Set) => Request::Set {
            path,
            value: take_typed(rest)?,
        },
        Some(Method::Subscribe) => {
            let interval = rest.get(..4).ok_or(CodecError::Truncated("interval"))?;
            Request::Subscribe {
                path,
                interval_ms: u32::from_be_bytes([interval[0], interval[1], interval[2], interval[3]]),
            }
        }
        Some(Method::Data) | None => return Ok(None),
    };

    Ok(Some(request))
}

fn encode_header(method: Method, path: &str) -> Result<Vec<u8>, CodecError> {
    let path_bytes = path.as_bytes();
    let len = path_bytes.len();
    if len > MAX_PATH_LEN {
        return Err(CodecError::PathTooLong(len));
    }

    let mut out = Vec::with_capacity(2 + len);
    out.push((method.code() << 4) | ((len >> 8) as u8 & 0x0F));
    out.push((len & 0xFF) as u8);
    out.extend_from_slice(path_bytes);
    Ok(out)
}

fn split_header(bytes: &[u8]) -> Result<Option<(u8, String, &[u8])>, CodecError> {
    if bytes.len() < 2 {
        return Ok(None);
    }

    let method = bytes[0] >> 4;
    let path_len = (usize::from(bytes[0] & 0x0F) << 8) | usize::from(bytes[1]);
    let end = 2 + path_len;
    let path = bytes.get(2..end).ok_or(CodecError::Truncated("path"))?;
    let path = std::str::from_utf8(path)?.to_string();

    Ok(Some((method, path, &bytes[end..])))
}

fn put_typed(out: &mut Vec<u8>, value: &Value) -> Result<(), CodecError> {
    let payload = value.pack();
    let len = u32::try_from(payload.len()).map_err(|_| CodecError::PayloadTooLarge(payload.len()))?;

    out.push(value.value_type().tag());
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(&payload);
    Ok(())
}

fn take_typed(body: &[u8]) -> Result<Value, CodecError> {
    let (&tag, rest) = body.split_first().ok_or(CodecError::Truncated("type tag"))?;
    let ty = ValueType::try_from(tag)?;

    let len = rest.get(..4).ok_or(CodecError::Truncated("payload length"))?;
    let len = u32::from_be_bytes([len[0], len[1], len[2], len[3]]) as usize;
    let data = rest.get(4..4 + len).ok_or(CodecError::Truncated("payload"))?;

    Value::unpack(ty, data)
}
