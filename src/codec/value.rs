use std::fmt;
use std::str::FromStr;

use super::CodecError;

/// The wire type tag carried in front of every value payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ValueType {
    Byte = 0x01,
    Int16 = 0x02,
    Int32 = 0x03,
    Int64 = 0x04,
    Float32 = 0x05,
    Float64 = 0x06,
    String = 0x07,
    Bool = 0x08,
}

impl ValueType {
    pub const ALL: [ValueType; 8] = [
        ValueType::Byte,
        ValueType::Int16,
        ValueType::Int32,
        ValueType::Int64,
        ValueType::Float32,
        ValueType::Float64,
        ValueType::String,
        ValueType::Bool,
    ];

    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Payload width for fixed-width types, `None` for bytes and strings.
    pub fn fixed_width(self) -> Option<usize> {
        match self {
            ValueType::Int16 => Some(2),
            ValueType::Int32 | ValueType::Float32 => Some(4),
            ValueType::Int64 | ValueType::Float64 => Some(8),
            ValueType::Bool => Some(1),
            ValueType::Byte | ValueType::String => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ValueType::Byte => "byte",
            ValueType::Int16 => "int16",
            ValueType::Int32 => "int32",
            ValueType::Int64 => "int64",
            ValueType::Float32 => "float32",
            ValueType::Float64 => "float64",
            ValueType::String => "string",
            ValueType::Bool => "bool",
        }
    }
}

impl TryFrom<u8> for ValueType {
    type Error = CodecError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        ValueType::ALL
            .into_iter()
            .find(|ty| ty.tag() == tag)
            .ok_or(CodecError::UnknownType(tag))
    }
}

/// Accepts the canonical names plus the aliases the robot-side clients use
/// (`short`, `int`, `long`, `float`, `double`, `boolean`).
impl FromStr for ValueType {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "byte" | "bytes" => Ok(ValueType::Byte),
            "int16" | "short" => Ok(ValueType::Int16),
            "int32" | "int" => Ok(ValueType::Int32),
            "int64" | "long" => Ok(ValueType::Int64),
            "float" | "float32" => Ok(ValueType::Float32),
            "double" | "float64" => Ok(ValueType::Float64),
            "string" | "str" => Ok(ValueType::String),
            "bool" | "boolean" => Ok(ValueType::Bool),
            _ => Err(CodecError::UnknownTypeName(s.to_string())),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A typed topic value.
///
/// The variant decides the wire tag, so there is no way to send a value
/// under a tag that does not match its payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bytes(Vec<u8>),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(String),
    Bool(bool),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Bytes(_) => ValueType::Byte,
            Value::Int16(_) => ValueType::Int16,
            Value::Int32(_) => ValueType::Int32,
            Value::Int64(_) => ValueType::Int64,
            Value::Float32(_) => ValueType::Float32,
            Value::Float64(_) => ValueType::Float64,
            Value::String(_) => ValueType::String,
            Value::Bool(_) => ValueType::Bool,
        }
    }

    /// Encodes the payload bytes. Numbers are always big-endian.
    pub fn pack(&self) -> Vec<u8> {
        match self {
            Value::Bytes(bytes) => bytes.clone(),
            Value::Int16(v) => v.to_be_bytes().to_vec(),
            Value::Int32(v) => v.to_be_bytes().to_vec(),
            Value::Int64(v) => v.to_be_bytes().to_vec(),
            Value::Float32(v) => v.to_be_bytes().to_vec(),
            Value::Float64(v) => v.to_be_bytes().to_vec(),
            Value::String(s) => s.as_bytes().to_vec(),
            Value::Bool(b) => vec![u8::from(*b)],
        }
    }

    /// Decodes a payload according to its type tag.
    pub fn unpack(ty: ValueType, data: &[u8]) -> Result<Value, CodecError> {
        if let Some(expected) = ty.fixed_width() {
            if data.len() != expected {
                return Err(CodecError::InvalidLength {
                    ty,
                    expected,
                    actual: data.len(),
                });
            }
        }

        let value = match ty {
            ValueType::Byte => Value::Bytes(data.to_vec()),
            ValueType::Int16 => Value::Int16(i16::from_be_bytes([data[0], data[1]])),
            ValueType::Int32 => Value::Int32(i32::from_be_bytes(fixed(data))),
            ValueType::Int64 => Value::Int64(i64::from_be_bytes(fixed(data))),
            ValueType::Float32 => Value::Float32(f32::from_be_bytes(fixed(data))),
            ValueType::Float64 => Value::Float64(f64::from_be_bytes(fixed(data))),
            ValueType::String => Value::String(std::str::from_utf8(data)?.to_string()),
            ValueType::Bool => Value::Bool(data[0] != 0),
        };

        Ok(value)
    }

    /// Builds a value of type `ty` from a textual literal.
    ///
    /// Bytes are written as comma-separated decimal octets (`"1,2,255"`);
    /// booleans accept `true`/`false`/`1`/`0`.
    pub fn parse(ty: ValueType, literal: &str) -> Result<Value, CodecError> {
        let invalid = || CodecError::InvalidLiteral {
            ty,
            literal: literal.to_string(),
        };
        let trimmed = literal.trim();

        let value = match ty {
            ValueType::Byte => {
                if trimmed.is_empty() {
                    Value::Bytes(Vec::new())
                } else {
                    let bytes = trimmed
                        .split(',')
                        .map(|octet| octet.trim().parse::<u8>())
                        .collect::<Result<Vec<_>, _>>()
                        .map_err(|_| invalid())?;
                    Value::Bytes(bytes)
                }
            }
            ValueType::Int16 => Value::Int16(trimmed.parse().map_err(|_| invalid())?),
            ValueType::Int32 => Value::Int32(trimmed.parse().map_err(|_| invalid())?),
            ValueType::Int64 => Value::Int64(trimmed.parse().map_err(|_| invalid())?),
            ValueType::Float32 => Value::Float32(trimmed.parse().map_err(|_| invalid())?),
            ValueType::Float64 => Value::Float64(trimmed.parse().map_err(|_| invalid())?),
            ValueType::String => Value::String(literal.to_string()),
            ValueType::Bool => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "1" => Value::Bool(true),
                "false" | "0" => Value::Bool(false),
                _ => return Err(invalid()),
            },
        };

        Ok(value)
    }

    /// Integer view of the integer variants.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int16(v) => Some(i64::from(*v)),
            Value::Int32(v) => Some(i64::from(*v)),
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    /// Floating point view of every numeric variant.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float32(v) => Some(f64::from(*v)),
            Value::Float64(v) => Some(*v),
            other => other.as_i64().map(|v| v as f64),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

fn fixed<const N: usize>(data: &[u8]) -> [u8; N] {
    let mut buf = [0u8; N];
    buf.copy_from_slice(&data[..N]);
    buf
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bytes(bytes) => write!(f, "{bytes:?}"),
            Value::Int16(v) => write!(f, "{v}"),
            Value::Int32(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Float32(v) => write!(f, "{v}"),
            Value::Float64(v) => write!(f, "{v}"),
            Value::String(s) => f.write_str(s),
            Value::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::Int16(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}
