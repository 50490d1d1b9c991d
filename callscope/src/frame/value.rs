//! Decoded argument/return value graphs.
//!
//! Detailed frames carry opaque capture payloads; decoding them into a
//! [`Value`] graph is the job of an external collaborator behind the
//! [`ValueDecoder`] trait. The built-in [`JsonValueDecoder`] reads payloads
//! that are JSON-encoded value graphs, which is what the replay binary and
//! the test suite use.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// One decoded value in an argument or return-value graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Void,
    Bool(bool),
    Char(char),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Str(String),
    /// A pointer: the address plus the pointee (Void for null pointers).
    Ptr { address: u64, pointee: Box<Value> },
    /// A function pointer; only the address is captured.
    FnPtr(u64),
    /// Single- or arbitrary-rank array. `shape` holds the per-dimension
    /// lengths; `elements` is the row-major flattening.
    Array { shape: Vec<usize>, elements: Vec<Value> },
    /// Composite value: named, ordered fields plus the type name.
    Struct {
        type_name: String,
        fields: Vec<(String, Value)>,
    },
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => write!(f, "void"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Char(v) => write!(f, "'{v}'"),
            Value::I8(v) => write!(f, "{v}"),
            Value::I16(v) => write!(f, "{v}"),
            Value::I32(v) => write!(f, "{v}"),
            Value::I64(v) => write!(f, "{v}"),
            Value::U8(v) => write!(f, "{v}"),
            Value::U16(v) => write!(f, "{v}"),
            Value::U32(v) => write!(f, "{v}"),
            Value::U64(v) => write!(f, "{v}"),
            Value::F32(v) => write!(f, "{v}"),
            Value::F64(v) => write!(f, "{v}"),
            Value::Str(v) => write!(f, "\"{v}\""),
            Value::Ptr { address, pointee } => write!(f, "*0x{address:x} -> {pointee}"),
            Value::FnPtr(address) => write!(f, "fn@0x{address:x}"),
            Value::Array { shape, elements } => {
                let dims: Vec<String> = shape.iter().map(ToString::to_string).collect();
                write!(f, "array[{}] ({} elements)", dims.join(","), elements.len())
            }
            Value::Struct { type_name, fields } => {
                write!(f, "{type_name} {{{} fields}}", fields.len())
            }
        }
    }
}

/// Decoded values for one detailed frame: enter arguments plus, once the
/// frame has been left, its return value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DecodedFrame {
    pub parameters: Vec<Value>,
    pub return_value: Option<Value>,
}

/// A capture payload could not be decoded. Degrades one frame's fidelity;
/// never aborts the trace.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("malformed capture payload: {0}")]
    Malformed(String),
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        DecodeError::Malformed(err.to_string())
    }
}

/// Decodes opaque capture payloads into value graphs.
///
/// Implementations must be `Sync`: the query engine decodes from a pool of
/// classification workers.
pub trait ValueDecoder: Sync {
    /// Decode an enter payload into the ordered argument list.
    fn decode_parameters(&self, payload: &[u8]) -> Result<Vec<Value>, DecodeError>;

    /// Decode an exit payload into the return value.
    fn decode_return(&self, payload: &[u8]) -> Result<Value, DecodeError>;
}

/// Decoder for payloads that are JSON-encoded [`Value`] graphs.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonValueDecoder;

impl ValueDecoder for JsonValueDecoder {
    fn decode_parameters(&self, payload: &[u8]) -> Result<Vec<Value>, DecodeError> {
        Ok(serde_json::from_slice(payload)?)
    }

    fn decode_return(&self, payload: &[u8]) -> Result<Value, DecodeError> {
        Ok(serde_json::from_slice(payload)?)
    }
}
