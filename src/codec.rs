//! Fixed-format packing of primitive values into byte buffers.
//!
//! Everything is big-endian so that the lexicographic order of an encoded
//! unsigned field matches its numeric order, which is what makes the
//! shrinker's byte-level moves meaningful for integers.
//!
//! Readers only ever move forward: a [`BufferReader`] advances its offset
//! monotonically and never rewinds.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use half::f16;
use std::io::Cursor;

/// A single fixed-width field in a format specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F16,
    F32,
    F64,
}

impl Field {
    /// Encoded size of this field in bytes.
    pub fn size(self) -> usize {
        match self {
            Field::U8 | Field::I8 => 1,
            Field::U16 | Field::I16 | Field::F16 => 2,
            Field::U32 | Field::I32 | Field::F32 => 4,
            Field::U64 | Field::I64 | Field::F64 => 8,
        }
    }
}

/// Total encoded size of a format specification.
pub fn format_size(format: &[Field]) -> usize {
    format.iter().map(|field| field.size()).sum()
}

/// A decoded (or to-be-encoded) primitive value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Unsigned(u64),
    Signed(i64),
    Float(f64),
}

impl Value {
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Value::Unsigned(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Signed(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Float(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("overrun at offset {offset}: needed {needed} bytes, {available} available")]
    Overrun {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("malformed buffer: {remaining} bytes left unconsumed")]
    MalformedBuffer { remaining: usize },

    #[error("format has {expected} fields but {actual} values were given")]
    FormatMismatch { expected: usize, actual: usize },

    #[error("value {index} does not fit field {field:?}")]
    ValueMismatch { index: usize, field: Field },
}

fn fits(field: Field, value: Value) -> bool {
    match (field, value) {
        (Field::U8, Value::Unsigned(v)) => v <= u8::MAX as u64,
        (Field::U16, Value::Unsigned(v)) => v <= u16::MAX as u64,
        (Field::U32, Value::Unsigned(v)) => v <= u32::MAX as u64,
        (Field::U64, Value::Unsigned(_)) => true,
        (Field::I8, Value::Signed(v)) => i8::try_from(v).is_ok(),
        (Field::I16, Value::Signed(v)) => i16::try_from(v).is_ok(),
        (Field::I32, Value::Signed(v)) => i32::try_from(v).is_ok(),
        (Field::I64, Value::Signed(_)) => true,
        (Field::F16, Value::Float(_))
        | (Field::F32, Value::Float(_))
        | (Field::F64, Value::Float(_)) => true,
        _ => false,
    }
}

/// Append the packed encoding of `values` to `buffer`.
///
/// The whole format is validated before anything is written, so a failed
/// call leaves `buffer` untouched.
pub fn write(buffer: &mut Vec<u8>, format: &[Field], values: &[Value]) -> Result<(), CodecError> {
    if format.len() != values.len() {
        return Err(CodecError::FormatMismatch {
            expected: format.len(),
            actual: values.len(),
        });
    }
    for (index, (field, value)) in format.iter().zip(values.iter()).enumerate() {
        if !fits(*field, *value) {
            return Err(CodecError::ValueMismatch {
                index,
                field: *field,
            });
        }
    }

    buffer.reserve(format_size(format));
    for (field, value) in format.iter().zip(values.iter()) {
        // Writes into a Vec<u8> cannot fail.
        let _ = match (*field, *value) {
            (Field::U8, Value::Unsigned(v)) => buffer.write_u8(v as u8),
            (Field::U16, Value::Unsigned(v)) => buffer.write_u16::<BigEndian>(v as u16),
            (Field::U32, Value::Unsigned(v)) => buffer.write_u32::<BigEndian>(v as u32),
            (Field::U64, Value::Unsigned(v)) => buffer.write_u64::<BigEndian>(v),
            (Field::I8, Value::Signed(v)) => buffer.write_i8(v as i8),
            (Field::I16, Value::Signed(v)) => buffer.write_i16::<BigEndian>(v as i16),
            (Field::I32, Value::Signed(v)) => buffer.write_i32::<BigEndian>(v as i32),
            (Field::I64, Value::Signed(v)) => buffer.write_i64::<BigEndian>(v),
            (Field::F16, Value::Float(v)) => {
                buffer.write_u16::<BigEndian>(f16::from_f64(v).to_bits())
            }
            (Field::F32, Value::Float(v)) => buffer.write_f32::<BigEndian>(v as f32),
            (Field::F64, Value::Float(v)) => buffer.write_f64::<BigEndian>(v),
            _ => unreachable!("validated above"),
        };
    }
    Ok(())
}

/// Decode one format specification from `buffer` starting at `offset`.
pub fn read(buffer: &[u8], offset: usize, format: &[Field]) -> Result<Vec<Value>, CodecError> {
    let mut reader = BufferReader::at(buffer, offset);
    reader.read(format)
}

/// Forward-only reader over a borrowed buffer.
#[derive(Debug, Clone)]
pub struct BufferReader<'a> {
    buffer: &'a [u8],
    offset: usize,
}

impl<'a> BufferReader<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self::at(buffer, 0)
    }

    pub fn at(buffer: &'a [u8], offset: usize) -> Self {
        BufferReader { buffer, offset }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.offset)
    }

    /// Decode the next values. On overrun the offset is left where it was.
    pub fn read(&mut self, format: &[Field]) -> Result<Vec<Value>, CodecError> {
        let needed = format_size(format);
        if needed > self.remaining() {
            return Err(CodecError::Overrun {
                offset: self.offset,
                needed,
                available: self.remaining(),
            });
        }

        let mut cursor = Cursor::new(&self.buffer[self.offset..self.offset + needed]);
        let mut values = Vec::with_capacity(format.len());
        for field in format {
            // The length check above guarantees these reads succeed.
            let value = match field {
                Field::U8 => cursor.read_u8().map(|v| Value::Unsigned(v as u64)),
                Field::U16 => cursor.read_u16::<BigEndian>().map(|v| Value::Unsigned(v as u64)),
                Field::U32 => cursor.read_u32::<BigEndian>().map(|v| Value::Unsigned(v as u64)),
                Field::U64 => cursor.read_u64::<BigEndian>().map(Value::Unsigned),
                Field::I8 => cursor.read_i8().map(|v| Value::Signed(v as i64)),
                Field::I16 => cursor.read_i16::<BigEndian>().map(|v| Value::Signed(v as i64)),
                Field::I32 => cursor.read_i32::<BigEndian>().map(|v| Value::Signed(v as i64)),
                Field::I64 => cursor.read_i64::<BigEndian>().map(Value::Signed),
                Field::F16 => cursor
                    .read_u16::<BigEndian>()
                    .map(|v| Value::Float(f16::from_bits(v).to_f64())),
                Field::F32 => cursor.read_f32::<BigEndian>().map(|v| Value::Float(v as f64)),
                Field::F64 => cursor.read_f64::<BigEndian>().map(Value::Float),
            };
            match value {
                Ok(value) => values.push(value),
                Err(_) => {
                    return Err(CodecError::Overrun {
                        offset: self.offset,
                        needed,
                        available: self.remaining(),
                    })
                }
            }
        }
        self.offset += needed;
        Ok(values)
    }

    /// Fails if bytes remain that nothing has consumed.
    pub fn assert_finished(&self) -> Result<(), CodecError> {
        match self.remaining() {
            0 => Ok(()),
            remaining => Err(CodecError::MalformedBuffer { remaining }),
        }
    }
}
