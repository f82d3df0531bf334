//! MessagePack decoder producing value trees
//!
//! Reads exactly what the encoder writes (plus the few marker families it
//! never emits but a foreign producer might, such as `f32` and `bin`), so
//! encoded output can be checked without leaving the crate.

use crate::config::DEFAULT_MAX_DEPTH;
use crate::value::ValueTree;
use rmp::Marker;
use thiserror::Error;

/// Error type for decoding
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unexpected end of input at offset {offset}")]
    UnexpectedEof { offset: usize },

    #[error("reserved marker 0xc1 at offset {offset}")]
    ReservedMarker { offset: usize },

    #[error("extension type marker 0x{marker:02x} at offset {offset} is not supported")]
    UnsupportedExtension { marker: u8, offset: usize },

    #[error("map key at index {index} is {found}, expected str")]
    InvalidKeyType { index: usize, found: &'static str },

    #[error("value nests deeper than {limit} levels")]
    MaxDepthExceeded { limit: usize },

    #[error("{remaining} trailing bytes after value")]
    TrailingBytes { remaining: usize },
}

/// Cursor over encoded input
pub struct Decoder<'de> {
    input: &'de [u8],
    pos: usize,
    max_depth: usize,
}

impl<'de> Decoder<'de> {
    pub fn new(input: &'de [u8]) -> Self {
        Self {
            input,
            pos: 0,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Bytes not yet consumed
    #[inline]
    pub fn remaining(&self) -> usize {
        self.input.len() - self.pos
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Decode the next complete value
    pub fn read_value(&mut self) -> Result<ValueTree, DecodeError> {
        self.read_node(0)
    }

    #[inline(always)]
    fn read_u8(&mut self) -> Result<u8, DecodeError> {
        let Some(&v) = self.input.get(self.pos) else {
            return Err(DecodeError::UnexpectedEof { offset: self.pos });
        };
        self.pos += 1;
        Ok(v)
    }

    #[inline(always)]
    fn read_bytes(&mut self, len: usize) -> Result<&'de [u8], DecodeError> {
        if len > self.remaining() {
            return Err(DecodeError::UnexpectedEof {
                offset: self.input.len(),
            });
        }
        let slice = &self.input[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    #[inline(always)]
    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    #[inline(always)]
    fn read_u16(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    #[inline(always)]
    fn read_u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    #[inline(always)]
    fn read_u64(&mut self) -> Result<u64, DecodeError> {
        Ok(u64::from_be_bytes(self.read_array()?))
    }

    fn read_node(&mut self, depth: usize) -> Result<ValueTree, DecodeError> {
        let offset = self.pos;
        let marker = Marker::from_u8(self.read_u8()?);

        let node = match marker {
            Marker::Null => ValueTree::Nil,
            Marker::True => ValueTree::Bool(true),
            Marker::False => ValueTree::Bool(false),

            Marker::FixPos(v) => ValueTree::Int(i64::from(v)),
            Marker::FixNeg(v) => ValueTree::Int(i64::from(v)),
            Marker::U8 => ValueTree::Int(i64::from(self.read_u8()?)),
            Marker::U16 => ValueTree::Int(i64::from(self.read_u16()?)),
            Marker::U32 => ValueTree::Int(i64::from(self.read_u32()?)),
            Marker::U64 => unsigned(self.read_u64()?),
            Marker::I8 => ValueTree::Int(i64::from(self.read_u8()? as i8)),
            Marker::I16 => ValueTree::Int(i64::from(self.read_u16()? as i16)),
            Marker::I32 => ValueTree::Int(i64::from(self.read_u32()? as i32)),
            Marker::I64 => ValueTree::Int(self.read_u64()? as i64),

            Marker::F32 => ValueTree::Double(f64::from(f32::from_bits(self.read_u32()?))),
            Marker::F64 => ValueTree::Double(f64::from_bits(self.read_u64()?)),

            Marker::FixStr(len) => self.read_str(usize::from(len))?,
            Marker::Str8 | Marker::Bin8 => {
                let len = self.read_u8()?;
                self.read_str(usize::from(len))?
            }
            Marker::Str16 | Marker::Bin16 => {
                let len = self.read_u16()?;
                self.read_str(usize::from(len))?
            }
            Marker::Str32 | Marker::Bin32 => {
                let len = self.read_u32()?;
                self.read_str(len as usize)?
            }

            Marker::FixArray(len) => self.read_array_body(usize::from(len), depth)?,
            Marker::Array16 => {
                let len = self.read_u16()?;
                self.read_array_body(usize::from(len), depth)?
            }
            Marker::Array32 => {
                let len = self.read_u32()?;
                self.read_array_body(len as usize, depth)?
            }

            Marker::FixMap(len) => self.read_map_body(usize::from(len), depth)?,
            Marker::Map16 => {
                let len = self.read_u16()?;
                self.read_map_body(usize::from(len), depth)?
            }
            Marker::Map32 => {
                let len = self.read_u32()?;
                self.read_map_body(len as usize, depth)?
            }

            Marker::Reserved => return Err(DecodeError::ReservedMarker { offset }),
            ext => {
                return Err(DecodeError::UnsupportedExtension {
                    marker: ext.to_u8(),
                    offset,
                })
            }
        };
        Ok(node)
    }

    #[inline]
    fn read_str(&mut self, len: usize) -> Result<ValueTree, DecodeError> {
        Ok(ValueTree::str(self.read_bytes(len)?))
    }

    fn enter(&self, depth: usize, len: usize) -> Result<(), DecodeError> {
        if len > 0 && depth >= self.max_depth {
            return Err(DecodeError::MaxDepthExceeded {
                limit: self.max_depth,
            });
        }
        Ok(())
    }

    fn read_array_body(&mut self, len: usize, depth: usize) -> Result<ValueTree, DecodeError> {
        self.enter(depth, len)?;
        // every element takes at least one byte
        let mut items = Vec::with_capacity(len.min(self.remaining()));
        for _ in 0..len {
            items.push(self.read_node(depth + 1)?);
        }
        Ok(ValueTree::Array(items))
    }

    fn read_map_body(&mut self, len: usize, depth: usize) -> Result<ValueTree, DecodeError> {
        self.enter(depth, len)?;
        let mut entries = Vec::with_capacity(len.min(self.remaining() / 2));
        for index in 0..len {
            let key = self.read_node(depth + 1)?;
            if !key.is_str() {
                return Err(DecodeError::InvalidKeyType {
                    index,
                    found: key.kind(),
                });
            }
            let value = self.read_node(depth + 1)?;
            entries.push((key, value));
        }
        Ok(ValueTree::Map(entries))
    }
}

#[inline]
fn unsigned(v: u64) -> ValueTree {
    match i64::try_from(v) {
        Ok(i) => ValueTree::Int(i),
        Err(_) => ValueTree::UInt(v),
    }
}

/// Decode exactly one value from `bytes`
#[inline]
pub fn decode(bytes: &[u8]) -> Result<ValueTree, DecodeError> {
    let _span = tracing::debug_span!("decode", bytes = bytes.len()).entered();
    let mut decoder = Decoder::new(bytes);
    let value = decoder.read_value()?;
    match decoder.remaining() {
        0 => Ok(value),
        remaining => Err(DecodeError::TrailingBytes { remaining }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_primitives() {
        assert_eq!(decode(&[0xc0]).unwrap(), ValueTree::Nil);
        assert_eq!(decode(&[0xc3]).unwrap(), ValueTree::Bool(true));
        assert_eq!(decode(&[0xc2]).unwrap(), ValueTree::Bool(false));
        assert_eq!(decode(&[0x7f]).unwrap(), ValueTree::Int(127));
        assert_eq!(decode(&[0xff]).unwrap(), ValueTree::Int(-1));
        assert_eq!(decode(&[0xd0, 0xdf]).unwrap(), ValueTree::Int(-33));
        assert_eq!(decode(&[0xcd, 0x03, 0xe8]).unwrap(), ValueTree::Int(1000));
    }

    #[test]
    fn test_decode_wide_integers() {
        let mut max = vec![0xcf];
        max.extend_from_slice(&u64::MAX.to_be_bytes());
        assert_eq!(decode(&max).unwrap(), ValueTree::UInt(u64::MAX));

        let mut min = vec![0xd3];
        min.extend_from_slice(&i64::MIN.to_be_bytes());
        assert_eq!(decode(&min).unwrap(), ValueTree::Int(i64::MIN));
    }

    #[test]
    fn test_decode_floats() {
        let mut f32_bytes = vec![0xca];
        f32_bytes.extend_from_slice(&0.5f32.to_be_bytes());
        assert_eq!(decode(&f32_bytes).unwrap(), ValueTree::Double(0.5));

        let mut f64_bytes = vec![0xcb];
        f64_bytes.extend_from_slice(&(-2.25f64).to_be_bytes());
        assert_eq!(decode(&f64_bytes).unwrap(), ValueTree::Double(-2.25));
    }

    #[test]
    fn test_decode_bin_as_str() {
        assert_eq!(decode(&[0xc4, 0x02, 0xff, 0x00]).unwrap(), ValueTree::str([0xffu8, 0x00]));
    }

    #[test]
    fn test_decode_map_in_order() {
        let bytes = [0x82, 0xa1, b'b', 0xc0, 0xa1, b'a', 0xc3];
        assert_eq!(
            decode(&bytes).unwrap(),
            ValueTree::map([("b", ValueTree::Nil), ("a", ValueTree::Bool(true))])
        );
    }

    #[test]
    fn test_truncated_input() {
        assert_eq!(decode(&[]), Err(DecodeError::UnexpectedEof { offset: 0 }));
        assert_eq!(decode(&[0x93, 0x01]), Err(DecodeError::UnexpectedEof { offset: 2 }));
        assert_eq!(decode(&[0xa5, b'h']), Err(DecodeError::UnexpectedEof { offset: 2 }));
    }

    #[test]
    fn test_huge_declared_length_does_not_preallocate() {
        // array32 claiming 4 billion elements, backed by nothing
        let bytes = [0xdd, 0xff, 0xff, 0xff, 0xff];
        assert!(matches!(decode(&bytes), Err(DecodeError::UnexpectedEof { .. })));
    }

    #[test]
    fn test_rejects_non_string_key() {
        let bytes = [0x81, 0x01, 0xc0];
        assert_eq!(
            decode(&bytes),
            Err(DecodeError::InvalidKeyType { index: 0, found: "int" })
        );
    }

    #[test]
    fn test_rejects_reserved_and_ext() {
        assert_eq!(decode(&[0xc1]), Err(DecodeError::ReservedMarker { offset: 0 }));
        assert_eq!(
            decode(&[0x91, 0xd4, 0x01, 0x00]),
            Err(DecodeError::UnsupportedExtension { marker: 0xd4, offset: 1 })
        );
    }

    #[test]
    fn test_trailing_bytes() {
        assert_eq!(decode(&[0xc0, 0xc0]), Err(DecodeError::TrailingBytes { remaining: 1 }));
    }

    #[test]
    fn test_stream_of_values() {
        let bytes = [0x01, 0xa1, b'x', 0x90];
        let mut decoder = Decoder::new(&bytes);
        assert_eq!(decoder.read_value().unwrap(), ValueTree::Int(1));
        assert_eq!(decoder.read_value().unwrap(), ValueTree::str("x"));
        assert_eq!(decoder.read_value().unwrap(), ValueTree::Array(vec![]));
        assert_eq!(decoder.remaining(), 0);
    }

    #[test]
    fn test_depth_limit() {
        let bytes = [0x91, 0x91, 0x91, 0xc0];
        assert!(Decoder::new(&bytes).with_max_depth(3).read_value().is_ok());
        assert_eq!(
            Decoder::new(&bytes).with_max_depth(2).read_value(),
            Err(DecodeError::MaxDepthExceeded { limit: 2 })
        );
    }
}
