//! Streaming MessagePack encoder for value trees
//!
//! Walks a [`ValueTree`] depth-first, pre-order, writing each container's
//! header before its children. Byte layout comes from the `rmp` codec
//! primitives; this module only decides which primitive each node needs and
//! where the traversal stops.

use crate::buffer::{ByteSink, GrowableBuffer, SinkWriter};
use crate::config::{ConfigError, EncoderConfig};
use crate::value::ValueTree;
use rmp::encode::{self, ValueWriteError};
use std::io::{self, Write};
use thiserror::Error;

/// Error type for encoding
#[derive(Debug, Error)]
pub enum EncodeError {
    /// A map key was not a `Str` node
    #[error("map key at index {index} is {found}, expected str")]
    InvalidKeyType { index: usize, found: &'static str },

    /// The sink refused to grow
    #[error("sink write failed: {0}")]
    SinkWriteFailed(#[source] io::Error),

    #[error("value nests deeper than {limit} levels")]
    MaxDepthExceeded { limit: usize },

    /// Count does not fit the codec's 32-bit length header
    #[error("{kind} length {len} exceeds the 32-bit header limit")]
    LengthOverflow { kind: &'static str, len: usize },
}

impl From<io::Error> for EncodeError {
    fn from(e: io::Error) -> Self {
        EncodeError::SinkWriteFailed(e)
    }
}

impl From<ValueWriteError<io::Error>> for EncodeError {
    fn from(e: ValueWriteError<io::Error>) -> Self {
        match e {
            ValueWriteError::InvalidMarkerWrite(e) | ValueWriteError::InvalidDataWrite(e) => {
                EncodeError::SinkWriteFailed(e)
            }
        }
    }
}

/// Tree-to-bytes encoder
///
/// Holds only configuration, so one encoder can be shared by any number of
/// threads as long as each encode gets its own sink.
#[derive(Debug, Clone, Default)]
pub struct StreamEncoder {
    config: EncoderConfig,
}

impl StreamEncoder {
    pub fn new(config: EncoderConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Encode `tree` into `sink`.
    ///
    /// On error the sink may hold a prefix of the encoding; its content must
    /// be treated as invalid.
    pub fn encode<S: ByteSink + ?Sized>(
        &self,
        tree: &ValueTree,
        sink: &mut S,
    ) -> Result<(), EncodeError> {
        let _span = tracing::debug_span!("encode", root = tree.kind()).entered();
        let start = sink.as_slice().len();

        let mut wr = SinkWriter(sink);
        let result = self.write_node(&mut wr, tree, 0);

        match &result {
            Ok(()) => tracing::debug!(bytes = wr.0.as_slice().len() - start, "tree encoded"),
            Err(e) => tracing::debug!(error = %e, "encode aborted"),
        }
        result
    }

    /// Encode into a fresh buffer built from the configured growth policy
    pub fn to_vec(&self, tree: &ValueTree) -> Result<Vec<u8>, EncodeError> {
        let mut buf = GrowableBuffer::with_policy(self.config.buffer.clone());
        self.encode(tree, &mut buf)?;
        Ok(buf.into_vec())
    }

    /// Encode independent trees on the rayon pool, one buffer per tree.
    ///
    /// Output order matches input order; the first failure aborts the batch.
    #[cfg(feature = "parallel")]
    pub fn encode_batch_parallel(&self, trees: &[ValueTree]) -> Result<Vec<Vec<u8>>, EncodeError> {
        const PARALLEL_THRESHOLD: usize = 4;

        if trees.len() < PARALLEL_THRESHOLD {
            return trees.iter().map(|tree| self.to_vec(tree)).collect();
        }

        use rayon::prelude::*;

        trees.par_iter().map(|tree| self.to_vec(tree)).collect()
    }

    fn write_node<S: ByteSink + ?Sized>(
        &self,
        wr: &mut SinkWriter<'_, S>,
        node: &ValueTree,
        depth: usize,
    ) -> Result<(), EncodeError> {
        match node {
            ValueTree::Bool(v) => {
                encode::write_bool(wr, *v)?;
            }
            ValueTree::Nil => {
                encode::write_nil(wr)?;
            }
            ValueTree::Int(v) => {
                encode::write_sint(wr, *v)?;
            }
            ValueTree::UInt(v) => {
                encode::write_uint(wr, *v)?;
            }
            ValueTree::Double(v) => {
                encode::write_f64(wr, *v)?;
            }
            ValueTree::Str(bytes) => write_str(wr, bytes)?,
            ValueTree::Array(items) => {
                self.enter(depth, items.len())?;
                encode::write_array_len(wr, header_len("array", items.len())?)?;
                for item in items {
                    self.write_node(wr, item, depth + 1)?;
                }
            }
            ValueTree::Map(entries) => {
                self.enter(depth, entries.len())?;
                encode::write_map_len(wr, header_len("map", entries.len())?)?;
                for (index, (key, value)) in entries.iter().enumerate() {
                    let ValueTree::Str(key) = key else {
                        return Err(EncodeError::InvalidKeyType {
                            index,
                            found: key.kind(),
                        });
                    };
                    write_str(wr, key)?;
                    self.write_node(wr, value, depth + 1)?;
                }
            }
        }
        Ok(())
    }

    /// Children of a container at `depth` sit one level lower; refuse before
    /// the header is written if that level is out of bounds.
    #[inline]
    fn enter(&self, depth: usize, len: usize) -> Result<(), EncodeError> {
        if len > 0 && depth >= self.config.max_depth {
            return Err(EncodeError::MaxDepthExceeded {
                limit: self.config.max_depth,
            });
        }
        Ok(())
    }
}

#[inline]
fn header_len(kind: &'static str, len: usize) -> Result<u32, EncodeError> {
    u32::try_from(len).map_err(|_| EncodeError::LengthOverflow { kind, len })
}

#[inline]
fn write_str<S: ByteSink + ?Sized>(
    wr: &mut SinkWriter<'_, S>,
    bytes: &[u8],
) -> Result<(), EncodeError> {
    encode::write_str_len(wr, header_len("str", bytes.len())?)?;
    wr.write_all(bytes)?;
    Ok(())
}

/// Encode `tree` into `sink` with the default configuration
#[inline]
pub fn encode<S: ByteSink + ?Sized>(tree: &ValueTree, sink: &mut S) -> Result<(), EncodeError> {
    StreamEncoder::default().encode(tree, sink)
}

/// Encode `tree` into a new byte vector with the default configuration
#[inline]
pub fn to_vec(tree: &ValueTree) -> Result<Vec<u8>, EncodeError> {
    StreamEncoder::default().to_vec(tree)
}
