//! # Treepack
//!
//! Streams dynamically typed value trees into MessagePack through a growable
//! byte sink, and generates deterministic trees to benchmark it with.
//!
//! ```rust
//! use treepack::{decode, to_vec, ValueTree};
//!
//! let tree = ValueTree::map([
//!     ("a", ValueTree::Bool(true)),
//!     ("b", ValueTree::Nil),
//! ]);
//! let bytes = to_vec(&tree).unwrap();
//! assert_eq!(bytes, [0x82, 0xa1, b'a', 0xc3, 0xa1, b'b', 0xc0]);
//! assert_eq!(decode(&bytes).unwrap(), tree);
//! ```

pub mod buffer;
pub mod config;
pub mod deserializer;
pub mod generator;
pub mod harness;
pub mod serializer;
pub mod value;

pub use buffer::{BufferPolicy, ByteSink, GrowableBuffer};
pub use config::{ConfigError, EncoderConfig};
pub use deserializer::{decode, DecodeError, Decoder};
pub use generator::generate;
pub use harness::{
    format_description, hash_bytes, BenchmarkCase, CODEC_NAME, CODEC_VERSION, FORMAT_NAME,
};
pub use serializer::{encode, to_vec, EncodeError, StreamEncoder};
pub use value::ValueTree;

/// The version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
