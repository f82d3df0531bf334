//! Benchmark case lifecycle
//!
//! A [`BenchmarkCase`] owns one generated tree for the duration of a
//! benchmark configuration. Each [`run`](BenchmarkCase::run) encodes the tree
//! into a fresh buffer, folds the bytes into a running CRC-32 and releases the
//! buffer. Timing is left to the caller.

use crate::buffer::{ByteSink, GrowableBuffer};
use crate::config::{ConfigError, EncoderConfig};
use crate::generator::generate;
use crate::serializer::{EncodeError, StreamEncoder};
use crate::value::ValueTree;

/// Wire format produced by every run
pub const FORMAT_NAME: &str = "MessagePack";

/// Codec crate that supplies the wire primitives
pub const CODEC_NAME: &str = "rmp";

/// Release series of [`CODEC_NAME`] the encoder is built against; keep in
/// step with the `rmp` requirement in Cargo.toml
pub const CODEC_VERSION: &str = "0.8";

/// One-line description of the format and codec, e.g. `MessagePack (rmp v0.8)`
pub fn format_description() -> String {
    format!("{FORMAT_NAME} ({CODEC_NAME} v{CODEC_VERSION})")
}

/// Continue a running content hash over `bytes`
#[inline]
pub fn hash_bytes(running: u32, bytes: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new_with_initial(running);
    hasher.update(bytes);
    hasher.finalize()
}

#[derive(Debug)]
pub struct BenchmarkCase {
    target_size: usize,
    root: ValueTree,
    encoder: StreamEncoder,
}

impl BenchmarkCase {
    /// Generate the tree for `target_size`
    pub fn setup(target_size: usize, config: EncoderConfig) -> Result<Self, ConfigError> {
        let encoder = StreamEncoder::new(config)?;
        let root = generate(target_size);
        tracing::info!(
            target_size,
            nodes = root.node_count(),
            depth = root.depth(),
            "benchmark case ready"
        );
        Ok(Self {
            target_size,
            root,
            encoder,
        })
    }

    /// Wrap an existing tree, e.g. one deserialized from parameters.
    ///
    /// The tree is not depth-checked here; an over-deep tree fails on
    /// [`run`](Self::run) with `MaxDepthExceeded`.
    pub fn from_tree(root: ValueTree, config: EncoderConfig) -> Result<Self, ConfigError> {
        let encoder = StreamEncoder::new(config)?;
        Ok(Self {
            target_size: root.node_count(),
            root,
            encoder,
        })
    }

    /// Generator size, or the node count for a wrapped tree
    pub fn target_size(&self) -> usize {
        self.target_size
    }

    pub fn root(&self) -> &ValueTree {
        &self.root
    }

    pub fn encoder(&self) -> &StreamEncoder {
        &self.encoder
    }

    /// One measured iteration: encode, hash, release the buffer
    pub fn run(&self, hash: u32) -> Result<u32, EncodeError> {
        let mut buffer = GrowableBuffer::with_policy(self.encoder.config().buffer.clone());
        self.encoder.encode(&self.root, &mut buffer)?;
        Ok(hash_bytes(hash, buffer.as_slice()))
    }

    /// Chain `iterations` runs through the same running hash
    pub fn run_iterations(&self, iterations: usize, hash: u32) -> Result<u32, EncodeError> {
        (0..iterations).try_fold(hash, |acc, _| self.run(acc))
    }

    /// Run `iterations` chained runs on each of `threads` scoped threads, all
    /// reading the same tree. Returns one final hash per thread.
    #[cfg(feature = "parallel")]
    pub fn run_concurrent(
        &self,
        threads: usize,
        iterations: usize,
    ) -> Result<Vec<u32>, EncodeError> {
        let case = self;
        let outcome = crossbeam::scope(|s| {
            let handles: Vec<_> = (0..threads)
                .map(|_| s.spawn(move |_| case.run_iterations(iterations, 0)))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|p| std::panic::resume_unwind(p)))
                .collect::<Result<Vec<u32>, EncodeError>>()
        });
        outcome.unwrap_or_else(|p| std::panic::resume_unwind(p))
    }

    /// Release the tree
    pub fn teardown(self) {
        tracing::info!(target_size = self.target_size, "benchmark case released");
    }
}
