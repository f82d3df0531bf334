//! Growable output buffer
//!
//! The encoder never writes to a `Vec<u8>` directly: it goes through the
//! [`ByteSink`] trait, which reports growth failure as a plain `false`.
//! [`GrowableBuffer`] is the default sink. It owns its allocation and grows
//! it geometrically according to a [`BufferPolicy`].

use crate::config::MIN_GROWTH_FACTOR;
use serde::{Deserialize, Serialize};
use std::io;

/// Smallest allocation the buffer will make
pub const MIN_CAPACITY: usize = 16;

/// Destination for encoded bytes
pub trait ByteSink {
    /// Append `bytes`. Returns `false`, leaving the content unchanged, when
    /// the sink cannot make room for them.
    fn write(&mut self, bytes: &[u8]) -> bool;

    /// Everything written so far, in write order
    fn as_slice(&self) -> &[u8];
}

/// Growth policy for a [`GrowableBuffer`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferPolicy {
    /// Capacity reserved on the first write
    pub initial_capacity: usize,
    /// Multiplier applied to the capacity on each reallocation (>= 1.5)
    pub growth_factor: f64,
    /// Hard ceiling on the allocation, `None` for unbounded
    pub max_capacity: Option<usize>,
}

impl Default for BufferPolicy {
    fn default() -> Self {
        Self {
            initial_capacity: 128,
            growth_factor: 2.0,
            max_capacity: None,
        }
    }
}

impl BufferPolicy {
    pub fn with_max_capacity(mut self, limit: usize) -> Self {
        self.max_capacity = Some(limit);
        self
    }

    /// Growth factor actually applied. Values below the minimum, and
    /// non-finite ones, grow at the minimum rate.
    #[inline]
    pub fn effective_growth_factor(&self) -> f64 {
        if !self.growth_factor.is_finite() {
            MIN_GROWTH_FACTOR
        } else {
            self.growth_factor.max(MIN_GROWTH_FACTOR)
        }
    }

    /// Capacity to grow to so that `required` bytes fit, or `None` when the
    /// policy forbids it
    fn next_capacity(&self, current: usize, required: usize) -> Option<usize> {
        let scaled = (current as f64 * self.effective_growth_factor()).ceil() as usize;
        let target = scaled
            .max(required)
            .max(self.initial_capacity)
            .max(MIN_CAPACITY);

        match self.max_capacity {
            Some(limit) if required > limit => None,
            Some(limit) => Some(target.min(limit)),
            None => Some(target),
        }
    }
}

/// Append-only byte buffer with geometric growth
///
/// Nothing is allocated until the first write. The number of reallocations
/// over `n` appended bytes is `O(log n)`, so total copy work stays linear.
#[derive(Debug, Default)]
pub struct GrowableBuffer {
    buf: Vec<u8>,
    policy: BufferPolicy,
    reallocations: usize,
}

impl GrowableBuffer {
    pub fn new() -> Self {
        Self::with_policy(BufferPolicy::default())
    }

    #[inline]
    pub fn with_policy(policy: BufferPolicy) -> Self {
        Self {
            buf: Vec::new(),
            policy,
            reallocations: 0,
        }
    }

    /// Buffer with room for `cap` bytes up front
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            buf: Vec::with_capacity(cap),
            policy: BufferPolicy {
                initial_capacity: cap,
                ..BufferPolicy::default()
            },
            reallocations: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    pub fn policy(&self) -> &BufferPolicy {
        &self.policy
    }

    /// Number of times the backing allocation was (re)made
    pub fn reallocations(&self) -> usize {
        self.reallocations
    }

    /// Drop the content, keep the allocation
    #[inline]
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Drop the content and release the allocation
    pub fn reset(&mut self) {
        self.buf = Vec::new();
        self.reallocations = 0;
    }

    #[inline]
    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }

    fn grow_for(&mut self, additional: usize) -> bool {
        let len = self.buf.len();
        let Some(required) = len.checked_add(additional) else {
            return false;
        };
        if required <= self.buf.capacity() {
            return true;
        }

        let current = self.buf.capacity();
        let Some(target) = self.policy.next_capacity(current, required) else {
            tracing::warn!(
                required,
                limit = ?self.policy.max_capacity,
                "buffer growth refused by capacity limit"
            );
            return false;
        };

        if let Err(err) = self.buf.try_reserve_exact(target - len) {
            tracing::warn!(required, target, error = %err, "buffer allocation failed");
            return false;
        }

        self.reallocations += 1;
        tracing::trace!(from = current, to = self.buf.capacity(), "buffer grew");
        true
    }
}

impl ByteSink for GrowableBuffer {
    #[inline]
    fn write(&mut self, bytes: &[u8]) -> bool {
        if !self.grow_for(bytes.len()) {
            return false;
        }
        self.buf.extend_from_slice(bytes);
        true
    }

    #[inline]
    fn as_slice(&self) -> &[u8] {
        &self.buf
    }
}

impl io::Write for GrowableBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if ByteSink::write(self, buf) {
            Ok(buf.len())
        } else {
            Err(sink_full())
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ByteSink for Vec<u8> {
    #[inline]
    fn write(&mut self, bytes: &[u8]) -> bool {
        if self.try_reserve(bytes.len()).is_err() {
            return false;
        }
        self.extend_from_slice(bytes);
        true
    }

    #[inline]
    fn as_slice(&self) -> &[u8] {
        self
    }
}

/// `io::Write` view over any [`ByteSink`], the shape the codec primitives
/// write through
pub(crate) struct SinkWriter<'a, S: ?Sized>(pub &'a mut S);

impl<S: ByteSink + ?Sized> io::Write for SinkWriter<'_, S> {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.0.write(buf) {
            Ok(buf.len())
        } else {
            Err(sink_full())
        }
    }

    #[inline]
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        if self.0.write(buf) {
            Ok(())
        } else {
            Err(sink_full())
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn sink_full() -> io::Error {
    io::Error::new(io::ErrorKind::OutOfMemory, "byte sink could not grow")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_allocation_until_first_write() {
        let buf = GrowableBuffer::new();
        assert_eq!(buf.capacity(), 0);
        assert_eq!(buf.reallocations(), 0);
    }

    #[test]
    fn test_writes_concatenate() {
        let mut buf = GrowableBuffer::new();
        assert!(buf.write(b"hello"));
        assert!(buf.write(b""));
        assert!(buf.write(b", world"));
        assert_eq!(buf.as_slice(), b"hello, world");
        assert_eq!(buf.len(), 12);
    }

    #[test]
    fn test_growth_is_geometric() {
        let mut buf = GrowableBuffer::with_policy(BufferPolicy {
            initial_capacity: 16,
            growth_factor: 2.0,
            max_capacity: None,
        });
        for i in 0..100_000u32 {
            assert!(buf.write(&[i as u8]));
        }
        assert_eq!(buf.len(), 100_000);
        // 16 * 2^13 > 100_000
        assert!(buf.reallocations() <= 14, "got {}", buf.reallocations());
    }

    #[test]
    fn test_slow_growth_factors_are_raised_to_minimum() {
        for factor in [1.0, 0.5, 0.0, -3.0, f64::NAN, f64::INFINITY] {
            let mut buf = GrowableBuffer::with_policy(BufferPolicy {
                initial_capacity: 16,
                growth_factor: factor,
                max_capacity: None,
            });
            for i in 0..10_000u32 {
                assert!(buf.write(&[i as u8]));
            }
            assert_eq!(buf.len(), 10_000);
            assert_eq!(buf.policy().effective_growth_factor(), MIN_GROWTH_FACTOR);
            // 16 * 1.5^16 > 10_000
            assert!(
                buf.reallocations() <= 18,
                "factor {}: {} reallocations",
                factor,
                buf.reallocations()
            );
        }
    }

    #[test]
    fn test_large_write_grows_past_factor() {
        let mut buf = GrowableBuffer::with_policy(BufferPolicy {
            initial_capacity: 16,
            ..BufferPolicy::default()
        });
        let chunk = vec![7u8; 1000];
        assert!(buf.write(&chunk));
        assert!(buf.capacity() >= 1000);
        assert_eq!(buf.reallocations(), 1);
    }

    #[test]
    fn test_capacity_limit_rejects_without_mutation() {
        let mut buf = GrowableBuffer::with_policy(BufferPolicy::default().with_max_capacity(20));
        assert!(buf.write(&[1u8; 15]));
        assert!(!buf.write(&[2u8; 10]));
        assert_eq!(buf.as_slice(), &[1u8; 15][..]);
        assert!(buf.write(&[3u8; 5]));
        assert_eq!(buf.len(), 20);
        assert!(buf.capacity() <= 20);
    }

    #[test]
    fn test_reset_releases_allocation() {
        let mut buf = GrowableBuffer::new();
        assert!(buf.write(&[0u8; 512]));
        buf.reset();
        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), 0);
        assert!(buf.write(b"again"));
        assert_eq!(buf.as_slice(), b"again");
    }

    #[test]
    fn test_clear_keeps_allocation() {
        let mut buf = GrowableBuffer::new();
        assert!(buf.write(&[0u8; 512]));
        let cap = buf.capacity();
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), cap);
    }

    #[test]
    fn test_io_write_reports_out_of_memory() {
        use std::io::Write;

        let mut buf = GrowableBuffer::with_policy(BufferPolicy::default().with_max_capacity(4));
        buf.write_all(b"abcd").unwrap();
        let err = buf.write_all(b"e").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::OutOfMemory);
    }
}
