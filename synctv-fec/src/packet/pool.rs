// Packet and buffer allocation
//
// The writer never allocates repair packets directly; it asks a factory.
// PacketPool hands out packets that hold a lease on the pool slot, so the
// slot is returned as soon as the last owner (usually the downstream sink)
// drops the packet.

use super::{
    errors::{AllocError, AllocErrorValue},
    Packet,
};
use bytes::BytesMut;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Allocates packet handles.
pub trait PacketFactory {
    fn new_packet(&self) -> Result<Packet, AllocError>;
}

/// Allocates payload buffers.
pub trait BufferFactory {
    /// Returns a zero-filled buffer of exactly `size` bytes.
    fn new_buffer(&self, size: usize) -> Result<BytesMut, AllocError>;
}

/// Pool slot held by an allocated packet, released on drop.
pub(crate) struct Lease {
    in_use: Arc<AtomicUsize>,
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.in_use.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Packet factory with an optional cap on packets alive at once.
#[derive(Clone, Debug)]
pub struct PacketPool {
    limit: Option<usize>,
    in_use: Arc<AtomicUsize>,
}

impl Default for PacketPool {
    fn default() -> Self {
        Self::new(None)
    }
}

impl PacketPool {
    #[must_use]
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            limit,
            in_use: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of packets handed out and not yet dropped.
    #[must_use]
    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Acquire)
    }

    #[must_use]
    pub const fn limit(&self) -> Option<usize> {
        self.limit
    }
}

impl PacketFactory for PacketPool {
    fn new_packet(&self) -> Result<Packet, AllocError> {
        let limit = self.limit;
        self.in_use
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| match limit {
                Some(limit) if n >= limit => None,
                _ => Some(n + 1),
            })
            .map_err(|_| AllocErrorValue::PacketPoolExhausted {
                limit: limit.unwrap_or_default(),
            })?;

        let mut packet = Packet::new();
        packet.set_lease(Lease {
            in_use: Arc::clone(&self.in_use),
        });
        Ok(packet)
    }
}

/// Buffer factory for buffers up to a fixed size.
#[derive(Debug)]
pub struct BufferPool {
    max_buffer_size: usize,
    allocated: AtomicU64,
}

impl BufferPool {
    #[must_use]
    pub const fn new(max_buffer_size: usize) -> Self {
        Self {
            max_buffer_size,
            allocated: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub const fn max_buffer_size(&self) -> usize {
        self.max_buffer_size
    }

    /// Total number of buffers allocated so far.
    #[must_use]
    pub fn allocated(&self) -> u64 {
        self.allocated.load(Ordering::Relaxed)
    }
}

impl BufferFactory for BufferPool {
    fn new_buffer(&self, size: usize) -> Result<BytesMut, AllocError> {
        if size > self.max_buffer_size {
            return Err(AllocErrorValue::BufferTooLarge {
                requested: size,
                max: self.max_buffer_size,
            }
            .into());
        }
        self.allocated.fetch_add(1, Ordering::Relaxed);
        Ok(BytesMut::zeroed(size))
    }
}
