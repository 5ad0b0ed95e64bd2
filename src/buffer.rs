//! Owned packet buffers.
//!
//! A `PacketBuf` is a flat byte region plus a length, the single currency
//! exchanged between ports. Buffers are move-only: handing one to a port
//! transfers ownership, and dropping one returns its storage to the
//! allocator.

use bytes::BytesMut;

/// An owned Ethernet frame.
#[derive(Debug)]
pub struct PacketBuf {
    data: BytesMut,
}

impl PacketBuf {
    /// Allocate an empty buffer with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity),
        }
    }

    /// Allocate a buffer holding a copy of `data`.
    pub fn from_slice(data: &[u8]) -> Self {
        Self {
            data: BytesMut::from(data),
        }
    }

    /// Current frame length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the buffer holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The frame contents.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Mutable access to the frame contents.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Append bytes to the frame.
    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }
}
