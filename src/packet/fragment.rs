//! RFC 791 datagram slicing.
//!
//! The engine takes one over-MTU Ethernet+IPv4 frame and emits a run of
//! fragments that each fit the target MTU. Fragment payloads sit on 8-byte
//! boundaries except for the last; every fragment reuses the original
//! Ethernet and IPv4 header bytes with identification, total length, flags,
//! offset, and checksum rewritten.
//!
//! DF policy is the caller's: by the time a frame reaches [`split_frame`]
//! the decision to slice it has been made.

use crate::buffer::PacketBuf;

use super::{ethernet, ipv4};

/// Generator for IPv4 identification values.
///
/// A wrapping 16-bit counter seeded from the system RNG. The sequence is
/// predictable to an on-path observer; that is acceptable here because the
/// fragmenter sits on a controlled egress path.
#[derive(Debug)]
pub struct FragmentIdGen {
    next: u16,
}

impl FragmentIdGen {
    /// Seed from the system RNG.
    pub fn new() -> Self {
        Self {
            next: rand::random::<u16>(),
        }
    }

    /// Fixed seed for reproducible runs.
    pub fn deterministic() -> Self {
        Self { next: 0x4242 }
    }

    /// Allocate the next identification value.
    pub fn next_id(&mut self) -> u16 {
        self.next = self.next.wrapping_add(1);
        self.next
    }
}

impl Default for FragmentIdGen {
    fn default() -> Self {
        Self::new()
    }
}

/// Slice `frame` into fragments that fit `mtu` (L3 bytes, excluding the
/// 14-byte Ethernet header) and hand each one to `emit` in increasing offset
/// order.
///
/// The frame must have passed length validation and `mtu` must be at least
/// [`crate::MIN_MTU`], which guarantees room for 8 payload bytes per
/// fragment at any legal IHL. A frame with an empty payload produces no
/// fragments.
pub fn split_frame(frame: &[u8], mtu: u16, fragment_id: u16, emit: &mut dyn FnMut(PacketBuf)) {
    let header_size = ethernet::HEADER_SIZE + ipv4::header_len(frame);
    let total_payload = frame.len().saturating_sub(header_size);
    let flag_bits = ipv4::flags_and_fragment_offset(frame) & ipv4::FLAG_BITS;
    let max_payload = mtu as usize + ethernet::HEADER_SIZE - header_size;

    let mut offset = 0;
    while offset < total_payload {
        let (payload_size, flags) = if offset + max_payload < total_payload {
            // Interior fragment: align down to the 8-byte offset grid.
            (max_payload & !7, flag_bits | ipv4::FLAG_MORE_FRAGMENTS)
        } else {
            // Final fragment keeps the original MF bit: if the input was
            // itself a non-last fragment, our last piece still is.
            (total_payload - offset, flag_bits)
        };

        let mut out = PacketBuf::with_capacity(header_size + payload_size);
        out.extend_from_slice(&frame[..header_size]);
        out.extend_from_slice(&frame[header_size + offset..header_size + offset + payload_size]);

        let total_length = (out.len() - ethernet::HEADER_SIZE) as u16;
        let fo = flags | (((offset / 8) as u16) & ipv4::FRAGMENT_OFFSET_MASK);
        let ihl = header_size - ethernet::HEADER_SIZE;

        let buf = out.as_mut_slice();
        ipv4::set_id(buf, fragment_id);
        ipv4::set_total_length(buf, total_length);
        ipv4::set_flags_and_fragment_offset(buf, fo);
        ipv4::set_checksum(buf, 0);
        let csum = ipv4::header_checksum(&buf[ethernet::HEADER_SIZE..ethernet::HEADER_SIZE + ihl]);
        ipv4::set_checksum(buf, csum);

        emit(out);
        offset += payload_size;
    }
}
