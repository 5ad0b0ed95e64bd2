//! ICMPv4 parsing for Path MTU Discovery.
//!
//! The stage only cares about one message: Destination Unreachable /
//! Fragmentation Needed (Type 3, Code 4), the "Packet Too Big" signal of
//! RFC 1191. Its body carries the next-hop MTU at offset 6 and the quoted
//! original IPv4 header starting at offset 8:
//!
//! ```text
//! Offset  Field
//! 0       Type (3)
//! 1       Code (4)
//! 2-3     Checksum (over the whole ICMP message)
//! 4-5     Unused
//! 6-7     Next-Hop MTU
//! 8+      Original IPv4 header + first 8 payload bytes
//! ```

use std::net::Ipv4Addr;

use super::{ethernet, ipv4};

/// ICMP Destination Unreachable.
pub const TYPE_DEST_UNREACHABLE: u8 = 3;

/// Fragmentation Needed and DF was Set.
pub const CODE_FRAG_NEEDED: u8 = 4;

/// IP protocol number for ICMP.
pub const IPPROTO_ICMP: u8 = 1;

/// Offset of the Next-Hop MTU field within the ICMP message.
const NEXT_HOP_MTU_OFFSET: usize = 6;

/// Offset of the quoted original IPv4 header within the ICMP message.
const QUOTED_HEADER_OFFSET: usize = 8;

/// The PTB filter: matches `icmp[0] == 3 and icmp[1] == 4` over the
/// Ethernet-stripped IPv4 payload. Fragmented outer packets never match, as
/// the ICMP header is only present in the first fragment.
pub fn is_fragmentation_needed(frame: &[u8]) -> bool {
    if !ethernet::is_ipv4(frame) {
        return false;
    }
    if frame.len() < ethernet::HEADER_SIZE + ipv4::MIN_HEADER_LEN {
        return false;
    }
    if ipv4::version(frame) != 4 || ipv4::header_len(frame) < ipv4::MIN_HEADER_LEN {
        return false;
    }
    if ipv4::protocol(frame) != IPPROTO_ICMP {
        return false;
    }
    if ipv4::flags_and_fragment_offset(frame) & ipv4::FRAGMENT_OFFSET_MASK != 0 {
        return false;
    }

    let icmp = ethernet::HEADER_SIZE + ipv4::header_len(frame);
    frame.len() >= icmp + 2
        && frame[icmp] == TYPE_DEST_UNREACHABLE
        && frame[icmp + 1] == CODE_FRAG_NEEDED
}

/// Slice out the ICMP message (header + body) of a frame that matched the
/// PTB filter.
#[inline]
pub fn message(frame: &[u8]) -> &[u8] {
    &frame[ethernet::HEADER_SIZE + ipv4::header_len(frame)..]
}

/// Verify the ICMP checksum over a full message (header + body). Summing the
/// message including its stored checksum must yield the all-ones pattern.
pub fn checksum_valid(message: &[u8]) -> bool {
    let mut sum: u32 = 0;

    for i in (0..message.len()).step_by(2) {
        let word = if i + 1 < message.len() {
            u16::from_be_bytes([message[i], message[i + 1]])
        } else {
            u16::from_be_bytes([message[i], 0])
        };
        sum += word as u32;
    }

    while sum >> 16 != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }

    sum as u16 == 0xFFFF
}

/// Calculate the checksum of an ICMP message, skipping the checksum field
/// itself.
pub fn message_checksum(message: &[u8]) -> u16 {
    let mut sum: u32 = 0;

    for i in (0..message.len()).step_by(2) {
        if i == 2 {
            continue; // Skip checksum field
        }
        let word = if i + 1 < message.len() {
            u16::from_be_bytes([message[i], message[i + 1]])
        } else {
            u16::from_be_bytes([message[i], 0])
        };
        sum += word as u32;
    }

    while sum >> 16 != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }

    !(sum as u16)
}

/// The advertised Next-Hop MTU, if the message is long enough to carry one.
pub fn next_hop_mtu(message: &[u8]) -> Option<u16> {
    if message.len() < NEXT_HOP_MTU_OFFSET + 2 {
        return None;
    }
    Some(u16::from_be_bytes([
        message[NEXT_HOP_MTU_OFFSET],
        message[NEXT_HOP_MTU_OFFSET + 1],
    ]))
}

/// Source and destination of the quoted original datagram, if the message
/// carries at least a full 20-byte quoted header.
pub fn quoted_addresses(message: &[u8]) -> Option<(Ipv4Addr, Ipv4Addr)> {
    let quoted = message.get(QUOTED_HEADER_OFFSET..)?;
    if quoted.len() < ipv4::MIN_HEADER_LEN {
        return None;
    }
    let src = Ipv4Addr::new(quoted[12], quoted[13], quoted[14], quoted[15]);
    let dst = Ipv4Addr::new(quoted[16], quoted[17], quoted[18], quoted[19]);
    Some((src, dst))
}
