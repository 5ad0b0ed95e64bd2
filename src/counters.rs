//! The stage's monotonic counter block.
//!
//! Counters are written by the stage only (single-writer) and read by the
//! host through [`Counters::snapshot`]. Publication to shared memory is the
//! host's business; this block is the interface.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A monotonic 64-bit counter.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Counter block for one fragmenter stage.
#[derive(Debug, Default)]
pub struct Counters {
    /// `out-ipv4-frag`: each emitted fragment.
    pub out_ipv4_frag: Counter,
    /// `out-ipv4-frag-not`: each packet forwarded without fragmentation,
    /// including non-IPv4 passthroughs.
    pub out_ipv4_frag_not: Counter,
    /// `ipv4-pmtud-ptb-received`: packets matching the PTB filter.
    pub ptb_received: Counter,
    /// `ipv4-pmtud-ptb-valid`: PTBs that updated the cache.
    pub ptb_valid: Counter,
    /// `ipv4-pmtud-ptb-invalid-csum`: PTBs with a bad ICMP checksum.
    pub ptb_invalid_csum: Counter,
    /// `ipv4-pmtud-ptb-invalid`: PTBs rejected for any other reason.
    pub ptb_invalid: Counter,
}

impl Counters {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Capture a point-in-time copy of every counter.
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            out_ipv4_frag: self.out_ipv4_frag.get(),
            out_ipv4_frag_not: self.out_ipv4_frag_not.get(),
            ptb_received: self.ptb_received.get(),
            ptb_valid: self.ptb_valid.get(),
            ptb_invalid_csum: self.ptb_invalid_csum.get(),
            ptb_invalid: self.ptb_invalid.get(),
        }
    }
}

/// Plain copy of the counter block, for host-side polling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub out_ipv4_frag: u64,
    pub out_ipv4_frag_not: u64,
    pub ptb_received: u64,
    pub ptb_valid: u64,
    pub ptb_invalid_csum: u64,
    pub ptb_invalid: u64,
}
