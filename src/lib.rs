//! IPv4 fragmenter stage with Path MTU Discovery.
//!
//! The stage accepts Ethernet-framed IPv4 datagrams on its `input` port,
//! forwards them unchanged when they fit the effective egress MTU, and slices
//! them into RFC 791 fragments when they do not. With PMTUD enabled it also
//! watches a return-path port for ICMP "Destination Unreachable /
//! Fragmentation Needed" (Type 3, Code 4) messages and learns per-destination
//! path MTUs from them.
//!
//! ```text
//! input ──► classify ──► fits MTU ─────────────────► output
//!                   └──► needs frag ─► fragment ───► output
//!
//! south ──► PTB filter ──► valid PTB: update cache, consume
//!                     └──► everything else ────────► north
//! ```
//!
//! Scheduling is single-threaded and cooperative: the host calls
//! [`Fragmenter::push`] once per tick and the stage drains whatever is
//! readable on each port in FIFO order.

pub mod alarm;
pub mod buffer;
pub mod clock;
pub mod config;
pub mod counters;
pub mod error;
pub mod fragmenter;
pub mod packet;
pub mod pmtu;
pub mod port;

// Re-export main types
pub use buffer::PacketBuf;
pub use clock::{ManualTicks, MonotonicTicks, TickSource};
pub use config::FragmenterConfig;
pub use counters::{CounterSnapshot, Counters};
pub use error::{Error, Result};
pub use fragmenter::{Fragmenter, ReturnPath};

/// Minimum egress MTU accepted by the stage: a forwarder must be able to pass
/// a 60-byte maximal IPv4 header plus an 8-byte fragment (RFC 791).
pub const MIN_MTU: u16 = 68;
