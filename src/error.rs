//! Error types for the fragmenter stage.
//!
//! Per-packet failures never surface as errors: malformed or undeliverable
//! packets are dropped and counted on the data plane. Errors here are
//! construction-time problems that fail the stage fast.

use std::net::Ipv4Addr;

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Construction and configuration errors.
#[derive(Error, Debug)]
pub enum Error {
    /// Configured MTU below the RFC 791 forwarder minimum.
    #[error("mtu {0} is below the minimum of 68")]
    MtuTooSmall(u16),

    /// The same local address was configured twice.
    #[error("duplicate local address: {0}")]
    DuplicateLocalAddress(Ipv4Addr),

    /// I/O errors while loading configuration.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed configuration file.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
