//! Configuration for the fragmenter stage.

use std::collections::HashSet;
use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::MIN_MTU;

/// Fragmenter stage configuration.
///
/// Unknown keys are rejected at parse time; semantic constraints are checked
/// by [`validate`](FragmenterConfig::validate), which runs again at stage
/// construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FragmenterConfig {
    /// Egress L3 MTU in bytes, excluding the 14-byte Ethernet header.
    /// Must be at least 68.
    pub mtu: u16,

    /// Enable Path MTU Discovery on the return path.
    #[serde(default)]
    pub pmtud: bool,

    /// PMTU cache entry lifetime in seconds (default: 600, per RFC 1981).
    #[serde(default = "default_pmtu_timeout")]
    pub pmtu_timeout: u32,

    /// Addresses considered ours when accepting PTB messages.
    /// Empty accepts PTBs for any destination.
    #[serde(default)]
    pub pmtu_local_addresses: Vec<Ipv4Addr>,

    /// Register the outgoing-fragments-per-second alarm.
    #[serde(default = "default_true")]
    pub use_alarms: bool,
}

fn default_pmtu_timeout() -> u32 {
    600
}
fn default_true() -> bool {
    true
}

impl FragmenterConfig {
    /// Configuration with the given MTU and every other key at its default.
    pub fn new(mtu: u16) -> Self {
        Self {
            mtu,
            pmtud: false,
            pmtu_timeout: default_pmtu_timeout(),
            pmtu_local_addresses: Vec::new(),
            use_alarms: default_true(),
        }
    }

    /// Load configuration from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: FragmenterConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.mtu < MIN_MTU {
            return Err(Error::MtuTooSmall(self.mtu));
        }

        let mut seen = HashSet::new();
        for addr in &self.pmtu_local_addresses {
            if !seen.insert(addr) {
                return Err(Error::DuplicateLocalAddress(*addr));
            }
        }

        Ok(())
    }
}
