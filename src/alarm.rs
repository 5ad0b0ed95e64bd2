//! Fragmentation-rate alarm.
//!
//! Samples the `out-ipv4-frag` counter once per second and raises a warning
//! when the rate crosses the threshold. The alarm latches: a sustained burst
//! logs one warning line and the return to normal logs one clearing line,
//! matching how the host's inventory expects warning-severity alarms to
//! behave.

use tracing::{info, warn};

/// Fragments per second above which the alarm raises.
pub const FRAG_RATE_THRESHOLD: u64 = 10_000;

#[derive(Debug)]
pub struct FragRateAlarm {
    sample_ticks: u64,
    ticks_per_second: u64,
    last_tick: u64,
    last_count: u64,
    raised: bool,
}

impl FragRateAlarm {
    pub fn new(ticks_per_second: u64, now: u64) -> Self {
        Self {
            sample_ticks: ticks_per_second,
            ticks_per_second,
            last_tick: now,
            last_count: 0,
            raised: false,
        }
    }

    /// Sample the fragment counter. Returns whether the alarm is raised
    /// after this poll.
    pub fn poll(&mut self, now: u64, fragments: u64) -> bool {
        let elapsed = now.saturating_sub(self.last_tick);
        if elapsed < self.sample_ticks {
            return self.raised;
        }

        let delta = fragments.saturating_sub(self.last_count);
        let rate = (delta as u128 * self.ticks_per_second as u128 / elapsed as u128) as u64;
        self.last_tick = now;
        self.last_count = fragments;

        if rate > FRAG_RATE_THRESHOLD {
            if !self.raised {
                warn!(rate, "outgoing-ipv4-fragments rate above threshold");
                self.raised = true;
            }
        } else if self.raised {
            info!(rate, "outgoing-ipv4-fragments rate back to normal");
            self.raised = false;
        }
        self.raised
    }
}
