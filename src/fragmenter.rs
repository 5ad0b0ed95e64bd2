//! The fragmenter stage: four ports, four phases per scheduling tick.
//!
//! Phase order inside [`Fragmenter::push`]:
//! 1. Classify everything readable on `input`: non-IPv4 passes through,
//!    malformed IPv4 is freed, valid IPv4 moves on.
//! 2. Resolve the effective MTU per packet (learned path MTU or the
//!    configured egress MTU) and either pass it through or slice it. The
//!    resolved MTU rides along as an argument to the fragment path, never as
//!    bytes stashed in the packet.
//! 3. With PMTUD on, drain the `south` return path: valid PTBs update the
//!    cache and are consumed, everything else is forwarded on `north`.
//! 4. Run the throttled cache expiry sweep and sample the alarm.

use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::sync::Arc;

use tracing::{debug, info};

use crate::alarm::FragRateAlarm;
use crate::buffer::PacketBuf;
use crate::clock::{MonotonicTicks, Throttle, TickSource};
use crate::config::FragmenterConfig;
use crate::counters::{CounterSnapshot, Counters};
use crate::error::Result;
use crate::packet::fragment::{self, FragmentIdGen};
use crate::packet::{ethernet, icmp, ipv4};
use crate::pmtu::PmtuCache;
use crate::port::Link;

/// Return-path ports, present only when PMTUD is enabled.
#[derive(Debug, Default)]
pub struct ReturnPath {
    /// Inbound packets from the network, expected to carry ICMP feedback.
    pub south: Link,
    /// Forwarded upstream: everything `south` delivered that we did not
    /// consume.
    pub north: Link,
}

/// What became of a return-path packet.
enum ReturnVerdict {
    /// Not ours; hand it to `north` untouched.
    Forward(PacketBuf),
    /// Consumed (cache updated or counted invalid); the packet is freed.
    Consumed,
}

/// IPv4 fragmenter with Path MTU Discovery.
pub struct Fragmenter<T: TickSource = MonotonicTicks> {
    mtu: u16,
    pmtud_enabled: bool,
    local_addrs: HashSet<Ipv4Addr>,
    ids: FragmentIdGen,
    cache: PmtuCache,
    counters: Arc<Counters>,
    alarm: Option<FragRateAlarm>,
    sweep_timer: Throttle,
    tsc: T,
    /// Ingress traffic.
    pub input: Link,
    /// Egress: fragments and passthroughs.
    pub output: Link,
    /// Return path, present only when PMTUD is enabled.
    pub return_path: Option<ReturnPath>,
}

impl Fragmenter<MonotonicTicks> {
    /// Build a stage on the process monotonic clock.
    pub fn new(config: FragmenterConfig) -> Result<Self> {
        Self::with_ticks(config, MonotonicTicks::new())
    }
}

impl<T: TickSource> Fragmenter<T> {
    /// Build a stage on an explicit tick source.
    pub fn with_ticks(config: FragmenterConfig, tsc: T) -> Result<Self> {
        config.validate()?;

        let tps = tsc.ticks_per_second();
        let timeout_ticks = config.pmtu_timeout as u64 * tps;
        let now = tsc.now();

        info!(
            mtu = config.mtu,
            pmtud = config.pmtud,
            pmtu_timeout = config.pmtu_timeout,
            "fragmenter stage ready"
        );

        Ok(Self {
            mtu: config.mtu,
            pmtud_enabled: config.pmtud,
            local_addrs: config.pmtu_local_addresses.iter().copied().collect(),
            ids: FragmentIdGen::new(),
            cache: PmtuCache::new(timeout_ticks),
            counters: Counters::new(),
            alarm: config.use_alarms.then(|| FragRateAlarm::new(tps, now)),
            // Sweep roughly ten times per cache lifetime.
            sweep_timer: Throttle::new(timeout_ticks / 10),
            tsc,
            input: Link::new(),
            output: Link::new(),
            return_path: config.pmtud.then(ReturnPath::default),
        })
    }

    /// Switch the fragment-ID generator to its fixed seed, for reproducible
    /// runs.
    pub fn use_deterministic_fragment_ids(&mut self) {
        self.ids = FragmentIdGen::deterministic();
    }

    /// Handle on the stage's counter block.
    pub fn counters(&self) -> Arc<Counters> {
        Arc::clone(&self.counters)
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }

    /// Number of destinations currently in the PMTU cache.
    pub fn pmtu_entries(&self) -> usize {
        self.cache.len()
    }

    /// Process one scheduling tick: drain both inbound ports in FIFO order,
    /// then run the time-driven work.
    pub fn push(&mut self) {
        let now = self.tsc.now();

        while let Some(pkt) = self.input.receive() {
            self.process_ingress(pkt);
        }

        if self.pmtud_enabled {
            loop {
                let pkt = match self.return_path.as_mut() {
                    Some(rp) => rp.south.receive(),
                    None => None,
                };
                let Some(pkt) = pkt else { break };
                match self.process_return(pkt, now) {
                    ReturnVerdict::Forward(pkt) => {
                        if let Some(rp) = self.return_path.as_mut() {
                            rp.north.transmit(pkt);
                        }
                    }
                    ReturnVerdict::Consumed => {}
                }
            }

            // Nothing to expire while the cache is empty.
            if !self.cache.is_empty() && self.sweep_timer.elapsed(now) {
                self.cache.sweep(now);
            }
        }

        if let Some(alarm) = self.alarm.as_mut() {
            alarm.poll(now, self.counters.out_ipv4_frag.get());
        }
    }

    /// Classify one ingress packet and route it through the resolver.
    fn process_ingress(&mut self, pkt: PacketBuf) {
        if !ethernet::is_ipv4(pkt.as_slice()) {
            self.counters.out_ipv4_frag_not.inc();
            self.output.transmit(pkt);
            return;
        }

        if !ipv4::has_valid_length(pkt.as_slice()) {
            debug!(len = pkt.len(), "dropping malformed ipv4 packet");
            return; // freed
        }

        let mtu = self.effective_mtu(ipv4::dst(pkt.as_slice()));
        if pkt.len() <= mtu as usize + ethernet::HEADER_SIZE {
            self.counters.out_ipv4_frag_not.inc();
            self.output.transmit(pkt);
            return;
        }

        self.fragment(pkt, mtu);
    }

    /// The MTU governing this destination: a learned path MTU when PMTUD has
    /// one, the configured egress MTU otherwise.
    fn effective_mtu(&self, dst: Ipv4Addr) -> u16 {
        if self.pmtud_enabled {
            if let Some(mtu) = self.cache.lookup(dst) {
                return mtu;
            }
        }
        self.mtu
    }

    /// Slice an over-MTU packet, or drop it when DF forbids slicing.
    fn fragment(&mut self, pkt: PacketBuf, mtu: u16) {
        let frame = pkt.as_slice();
        let df_set = ipv4::flags_and_fragment_offset(frame) & ipv4::FLAG_DONT_FRAGMENT != 0;

        if df_set && !self.pmtud_enabled {
            // TODO: originate ICMP type 3 code 4 toward the source instead of
            // dropping silently.
            debug!(dst = %ipv4::dst(frame), "dropping oversize DF packet");
            return;
        }
        // With PMTUD on, a DF packet is still sliced: the MTU in hand came
        // from a PTB sent by the path itself.

        let id = self.ids.next_id();
        let counters = &self.counters;
        let output = &mut self.output;
        fragment::split_frame(frame, mtu, id, &mut |frag| {
            counters.out_ipv4_frag.inc();
            output.transmit(frag);
        });
        // Input freed here, after all fragments are out.
    }

    /// Inspect one return-path packet for a PTB addressed to us.
    fn process_return(&mut self, pkt: PacketBuf, now: u64) -> ReturnVerdict {
        if !icmp::is_fragmentation_needed(pkt.as_slice()) {
            return ReturnVerdict::Forward(pkt);
        }
        self.counters.ptb_received.inc();

        let frame = pkt.as_slice();
        if !self.local_addrs.is_empty() && !self.local_addrs.contains(&ipv4::dst(frame)) {
            debug!(dst = %ipv4::dst(frame), "PTB not addressed to us");
            return ReturnVerdict::Forward(pkt);
        }

        let message = icmp::message(frame);
        if !icmp::checksum_valid(message) {
            self.counters.ptb_invalid_csum.inc();
            debug!("PTB with bad ICMP checksum");
            return ReturnVerdict::Consumed;
        }

        let Some(mtu) = icmp::next_hop_mtu(message) else {
            self.counters.ptb_invalid.inc();
            return ReturnVerdict::Consumed;
        };

        match icmp::quoted_addresses(message) {
            Some((src, dst))
                if self.local_addrs.is_empty() || self.local_addrs.contains(&src) =>
            {
                self.counters.ptb_valid.inc();
                self.cache.update(dst, mtu, now);
            }
            _ => {
                debug!("PTB with short or foreign quoted header");
                self.counters.ptb_invalid.inc();
            }
        }
        ReturnVerdict::Consumed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualTicks;

    fn stage(mtu: u16) -> Fragmenter<ManualTicks> {
        Fragmenter::with_ticks(FragmenterConfig::new(mtu), ManualTicks::new(1000)).unwrap()
    }

    fn ipv4_frame(payload: usize) -> PacketBuf {
        let total = 20 + payload;
        let mut frame = vec![0u8; 14 + total];
        frame[12] = 0x08;
        frame[13] = 0x00;
        frame[14] = 0x45;
        frame[16..18].copy_from_slice(&(total as u16).to_be_bytes());
        frame[22] = 64;
        frame[23] = 17;
        frame[26..30].copy_from_slice(&[10, 0, 0, 1]);
        frame[30..34].copy_from_slice(&[10, 0, 0, 2]);
        let csum = ipv4::header_checksum(&frame[14..34]);
        frame[24..26].copy_from_slice(&csum.to_be_bytes());
        PacketBuf::from_slice(&frame)
    }

    #[test]
    fn test_non_ipv4_passes_through() {
        let mut frag = stage(1500);
        let mut arp = vec![0u8; 42];
        arp[12] = 0x08;
        arp[13] = 0x06;
        frag.input.transmit(PacketBuf::from_slice(&arp));

        frag.push();

        assert_eq!(frag.output.readable(), 1);
        assert_eq!(frag.snapshot().out_ipv4_frag_not, 1);
        assert_eq!(frag.snapshot().out_ipv4_frag, 0);
    }

    #[test]
    fn test_malformed_ipv4_is_freed() {
        let mut frag = stage(1500);
        let mut pkt = ipv4_frame(100);
        // Total length no longer matches the frame
        ipv4::set_total_length(pkt.as_mut_slice(), 90);
        frag.input.transmit(pkt);

        frag.push();

        assert!(frag.output.is_empty());
        assert_eq!(frag.snapshot(), CounterSnapshot::default());
    }

    #[test]
    fn test_fitting_packet_passes_through() {
        let mut frag = stage(1500);
        frag.input.transmit(ipv4_frame(1000));

        frag.push();

        let out = frag.output.receive().unwrap();
        assert_eq!(out.len(), 14 + 20 + 1000);
        assert_eq!(frag.snapshot().out_ipv4_frag_not, 1);
    }

    #[test]
    fn test_oversize_packet_fragments() {
        let mut frag = stage(500);
        frag.use_deterministic_fragment_ids();
        frag.input.transmit(ipv4_frame(1400));

        frag.push();

        assert_eq!(frag.output.readable(), 3);
        assert_eq!(frag.snapshot().out_ipv4_frag, 3);
        assert_eq!(frag.snapshot().out_ipv4_frag_not, 0);

        let first = frag.output.receive().unwrap();
        assert_eq!(ipv4::id(first.as_slice()), 0x4243);
    }

    #[test]
    fn test_consecutive_inputs_use_consecutive_ids() {
        let mut frag = stage(500);
        frag.use_deterministic_fragment_ids();
        frag.input.transmit(ipv4_frame(1400));
        frag.input.transmit(ipv4_frame(1400));

        frag.push();

        let mut ids = Vec::new();
        while let Some(pkt) = frag.output.receive() {
            ids.push(ipv4::id(pkt.as_slice()));
        }
        assert_eq!(ids, vec![0x4243, 0x4243, 0x4243, 0x4244, 0x4244, 0x4244]);
    }

    #[test]
    fn test_no_return_ports_without_pmtud() {
        let frag = stage(1500);
        assert!(frag.return_path.is_none());
    }
}
