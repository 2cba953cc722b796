//! Path tracing: punt, record, unpunt, re-inject.
//!
//! While a trace is armed, every device carries a high-priority punt rule
//! diverting IPv4 ICMP traffic to the controller. The first probe punted by a
//! device is recorded as the next hop, that device's punt rule is removed so
//! the re-injected frame is not punted there again, and the frame re-enters
//! the table pipeline to reveal the next hop in turn.

use crate::rule::{self, Action, FlowRule};
use crate::service::{
    FlowRuleService, InboundPacket, OutboundPacket, PacketProcessor, PacketService,
    TRACER_PROCESSOR_PRIORITY,
};
use log::{debug, info, warn};
use parking_lot::Mutex;
use rust_pathval_common::packet;
use rust_pathval_common::topology::Topology;
use rust_pathval_common::types::{AppId, DeviceId};
use rust_pathval_common::{Error, Result};
use std::sync::Arc;

/// Mutable state of the single live trace.
///
/// Shared by every dispatch thread delivering controller-bound packets, so
/// it only ever moves behind the tracer's mutex. The dedup check, the visit
/// record, and the counter increment happen as one atomic unit under that
/// lock.
#[derive(Debug, Default)]
struct TraceSession {
    /// 1-based position the next recorded hop will take.
    hop_counter: u32,
    /// Devices recorded so far, in arrival order. Doubles as the dedup set;
    /// first arrival wins, later deliveries from the same device are
    /// suppressed.
    visited: Vec<DeviceId>,
    /// Whether the interceptor is currently registered.
    armed: bool,
    /// Whether `start` has ever run in this tracer's lifetime.
    started: bool,
}

/// Traces the path of an ICMP probe through the network.
///
/// A genuine forwarding loop would be recorded as a single visit because of
/// the dedup set; the reference topology is loop-free, so this is a
/// documented limitation rather than something the tracer tries to detect.
pub struct PathTracer {
    app: AppId,
    topology: Arc<Topology>,
    rules: Arc<dyn FlowRuleService>,
    packets: Arc<dyn PacketService>,
    session: Mutex<TraceSession>,
}

impl PathTracer {
    pub fn new(
        app: AppId,
        topology: Arc<Topology>,
        rules: Arc<dyn FlowRuleService>,
        packets: Arc<dyn PacketService>,
    ) -> Self {
        Self {
            app,
            topology,
            rules,
            packets,
            session: Mutex::new(TraceSession::default()),
        }
    }

    /// Arm tracing: reset the session, punt ICMP on every device, and
    /// register the interceptor.
    pub fn start(self: &Arc<Self>) -> Result<()> {
        {
            let mut session = self.session.lock();
            session.hop_counter = 1;
            session.visited.clear();
            session.armed = true;
            session.started = true;
        }
        self.install_punt_rules()?;
        self.packets
            .register_processor(self.clone(), TRACER_PROCESSOR_PRIORITY)?;
        info!(
            "path tracing armed across {} devices",
            self.topology.devices().len()
        );
        Ok(())
    }

    /// Re-arm after a completed trace: reset the bookkeeping and reinstall
    /// the punt rules. The interceptor registered by [`PathTracer::start`]
    /// stays in place; calling this before any `start` is an error.
    pub fn restart(&self) -> Result<()> {
        {
            let mut session = self.session.lock();
            if !session.started {
                return Err(Error::TraceNotStarted);
            }
            session.hop_counter = 1;
            session.visited.clear();
        }
        self.install_punt_rules()?;
        info!("path tracing re-armed");
        Ok(())
    }

    /// Disarm tracing. Idempotent.
    ///
    /// Punt rules on devices the probe never reached are removed here so
    /// they cannot keep diverting ICMP traffic after the trace ends.
    pub fn stop(self: &Arc<Self>) -> Result<()> {
        let leftovers: Vec<DeviceId> = {
            let mut session = self.session.lock();
            session.armed = false;
            self.topology
                .devices()
                .iter()
                .filter(|device| !session.visited.contains(device))
                .cloned()
                .collect()
        };
        self.packets
            .deregister_processor(&(self.clone() as Arc<dyn PacketProcessor>))?;
        if !leftovers.is_empty() {
            let rules: Vec<FlowRule> = leftovers
                .iter()
                .map(|device| rule::punt_rule(self.app, device))
                .collect();
            self.rules.remove_rules(&rules)?;
        }
        info!("path tracing stopped");
        Ok(())
    }

    /// Devices recorded by the current trace, in hop order.
    pub fn visited(&self) -> Vec<DeviceId> {
        self.session.lock().visited.clone()
    }

    /// 1-based position the next recorded hop will take.
    pub fn hop_counter(&self) -> u32 {
        self.session.lock().hop_counter
    }

    /// Whether the interceptor is currently registered.
    pub fn is_armed(&self) -> bool {
        self.session.lock().armed
    }

    fn install_punt_rules(&self) -> Result<()> {
        let rules: Vec<FlowRule> = self
            .topology
            .devices()
            .iter()
            .map(|device| rule::punt_rule(self.app, device))
            .collect();
        debug!("installing {} punt rules", rules.len());
        self.rules.apply_rules(&rules)
    }
}

impl PacketProcessor for PathTracer {
    fn process(&self, inbound: &InboundPacket) {
        // Anything that does not decode as an IPv4 ICMP frame is not a probe
        // and not of interest.
        let Some(probe) = packet::classify_probe(&inbound.frame) else {
            return;
        };

        // Bookkeeping happens under the session lock as one unit; the rule
        // removal and re-emission below are issued after it is released.
        let hop = {
            let mut session = self.session.lock();
            if !session.armed {
                return;
            }
            if session.visited.contains(&inbound.device) {
                debug!("duplicate delivery from {}, suppressed", inbound.device);
                return;
            }
            session.visited.push(inbound.device.clone());
            let hop = session.hop_counter;
            session.hop_counter += 1;
            hop
        };

        info!(
            "the no.{} device on the path between {} and {} is {}",
            hop, probe.src, probe.dst, inbound.device
        );

        // Restore normal forwarding at this hop before re-injecting, so the
        // same frame is not punted here a second time.
        if let Err(e) = self
            .rules
            .remove_rules(&[rule::punt_rule(self.app, &inbound.device)])
        {
            warn!("failed to remove punt rule on {}: {}", inbound.device, e);
        }

        let outbound = OutboundPacket {
            device: inbound.device.clone(),
            treatment: Action::SubmitToPipeline,
            frame: inbound.frame.clone(),
        };
        if let Err(e) = self.packets.emit(outbound) {
            warn!("failed to re-emit probe from {}: {}", inbound.device, e);
        }
    }
}
