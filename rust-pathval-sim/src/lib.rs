//! In-process switch fabric for exercising the path validation application.
//!
//! Implements the controller collaborator traits over real per-device,
//! priority-ordered rule tables. A probe injected at a host walks the
//! configured path hop by hop: each device evaluates its classify table and
//! then its forwarding table, punted frames are delivered to the registered
//! packet processors, and `SubmitToPipeline` re-emission continues the walk
//! where it stopped.

use bytes::Bytes;
use log::{debug, info, warn};
use parking_lot::Mutex;
use pnet::util::MacAddr;
use rust_pathval_common::packet;
use rust_pathval_common::topology::{HostAttachment, Topology};
use rust_pathval_common::types::{AppId, DeviceId, PortNumber, TableId};
use rust_pathval_common::Result;
use rust_pathval_core::rule::{Action, FlowRule, Match};
use rust_pathval_core::service::{
    CoreService, FlowRuleService, InboundPacket, OutboundPacket, PacketProcessor, PacketService,
};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;

#[derive(Default)]
struct FabricState {
    /// Installed rules per device, both tables together.
    tables: HashMap<DeviceId, Vec<FlowRule>>,
    /// Registered processors, kept sorted by priority tier.
    processors: Vec<(u8, Arc<dyn PacketProcessor>)>,
    /// Registered application names, position + 1 is the identity.
    apps: Vec<String>,
}

/// A software stand-in for the switches of the topology plus the controller
/// services in front of them.
pub struct SwitchFabric {
    topology: Arc<Topology>,
    state: Mutex<FabricState>,
}

impl SwitchFabric {
    pub fn new(topology: Arc<Topology>) -> Self {
        Self {
            topology,
            state: Mutex::new(FabricState::default()),
        }
    }

    /// Build an ICMP echo request between two hosts and inject it at the
    /// source host's attachment device.
    pub fn inject_probe(&self, src: &HostAttachment, dst: &HostAttachment) {
        let frame = packet::build_echo_request(
            src.mac,
            dst.mac,
            host_ip(src.mac),
            host_ip(dst.mac),
            1,
        );
        info!("injecting probe {} -> {} at {}", src.name, dst.name, src.device);
        self.process_at(&src.device, &frame);
    }

    /// Every rule currently installed on a device, both tables.
    pub fn rules_on(&self, device: &DeviceId) -> Vec<FlowRule> {
        self.state
            .lock()
            .tables
            .get(device)
            .cloned()
            .unwrap_or_default()
    }

    /// Total rule count across all devices.
    pub fn rule_count(&self) -> usize {
        self.state.lock().tables.values().map(Vec::len).sum()
    }

    /// Run a frame through a device's table pipeline, starting at table 0.
    fn process_at(&self, device: &DeviceId, frame: &Bytes) {
        let Some(actions) = self.lookup(device, TableId::Classify, frame) else {
            debug!("{}: no classify match, frame dropped", device);
            return;
        };
        for action in actions {
            match action {
                Action::PuntToController => {
                    self.deliver_to_processors(device, frame);
                    return;
                }
                Action::GotoTable(table) => {
                    let Some(actions) = self.lookup(device, table, frame) else {
                        debug!("{}: no match in {}, frame dropped", device, table);
                        return;
                    };
                    for action in actions {
                        if let Action::Output(port) = action {
                            self.forward(device, port, frame);
                        }
                    }
                    return;
                }
                Action::Output(port) => {
                    self.forward(device, port, frame);
                    return;
                }
                Action::SubmitToPipeline => {
                    warn!("{}: submit-to-pipeline is not a valid rule action", device);
                    return;
                }
            }
        }
    }

    /// Highest-priority matching rule's actions for a frame in one table.
    fn lookup(&self, device: &DeviceId, table: TableId, frame: &[u8]) -> Option<Vec<Action>> {
        let state = self.state.lock();
        let mut candidates: Vec<&FlowRule> = state
            .tables
            .get(device)?
            .iter()
            .filter(|r| r.table == table && selector_matches(&r.selector, frame))
            .collect();
        candidates.sort_by(|a, b| b.priority.cmp(&a.priority));
        candidates.first().map(|r| r.actions.clone())
    }

    /// Carry a frame out of a device toward the next hop of its path, or to
    /// the destination host if this was the last hop.
    fn forward(&self, device: &DeviceId, port: PortNumber, frame: &Bytes) {
        let Some((src, dst)) = packet::eth_endpoints(frame) else {
            return;
        };
        let path = self.topology.path(src, dst);
        let Some(idx) = path.iter().position(|e| &e.device == device) else {
            warn!("{}: no configured hop for {} -> {}", device, src, dst);
            return;
        };
        if path[idx].port != port {
            warn!(
                "{}: frame emitted on {}, expected {}",
                device, port, path[idx].port
            );
            return;
        }
        if idx + 1 < path.len() {
            let next = path[idx + 1].device.clone();
            self.process_at(&next, frame);
        } else {
            info!("frame delivered to host {}", dst);
        }
    }

    /// Hand a punted frame to every registered processor, in tier order.
    fn deliver_to_processors(&self, device: &DeviceId, frame: &Bytes) {
        let processors: Vec<Arc<dyn PacketProcessor>> = {
            let state = self.state.lock();
            state.processors.iter().map(|(_, p)| p.clone()).collect()
        };
        if processors.is_empty() {
            debug!("{}: punted frame but no processor is registered", device);
            return;
        }
        let inbound = InboundPacket {
            device: device.clone(),
            frame: frame.clone(),
        };
        for processor in processors {
            processor.process(&inbound);
        }
    }
}

impl FlowRuleService for SwitchFabric {
    fn apply_rules(&self, rules: &[FlowRule]) -> Result<()> {
        let mut state = self.state.lock();
        for rule in rules {
            let table = state.tables.entry(rule.device.clone()).or_default();
            // Same (table, selector) overwrites the existing rule.
            table.retain(|r| !(r.table == rule.table && r.selector == rule.selector));
            table.push(rule.clone());
        }
        Ok(())
    }

    fn remove_rules(&self, rules: &[FlowRule]) -> Result<()> {
        let mut state = self.state.lock();
        for rule in rules {
            if let Some(table) = state.tables.get_mut(&rule.device) {
                table.retain(|r| {
                    !(r.table == rule.table
                        && r.selector == rule.selector
                        && r.priority == rule.priority)
                });
            }
        }
        Ok(())
    }

    fn remove_rules_by_app(&self, app: AppId) -> Result<()> {
        let mut state = self.state.lock();
        for table in state.tables.values_mut() {
            table.retain(|r| r.app != app);
        }
        Ok(())
    }
}

impl CoreService for SwitchFabric {
    fn register_application(&self, name: &str) -> Result<AppId> {
        let mut state = self.state.lock();
        if let Some(pos) = state.apps.iter().position(|n| n == name) {
            return Ok(AppId(pos as u16 + 1));
        }
        state.apps.push(name.to_string());
        Ok(AppId(state.apps.len() as u16))
    }
}

impl PacketService for SwitchFabric {
    fn register_processor(&self, processor: Arc<dyn PacketProcessor>, priority: u8) -> Result<()> {
        let mut state = self.state.lock();
        state.processors.retain(|(_, p)| !Arc::ptr_eq(p, &processor));
        state.processors.push((priority, processor));
        state.processors.sort_by_key(|(tier, _)| *tier);
        Ok(())
    }

    fn deregister_processor(&self, processor: &Arc<dyn PacketProcessor>) -> Result<()> {
        self.state
            .lock()
            .processors
            .retain(|(_, p)| !Arc::ptr_eq(p, processor));
        Ok(())
    }

    fn emit(&self, packet: OutboundPacket) -> Result<()> {
        match packet.treatment {
            Action::SubmitToPipeline => self.process_at(&packet.device, &packet.frame),
            Action::Output(port) => self.forward(&packet.device, port, &packet.frame),
            other => warn!("{}: unsupported emit treatment {:?}", packet.device, other),
        }
        Ok(())
    }
}

fn selector_matches(selector: &Match, frame: &[u8]) -> bool {
    match selector {
        Match::EtherTypeIpv4 => packet::is_ipv4(frame),
        Match::EthPair { src, dst } => {
            packet::eth_endpoints(frame).is_some_and(|(s, d)| &s == src && &d == dst)
        }
        Match::Ipv4Icmp => packet::classify_probe(frame).is_some(),
    }
}

/// Synthetic IPv4 address for a probe, derived from the host's address.
fn host_ip(mac: MacAddr) -> Ipv4Addr {
    Ipv4Addr::new(10, 0, 0, mac.5)
}
