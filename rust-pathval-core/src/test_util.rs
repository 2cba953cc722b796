//! Recording doubles for the collaborator traits, shared by the unit tests.

use crate::rule::FlowRule;
use crate::service::{FlowRuleService, OutboundPacket, PacketProcessor, PacketService};
use bytes::Bytes;
use parking_lot::Mutex;
use pnet::util::MacAddr;
use rust_pathval_common::packet;
use rust_pathval_common::types::AppId;
use rust_pathval_common::{Error, Result};
use std::net::Ipv4Addr;
use std::sync::Arc;

/// Rule service that records every call it sees.
#[derive(Default)]
pub struct MockRuleService {
    applied: Mutex<Vec<FlowRule>>,
    removed: Mutex<Vec<FlowRule>>,
    removed_apps: Mutex<Vec<AppId>>,
}

impl MockRuleService {
    pub fn applied(&self) -> Vec<FlowRule> {
        self.applied.lock().clone()
    }

    pub fn removed(&self) -> Vec<FlowRule> {
        self.removed.lock().clone()
    }

    pub fn removed_apps(&self) -> Vec<AppId> {
        self.removed_apps.lock().clone()
    }
}

impl FlowRuleService for MockRuleService {
    fn apply_rules(&self, rules: &[FlowRule]) -> Result<()> {
        self.applied.lock().extend_from_slice(rules);
        Ok(())
    }

    fn remove_rules(&self, rules: &[FlowRule]) -> Result<()> {
        self.removed.lock().extend_from_slice(rules);
        Ok(())
    }

    fn remove_rules_by_app(&self, app: AppId) -> Result<()> {
        self.removed_apps.lock().push(app);
        Ok(())
    }
}

/// Rule service whose every operation fails.
pub struct FailingRuleService;

impl FlowRuleService for FailingRuleService {
    fn apply_rules(&self, _rules: &[FlowRule]) -> Result<()> {
        Err(Error::RuleService("device rejected batch".into()))
    }

    fn remove_rules(&self, _rules: &[FlowRule]) -> Result<()> {
        Err(Error::RuleService("device rejected batch".into()))
    }

    fn remove_rules_by_app(&self, _app: AppId) -> Result<()> {
        Err(Error::RuleService("device rejected batch".into()))
    }
}

/// Packet service that records registrations and emitted frames.
#[derive(Default)]
pub struct MockPacketService {
    processors: Mutex<Vec<Arc<dyn PacketProcessor>>>,
    emitted: Mutex<Vec<OutboundPacket>>,
}

impl MockPacketService {
    pub fn registered_count(&self) -> usize {
        self.processors.lock().len()
    }

    pub fn emitted(&self) -> Vec<OutboundPacket> {
        self.emitted.lock().clone()
    }
}

impl PacketService for MockPacketService {
    fn register_processor(&self, processor: Arc<dyn PacketProcessor>, _priority: u8) -> Result<()> {
        let mut processors = self.processors.lock();
        processors.retain(|p| !Arc::ptr_eq(p, &processor));
        processors.push(processor);
        Ok(())
    }

    fn deregister_processor(&self, processor: &Arc<dyn PacketProcessor>) -> Result<()> {
        self.processors.lock().retain(|p| !Arc::ptr_eq(p, processor));
        Ok(())
    }

    fn emit(&self, packet: OutboundPacket) -> Result<()> {
        self.emitted.lock().push(packet);
        Ok(())
    }
}

/// An ICMP echo-request frame between the reference hosts h1 and d1.
pub fn probe_frame() -> Bytes {
    packet::build_echo_request(
        MacAddr::new(0, 0, 0, 0, 0, 1),
        MacAddr::new(0, 0, 0, 0, 0, 3),
        Ipv4Addr::new(10, 0, 0, 1),
        Ipv4Addr::new(10, 0, 0, 3),
        1,
    )
}
