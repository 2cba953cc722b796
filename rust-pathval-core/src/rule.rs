//! Flow rule descriptors and the pure builders that produce them.
//!
//! Builders are side-effect free; inputs are validated by the caller (the
//! topology loader rejects malformed addresses and device ids before any
//! rule is built).

use pnet::util::MacAddr;
use rust_pathval_common::types::{AppId, DeviceId, PortNumber, TableId};

/// Priority of classify and forwarding rules.
pub const DEFAULT_PRIORITY: u16 = 11;

/// Priority of punt rules. Punt rules share the classify table and must win
/// against [`DEFAULT_PRIORITY`] there, so a punted frame never reaches the
/// forwarding table.
pub const HIGH_PRIORITY: u16 = 12;

/// Match predicate of a flow rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Match {
    /// EtherType == IPv4.
    EtherTypeIpv4,
    /// Exact source and destination link-layer address pair.
    EthPair { src: MacAddr, dst: MacAddr },
    /// EtherType == IPv4 and IP protocol == ICMP.
    Ipv4Icmp,
}

/// One entry of a rule's action list, or the treatment of an outbound packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Continue matching in the given table.
    GotoTable(TableId),
    /// Emit on the given device-local port.
    Output(PortNumber),
    /// Divert the packet to the controller.
    PuntToController,
    /// Re-enter the table pipeline at table 0.
    SubmitToPipeline,
}

/// A flow rule descriptor handed to the rule-storage collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowRule {
    /// Application owning the rule.
    pub app: AppId,
    /// Device the rule is installed on.
    pub device: DeviceId,
    /// Table the rule lives in.
    pub table: TableId,
    /// Match priority; higher wins within a table.
    pub priority: u16,
    /// Match predicate.
    pub selector: Match,
    /// Actions applied on match, in order.
    pub actions: Vec<Action>,
    /// All rules of this application are permanent (no idle or hard timeout).
    pub permanent: bool,
}

/// Rule sending IPv4 traffic from the classify table into the forwarding
/// table.
pub fn classify_rule(app: AppId, device: &DeviceId) -> FlowRule {
    FlowRule {
        app,
        device: device.clone(),
        table: TableId::Classify,
        priority: DEFAULT_PRIORITY,
        selector: Match::EtherTypeIpv4,
        actions: vec![Action::GotoTable(TableId::Forwarding)],
        permanent: true,
    }
}

/// Exact-match L2 forwarding rule on the forwarding table.
pub fn forward_rule(
    app: AppId,
    src: MacAddr,
    dst: MacAddr,
    device: &DeviceId,
    port: PortNumber,
) -> FlowRule {
    FlowRule {
        app,
        device: device.clone(),
        table: TableId::Forwarding,
        priority: DEFAULT_PRIORITY,
        selector: Match::EthPair { src, dst },
        actions: vec![Action::Output(port)],
        permanent: true,
    }
}

/// High-priority rule diverting IPv4 ICMP traffic to the controller.
pub fn punt_rule(app: AppId, device: &DeviceId) -> FlowRule {
    FlowRule {
        app,
        device: device.clone(),
        table: TableId::Classify,
        priority: HIGH_PRIORITY,
        selector: Match::Ipv4Icmp,
        actions: vec![Action::PuntToController],
        permanent: true,
    }
}
