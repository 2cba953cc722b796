//! Interfaces of the external controller collaborators.
//!
//! The core never talks to devices directly; all mutations go through the
//! rule-storage and packet-dispatch services of the hosting controller. The
//! simulated fabric in `rust-pathval-sim` implements every trait here for
//! tests and the CLI demo.

use crate::rule::{Action, FlowRule};
use bytes::Bytes;
use rust_pathval_common::types::{AppId, DeviceId};
use rust_pathval_common::Result;
use std::sync::Arc;

/// Priority tier at which the tracer's processor is registered, ahead of any
/// default forwarding logic the controller runs.
pub const TRACER_PROCESSOR_PRIORITY: u8 = 2;

/// Rule storage and dispatch engine of the hosting controller.
///
/// Applying a rule with the same (device, table, selector) as an existing one
/// overwrites it, which is what makes re-running an interrupted install safe.
pub trait FlowRuleService: Send + Sync {
    /// Apply a batch of rules.
    fn apply_rules(&self, rules: &[FlowRule]) -> Result<()>;

    /// Remove previously applied rules, matched by
    /// (device, table, selector, priority). Missing rules are ignored.
    fn remove_rules(&self, rules: &[FlowRule]) -> Result<()>;

    /// Remove every rule owned by the given application, on every device.
    fn remove_rules_by_app(&self, app: AppId) -> Result<()>;
}

/// Application-identity registry of the hosting controller.
pub trait CoreService: Send + Sync {
    /// Register an application name, yielding its identity. Registering the
    /// same name again yields the same identity.
    fn register_application(&self, name: &str) -> Result<AppId>;
}

/// A controller-delivered packet.
#[derive(Debug, Clone)]
pub struct InboundPacket {
    /// Device that punted the frame to the controller.
    pub device: DeviceId,
    /// The unparsed Ethernet frame.
    pub frame: Bytes,
}

/// A frame handed back to the dispatch engine for emission.
#[derive(Debug, Clone)]
pub struct OutboundPacket {
    /// Device the frame leaves from.
    pub device: DeviceId,
    /// Treatment applied on emission. The tracer always uses
    /// [`Action::SubmitToPipeline`] so a re-injected probe traverses the
    /// tables exactly as a normal IPv4 frame would.
    pub treatment: Action,
    /// The unparsed Ethernet frame.
    pub frame: Bytes,
}

/// Callback invoked for every controller-bound packet.
///
/// Implementations must tolerate concurrent invocation from multiple dispatch
/// threads, one potentially per punting device.
pub trait PacketProcessor: Send + Sync {
    fn process(&self, packet: &InboundPacket);
}

/// Packet I/O engine of the hosting controller.
pub trait PacketService: Send + Sync {
    /// Register a processor at the given priority tier (lower tiers run
    /// earlier). Registering the same processor again replaces the previous
    /// registration.
    fn register_processor(&self, processor: Arc<dyn PacketProcessor>, priority: u8) -> Result<()>;

    /// Remove a previously registered processor. Unknown processors are
    /// ignored, so deregistration is idempotent.
    fn deregister_processor(&self, processor: &Arc<dyn PacketProcessor>) -> Result<()>;

    /// Hand a frame to a device for emission.
    fn emit(&self, packet: OutboundPacket) -> Result<()>;
}
