//! Core of the path validation controller application.
//!
//! Two responsibilities live here: installing the static two-stage flow rule
//! pipeline (classify table -> forwarding table) on every device of the
//! topology, and tracing the path an ICMP probe actually takes by punting the
//! first matching packet at each hop to the controller, recording it, and
//! restoring normal forwarding at that hop only.

pub mod app;
pub mod installer;
pub mod rule;
pub mod service;
pub mod tracer;

#[cfg(test)]
mod test_util;

pub use app::PathvalApp;
pub use installer::RuleInstaller;
pub use rule::{Action, FlowRule, Match, DEFAULT_PRIORITY, HIGH_PRIORITY};
pub use service::{
    CoreService, FlowRuleService, InboundPacket, OutboundPacket, PacketProcessor, PacketService,
};
pub use tracer::PathTracer;
