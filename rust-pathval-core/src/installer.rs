//! Bulk installation and removal of the static rule pipeline.

use crate::rule::{self, FlowRule};
use crate::service::FlowRuleService;
use log::{debug, info};
use rust_pathval_common::topology::Topology;
use rust_pathval_common::types::AppId;
use rust_pathval_common::Result;
use std::sync::Arc;

/// Installs the two-stage pipeline for every device and path in the topology.
///
/// Holds no cache of installed state beyond what it just issued. Classify and
/// forwarding rules are pure overwrites keyed by (device, table, selector),
/// so recovering from an interrupted install is simply re-running it.
pub struct RuleInstaller {
    app: AppId,
    topology: Arc<Topology>,
    rules: Arc<dyn FlowRuleService>,
}

impl RuleInstaller {
    pub fn new(app: AppId, topology: Arc<Topology>, rules: Arc<dyn FlowRuleService>) -> Self {
        Self {
            app,
            topology,
            rules,
        }
    }

    /// Install the full static pipeline: classification plus forwarding.
    pub fn install(&self) -> Result<()> {
        self.install_pipeline()?;
        self.install_forwarding()
    }

    /// Install one classify rule per device, moving IPv4 traffic into the
    /// forwarding table.
    pub fn install_pipeline(&self) -> Result<()> {
        let rules: Vec<FlowRule> = self
            .topology
            .devices()
            .iter()
            .map(|device| rule::classify_rule(self.app, device))
            .collect();
        debug!("installing {} classify rules", rules.len());
        self.rules.apply_rules(&rules)
    }

    /// Install one exact-match forwarding rule per topology edge. Matches are
    /// disjoint by (src, dst, device), so installation order is irrelevant.
    pub fn install_forwarding(&self) -> Result<()> {
        let rules: Vec<FlowRule> = self
            .topology
            .edges()
            .iter()
            .map(|edge| rule::forward_rule(self.app, edge.src, edge.dst, &edge.device, edge.port))
            .collect();
        info!(
            "installing {} forwarding rules across {} devices",
            rules.len(),
            self.topology.devices().len()
        );
        self.rules.apply_rules(&rules)
    }

    /// Remove every rule this application owns, on every device.
    pub fn teardown(&self) -> Result<()> {
        info!("removing all rules owned by {}", self.app);
        self.rules.remove_rules_by_app(self.app)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{Action, Match, DEFAULT_PRIORITY};
    use crate::test_util::{FailingRuleService, MockRuleService};
    use rust_pathval_common::types::TableId;
    use rust_pathval_common::Error;

    fn installer(rules: Arc<dyn FlowRuleService>) -> RuleInstaller {
        RuleInstaller::new(AppId(7), Arc::new(Topology::reference()), rules)
    }

    #[test]
    fn install_pipeline_places_one_classify_rule_per_device() {
        let mock = Arc::new(MockRuleService::default());
        installer(mock.clone()).install_pipeline().unwrap();

        let applied = mock.applied();
        let topo = Topology::reference();
        assert_eq!(applied.len(), topo.devices().len());
        for device in topo.devices() {
            let on_device: Vec<_> = applied.iter().filter(|r| &r.device == device).collect();
            assert_eq!(on_device.len(), 1);
            assert_eq!(on_device[0].table, TableId::Classify);
            assert_eq!(on_device[0].selector, Match::EtherTypeIpv4);
        }
    }

    #[test]
    fn install_forwarding_covers_every_edge_exactly_once() {
        let mock = Arc::new(MockRuleService::default());
        installer(mock.clone()).install_forwarding().unwrap();

        let applied = mock.applied();
        let topo = Topology::reference();
        assert_eq!(applied.len(), topo.edges().len());

        for edge in topo.edges() {
            let matching: Vec<_> = applied
                .iter()
                .filter(|r| {
                    r.device == edge.device
                        && r.selector
                            == Match::EthPair {
                                src: edge.src,
                                dst: edge.dst,
                            }
                })
                .collect();
            assert_eq!(matching.len(), 1, "edge through {} missing", edge.device);
            assert_eq!(matching[0].table, TableId::Forwarding);
            assert_eq!(matching[0].priority, DEFAULT_PRIORITY);
            assert_eq!(matching[0].actions, vec![Action::Output(edge.port)]);
        }
    }

    #[test]
    fn install_pushes_classify_then_forwarding() {
        let mock = Arc::new(MockRuleService::default());
        installer(mock.clone()).install().unwrap();

        let topo = Topology::reference();
        let applied = mock.applied();
        assert_eq!(applied.len(), topo.devices().len() + topo.edges().len());
        // Classify rules are issued first.
        assert!(applied[..topo.devices().len()]
            .iter()
            .all(|r| r.table == TableId::Classify));
    }

    #[test]
    fn teardown_removes_by_owner() {
        let mock = Arc::new(MockRuleService::default());
        installer(mock.clone()).teardown().unwrap();
        assert_eq!(mock.removed_apps(), vec![AppId(7)]);
    }

    #[test]
    fn collaborator_failure_propagates() {
        let failing = Arc::new(FailingRuleService);
        let err = installer(failing).install().unwrap_err();
        assert!(matches!(err, Error::RuleService(_)));
    }
}
