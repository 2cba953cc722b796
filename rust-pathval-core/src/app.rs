//! Component facade tying the installer and tracer together.
//!
//! Mirrors a controller application lifecycle: activation registers the
//! application identity with the core registry, deactivation stops tracing
//! and removes every rule the application owns.

use crate::installer::RuleInstaller;
use crate::service::{CoreService, FlowRuleService, PacketService};
use crate::tracer::PathTracer;
use log::info;
use rust_pathval_common::topology::Topology;
use rust_pathval_common::types::{AppId, DeviceId};
use rust_pathval_common::Result;
use std::sync::Arc;

/// Application name registered with the controller core.
pub const APP_NAME: &str = "org.pathval.app";

/// The path validation application: static pipeline installation plus
/// on-demand path tracing, bound to one controller instance. One trace
/// session exists at a time by design.
pub struct PathvalApp {
    app: AppId,
    installer: RuleInstaller,
    tracer: Arc<PathTracer>,
    rules: Arc<dyn FlowRuleService>,
}

impl PathvalApp {
    /// Register with the controller core and wire up the components.
    pub fn activate(
        topology: Arc<Topology>,
        core: &dyn CoreService,
        rules: Arc<dyn FlowRuleService>,
        packets: Arc<dyn PacketService>,
    ) -> Result<Self> {
        let app = core.register_application(APP_NAME)?;
        let installer = RuleInstaller::new(app, topology.clone(), rules.clone());
        let tracer = Arc::new(PathTracer::new(app, topology, rules.clone(), packets));
        info!("{} started as {}", APP_NAME, app);
        Ok(Self {
            app,
            installer,
            tracer,
            rules,
        })
    }

    /// Push the classify and forwarding rules for the whole static topology.
    /// Safe to repeat: rules are overwrites keyed by (device, table, match).
    pub fn install(&self) -> Result<()> {
        self.installer.install()
    }

    /// Arm path tracing.
    pub fn start_trace(&self) -> Result<()> {
        self.tracer.start()
    }

    /// Reset the trace session and re-arm, keeping the existing interceptor.
    pub fn restart_trace(&self) -> Result<()> {
        self.tracer.restart()
    }

    /// Disarm path tracing. Idempotent.
    pub fn stop_trace(&self) -> Result<()> {
        self.tracer.stop()
    }

    /// Devices the current trace has recorded, in hop order.
    pub fn trace_path(&self) -> Vec<DeviceId> {
        self.tracer.visited()
    }

    /// Stop tracing and remove every rule owned by this application.
    pub fn deactivate(&self) -> Result<()> {
        self.tracer.stop()?;
        self.rules.remove_rules_by_app(self.app)?;
        info!("{} stopped", APP_NAME);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{MockPacketService, MockRuleService};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct MockCore {
        names: Mutex<Vec<String>>,
    }

    impl CoreService for MockCore {
        fn register_application(&self, name: &str) -> Result<AppId> {
            let mut names = self.names.lock();
            if let Some(pos) = names.iter().position(|n| n == name) {
                return Ok(AppId(pos as u16 + 1));
            }
            names.push(name.to_string());
            Ok(AppId(names.len() as u16))
        }
    }

    fn activate(
        core: &MockCore,
        rules: Arc<MockRuleService>,
        packets: Arc<MockPacketService>,
    ) -> PathvalApp {
        PathvalApp::activate(Arc::new(Topology::reference()), core, rules, packets).unwrap()
    }

    #[test]
    fn activation_registers_the_application_name() {
        let core = MockCore::default();
        let app = activate(
            &core,
            Arc::new(MockRuleService::default()),
            Arc::new(MockPacketService::default()),
        );
        assert_eq!(core.names.lock().as_slice(), [APP_NAME]);
        assert_eq!(app.app, AppId(1));
    }

    #[test]
    fn deactivation_stops_tracing_and_drops_owned_rules() {
        let core = MockCore::default();
        let rules = Arc::new(MockRuleService::default());
        let packets = Arc::new(MockPacketService::default());
        let app = activate(&core, rules.clone(), packets.clone());

        app.install().unwrap();
        app.start_trace().unwrap();
        assert_eq!(packets.registered_count(), 1);

        app.deactivate().unwrap();
        assert_eq!(packets.registered_count(), 0);
        assert_eq!(rules.removed_apps(), vec![AppId(1)]);
    }
}
