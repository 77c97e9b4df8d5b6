// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Suspend/resume state machine.

use crate::controller::{CoreController, TransitionReport};
use crate::policy::PolicyState;
use serde::Serialize;

/// The device-wide power phase as seen by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerPhase {
    /// Normal operation: the periodic loop makes load-based decisions.
    #[default]
    Active,
    /// Low-power state: only the suspend cap's cores stay online and the
    /// periodic loop does no work.
    Suspended,
}

/// Applies the forced passes that accompany suspend and resume.
#[derive(Debug, Default)]
pub struct SuspendCoordinator {
    phase: PowerPhase,
}

impl SuspendCoordinator {
    /// Creates a coordinator in the `Active` phase.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current phase.
    pub fn phase(&self) -> PowerPhase {
        self.phase
    }

    /// Returns `true` while suspended.
    pub fn is_suspended(&self) -> bool {
        self.phase == PowerPhase::Suspended
    }

    /// Enters `Suspended` with exactly the suspend cap's cores online: every
    /// core at or above the cap is taken offline, then any core below it that
    /// the ladder had released is brought back.
    ///
    /// A repeated suspend re-runs both passes; it is a no-op unless something
    /// changed the online set in between.
    pub fn suspend(
        &mut self,
        controller: &mut CoreController,
        policy: &PolicyState,
    ) -> TransitionReport {
        if self.is_suspended() {
            log::debug!("Suspend received while already suspended");
        }
        self.phase = PowerPhase::Suspended;
        let mut report = controller.force_offline(policy.suspend_core_cap());
        report.merge(controller.force_online(policy.suspend_core_cap()));
        log::info!(
            "Suspended with {} cores online (cap {})",
            controller.online_count(),
            policy.suspend_core_cap()
        );
        report
    }

    /// Returns to `Active`, bringing online every core below the resume cap.
    ///
    /// Cores kept across the suspend that sit at or above a smaller resume
    /// cap are released first.
    pub fn resume(
        &mut self,
        controller: &mut CoreController,
        policy: &PolicyState,
    ) -> TransitionReport {
        if !self.is_suspended() {
            log::debug!("Resume received while already active");
        }
        self.phase = PowerPhase::Active;
        let mut report = controller.force_offline(policy.resume_core_cap());
        report.merge(controller.force_online(policy.resume_core_cap()));
        controller.prime();
        log::info!(
            "Resumed with {} cores online (cap {})",
            controller.online_count(),
            policy.resume_core_cap()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coreplug_core::CoreId;
    use coreplug_infra::SimulatedCpus;
    use coreplug_telemetry::HotplugMetrics;
    use std::sync::Arc;

    fn setup() -> (Arc<SimulatedCpus>, CoreController, PolicyState) {
        let sim = Arc::new(SimulatedCpus::new(8));
        let controller =
            CoreController::new(sim.clone(), sim.clone(), Arc::new(HotplugMetrics::new()));
        (sim, controller, PolicyState::new(8))
    }

    #[test]
    fn test_starts_active() {
        assert_eq!(SuspendCoordinator::new().phase(), PowerPhase::Active);
    }

    #[test]
    fn test_suspend_keeps_suspend_cap_cores() {
        let (_sim, mut controller, policy) = setup();
        let mut coordinator = SuspendCoordinator::new();

        coordinator.suspend(&mut controller, &policy);
        assert!(coordinator.is_suspended());
        assert_eq!(controller.online_cores(), vec![CoreId(0), CoreId(1)]);
    }

    #[test]
    fn test_suspend_tops_up_an_idled_package() {
        let (sim, _, policy) = setup();
        sim.set_online_cores(&[0]);
        let mut controller =
            CoreController::new(sim.clone(), sim.clone(), Arc::new(HotplugMetrics::new()));
        let mut coordinator = SuspendCoordinator::new();

        let report = coordinator.suspend(&mut controller, &policy);
        assert_eq!(report.onlined, vec![CoreId(1)]);
        assert!(report.offlined.is_empty());
        assert_eq!(controller.online_count(), policy.suspend_core_cap());
        assert!(sim.is_core_online(CoreId(1)));
    }

    #[test]
    fn test_resume_restores_up_to_resume_cap() {
        let (sim, mut controller, mut policy) = setup();
        let mut coordinator = SuspendCoordinator::new();
        policy.set_resume_cpus(7).unwrap();

        coordinator.suspend(&mut controller, &policy);
        let report = coordinator.resume(&mut controller, &policy);

        assert_eq!(coordinator.phase(), PowerPhase::Active);
        assert_eq!(report.onlined.len(), 5);
        assert_eq!(controller.online_count(), 7);
        assert!(!sim.is_core_online(CoreId(7)));
    }

    #[test]
    fn test_resume_trims_to_smaller_resume_cap() {
        let (_sim, mut controller, mut policy) = setup();
        let mut coordinator = SuspendCoordinator::new();
        policy.set_suspend_cpus(3).unwrap();
        policy.set_resume_cpus(1).unwrap();

        coordinator.suspend(&mut controller, &policy);
        assert_eq!(controller.online_count(), 3);
        let report = coordinator.resume(&mut controller, &policy);
        assert_eq!(report.offlined, vec![CoreId(2), CoreId(1)]);
        assert_eq!(controller.online_cores(), vec![CoreId(0)]);
    }

    #[test]
    fn test_repeated_suspend_is_harmless() {
        let (_sim, mut controller, policy) = setup();
        let mut coordinator = SuspendCoordinator::new();
        coordinator.suspend(&mut controller, &policy);
        let second = coordinator.suspend(&mut controller, &policy);
        assert!(second.is_empty());
        assert_eq!(controller.online_count(), 2);
    }
}
