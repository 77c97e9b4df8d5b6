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

//! The single synchronized entry point to the controller state.

use crate::config::{ConfigError, GovernorConfig};
use crate::controller::{CoreController, TransitionReport};
use crate::policy::{PolicyState, ValidationError};
use crate::suspend::{PowerPhase, SuspendCoordinator};
use coreplug_core::{CoreHotplug, CoreId, CpuTimeSource, EnduranceLevel, Percent, PowerEvent};
use coreplug_telemetry::{HotplugMetrics, MetricsSnapshot};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Everything guarded by the governor's lock.
pub(crate) struct GovernorState {
    pub(crate) policy: PolicyState,
    pub(crate) controller: CoreController,
    pub(crate) coordinator: SuspendCoordinator,
}

/// Result of one timer tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// A load-based iteration ran.
    Ran(TransitionReport),
    /// The device is suspended; nothing was sampled or changed.
    SkippedSuspended,
}

/// Per-core entry of a [`GovernorStatus`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoreStatus {
    /// Core index.
    pub core: CoreId,
    /// Whether the core is online.
    pub online: bool,
    /// Raw load from the last iteration.
    pub last_load: Percent,
    /// Smoothed load from the last iteration.
    pub smoothed_load: Percent,
}

/// A consistent snapshot of the controller, taken under the lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GovernorStatus {
    /// Current power phase.
    pub phase: PowerPhase,
    /// Endurance level in force.
    pub endurance_level: EnduranceLevel,
    /// Effective suspend cap.
    pub suspend_core_cap: usize,
    /// Effective resume cap.
    pub resume_core_cap: usize,
    /// Sampling interval in milliseconds.
    pub sampling_rate_ms: u64,
    /// Load threshold.
    pub load_threshold: Percent,
    /// Number of online cores.
    pub online_count: usize,
    /// Per-core detail.
    pub cores: Vec<CoreStatus>,
}

/// Owns the policy, the controller and the suspend coordinator behind one
/// mutual-exclusion lock.
///
/// Every entry point (timer tick, power event, tunable write, endurance
/// change) holds the lock for the duration of its work, so none of them can
/// observe or produce a half-applied state.
pub struct Governor {
    state: Mutex<GovernorState>,
    metrics: Arc<HotplugMetrics>,
}

impl Governor {
    /// Creates a governor with the given policy.
    ///
    /// Observes the platform, trims any cores above the active cap, and takes
    /// baseline readings so the first tick produces trusted loads.
    pub fn new(
        policy: PolicyState,
        hotplug: Arc<dyn CoreHotplug>,
        times: Arc<dyn CpuTimeSource>,
        metrics: Arc<HotplugMetrics>,
    ) -> Self {
        let mut controller = CoreController::new(hotplug, times, Arc::clone(&metrics));
        let trimmed = controller.force_offline(policy.resume_core_cap());
        if !trimmed.offlined.is_empty() {
            log::info!(
                "Startup: trimmed {} cores above the active cap of {}",
                trimmed.offlined.len(),
                policy.resume_core_cap()
            );
        }
        controller.prime();

        log::info!(
            "Governor ready: {} cores, {} online, endurance {}",
            controller.core_count(),
            controller.online_count(),
            policy.endurance()
        );

        Self {
            state: Mutex::new(GovernorState {
                policy,
                controller,
                coordinator: SuspendCoordinator::new(),
            }),
            metrics,
        }
    }

    /// Creates a governor from a validated configuration.
    pub fn from_config(
        config: &GovernorConfig,
        hotplug: Arc<dyn CoreHotplug>,
        times: Arc<dyn CpuTimeSource>,
        metrics: Arc<HotplugMetrics>,
    ) -> Result<Self, ConfigError> {
        let policy = config.to_policy(hotplug.core_count())?;
        Ok(Self::new(policy, hotplug, times, metrics))
    }

    /// Acquires the state lock, recovering it if a holder panicked. Every
    /// mutation is a single assignment or a completed transition.
    pub(crate) fn lock(&self) -> MutexGuard<'_, GovernorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The shared metrics.
    pub fn metrics(&self) -> &Arc<HotplugMetrics> {
        &self.metrics
    }

    /// A copy of the metrics counters.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// One periodic iteration. Does nothing while suspended.
    pub fn tick(&self) -> TickOutcome {
        let mut guard = self.lock();
        let GovernorState {
            policy,
            controller,
            coordinator,
        } = &mut *guard;

        if coordinator.is_suspended() {
            self.metrics.record_skipped_iteration();
            log::trace!("Tick skipped: suspended");
            return TickOutcome::SkippedSuspended;
        }

        let report = controller.run_iteration(policy);
        self.metrics.record_iteration();
        TickOutcome::Ran(report)
    }

    /// Interval before the next tick.
    pub fn sampling_interval(&self) -> Duration {
        self.lock().policy.sampling_interval()
    }

    /// Dispatches a power notification.
    pub fn handle_power_event(&self, event: PowerEvent) -> TransitionReport {
        match event {
            PowerEvent::Suspend => self.suspend(),
            PowerEvent::Resume => self.resume(),
        }
    }

    /// Handles a suspend notification.
    pub fn suspend(&self) -> TransitionReport {
        let mut guard = self.lock();
        let GovernorState {
            policy,
            controller,
            coordinator,
        } = &mut *guard;
        self.metrics.record_suspend();
        coordinator.suspend(controller, policy)
    }

    /// Handles a resume notification.
    pub fn resume(&self) -> TransitionReport {
        let mut guard = self.lock();
        let GovernorState {
            policy,
            controller,
            coordinator,
        } = &mut *guard;
        self.metrics.record_resume();
        coordinator.resume(controller, policy)
    }

    /// Current power phase.
    pub fn phase(&self) -> PowerPhase {
        self.lock().coordinator.phase()
    }

    /// Switches the endurance level and applies the new bounds immediately.
    ///
    /// Runs the forced-offline pass with the new suspend cap. While active it
    /// then runs the forced-online pass with the new resume cap, trimming
    /// first if the resume cap is the smaller of the two; while suspended it
    /// tops the package back up to the new suspend cap. Setting the level
    /// already in force does nothing.
    pub fn set_endurance(&self, level: EnduranceLevel) -> TransitionReport {
        let mut guard = self.lock();
        Self::apply_endurance(&mut guard, level)
    }

    pub(crate) fn apply_endurance(
        state: &mut GovernorState,
        level: EnduranceLevel,
    ) -> TransitionReport {
        let GovernorState {
            policy,
            controller,
            coordinator,
        } = state;

        if !policy.set_endurance(level) {
            log::debug!("Endurance level already {level}");
            return TransitionReport::default();
        }

        log::info!(
            "Endurance level set to {level}: active cap {}, suspend cap {}",
            policy.resume_core_cap(),
            policy.suspend_core_cap()
        );

        let mut report = controller.force_offline(policy.suspend_core_cap());
        if coordinator.is_suspended() {
            report.merge(controller.force_online(policy.suspend_core_cap()));
        } else {
            report.merge(controller.force_offline(policy.resume_core_cap()));
            report.merge(controller.force_online(policy.resume_core_cap()));
            controller.prime();
        }
        report
    }

    /// Sets the requested suspend cap.
    ///
    /// While active it takes effect at the next suspend. While suspended the
    /// package is moved to the new cap immediately.
    pub fn set_suspend_cpus(&self, value: i64) -> Result<TransitionReport, ValidationError> {
        let mut guard = self.lock();
        Self::apply_suspend_cpus(&mut guard, value)
    }

    pub(crate) fn apply_suspend_cpus(
        state: &mut GovernorState,
        value: i64,
    ) -> Result<TransitionReport, ValidationError> {
        state.policy.set_suspend_cpus(value)?;
        if !state.coordinator.is_suspended() {
            return Ok(TransitionReport::default());
        }
        let cap = state.policy.suspend_core_cap();
        let mut report = state.controller.force_offline(cap);
        report.merge(state.controller.force_online(cap));
        Ok(report)
    }

    /// Sets the requested resume cap.
    ///
    /// While active, cores at or above the new effective cap are taken offline
    /// immediately so the active bound holds.
    pub fn set_resume_cpus(&self, value: i64) -> Result<TransitionReport, ValidationError> {
        let mut guard = self.lock();
        Self::apply_resume_cpus(&mut guard, value)
    }

    pub(crate) fn apply_resume_cpus(
        state: &mut GovernorState,
        value: i64,
    ) -> Result<TransitionReport, ValidationError> {
        state.policy.set_resume_cpus(value)?;
        if state.coordinator.is_suspended() {
            return Ok(TransitionReport::default());
        }
        Ok(state
            .controller
            .force_offline(state.policy.resume_core_cap()))
    }

    /// Sets the sampling interval in milliseconds. Applies from the next re-arm.
    pub fn set_sampling_rate_ms(&self, value: i64) -> Result<(), ValidationError> {
        self.lock().policy.set_sampling_rate_ms(value)
    }

    /// Sets the load threshold.
    pub fn set_load_threshold(&self, value: i64) -> Result<(), ValidationError> {
        self.lock().policy.set_load_threshold(value)
    }

    /// A consistent snapshot of phase, policy and per-core state.
    pub fn status(&self) -> GovernorStatus {
        let guard = self.lock();
        let cores = guard
            .controller
            .cores()
            .iter()
            .enumerate()
            .map(|(i, c)| CoreStatus {
                core: CoreId(i),
                online: c.is_online,
                last_load: c.last_observed_load,
                smoothed_load: c.smoothed_load,
            })
            .collect();
        GovernorStatus {
            phase: guard.coordinator.phase(),
            endurance_level: guard.policy.endurance(),
            suspend_core_cap: guard.policy.suspend_core_cap(),
            resume_core_cap: guard.policy.resume_core_cap(),
            sampling_rate_ms: guard.policy.sampling_interval().as_millis() as u64,
            load_threshold: guard.policy.load_threshold(),
            online_count: guard.controller.online_count(),
            cores,
        }
    }

    /// Ids of the online cores.
    pub fn online_cores(&self) -> Vec<CoreId> {
        self.lock().controller.online_cores()
    }
}
