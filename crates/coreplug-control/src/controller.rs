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

//! The decision engine: load smoothing, the ladder rule, and the forced
//! offline/online passes.

use crate::policy::PolicyState;
use crate::sampler::{LoadSampler, SampleError};
use coreplug_core::{CoreHotplug, CoreId, CpuTimeSource, CpuTimes, Percent};
use coreplug_telemetry::HotplugMetrics;
use std::sync::Arc;

/// Everything the controller remembers about one core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreState {
    /// Last commanded (or observed) online state.
    pub is_online: bool,
    /// Counters at the previous sample.
    pub previous_times: CpuTimes,
    /// `false` until the first reading after the core came online.
    pub has_baseline: bool,
    /// Raw load measured by the previous iteration.
    pub last_observed_load: Percent,
    /// Smoothed load computed by the previous iteration.
    pub smoothed_load: Percent,
}

impl CoreState {
    /// Creates the record for a core in the given state, with no history.
    pub fn new(is_online: bool) -> Self {
        Self {
            is_online,
            previous_times: CpuTimes::default(),
            has_baseline: false,
            last_observed_load: Percent::ZERO,
            smoothed_load: Percent::ZERO,
        }
    }

    fn mark(&mut self, online: bool) {
        self.is_online = online;
        self.has_baseline = false;
        if !online {
            self.last_observed_load = Percent::ZERO;
            self.smoothed_load = Percent::ZERO;
        }
    }
}

/// What a pass or an iteration did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionReport {
    /// Cores brought online, in the order they were changed.
    pub onlined: Vec<CoreId>,
    /// Cores taken offline, in the order they were changed.
    pub offlined: Vec<CoreId>,
    /// Cores whose transition the hotplug primitive refused.
    pub failed: Vec<CoreId>,
}

impl TransitionReport {
    /// Returns `true` if nothing was attempted.
    pub fn is_empty(&self) -> bool {
        self.onlined.is_empty() && self.offlined.is_empty() && self.failed.is_empty()
    }

    /// Appends another report.
    pub fn merge(&mut self, other: TransitionReport) {
        self.onlined.extend(other.onlined);
        self.offlined.extend(other.offlined);
        self.failed.extend(other.failed);
    }
}

/// Per-core view captured while sampling, used by the ladder pass.
#[derive(Debug, Clone, Copy)]
struct Observation {
    online: bool,
    smoothed: Percent,
    trusted: bool,
}

/// Owns every [`CoreState`] and drives all core transitions.
///
/// Transitions are issued one at a time through `&mut self`; the owning
/// [`Governor`](crate::Governor) holds the controller behind its lock, so at
/// most one transition is ever in flight.
pub struct CoreController {
    cores: Vec<CoreState>,
    hotplug: Arc<dyn CoreHotplug>,
    sampler: LoadSampler,
    metrics: Arc<HotplugMetrics>,
}

impl CoreController {
    /// Creates a controller, observing the current online state of every core.
    ///
    /// Core 0 is recorded as online regardless of what the platform reports.
    pub fn new(
        hotplug: Arc<dyn CoreHotplug>,
        times: Arc<dyn CpuTimeSource>,
        metrics: Arc<HotplugMetrics>,
    ) -> Self {
        let core_count = hotplug.core_count().max(1);
        let cores = (0..core_count)
            .map(|i| CoreState::new(i == 0 || hotplug.is_online(CoreId(i))))
            .collect();
        Self {
            cores,
            hotplug,
            sampler: LoadSampler::new(times),
            metrics,
        }
    }

    /// Number of cores managed.
    pub fn core_count(&self) -> usize {
        self.cores.len()
    }

    /// Per-core records, indexed by core id.
    pub fn cores(&self) -> &[CoreState] {
        &self.cores
    }

    /// Returns `true` if the core is recorded as online.
    pub fn is_online(&self, core: CoreId) -> bool {
        self.cores.get(core.index()).is_some_and(|c| c.is_online)
    }

    /// Number of cores recorded as online.
    pub fn online_count(&self) -> usize {
        self.cores.iter().filter(|c| c.is_online).count()
    }

    /// Ids of the cores recorded as online, ascending.
    pub fn online_cores(&self) -> Vec<CoreId> {
        self.cores
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_online)
            .map(|(i, _)| CoreId(i))
            .collect()
    }

    /// Takes a baseline reading of every online core so the next iteration
    /// produces trusted loads.
    pub fn prime(&mut self) {
        for (i, state) in self.cores.iter_mut().enumerate() {
            if state.is_online {
                if let Err(e) = self.sampler.sample(CoreId(i), state) {
                    log::debug!("Baseline reading skipped: {e}");
                }
            }
        }
    }

    /// Picks up state changes made behind the controller's back.
    fn sync_with_platform(&mut self) {
        for (i, state) in self.cores.iter_mut().enumerate().skip(1) {
            let online = self.hotplug.is_online(CoreId(i));
            if online != state.is_online {
                log::info!(
                    "{}: externally changed to {}",
                    CoreId(i),
                    if online { "online" } else { "offline" }
                );
                state.mark(online);
            }
        }
    }

    /// Runs one load-based iteration.
    ///
    /// Samples cores `[0, core_limit)`, smooths each reading with the previous
    /// one, then applies the ladder rule: an online core whose smoothed load
    /// is above the threshold pulls its neighbour `i + 1` online (within the
    /// active cap); one below the threshold releases it. A neighbour is only
    /// released on a trusted reading, and each core is changed at most once.
    /// A core released earlier in the same iteration no longer acts.
    pub fn run_iteration(&mut self, policy: &PolicyState) -> TransitionReport {
        self.sync_with_platform();

        let core_count = self.cores.len();
        let limit = policy.core_limit().min(core_count);
        let cap = policy.resume_core_cap().min(core_count);
        let threshold = policy.load_threshold();

        let mut observed = Vec::with_capacity(limit);
        for (i, state) in self.cores.iter_mut().enumerate().take(limit) {
            let core = CoreId(i);
            let (load, trusted) = match self.sampler.sample(core, state) {
                Ok(sample) => {
                    if !sample.trusted {
                        self.metrics.record_degraded_sample();
                    }
                    (sample.load, sample.trusted)
                }
                Err(SampleError::CoreOffline(_)) => (Percent::ZERO, false),
            };
            let smoothed = load.average(state.last_observed_load);
            state.last_observed_load = load;
            state.smoothed_load = smoothed;
            observed.push(Observation {
                online: state.is_online,
                smoothed,
                trusted,
            });
        }

        log::trace!(
            "Iteration loads: {:?}",
            observed.iter().map(|o| o.smoothed.get()).collect::<Vec<_>>()
        );

        let mut report = TransitionReport::default();
        for (i, obs) in observed.iter().enumerate() {
            let next = CoreId(i + 1);
            // A source must have been online when sampled and still be online.
            if !obs.online || !self.cores[i].is_online || next.index() >= core_count {
                continue;
            }
            let next_online = self.cores[next.index()].is_online;

            if obs.smoothed > threshold && !next_online && next.index() < cap {
                log::debug!("{}: load {} > {}, onlining {next}", CoreId(i), obs.smoothed, threshold);
                self.bring_online(next, &mut report);
            } else if obs.smoothed < threshold && next_online && !next.is_boot() {
                if obs.trusted {
                    log::debug!("{}: load {} < {}, offlining {next}", CoreId(i), obs.smoothed, threshold);
                    self.take_offline(next, &mut report);
                } else {
                    log::trace!("{}: untrusted reading, keeping {next} online", CoreId(i));
                }
            }
        }
        report
    }

    /// Takes offline every online core with index `>= keep`, highest first.
    ///
    /// Core 0 always survives, whatever `keep` is.
    pub fn force_offline(&mut self, keep: usize) -> TransitionReport {
        let keep = keep.max(1);
        let mut report = TransitionReport::default();
        for i in (keep..self.cores.len()).rev() {
            if self.cores[i].is_online {
                self.take_offline(CoreId(i), &mut report);
            }
        }
        if !report.is_empty() {
            log::info!(
                "Forced offline: {} cores offlined, {} online",
                report.offlined.len(),
                self.online_count()
            );
        }
        report
    }

    /// Brings online every offline core in `1..cap`, lowest first.
    pub fn force_online(&mut self, cap: usize) -> TransitionReport {
        let cap = cap.min(self.cores.len());
        let mut report = TransitionReport::default();
        for i in 1..cap {
            if !self.cores[i].is_online {
                self.bring_online(CoreId(i), &mut report);
            }
        }
        if !report.is_empty() {
            log::info!(
                "Forced online: {} cores onlined, {} online",
                report.onlined.len(),
                self.online_count()
            );
        }
        report
    }

    fn bring_online(&mut self, core: CoreId, report: &mut TransitionReport) {
        match self.hotplug.bring_online(core) {
            Ok(()) => {
                self.cores[core.index()].mark(true);
                self.metrics.record_online();
                report.onlined.push(core);
            }
            Err(e) => {
                log::warn!("Failed to bring {core} online: {e}");
                self.metrics.record_failed_transition();
                report.failed.push(core);
            }
        }
    }

    fn take_offline(&mut self, core: CoreId, report: &mut TransitionReport) {
        if core.is_boot() {
            return;
        }
        match self.hotplug.take_offline(core) {
            Ok(()) => {
                self.cores[core.index()].mark(false);
                self.metrics.record_offline();
                report.offlined.push(core);
            }
            Err(e) => {
                log::warn!("Failed to take {core} offline: {e}");
                self.metrics.record_failed_transition();
                report.failed.push(core);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coreplug_infra::SimulatedCpus;

    fn controller_with(sim: &Arc<SimulatedCpus>) -> CoreController {
        let mut controller = CoreController::new(
            sim.clone(),
            sim.clone(),
            Arc::new(HotplugMetrics::new()),
        );
        controller.prime();
        controller
    }

    fn ids(raw: &[usize]) -> Vec<CoreId> {
        raw.iter().map(|&i| CoreId(i)).collect()
    }

    /// Fills the smoothing history without letting any transition through.
    fn warm_up(controller: &mut CoreController, sim: &SimulatedCpus, policy: &PolicyState) {
        sim.set_frozen(true);
        controller.run_iteration(policy);
        sim.set_frozen(false);
    }

    #[test]
    fn test_new_observes_platform_state() {
        let sim = Arc::new(SimulatedCpus::new(8));
        sim.set_online_cores(&[0, 1, 5]);
        let controller = controller_with(&sim);
        assert_eq!(controller.online_cores(), ids(&[0, 1, 5]));
        assert_eq!(controller.online_count(), 3);
    }

    #[test]
    fn test_ladder_onlines_next_core_above_threshold() {
        let sim = Arc::new(SimulatedCpus::new(8));
        sim.set_online_cores(&[0, 1]);
        let mut controller = controller_with(&sim);
        let mut policy = PolicyState::new(8);
        policy.set_load_threshold(65).unwrap();

        sim.set_load(CoreId(0), 70);
        sim.set_load(CoreId(1), 70);
        warm_up(&mut controller, &sim, &policy);
        assert_eq!(controller.online_cores(), ids(&[0, 1]));

        let report = controller.run_iteration(&policy);
        assert_eq!(report.onlined, ids(&[2]));
        assert_eq!(controller.online_cores(), ids(&[0, 1, 2]));
    }

    #[test]
    fn test_ladder_offlines_next_core_below_threshold() {
        let sim = Arc::new(SimulatedCpus::new(8));
        sim.set_online_cores(&[0, 1, 2]);
        let mut controller = controller_with(&sim);
        let policy = PolicyState::new(8);

        sim.set_load(CoreId(0), 90);
        sim.set_load(CoreId(1), 5);
        sim.set_load(CoreId(2), 5);
        warm_up(&mut controller, &sim, &policy);
        let report = controller.run_iteration(&policy);
        assert_eq!(report.offlined, ids(&[2]));
        assert!(controller.is_online(CoreId(1)));
        assert!(controller.is_online(CoreId(0)));
    }

    #[test]
    fn test_untrusted_reading_never_offlines() {
        let sim = Arc::new(SimulatedCpus::new(4));
        sim.set_online_cores(&[0, 1]);
        let mut controller = CoreController::new(
            sim.clone(),
            sim.clone(),
            Arc::new(HotplugMetrics::new()),
        );
        // No prime: the first iteration only has baseline readings.
        let report = controller.run_iteration(&PolicyState::new(4));
        assert!(report.is_empty());
        assert!(controller.is_online(CoreId(1)));
    }

    #[test]
    fn test_ladder_respects_active_cap() {
        let sim = Arc::new(SimulatedCpus::new(8));
        sim.set_online_cores(&[0, 1, 2, 3]);
        let mut controller = controller_with(&sim);
        let mut policy = PolicyState::new(8);
        policy.set_resume_cpus(4).unwrap();

        for i in 0..8 {
            sim.set_load(CoreId(i), 100);
        }
        warm_up(&mut controller, &sim, &policy);
        for _ in 0..3 {
            controller.run_iteration(&policy);
        }
        assert_eq!(controller.online_count(), 4);
    }

    #[test]
    fn test_freshly_onlined_core_is_not_a_source() {
        let sim = Arc::new(SimulatedCpus::new(8));
        sim.set_online_cores(&[0, 2]);
        let mut controller = controller_with(&sim);
        let policy = PolicyState::new(8);

        sim.set_load(CoreId(0), 100);
        controller.run_iteration(&policy);
        let report = controller.run_iteration(&policy);
        // Core 1 comes online idle; it only acts on core 2 from the next tick.
        assert_eq!(report.onlined, ids(&[1]));
        assert!(report.offlined.is_empty());
        assert!(controller.is_online(CoreId(2)));
    }

    #[test]
    fn test_core_released_this_iteration_is_not_a_source() {
        let sim = Arc::new(SimulatedCpus::new(8));
        sim.set_online_cores(&[0, 1]);
        let mut controller = controller_with(&sim);
        let policy = PolicyState::new(8);

        sim.set_load(CoreId(0), 5);
        sim.set_load(CoreId(1), 95);
        warm_up(&mut controller, &sim, &policy);
        let report = controller.run_iteration(&policy);

        // Core 0 idles core 1 off; core 1's stale load must not pull in core 2.
        assert_eq!(report.offlined, ids(&[1]));
        assert!(report.onlined.is_empty());
        assert_eq!(controller.online_cores(), ids(&[0]));
        assert!(!sim.is_core_online(CoreId(2)));
    }

    #[test]
    fn test_failed_transition_is_skipped_and_retried() {
        let sim = Arc::new(SimulatedCpus::new(4));
        sim.set_online_cores(&[0]);
        let mut controller = controller_with(&sim);
        let policy = PolicyState::new(4);

        sim.set_load(CoreId(0), 100);
        sim.fail_transitions(CoreId(1), true);
        controller.run_iteration(&policy);
        let report = controller.run_iteration(&policy);
        assert_eq!(report.failed, ids(&[1]));
        assert!(!controller.is_online(CoreId(1)));

        sim.fail_transitions(CoreId(1), false);
        let report = controller.run_iteration(&policy);
        assert_eq!(report.onlined, ids(&[1]));
    }

    #[test]
    fn test_force_offline_keeps_lowest_cores() {
        let sim = Arc::new(SimulatedCpus::new(8));
        let mut controller = controller_with(&sim);
        assert_eq!(controller.online_count(), 8);

        let report = controller.force_offline(2);
        assert_eq!(report.offlined, ids(&[7, 6, 5, 4, 3, 2]));
        assert_eq!(controller.online_cores(), ids(&[0, 1]));
    }

    #[test]
    fn test_force_offline_never_touches_core_zero() {
        let sim = Arc::new(SimulatedCpus::new(4));
        let mut controller = controller_with(&sim);
        controller.force_offline(0);
        assert_eq!(controller.online_cores(), ids(&[0]));
    }

    #[test]
    fn test_force_online_stops_below_cap() {
        let sim = Arc::new(SimulatedCpus::new(8));
        sim.set_online_cores(&[0]);
        let mut controller = controller_with(&sim);

        let report = controller.force_online(7);
        assert_eq!(report.onlined, ids(&[1, 2, 3, 4, 5, 6]));
        assert!(!controller.is_online(CoreId(7)));
    }

    #[test]
    fn test_external_change_is_picked_up() {
        let sim = Arc::new(SimulatedCpus::new(4));
        let mut controller = controller_with(&sim);
        sim.set_online_cores(&[0, 1]);
        controller.run_iteration(&PolicyState::new(4));
        assert!(!controller.is_online(CoreId(3)));
    }
}
