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

//! An in-memory processor package.
//!
//! Every core carries a busy percentage and a pair of synthetic cumulative
//! clocks. Each time read advances the core's wall clock by a fixed step and
//! its idle clock by the idle share of that step, so a core set to 70% busy
//! reads as exactly 70% over any interval. Offline cores do not accumulate
//! time, matching how the kernel drops them from `/proc/stat`.

use coreplug_core::{CoreHotplug, CoreId, CpuTimeSource, CpuTimes, PlatformError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Wall-clock ticks added per read.
const TICKS_PER_READ: u64 = 1_000;

/// A successful hotplug transition, as recorded by [`SimulatedCpus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulatedTransition {
    /// The core that changed.
    pub core: CoreId,
    /// Its new state.
    pub online: bool,
}

#[derive(Debug, Clone, Default)]
struct SimCore {
    online: bool,
    busy_pct: u64,
    idle: u64,
    wall: u64,
    failing: bool,
}

#[derive(Debug)]
struct Package {
    cores: Vec<SimCore>,
    log: Vec<SimulatedTransition>,
}

/// A simulated package of `N` cores, all online and idle at creation.
#[derive(Debug)]
pub struct SimulatedCpus {
    package: Mutex<Package>,
    frozen: AtomicBool,
}

impl SimulatedCpus {
    /// Creates a package of `core_count` cores (at least one).
    pub fn new(core_count: usize) -> Self {
        let cores = (0..core_count.max(1))
            .map(|_| SimCore {
                online: true,
                ..SimCore::default()
            })
            .collect();
        Self {
            package: Mutex::new(Package {
                cores,
                log: Vec::new(),
            }),
            frozen: AtomicBool::new(false),
        }
    }

    fn package(&self) -> MutexGuard<'_, Package> {
        self.package.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sets exactly which cores are online, bypassing the transition log.
    /// Core 0 stays online regardless.
    pub fn set_online_cores(&self, online: &[usize]) {
        let mut package = self.package();
        for (i, core) in package.cores.iter_mut().enumerate() {
            core.online = i == 0 || online.contains(&i);
        }
    }

    /// Sets a core's busy percentage, clamped to 100.
    pub fn set_load(&self, core: CoreId, busy_pct: u32) {
        if let Some(c) = self.package().cores.get_mut(core.index()) {
            c.busy_pct = u64::from(busy_pct.min(100));
        }
    }

    /// Makes every transition on `core` fail until cleared.
    pub fn fail_transitions(&self, core: CoreId, failing: bool) {
        if let Some(c) = self.package().cores.get_mut(core.index()) {
            c.failing = failing;
        }
    }

    /// While frozen, every transition on every core fails.
    pub fn set_frozen(&self, frozen: bool) {
        self.frozen.store(frozen, Ordering::SeqCst);
    }

    /// Online state as seen by the simulated hardware.
    pub fn is_core_online(&self, core: CoreId) -> bool {
        self.is_online(core)
    }

    /// Every successful transition so far, oldest first.
    pub fn transition_log(&self) -> Vec<SimulatedTransition> {
        self.package().log.clone()
    }

    fn transition(&self, core: CoreId, online: bool) -> Result<(), PlatformError> {
        let mut guard = self.package();
        let package = &mut *guard;
        let core_count = package.cores.len();
        let frozen = self.frozen.load(Ordering::SeqCst);
        let c = package
            .cores
            .get_mut(core.index())
            .ok_or(PlatformError::UnknownCore { core, core_count })?;

        let refusal = if frozen {
            Some("package frozen")
        } else if c.failing {
            Some("injected failure")
        } else if core.is_boot() && !online {
            Some("boot core cannot be taken offline")
        } else {
            None
        };
        if let Some(reason) = refusal {
            return Err(PlatformError::TransitionFailed {
                core,
                reason: reason.into(),
            });
        }

        if c.online != online {
            c.online = online;
            package.log.push(SimulatedTransition { core, online });
        }
        Ok(())
    }
}

impl CoreHotplug for SimulatedCpus {
    fn core_count(&self) -> usize {
        self.package().cores.len()
    }

    fn is_online(&self, core: CoreId) -> bool {
        self.package()
            .cores
            .get(core.index())
            .is_some_and(|c| c.online)
    }

    fn bring_online(&self, core: CoreId) -> Result<(), PlatformError> {
        self.transition(core, true)
    }

    fn take_offline(&self, core: CoreId) -> Result<(), PlatformError> {
        self.transition(core, false)
    }
}

impl CpuTimeSource for SimulatedCpus {
    fn read_idle_and_wall(&self, core: CoreId) -> Result<CpuTimes, PlatformError> {
        let mut package = self.package();
        let core_count = package.cores.len();
        let c = package
            .cores
            .get_mut(core.index())
            .ok_or(PlatformError::UnknownCore { core, core_count })?;
        if !c.online {
            return Err(PlatformError::TimesUnavailable { core });
        }
        c.wall += TICKS_PER_READ;
        c.idle += TICKS_PER_READ * (100 - c.busy_pct) / 100;
        Ok(CpuTimes::new(c.idle, c.wall))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_package_is_online_and_idle() {
        let sim = SimulatedCpus::new(4);
        assert_eq!(sim.core_count(), 4);
        assert!((0..4).all(|i| sim.is_online(CoreId(i))));
        let first = sim.read_idle_and_wall(CoreId(2)).unwrap();
        let second = sim.read_idle_and_wall(CoreId(2)).unwrap();
        assert_eq!(second.wall - first.wall, TICKS_PER_READ);
        assert_eq!(second.idle - first.idle, TICKS_PER_READ);
    }

    #[test]
    fn test_load_shapes_idle_delta() {
        let sim = SimulatedCpus::new(2);
        sim.set_load(CoreId(1), 70);
        let a = sim.read_idle_and_wall(CoreId(1)).unwrap();
        let b = sim.read_idle_and_wall(CoreId(1)).unwrap();
        assert_eq!(b.idle - a.idle, 300);
    }

    #[test]
    fn test_offline_core_has_no_times() {
        let sim = SimulatedCpus::new(2);
        sim.take_offline(CoreId(1)).unwrap();
        assert!(matches!(
            sim.read_idle_and_wall(CoreId(1)),
            Err(PlatformError::TimesUnavailable { .. })
        ));
    }

    #[test]
    fn test_transitions_are_logged_once() {
        let sim = SimulatedCpus::new(3);
        sim.take_offline(CoreId(2)).unwrap();
        sim.take_offline(CoreId(2)).unwrap();
        sim.bring_online(CoreId(2)).unwrap();
        assert_eq!(
            sim.transition_log(),
            vec![
                SimulatedTransition {
                    core: CoreId(2),
                    online: false
                },
                SimulatedTransition {
                    core: CoreId(2),
                    online: true
                },
            ]
        );
    }

    #[test]
    fn test_failure_injection_and_freeze() {
        let sim = SimulatedCpus::new(3);
        sim.fail_transitions(CoreId(1), true);
        assert!(sim.take_offline(CoreId(1)).is_err());
        sim.fail_transitions(CoreId(1), false);

        sim.set_frozen(true);
        assert!(sim.take_offline(CoreId(1)).is_err());
        sim.set_frozen(false);
        sim.take_offline(CoreId(1)).unwrap();
        assert!(!sim.is_core_online(CoreId(1)));
    }

    #[test]
    fn test_boot_core_stays_online() {
        let sim = SimulatedCpus::new(2);
        assert!(sim.take_offline(CoreId(0)).is_err());
        sim.set_online_cores(&[]);
        assert!(sim.is_online(CoreId(0)));
        assert!(!sim.is_online(CoreId(1)));
    }
}
