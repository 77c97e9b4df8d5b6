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

//! Policy knobs and the core-count bounds derived from them.

use coreplug_core::{EnduranceLevel, Percent};
use std::time::Duration;

/// Default interval between two control-loop iterations.
pub const DEFAULT_SAMPLING_RATE_MS: u64 = 250;
/// Sampling rates must be strictly above this value, in milliseconds.
pub const MIN_SAMPLING_RATE_MS: u64 = 50;
/// Default smoothed-load threshold.
pub const DEFAULT_LOAD_THRESHOLD: u32 = 65;
/// Load thresholds must be strictly above this value.
pub const MIN_LOAD_THRESHOLD: u32 = 10;
/// Default number of cores kept online across a suspend.
pub const DEFAULT_SUSPEND_CPUS: usize = 2;

/// A policy write outside its allowed range. The prior value is kept.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// `suspend_cpus` outside `1..=N`.
    #[error("suspend cpus {value} off-limits (expected 1..={max})")]
    SuspendCpus {
        /// The rejected value.
        value: i64,
        /// The core count.
        max: usize,
    },
    /// `resume_cpus` outside `1..=N`.
    #[error("resume cpus {value} off-limits (expected 1..={max})")]
    ResumeCpus {
        /// The rejected value.
        value: i64,
        /// The core count.
        max: usize,
    },
    /// Not one of the endurance level encodings.
    #[error("invalid endurance level {0} (expected 0, 1 or 2)")]
    EnduranceLevel(i64),
    /// Sampling rate at or below the minimum.
    #[error("sampling rate {0} ms too low (must be > 50)")]
    SamplingRate(i64),
    /// Load threshold outside `11..=100`.
    #[error("load threshold {0} off-limits (must be > 10 and <= 100)")]
    LoadThreshold(i64),
}

/// The policy in force: endurance level, operator-requested caps, sampling
/// interval and load threshold.
///
/// Requested caps are stored as written. The effective caps used by the
/// controller are always re-derived from them and the endurance level, so
/// tightening and then loosening the level restores the operator's choice.
#[derive(Debug, Clone)]
pub struct PolicyState {
    core_count: usize,
    endurance: EnduranceLevel,
    requested_suspend_cpus: usize,
    requested_resume_cpus: usize,
    sampling_interval: Duration,
    load_threshold: Percent,
}

impl PolicyState {
    /// Creates the default policy for a package with `core_count` cores.
    pub fn new(core_count: usize) -> Self {
        let core_count = core_count.max(1);
        Self {
            core_count,
            endurance: EnduranceLevel::Normal,
            requested_suspend_cpus: DEFAULT_SUSPEND_CPUS.min(core_count),
            requested_resume_cpus: core_count,
            sampling_interval: Duration::from_millis(DEFAULT_SAMPLING_RATE_MS),
            load_threshold: Percent::saturating(DEFAULT_LOAD_THRESHOLD),
        }
    }

    /// Number of cores on the package.
    pub fn core_count(&self) -> usize {
        self.core_count
    }

    /// The endurance level in force.
    pub fn endurance(&self) -> EnduranceLevel {
        self.endurance
    }

    /// Switches the endurance level. Returns `false` if it was already set.
    pub fn set_endurance(&mut self, level: EnduranceLevel) -> bool {
        if self.endurance == level {
            return false;
        }
        self.endurance = level;
        true
    }

    /// Switches the endurance level from its tunable encoding.
    pub fn set_endurance_raw(&mut self, raw: i64) -> Result<bool, ValidationError> {
        let level = EnduranceLevel::from_raw(raw).ok_or(ValidationError::EnduranceLevel(raw))?;
        Ok(self.set_endurance(level))
    }

    /// The operator-requested suspend cap.
    pub fn requested_suspend_cpus(&self) -> usize {
        self.requested_suspend_cpus
    }

    /// The operator-requested resume cap.
    pub fn requested_resume_cpus(&self) -> usize {
        self.requested_resume_cpus
    }

    /// Sets the requested suspend cap, `1..=N`.
    pub fn set_suspend_cpus(&mut self, value: i64) -> Result<(), ValidationError> {
        let cpus = self
            .validate_cpus(value)
            .ok_or(ValidationError::SuspendCpus {
                value,
                max: self.core_count,
            })?;
        self.requested_suspend_cpus = cpus;
        Ok(())
    }

    /// Sets the requested resume cap, `1..=N`.
    pub fn set_resume_cpus(&mut self, value: i64) -> Result<(), ValidationError> {
        let cpus = self
            .validate_cpus(value)
            .ok_or(ValidationError::ResumeCpus {
                value,
                max: self.core_count,
            })?;
        self.requested_resume_cpus = cpus;
        Ok(())
    }

    fn validate_cpus(&self, value: i64) -> Option<usize> {
        usize::try_from(value)
            .ok()
            .filter(|v| (1..=self.core_count).contains(v))
    }

    /// Number of cores kept online when the device suspends.
    pub fn suspend_core_cap(&self) -> usize {
        self.requested_suspend_cpus
            .clamp(1, self.endurance.suspended_bound(self.core_count))
    }

    /// Maximum number of cores online while the device is active.
    pub fn resume_core_cap(&self) -> usize {
        self.requested_resume_cpus
            .clamp(1, self.endurance.active_bound(self.core_count))
    }

    /// Number of cores the periodic pass considers as ladder sources.
    ///
    /// Each endurance level gets its own limit, equal to the active cap.
    pub fn core_limit(&self) -> usize {
        self.resume_core_cap()
    }

    /// Interval between two control-loop iterations.
    pub fn sampling_interval(&self) -> Duration {
        self.sampling_interval
    }

    /// Sets the sampling interval in milliseconds; must exceed 50.
    pub fn set_sampling_rate_ms(&mut self, value: i64) -> Result<(), ValidationError> {
        match u64::try_from(value) {
            Ok(ms) if ms > MIN_SAMPLING_RATE_MS => {
                self.sampling_interval = Duration::from_millis(ms);
                Ok(())
            }
            _ => Err(ValidationError::SamplingRate(value)),
        }
    }

    /// The smoothed load above which the next core is brought online.
    pub fn load_threshold(&self) -> Percent {
        self.load_threshold
    }

    /// Sets the load threshold; must be in `11..=100`.
    pub fn set_load_threshold(&mut self, value: i64) -> Result<(), ValidationError> {
        match u32::try_from(value).ok().and_then(Percent::new) {
            Some(pct) if pct.get() > MIN_LOAD_THRESHOLD => {
                self.load_threshold = pct;
                Ok(())
            }
            _ => Err(ValidationError::LoadThreshold(value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let policy = PolicyState::new(8);
        assert_eq!(policy.endurance(), EnduranceLevel::Normal);
        assert_eq!(policy.suspend_core_cap(), 2);
        assert_eq!(policy.resume_core_cap(), 8);
        assert_eq!(policy.core_limit(), 8);
        assert_eq!(policy.sampling_interval(), Duration::from_millis(250));
        assert_eq!(policy.load_threshold().get(), 65);
    }

    #[test]
    fn test_endurance_clamps_effective_caps() {
        let mut policy = PolicyState::new(8);
        policy.set_suspend_cpus(6).unwrap();

        assert_eq!(policy.suspend_core_cap(), 4);
        assert!(policy.set_endurance(EnduranceLevel::Conservative));
        assert_eq!(policy.resume_core_cap(), 4);
        assert_eq!(policy.suspend_core_cap(), 4);

        assert!(policy.set_endurance(EnduranceLevel::Aggressive));
        assert_eq!(policy.resume_core_cap(), 2);
        assert_eq!(policy.suspend_core_cap(), 2);
        assert_eq!(policy.core_limit(), 2);
    }

    #[test]
    fn test_loosening_restores_requested_caps() {
        let mut policy = PolicyState::new(8);
        policy.set_resume_cpus(7).unwrap();
        policy.set_endurance(EnduranceLevel::Aggressive);
        assert_eq!(policy.resume_core_cap(), 2);
        policy.set_endurance(EnduranceLevel::Normal);
        assert_eq!(policy.resume_core_cap(), 7);
        assert_eq!(policy.requested_resume_cpus(), 7);
    }

    #[test]
    fn test_same_level_twice_reports_no_change() {
        let mut policy = PolicyState::new(8);
        assert!(policy.set_endurance(EnduranceLevel::Aggressive));
        assert!(!policy.set_endurance(EnduranceLevel::Aggressive));
        assert_eq!(policy.set_endurance_raw(2), Ok(false));
    }

    #[test]
    fn test_invalid_writes_keep_prior_values() {
        let mut policy = PolicyState::new(8);
        assert!(policy.set_suspend_cpus(0).is_err());
        assert!(policy.set_suspend_cpus(9).is_err());
        assert!(policy.set_resume_cpus(-3).is_err());
        assert!(policy.set_endurance_raw(3).is_err());
        assert!(policy.set_sampling_rate_ms(50).is_err());
        assert!(policy.set_load_threshold(10).is_err());
        assert!(policy.set_load_threshold(101).is_err());

        assert_eq!(policy.requested_suspend_cpus(), 2);
        assert_eq!(policy.requested_resume_cpus(), 8);
        assert_eq!(policy.endurance(), EnduranceLevel::Normal);
        assert_eq!(policy.sampling_interval(), Duration::from_millis(250));
        assert_eq!(policy.load_threshold().get(), 65);
    }

    #[test]
    fn test_boundary_values_accepted() {
        let mut policy = PolicyState::new(8);
        policy.set_sampling_rate_ms(51).unwrap();
        policy.set_load_threshold(11).unwrap();
        policy.set_suspend_cpus(8).unwrap();
        policy.set_resume_cpus(1).unwrap();
        assert_eq!(policy.sampling_interval(), Duration::from_millis(51));
        assert_eq!(policy.load_threshold().get(), 11);
        assert_eq!(policy.resume_core_cap(), 1);
    }

    #[test]
    fn test_small_package_clamps_defaults() {
        let policy = PolicyState::new(1);
        assert_eq!(policy.suspend_core_cap(), 1);
        assert_eq!(policy.resume_core_cap(), 1);
    }
}
