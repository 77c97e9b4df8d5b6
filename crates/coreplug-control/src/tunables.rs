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

//! The key/value surface operators use to read and write policy knobs.
//!
//! Values travel as short strings. A write is parsed, validated and applied
//! under the governor's lock; a rejected write leaves every value unchanged.

use crate::governor::Governor;
use crate::policy::ValidationError;
use std::fmt;
use std::str::FromStr;

/// A key on the tunable surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tunable {
    /// Read-only controller version.
    Version,
    /// Cores kept online across a suspend, `1..=N`.
    SuspendCpus,
    /// Cores allowed online while active, `1..=N`.
    ResumeCpus,
    /// Endurance level, `0`, `1` or `2`.
    EnduranceLevel,
    /// Sampling interval in milliseconds, `> 50`.
    SamplingRate,
    /// Smoothed-load threshold, `11..=100`.
    LoadThreshold,
}

impl Tunable {
    /// Every key, in display order.
    pub const ALL: [Tunable; 6] = [
        Tunable::Version,
        Tunable::SuspendCpus,
        Tunable::ResumeCpus,
        Tunable::EnduranceLevel,
        Tunable::SamplingRate,
        Tunable::LoadThreshold,
    ];

    /// The key's name on the surface.
    pub fn name(self) -> &'static str {
        match self {
            Tunable::Version => "version",
            Tunable::SuspendCpus => "suspend_cpus",
            Tunable::ResumeCpus => "resume_cpus",
            Tunable::EnduranceLevel => "endurance_level",
            Tunable::SamplingRate => "sampling_rate",
            Tunable::LoadThreshold => "load_threshold",
        }
    }

    /// Returns `false` for read-only keys.
    pub fn is_writable(self) -> bool {
        !matches!(self, Tunable::Version)
    }
}

impl fmt::Display for Tunable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Tunable {
    type Err = TunableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim();
        Tunable::ALL
            .into_iter()
            .find(|t| t.name() == key)
            .ok_or_else(|| TunableError::UnknownKey(key.to_string()))
    }
}

/// Why a tunable read or write was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TunableError {
    /// No such key.
    #[error("unknown tunable '{0}'")]
    UnknownKey(String),
    /// The key cannot be written.
    #[error("tunable '{0}' is read-only")]
    ReadOnly(Tunable),
    /// The value is not a decimal integer.
    #[error("tunable '{key}': '{input}' is not an integer")]
    NotANumber {
        /// The key being written.
        key: Tunable,
        /// The rejected input.
        input: String,
    },
    /// The value is out of range.
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// The string reported by the `version` key.
pub fn version_string() -> String {
    format!("coreplug {}", env!("CARGO_PKG_VERSION"))
}

impl Governor {
    /// Reads a tunable, formatted as a short string.
    pub fn read_tunable(&self, key: &str) -> Result<String, TunableError> {
        let key: Tunable = key.parse()?;
        let state = self.lock();
        let policy = &state.policy;
        Ok(match key {
            Tunable::Version => version_string(),
            Tunable::SuspendCpus => policy.requested_suspend_cpus().to_string(),
            Tunable::ResumeCpus => policy.requested_resume_cpus().to_string(),
            Tunable::EnduranceLevel => policy.endurance().as_raw().to_string(),
            Tunable::SamplingRate => policy.sampling_interval().as_millis().to_string(),
            Tunable::LoadThreshold => policy.load_threshold().get().to_string(),
        })
    }

    /// Writes a tunable.
    ///
    /// Endurance-level and resume-cap writes, and suspend-cap writes while
    /// suspended, apply their forced passes before the lock is released. Rejected writes are logged and counted.
    pub fn write_tunable(&self, key: &str, value: &str) -> Result<(), TunableError> {
        let result = self.try_write_tunable(key, value);
        if let Err(e) = &result {
            log::warn!("Rejected tunable write {key}={value}: {e}");
            self.metrics().record_rejected_write();
        }
        result
    }

    fn try_write_tunable(&self, key: &str, value: &str) -> Result<(), TunableError> {
        let key: Tunable = key.parse()?;
        if !key.is_writable() {
            return Err(TunableError::ReadOnly(key));
        }
        let raw: i64 = value.trim().parse().map_err(|_| TunableError::NotANumber {
            key,
            input: value.to_string(),
        })?;

        let mut state = self.lock();
        match key {
            Tunable::Version => return Err(TunableError::ReadOnly(key)),
            Tunable::SuspendCpus => {
                Governor::apply_suspend_cpus(&mut state, raw)?;
            }
            Tunable::ResumeCpus => {
                Governor::apply_resume_cpus(&mut state, raw)?;
            }
            Tunable::EnduranceLevel => {
                let level = coreplug_core::EnduranceLevel::from_raw(raw)
                    .ok_or(ValidationError::EnduranceLevel(raw))?;
                Governor::apply_endurance(&mut state, level);
            }
            Tunable::SamplingRate => state.policy.set_sampling_rate_ms(raw)?,
            Tunable::LoadThreshold => state.policy.set_load_threshold(raw)?,
        }
        log::info!("Tunable {key} set to {raw}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PolicyState;
    use coreplug_infra::SimulatedCpus;
    use coreplug_telemetry::HotplugMetrics;
    use std::sync::Arc;

    fn governor() -> Governor {
        let sim = Arc::new(SimulatedCpus::new(8));
        Governor::new(
            PolicyState::new(8),
            sim.clone(),
            sim,
            Arc::new(HotplugMetrics::new()),
        )
    }

    #[test]
    fn test_key_names_round_trip() {
        for key in Tunable::ALL {
            assert_eq!(key.name().parse::<Tunable>(), Ok(key));
        }
        assert!(matches!(
            "bogus".parse::<Tunable>(),
            Err(TunableError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_default_reads() {
        let governor = governor();
        assert_eq!(governor.read_tunable("version").unwrap(), version_string());
        assert_eq!(governor.read_tunable("suspend_cpus").unwrap(), "2");
        assert_eq!(governor.read_tunable("resume_cpus").unwrap(), "8");
        assert_eq!(governor.read_tunable("endurance_level").unwrap(), "0");
        assert_eq!(governor.read_tunable("sampling_rate").unwrap(), "250");
        assert_eq!(governor.read_tunable("load_threshold").unwrap(), "65");
    }

    #[test]
    fn test_write_then_read_back() {
        let governor = governor();
        let writes = [
            ("suspend_cpus", "3"),
            ("resume_cpus", "6"),
            ("endurance_level", "1"),
            ("sampling_rate", "100"),
            ("load_threshold", "80"),
        ];
        for (key, value) in writes {
            governor.write_tunable(key, value).unwrap();
            assert_eq!(governor.read_tunable(key).unwrap(), value, "key {key}");
        }
    }

    #[test]
    fn test_out_of_range_write_keeps_prior_value() {
        let governor = governor();
        let writes = [
            ("suspend_cpus", "0"),
            ("suspend_cpus", "9"),
            ("endurance_level", "3"),
            ("sampling_rate", "50"),
            ("load_threshold", "10"),
            ("resume_cpus", "-1"),
        ];
        for (key, value) in writes {
            let before = governor.read_tunable(key).unwrap();
            assert!(governor.write_tunable(key, value).is_err(), "key {key}");
            assert_eq!(governor.read_tunable(key).unwrap(), before, "key {key}");
        }
        assert_eq!(governor.metrics_snapshot().rejected_writes, 6);
    }

    #[test]
    fn test_garbage_and_read_only_writes_rejected() {
        let governor = governor();
        assert!(matches!(
            governor.write_tunable("load_threshold", "lots"),
            Err(TunableError::NotANumber { .. })
        ));
        assert_eq!(
            governor.write_tunable("version", "2"),
            Err(TunableError::ReadOnly(Tunable::Version))
        );
        assert!(matches!(
            governor.write_tunable("turbo", "1"),
            Err(TunableError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_whitespace_is_tolerated() {
        let governor = governor();
        governor.write_tunable(" sampling_rate ", " 300\n").unwrap();
        assert_eq!(governor.read_tunable("sampling_rate").unwrap(), "300");
    }

    #[test]
    fn test_endurance_write_applies_bounds() {
        let governor = governor();
        governor.write_tunable("endurance_level", "2").unwrap();
        assert_eq!(governor.online_cores().len(), 2);
    }
}
