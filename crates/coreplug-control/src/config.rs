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

//! Startup configuration for the governor.

use crate::policy::{
    PolicyState, ValidationError, DEFAULT_LOAD_THRESHOLD, DEFAULT_SAMPLING_RATE_MS,
};
use coreplug_core::EnduranceLevel;
use serde::Deserialize;

/// Initial policy values, typically read from the `[governor]` table of the
/// daemon's TOML file. Missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GovernorConfig {
    /// Starting endurance level.
    pub endurance_level: EnduranceLevel,
    /// Cores kept online across a suspend. `None` keeps the default of two,
    /// or one on a single-core package.
    pub suspend_cpus: Option<i64>,
    /// Cores allowed online while active. `None` means every core.
    pub resume_cpus: Option<i64>,
    /// Interval between iterations, in milliseconds.
    pub sampling_rate_ms: i64,
    /// Smoothed-load threshold for bringing the next core online.
    pub load_threshold: i64,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            endurance_level: EnduranceLevel::Normal,
            suspend_cpus: None,
            resume_cpus: None,
            sampling_rate_ms: DEFAULT_SAMPLING_RATE_MS as i64,
            load_threshold: DEFAULT_LOAD_THRESHOLD as i64,
        }
    }
}

/// A configuration value that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A key holds an out-of-range value.
    #[error("invalid value for '{key}': {source}")]
    Invalid {
        /// The offending key.
        key: &'static str,
        /// What was wrong with it.
        source: ValidationError,
    },
}

impl GovernorConfig {
    /// Validates every value against a package of `core_count` cores and
    /// builds the policy.
    pub fn to_policy(&self, core_count: usize) -> Result<PolicyState, ConfigError> {
        let mut policy = PolicyState::new(core_count);
        policy.set_endurance(self.endurance_level);
        if let Some(suspend_cpus) = self.suspend_cpus {
            policy
                .set_suspend_cpus(suspend_cpus)
                .map_err(invalid("suspend_cpus"))?;
        }
        if let Some(resume_cpus) = self.resume_cpus {
            policy
                .set_resume_cpus(resume_cpus)
                .map_err(invalid("resume_cpus"))?;
        }
        policy
            .set_sampling_rate_ms(self.sampling_rate_ms)
            .map_err(invalid("sampling_rate_ms"))?;
        policy
            .set_load_threshold(self.load_threshold)
            .map_err(invalid("load_threshold"))?;
        Ok(policy)
    }
}

fn invalid(key: &'static str) -> impl FnOnce(ValidationError) -> ConfigError {
    move |source| ConfigError::Invalid { key, source }
}
