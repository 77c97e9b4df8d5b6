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

use anyhow::{Context, Result};
use coreplug_control::GovernorConfig;
use coreplug_infra::platform::procstat::DEFAULT_PROC_STAT;
use coreplug_infra::platform::sysfs::DEFAULT_SYSFS_ROOT;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Cores in the simulated package when nothing else says otherwise.
pub const DEFAULT_SIMULATED_CORES: usize = 8;

/// Represents the structure of the daemon's TOML configuration file.
#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
    /// Initial policy.
    pub governor: GovernorConfig,
    /// Host backend selection.
    pub platform: PlatformConfig,
}

/// Which backend drives the cores.
#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Linux sysfs hotplug and `/proc/stat` accounting.
    #[default]
    Sysfs,
    /// An in-memory package.
    Simulated,
}

/// The `[platform]` table.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PlatformConfig {
    pub backend: Backend,
    /// Directory holding `cpuN/online` and `possible`.
    pub sysfs_root: PathBuf,
    pub proc_stat_path: PathBuf,
    /// Core count for the simulated backend.
    pub simulated_cores: usize,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Sysfs,
            sysfs_root: PathBuf::from(DEFAULT_SYSFS_ROOT),
            proc_stat_path: PathBuf::from(DEFAULT_PROC_STAT),
            simulated_cores: DEFAULT_SIMULATED_CORES,
        }
    }
}

impl DaemonConfig {
    /// Loads the configuration from `path`, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("Failed to parse TOML from '{}'", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coreplug_core::EnduranceLevel;
    use std::io::Write;

    #[test]
    fn test_no_path_gives_defaults() {
        let config = DaemonConfig::load(None).unwrap();
        assert_eq!(config, DaemonConfig::default());
        assert_eq!(config.platform.backend, Backend::Sysfs);
    }

    #[test]
    fn test_loads_both_tables() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[governor]
endurance_level = "aggressive"
sampling_rate_ms = 500

[platform]
backend = "simulated"
simulated_cores = 4
"#
        )
        .unwrap();

        let config = DaemonConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.governor.endurance_level, EnduranceLevel::Aggressive);
        assert_eq!(config.governor.sampling_rate_ms, 500);
        assert_eq!(config.platform.backend, Backend::Simulated);
        assert_eq!(config.platform.simulated_cores, 4);
        assert_eq!(config.platform.sysfs_root, PathBuf::from(DEFAULT_SYSFS_ROOT));
    }

    #[test]
    fn test_errors_name_the_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[governor]\nturbo = 1\n").unwrap();
        let err = DaemonConfig::load(Some(file.path())).unwrap_err();
        assert!(format!("{err:#}").contains(&file.path().display().to_string()));

        assert!(DaemonConfig::load(Some(Path::new("/nonexistent/coreplug.toml"))).is_err());
    }
}
