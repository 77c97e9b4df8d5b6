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

//! sysfs-based implementation of the CoreHotplug trait.

use coreplug_core::{CoreHotplug, CoreId, PlatformError};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::topology::discover_core_count;

/// Default location of the per-core sysfs directories.
pub const DEFAULT_SYSFS_ROOT: &str = "/sys/devices/system/cpu";

/// Starts and stops cores through `<root>/cpuN/online`.
#[derive(Debug, Clone)]
pub struct SysfsHotplug {
    root: PathBuf,
    core_count: usize,
}

impl SysfsHotplug {
    /// Creates a backend rooted at `root`, discovering the core count.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let core_count = discover_core_count(&root);
        Self { root, core_count }
    }

    /// Creates a backend with an explicit core count.
    pub fn with_core_count(root: impl Into<PathBuf>, core_count: usize) -> Self {
        Self {
            root: root.into(),
            core_count: core_count.max(1),
        }
    }

    /// The sysfs directory this backend writes under.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn online_file(&self, core: CoreId) -> PathBuf {
        self.root.join(format!("cpu{}", core.index())).join("online")
    }

    fn check(&self, core: CoreId) -> Result<(), PlatformError> {
        if core.index() < self.core_count {
            Ok(())
        } else {
            Err(PlatformError::UnknownCore {
                core,
                core_count: self.core_count,
            })
        }
    }

    fn write_state(&self, core: CoreId, online: bool) -> Result<(), PlatformError> {
        self.check(core)?;
        let path = self.online_file(core);
        fs::write(&path, if online { "1" } else { "0" }).map_err(|e| {
            PlatformError::TransitionFailed {
                core,
                reason: format!("{}: {e}", path.display()),
            }
        })
    }
}

impl CoreHotplug for SysfsHotplug {
    fn core_count(&self) -> usize {
        self.core_count
    }

    fn is_online(&self, core: CoreId) -> bool {
        if self.check(core).is_err() {
            return false;
        }
        match fs::read_to_string(self.online_file(core)) {
            Ok(state) => state.trim() == "1",
            // Cores without an `online` file cannot be hotplugged and stay up.
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                core.is_boot() || self.root.join(format!("cpu{}", core.index())).is_dir()
            }
            Err(e) => {
                log::warn!("Cannot read online state of {core}: {e}");
                false
            }
        }
    }

    fn bring_online(&self, core: CoreId) -> Result<(), PlatformError> {
        if core.is_boot() && !self.online_file(core).exists() {
            return Ok(());
        }
        self.write_state(core, true)
    }

    fn take_offline(&self, core: CoreId) -> Result<(), PlatformError> {
        if core.is_boot() && !self.online_file(core).exists() {
            return Err(PlatformError::TransitionFailed {
                core,
                reason: "boot core cannot be taken offline".into(),
            });
        }
        self.write_state(core, false)
    }
}
