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

//! Per-core time accounting from `/proc/stat`.

use coreplug_core::{CoreId, CpuTimeSource, CpuTimes, PlatformError};
use std::fs;
use std::path::PathBuf;

/// Default location of the kernel's CPU statistics.
pub const DEFAULT_PROC_STAT: &str = "/proc/stat";

/// Number of leading fields summed into wall time:
/// user, nice, system, idle, iowait, irq, softirq, steal.
const WALL_FIELDS: usize = 8;

/// Reads cumulative idle and wall time from a `/proc/stat`-format file.
///
/// Idle is `idle + iowait`; wall is the sum of the first eight fields, in
/// clock ticks. Offline cores have no `cpuN` line and read as
/// [`PlatformError::TimesUnavailable`].
#[derive(Debug, Clone)]
pub struct ProcStatTimes {
    path: PathBuf,
}

impl ProcStatTimes {
    /// Creates a reader for the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn parse_line(&self, core: CoreId, fields: &str) -> Result<CpuTimes, PlatformError> {
        let values = fields
            .split_whitespace()
            .take(WALL_FIELDS)
            .map(str::parse::<u64>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| self.parse_error(core, e.to_string()))?;
        if values.len() < 5 {
            return Err(self.parse_error(core, format!("only {} fields", values.len())));
        }
        let idle = values[3].checked_add(values[4]);
        let wall = values.iter().try_fold(0u64, |acc, &v| acc.checked_add(v));
        match (idle, wall) {
            (Some(idle), Some(wall)) => Ok(CpuTimes::new(idle, wall)),
            _ => Err(self.parse_error(core, "counter overflow".into())),
        }
    }

    fn parse_error(&self, core: CoreId, detail: String) -> PlatformError {
        PlatformError::Parse {
            path: self.path.display().to_string(),
            detail: format!("{core}: {detail}"),
        }
    }
}

impl CpuTimeSource for ProcStatTimes {
    fn read_idle_and_wall(&self, core: CoreId) -> Result<CpuTimes, PlatformError> {
        let stat = fs::read_to_string(&self.path).map_err(|source| PlatformError::Io {
            path: self.path.display().to_string(),
            source,
        })?;
        let label = format!("cpu{}", core.index());
        stat.lines()
            .find_map(|line| {
                let (name, rest) = line.split_once(char::is_whitespace)?;
                (name == label).then_some(rest)
            })
            .ok_or(PlatformError::TimesUnavailable { core })
            .and_then(|fields| self.parse_line(core, fields))
    }
}
