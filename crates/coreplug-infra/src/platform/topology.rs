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

//! Core discovery.

use std::fs;
use std::path::Path;
use sysinfo::System;

/// Largest CPU index accepted in a CPU list (the kernel's `NR_CPUS` ceiling).
pub const MAX_CPU_INDEX: usize = 8191;

/// Parses a kernel CPU list such as `0-7` or `0,2-3,5`.
///
/// Returns `None` on malformed input, an empty list, or an index above
/// [`MAX_CPU_INDEX`].
pub fn parse_cpu_list(list: &str) -> Option<Vec<usize>> {
    let mut cpus = Vec::new();
    for part in list.trim().split(',') {
        let part = part.trim();
        match part.split_once('-') {
            Some((lo, hi)) => {
                let lo: usize = lo.trim().parse().ok()?;
                let hi: usize = hi.trim().parse().ok()?;
                if hi < lo || hi > MAX_CPU_INDEX {
                    return None;
                }
                cpus.extend(lo..=hi);
            }
            None => {
                let cpu: usize = part.parse().ok()?;
                if cpu > MAX_CPU_INDEX {
                    return None;
                }
                cpus.push(cpu);
            }
        }
    }
    cpus.sort_unstable();
    cpus.dedup();
    (!cpus.is_empty()).then_some(cpus)
}

/// Determines how many cores the package has.
///
/// Tries `<sysfs_root>/possible`, then the CPU list reported by `sysinfo`,
/// then the standard library's parallelism hint. Never returns 0.
pub fn discover_core_count(sysfs_root: &Path) -> usize {
    let possible = sysfs_root.join("possible");
    match fs::read_to_string(&possible) {
        Ok(list) => match parse_cpu_list(&list) {
            Some(cpus) => {
                let count = cpus.last().map_or(1, |&max| max + 1);
                log::debug!("{} lists {count} cores", possible.display());
                return count;
            }
            None => log::warn!("Malformed CPU list in {}: {:?}", possible.display(), list),
        },
        Err(e) => log::debug!("Cannot read {}: {e}", possible.display()),
    }

    let mut system = System::new();
    system.refresh_cpu_all();
    let count = system.cpus().len();
    if count > 0 {
        log::debug!("sysinfo reports {count} cores");
        return count;
    }

    std::thread::available_parallelism().map_or(1, |n| n.get())
}
