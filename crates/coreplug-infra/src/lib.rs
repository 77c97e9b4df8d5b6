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

//! # Coreplug Infra
//!
//! Concrete implementations of the collaborator traits defined in
//! `coreplug-core`.
//!
//! - [`SysfsHotplug`] and [`ProcStatTimes`] drive a Linux host.
//! - [`SimulatedCpus`] models a package in memory for tests and dry runs.
//! - [`ManualPowerEvents`] fires suspend/resume notifications on demand.

#![warn(missing_docs)]

pub mod platform;
pub mod simulated;

pub use platform::power::ManualPowerEvents;
pub use platform::procstat::ProcStatTimes;
pub use platform::sysfs::SysfsHotplug;
pub use platform::topology::{discover_core_count, parse_cpu_list, MAX_CPU_INDEX};
pub use simulated::{SimulatedCpus, SimulatedTransition};
