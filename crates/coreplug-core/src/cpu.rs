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

//! Identifiers and measurements for individual cores.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one physical core, `0 <= id < N`.
///
/// Core 0 is the boot core. It is never taken offline by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CoreId(pub usize);

impl CoreId {
    /// The boot core.
    pub const BOOT: CoreId = CoreId(0);

    /// Returns the raw index of the core.
    pub fn index(self) -> usize {
        self.0
    }

    /// Returns `true` for core 0.
    pub fn is_boot(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for CoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cpu{}", self.0)
    }
}

/// A utilisation percentage, always within `0..=100`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Percent(u8);

impl Percent {
    /// 0%.
    pub const ZERO: Percent = Percent(0);
    /// 100%.
    pub const FULL: Percent = Percent(100);

    /// Creates a percentage, saturating anything above 100.
    pub fn saturating(value: u32) -> Self {
        Self(value.min(100) as u8)
    }

    /// Creates a percentage, returning `None` for values above 100.
    pub fn new(value: u32) -> Option<Self> {
        (value <= 100).then_some(Self(value as u8))
    }

    /// Returns the raw value.
    pub fn get(self) -> u32 {
        self.0 as u32
    }

    /// Integer mean of two percentages, rounding down.
    pub fn average(self, other: Percent) -> Percent {
        Percent(((self.0 as u16 + other.0 as u16) / 2) as u8)
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Cumulative time accounting for one core, in backend-defined ticks.
///
/// Both counters only ever grow while the core stays online. `idle` must
/// never exceed `wall` for a consistent reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTimes {
    /// Cumulative time the core spent idle.
    pub idle: u64,
    /// Cumulative wall-clock time accounted to the core.
    pub wall: u64,
}

impl CpuTimes {
    /// Creates a new reading.
    pub fn new(idle: u64, wall: u64) -> Self {
        Self { idle, wall }
    }
}
