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

//! Endurance levels: coarse power/performance policies that bound how many
//! cores may be online.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The endurance level in force.
///
/// The numeric encoding (`0`, `1`, `2`) is the one exposed on the tunable
/// surface.
///
/// | Level | Max online (active) | Max kept online (suspended) |
/// |---|---|---|
/// | Normal | N | 4 |
/// | Conservative | 4 | 4 |
/// | Aggressive | 2 | 2 |
///
/// Every bound is additionally clamped into `[1, N]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnduranceLevel {
    /// Full performance: every core may come online.
    #[default]
    Normal,
    /// At most four cores online.
    Conservative,
    /// At most two cores online.
    Aggressive,
}

impl EnduranceLevel {
    /// All levels, in encoding order.
    pub const ALL: [EnduranceLevel; 3] = [
        EnduranceLevel::Normal,
        EnduranceLevel::Conservative,
        EnduranceLevel::Aggressive,
    ];

    /// Decodes the tunable-surface encoding.
    pub fn from_raw(raw: i64) -> Option<Self> {
        match raw {
            0 => Some(EnduranceLevel::Normal),
            1 => Some(EnduranceLevel::Conservative),
            2 => Some(EnduranceLevel::Aggressive),
            _ => None,
        }
    }

    /// Returns the tunable-surface encoding.
    pub fn as_raw(self) -> u8 {
        match self {
            EnduranceLevel::Normal => 0,
            EnduranceLevel::Conservative => 1,
            EnduranceLevel::Aggressive => 2,
        }
    }

    /// Upper bound on online cores while the device is active.
    pub fn active_bound(self, core_count: usize) -> usize {
        let bound = match self {
            EnduranceLevel::Normal => core_count,
            EnduranceLevel::Conservative => 4,
            EnduranceLevel::Aggressive => 2,
        };
        bound.clamp(1, core_count.max(1))
    }

    /// Upper bound on the cores kept online across a suspend.
    pub fn suspended_bound(self, core_count: usize) -> usize {
        let bound = match self {
            EnduranceLevel::Normal | EnduranceLevel::Conservative => 4,
            EnduranceLevel::Aggressive => 2,
        };
        bound.clamp(1, core_count.max(1))
    }
}

impl fmt::Display for EnduranceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
