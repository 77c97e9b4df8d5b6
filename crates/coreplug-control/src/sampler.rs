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

//! Per-core utilisation sampling from cumulative idle/wall counters.

use crate::controller::CoreState;
use coreplug_core::{CoreId, CpuTimeSource, Percent};
use std::sync::Arc;

/// One utilisation reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    /// Busy percentage since the previous reading.
    pub load: Percent,
    /// `false` when the counters were unusable and `load` was degraded to 0.
    ///
    /// An untrusted reading must never cause a core to be taken offline.
    pub trusted: bool,
}

impl Sample {
    fn measured(load: Percent) -> Self {
        Self {
            load,
            trusted: true,
        }
    }

    fn degraded() -> Self {
        Self {
            load: Percent::ZERO,
            trusted: false,
        }
    }
}

/// Reasons a core cannot be sampled at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SampleError {
    /// The core is offline; callers treat its load as 0.
    #[error("{0} is offline")]
    CoreOffline(CoreId),
}

/// Converts cumulative idle/wall counters into a load percentage.
pub struct LoadSampler {
    times: Arc<dyn CpuTimeSource>,
}

impl LoadSampler {
    /// Creates a sampler reading from `times`.
    pub fn new(times: Arc<dyn CpuTimeSource>) -> Self {
        Self { times }
    }

    /// Samples `core`, updating the baseline stored in `state`.
    ///
    /// A clock anomaly (no baseline yet, counters going backwards, zero wall
    /// delta, idle delta larger than wall delta, or a failed read) yields an
    /// untrusted 0% reading instead of an error.
    pub fn sample(&self, core: CoreId, state: &mut CoreState) -> Result<Sample, SampleError> {
        if !state.is_online {
            return Err(SampleError::CoreOffline(core));
        }

        let now = match self.times.read_idle_and_wall(core) {
            Ok(times) => times,
            Err(e) => {
                log::debug!("{core}: time read failed, degrading sample: {e}");
                state.has_baseline = false;
                return Ok(Sample::degraded());
            }
        };

        let had_baseline = state.has_baseline;
        let previous = state.previous_times;
        state.previous_times = now;
        state.has_baseline = true;

        if !had_baseline {
            log::trace!("{core}: first reading establishes the baseline");
            return Ok(Sample::degraded());
        }

        let (Some(idle_delta), Some(wall_delta)) = (
            now.idle.checked_sub(previous.idle),
            now.wall.checked_sub(previous.wall),
        ) else {
            log::debug!("{core}: counters went backwards, degrading sample");
            return Ok(Sample::degraded());
        };

        if wall_delta == 0 || idle_delta > wall_delta {
            log::debug!("{core}: inconsistent deltas idle={idle_delta} wall={wall_delta}");
            return Ok(Sample::degraded());
        }

        let busy = (wall_delta - idle_delta) as u128;
        let load = (100 * busy / wall_delta as u128) as u32;
        Ok(Sample::measured(Percent::saturating(load)))
    }
}
