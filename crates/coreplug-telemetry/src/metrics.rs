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

//! Counters describing what the controller has done since start.
//!
//! Counters are lock-free so they can be read from the operator console
//! without contending with the control loop's state lock.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counters for controller activity.
#[derive(Debug, Default)]
pub struct HotplugMetrics {
    iterations: AtomicU64,
    skipped_iterations: AtomicU64,
    cores_onlined: AtomicU64,
    cores_offlined: AtomicU64,
    failed_transitions: AtomicU64,
    degraded_samples: AtomicU64,
    suspends: AtomicU64,
    resumes: AtomicU64,
    rejected_writes: AtomicU64,
}

/// A point-in-time copy of [`HotplugMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Load-based iterations that ran to completion.
    pub iterations: u64,
    /// Timer ticks skipped because the device was suspended.
    pub skipped_iterations: u64,
    /// Successful online transitions.
    pub cores_onlined: u64,
    /// Successful offline transitions.
    pub cores_offlined: u64,
    /// Transitions the hotplug primitive refused.
    pub failed_transitions: u64,
    /// Samples degraded to 0% because the counters were unusable.
    pub degraded_samples: u64,
    /// Suspend notifications handled.
    pub suspends: u64,
    /// Resume notifications handled.
    pub resumes: u64,
    /// Tunable writes rejected by validation.
    pub rejected_writes: u64,
}

macro_rules! counter {
    ($record:ident, $field:ident) => {
        #[doc = concat!("Increments `", stringify!($field), "`.")]
        pub fn $record(&self) {
            self.$field.fetch_add(1, Ordering::Relaxed);
        }
    };
}

impl HotplugMetrics {
    /// Creates a zeroed counter set.
    pub fn new() -> Self {
        Self::default()
    }

    counter!(record_iteration, iterations);
    counter!(record_skipped_iteration, skipped_iterations);
    counter!(record_online, cores_onlined);
    counter!(record_offline, cores_offlined);
    counter!(record_failed_transition, failed_transitions);
    counter!(record_degraded_sample, degraded_samples);
    counter!(record_suspend, suspends);
    counter!(record_resume, resumes);
    counter!(record_rejected_write, rejected_writes);

    /// Copies the current values.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            iterations: self.iterations.load(Ordering::Relaxed),
            skipped_iterations: self.skipped_iterations.load(Ordering::Relaxed),
            cores_onlined: self.cores_onlined.load(Ordering::Relaxed),
            cores_offlined: self.cores_offlined.load(Ordering::Relaxed),
            failed_transitions: self.failed_transitions.load(Ordering::Relaxed),
            degraded_samples: self.degraded_samples.load(Ordering::Relaxed),
            suspends: self.suspends.load(Ordering::Relaxed),
            resumes: self.resumes.load(Ordering::Relaxed),
            rejected_writes: self.rejected_writes.load(Ordering::Relaxed),
        }
    }
}

impl MetricsSnapshot {
    /// Total transitions attempted, successful or not.
    pub fn total_transitions(&self) -> u64 {
        self.cores_onlined + self.cores_offlined + self.failed_transitions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_at_zero() {
        let metrics = HotplugMetrics::new();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_counters_accumulate() {
        let metrics = HotplugMetrics::new();
        metrics.record_online();
        metrics.record_online();
        metrics.record_offline();
        metrics.record_failed_transition();
        metrics.record_suspend();

        let snap = metrics.snapshot();
        assert_eq!(snap.cores_onlined, 2);
        assert_eq!(snap.cores_offlined, 1);
        assert_eq!(snap.suspends, 1);
        assert_eq!(snap.total_transitions(), 4);
    }

    #[test]
    fn test_snapshot_serializes_field_names() {
        let metrics = HotplugMetrics::new();
        metrics.record_rejected_write();
        let json = serde_json::to_string(&metrics.snapshot()).unwrap();
        assert!(json.contains("\"rejected_writes\":1"));
    }
}
