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

//! Provides abstractions over the host's processor-management facilities.
//!
//! The controller never touches hardware directly. Everything it needs from
//! the host goes through the traits in this module; concrete implementations
//! live in the `coreplug-infra` crate.

use crate::cpu::{CoreId, CpuTimes};
use crate::error::PlatformError;

/// A device-wide power transition (e.g. screen off / screen on).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PowerEvent {
    /// The device is entering its low-power state.
    Suspend,
    /// The device is leaving its low-power state.
    Resume,
}

/// Callback invoked by a [`PowerEventSource`] for every notification.
pub type PowerEventHandler = Box<dyn Fn(PowerEvent) + Send + Sync + 'static>;

/// Starts and stops physical cores.
///
/// Implementations must complete each request within a bounded time or
/// report failure; the controller never waits on hardware acknowledgment.
pub trait CoreHotplug: Send + Sync {
    /// Returns the fixed number of cores on the platform.
    fn core_count(&self) -> usize;

    /// Returns `true` if the core is currently online.
    fn is_online(&self, core: CoreId) -> bool;

    /// Brings the core online.
    fn bring_online(&self, core: CoreId) -> Result<(), PlatformError>;

    /// Takes the core offline.
    fn take_offline(&self, core: CoreId) -> Result<(), PlatformError>;
}

/// Reads per-core cumulative idle and wall-clock time.
pub trait CpuTimeSource: Send + Sync {
    /// Returns the core's cumulative idle and wall time.
    fn read_idle_and_wall(&self, core: CoreId) -> Result<CpuTimes, PlatformError>;
}

/// Delivers suspend/resume notifications.
pub trait PowerEventSource: Send + Sync {
    /// Registers the handler. It may be called from any thread.
    fn subscribe(&self, handler: PowerEventHandler) -> Result<(), PlatformError>;
}
