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

//! # Coreplug Control
//!
//! The adaptive core-count control loop.
//!
//! Data flows one way on every timer tick: the [`LoadSampler`] measures each
//! online core, the [`CoreController`] smooths the readings and applies the
//! ladder rule against the [`PolicyState`], and the [`HotplugService`] re-arms
//! the timer. Suspend/resume notifications go through the
//! [`SuspendCoordinator`], which forces a known core configuration.
//!
//! All mutable state sits behind a single lock inside the [`Governor`], so a
//! timer tick, a power transition and a tunable write never interleave.

pub mod config;
pub mod controller;
pub mod governor;
pub mod policy;
pub mod sampler;
pub mod service;
pub mod suspend;
pub mod tunables;

pub use config::{ConfigError, GovernorConfig};
pub use controller::{CoreController, CoreState, TransitionReport};
pub use governor::{CoreStatus, Governor, GovernorStatus, TickOutcome};
pub use policy::{PolicyState, ValidationError};
pub use sampler::{LoadSampler, Sample, SampleError};
pub use service::{HotplugService, ServiceError};
pub use suspend::{PowerPhase, SuspendCoordinator};
pub use tunables::{Tunable, TunableError};
