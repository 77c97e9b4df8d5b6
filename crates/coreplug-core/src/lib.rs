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

//! # Coreplug Core
//!
//! Foundational crate containing the core types and the contracts the
//! controller requires from its host: bringing cores up and down, reading
//! per-core time accounting, and receiving suspend/resume notifications.

#![warn(missing_docs)]

pub mod control;
pub mod cpu;
pub mod error;
pub mod platform;

pub use control::endurance::EnduranceLevel;
pub use cpu::{CoreId, CpuTimes, Percent};
pub use error::PlatformError;
pub use platform::{CoreHotplug, CpuTimeSource, PowerEvent, PowerEventHandler, PowerEventSource};
