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

//! Errors reported by the host collaborators.

use crate::cpu::CoreId;

/// An error raised by a platform collaborator.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    /// The hotplug primitive refused or failed to change the core's state.
    #[error("{core}: transition failed: {reason}")]
    TransitionFailed {
        /// The core that could not be changed.
        core: CoreId,
        /// Backend-specific detail.
        reason: String,
    },

    /// The core index is outside the platform's core range.
    #[error("{core} is out of range (platform has {core_count} cores)")]
    UnknownCore {
        /// The offending core.
        core: CoreId,
        /// The platform core count.
        core_count: usize,
    },

    /// No time accounting is available for the core (typically because it is offline).
    #[error("{core}: no time accounting available")]
    TimesUnavailable {
        /// The core that could not be read.
        core: CoreId,
    },

    /// Failed to read or write a backend file.
    #[error("failed to access {path}: {source}")]
    Io {
        /// The file being accessed.
        path: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A backend file did not have the expected format.
    #[error("failed to parse {path}: {detail}")]
    Parse {
        /// The file being parsed.
        path: String,
        /// What was wrong with it.
        detail: String,
    },

    /// Subscribing to power events failed.
    #[error("power event subscription failed: {0}")]
    Subscription(String),
}
