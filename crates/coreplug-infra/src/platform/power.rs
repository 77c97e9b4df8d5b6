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

//! A power-event source driven by explicit calls.

use coreplug_core::{PlatformError, PowerEvent, PowerEventHandler, PowerEventSource};
use std::sync::{Mutex, PoisonError};

/// Delivers suspend/resume notifications when [`suspend`](Self::suspend) or
/// [`resume`](Self::resume) is called, on the caller's thread.
///
/// Used by the operator console and by tests in place of a real display or
/// battery notification channel.
#[derive(Default)]
pub struct ManualPowerEvents {
    handlers: Mutex<Vec<PowerEventHandler>>,
}

impl ManualPowerEvents {
    /// Creates a source with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires [`PowerEvent::Suspend`] to every subscriber.
    pub fn suspend(&self) {
        self.fire(PowerEvent::Suspend);
    }

    /// Fires [`PowerEvent::Resume`] to every subscriber.
    pub fn resume(&self) {
        self.fire(PowerEvent::Resume);
    }

    /// Fires `event` to every subscriber, in subscription order.
    pub fn fire(&self, event: PowerEvent) {
        let handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
        log::debug!("Firing {event:?} to {} subscribers", handlers.len());
        for handler in handlers.iter() {
            handler(event);
        }
    }

    /// Number of registered handlers.
    pub fn subscriber_count(&self) -> usize {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl PowerEventSource for ManualPowerEvents {
    fn subscribe(&self, handler: PowerEventHandler) -> Result<(), PlatformError> {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handler);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_handlers_receive_events_in_order() {
        let source = ManualPowerEvents::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        source
            .subscribe(Box::new(move |event| sink.lock().unwrap().push(event)))
            .unwrap();

        source.suspend();
        source.resume();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![PowerEvent::Suspend, PowerEvent::Resume]
        );
        assert_eq!(source.subscriber_count(), 1);
    }

    #[test]
    fn test_firing_without_subscribers_is_harmless() {
        ManualPowerEvents::new().suspend();
    }
}
