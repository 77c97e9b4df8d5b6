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

//! Background service driving the governor.

use crate::governor::{Governor, TickOutcome};
use coreplug_core::{PlatformError, PowerEventSource};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// Failure to start the service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The power-event source refused the subscription.
    #[error("failed to subscribe to power events: {0}")]
    Subscription(#[source] PlatformError),
    /// The timer thread could not be spawned.
    #[error("failed to spawn the timer thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// The timer service.
///
/// Owns a thread that sleeps for the governor's sampling interval, runs one
/// iteration, and re-reads the interval before sleeping again, so a
/// sampling-rate write applies from the next re-arm. Power events are routed
/// straight into the governor on whatever thread delivers them.
pub struct HotplugService {
    governor: Arc<Governor>,
    running: Arc<AtomicBool>,
    stop_tx: Option<Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl HotplugService {
    /// Creates a stopped service around `governor`.
    pub fn new(governor: Arc<Governor>) -> Self {
        Self {
            governor,
            running: Arc::new(AtomicBool::new(false)),
            stop_tx: None,
            handle: None,
        }
    }

    /// The governor this service drives.
    pub fn governor(&self) -> &Arc<Governor> {
        &self.governor
    }

    /// Returns `true` while the timer thread runs.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Subscribes to power events and starts the timer thread.
    ///
    /// Calling `start` on a running service does nothing.
    pub fn start(&mut self, power: &dyn PowerEventSource) -> Result<(), ServiceError> {
        if self.is_running() {
            return Ok(());
        }

        let governor = Arc::clone(&self.governor);
        power
            .subscribe(Box::new(move |event| {
                log::debug!("Power event: {event:?}");
                governor.handle_power_event(event);
            }))
            .map_err(ServiceError::Subscription)?;

        let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
        let governor = Arc::clone(&self.governor);
        let running = Arc::clone(&self.running);
        running.store(true, Ordering::SeqCst);

        let spawned = thread::Builder::new()
            .name("coreplug-timer".into())
            .spawn(move || timer_loop(&governor, &stop_rx, &running));

        match spawned {
            Ok(handle) => {
                self.handle = Some(handle);
                self.stop_tx = Some(stop_tx);
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                Err(ServiceError::Spawn(e))
            }
        }
    }

    /// Stops the timer thread and waits for it. An iteration in progress
    /// completes first.
    pub fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Timer thread panicked");
            }
        }
        self.running.store(false, Ordering::SeqCst);
    }
}

impl Drop for HotplugService {
    fn drop(&mut self) {
        self.stop();
    }
}

fn timer_loop(governor: &Governor, stop_rx: &Receiver<()>, running: &AtomicBool) {
    log::info!("Hotplug timer started");
    loop {
        match stop_rx.recv_timeout(governor.sampling_interval()) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
        if let TickOutcome::Ran(report) = governor.tick() {
            if !report.is_empty() {
                log::debug!(
                    "Iteration: +{:?} -{:?} failed {:?}",
                    report.onlined,
                    report.offlined,
                    report.failed
                );
            }
        }
    }
    running.store(false, Ordering::SeqCst);
    log::info!("Hotplug timer stopped");
}
