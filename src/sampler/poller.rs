use crate::bus::event_bus::panic_message;
use crate::bus::EventBus;
use crate::config::Config;
use crate::error::SamplerError;
use crate::events::{Units, WeatherEvent};
use crate::provider::WeatherProvider;
use crate::sampler::EventDeriver;
use log::{debug, error, info, warn};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Result of a single poll cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The fetch succeeded and these topics were published, in order
    Published { topics: Vec<&'static str> },
    /// The fetch failed and nothing was published
    Skipped,
}

/// One fetch-derive-publish step, independent of any thread
pub struct Sampler {
    provider: Arc<dyn WeatherProvider>,
    bus: Arc<EventBus<WeatherEvent>>,
    location: String,
    units: Units,
    deriver: EventDeriver,
}

impl Sampler {
    pub fn new(
        provider: Arc<dyn WeatherProvider>,
        bus: Arc<EventBus<WeatherEvent>>,
        config: &Config,
    ) -> Self {
        Self {
            provider,
            bus,
            location: config.location.clone(),
            units: config.units,
            deriver: EventDeriver::new(config.thresholds),
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Fetch one snapshot and publish everything derived from it
    ///
    /// A failed fetch is logged and publishes nothing; the recorded previous
    /// condition is left untouched so the next successful cycle compares against
    /// the last real observation.
    pub fn run_cycle(&mut self) -> CycleOutcome {
        let snapshot = match self.provider.fetch_snapshot(&self.location, self.units) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(
                    "Skipping cycle, failed to fetch weather for {}: {}",
                    self.location, e
                );
                return CycleOutcome::Skipped;
            }
        };

        debug!(
            "Fetched weather for {}: {:.1} {}, {}",
            self.location,
            snapshot.temperature,
            self.units.temperature_label(),
            snapshot.condition
        );

        let events = self.deriver.derive(&self.location, &snapshot);
        let mut topics = Vec::with_capacity(events.len());
        for (topic, event) in &events {
            let report = self.bus.publish(topic, event);
            if report.failed > 0 {
                warn!(
                    "{} of {} subscribers failed for {}",
                    report.failed,
                    report.invoked(),
                    topic
                );
            }
            topics.push(*topic);
        }

        CycleOutcome::Published { topics }
    }
}

/// Runs the sampler on a background thread at a fixed interval
///
/// The first cycle runs immediately on start. Between cycles the thread waits on a
/// shutdown channel, so `stop` interrupts the wait instead of sleeping it out; a
/// cycle already in progress is always completed.
pub struct Poller {
    sampler: Arc<Mutex<Sampler>>,
    interval: Duration,
    shutdown_sender: Option<Sender<()>>,
    thread_handle: Option<JoinHandle<()>>,
}

impl Poller {
    pub fn new(sampler: Sampler, interval: Duration) -> Self {
        Self {
            sampler: Arc::new(Mutex::new(sampler)),
            interval,
            shutdown_sender: None,
            thread_handle: None,
        }
    }

    /// Start polling on a background thread
    ///
    /// Calling `start` on a running poller is a no-op.
    pub fn start(&mut self) -> Result<(), SamplerError> {
        if self.is_running() {
            info!("Poller already running, skipping start");
            return Ok(());
        }

        let (shutdown_sender, shutdown_receiver) = mpsc::channel();
        let sampler = Arc::clone(&self.sampler);
        let interval = self.interval;

        let handle = thread::Builder::new()
            .name("weather-poller".to_string())
            .spawn(move || Self::poll_loop(sampler, interval, shutdown_receiver))?;

        self.shutdown_sender = Some(shutdown_sender);
        self.thread_handle = Some(handle);
        info!("Poller started with interval {:?}", interval);
        Ok(())
    }

    /// Signal the background thread and wait for it to finish
    pub fn stop(&mut self) -> Result<(), SamplerError> {
        let Some(handle) = self.thread_handle.take() else {
            debug!("Poller already stopped");
            return Ok(());
        };

        info!("Stopping poller");
        if let Some(sender) = self.shutdown_sender.take() {
            // The thread may already have exited; a closed channel is fine
            let _ = sender.send(());
        }

        handle.join().map_err(|_| {
            error!("Failed to join poller thread");
            SamplerError::ThreadPanicked
        })?;

        info!("Poller stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.thread_handle.is_some()
    }

    fn poll_loop(sampler: Arc<Mutex<Sampler>>, interval: Duration, shutdown: Receiver<()>) {
        loop {
            // A panicking cycle poisons the lock; the sampler state is still usable
            let mut guard = sampler.lock().unwrap_or_else(PoisonError::into_inner);
            match panic::catch_unwind(AssertUnwindSafe(|| guard.run_cycle())) {
                Ok(CycleOutcome::Published { topics }) => {
                    debug!("Cycle published {} events", topics.len());
                }
                Ok(CycleOutcome::Skipped) => debug!("Cycle skipped"),
                Err(panic_payload) => {
                    error!(
                        "Poll cycle for {} panicked: {}",
                        guard.location(),
                        panic_message(panic_payload.as_ref())
                    );
                }
            }
            drop(guard);

            match shutdown.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    debug!("Poller received shutdown signal");
                    return;
                }
            }
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        if self.is_running() {
            let _ = self.stop();
        }
    }
}
