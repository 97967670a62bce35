//! Control-side half of the engine.
//!
//! [`SignalEngine::build`] creates the two halves: a [`ConfigController`] for
//! the operator thread and a [`BufferSupplier`] for the device callback. They
//! only meet through the snapshot mailbox, a few atomics, and an event queue.

use std::sync::Arc;

use crossbeam::channel::{self, Receiver};
use tracing::{debug, error, info, warn};
use wavegen_core::{
    Channel, Command, Configuration, EngineSettings, FrequencyStep, Packing, SettingsError, StatusBoard,
    StatusReport, ValidationError, WaveformKind, round_frequency,
};

use crate::rt_processing::performance::PerformanceMonitor;
use crate::rt_processing::snapshot::{EngineShared, EngineSnapshot, SnapshotMailbox};
use crate::rt_processing::supplier::{BufferSupplier, EngineEvent};
use crate::rt_processing::waveform::init_tables;

const EVENT_QUEUE_LEN: usize = 8;
const MONITOR_EMA_ALPHA: f64 = 0.1;

pub struct SignalEngine {
    pub controller: ConfigController,
    pub supplier: BufferSupplier,
    pub monitor: Arc<PerformanceMonitor>,
}

impl SignalEngine {
    /// Validate `settings`, synthesize the initial cache and wire both halves together.
    pub fn build(settings: EngineSettings) -> Result<Self, SettingsError> {
        settings.validate()?;
        init_tables();

        let config = settings.initial_configuration();
        let snapshot = Arc::new(EngineSnapshot::build(config, &settings, 0));
        let mailbox = Arc::new(SnapshotMailbox::new());
        let shared = Arc::new(EngineShared::new());
        let monitor = Arc::new(PerformanceMonitor::new(settings.sample_rate, MONITOR_EMA_ALPHA));
        let (events_tx, events_rx) = channel::bounded(EVENT_QUEUE_LEN);

        let supplier = BufferSupplier::new(
            Arc::clone(&snapshot),
            Arc::clone(&mailbox),
            Arc::clone(&shared),
            settings.max_request_len(),
            events_tx,
        )
        .with_monitor(Arc::clone(&monitor));

        let status = StatusBoard::new(StatusReport::new(&config, snapshot.cache().len(), 0));
        info!(%config, cache_len = snapshot.cache().len(), "engine ready");

        let controller = ConfigController {
            settings,
            current: snapshot,
            retired: Vec::new(),
            mailbox,
            shared,
            events: events_rx,
            status,
            next_generation: 1,
        };

        Ok(Self {
            controller,
            supplier,
            monitor,
        })
    }
}

/// Validates operator changes and publishes new snapshots.
pub struct ConfigController {
    settings: EngineSettings,
    current: Arc<EngineSnapshot>,
    /// Published snapshots the realtime side may still reference.
    retired: Vec<Arc<EngineSnapshot>>,
    mailbox: Arc<SnapshotMailbox>,
    shared: Arc<EngineShared>,
    events: Receiver<EngineEvent>,
    status: StatusBoard,
    next_generation: u64,
}

impl ConfigController {
    pub fn configuration(&self) -> Configuration {
        *self.current.config()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn status(&self) -> StatusBoard {
        self.status.clone()
    }

    /// Generation of the most recently published snapshot.
    pub fn published_generation(&self) -> u64 {
        self.current.generation()
    }

    /// Generation the realtime side is serving from right now.
    pub fn active_generation(&self) -> u64 {
        self.shared.active_generation()
    }

    pub fn sample_index(&self) -> u64 {
        self.shared.sample_index()
    }

    pub fn set_frequency(&mut self, frequency: f64) -> Result<(), ValidationError> {
        self.commit(self.configuration().with_frequency(frequency))
    }

    pub fn step_frequency(&mut self, step: FrequencyStep) -> Result<(), ValidationError> {
        let frequency = step.apply(self.configuration().frequency);
        self.set_frequency(frequency)
    }

    pub fn round_frequency(&mut self) -> Result<(), ValidationError> {
        match round_frequency(self.configuration().frequency) {
            Some(frequency) => self.set_frequency(frequency),
            None => Err(ValidationError::InvalidFrequency(0.0)),
        }
    }

    pub fn set_waveform(&mut self, waveform: WaveformKind) -> Result<(), ValidationError> {
        self.commit(self.configuration().with_waveform(waveform))
    }

    pub fn set_channel(&mut self, channel: Channel) -> Result<(), ValidationError> {
        self.commit(self.configuration().with_channel(channel))
    }

    pub fn set_packing(&mut self, packing: Packing) -> Result<(), ValidationError> {
        self.commit(self.configuration().with_packing(packing))
    }

    pub fn toggle_packing(&mut self) -> Result<(), ValidationError> {
        self.set_packing(self.configuration().packing.toggled())
    }

    pub fn apply(&mut self, command: Command) -> Result<(), ValidationError> {
        let result = match command {
            Command::SetFrequency(frequency) => self.set_frequency(frequency),
            Command::Step(step) => self.step_frequency(step),
            Command::RoundFrequency => self.round_frequency(),
            Command::SetWaveform(waveform) => self.set_waveform(waveform),
            Command::SetChannel(channel) => self.set_channel(channel),
            Command::SetPacking(packing) => self.set_packing(packing),
            Command::TogglePacking => self.toggle_packing(),
        };
        if let Err(err) = &result {
            warn!(?command, %err, "rejected configuration change");
            self.status.warn(err.to_string());
        }
        result
    }

    pub fn validate(&self, config: &Configuration) -> Result<(), ValidationError> {
        config.validate(self.settings.frequency_policy)
    }

    /// Validate, synthesize and publish `next`. On error nothing changes.
    fn commit(&mut self, next: Configuration) -> Result<(), ValidationError> {
        self.validate(&next)?;

        if next == *self.current.config() {
            debug!(config = %next, "configuration unchanged");
            return Ok(());
        }

        let generation = self.next_generation;
        self.next_generation += 1;
        let snapshot = Arc::new(EngineSnapshot::build(next, &self.settings, generation));

        let previous = std::mem::replace(&mut self.current, Arc::clone(&snapshot));
        self.retired.push(previous);
        // An unconsumed snapshot we displace is still in `retired`, so dropping it here is free.
        drop(self.mailbox.publish(snapshot));
        self.collect_garbage();

        self.status.update(&next, self.current.cache().len(), generation);
        info!(config = %next, generation, "published configuration");
        Ok(())
    }

    /// Release retired snapshots the realtime side no longer holds.
    pub fn collect_garbage(&mut self) {
        self.retired.retain(|snapshot| Arc::strong_count(snapshot) > 1);
    }

    pub fn retired_len(&self) -> usize {
        self.retired.len()
    }

    /// Ask the realtime side to stop at its next callback.
    pub fn request_shutdown(&self) {
        info!("shutdown requested");
        self.shared.request_stop();
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.is_stopped()
    }

    /// Drain realtime notifications, logging them and updating the status board.
    pub fn poll_events(&mut self) -> Vec<EngineEvent> {
        let events: Vec<EngineEvent> = self.events.try_iter().collect();
        for event in &events {
            match event {
                EngineEvent::Fault(err) => {
                    error!(%err, "device error, stopping transmission");
                    self.status.warn(format!("Device error, exiting: {err}"));
                }
                EngineEvent::Stopped => info!("transmission stopped"),
            }
            self.status.mark_stopped();
        }
        self.collect_garbage();
        events
    }

    /// Record a non-fatal problem reported by the device layer.
    pub fn report_warning(&self, message: impl Into<String>) {
        let message = message.into();
        warn!("{message}");
        self.status.warn(message);
    }
}
