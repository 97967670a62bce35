//! The realtime hot path.
//!
//! Each request is served either as a zero-copy slice of the current
//! snapshot's cache or, when the cache cannot cover it contiguously, by
//! synthesizing into a scratch buffer owned by the supplier. Both paths
//! compute the same bytes for the same absolute sample index.

use std::sync::Arc;

use crossbeam::channel::Sender;
use wavegen_core::{Configuration, DeviceError, Packing};

use super::cache::fill;
use super::callback::{CallbackInfo, CallbackOutcome, DacCallback, Transmission};
use super::performance::PerformanceMonitor;
use super::phase::PhaseClock;
use super::snapshot::{EngineShared, EngineSnapshot, SnapshotMailbox};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupplyPath {
    CacheSlice,
    Synthesized,
}

/// Notifications from the realtime side, drained by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Transmission ended because of a device-side problem.
    Fault(DeviceError),
    /// Transmission ended after a shutdown request.
    Stopped,
}

/// One served request.
#[derive(Debug, Clone, Copy)]
pub struct Supplied<'a> {
    pub transmission: Transmission<'a>,
    pub path: SupplyPath,
    /// Absolute index of the first sample in `transmission`.
    pub first_sample: u64,
    /// Phase of the first sample, in [0, 1).
    pub start_phase: f64,
    /// Phase the clock reached after this request.
    pub end_phase: f64,
    /// Snapshot the samples were produced from.
    pub generation: u64,
    pub config: Configuration,
}

pub struct BufferSupplier {
    current: Arc<EngineSnapshot>,
    mailbox: Arc<SnapshotMailbox>,
    shared: Arc<EngineShared>,
    clock: PhaseClock,
    scratch: Box<[u8]>,
    events: Sender<EngineEvent>,
    monitor: Option<Arc<PerformanceMonitor>>,
}

impl BufferSupplier {
    pub(crate) fn new(
        initial: Arc<EngineSnapshot>,
        mailbox: Arc<SnapshotMailbox>,
        shared: Arc<EngineShared>,
        scratch_len: usize,
        events: Sender<EngineEvent>,
    ) -> Self {
        shared.store_active_generation(initial.generation());
        Self {
            clock: PhaseClock::new(initial.period_length()),
            current: initial,
            mailbox,
            shared,
            scratch: vec![0u8; scratch_len].into_boxed_slice(),
            events,
            monitor: None,
        }
    }

    pub fn with_monitor(mut self, monitor: Arc<PerformanceMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn sample_index(&self) -> u64 {
        self.clock.sample_index()
    }

    pub fn active_config(&self) -> &Configuration {
        self.current.config()
    }

    /// Serve `requested` samples for the active configuration.
    pub fn supply(&mut self, requested: usize) -> Result<Supplied<'_>, DeviceError> {
        self.adopt_pending();
        self.check_capacity(requested)?;
        Ok(self.produce(requested))
    }

    /// Switch to a newly published snapshot, if there is one. The sample
    /// index carries over so the stream continues at the same position.
    fn adopt_pending(&mut self) {
        if let Some(next) = self.mailbox.take() {
            self.clock.retune(next.period_length());
            self.shared.store_active_generation(next.generation());
            // The controller still holds a reference, so this drop never frees.
            self.current = next;
        }
    }

    fn check_capacity(&self, requested: usize) -> Result<(), DeviceError> {
        if requested > self.scratch.len() {
            return Err(DeviceError::OversizedRequest {
                requested,
                capacity: self.scratch.len(),
            });
        }
        Ok(())
    }

    /// Caller guarantees `requested <= scratch capacity`.
    fn produce(&mut self, requested: usize) -> Supplied<'_> {
        let first_sample = self.clock.sample_index();
        let position = self.clock.position();
        let start_phase = self.clock.phase();
        let end_phase = self.clock.advance(requested as u64);
        self.shared.store_sample_index(self.clock.sample_index());

        let snapshot = &*self.current;
        let config = *snapshot.config();

        let (samples, path): (&[u8], SupplyPath) = match snapshot.cache().slice_at(first_sample, requested) {
            Some(slice) => (slice, SupplyPath::CacheSlice),
            None => {
                let out = &mut self.scratch[..requested];
                // The clock and the snapshot agree on the period, so the
                // position alone continues the stream.
                fill(out, &config, position);
                (&*out, SupplyPath::Synthesized)
            }
        };

        if let Some(monitor) = &self.monitor {
            monitor.record_supply(requested, path);
        }

        let transmission = match config.packing {
            Packing::Raw8 => Transmission::Lane {
                channel: config.channel,
                samples,
            },
            Packing::Packed332 => Transmission::Packed { samples },
        };

        Supplied {
            transmission,
            path,
            first_sample,
            start_phase,
            end_phase,
            generation: snapshot.generation(),
            config,
        }
    }

    /// Stop producing and tell the control side why. Only the first call reports.
    fn halt(&mut self, event: EngineEvent) {
        if !self.shared.is_stopped() {
            self.shared.mark_stopped();
            // Bounded channel: a full queue just loses the duplicate notice.
            let _ = self.events.try_send(event);
        }
    }
}

impl DacCallback for BufferSupplier {
    fn on_transfer(&mut self, info: CallbackInfo) -> CallbackOutcome<'_> {
        if info.device_error {
            self.halt(EngineEvent::Fault(DeviceError::TransmissionFault));
            return CallbackOutcome::Stop;
        }
        if self.shared.stop_requested() {
            self.halt(EngineEvent::Stopped);
            return CallbackOutcome::Stop;
        }
        if self.shared.is_stopped() {
            return CallbackOutcome::Stop;
        }

        self.adopt_pending();
        let requested = self.current.config().packing.samples_per_transfer(info.transfer_len);
        if let Err(err) = self.check_capacity(requested) {
            self.halt(EngineEvent::Fault(err));
            return CallbackOutcome::Stop;
        }

        let monitor = self.monitor.clone();
        let _guard = monitor.as_deref().map(|m| m.scoped_callback(requested));
        CallbackOutcome::Transmit(self.produce(requested).transmission)
    }
}
