//! Immutable configuration + cache pairs and the slot they are handed over in.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crossbeam::atomic::AtomicCell;
use spin::Mutex;
use wavegen_core::{Configuration, EngineSettings};

use super::cache::WaveformCache;

/// Everything the realtime path needs for one configuration. Never mutated
/// after construction; replaced as a whole.
#[derive(Debug)]
pub struct EngineSnapshot {
    config: Configuration,
    period_length: f64,
    cache: WaveformCache,
    generation: u64,
}

impl EngineSnapshot {
    /// Runs the full cache synthesis. Call from the control side only.
    pub fn build(config: Configuration, settings: &EngineSettings, generation: u64) -> Self {
        let cache = WaveformCache::generate(&config, settings.cache_budget, settings.max_request_len());
        Self {
            config,
            period_length: config.period_length(),
            cache,
            generation,
        }
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn period_length(&self) -> f64 {
        self.period_length
    }

    pub fn cache(&self) -> &WaveformCache {
        &self.cache
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Single-slot handover from the control side to the realtime side.
///
/// The lock is only ever held for an `Option` swap. The realtime side uses
/// `try_lock` and simply tries again on its next callback if it loses.
pub struct SnapshotMailbox {
    pending: Mutex<Option<Arc<EngineSnapshot>>>,
}

impl SnapshotMailbox {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(None),
        }
    }

    /// Post `snapshot`, returning whatever unconsumed snapshot it displaced.
    pub fn publish(&self, snapshot: Arc<EngineSnapshot>) -> Option<Arc<EngineSnapshot>> {
        self.pending.lock().replace(snapshot)
    }

    /// Realtime-safe: never spins.
    pub fn take(&self) -> Option<Arc<EngineSnapshot>> {
        self.pending.try_lock().and_then(|mut slot| slot.take())
    }

    pub fn has_pending(&self) -> bool {
        self.pending.lock().is_some()
    }
}

impl Default for SnapshotMailbox {
    fn default() -> Self {
        Self::new()
    }
}

/// Counters and flags shared by the realtime side and everyone else.
pub struct EngineShared {
    sample_index: AtomicU64,
    active_generation: AtomicCell<u64>,
    stop_requested: AtomicBool,
    stopped: AtomicBool,
}

impl EngineShared {
    pub fn new() -> Self {
        Self {
            sample_index: AtomicU64::new(0),
            active_generation: AtomicCell::new(0),
            stop_requested: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn sample_index(&self) -> u64 {
        self.sample_index.load(Ordering::Relaxed)
    }

    pub(crate) fn store_sample_index(&self, index: u64) {
        self.sample_index.store(index, Ordering::Relaxed);
    }

    /// Generation of the snapshot the realtime side is currently serving from.
    pub fn active_generation(&self) -> u64 {
        self.active_generation.load()
    }

    pub(crate) fn store_active_generation(&self, generation: u64) {
        self.active_generation.store(generation);
    }

    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    pub(crate) fn mark_stopped(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

impl Default for EngineShared {
    fn default() -> Self {
        Self::new()
    }
}
