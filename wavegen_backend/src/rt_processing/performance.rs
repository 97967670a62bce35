use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use quanta::{Clock, Instant as QuantaInstant};

use super::supplier::SupplyPath;

/// Snapshot of metrics suitable for logging/telemetry (non-RT).
#[derive(Debug, Clone)]
pub struct PerformanceSnapshot {
    /// Total samples handed to the device.
    pub samples_supplied: u64,
    /// Total callback invocations.
    pub callback_count: u64,
    /// Requests served as a slice of the waveform cache.
    pub cache_hits: u64,
    /// Requests synthesized into the scratch buffer.
    pub synthesized: u64,
    /// Callbacks whose work took longer than the transfer they produced lasts.
    pub deadline_misses: u64,
    /// Underruns reported by the device side.
    pub underrun_count: u64,
    /// Maximum callback duration observed (ns).
    pub max_callback_nanos: Option<u64>,
    /// EMA of callback duration in nanoseconds.
    pub ema_callback_nanos: f64,
    /// EMA of callback duration relative to the transfer's playback time.
    pub avg_load_percent: f64,
    /// Time when snapshot was taken.
    pub timestamp: Instant,
}

/// Real-time-safe monitor for the buffer supplier.
///
/// Only the `record_*`/`increment_*` methods and `scoped_callback()` may be
/// used from the device callback; they touch atomics only. `snapshot` is for
/// the control side.
pub struct PerformanceMonitor {
    clock: Clock,
    sample_rate: u64,

    samples_supplied: AtomicU64,
    callback_count: AtomicU64,
    cache_hits: AtomicU64,
    synthesized: AtomicU64,
    deadline_misses: AtomicU64,
    underrun_count: AtomicU64,

    max_callback_nanos: AtomicU64,
    /// EMA of callback duration stored as f64 bits
    ema_callback_bits: AtomicU64,
    /// EMA of callback load (duration / budget) stored as f64 bits
    ema_load_bits: AtomicU64,
    ema_alpha: f64,
}

impl PerformanceMonitor {
    /// `ema_alpha` controls how quickly the averages follow new callbacks;
    /// values around 0.05..0.2 work well.
    pub fn new(sample_rate: u32, ema_alpha: f64) -> Self {
        Self {
            clock: Clock::new(),
            sample_rate: u64::from(sample_rate.max(1)),
            samples_supplied: AtomicU64::new(0),
            callback_count: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            synthesized: AtomicU64::new(0),
            deadline_misses: AtomicU64::new(0),
            underrun_count: AtomicU64::new(0),
            max_callback_nanos: AtomicU64::new(0),
            ema_callback_bits: AtomicU64::new(0),
            ema_load_bits: AtomicU64::new(0),
            ema_alpha: ema_alpha.clamp(f64::EPSILON, 1.0),
        }
    }

    /// Playback time of `samples` at the monitor's sample rate, in nanoseconds.
    pub fn budget_nanos(&self, samples: usize) -> u64 {
        let nanos = samples as u128 * 1_000_000_000 / u128::from(self.sample_rate);
        u64::try_from(nanos).unwrap_or(u64::MAX)
    }

    #[inline(always)]
    pub fn record_supply(&self, samples: usize, path: SupplyPath) {
        self.samples_supplied.fetch_add(samples as u64, Ordering::Relaxed);
        match path {
            SupplyPath::CacheSlice => self.cache_hits.fetch_add(1, Ordering::Relaxed),
            SupplyPath::Synthesized => self.synthesized.fetch_add(1, Ordering::Relaxed),
        };
    }

    #[inline(always)]
    pub fn increment_underrun_count(&self) {
        self.underrun_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one callback that took `nanos` against a budget of `budget_nanos`.
    #[inline(always)]
    pub fn record_callback_duration_nanos(&self, nanos: u64, budget_nanos: u64) {
        self.max_callback_nanos.fetch_max(nanos, Ordering::Relaxed);

        if budget_nanos > 0 && nanos > budget_nanos {
            self.deadline_misses.fetch_add(1, Ordering::Relaxed);
        }

        self.update_ema(&self.ema_callback_bits, nanos as f64);
        if budget_nanos > 0 {
            self.update_ema(&self.ema_load_bits, nanos as f64 / budget_nanos as f64);
        }
    }

    #[inline(always)]
    fn update_ema(&self, cell: &AtomicU64, value: f64) {
        // EMA_new = alpha * x + (1 - alpha) * EMA_old
        let alpha = self.ema_alpha;
        let mut old_bits = cell.load(Ordering::Relaxed);
        loop {
            let new_f = alpha * value + (1.0 - alpha) * f64::from_bits(old_bits);
            match cell.compare_exchange_weak(old_bits, new_f.to_bits(), Ordering::Relaxed, Ordering::Relaxed) {
                Ok(_) => break,
                Err(found) => old_bits = found,
            }
        }
    }

    /// Stack guard that counts the callback and records its duration on drop.
    ///
    /// ```ignore
    /// let _g = monitor.scoped_callback(requested_len);
    /// // ... callback work ...
    /// ```
    #[inline(always)]
    pub fn scoped_callback(&self, samples: usize) -> RealtimeGuard<'_> {
        self.callback_count.fetch_add(1, Ordering::Relaxed);
        RealtimeGuard {
            monitor: self,
            start: self.clock.now(),
            budget_nanos: self.budget_nanos(samples),
        }
    }

    /// Not real-time safe.
    pub fn snapshot(&self) -> PerformanceSnapshot {
        let max_raw = self.max_callback_nanos.load(Ordering::Relaxed);
        PerformanceSnapshot {
            samples_supplied: self.samples_supplied.load(Ordering::Relaxed),
            callback_count: self.callback_count.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            synthesized: self.synthesized.load(Ordering::Relaxed),
            deadline_misses: self.deadline_misses.load(Ordering::Relaxed),
            underrun_count: self.underrun_count.load(Ordering::Relaxed),
            max_callback_nanos: (max_raw != 0).then_some(max_raw),
            ema_callback_nanos: f64::from_bits(self.ema_callback_bits.load(Ordering::Relaxed)),
            avg_load_percent: f64::from_bits(self.ema_load_bits.load(Ordering::Relaxed)) * 100.0,
            timestamp: Instant::now(),
        }
    }

    /// Reset all counters (non-RT).
    pub fn reset_all(&self) {
        for counter in [
            &self.samples_supplied,
            &self.callback_count,
            &self.cache_hits,
            &self.synthesized,
            &self.deadline_misses,
            &self.underrun_count,
            &self.max_callback_nanos,
            &self.ema_callback_bits,
            &self.ema_load_bits,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

fn saturating_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

/// Records callback latency on drop. Atomics only.
pub struct RealtimeGuard<'a> {
    monitor: &'a PerformanceMonitor,
    start: QuantaInstant,
    budget_nanos: u64,
}

impl<'a> Drop for RealtimeGuard<'a> {
    fn drop(&mut self) {
        let elapsed = self.monitor.clock.now().saturating_duration_since(self.start);
        self.monitor
            .record_callback_duration_nanos(saturating_nanos(elapsed), self.budget_nanos);
    }
}
