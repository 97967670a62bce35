//! A DAC stand-in that pulls transfers without hardware.
//!
//! [`SimulatedDac::drive`] runs a fixed number of transfers on the calling
//! thread. [`TransmitDevice::start`] runs them on a background thread paced
//! at the rate the real device would consume them: each transfer lasts as
//! long as its samples take to play at the sample rate.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use quanta::Clock;
use tracing::{debug, warn};
use wavegen_core::{DeviceError, Packing};
use wavegen_core::config::{DEFAULT_SAMPLE_RATE, DEVICE_TRANSFER_LEN};

use super::TransmitDevice;
use crate::rt_processing::callback::{CallbackInfo, CallbackOutcome, DacCallback, Transmission};
use crate::rt_processing::performance::PerformanceMonitor;

/// Outcome of a synchronous [`SimulatedDac::drive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DriveReport {
    pub transfers: u64,
    pub bytes: u64,
    /// The callback asked to stop before the requested count was reached.
    pub stopped: bool,
}

#[derive(Default)]
struct Counters {
    transfers: AtomicU64,
    bytes: AtomicU64,
    underruns: AtomicU64,
}

pub struct SimulatedDac {
    sample_rate: u32,
    transfer_len: usize,
    fault_after: Option<u64>,
    monitor: Option<Arc<PerformanceMonitor>>,
    counters: Arc<Counters>,
    stop_flag: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl SimulatedDac {
    pub fn new(sample_rate: u32, transfer_len: usize) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            transfer_len,
            fault_after: None,
            monitor: None,
            counters: Arc::new(Counters::default()),
            stop_flag: Arc::new(AtomicBool::new(false)),
            finished: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    /// Report a device error on transfer number `n` (zero based).
    pub fn with_fault_after(mut self, n: u64) -> Self {
        self.fault_after = Some(n);
        self
    }

    /// Underruns are also recorded on `monitor`.
    pub fn with_monitor(mut self, monitor: Arc<PerformanceMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn transfer_len(&self) -> usize {
        self.transfer_len
    }

    pub fn transfers(&self) -> u64 {
        self.counters.transfers.load(Ordering::Relaxed)
    }

    pub fn bytes_transmitted(&self) -> u64 {
        self.counters.bytes.load(Ordering::Relaxed)
    }

    pub fn underruns(&self) -> u64 {
        self.counters.underruns.load(Ordering::Relaxed)
    }

    /// Wall time one transfer lasts on the device under `packing`.
    pub fn transfer_period(&self, packing: Packing) -> Duration {
        playback_time(packing.samples_per_transfer(self.transfer_len), self.sample_rate)
    }

    fn info_for(fault_after: Option<u64>, transfer_len: usize, n: u64) -> CallbackInfo {
        if fault_after == Some(n) {
            CallbackInfo::fault(transfer_len)
        } else {
            CallbackInfo::transfer(transfer_len)
        }
    }

    /// Run up to `max_transfers` transfers on the current thread, unpaced,
    /// handing every transmission to `sink`.
    pub fn drive(
        &self,
        callback: &mut dyn DacCallback,
        max_transfers: u64,
        mut sink: impl FnMut(Transmission<'_>),
    ) -> DriveReport {
        let mut report = DriveReport::default();
        for n in 0..max_transfers {
            match callback.on_transfer(Self::info_for(self.fault_after, self.transfer_len, n)) {
                CallbackOutcome::Transmit(transmission) => {
                    report.transfers += 1;
                    report.bytes += transmission.len() as u64;
                    sink(transmission);
                }
                CallbackOutcome::Stop => {
                    report.stopped = true;
                    break;
                }
            }
        }
        self.counters.transfers.fetch_add(report.transfers, Ordering::Relaxed);
        self.counters.bytes.fetch_add(report.bytes, Ordering::Relaxed);
        report
    }
}

fn playback_time(samples: usize, sample_rate: u32) -> Duration {
    let nanos = samples as u128 * 1_000_000_000 / u128::from(sample_rate.max(1));
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

impl Default for SimulatedDac {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_RATE, DEVICE_TRANSFER_LEN)
    }
}

impl TransmitDevice for SimulatedDac {
    fn start(&mut self, mut callback: Box<dyn DacCallback>) -> Result<(), DeviceError> {
        if self.worker.is_some() {
            return Err(DeviceError::Backend("simulated device already running".to_string()));
        }
        self.stop_flag.store(false, Ordering::Release);
        self.finished.store(false, Ordering::Release);

        let sample_rate = self.sample_rate;
        let transfer_len = self.transfer_len;
        let fault_after = self.fault_after;
        let monitor = self.monitor.clone();
        let counters = Arc::clone(&self.counters);
        let stop = Arc::clone(&self.stop_flag);
        let finished = Arc::clone(&self.finished);

        let worker = thread::Builder::new()
            .name("simulated-dac".to_string())
            .spawn(move || {
                let clock = Clock::new();
                let mut deadline = clock.now();
                let mut n = 0u64;

                while !stop.load(Ordering::Acquire) {
                    let len = match callback.on_transfer(Self::info_for(fault_after, transfer_len, n)) {
                        CallbackOutcome::Transmit(transmission) => transmission.len(),
                        CallbackOutcome::Stop => break,
                    };
                    n += 1;
                    counters.transfers.fetch_add(1, Ordering::Relaxed);
                    counters.bytes.fetch_add(len as u64, Ordering::Relaxed);

                    // The next request is due once this transfer has played out.
                    deadline += playback_time(len, sample_rate);
                    let now = clock.now();
                    if now > deadline {
                        counters.underruns.fetch_add(1, Ordering::Relaxed);
                        if let Some(monitor) = &monitor {
                            monitor.increment_underrun_count();
                        }
                        deadline = now;
                    } else {
                        thread::sleep(deadline.saturating_duration_since(now));
                    }
                }
                finished.store(true, Ordering::Release);
                debug!(transfers = n, "simulated transmission ended");
            })
            .map_err(|e| DeviceError::Backend(format!("failed to spawn device thread: {e}")))?;

        self.worker = Some(worker);
        Ok(())
    }

    fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("simulated device thread panicked");
            }
        }
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn is_running(&self) -> bool {
        self.worker.is_some() && !self.finished.load(Ordering::Acquire)
    }
}

impl Drop for SimulatedDac {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::SignalEngine;
    use crate::rt_processing::supplier::EngineEvent;
    use std::time::Instant;
    use wavegen_core::{EngineSettings, Packing};

    fn settings() -> EngineSettings {
        EngineSettings {
            sample_rate: 48_000,
            transfer_len: 3 * 480,
            cache_budget: 48_000,
            frequency: 1_000.0,
            packing: Packing::Raw8,
            ..EngineSettings::default()
        }
    }

    #[test]
    fn test_transfer_period_follows_packing() {
        let dac = SimulatedDac::new(48_000, 3 * 480);
        assert_eq!(dac.transfer_period(Packing::Raw8), Duration::from_millis(10));
        assert_eq!(dac.transfer_period(Packing::Packed332), Duration::from_millis(30));
    }

    #[test]
    fn test_packed_transfers_paced_at_sample_rate() {
        let SignalEngine { mut controller, supplier, .. } = SignalEngine::build(EngineSettings {
            packing: Packing::Packed332,
            ..settings()
        })
        .unwrap();
        let mut dac = SimulatedDac::new(48_000, 3 * 480);

        let started = Instant::now();
        dac.start(Box::new(supplier)).unwrap();
        thread::sleep(Duration::from_millis(150));
        controller.request_shutdown();
        dac.stop();
        let elapsed = started.elapsed();

        // 1440 samples per transfer at 48 kHz: one transfer every 30 ms.
        let allowed = elapsed.as_millis() as u64 / 30 + 2;
        assert!(dac.transfers() >= 2);
        assert!(dac.transfers() <= allowed, "{} transfers in {:?}", dac.transfers(), elapsed);
        assert_eq!(dac.bytes_transmitted(), dac.transfers() * 1440);
    }

    #[test]
    fn test_drive_counts_transfers() {
        let mut engine = SignalEngine::build(settings()).unwrap();
        let dac = SimulatedDac::new(48_000, 3 * 480);
        let mut lens = Vec::new();
        let report = dac.drive(&mut engine.supplier, 5, |t| lens.push(t.len()));
        assert_eq!(report, DriveReport { transfers: 5, bytes: 5 * 480, stopped: false });
        assert_eq!(lens, vec![480; 5]);
        assert_eq!(engine.supplier.sample_index(), 5 * 480);
    }

    #[test]
    fn test_injected_fault_stops() {
        let mut engine = SignalEngine::build(settings()).unwrap();
        let dac = SimulatedDac::new(48_000, 3 * 480).with_fault_after(3);
        let report = dac.drive(&mut engine.supplier, 10, |_| {});
        assert_eq!(report.transfers, 3);
        assert!(report.stopped);
        assert!(matches!(
            engine.controller.poll_events().as_slice(),
            [EngineEvent::Fault(DeviceError::TransmissionFault)]
        ));
    }

    #[test]
    fn test_background_thread_runs_until_stopped() {
        let SignalEngine { mut controller, supplier, monitor } = SignalEngine::build(settings()).unwrap();
        let mut dac = SimulatedDac::new(48_000, 3 * 480).with_monitor(monitor);
        dac.start(Box::new(supplier)).unwrap();
        assert!(dac.is_running());

        let started = Instant::now();
        while dac.transfers() < 3 && started.elapsed() < Duration::from_secs(5) {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(dac.transfers() >= 3);
        assert!(controller.sample_index() >= 3 * 480);

        controller.request_shutdown();
        dac.stop();
        assert!(!dac.is_running());
    }

    #[test]
    fn test_second_start_refused() {
        let first = SignalEngine::build(settings()).unwrap();
        let second = SignalEngine::build(settings()).unwrap();
        let mut dac = SimulatedDac::new(48_000, 3 * 480);
        dac.start(Box::new(first.supplier)).unwrap();
        assert!(matches!(dac.start(Box::new(second.supplier)), Err(DeviceError::Backend(_))));
        dac.stop();
    }
}
