//! Realtime waveform engine feeding a streaming DAC.
//!
//! - [`rt_processing`] holds everything that runs on the device's callback
//!   thread: sampling, the phase clock, the waveform cache and the supplier.
//! - [`control`] is the operator-facing half that validates changes and
//!   publishes new snapshots.
//! - [`audio_device`] drives the callback contract from real or simulated hardware.

pub mod audio_device;
pub mod control;
pub mod rt_processing;

pub use audio_device::{AudioMonitor, DriveReport, SimulatedDac, TransmitDevice};
pub use control::{ConfigController, SignalEngine};
pub use rt_processing::callback::{CallbackInfo, CallbackOutcome, DacCallback, Transmission};
pub use rt_processing::performance::{PerformanceMonitor, PerformanceSnapshot};
pub use rt_processing::supplier::{BufferSupplier, EngineEvent, Supplied, SupplyPath};
