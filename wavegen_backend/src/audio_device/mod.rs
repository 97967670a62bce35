//! Hardware-facing side: anything that pulls transfers from a [`DacCallback`].

pub mod enumeration;
pub mod monitor;
pub mod negotiation;
pub mod simulated;

use wavegen_core::DeviceError;

use crate::rt_processing::callback::DacCallback;

pub use enumeration::{DeviceEnumerator, DeviceInfo, EnumError};
pub use monitor::AudioMonitor;
pub use negotiation::{ConfigNegotiator, ConfigurationRequest, NegotiatedConfig, NegotiationError};
pub use simulated::{DriveReport, SimulatedDac};

/// A device that repeatedly invokes a callback on its own thread.
pub trait TransmitDevice {
    /// Begin transmission. The device owns `callback` until [`stop`](Self::stop).
    fn start(&mut self, callback: Box<dyn DacCallback>) -> Result<(), DeviceError>;

    /// Stop transmission and release the callback. Idempotent.
    fn stop(&mut self);

    /// Rate the device actually runs at, in samples per second.
    fn sample_rate(&self) -> u32;

    fn is_running(&self) -> bool;
}
