//! Contract between the DAC driver and the sample engine.
//!
//! - The driver calls [`DacCallback::on_transfer`] from its own timing-critical
//!   thread whenever it needs the next transfer.
//! - The returned buffers are borrowed from the callback object and stay valid
//!   until the next call.
//! - Implementations must not block, allocate, or take a lock that another
//!   thread can hold for an unbounded time.

use wavegen_core::Channel;

/// What the driver tells the engine on each invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallbackInfo {
    /// Bytes the device will transmit from the returned buffer(s).
    pub transfer_len: usize,
    /// The previous transfer failed; the stream cannot continue.
    pub device_error: bool,
}

impl CallbackInfo {
    pub fn transfer(transfer_len: usize) -> Self {
        Self {
            transfer_len,
            device_error: false,
        }
    }

    pub fn fault(transfer_len: usize) -> Self {
        Self {
            transfer_len,
            device_error: true,
        }
    }
}

/// Buffer handed to the device for one transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transmission<'a> {
    /// Raw samples for a single output lane. The other lanes keep their last data.
    Lane { channel: Channel, samples: &'a [u8] },
    /// RGB332 bytes feeding all three lanes at once.
    Packed { samples: &'a [u8] },
}

impl<'a> Transmission<'a> {
    pub fn samples(&self) -> &'a [u8] {
        match *self {
            Transmission::Lane { samples, .. } | Transmission::Packed { samples } => samples,
        }
    }

    /// Buffer feeding `channel`, if this transmission updates it.
    pub fn lane(&self, channel: Channel) -> Option<&'a [u8]> {
        match *self {
            Transmission::Lane { channel: selected, samples } if selected == channel => Some(samples),
            Transmission::Lane { .. } => None,
            Transmission::Packed { samples } => Some(samples),
        }
    }

    pub fn is_packed(&self) -> bool {
        matches!(self, Transmission::Packed { .. })
    }

    pub fn len(&self) -> usize {
        self.samples().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackOutcome<'a> {
    Transmit(Transmission<'a>),
    /// Stop the transmission loop. No further callbacks are expected.
    Stop,
}

/// Trait every buffer producer driven by a DAC must implement.
pub trait DacCallback: Send + 'static {
    fn on_transfer(&mut self, info: CallbackInfo) -> CallbackOutcome<'_>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lane_accessor() {
        let data = [1u8, 2, 3];
        let lane = Transmission::Lane {
            channel: Channel::Green,
            samples: &data,
        };
        assert_eq!(lane.lane(Channel::Green), Some(&data[..]));
        assert_eq!(lane.lane(Channel::Red), None);

        let packed = Transmission::Packed { samples: &data };
        for channel in Channel::ALL {
            assert_eq!(packed.lane(channel), Some(&data[..]));
        }
        assert!(packed.is_packed());
        assert_eq!(packed.len(), 3);
    }
}
