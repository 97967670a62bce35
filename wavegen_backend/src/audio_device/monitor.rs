//! Plays the engine's output through a sound card.
//!
//! The card pulls frames; [`StreamFeeder`] turns that into transfer requests
//! against the engine and decodes the returned bytes to `f32`. The selected
//! lane is played as is; packed bytes are played through their red field.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use cpal::traits::{DeviceTrait, StreamTrait};
use tracing::{error, info, warn};
use wavegen_core::{Channel, DeviceError};

use super::TransmitDevice;
use super::enumeration::DeviceEnumerator;
use super::negotiation::{ConfigNegotiator, ConfigurationRequest, NegotiatedConfig};
use crate::rt_processing::callback::{CallbackInfo, CallbackOutcome, DacCallback, Transmission};
use crate::rt_processing::waveform::unpack_lane;

#[inline]
fn to_f32(byte: u8) -> f32 {
    (f32::from(byte) - 128.0) / 128.0
}

/// Runs inside the cpal data callback.
pub(crate) struct StreamFeeder {
    callback: Box<dyn DacCallback>,
    transfer_len: usize,
    pending: VecDeque<f32>,
    device_fault: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
}

impl StreamFeeder {
    pub(crate) fn new(
        callback: Box<dyn DacCallback>,
        transfer_len: usize,
        device_fault: Arc<AtomicBool>,
        finished: Arc<AtomicBool>,
    ) -> Self {
        Self {
            callback,
            transfer_len,
            // One transfer never yields more than `transfer_len` samples, and we
            // only pull when empty, so this never grows.
            pending: VecDeque::with_capacity(transfer_len),
            device_fault,
            finished,
        }
    }

    /// Fill interleaved `output`, writing the same value to every channel of a frame.
    pub(crate) fn fill(&mut self, output: &mut [f32], channels: usize) {
        for frame in output.chunks_mut(channels.max(1)) {
            if self.pending.is_empty() && !self.finished.load(Ordering::Relaxed) {
                self.pull();
            }
            let value = self.pending.pop_front().unwrap_or(0.0);
            frame.fill(value);
        }
    }

    fn pull(&mut self) {
        let info = CallbackInfo {
            transfer_len: self.transfer_len,
            device_error: self.device_fault.swap(false, Ordering::AcqRel),
        };
        match self.callback.on_transfer(info) {
            CallbackOutcome::Transmit(Transmission::Lane { samples, .. }) => {
                self.pending.extend(samples.iter().map(|&b| to_f32(b)));
            }
            CallbackOutcome::Transmit(Transmission::Packed { samples }) => {
                self.pending
                    .extend(samples.iter().map(|&b| to_f32(unpack_lane(b, Channel::Red))));
            }
            CallbackOutcome::Stop => self.finished.store(true, Ordering::Release),
        }
    }
}

pub struct AudioMonitor {
    device: cpal::Device,
    device_name: String,
    negotiated: NegotiatedConfig,
    transfer_len: usize,
    stream: Option<cpal::Stream>,
    device_fault: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
}

impl AudioMonitor {
    /// Open `device_name` (or the default output) and negotiate `request`.
    /// A sample-rate mismatch is logged and left on [`negotiated`](Self::negotiated).
    pub fn open(
        device_name: Option<&str>,
        request: &ConfigurationRequest,
        transfer_len: usize,
    ) -> Result<Self, DeviceError> {
        let enumerator = DeviceEnumerator::new().map_err(|e| DeviceError::Backend(e.to_string()))?;
        let device_info = enumerator
            .resolve(device_name)
            .map_err(|e| DeviceError::Backend(e.to_string()))?;
        let negotiated = ConfigNegotiator::negotiate(device_info, request)
            .map_err(|e| DeviceError::Backend(e.to_string()))?;
        if let Some(warning) = negotiated.warning() {
            warn!("{warning}");
        }

        let device = enumerator
            .select_device(device_info)
            .map_err(|e| DeviceError::Backend(e.to_string()))?
            .clone();
        info!(device = %device_info.name, config = %negotiated, "audio output opened");

        Ok(Self {
            device,
            device_name: device_info.name.clone(),
            negotiated,
            transfer_len,
            stream: None,
            device_fault: Arc::new(AtomicBool::new(false)),
            finished: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn negotiated(&self) -> &NegotiatedConfig {
        &self.negotiated
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}

impl TransmitDevice for AudioMonitor {
    fn start(&mut self, callback: Box<dyn DacCallback>) -> Result<(), DeviceError> {
        if self.stream.is_some() {
            return Err(DeviceError::Backend("audio stream already running".to_string()));
        }
        self.finished.store(false, Ordering::Release);
        self.device_fault.store(false, Ordering::Release);

        let channels = usize::from(self.negotiated.channels);
        let mut feeder = StreamFeeder::new(
            callback,
            self.transfer_len,
            Arc::clone(&self.device_fault),
            Arc::clone(&self.finished),
        );
        let fault = Arc::clone(&self.device_fault);

        let stream = self
            .device
            .build_output_stream(
                &self.negotiated.stream_config,
                move |output: &mut [f32], _: &cpal::OutputCallbackInfo| feeder.fill(output, channels),
                move |err| {
                    error!(%err, "audio stream error");
                    fault.store(true, Ordering::Release);
                },
                None,
            )
            .map_err(|e| DeviceError::Backend(format!("failed to build output stream: {e}")))?;
        stream
            .play()
            .map_err(|e| DeviceError::Backend(format!("failed to start output stream: {e}")))?;

        self.stream = Some(stream);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(err) = stream.pause() {
                warn!(%err, "failed to pause output stream");
            }
        }
    }

    fn sample_rate(&self) -> u32 {
        self.negotiated.sample_rate
    }

    fn is_running(&self) -> bool {
        self.stream.is_some() && !self.finished.load(Ordering::Acquire)
    }
}
