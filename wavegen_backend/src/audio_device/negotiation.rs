use crate::audio_device::enumeration::DeviceInfo;
use cpal::{BufferSize, SampleRate, StreamConfig};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleRatePriority {
    /// Use the requested rate or fail.
    Exact,
    /// Fall back to the closest rate the device supports.
    Closest,
}

#[derive(Debug, Clone)]
pub struct ConfigurationRequest {
    pub sample_rate: u32,
    pub sample_rate_priority: SampleRatePriority,
}

impl ConfigurationRequest {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            sample_rate_priority: SampleRatePriority::Closest,
        }
    }

    pub fn with_sample_rate_priority(mut self, priority: SampleRatePriority) -> Self {
        self.sample_rate_priority = priority;
        self
    }
}

#[derive(Debug, Clone)]
pub struct NegotiatedConfig {
    pub requested_sample_rate: u32,
    pub sample_rate: u32,
    pub channels: u16,
    pub stream_config: StreamConfig,
}

impl NegotiatedConfig {
    pub fn sample_rate_matched(&self) -> bool {
        self.sample_rate == self.requested_sample_rate
    }

    /// Operator-facing notice when the device could not run at the requested rate.
    pub fn warning(&self) -> Option<String> {
        (!self.sample_rate_matched()).then(|| {
            format!(
                "WARNING: Failed to set sample rate to {} Hz, running at {} Hz",
                self.requested_sample_rate, self.sample_rate
            )
        })
    }
}

impl fmt::Display for NegotiatedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}ch @ {}Hz, buffer: {:?}",
            self.channels, self.sample_rate, self.stream_config.buffer_size
        )
    }
}

#[derive(Debug, Clone)]
pub enum NegotiationError {
    SampleRateNotSupported { requested: u32, min: u32, max: u32 },
    FormatNotSupported,
}

impl fmt::Display for NegotiationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SampleRateNotSupported { requested, min, max } => {
                write!(f, "Sample rate {} not supported. Available: {}-{}", requested, min, max)
            }
            Self::FormatNotSupported => write!(f, "Device has no f32 output format"),
        }
    }
}

impl std::error::Error for NegotiationError {}

pub type NegotiationResult<T> = Result<T, NegotiationError>;

pub struct ConfigNegotiator;

impl ConfigNegotiator {
    pub fn negotiate(device_info: &DeviceInfo, request: &ConfigurationRequest) -> NegotiationResult<NegotiatedConfig> {
        if !device_info.supports_f32 {
            return Err(NegotiationError::FormatNotSupported);
        }

        let sample_rate = Self::negotiate_sample_rate(device_info, request)?;
        let channels = device_info.default_channels.max(1);

        Ok(NegotiatedConfig {
            requested_sample_rate: request.sample_rate,
            sample_rate,
            channels,
            stream_config: StreamConfig {
                channels,
                sample_rate: SampleRate(sample_rate),
                buffer_size: BufferSize::Default,
            },
        })
    }

    fn negotiate_sample_rate(device_info: &DeviceInfo, request: &ConfigurationRequest) -> NegotiationResult<u32> {
        let requested = request.sample_rate;
        if device_info.supports_sample_rate(requested) {
            return Ok(requested);
        }

        match request.sample_rate_priority {
            SampleRatePriority::Exact => Err(NegotiationError::SampleRateNotSupported {
                requested,
                min: device_info.min_sample_rate,
                max: device_info.max_sample_rate,
            }),
            SampleRatePriority::Closest => Ok(Self::find_closest_sample_rate(device_info, requested)),
        }
    }

    pub fn find_closest_sample_rate(device_info: &DeviceInfo, target: u32) -> u32 {
        target.clamp(device_info.min_sample_rate, device_info.max_sample_rate.max(device_info.min_sample_rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> DeviceInfo {
        DeviceInfo {
            name: "Test Output".to_string(),
            is_default: true,
            min_sample_rate: 8_000,
            max_sample_rate: 192_000,
            default_sample_rate: 48_000,
            max_channels: 2,
            default_channels: 2,
            supports_f32: true,
            device_index: 0,
        }
    }

    #[test]
    fn test_supported_rate_kept() {
        let negotiated = ConfigNegotiator::negotiate(&device(), &ConfigurationRequest::new(96_000)).unwrap();
        assert_eq!(negotiated.sample_rate, 96_000);
        assert!(negotiated.warning().is_none());
    }

    #[test]
    fn test_unsupported_rate_falls_back_with_warning() {
        let negotiated = ConfigNegotiator::negotiate(&device(), &ConfigurationRequest::new(150_000_000)).unwrap();
        assert_eq!(negotiated.sample_rate, 192_000);
        assert!(!negotiated.sample_rate_matched());
        assert!(negotiated.warning().unwrap().contains("Failed to set sample rate"));
    }

    #[test]
    fn test_exact_priority_rejects() {
        let request = ConfigurationRequest::new(1_000).with_sample_rate_priority(SampleRatePriority::Exact);
        assert!(matches!(
            ConfigNegotiator::negotiate(&device(), &request),
            Err(NegotiationError::SampleRateNotSupported { requested: 1_000, .. })
        ));
    }

    #[test]
    fn test_requires_float_output() {
        let info = DeviceInfo {
            supports_f32: false,
            ..device()
        };
        assert!(matches!(
            ConfigNegotiator::negotiate(&info, &ConfigurationRequest::new(48_000)),
            Err(NegotiationError::FormatNotSupported)
        ));
    }
}
