use cpal::traits::{DeviceTrait, HostTrait};
use std::fmt;

/// Output device capabilities relevant to running the engine on it.
#[derive(Clone, Debug)]
pub struct DeviceInfo {
    pub name: String,
    pub is_default: bool,

    pub min_sample_rate: u32,
    pub max_sample_rate: u32,
    pub default_sample_rate: u32,

    pub max_channels: u16,
    pub default_channels: u16,
    pub supports_f32: bool,

    pub(crate) device_index: usize,
}

impl DeviceInfo {
    pub fn supports_sample_rate(&self, rate: u32) -> bool {
        rate >= self.min_sample_rate && rate <= self.max_sample_rate
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}ch @ {}Hz, {}-{}Hz{}]",
            self.name,
            self.default_channels,
            self.default_sample_rate,
            self.min_sample_rate,
            self.max_sample_rate,
            if self.is_default { ", default" } else { "" }
        )
    }
}

pub type EnumResult<T> = Result<T, EnumError>;

#[derive(Debug)]
pub enum EnumError {
    NoDevicesFound,
    DeviceNotFound(String),
    QueryFailed(String),
}

impl fmt::Display for EnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoDevicesFound => write!(f, "No audio output devices found"),
            Self::DeviceNotFound(name) => write!(f, "Device not found: {}", name),
            Self::QueryFailed(msg) => write!(f, "Device query failed: {}", msg),
        }
    }
}

impl std::error::Error for EnumError {}

/// Output devices of the default audio host.
pub struct DeviceEnumerator {
    devices: Vec<(cpal::Device, DeviceInfo)>,
}

impl DeviceEnumerator {
    pub fn new() -> EnumResult<Self> {
        let host = cpal::default_host();
        let default_name = host.default_output_device().and_then(|d| d.name().ok());

        let outputs = host
            .output_devices()
            .map_err(|e| EnumError::QueryFailed(format!("Failed to list output devices: {}", e)))?;

        let mut devices = Vec::new();
        for device in outputs {
            let index = devices.len();
            // Devices that cannot describe themselves are skipped rather than failing the scan.
            if let Ok(info) = Self::query_device_info(&device, default_name.as_deref(), index) {
                devices.push((device, info));
            }
        }

        if devices.is_empty() {
            return Err(EnumError::NoDevicesFound);
        }

        Ok(Self { devices })
    }

    fn query_device_info(device: &cpal::Device, default_name: Option<&str>, device_index: usize) -> EnumResult<DeviceInfo> {
        let name = device.name()
            .map_err(|e| EnumError::QueryFailed(format!("Failed to get device name: {}", e)))?;

        let default_config = device.default_output_config()
            .map_err(|e| EnumError::QueryFailed(format!("Failed to get default config: {}", e)))?;

        let configs = device.supported_output_configs()
            .map_err(|e| EnumError::QueryFailed(format!("Failed to get supported configs: {}", e)))?;

        let mut min_sample_rate = u32::MAX;
        let mut max_sample_rate = 0u32;
        let mut max_channels = 0u16;
        let mut supports_f32 = false;
        for range in configs {
            min_sample_rate = min_sample_rate.min(range.min_sample_rate().0);
            max_sample_rate = max_sample_rate.max(range.max_sample_rate().0);
            max_channels = max_channels.max(range.channels());
            supports_f32 |= range.sample_format() == cpal::SampleFormat::F32;
        }

        let default_sample_rate = default_config.sample_rate().0;
        if max_sample_rate == 0 {
            min_sample_rate = default_sample_rate;
            max_sample_rate = default_sample_rate;
        }

        Ok(DeviceInfo {
            is_default: default_name == Some(name.as_str()),
            name,
            min_sample_rate,
            max_sample_rate,
            default_sample_rate,
            max_channels: max_channels.max(default_config.channels()),
            default_channels: default_config.channels(),
            supports_f32: supports_f32 || default_config.sample_format() == cpal::SampleFormat::F32,
            device_index,
        })
    }

    pub fn output_devices(&self) -> Vec<&DeviceInfo> {
        self.devices.iter().map(|(_, info)| info).collect()
    }

    pub fn default_output_device(&self) -> EnumResult<&DeviceInfo> {
        self.devices
            .iter()
            .map(|(_, info)| info)
            .find(|info| info.is_default)
            .or_else(|| self.devices.first().map(|(_, info)| info))
            .ok_or(EnumError::NoDevicesFound)
    }

    /// Find a device by name (case-insensitive, exact match preferred over partial)
    pub fn find_device_by_name(&self, name: &str) -> EnumResult<&DeviceInfo> {
        let name_lower = name.to_lowercase();

        if let Some(info) = self.devices
            .iter()
            .map(|(_, info)| info)
            .find(|info| info.name.to_lowercase() == name_lower)
        {
            return Ok(info);
        }

        self.devices
            .iter()
            .map(|(_, info)| info)
            .find(|info| info.name.to_lowercase().contains(&name_lower))
            .ok_or_else(|| EnumError::DeviceNotFound(name.to_string()))
    }

    /// `name` if given, otherwise the host default.
    pub fn resolve(&self, name: Option<&str>) -> EnumResult<&DeviceInfo> {
        match name {
            Some(name) => self.find_device_by_name(name),
            None => self.default_output_device(),
        }
    }

    /// Select a device and return the actual CPAL device handle
    pub fn select_device(&self, device_info: &DeviceInfo) -> EnumResult<&cpal::Device> {
        self.devices
            .iter()
            .find(|(_, info)| info.device_index == device_info.device_index)
            .map(|(device, _)| device)
            .ok_or_else(|| EnumError::DeviceNotFound(device_info.name.clone()))
    }

    pub fn print_device_list(&self) {
        println!("Output Devices:");
        for (idx, device) in self.output_devices().iter().enumerate() {
            println!("  [{}] {}", idx, device);
            println!("      Channels: {} (max: {})", device.default_channels, device.max_channels);
        }
    }
}
