use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ParseEnumError, SettingsError, ValidationError};

/// Default DAC sample clock, in samples per second.
pub const DEFAULT_SAMPLE_RATE: u32 = 150_000_000;

/// Samples per lane in one device transfer.
pub const DEVICE_LANE_LEN: usize = 1280 * 1024;

/// Bytes in one device transfer: three lanes worth of samples.
pub const DEVICE_TRANSFER_LEN: usize = DEVICE_LANE_LEN * 3;

/// Largest cache budget accepted from settings, in samples.
pub const MAX_CACHE_BUDGET: usize = 256 * 1024 * 1024;

/// Largest device transfer accepted from settings, in bytes.
pub const MAX_TRANSFER_LEN: usize = DEVICE_TRANSFER_LEN * 16;

/// Highest frequency the legacy ceiling policy accepts, regardless of sample rate.
pub const LEGACY_CEILING_HZ: f64 = 75_000_000.0;

/// The four periodic shapes the engine can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaveformKind {
    Sawtooth,
    Sine,
    Square,
    Triangle,
}

impl WaveformKind {
    pub const ALL: [WaveformKind; 4] = [
        WaveformKind::Sawtooth,
        WaveformKind::Sine,
        WaveformKind::Square,
        WaveformKind::Triangle,
    ];

    pub fn name(self) -> &'static str {
        match self {
            WaveformKind::Sawtooth => "sawtooth",
            WaveformKind::Sine => "sine",
            WaveformKind::Square => "square",
            WaveformKind::Triangle => "triangle",
        }
    }
}

impl fmt::Display for WaveformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WaveformKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "saw" | "sawtooth" => Ok(WaveformKind::Sawtooth),
            "sine" | "sin" => Ok(WaveformKind::Sine),
            "square" | "sq" => Ok(WaveformKind::Square),
            "triangle" | "tri" => Ok(WaveformKind::Triangle),
            _ => Err(ParseEnumError::new("waveform", s)),
        }
    }
}

/// Physical output lane of the DAC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Red,
    Green,
    Blue,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Red, Channel::Green, Channel::Blue];

    pub fn name(self) -> &'static str {
        match self {
            Channel::Red => "red",
            Channel::Green => "green",
            Channel::Blue => "blue",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Channel {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "r" | "red" => Ok(Channel::Red),
            "g" | "green" => Ok(Channel::Green),
            "b" | "blue" => Ok(Channel::Blue),
            _ => Err(ParseEnumError::new("channel", s)),
        }
    }
}

/// Output encoding applied to each amplitude before it is stored or sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Packing {
    /// One amplitude per byte, routed to the selected lane.
    Raw8,
    /// One byte carries the amplitude for all three lanes (3/3/2 bits).
    Packed332,
}

impl Packing {
    pub fn toggled(self) -> Self {
        match self {
            Packing::Raw8 => Packing::Packed332,
            Packing::Packed332 => Packing::Raw8,
        }
    }

    /// Samples the engine must produce to fill one device transfer.
    ///
    /// A raw transfer is split evenly across the three lanes and only the
    /// selected lane is refreshed; a packed transfer is one sample per byte.
    pub fn samples_per_transfer(self, transfer_len: usize) -> usize {
        match self {
            Packing::Raw8 => transfer_len / 3,
            Packing::Packed332 => transfer_len,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Packing::Raw8 => "raw8",
            Packing::Packed332 => "rgb332",
        }
    }
}

impl fmt::Display for Packing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Packing {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "raw" | "raw8" => Ok(Packing::Raw8),
            "332" | "rgb332" | "packed332" | "packed" => Ok(Packing::Packed332),
            _ => Err(ParseEnumError::new("packing", s)),
        }
    }
}

/// Upper bound applied to operator frequencies.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FrequencyPolicy {
    /// At most half the sample rate.
    #[default]
    Nyquist,
    /// A fixed hardware ceiling, independent of the sample rate.
    Ceiling { max_hz: f64 },
}

impl FrequencyPolicy {
    pub fn legacy() -> Self {
        FrequencyPolicy::Ceiling {
            max_hz: LEGACY_CEILING_HZ,
        }
    }

    pub fn max_frequency(self, sample_rate: u32) -> f64 {
        match self {
            FrequencyPolicy::Nyquist => sample_rate as f64 / 2.0,
            FrequencyPolicy::Ceiling { max_hz } => max_hz,
        }
    }
}

/// One complete, immutable set of synthesis parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    pub frequency: f64,
    pub sample_rate: u32,
    pub waveform: WaveformKind,
    pub channel: Channel,
    pub packing: Packing,
}

impl Configuration {
    /// Samples per waveform cycle, not rounded.
    pub fn period_length(&self) -> f64 {
        self.sample_rate as f64 / self.frequency
    }

    pub fn with_frequency(self, frequency: f64) -> Self {
        Self { frequency, ..self }
    }

    pub fn with_waveform(self, waveform: WaveformKind) -> Self {
        Self { waveform, ..self }
    }

    pub fn with_channel(self, channel: Channel) -> Self {
        Self { channel, ..self }
    }

    pub fn with_packing(self, packing: Packing) -> Self {
        Self { packing, ..self }
    }

    /// Check the frequency against `policy` and make sure a period spans at
    /// least one whole sample.
    pub fn validate(&self, policy: FrequencyPolicy) -> Result<(), ValidationError> {
        if !self.frequency.is_finite() || self.frequency <= 0.0 {
            return Err(ValidationError::InvalidFrequency(self.frequency));
        }

        let limit = policy.max_frequency(self.sample_rate);
        if self.frequency > limit {
            return Err(ValidationError::FrequencyAboveLimit {
                frequency: self.frequency,
                limit,
                sample_rate: self.sample_rate,
            });
        }

        let period_length = self.period_length();
        if period_length < 1.0 {
            return Err(ValidationError::PeriodTooShort { period_length });
        }

        Ok(())
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.3} Hz {} on {} ({}) @ {} S/s",
            self.frequency, self.waveform, self.channel, self.packing, self.sample_rate
        )
    }
}

/// Startup settings for the engine. Fixed for the life of the process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub sample_rate: u32,
    /// Bytes the device pulls per callback.
    pub transfer_len: usize,
    /// Target number of samples kept precomputed, before period folding.
    pub cache_budget: usize,
    pub frequency_policy: FrequencyPolicy,
    pub frequency: f64,
    pub waveform: WaveformKind,
    pub channel: Channel,
    pub packing: Packing,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            transfer_len: DEVICE_TRANSFER_LEN,
            cache_budget: DEVICE_LANE_LEN * 10,
            frequency_policy: FrequencyPolicy::Nyquist,
            frequency: 1_000_000.0,
            waveform: WaveformKind::Sine,
            channel: Channel::Red,
            packing: Packing::Packed332,
        }
    }
}

impl EngineSettings {
    pub fn from_json_str(json: &str) -> Result<Self, SettingsError> {
        let settings: EngineSettings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn initial_configuration(&self) -> Configuration {
        Configuration {
            frequency: self.frequency,
            sample_rate: self.sample_rate,
            waveform: self.waveform,
            channel: self.channel,
            packing: self.packing,
        }
    }

    /// Largest request the device can make in any packing mode.
    pub fn max_request_len(&self) -> usize {
        Packing::Raw8
            .samples_per_transfer(self.transfer_len)
            .max(Packing::Packed332.samples_per_transfer(self.transfer_len))
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.sample_rate == 0 {
            return Err(SettingsError::Invalid("sample rate must be non-zero".into()));
        }
        if self.transfer_len == 0 || self.transfer_len % 3 != 0 {
            return Err(SettingsError::Invalid(format!(
                "transfer length {} must be a non-zero multiple of 3",
                self.transfer_len
            )));
        }
        if self.transfer_len > MAX_TRANSFER_LEN {
            return Err(SettingsError::Invalid(format!(
                "transfer length {} exceeds the maximum of {} bytes",
                self.transfer_len, MAX_TRANSFER_LEN
            )));
        }
        if self.cache_budget == 0 {
            return Err(SettingsError::Invalid("cache budget must be non-zero".into()));
        }
        // The cache stores up to one budget plus a request-sized tail.
        if self.cache_budget > MAX_CACHE_BUDGET || self.cache_budget.checked_add(self.max_request_len()).is_none() {
            return Err(SettingsError::Invalid(format!(
                "cache budget {} exceeds the maximum of {} samples",
                self.cache_budget, MAX_CACHE_BUDGET
            )));
        }
        if let FrequencyPolicy::Ceiling { max_hz } = self.frequency_policy {
            if !max_hz.is_finite() || max_hz <= 0.0 {
                return Err(SettingsError::Invalid(format!(
                    "frequency ceiling {max_hz} must be a positive number of hertz"
                )));
            }
        }
        self.initial_configuration()
            .validate(self.frequency_policy)
            .map_err(SettingsError::InitialConfiguration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(frequency: f64) -> Configuration {
        Configuration {
            frequency,
            sample_rate: 150_000_000,
            waveform: WaveformKind::Sine,
            channel: Channel::Red,
            packing: Packing::Raw8,
        }
    }

    #[test]
    fn test_nyquist_boundary() {
        let policy = FrequencyPolicy::Nyquist;
        assert!(config(75_000_000.0).validate(policy).is_ok());
        assert!(matches!(
            config(75_000_001.0).validate(policy),
            Err(ValidationError::FrequencyAboveLimit { .. })
        ));
        assert!(matches!(
            config(0.0).validate(policy),
            Err(ValidationError::InvalidFrequency(_))
        ));
        assert!(matches!(
            config(-10.0).validate(policy),
            Err(ValidationError::InvalidFrequency(_))
        ));
        assert!(config(f64::NAN).validate(policy).is_err());
        assert!(config(f64::INFINITY).validate(policy).is_err());
    }

    #[test]
    fn test_legacy_ceiling_rejects_sub_sample_periods() {
        let slow = Configuration {
            sample_rate: 48_000,
            ..config(1_000.0)
        };
        let policy = FrequencyPolicy::legacy();
        assert!(slow.validate(policy).is_ok());
        // Allowed by the ceiling but shorter than a sample at this rate.
        assert!(matches!(
            slow.with_frequency(100_000.0).validate(policy),
            Err(ValidationError::PeriodTooShort { .. })
        ));
        assert!(matches!(
            config(80_000_000.0).validate(policy),
            Err(ValidationError::FrequencyAboveLimit { .. })
        ));
    }

    #[test]
    fn test_period_length() {
        assert_eq!(config(1_000_000.0).period_length(), 150.0);
        assert_eq!(config(75_000_000.0).period_length(), 2.0);
    }

    #[test]
    fn test_samples_per_transfer() {
        assert_eq!(Packing::Raw8.samples_per_transfer(3072), 1024);
        assert_eq!(Packing::Packed332.samples_per_transfer(3072), 3072);
        assert_eq!(Packing::Raw8.toggled(), Packing::Packed332);
    }

    #[test]
    fn test_parse_enums() {
        assert_eq!("Saw".parse::<WaveformKind>().unwrap(), WaveformKind::Sawtooth);
        assert_eq!("tri".parse::<WaveformKind>().unwrap(), WaveformKind::Triangle);
        assert_eq!("G".parse::<Channel>().unwrap(), Channel::Green);
        assert_eq!("rgb332".parse::<Packing>().unwrap(), Packing::Packed332);
        assert!("purple".parse::<Channel>().is_err());
    }

    #[test]
    fn test_default_settings_are_valid() {
        let settings = EngineSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.max_request_len(), DEVICE_TRANSFER_LEN);
    }

    #[test]
    fn test_settings_from_partial_json() {
        let settings = EngineSettings::from_json_str(
            r#"{ "sample_rate": 48000, "transfer_len": 3072, "frequency": 440.0,
                 "waveform": "triangle", "frequency_policy": { "kind": "nyquist" } }"#,
        )
        .unwrap();
        assert_eq!(settings.sample_rate, 48_000);
        assert_eq!(settings.waveform, WaveformKind::Triangle);
        assert_eq!(settings.channel, Channel::Red);
        assert_eq!(settings.cache_budget, DEVICE_LANE_LEN * 10);
    }

    #[test]
    fn test_settings_reject_bad_transfer_len() {
        let err = EngineSettings::from_json_str(r#"{ "transfer_len": 1000 }"#).unwrap_err();
        assert!(matches!(err, SettingsError::Invalid(_)));

        let err = EngineSettings::from_json_str(r#"{ "sample_rate": 1000, "frequency": 900.0 }"#)
            .unwrap_err();
        assert!(matches!(err, SettingsError::InitialConfiguration(_)));
    }

    #[test]
    fn test_settings_reject_oversized_buffers() {
        let huge_cache = EngineSettings {
            cache_budget: usize::MAX,
            ..EngineSettings::default()
        };
        assert!(matches!(huge_cache.validate(), Err(SettingsError::Invalid(_))));

        let too_big = EngineSettings {
            cache_budget: 1_000_000_000_000,
            ..EngineSettings::default()
        };
        assert!(matches!(too_big.validate(), Err(SettingsError::Invalid(_))));

        let at_limit = EngineSettings {
            cache_budget: MAX_CACHE_BUDGET,
            ..EngineSettings::default()
        };
        assert!(at_limit.validate().is_ok());

        let huge_transfer = EngineSettings {
            transfer_len: usize::MAX / 3 * 3,
            ..EngineSettings::default()
        };
        assert!(matches!(huge_transfer.validate(), Err(SettingsError::Invalid(_))));
    }
}
