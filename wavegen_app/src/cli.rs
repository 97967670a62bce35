use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use wavegen_core::{Channel, EngineSettings, FrequencyPolicy, Packing, WaveformKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DeviceKind {
    /// Paced software DAC, no hardware needed
    Simulated,
    /// Play the selected lane through a sound card
    Audio,
}

#[derive(Debug, Parser)]
#[command(name = "wavegen")]
#[command(version, about = "Realtime waveform generator for streaming DACs", long_about = None)]
pub struct Cli {
    /// JSON settings file; flags below override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Device sample rate in samples per second
    #[arg(short = 's', long)]
    pub sample_rate: Option<u32>,

    /// Bytes the device pulls per transfer (multiple of 3)
    #[arg(long)]
    pub transfer_len: Option<usize>,

    /// Samples kept precomputed per configuration
    #[arg(long)]
    pub cache_budget: Option<usize>,

    /// Initial frequency in Hz
    #[arg(short, long)]
    pub frequency: Option<f64>,

    /// Initial waveform: sine, square, saw, triangle
    #[arg(short, long)]
    pub waveform: Option<WaveformKind>,

    /// Initial output lane: red, green, blue
    #[arg(long)]
    pub channel: Option<Channel>,

    /// Initial packing: raw8 or rgb332
    #[arg(long)]
    pub packing: Option<Packing>,

    /// Cap frequencies at 75 MHz instead of half the sample rate
    #[arg(long)]
    pub legacy_ceiling: bool,

    #[arg(short, long, value_enum, default_value_t = DeviceKind::Simulated)]
    pub device: DeviceKind,

    /// Output device name for `--device audio` (partial match)
    #[arg(long)]
    pub audio_device: Option<String>,

    /// List audio output devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// More logging (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Print the final status as JSON on exit
    #[arg(long)]
    pub status_json: bool,
}

impl Cli {
    /// Settings from `--config` (or defaults) with command line overrides applied.
    pub fn settings(&self) -> anyhow::Result<EngineSettings> {
        let mut settings = match &self.config {
            Some(path) => EngineSettings::from_json_file(path)
                .with_context(|| format!("loading settings from {}", path.display()))?,
            None => EngineSettings::default(),
        };

        if let Some(rate) = self.sample_rate {
            settings.sample_rate = rate;
        }
        if let Some(len) = self.transfer_len {
            settings.transfer_len = len;
        }
        if let Some(budget) = self.cache_budget {
            settings.cache_budget = budget;
        }
        if let Some(frequency) = self.frequency {
            settings.frequency = frequency;
        }
        if let Some(waveform) = self.waveform {
            settings.waveform = waveform;
        }
        if let Some(channel) = self.channel {
            settings.channel = channel;
        }
        if let Some(packing) = self.packing {
            settings.packing = packing;
        }
        if self.legacy_ceiling {
            settings.frequency_policy = FrequencyPolicy::legacy();
        }

        Ok(settings)
    }

    pub fn log_level(&self) -> tracing::Level {
        match self.verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            _ => tracing::Level::DEBUG,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_engine_defaults() {
        let cli = Cli::parse_from(["wavegen"]);
        assert_eq!(cli.settings().unwrap(), EngineSettings::default());
        assert_eq!(cli.device, DeviceKind::Simulated);
        assert_eq!(cli.log_level(), tracing::Level::WARN);
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::parse_from([
            "wavegen",
            "--sample-rate",
            "100000000",
            "-f",
            "2500000",
            "-w",
            "triangle",
            "--channel",
            "g",
            "--packing",
            "raw8",
            "--legacy-ceiling",
            "-d",
            "audio",
            "-vv",
        ]);
        let settings = cli.settings().unwrap();
        assert_eq!(settings.sample_rate, 100_000_000);
        assert_eq!(settings.frequency, 2_500_000.0);
        assert_eq!(settings.waveform, WaveformKind::Triangle);
        assert_eq!(settings.channel, Channel::Green);
        assert_eq!(settings.packing, Packing::Raw8);
        assert_eq!(settings.frequency_policy, FrequencyPolicy::legacy());
        assert_eq!(cli.device, DeviceKind::Audio);
        assert_eq!(cli.log_level(), tracing::Level::DEBUG);
    }

    #[test]
    fn test_rejects_unknown_waveform() {
        assert!(Cli::try_parse_from(["wavegen", "-w", "noise"]).is_err());
    }
}
