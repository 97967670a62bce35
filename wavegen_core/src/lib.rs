//! Domain types shared by the waveform engine and its front ends.
//!
//! Nothing in this crate touches a device or a thread: it describes what the
//! operator can ask for ([`Configuration`], [`Command`]), how those requests
//! can fail ([`ValidationError`]), and how the engine is set up at startup
//! ([`EngineSettings`]).

pub mod command;
pub mod config;
pub mod error;
pub mod status;

pub use command::{Command, FrequencyStep, round_frequency};
pub use config::{Channel, Configuration, EngineSettings, FrequencyPolicy, Packing, WaveformKind};
pub use error::{DeviceError, ParseEnumError, SettingsError, ValidationError};
pub use status::{StatusBoard, StatusReport};
