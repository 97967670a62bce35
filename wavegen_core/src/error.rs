use thiserror::Error;

/// An operator request the engine refused. The previous configuration stays active.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("frequency must be a positive number of hertz, got {0}")]
    InvalidFrequency(f64),

    #[error("frequency {frequency} Hz exceeds the {limit} Hz limit at {sample_rate} S/s")]
    FrequencyAboveLimit {
        frequency: f64,
        limit: f64,
        sample_rate: u32,
    },

    #[error("period of {period_length:.3} samples is shorter than one sample")]
    PeriodTooShort { period_length: f64 },
}

/// Faults on the device side of the stream. All of them end transmission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("device reported a transmission fault")]
    TransmissionFault,

    #[error("device requested {requested} samples, engine can serve at most {capacity}")]
    OversizedRequest { requested: usize, capacity: usize },

    #[error("audio backend: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid settings: {0}")]
    Invalid(String),

    #[error("invalid initial configuration: {0}")]
    InitialConfiguration(#[source] ValidationError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {what} `{value}`")]
pub struct ParseEnumError {
    what: &'static str,
    value: String,
}

impl ParseEnumError {
    pub(crate) fn new(what: &'static str, value: &str) -> Self {
        Self {
            what,
            value: value.to_owned(),
        }
    }
}
