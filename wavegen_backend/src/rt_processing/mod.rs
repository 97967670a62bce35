pub mod cache;
pub mod callback;
pub mod performance;
pub mod phase;
pub mod snapshot;
pub mod supplier;
pub mod waveform;
