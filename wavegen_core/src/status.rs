use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use crate::config::{Channel, Configuration, Packing, WaveformKind};

const MAX_WARNINGS: usize = 16;

/// What the operator sees: the active configuration plus recent warnings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub frequency: f64,
    pub sample_rate: u32,
    pub waveform: WaveformKind,
    pub channel: Channel,
    pub packing: Packing,
    pub period_length: f64,
    pub cache_len: usize,
    pub generation: u64,
    pub stopped: bool,
    pub warnings: Vec<String>,
}

impl StatusReport {
    pub fn new(config: &Configuration, cache_len: usize, generation: u64) -> Self {
        Self {
            frequency: config.frequency,
            sample_rate: config.sample_rate,
            waveform: config.waveform,
            channel: config.channel,
            packing: config.packing,
            period_length: config.period_length(),
            cache_len,
            generation,
            stopped: false,
            warnings: Vec::new(),
        }
    }

    pub fn headline(&self) -> String {
        format!(
            "Target frequency: {:.6}Hz  [{} | {} | {}]",
            self.frequency, self.waveform, self.channel, self.packing
        )
    }
}

/// Shared, cloneable view of the latest [`StatusReport`].
///
/// Written by the control side, read by whatever draws the screen. Never
/// touched from the realtime path.
#[derive(Debug, Clone)]
pub struct StatusBoard {
    inner: Arc<RwLock<StatusReport>>,
}

impl StatusBoard {
    pub fn new(report: StatusReport) -> Self {
        Self {
            inner: Arc::new(RwLock::new(report)),
        }
    }

    /// Replace the configuration part of the report, keeping warnings and the stop flag.
    pub fn update(&self, config: &Configuration, cache_len: usize, generation: u64) {
        let mut guard = self.inner.write();
        let warnings = std::mem::take(&mut guard.warnings);
        let stopped = guard.stopped;
        *guard = StatusReport {
            warnings,
            stopped,
            ..StatusReport::new(config, cache_len, generation)
        };
    }

    pub fn warn(&self, message: impl Into<String>) {
        let mut guard = self.inner.write();
        if guard.warnings.len() == MAX_WARNINGS {
            guard.warnings.remove(0);
        }
        guard.warnings.push(message.into());
    }

    pub fn mark_stopped(&self) {
        self.inner.write().stopped = true;
    }

    pub fn latest_warning(&self) -> Option<String> {
        self.inner.read().warnings.last().cloned()
    }

    pub fn report(&self) -> StatusReport {
        self.inner.read().clone()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&*self.inner.read())
    }
}
