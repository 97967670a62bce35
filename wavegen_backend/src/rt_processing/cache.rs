//! Precomputed waveform for one configuration.
//!
//! The stored samples cover `span` positions (a whole number of periods) plus
//! a tail as long as the largest device request. The value at any absolute
//! sample index `k` only depends on `k mod period`, so a slice starting at
//! `k mod span` is always the continuation of the stream, including across
//! the wrap from the end of the span back to its start.
//!
//! When one period is longer than the budget, the span is a single period and
//! only its first `budget` samples are stored. Requests that do not fit are
//! synthesized by the supplier.

use wavegen_core::Configuration;

use super::phase::{fold_period, phase_at};
use super::waveform::{SampleWaveform, encode};

#[derive(Debug, Clone, PartialEq)]
pub struct WaveformCache {
    samples: Box<[u8]>,
    span: u64,
    period_samples: u64,
}

impl WaveformCache {
    /// Synthesize the cache for `config`.
    ///
    /// `budget` is the target sample count before folding to whole periods,
    /// `tail` the largest request that must be servable from any offset.
    pub fn generate(config: &Configuration, budget: usize, tail: usize) -> Self {
        let period_length = config.period_length();
        let period_samples = fold_period(period_length);
        let budget = budget.max(1) as u64;

        let (span, stored) = if period_samples <= budget {
            let span = budget / period_samples * period_samples;
            (span, span as usize + tail)
        } else {
            (period_samples, budget as usize)
        };

        let mut samples = vec![0u8; stored].into_boxed_slice();
        fill(&mut samples, config, 0);

        Self {
            samples,
            span,
            period_samples,
        }
    }

    /// Length of the repeating section, always a multiple of the folded period.
    pub fn span(&self) -> u64 {
        self.span
    }

    pub fn period_samples(&self) -> u64 {
        self.period_samples
    }

    /// True when the span holds at least one complete period.
    pub fn is_folded(&self) -> bool {
        self.samples.len() as u64 >= self.span
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.samples
    }

    /// Offset into the cache at which the sample with absolute index `sample_index` lives.
    #[inline]
    pub fn offset_for(&self, sample_index: u64) -> usize {
        (sample_index % self.span) as usize
    }

    /// Contiguous run of `len` samples starting at absolute `sample_index`, if stored.
    #[inline]
    pub fn slice_at(&self, sample_index: u64, len: usize) -> Option<&[u8]> {
        let start = self.offset_for(sample_index);
        let end = start.checked_add(len)?;
        self.samples.get(start..end)
    }
}

/// Write the samples for absolute indices `first..first + out.len()` into `out`.
///
/// Shared by cache generation and the supplier's fallback path so both produce
/// identical bytes for the same index.
#[inline]
pub fn fill(out: &mut [u8], config: &Configuration, first: u64) {
    let period_length = config.period_length();
    let period_samples = fold_period(period_length);
    let mut position = first % period_samples;

    for slot in out.iter_mut() {
        *slot = encode(config.packing, config.waveform.sample(phase_at(position, period_length)));
        position += 1;
        if position == period_samples {
            position = 0;
        }
    }
}
