//! Sample-counting phase accumulator.
//!
//! Phase is never accumulated as a float. It is derived from an integer sample
//! index each time it is needed, so long runs do not drift and any two paths
//! that agree on the index agree on the sample.

/// Whole samples per period used for modulo arithmetic. Never zero.
#[inline]
pub fn fold_period(period_length: f64) -> u64 {
    (period_length.floor() as u64).max(1)
}

/// Phase in [0, 1) of the sample at `position` within a folded period.
#[inline]
pub fn phase_at(position: u64, period_length: f64) -> f64 {
    position as f64 / period_length
}

#[derive(Debug, Clone)]
pub struct PhaseClock {
    sample_index: u64,
    period_length: f64,
    period_samples: u64,
}

impl PhaseClock {
    pub fn new(period_length: f64) -> Self {
        Self {
            sample_index: 0,
            period_length,
            period_samples: fold_period(period_length),
        }
    }

    /// Switch to a new period while keeping the running sample count.
    pub fn retune(&mut self, period_length: f64) {
        self.period_length = period_length;
        self.period_samples = fold_period(period_length);
    }

    pub fn sample_index(&self) -> u64 {
        self.sample_index
    }

    pub fn period_length(&self) -> f64 {
        self.period_length
    }

    pub fn period_samples(&self) -> u64 {
        self.period_samples
    }

    /// Position of the current sample within its period.
    #[inline]
    pub fn position(&self) -> u64 {
        self.sample_index % self.period_samples
    }

    #[inline]
    pub fn phase(&self) -> f64 {
        phase_at(self.position(), self.period_length)
    }

    /// Move forward by `n` samples and return the new phase.
    #[inline]
    pub fn advance(&mut self, n: u64) -> f64 {
        self.sample_index = self.sample_index.wrapping_add(n);
        self.phase()
    }
}
