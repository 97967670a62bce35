use crate::config::{Channel, Packing, WaveformKind};

/// Discrete operator requests. Each one maps to a single controller operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    SetFrequency(f64),
    Step(FrequencyStep),
    RoundFrequency,
    SetWaveform(WaveformKind),
    SetChannel(Channel),
    SetPacking(Packing),
    TogglePacking,
}

/// Relative frequency nudges: 1% fine steps and 10% coarse steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrequencyStep {
    FineUp,
    FineDown,
    CoarseUp,
    CoarseDown,
}

impl FrequencyStep {
    const FINE: f64 = 1.01;
    const COARSE: f64 = 1.1;

    pub fn apply(self, frequency: f64) -> f64 {
        match self {
            FrequencyStep::FineUp => frequency * Self::FINE,
            FrequencyStep::FineDown => frequency / Self::FINE,
            FrequencyStep::CoarseUp => frequency * Self::COARSE,
            FrequencyStep::CoarseDown => frequency / Self::COARSE,
        }
    }
}

/// Round a frequency down to a "nicer" value.
///
/// The integer part is truncated and its trailing decimal zeros counted (up to
/// seven). The value is then floored to a multiple of the next power of ten,
/// so repeated rounding strips one more significant digit each time:
/// 1 234 567 → 1 234 560 → 1 234 500 → … Returns `None` once the result
/// would be zero.
pub fn round_frequency(frequency: f64) -> Option<f64> {
    if !frequency.is_finite() || frequency < 1.0 {
        return None;
    }

    let truncated = frequency as u64;
    let zeroes = (1..=7u32)
        .filter(|&exp| truncated % 10u64.pow(exp) == 0)
        .count() as u32;
    let round_to = 10u64.pow(zeroes + 1);
    let rounded = truncated / round_to * round_to;

    (rounded > 0).then_some(rounded as f64)
}
