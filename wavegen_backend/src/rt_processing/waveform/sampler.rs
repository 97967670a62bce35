use wavegen_core::WaveformKind;

use super::tables::SineLookupTable;

/// Maps a normalized phase to an 8-bit amplitude. Stateless and allocation free.
pub trait SampleWaveform {
    fn sample(self, phase: f64) -> u8;
}

impl SampleWaveform for WaveformKind {
    #[inline]
    fn sample(self, phase: f64) -> u8 {
        match self {
            WaveformKind::Sawtooth => (phase * 255.0) as u8,
            WaveformKind::Sine => SineLookupTable::shared().lookup(phase),
            WaveformKind::Square => {
                if phase >= 0.5 {
                    0xff
                } else {
                    0
                }
            }
            WaveformKind::Triangle => ((1.0 - 2.0 * phase).abs() * 255.0) as u8,
        }
    }
}
