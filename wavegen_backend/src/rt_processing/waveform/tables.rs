use std::f64::consts::PI;
use std::sync::OnceLock;

// Fine enough that the index quantization is below one output LSB.
pub const SINE_TABLE_SIZE: usize = 10_000;

// Static lookup table - initialized once, used everywhere
static SINE_TABLE: OnceLock<SineLookupTable> = OnceLock::new();

/// One full sine cycle quantized to unsigned 8-bit amplitudes centered on 128.
pub struct SineLookupTable {
    entries: Box<[u8]>,
}

impl SineLookupTable {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let entries = (0..size)
            .map(|i| ((2.0 * PI * i as f64 / size as f64).sin() * 127.0 + 128.0).round() as u8)
            .collect();
        Self { entries }
    }

    /// The process-wide table, built on first use.
    pub fn shared() -> &'static SineLookupTable {
        SINE_TABLE.get_or_init(|| SineLookupTable::new(SINE_TABLE_SIZE))
    }

    /// Non-interpolated lookup. Phase should be normalized to [0.0, 1.0).
    #[inline]
    pub fn lookup(&self, phase: f64) -> u8 {
        let index = (phase * self.entries.len() as f64) as usize;
        self.entries[index.min(self.entries.len() - 1)]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Build the shared tables ahead of the first realtime callback.
pub fn init_tables() {
    let _ = SineLookupTable::shared();
}
