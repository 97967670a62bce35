pub mod packing;
pub mod sampler;
pub mod tables;

pub use packing::{encode, pack_332, unpack_lane};
pub use sampler::SampleWaveform;
pub use tables::{SineLookupTable, init_tables};
