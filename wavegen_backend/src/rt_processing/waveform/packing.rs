//! Output encodings applied after sampling.
//!
//! RGB332 layout, most significant bit first: `RRRGGGBB`.

use wavegen_core::{Channel, Packing};

const RED_SHIFT: u8 = 5;
const GREEN_SHIFT: u8 = 2;

/// Encode one amplitude for storage in a cache or scratch buffer.
#[inline]
pub fn encode(packing: Packing, amplitude: u8) -> u8 {
    match packing {
        Packing::Raw8 => amplitude,
        Packing::Packed332 => pack_332(amplitude, amplitude, amplitude),
    }
}

/// Quantize three lane amplitudes into one byte, keeping the top bits of each.
#[inline]
pub const fn pack_332(red: u8, green: u8, blue: u8) -> u8 {
    ((red >> 5) << RED_SHIFT) | ((green >> 5) << GREEN_SHIFT) | (blue >> 6)
}

/// Recover a lane's amplitude from a packed byte, scaled back to 8 bits.
#[inline]
pub fn unpack_lane(byte: u8, channel: Channel) -> u8 {
    match channel {
        Channel::Red => (byte >> RED_SHIFT) << 5,
        Channel::Green => ((byte >> GREEN_SHIFT) & 0b111) << 5,
        Channel::Blue => (byte & 0b11) << 6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_is_identity() {
        for amplitude in 0..=255u8 {
            assert_eq!(encode(Packing::Raw8, amplitude), amplitude);
        }
    }

    #[test]
    fn test_full_scale_and_zero() {
        assert_eq!(encode(Packing::Packed332, 0xff), 0xff);
        assert_eq!(encode(Packing::Packed332, 0), 0);
    }

    #[test]
    fn test_packed_lanes_track_amplitude() {
        for amplitude in 0..=255u8 {
            let byte = encode(Packing::Packed332, amplitude);
            assert_eq!(unpack_lane(byte, Channel::Red), amplitude & 0xe0);
            assert_eq!(unpack_lane(byte, Channel::Green), amplitude & 0xe0);
            assert_eq!(unpack_lane(byte, Channel::Blue), amplitude & 0xc0);
        }
    }

    #[test]
    fn test_lanes_are_independent() {
        let byte = pack_332(0xff, 0, 0x40);
        assert_eq!(byte, 0b1110_0001);
        assert_eq!(unpack_lane(byte, Channel::Red), 0xe0);
        assert_eq!(unpack_lane(byte, Channel::Green), 0);
        assert_eq!(unpack_lane(byte, Channel::Blue), 0x40);
    }
}
