//! This module provides a set of shared, low-level utility functions used
//! throughout the codec layer.
//!
//! Its primary responsibilities include:
//! 1.  Portable bit-scan helpers (zero bytes at either end of a word) built on
//!     the `leading_zeros`/`trailing_zeros` intrinsics.
//! 2.  Explicit little-endian (de)serialization of the retained bytes of a word,
//!     so no byte buffer is ever reinterpreted in place.
//! 3.  Zigzag mapping for native-width unsigned integers.

use num_traits::{PrimInt, Unsigned};

//==================================================================================
// 1. Bit-scan Helpers
//==================================================================================

/// Number of all-zero bytes at the most-significant end of `value` (`width` bytes wide).
#[inline]
pub fn leading_zero_bytes(value: u64, width: u32) -> u32 {
    if value == 0 {
        return width;
    }
    let unused = 64 - width * 8;
    (value.leading_zeros() - unused) / 8
}

/// Number of all-zero bytes at the least-significant end of `value` (`width` bytes wide).
#[inline]
pub fn trailing_zero_bytes(value: u64, width: u32) -> u32 {
    if value == 0 {
        return width;
    }
    value.trailing_zeros() / 8
}

//==================================================================================
// 2. Little-Endian Byte Windows
//==================================================================================

/// Writes bytes `[skip, skip + count)` of `value` in little-endian order into `out`.
#[inline]
pub fn write_le_window(value: u64, skip: usize, count: usize, out: &mut [u8]) {
    let bytes = value.to_le_bytes();
    out[..count].copy_from_slice(&bytes[skip..skip + count]);
}

/// Rebuilds a word from `input` placed at byte offset `skip` (little-endian).
#[inline]
pub fn read_le_window(input: &[u8], skip: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes[skip..skip + input.len()].copy_from_slice(input);
    u64::from_le_bytes(bytes)
}

//==================================================================================
// 3. Zigzag
//==================================================================================

/// Maps a two's-complement value held in an unsigned type so small magnitudes stay small.
#[inline]
pub fn zigzag<T: PrimInt + Unsigned>(value: T) -> T {
    let bits = (std::mem::size_of::<T>() * 8) as u32;
    let negative = (value >> (bits as usize - 1)) != T::zero();
    let mask = if negative { T::max_value() } else { T::zero() };
    (value << 1) ^ mask
}

/// Inverse of `zigzag`.
#[inline]
pub fn unzigzag<T: PrimInt + Unsigned>(value: T) -> T {
    let mask = if value & T::one() != T::zero() {
        T::max_value()
    } else {
        T::zero()
    };
    (value >> 1) ^ mask
}

/// `a < b` with both sides read as two's-complement signed values.
#[inline]
pub fn signed_lt<T: PrimInt + Unsigned>(a: T, b: T) -> bool {
    let bits = std::mem::size_of::<T>() * 8;
    let sign = T::one() << (bits - 1);
    (a ^ sign) < (b ^ sign)
}

//==================================================================================
// 4. Unit Tests
//==================================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_byte_counts() {
        assert_eq!(leading_zero_bytes(0, 4), 4);
        assert_eq!(trailing_zero_bytes(0, 8), 8);
        assert_eq!(leading_zero_bytes(0x0000_00FF, 4), 3);
        assert_eq!(leading_zero_bytes(0x0100_0000, 4), 0);
        assert_eq!(trailing_zero_bytes(0x0100_0000, 4), 3);
        assert_eq!(leading_zero_bytes(0x0000_0000_0001_0000, 8), 5);
        assert_eq!(trailing_zero_bytes(0x4059_0000_0000_0000, 8), 6);
    }

    #[test]
    fn test_le_window_round_trip() {
        let value = 0x4059_0000_0000_0000u64;
        let mut out = [0u8; 8];
        write_le_window(value, 6, 2, &mut out);
        assert_eq!(&out[..2], &[0x59, 0x40]);
        assert_eq!(read_le_window(&out[..2], 6), value);

        write_le_window(0x1234, 0, 2, &mut out);
        assert_eq!(&out[..2], &[0x34, 0x12]);
        assert_eq!(read_le_window(&out[..2], 0), 0x1234);
    }

    #[test]
    fn test_zigzag_small_magnitudes() {
        assert_eq!(zigzag(0u32), 0);
        assert_eq!(zigzag((-1i32) as u32), 1);
        assert_eq!(zigzag(1u32), 2);
        assert_eq!(zigzag((-2i16) as u16), 3);
        for v in [0u64, 1, u64::MAX, 0x8000_0000_0000_0000, 12345] {
            assert_eq!(unzigzag(zigzag(v)), v);
        }
    }

    #[test]
    fn test_signed_lt() {
        assert!(signed_lt(0xFFu8, 0x00));
        assert!(!signed_lt(0x7Fu8, 0x80));
        assert!(signed_lt(1u64, 2));
    }
}
