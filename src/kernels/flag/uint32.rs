//! The UInt32 flag format.
//!
//! Descriptor nibble: `count << 1 | leading`, where `count` (0..=4) is the
//! number of stored bytes and `leading` says they are the word's high bytes.
//! A flag byte whose top three bits are 5, 6 or 7 is an RLE byte for 3..=98 zeros.

use super::{FlagFormat, Window};
use crate::utils::{leading_zero_bytes, trailing_zero_bytes};

const WIDTH: u32 = 4;
const RLE_BASE: u8 = 5;
const MIN_RUN: u32 = 3;

#[derive(Debug, Clone, Copy, Default)]
pub struct Flag32;

impl FlagFormat for Flag32 {
    type Word = u32;

    const NAME: &'static str = "flag32";
    const MAX_RUN: u32 = 98;

    #[inline]
    fn classify(value: u32) -> (u8, Window) {
        let value = value as u64;
        let low = WIDTH - leading_zero_bytes(value, WIDTH);
        let high = WIDTH - trailing_zero_bytes(value, WIDTH);
        if high < low {
            ((high as u8) << 1 | 1, Window::new((WIDTH - high) as usize, high as usize))
        } else {
            ((low as u8) << 1, Window::new(0, low as usize))
        }
    }

    #[inline]
    fn window(nibble: u8) -> Option<Window> {
        let count = (nibble >> 1) as usize;
        if count > WIDTH as usize {
            return None;
        }
        let skip = if nibble & 1 == 1 { WIDTH as usize - count } else { 0 };
        Some(Window::new(skip, count))
    }

    #[inline]
    fn run_length(flag: u8) -> Option<u32> {
        let top = flag >> 5;
        if top < RLE_BASE {
            return None;
        }
        Some((top - RLE_BASE) as u32 * 32 + (flag & 0x1F) as u32 + MIN_RUN)
    }

    #[inline]
    fn run_flag(run: u32) -> u8 {
        debug_assert!((MIN_RUN..=Self::MAX_RUN).contains(&run));
        let k = run - MIN_RUN;
        ((RLE_BASE + (k / 32) as u8) << 5) | (k % 32) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_picks_fewer_bytes() {
        assert_eq!(Flag32::classify(0), (0, Window::new(0, 0)));
        assert_eq!(Flag32::classify(5), (2, Window::new(0, 1)));
        assert_eq!(Flag32::classify(0x0100_0000), (3, Window::new(3, 1)));
        assert_eq!(Flag32::classify(0x0001_0000), (5, Window::new(2, 2)));
        // Three bytes either way: ties keep the low bytes.
        assert_eq!(Flag32::classify(0x00FF_FF00), (6, Window::new(0, 3)));
        assert_eq!(Flag32::classify(0xFFFF_FFFF), (8, Window::new(0, 4)));
    }

    #[test]
    fn test_rle_bytes() {
        assert_eq!(Flag32::run_flag(3), 0xA0);
        assert_eq!(Flag32::run_flag(98), 0xFF);
        assert_eq!(Flag32::run_flag(35), 0xC0);
        for run in 3..=98 {
            assert_eq!(Flag32::run_length(Flag32::run_flag(run)), Some(run));
        }
        // The largest pair byte (two full leading words) is not a run.
        assert_eq!(Flag32::run_length(0x99), None);
    }
}
