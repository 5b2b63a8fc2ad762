//! The UInt64 flag format.
//!
//! Descriptor nibble: `leading << 3 | (count - 1)` with `count` in 1..=8, so
//! a zero word still stores one `0x00` byte. A high nibble of `0xF` would mean
//! "eight leading bytes", which the tie rule never produces, so flag bytes
//! `0xF0..=0xFF` are RLE bytes for 1..=16 zeros (the encoder emits 3 or more).

use super::{FlagFormat, Window};
use crate::utils::{leading_zero_bytes, trailing_zero_bytes};

const WIDTH: u32 = 8;

#[derive(Debug, Clone, Copy, Default)]
pub struct Flag64;

impl FlagFormat for Flag64 {
    type Word = u64;

    const NAME: &'static str = "flag64";
    const MAX_RUN: u32 = 16;

    #[inline]
    fn classify(value: u64) -> (u8, Window) {
        if value == 0 {
            return (0, Window::new(0, 1));
        }
        let low = WIDTH - leading_zero_bytes(value, WIDTH);
        let high = WIDTH - trailing_zero_bytes(value, WIDTH);
        if high < low {
            (0x8 | (high as u8 - 1), Window::new((WIDTH - high) as usize, high as usize))
        } else {
            (low as u8 - 1, Window::new(0, low as usize))
        }
    }

    #[inline]
    fn window(nibble: u8) -> Option<Window> {
        let count = (nibble & 0x7) as usize + 1;
        let skip = if nibble & 0x8 != 0 { WIDTH as usize - count } else { 0 };
        Some(Window::new(skip, count))
    }

    #[inline]
    fn run_length(flag: u8) -> Option<u32> {
        (flag >> 4 == 0xF).then_some((flag & 0x0F) as u32 + 1)
    }

    #[inline]
    fn run_flag(run: u32) -> u8 {
        debug_assert!((1..=Self::MAX_RUN).contains(&run));
        0xF0 | (run - 1) as u8
    }
}
