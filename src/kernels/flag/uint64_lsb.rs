//! The UInt64-LSB flag format, for small non-negative values.
//!
//! Only low-order bytes are ever stored; the descriptor nibble is the byte
//! count (0..=8). High nibbles 9..=15 are RLE bytes for 3..=114 zeros, so a
//! `0x00` flag byte is exactly two zeros and `0x0F` a single zero.

use super::{FlagFormat, Window};
use crate::utils::leading_zero_bytes;

const WIDTH: u32 = 8;
const RLE_BASE: u8 = 9;
const MIN_RUN: u32 = 3;

#[derive(Debug, Clone, Copy, Default)]
pub struct Flag64Lsb;

impl FlagFormat for Flag64Lsb {
    type Word = u64;

    const NAME: &'static str = "flag64_lsb";
    const MAX_RUN: u32 = 114;

    #[inline]
    fn classify(value: u64) -> (u8, Window) {
        let count = WIDTH - leading_zero_bytes(value, WIDTH);
        (count as u8, Window::new(0, count as usize))
    }

    #[inline]
    fn window(nibble: u8) -> Option<Window> {
        (nibble as u32 <= WIDTH).then_some(Window::new(0, nibble as usize))
    }

    #[inline]
    fn run_length(flag: u8) -> Option<u32> {
        let hi = flag >> 4;
        if hi < RLE_BASE {
            return None;
        }
        Some((hi - RLE_BASE) as u32 * 16 + (flag & 0x0F) as u32 + MIN_RUN)
    }

    #[inline]
    fn run_flag(run: u32) -> u8 {
        debug_assert!((MIN_RUN..=Self::MAX_RUN).contains(&run));
        let k = run - MIN_RUN;
        ((RLE_BASE + (k / 16) as u8) << 4) | (k % 16) as u8
    }
}
