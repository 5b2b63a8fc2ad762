//! This module defines the element traits shared by every codec.
//!
//! Codecs never box values internally. Each element type names the unsigned
//! machine word it travels as (`Element::Word`), and delta-capable elements also
//! name the unsigned integer of their own width (`DeltaElement::Int`) so that
//! wrapping arithmetic happens at the element's native width before the value
//! is widened into the codec word.

use std::fmt::Debug;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use num_traits::{PrimInt, ToPrimitive, Unsigned, WrappingAdd, WrappingSub};

//==================================================================================
// 1. Machine Words
//==================================================================================

/// An unsigned word a flag codec stores: `u32` or `u64`.
pub trait Word:
    PrimInt + Unsigned + WrappingAdd + WrappingSub + ToPrimitive + Default + Debug + Send + Sync + 'static
{
    /// Width of the word in bits.
    const BITS: u32;

    /// Truncating conversion from `u64`.
    fn from_u64(value: u64) -> Self;

    /// Zero-extending conversion to `u64`.
    fn as_u64(self) -> u64;
}

impl Word for u32 {
    const BITS: u32 = 32;

    #[inline]
    fn from_u64(value: u64) -> Self {
        value as u32
    }

    #[inline]
    fn as_u64(self) -> u64 {
        self as u64
    }
}

impl Word for u64 {
    const BITS: u32 = 64;

    #[inline]
    fn from_u64(value: u64) -> Self {
        value
    }

    #[inline]
    fn as_u64(self) -> u64 {
        self
    }
}

//==================================================================================
// 2. Elements
//==================================================================================

/// A fixed-size value that can travel through a flag codec as a `Word`.
///
/// `to_word` must be injective and `from_word(to_word(x)) == x` must hold for
/// every `x`. Narrow types are zero-extended; signed types are reinterpreted,
/// so negative values survive the round trip bit-for-bit.
pub trait Element: Copy + Default + PartialEq + Debug + Send + Sync + 'static {
    type Word: Word;

    /// True for IEEE floats, whose low word bits are mostly mantissa noise.
    const IEEE_FLOAT: bool = false;

    fn to_word(self) -> Self::Word;
    fn from_word(word: Self::Word) -> Self;
}

/// An element with a native-width unsigned integer view, used by delta coding.
pub trait DeltaElement: Element {
    type Int: PrimInt + Unsigned + WrappingAdd + WrappingSub + Default + Debug + Send + Sync + 'static;

    fn to_int(self) -> Self::Int;
    fn from_int(value: Self::Int) -> Self;
    /// Zero-extends a native-width integer into the codec word.
    fn widen(value: Self::Int) -> Self::Word;
    /// Truncates a codec word back to the native width.
    fn narrow(word: Self::Word) -> Self::Int;
}

// Implement the traits for all primitive integer types.
macro_rules! impl_integer_element {
    ($T:ty, $U:ty, $W:ty) => {
        impl Element for $T {
            type Word = $W;

            #[inline]
            fn to_word(self) -> $W {
                self as $U as $W
            }

            #[inline]
            fn from_word(word: $W) -> Self {
                word as $U as $T
            }
        }

        impl DeltaElement for $T {
            type Int = $U;

            #[inline]
            fn to_int(self) -> $U {
                self as $U
            }

            #[inline]
            fn from_int(value: $U) -> Self {
                value as $T
            }

            #[inline]
            fn widen(value: $U) -> $W {
                value as $W
            }

            #[inline]
            fn narrow(word: $W) -> $U {
                word as $U
            }
        }
    };
}

impl_integer_element!(u8, u8, u32);
impl_integer_element!(i8, u8, u32);
impl_integer_element!(u16, u16, u32);
impl_integer_element!(i16, u16, u32);
impl_integer_element!(u32, u32, u32);
impl_integer_element!(i32, u32, u32);
impl_integer_element!(u64, u64, u64);
impl_integer_element!(i64, u64, u64);

impl Element for f32 {
    type Word = u32;
    const IEEE_FLOAT: bool = true;

    #[inline]
    fn to_word(self) -> u32 {
        self.to_bits()
    }

    #[inline]
    fn from_word(word: u32) -> Self {
        f32::from_bits(word)
    }
}

impl Element for f64 {
    type Word = u64;
    const IEEE_FLOAT: bool = true;

    #[inline]
    fn to_word(self) -> u64 {
        self.to_bits()
    }

    #[inline]
    fn from_word(word: u64) -> Self {
        f64::from_bits(word)
    }
}

//==================================================================================
// 3. Temporal Elements
//==================================================================================

/// Dates travel as signed days from 0001-01-01 (CE day 1).
impl Element for NaiveDate {
    type Word = u32;

    #[inline]
    fn to_word(self) -> u32 {
        self.num_days_from_ce() as u32
    }

    /// Day numbers outside chrono's range decode to `NaiveDate::MIN`.
    #[inline]
    fn from_word(word: u32) -> Self {
        NaiveDate::from_num_days_from_ce_opt(word as i32).unwrap_or(NaiveDate::MIN)
    }
}

impl DeltaElement for NaiveDate {
    type Int = u32;

    #[inline]
    fn to_int(self) -> u32 {
        self.to_word()
    }

    #[inline]
    fn from_int(value: u32) -> Self {
        Self::from_word(value)
    }

    #[inline]
    fn widen(value: u32) -> u32 {
        value
    }

    #[inline]
    fn narrow(word: u32) -> u32 {
        word
    }
}

/// Date-times travel as signed microseconds since the Unix epoch (UTC).
impl Element for NaiveDateTime {
    type Word = u64;

    #[inline]
    fn to_word(self) -> u64 {
        self.and_utc().timestamp_micros() as u64
    }

    #[inline]
    fn from_word(word: u64) -> Self {
        DateTime::from_timestamp_micros(word as i64)
            .map(|dt| dt.naive_utc())
            .unwrap_or(NaiveDateTime::MIN)
    }
}

impl DeltaElement for NaiveDateTime {
    type Int = u64;

    #[inline]
    fn to_int(self) -> u64 {
        self.to_word()
    }

    #[inline]
    fn from_int(value: u64) -> Self {
        Self::from_word(value)
    }

    #[inline]
    fn widen(value: u64) -> u64 {
        value
    }

    #[inline]
    fn narrow(word: u64) -> u64 {
        word
    }
}
