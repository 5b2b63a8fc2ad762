//! This module serves as the public API for the collection of stream codecs.
//!
//! Each sub-module is one codec or transform implementing the `StreamReader` /
//! `StreamWriter` contract. They compose by construction: every transform owns
//! a flag writer or reader and talks to it at the word level.

//==================================================================================
// 1. Module Declarations
//==================================================================================

/// Layer 1: Flag-byte integer coding
pub mod flag;

/// Layer 2: Stateful transforms over the flag codec
pub mod delta_delta;
pub mod dfcm;
pub mod xor;

/// Standalone codecs
pub mod bitwidth;
pub mod decimal;
pub mod varlen;

//==================================================================================
// 2. Public API Re-exports
//==================================================================================
pub use self::bitwidth::{BitReader, BitWidth, BitWriter, BoolReader, BoolWriter};
pub use self::decimal::{DecimalReader, DecimalWriter};
pub use self::delta_delta::{DeltaDeltaReader, DeltaDeltaWriter};
pub use self::dfcm::{DfcmReader, DfcmWriter};
pub use self::flag::{Flag32, Flag64, Flag64Lsb, FlagReader, FlagWriter};
pub use self::varlen::{VarLayout, VarReader, VarWriter};
pub use self::xor::{XorReader, XorWriter};
