//! This file is the root of the `tambak_stream` Rust crate.
//!
//! Its responsibilities are strictly limited to:
//! 1.  Declaring all the top-level modules of our library (`pipeline`, `kernels`, etc.)
//!     so the Rust compiler knows they exist.
//! 2.  Re-exporting the handful of types most callers need, so a pipeline can
//!     be built with a single `use tambak_stream::...` line.

//==================================================================================
// 0. Constants
//==================================================================================
/// The crate version, automatically set from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
//==================================================================================
// 1. Module Declarations
//==================================================================================
#[macro_use]
pub mod observability; // Make macros available throughout the crate

pub mod channel;
pub mod config;
pub mod error;
pub mod kernels;
pub mod pipeline;
pub mod traits;
pub mod types;
pub mod utils;

#[cfg(test)]
mod test_util;

#[doc(hidden)]
pub use log;

//==================================================================================
// 2. Public API Re-exports
//==================================================================================
pub use channel::{BoxedChannel, Channel, FileChannel, MemoryChannel};
pub use config::{CodecConfig, ColumnSpec, Encoding};
pub use error::{CodecError, Result};
pub use pipeline::{build_reader, build_writer, StreamReader, StreamWriter, ValueReader, ValueWriter};
pub use types::{Decimal, ElementKind, Value};
