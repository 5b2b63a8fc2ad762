//! This module defines the core, strongly-typed data representations used at
//! the pipeline boundary.
//!
//! It includes the canonical `ElementKind` enum, the `Value` tagged variant that
//! replaces boxed values, and the `Decimal` fixed-point type.

pub mod decimal;
pub mod element_kind;
pub mod value;

// Re-export the main type(s) for easier access.
pub use decimal::Decimal;
pub use element_kind::ElementKind;
pub use value::{Value, ValueType};
