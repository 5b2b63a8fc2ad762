//! This module defines the canonical, type-safe representation of the element
//! kinds a stream pipeline can carry.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The canonical representation of a stream's element type.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ElementKind {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Boolean,
    Decimal,
    Date,
    DateTime,
    String,
    Bytes,
}

/// Provides the canonical string representation for an `ElementKind`.
impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
