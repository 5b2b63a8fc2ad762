// In: src/error.rs

//! This module defines the single, unified error type for the entire stream codec library.
//! It uses the `thiserror` crate to provide ergonomic, context-aware error handling.
//!
//! End-of-stream is never an error: readers report it by returning fewer items
//! than requested. Every variant here is reserved for programmer errors (bad
//! arguments, wrong wiring) or for streams the decoder can prove are damaged.

use thiserror::Error;

use crate::types::ElementKind;

#[derive(Error, Debug)]
pub enum CodecError {
    // =========================================================================
    // === Precondition Violations (caller bugs, never retried)
    // =========================================================================
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Codec '{codec}' requires {expected} channel(s), got {actual}")]
    ChannelCount {
        codec: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Codec used before init() wired it to a channel")]
    NotInitialized,

    #[error("Unsupported data type for this operation: {0}")]
    UnsupportedType(String),

    #[error("Value of kind {actual} written to a {expected} pipeline")]
    TypeMismatch {
        expected: ElementKind,
        actual: ElementKind,
    },

    #[error("Cannot resume at row {requested}: the stream only holds {available} row(s)")]
    ResumeOutOfRange { requested: u64, available: u64 },

    #[error("Invalid configuration: {0}")]
    Config(String),

    // =========================================================================
    // === Stream Damage
    // =========================================================================
    #[error("Corrupt or truncated stream: {0}")]
    CorruptStream(String),

    // =========================================================================
    // === External Error Wrappers (Using #[from] for automatic conversion)
    // =========================================================================
    /// An error originating from the underlying channel (file, memory buffer).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A string item whose payload is not valid UTF-8.
    #[error("String payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// An error from the Serde JSON library, typically while loading a config or column spec.
    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, CodecError>;

impl CodecError {
    /// Shorthand used by decoders when a unit is cut short.
    pub(crate) fn truncated(what: &str) -> Self {
        CodecError::CorruptStream(format!("stream ends inside {}", what))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_converts_with_question_mark() {
        fn fails() -> Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "gone"))?;
            Ok(())
        }
        assert!(matches!(fails(), Err(CodecError::Io(_))));
    }

    #[test]
    fn test_messages_name_the_offending_values() {
        let err = CodecError::ChannelCount {
            codec: "var_length/split",
            expected: 2,
            actual: 1,
        };
        assert_eq!(
            err.to_string(),
            "Codec 'var_length/split' requires 2 channel(s), got 1"
        );

        let err = CodecError::ResumeOutOfRange {
            requested: 10,
            available: 3,
        };
        assert!(err.to_string().contains("row 10"));
        assert!(CodecError::truncated("a flag unit")
            .to_string()
            .contains("inside a flag unit"));
    }
}
