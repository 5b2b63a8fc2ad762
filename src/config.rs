// In: src/config.rs

//! The single source of truth for stream codec configuration.
//!
//! `CodecConfig` holds the tunables every codec in a pipeline must agree on
//! (staging buffer size, DFCM table size). A reader built through
//! `create_reader()` inherits its writer's config, which is what keeps paired
//! codecs structurally compatible.
//!
//! `ColumnSpec` describes one pipeline (element kind + encoding) so that an
//! external page format can persist it next to the data and rebuild the exact
//! same reader later.

use serde::{Deserialize, Serialize};

use crate::error::{CodecError, Result};
use crate::kernels::bitwidth::BitWidth;
use crate::kernels::varlen::VarLayout;
use crate::types::ElementKind;

//==================================================================================
// I. Codec Tunables
//==================================================================================

/// Smallest staging buffer accepted by `validate`.
pub const MIN_BUFFER_SIZE: usize = 16;
/// Allowed range for `dfcm_table_bits`.
pub const DFCM_TABLE_BITS_RANGE: std::ops::RangeInclusive<u8> = 4..=24;

/// Tunables shared by a reader/writer pair.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct CodecConfig {
    /// Size in bytes of the staging buffer between a codec and its channel.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// log2 of the number of entries in the DFCM predictor table.
    /// Must be identical on both sides of a stream.
    #[serde(default = "default_dfcm_table_bits")]
    pub dfcm_table_bits: u8,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            dfcm_table_bits: default_dfcm_table_bits(),
        }
    }
}

impl CodecConfig {
    /// Parses a config from JSON, filling omitted fields with defaults, and validates it.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: CodecConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every field against its allowed range.
    pub fn validate(&self) -> Result<()> {
        if self.buffer_size < MIN_BUFFER_SIZE {
            return Err(CodecError::Config(format!(
                "buffer_size must be at least {} bytes, got {}",
                MIN_BUFFER_SIZE, self.buffer_size
            )));
        }
        if !DFCM_TABLE_BITS_RANGE.contains(&self.dfcm_table_bits) {
            return Err(CodecError::Config(format!(
                "dfcm_table_bits must be within {:?}, got {}",
                DFCM_TABLE_BITS_RANGE, self.dfcm_table_bits
            )));
        }
        Ok(())
    }
}

fn default_buffer_size() -> usize {
    4096
}

fn default_dfcm_table_bits() -> u8 {
    12
}

//==================================================================================
// II. Pipeline Description
//==================================================================================

/// The encoding applied to a column, from the value layer down to the bytes.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "encoding", rename_all = "snake_case")]
pub enum Encoding {
    /// Flag-byte codec directly on the value bits (UInt32 or UInt64 by width).
    Plain,
    /// UInt64-LSB flag codec; for small, non-negative 64-bit values.
    Lsb,
    /// Frame-based delta-of-delta over the flag codec.
    DeltaDelta,
    /// XOR against the previous value over the flag codec.
    Xor,
    /// DFCM prediction over the flag codec.
    Dfcm,
    /// Fixed-width sub-byte packing.
    BitPacked { width: BitWidth },
    /// Length-prefixed strings or blobs.
    VarLength { layout: VarLayout },
}

/// A persisted description of a single column pipeline.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ColumnSpec {
    pub kind: ElementKind,
    #[serde(flatten)]
    pub encoding: Encoding,
    /// Declared number of items; readers stop there even if padding follows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_count: Option<u64>,
}

impl ColumnSpec {
    pub fn new(kind: ElementKind, encoding: Encoding) -> Self {
        Self {
            kind,
            encoding,
            item_count: None,
        }
    }

    pub fn with_item_count(mut self, item_count: u64) -> Self {
        self.item_count = Some(item_count);
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_yields_defaults() {
        let config = CodecConfig::from_json("{}").unwrap();
        assert_eq!(config, CodecConfig::default());
        assert_eq!(config.buffer_size, 4096);
        assert_eq!(config.dfcm_table_bits, 12);
    }

    #[test]
    fn test_validate_rejects_out_of_range_fields() {
        let tiny = CodecConfig {
            buffer_size: 4,
            ..CodecConfig::default()
        };
        assert!(matches!(tiny.validate(), Err(CodecError::Config(_))));

        let result = CodecConfig::from_json(r#"{"dfcm_table_bits": 30}"#);
        assert!(matches!(result, Err(CodecError::Config(_))));
    }

    #[test]
    fn test_column_spec_json_shape() {
        let spec = ColumnSpec::new(
            ElementKind::UInt8,
            Encoding::BitPacked {
                width: BitWidth::W4,
            },
        )
        .with_item_count(100);
        let json = spec.to_json().unwrap();
        assert!(json.contains(r#""encoding":"bit_packed""#));
        assert!(json.contains(r#""item_count":100"#));
        assert_eq!(ColumnSpec::from_json(&json).unwrap(), spec);

        let spec = ColumnSpec::from_json(r#"{"kind":"Int64","encoding":"delta_delta"}"#).unwrap();
        assert_eq!(spec.encoding, Encoding::DeltaDelta);
        assert_eq!(spec.item_count, None);
    }
}
