//! A fixed-point decimal: `mantissa * 10^-scale`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CodecError;

/// Largest scale accepted by `Decimal::new`.
pub const MAX_SCALE: u8 = 28;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Decimal {
    mantissa: i64,
    scale: u8,
}

impl Decimal {
    /// Creates `mantissa * 10^-scale`. The scale must not exceed `MAX_SCALE`.
    pub fn new(mantissa: i64, scale: u8) -> Result<Self, CodecError> {
        if scale > MAX_SCALE {
            return Err(CodecError::InvalidArgument(format!(
                "decimal scale {} exceeds maximum {}",
                scale, MAX_SCALE
            )));
        }
        Ok(Self { mantissa, scale })
    }

    pub fn mantissa(&self) -> i64 {
        self.mantissa
    }

    pub fn scale(&self) -> u8 {
        self.scale
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scale == 0 {
            return write!(f, "{}", self.mantissa);
        }
        let sign = if self.mantissa < 0 { "-" } else { "" };
        let digits = self.mantissa.unsigned_abs().to_string();
        let scale = self.scale as usize;
        let padded = if digits.len() <= scale {
            format!("{}{}", "0".repeat(scale + 1 - digits.len()), digits)
        } else {
            digits
        };
        let (int_part, frac_part) = padded.split_at(padded.len() - scale);
        write!(f, "{}{}.{}", sign, int_part, frac_part)
    }
}

impl FromStr for Decimal {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CodecError::InvalidArgument(format!("'{}' is not a decimal", s));
        let (int_part, frac_part) = match s.split_once('.') {
            Some((i, f)) => (i, f),
            None => (s, ""),
        };
        if frac_part.chars().any(|c| !c.is_ascii_digit()) {
            return Err(invalid());
        }
        let scale = u8::try_from(frac_part.len()).map_err(|_| invalid())?;
        let joined = format!("{}{}", int_part, frac_part);
        let mantissa: i64 = joined.parse().map_err(|_| invalid())?;
        Decimal::new(mantissa, scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_parse_agree() {
        for text in ["12.345", "-0.05", "7", "0.000001", "-1234.5"] {
            let d: Decimal = text.parse().unwrap();
            assert_eq!(d.to_string(), text);
        }
        let d: Decimal = "-0.05".parse().unwrap();
        assert_eq!((d.mantissa(), d.scale()), (-5, 2));
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!("1.2.3".parse::<Decimal>().is_err());
        assert!("abc".parse::<Decimal>().is_err());
        assert!(Decimal::new(1, MAX_SCALE + 1).is_err());
    }
}
