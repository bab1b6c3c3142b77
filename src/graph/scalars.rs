//! Builtin scalar primitives with fixed sizes.
//!
//! The scalar table is closed: every primitive the symbol dump can name maps to one
//! [`ScalarKind`] with a size that never varies by target, since the pipeline only handles
//! one pointer-width-8 target family.

use std::str::FromStr;

use crate::Result;

/// Builtin primitive types.
///
/// The `Display`/`FromStr` forms match the `builtin` names used by the symbol database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ScalarKind {
    /// Signed 8-bit integer.
    Int8,
    /// Signed 16-bit integer.
    Int16,
    /// Signed 32-bit integer.
    Int32,
    /// Signed 64-bit integer.
    Int64,
    /// Unsigned 8-bit integer.
    Uint8,
    /// Unsigned 16-bit integer.
    Uint16,
    /// Unsigned 32-bit integer.
    Uint32,
    /// Unsigned 64-bit integer.
    Uint64,
    /// 32-bit IEEE float.
    Float32,
    /// 64-bit IEEE float.
    Float64,
    /// Boolean.
    Bool,
    /// Character.
    Char,
    /// Unsigned character.
    Uchar,
    /// 16-bit character unit.
    Char16,
    /// COM result code, 32 bits.
    Hresult,
}

impl ScalarKind {
    /// Byte size of the scalar.
    #[must_use]
    pub fn size(self) -> u64 {
        match self {
            ScalarKind::Int8 | ScalarKind::Uint8 | ScalarKind::Bool | ScalarKind::Char | ScalarKind::Uchar => 1,
            ScalarKind::Int16 | ScalarKind::Uint16 | ScalarKind::Char16 => 2,
            ScalarKind::Int32 | ScalarKind::Uint32 | ScalarKind::Float32 | ScalarKind::Hresult => 4,
            ScalarKind::Int64 | ScalarKind::Uint64 | ScalarKind::Float64 => 8,
        }
    }

    /// Bit width of the scalar.
    #[must_use]
    pub fn bits(self) -> u64 {
        self.size() * 8
    }

    /// Parses a builtin name from the symbol database, failing on unknown primitives.
    ///
    /// `"void"` is not a scalar and is rejected here; the caller handles it separately.
    ///
    /// # Errors
    /// Returns [`crate::Error::NotSupported`] for names outside the table.
    pub fn parse(name: &str) -> Result<Self> {
        ScalarKind::from_str(name)
            .map_err(|_| crate::Error::NotSupported(format!("builtin primitive `{name}`")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes() {
        assert_eq!(ScalarKind::Int8.size(), 1);
        assert_eq!(ScalarKind::Char16.size(), 2);
        assert_eq!(ScalarKind::Hresult.size(), 4);
        assert_eq!(ScalarKind::Uint64.size(), 8);
        assert_eq!(ScalarKind::Float64.bits(), 64);
    }

    #[test]
    fn test_parse_round_trip() {
        for name in ["int32", "uint8", "float64", "bool", "uchar", "char16", "hresult"] {
            let kind = ScalarKind::parse(name).unwrap();
            assert_eq!(kind.to_string(), name);
        }
    }

    #[test]
    fn test_parse_rejects_unknown_and_void() {
        assert!(ScalarKind::parse("void").is_err());
        assert!(ScalarKind::parse("int128").is_err());
    }
}
