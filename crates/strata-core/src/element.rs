//! Element types of buffer views.
//!
//! An element type packs a numerical kind and a bit width into one `u32`
//! (`kind << 24 | bits`). The byte width used by all layout arithmetic is the
//! bit width rounded up to whole bytes.

use crate::error::{HalError, Result};
use std::fmt;
use std::str::FromStr;

/// Numerical interpretation of an element's bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NumericalType {
    /// Raw bytes with no numerical meaning
    Opaque,
    /// Integer of unspecified signedness
    Integer,
    /// Two's complement signed integer
    IntegerSigned,
    /// Unsigned integer
    IntegerUnsigned,
    /// IEEE 754 floating point
    FloatIeee,
    /// bfloat16-style truncated float
    FloatBrain,
}

impl NumericalType {
    fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            0x00 => Some(Self::Opaque),
            0x10 => Some(Self::Integer),
            0x11 => Some(Self::IntegerSigned),
            0x12 => Some(Self::IntegerUnsigned),
            0x21 => Some(Self::FloatIeee),
            0x22 => Some(Self::FloatBrain),
            _ => None,
        }
    }
}

/// Packed element type: numerical kind plus bit width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct ElementType(u32);

impl ElementType {
    /// 8-bit opaque element.
    pub const OPAQUE_8: Self = Self::new(NumericalType::Opaque, 8);
    /// 16-bit opaque element.
    pub const OPAQUE_16: Self = Self::new(NumericalType::Opaque, 16);
    /// 32-bit opaque element.
    pub const OPAQUE_32: Self = Self::new(NumericalType::Opaque, 32);
    /// 64-bit opaque element.
    pub const OPAQUE_64: Self = Self::new(NumericalType::Opaque, 64);
    /// 8-bit signless integer.
    pub const INT_8: Self = Self::new(NumericalType::Integer, 8);
    /// 16-bit signless integer.
    pub const INT_16: Self = Self::new(NumericalType::Integer, 16);
    /// 32-bit signless integer.
    pub const INT_32: Self = Self::new(NumericalType::Integer, 32);
    /// 64-bit signless integer.
    pub const INT_64: Self = Self::new(NumericalType::Integer, 64);
    /// 8-bit signed integer.
    pub const SINT_8: Self = Self::new(NumericalType::IntegerSigned, 8);
    /// 16-bit signed integer.
    pub const SINT_16: Self = Self::new(NumericalType::IntegerSigned, 16);
    /// 32-bit signed integer.
    pub const SINT_32: Self = Self::new(NumericalType::IntegerSigned, 32);
    /// 64-bit signed integer.
    pub const SINT_64: Self = Self::new(NumericalType::IntegerSigned, 64);
    /// 8-bit unsigned integer.
    pub const UINT_8: Self = Self::new(NumericalType::IntegerUnsigned, 8);
    /// 16-bit unsigned integer.
    pub const UINT_16: Self = Self::new(NumericalType::IntegerUnsigned, 16);
    /// 32-bit unsigned integer.
    pub const UINT_32: Self = Self::new(NumericalType::IntegerUnsigned, 32);
    /// 64-bit unsigned integer.
    pub const UINT_64: Self = Self::new(NumericalType::IntegerUnsigned, 64);
    /// IEEE half precision float.
    pub const FLOAT_16: Self = Self::new(NumericalType::FloatIeee, 16);
    /// IEEE single precision float.
    pub const FLOAT_32: Self = Self::new(NumericalType::FloatIeee, 32);
    /// IEEE double precision float.
    pub const FLOAT_64: Self = Self::new(NumericalType::FloatIeee, 64);
    /// bfloat16.
    pub const BFLOAT_16: Self = Self::new(NumericalType::FloatBrain, 16);

    /// Packs a numerical type and bit width. Bit widths are truncated to 8 bits.
    pub const fn new(numerical_type: NumericalType, bit_count: u8) -> Self {
        let kind = match numerical_type {
            NumericalType::Opaque => 0x00,
            NumericalType::Integer => 0x10,
            NumericalType::IntegerSigned => 0x11,
            NumericalType::IntegerUnsigned => 0x12,
            NumericalType::FloatIeee => 0x21,
            NumericalType::FloatBrain => 0x22,
        };
        Self((kind << 24) | bit_count as u32)
    }

    /// Decodes a packed value, rejecting unknown numerical kinds and zero widths.
    pub fn from_raw(raw: u32) -> Result<Self> {
        if NumericalType::from_bits(raw >> 24).is_none() {
            return Err(HalError::invalid_argument(format!(
                "unknown numerical type in element type {raw:#010x}"
            )));
        }
        if raw & 0xff == 0 || raw & 0x00ff_ff00 != 0 {
            return Err(HalError::invalid_argument(format!(
                "malformed bit width in element type {raw:#010x}"
            )));
        }
        Ok(Self(raw))
    }

    /// Packed representation.
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Numerical kind of the element.
    pub fn numerical_type(self) -> NumericalType {
        NumericalType::from_bits(self.0 >> 24).unwrap_or(NumericalType::Opaque)
    }

    /// Width of one element in bits.
    pub const fn bit_count(self) -> u32 {
        self.0 & 0xff
    }

    /// Width of one element in bytes, rounding partial bytes up.
    pub const fn byte_width(self) -> u64 {
        ((self.bit_count() + 7) / 8) as u64
    }

    /// Whether the element is a floating point kind.
    pub fn is_float(self) -> bool {
        matches!(
            self.numerical_type(),
            NumericalType::FloatIeee | NumericalType::FloatBrain
        )
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.numerical_type() {
            NumericalType::Opaque => "opaque",
            NumericalType::Integer => "i",
            NumericalType::IntegerSigned => "si",
            NumericalType::IntegerUnsigned => "ui",
            NumericalType::FloatIeee => "f",
            NumericalType::FloatBrain => "bf",
        };
        write!(f, "{prefix}{}", self.bit_count())
    }
}

impl FromStr for ElementType {
    type Err = HalError;

    fn from_str(value: &str) -> Result<Self> {
        // Longest prefixes first so `si8` is not read as `s` + `i8`.
        const PREFIXES: [(&str, NumericalType); 6] = [
            ("opaque", NumericalType::Opaque),
            ("bf", NumericalType::FloatBrain),
            ("si", NumericalType::IntegerSigned),
            ("ui", NumericalType::IntegerUnsigned),
            ("i", NumericalType::Integer),
            ("f", NumericalType::FloatIeee),
        ];

        let (numerical_type, digits) = PREFIXES
            .iter()
            .find_map(|(prefix, kind)| value.strip_prefix(prefix).map(|rest| (*kind, rest)))
            .ok_or_else(|| {
                HalError::invalid_argument(format!("unrecognized element type '{value}'"))
            })?;

        let bit_count: u8 = digits.parse().map_err(|_| {
            HalError::invalid_argument(format!("invalid bit width in element type '{value}'"))
        })?;
        if bit_count == 0 {
            return Err(HalError::invalid_argument(format!(
                "zero bit width in element type '{value}'"
            )));
        }
        Ok(Self::new(numerical_type, bit_count))
    }
}

impl TryFrom<String> for ElementType {
    type Error = HalError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ElementType> for String {
    fn from(value: ElementType) -> Self {
        value.to_string()
    }
}
