use num::{BigInt, BigRational, One, Signed, Zero};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// Non-numeric built in types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, Display)]
#[strum(serialize_all = "lowercase")]
pub enum PrimitiveKind {
    Bool,
    String,
    Glyph,
    Codepoint,
    Void,
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, Display)]
#[strum(serialize_all = "lowercase")]
pub enum NumericFamily {
    Int,
    UInt,
    Float,
    UFloat,
    Decim,
    UDecim,
    Slash,
    USlash,
    Slog,
    USlog,
}

impl NumericFamily {
    pub fn is_signed(self) -> bool {
        matches!(
            self,
            Self::Int | Self::Float | Self::Decim | Self::Slash | Self::Slog
        )
    }

    /// Integer families hold whole numbers only
    pub fn is_integral(self) -> bool {
        matches!(self, Self::Int | Self::UInt)
    }

    pub fn is_fractional(self) -> bool {
        !self.is_integral()
    }

    /// The signed family sharing this family's representation
    pub fn base(self) -> Self {
        match self {
            Self::Int | Self::UInt => Self::Int,
            Self::Float | Self::UFloat => Self::Float,
            Self::Decim | Self::UDecim => Self::Decim,
            Self::Slash | Self::USlash => Self::Slash,
            Self::Slog | Self::USlog => Self::Slog,
        }
    }

    /// Whether a value of this family may be stored in `target` at the same or
    /// a narrower width. Integers go anywhere, fractions only to fractions.
    pub fn may_narrow_into(self, target: Self) -> bool {
        self.is_integral() || target.is_fractional()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter)]
pub enum BitWidth {
    W8,
    W16,
    W32,
    W64,
    W128,
}

impl BitWidth {
    pub fn bits(self) -> u32 {
        match self {
            Self::W8 => 8,
            Self::W16 => 16,
            Self::W32 => 32,
            Self::W64 => 64,
            Self::W128 => 128,
        }
    }

    pub fn from_bits(bits: u32) -> Option<Self> {
        Self::iter().find(|width| width.bits() == bits)
    }
}

/// A sized numeric type such as `uint8` or `slash128`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NumericType {
    pub family: NumericFamily,
    pub width: BitWidth,
}

impl NumericType {
    pub const INT32: Self = Self::new(NumericFamily::Int, BitWidth::W32);
    pub const INT64: Self = Self::new(NumericFamily::Int, BitWidth::W64);
    pub const INT128: Self = Self::new(NumericFamily::Int, BitWidth::W128);
    pub const FLOAT32: Self = Self::new(NumericFamily::Float, BitWidth::W32);

    pub const fn new(family: NumericFamily, width: BitWidth) -> Self {
        Self { family, width }
    }

    /// Parses names like `uint8` or `uslash128`
    pub fn from_name(name: &str) -> Option<Self> {
        let split = name.find(|c: char| c.is_ascii_digit())?;
        let (family, bits) = name.split_at(split);

        Some(Self {
            family: family.parse().ok()?,
            width: BitWidth::from_bits(bits.parse().ok()?)?,
        })
    }

    /// Inclusive bounds representable at this type's signedness and width
    pub fn range(self) -> (BigInt, BigInt) {
        let bits = self.width.bits();

        if self.family.is_signed() {
            let half = BigInt::one() << (bits - 1);
            (-half.clone(), half - 1)
        } else {
            (BigInt::zero(), (BigInt::one() << bits) - 1)
        }
    }

    pub fn contains(self, value: &BigRational) -> bool {
        if self.family.is_integral() && !value.is_integer() {
            return false;
        }

        let (min, max) = self.range();

        *value >= BigRational::from_integer(min) && *value <= BigRational::from_integer(max)
    }

    /// Signed and unsigned flavours of the same family and width interoperate
    /// in arithmetic
    pub fn is_sign_variant_of(self, other: Self) -> bool {
        self.width == other.width && self.family.base() == other.family.base()
    }

    /// Smallest integer type a literal of this value fits in, starting at int32
    pub fn for_integer_literal(value: &BigInt) -> Self {
        let value = BigRational::from_integer(value.clone());

        [Self::INT32, Self::INT64, Self::INT128]
            .into_iter()
            .find(|ty| ty.contains(&value))
            .unwrap_or(if value.is_negative() {
                Self::INT128
            } else {
                Self::new(NumericFamily::UInt, BitWidth::W128)
            })
    }
}

impl core::fmt::Display for NumericType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.family, self.width.bits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sized_numeric_names() {
        assert_eq!(
            NumericType::from_name("uint8"),
            Some(NumericType::new(NumericFamily::UInt, BitWidth::W8))
        );
        assert_eq!(
            NumericType::from_name("uslash128"),
            Some(NumericType::new(NumericFamily::USlash, BitWidth::W128))
        );
        assert_eq!(NumericType::from_name("int12"), None);
        assert_eq!(NumericType::from_name("integer32"), None);
        assert_eq!(NumericType::from_name("int"), None);
    }

    #[test]
    fn every_family_and_width_round_trips_through_its_name() {
        for family in NumericFamily::iter() {
            for width in BitWidth::iter() {
                let ty = NumericType::new(family, width);
                assert_eq!(NumericType::from_name(&ty.to_string()), Some(ty));
            }
        }
    }

    #[test]
    fn ranges_follow_signedness() {
        let int8 = NumericType::from_name("int8").unwrap();
        let uint8 = NumericType::from_name("uint8").unwrap();

        assert_eq!(int8.range(), (BigInt::from(-128), BigInt::from(127)));
        assert_eq!(uint8.range(), (BigInt::from(0), BigInt::from(255)));
        assert!(!uint8.contains(&BigRational::from_integer(BigInt::from(-1))));
        assert!(!int8.contains(&BigRational::new(5.into(), 2.into())));
        assert!(
            NumericType::from_name("slash8")
                .unwrap()
                .contains(&BigRational::new((-5).into(), 2.into()))
        );
    }

    #[test]
    fn integer_literals_widen_as_needed() {
        assert_eq!(NumericType::for_integer_literal(&BigInt::from(42)), NumericType::INT32);
        assert_eq!(
            NumericType::for_integer_literal(&(BigInt::one() << 40)),
            NumericType::INT64
        );
        assert_eq!(
            NumericType::for_integer_literal(&(BigInt::one() << 100)),
            NumericType::INT128
        );
    }
}
