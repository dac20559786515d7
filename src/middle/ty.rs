use itertools::Itertools;
use num::BigRational;

use super::primitive::{NumericType, PrimitiveKind};

/// A fully resolved type descriptor
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Primitive(PrimitiveKind),
    Numeric(NumericType),
    /// [T]
    Array(Box<Type>),
    /// *T
    Pointer(Box<Type>),
    /// T?
    Optional(Box<Type>),
    /// conjure(P, ..) -> R
    Function(FunctionType),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionType {
    pub parameters: Vec<Type>,
    pub return_type: Box<Type>,
}

/// A value known at compile time, used by the value-aware conversion rules
#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Number(BigRational),
    Boolean(bool),
    Text(String),
    Null,
    Array(Vec<ConstValue>),
}

impl Type {
    pub const BOOL: Type = Type::Primitive(PrimitiveKind::Bool);
    pub const STRING: Type = Type::Primitive(PrimitiveKind::String);
    pub const GLYPH: Type = Type::Primitive(PrimitiveKind::Glyph);
    pub const CODEPOINT: Type = Type::Primitive(PrimitiveKind::Codepoint);
    pub const VOID: Type = Type::Primitive(PrimitiveKind::Void);
    pub const ANY: Type = Type::Primitive(PrimitiveKind::Any);

    /// Resolves a named (non-composite) type
    pub fn from_name(name: &str) -> Option<Type> {
        if let Ok(primitive) = name.parse() {
            return Some(Type::Primitive(primitive));
        }

        NumericType::from_name(name).map(Type::Numeric)
    }

    pub fn array_of(element: Type) -> Type {
        Type::Array(Box::new(element))
    }

    pub fn pointer_to(pointee: Type) -> Type {
        Type::Pointer(Box::new(pointee))
    }

    pub fn optional_of(inner: Type) -> Type {
        Type::Optional(Box::new(inner))
    }

    pub fn function(parameters: Vec<Type>, return_type: Type) -> Type {
        Type::Function(FunctionType {
            parameters,
            return_type: Box::new(return_type),
        })
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Numeric(_))
    }

    pub fn is_text(&self) -> bool {
        matches!(
            self,
            Type::Primitive(PrimitiveKind::String | PrimitiveKind::Glyph)
        )
    }

    pub fn is_bool(&self) -> bool {
        *self == Type::BOOL
    }

    pub fn is_void(&self) -> bool {
        *self == Type::VOID
    }

    pub fn is_any(&self) -> bool {
        *self == Type::ANY
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Type::Array(_))
    }

    pub fn unwrap_array(&self) -> Option<&Type> {
        match self {
            Type::Array(element) => Some(element),
            _ => None,
        }
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Pointer(_))
    }

    pub fn unwrap_pointer(&self) -> Option<&Type> {
        match self {
            Type::Pointer(pointee) => Some(pointee),
            _ => None,
        }
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, Type::Optional(_))
    }

    pub fn unwrap_optional(&self) -> Option<&Type> {
        match self {
            Type::Optional(inner) => Some(inner),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionType> {
        match self {
            Type::Function(function) => Some(function),
            _ => None,
        }
    }

    /// Whether a value of type `self` (and, when known, value `value`) may be
    /// stored where a `to` is expected.
    ///
    /// Rules, in order:
    /// 1. identical types convert
    /// 2. anything converts to and from `any`
    /// 3. a `null` value converts to any optional (or `any`)
    /// 4. `glyph` converts to `string`
    /// 5. `T` converts to `U?` when `T` converts to `U`, and `T?` to `U?` likewise
    /// 6. `[A]` converts to `[B]` when every known element converts
    /// 7. numerics widen freely, and narrow or change family only when the
    ///    families allow it and the known value fits the destination
    pub fn can_convert(&self, to: &Type, value: Option<&ConstValue>) -> bool {
        if self == to || self.is_any() || to.is_any() {
            return true;
        }

        if matches!(value, Some(ConstValue::Null)) && to.is_optional() {
            return true;
        }

        match (self, to) {
            (Type::Primitive(PrimitiveKind::Glyph), Type::Primitive(PrimitiveKind::String)) => {
                true
            }
            (Type::Optional(from), Type::Optional(to)) => from.can_convert(to, None),
            (_, Type::Optional(inner)) => self.can_convert(inner, value),
            (Type::Array(from), Type::Array(to)) => match value {
                Some(ConstValue::Array(elements)) => elements
                    .iter()
                    .all(|element| from.can_convert(to, Some(element))),
                _ => from.can_convert(to, None),
            },
            (Type::Pointer(from), Type::Pointer(to)) => from == to || from.is_any() || to.is_any(),
            (Type::Numeric(from), Type::Numeric(to)) => {
                if from.width < to.width {
                    return true;
                }

                if !from.family.may_narrow_into(to.family) {
                    return false;
                }

                match value {
                    Some(ConstValue::Number(number)) => to.contains(number),
                    _ => false,
                }
            }
            _ => false,
        }
    }

    /// Lenient operand compatibility used by binary operators: a conversion
    /// in either direction, or signed/unsigned flavours of one numeric type.
    pub fn are_compatible(
        &self,
        other: &Type,
        self_value: Option<&ConstValue>,
        other_value: Option<&ConstValue>,
    ) -> bool {
        if let (Type::Numeric(a), Type::Numeric(b)) = (self, other) {
            if a.is_sign_variant_of(*b) {
                return true;
            }
        }

        other.can_convert(self, other_value) || self.can_convert(other, self_value)
    }
}

impl core::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Primitive(primitive) => write!(f, "{primitive}"),
            Type::Numeric(numeric) => write!(f, "{numeric}"),
            Type::Array(element) => write!(f, "[{element}]"),
            Type::Pointer(pointee) if pointee.is_optional() => write!(f, "*({pointee})"),
            Type::Pointer(pointee) => write!(f, "*{pointee}"),
            Type::Optional(inner) if inner.is_pointer() || inner.as_function().is_some() => {
                write!(f, "({inner})?")
            }
            Type::Optional(inner) => write!(f, "{inner}?"),
            Type::Function(function) => write!(f, "{function}"),
        }
    }
}

impl core::fmt::Display for FunctionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "conjure({}) -> {}",
            self.parameters.iter().join(", "),
            self.return_type
        )
    }
}

#[cfg(test)]
mod tests {
    use num::BigInt;

    use super::*;

    fn ty(name: &str) -> Type {
        Type::from_name(name).unwrap()
    }

    fn number(value: i64) -> ConstValue {
        ConstValue::Number(BigRational::from_integer(BigInt::from(value)))
    }

    #[test]
    fn identical_and_any_always_convert() {
        assert!(ty("int32").can_convert(&ty("int32"), None));
        assert!(ty("string").can_convert(&Type::ANY, None));
        assert!(Type::ANY.can_convert(&ty("uslog64"), None));
    }

    #[test]
    fn null_converts_only_to_optionals() {
        let null_type = Type::optional_of(Type::ANY);

        assert!(null_type.can_convert(&Type::optional_of(ty("int32")), Some(&ConstValue::Null)));
        assert!(
            null_type.can_convert(
                &Type::optional_of(Type::pointer_to(ty("int32"))),
                Some(&ConstValue::Null)
            )
        );
        assert!(!null_type.can_convert(&ty("int32"), Some(&ConstValue::Null)));
    }

    #[test]
    fn glyph_widens_to_string_but_not_back() {
        assert!(Type::GLYPH.can_convert(&Type::STRING, None));
        assert!(!Type::STRING.can_convert(&Type::GLYPH, None));
    }

    #[test]
    fn values_convert_into_optionals_of_their_type() {
        assert!(ty("int32").can_convert(&Type::optional_of(ty("int32")), None));
        assert!(ty("int8").can_convert(&Type::optional_of(ty("int64")), None));
        assert!(!ty("string").can_convert(&Type::optional_of(ty("int32")), None));
    }

    #[test]
    fn numerics_widen_but_only_narrow_with_known_values_in_range() {
        let int32 = ty("int32");
        let int8 = ty("int8");

        assert!(int8.can_convert(&int32, None));
        assert!(!int32.can_convert(&int8, None));
        assert!(int32.can_convert(&int8, Some(&number(-42))));
        assert!(!int32.can_convert(&int8, Some(&number(300))));
        assert!(!int32.can_convert(&ty("uint8"), Some(&number(-1))));
    }

    #[test]
    fn fractions_never_narrow_into_integers() {
        let half = ConstValue::Number(BigRational::new(1.into(), 2.into()));
        let three = number(3);

        assert!(ty("int32").can_convert(&ty("slash32"), Some(&three)));
        assert!(!ty("float32").can_convert(&ty("int32"), Some(&three)));
        assert!(ty("float32").can_convert(&ty("udecim16"), Some(&half)));
    }

    #[test]
    fn widening_is_transitive() {
        let int8 = ty("int8");
        let int16 = ty("int16");
        let int32 = ty("int32");

        assert!(int8.can_convert(&int16, None));
        assert!(int16.can_convert(&int32, None));
        assert!(int8.can_convert(&int32, Some(&number(-7))));
    }

    #[test]
    fn array_conversion_inspects_every_element() {
        let from = Type::array_of(Type::array_of(ty("int32")));
        let to = Type::array_of(Type::array_of(ty("uint8")));

        let in_range = ConstValue::Array(vec![
            ConstValue::Array(vec![number(1), number(2)]),
            ConstValue::Array(vec![number(255)]),
        ]);
        let out_of_range = ConstValue::Array(vec![ConstValue::Array(vec![number(256)])]);

        assert!(from.can_convert(&to, Some(&in_range)));
        assert!(!from.can_convert(&to, Some(&out_of_range)));
        assert!(!from.can_convert(&to, None));
        assert!(Type::array_of(Type::ANY).can_convert(&to, Some(&ConstValue::Array(vec![]))));
    }

    #[test]
    fn sign_variants_are_compatible_but_do_not_convert() {
        let int32 = ty("int32");
        let uint32 = ty("uint32");

        assert!(!int32.can_convert(&uint32, None));
        assert!(int32.are_compatible(&uint32, None, None));
        assert!(!int32.are_compatible(&Type::STRING, None, None));
    }

    #[test]
    fn wrappers_unwrap_one_level() {
        let grid = Type::array_of(Type::array_of(ty("int8")));
        assert!(grid.is_array());
        assert_eq!(grid.unwrap_array(), Some(&Type::array_of(ty("int8"))));

        let maybe_pointer = Type::optional_of(Type::pointer_to(Type::BOOL));
        assert!(!maybe_pointer.is_pointer());
        assert_eq!(maybe_pointer.unwrap_optional(), Some(&Type::pointer_to(Type::BOOL)));
        assert_eq!(
            maybe_pointer.unwrap_optional().and_then(Type::unwrap_pointer),
            Some(&Type::BOOL)
        );
        assert_eq!(Type::STRING.unwrap_array(), None);
    }

    #[test]
    fn formats_composite_types() {
        assert_eq!(Type::optional_of(Type::pointer_to(ty("int32"))).to_string(), "(*int32)?");
        assert_eq!(Type::pointer_to(Type::optional_of(ty("int32"))).to_string(), "*(int32?)");
        assert_eq!(Type::array_of(Type::array_of(Type::GLYPH)).to_string(), "[[glyph]]");
        assert_eq!(
            Type::function(vec![ty("int32"), Type::STRING], Type::VOID).to_string(),
            "conjure(int32, string) -> void"
        );
    }
}
