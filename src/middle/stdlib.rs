use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use strum::{EnumIter, IntoEnumIterator};
use thiserror::Error;

use super::ty::{FunctionType, Type};

/// Every symbol the standard library exposes. Each one is lowered to its own
/// node shape by the analyzer rather than to an ordinary call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum Intrinsic {
    /// io@exscribe, lowered to the print statement
    Exscribe,
    /// typing@typeof, lowered to the static type of its argument
    TypeOf,
    /// function@apply, maps a function over an array
    Apply,
    /// string@supplant, replaces every occurrence of a pattern
    Supplant,
}

impl Intrinsic {
    pub fn module(self) -> &'static str {
        match self {
            Intrinsic::Exscribe => "io",
            Intrinsic::TypeOf => "typing",
            Intrinsic::Apply => "function",
            Intrinsic::Supplant => "string",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Intrinsic::Exscribe => "exscribe",
            Intrinsic::TypeOf => "typeof",
            Intrinsic::Apply => "apply",
            Intrinsic::Supplant => "supplant",
        }
    }

    pub fn signature(self) -> FunctionType {
        let (parameters, return_type) = match self {
            Intrinsic::Exscribe => (vec![Type::ANY], Type::VOID),
            Intrinsic::TypeOf => (vec![Type::ANY], Type::STRING),
            Intrinsic::Apply => (
                vec![Type::ANY, Type::array_of(Type::ANY)],
                Type::array_of(Type::ANY),
            ),
            Intrinsic::Supplant => (vec![Type::STRING, Type::STRING, Type::STRING], Type::STRING),
        };

        FunctionType {
            parameters,
            return_type: Box::new(return_type),
        }
    }

    pub fn arity(self) -> usize {
        self.signature().parameters.len()
    }
}

impl core::fmt::Display for Intrinsic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.module(), self.symbol())
    }
}

/// module -> symbol -> intrinsic
static STANDARD_LIBRARY: Lazy<BTreeMap<&'static str, BTreeMap<&'static str, Intrinsic>>> =
    Lazy::new(|| {
        let mut table = BTreeMap::<_, BTreeMap<_, _>>::new();

        for intrinsic in Intrinsic::iter() {
            table
                .entry(intrinsic.module())
                .or_default()
                .insert(intrinsic.symbol(), intrinsic);
        }

        table
    });

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LibraryError {
    #[error("unknown standard library module `{0}`")]
    UnknownModule(String),
    #[error("module `{module}` has no symbol `{symbol}`")]
    UnknownSymbol { module: String, symbol: String },
}

pub fn lookup(module: &str, symbol: &str) -> Result<Intrinsic, LibraryError> {
    let symbols = STANDARD_LIBRARY
        .get(module)
        .ok_or_else(|| LibraryError::UnknownModule(module.to_owned()))?;

    symbols
        .get(symbol)
        .copied()
        .ok_or_else(|| LibraryError::UnknownSymbol {
            module: module.to_owned(),
            symbol: symbol.to_owned(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_every_intrinsic_by_its_qualified_name() {
        for intrinsic in Intrinsic::iter() {
            assert_eq!(lookup(intrinsic.module(), intrinsic.symbol()), Ok(intrinsic));
        }
    }

    #[test]
    fn distinguishes_unknown_modules_from_unknown_symbols() {
        assert_eq!(
            lookup("net", "fetch"),
            Err(LibraryError::UnknownModule("net".into()))
        );
        assert_eq!(
            lookup("io", "inscribe"),
            Err(LibraryError::UnknownSymbol {
                module: "io".into(),
                symbol: "inscribe".into()
            })
        );
    }

    #[test]
    fn signatures_match_the_library_surface() {
        assert_eq!(Intrinsic::Exscribe.signature().to_string(), "conjure(any) -> void");
        assert_eq!(Intrinsic::Apply.signature().to_string(), "conjure(any, [any]) -> [any]");
        assert_eq!(Intrinsic::Supplant.arity(), 3);
        assert_eq!(Intrinsic::TypeOf.to_string(), "typing@typeof");
    }
}
