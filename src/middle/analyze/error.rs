use thiserror::Error;

use crate::{
    frontend::lexer::Span,
    middle::{stdlib::LibraryError, ty::Type},
};

pub type AnalysisResult<T> = Result<T, AnalysisError>;

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}")]
pub struct AnalysisError {
    pub kind: AnalysisErrorKind,
    pub span: Span,
}

impl AnalysisError {
    pub fn new(kind: AnalysisErrorKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn undeclared(name: impl Into<String>, span: Span) -> Self {
        Self::new(
            AnalysisErrorKind::UndeclaredIdentifier { name: name.into() },
            span,
        )
    }

    pub fn duplicate(name: impl Into<String>, span: Span) -> Self {
        Self::new(
            AnalysisErrorKind::DuplicateDeclaration { name: name.into() },
            span,
        )
    }

    pub fn mismatch(boundary: TypeBoundary, expected: Expected, found: &Type, span: Span) -> Self {
        Self::new(
            AnalysisErrorKind::TypeMismatch {
                boundary,
                expected,
                found: found.clone(),
            },
            span,
        )
    }

    pub fn library(error: LibraryError, span: Span) -> Self {
        let kind = match error {
            LibraryError::UnknownModule(module) => AnalysisErrorKind::UnknownModule { module },
            LibraryError::UnknownSymbol { module, symbol } => {
                AnalysisErrorKind::UnknownSymbol { module, symbol }
            }
        };

        Self::new(kind, span)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisErrorKind {
    #[error("cannot find `{name}` in this scope")]
    UndeclaredIdentifier { name: String },
    #[error("`{name}` is already declared in this scope")]
    DuplicateDeclaration { name: String },
    #[error("unknown type `{name}`")]
    UnknownType { name: String },
    #[error("unknown standard library module `{module}`")]
    UnknownModule { module: String },
    #[error("module `{module}` has no symbol `{symbol}`")]
    UnknownSymbol { module: String, symbol: String },
    #[error("{}", describe_mismatch(.boundary, .expected, .found))]
    TypeMismatch {
        boundary: TypeBoundary,
        expected: Expected,
        found: Type,
    },
    #[error("cannot assign to immutable variable `{name}`")]
    ImmutableAssignment { name: String },
    #[error("left-hand side of assignment is not assignable")]
    NotAssignable,
    #[error("only variables can have their address taken")]
    NotAddressable,
    #[error("`{name}` takes {expected} argument(s) but {found} were supplied")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("expression of type `{found}` is not callable")]
    NotCallable { found: Type },
    #[error("cannot index into a value of type `{found}`")]
    NotAnArray { found: Type },
    #[error("index {index} is out of range for an array of length {length}")]
    IndexOutOfRange { index: String, length: usize },
    #[error("array index may not be negative")]
    NegativeIndex,
    #[error("`break` outside of a loop")]
    BreakOutsideLoop,
    #[error("`return` outside of a function")]
    ReturnOutsideFunction,
    #[error("`{name}` does not return a value on every path")]
    MissingReturn { name: String },
    #[error("attempt to divide by zero")]
    DivisionByZero,
    #[error("invalid literal `{text}`")]
    InvalidLiteral { text: String },
    #[error("`{name}` cannot be used here")]
    MisplacedIntrinsic { name: String },
}

/// What a [`TypeBoundary`] demanded of the offending expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expected {
    Type(Type),
    Numeric,
    Boolean,
    NumericOrText,
    Pointer,
    Function,
    /// Any type that produces a value, i.e. not `void`
    Value,
}

impl core::fmt::Display for Expected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expected::Type(ty) => write!(f, "`{ty}`"),
            Expected::Numeric => f.write_str("a numeric type"),
            Expected::Boolean => f.write_str("`bool`"),
            Expected::NumericOrText => f.write_str("a numeric or text type"),
            Expected::Pointer => f.write_str("a pointer"),
            Expected::Function => f.write_str("a function"),
            Expected::Value => f.write_str("a value"),
        }
    }
}

/// A kind of place in the source code where a type constraint is enforced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeBoundary {
    /// The initializer must convert to the annotated type
    LetStatement,
    /// The value must convert to the target's type
    Assignment,
    /// Function argument type must convert to the parameter type
    FunctionArgument,
    /// A `return` must agree with the declared return type
    ExplicitReturn,
    /// A `return` must agree with the return type fixed by an earlier return
    InferredReturn,
    IfCondition,
    WhileCondition,
    BinaryOperand,
    UnaryOperand,
    /// Every element of an array literal must share the first element's type
    ArrayElement,
    SubscriptIndex,
    Dereference,
    Increment,
    IntrinsicArgument,
    Print,
}

fn describe_mismatch(boundary: &TypeBoundary, expected: &Expected, found: &Type) -> String {
    match *boundary {
        TypeBoundary::LetStatement => {
            format!("cannot initialize a variable of type {expected} with a value of type `{found}`")
        }
        TypeBoundary::Assignment => {
            format!("cannot assign a value of type `{found}` to a place of type {expected}")
        }
        TypeBoundary::FunctionArgument | TypeBoundary::IntrinsicArgument => {
            format!("expected argument of type {expected} but found `{found}`")
        }
        TypeBoundary::ExplicitReturn => {
            format!("function declares a return type of {expected} but returns `{found}`")
        }
        TypeBoundary::InferredReturn => format!(
            "function previously returned {expected} but this return has type `{found}`"
        ),
        TypeBoundary::IfCondition => {
            format!("`if` condition must be {expected} but has type `{found}`")
        }
        TypeBoundary::WhileCondition => {
            format!("`while` condition must be {expected} but has type `{found}`")
        }
        TypeBoundary::BinaryOperand | TypeBoundary::UnaryOperand => {
            format!("operand must be {expected} but has type `{found}`")
        }
        TypeBoundary::ArrayElement => {
            format!("array elements must all be {expected} but found `{found}`")
        }
        TypeBoundary::SubscriptIndex => {
            format!("array index must be {expected} but has type `{found}`")
        }
        TypeBoundary::Dereference => {
            format!("only {expected} can be dereferenced but found `{found}`")
        }
        TypeBoundary::Increment => {
            format!("only {expected} can be incremented or decremented but found `{found}`")
        }
        TypeBoundary::Print => format!("cannot print {expected} of type `{found}`"),
    }
}
