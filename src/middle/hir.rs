//! The validated program produced by semantic analysis.
//!
//! Every expression carries its resolved [`Type`]. Variables and functions
//! live in arenas on the [`Program`] and are referenced by id from the tree,
//! so one entity may be read from many places while each node still has a
//! single owner.

use num::{BigInt, BigRational, FromPrimitive, One, Zero};

use super::{
    stdlib::Intrinsic,
    ty::{ConstValue, Type},
};
use crate::{
    frontend::{ast::BinaryOperatorKind, intern::InternedSymbol},
    index::IndexVec,
    simple_index,
};

simple_index! {
    pub struct VariableId;
}

simple_index! {
    pub struct FunctionId;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Statement>,
    pub variables: IndexVec<VariableId, Variable>,
    pub functions: IndexVec<FunctionId, Function>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: InternedSymbol,
    pub ty: Type,
    pub mutable: bool,
    /// Compile time value of an immutable variable's initializer
    pub constant: Option<ConstValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: InternedSymbol,
    pub parameters: Vec<VariableId>,
    pub return_type: Type,
    pub kind: FunctionKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    /// evoke name(...) { ... }
    Declared,
    /// name: (...) -> T = conjure { ... };
    Conjured,
    /// conjure { ... } used as an expression
    Anonymous,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Import(Intrinsic),
    VariableDeclaration {
        variable: VariableId,
        initializer: Expression,
    },
    FunctionDeclaration {
        function: FunctionId,
        body: Vec<Statement>,
    },
    Assignment {
        target: Expression,
        value: Expression,
    },
    Increment(VariableId),
    Decrement(VariableId),
    If {
        condition: Expression,
        positive: Vec<Statement>,
        negative: Vec<Statement>,
    },
    While {
        condition: Expression,
        body: Vec<Statement>,
    },
    Break,
    Return(Option<Expression>),
    /// exscribe value;
    Print(Expression),
    /// invoke call(...);
    Invoke(Expression),
    Expression(Expression),
    Block(Vec<Statement>),
    Main(Vec<Statement>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub ty: Type,
}

impl Expression {
    pub fn new(kind: ExpressionKind, ty: Type) -> Self {
        Self { kind, ty }
    }

    pub fn literal(literal: Literal, ty: Type) -> Self {
        Self::new(ExpressionKind::Literal(literal), ty)
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match &self.kind {
            ExpressionKind::Literal(literal) => Some(literal),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionKind {
    Literal(Literal),
    Variable(VariableId),
    Function(FunctionId),
    Binary {
        operator: BinaryOperatorKind,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    Unary {
        operator: UnaryOperator,
        operand: Box<Expression>,
    },
    /// &x, the operand is always a variable reference
    AddressOf(Box<Expression>),
    /// *p
    Dereference(Box<Expression>),
    Call {
        callee: Box<Expression>,
        arguments: Vec<Expression>,
    },
    Subscript {
        array: Box<Expression>,
        index: Box<Expression>,
    },
    Array(Vec<Expression>),
    /// Immediately invoked anonymous function
    Conjure {
        function: FunctionId,
        body: Vec<Statement>,
    },
    /// typing@typeof, already resolved to the described type
    TypeOf(Type),
    /// function@apply
    Apply {
        function: Box<Expression>,
        array: Box<Expression>,
    },
    /// string@supplant
    Supplant {
        text: Box<Expression>,
        pattern: Box<Expression>,
        replacement: Box<Expression>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    Negate,
    LogicalNot,
}

impl core::fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            UnaryOperator::Negate => "-",
            UnaryOperator::LogicalNot => "!",
        })
    }
}

/// A literal value tagged with its kind. The type lives on the enclosing
/// [`Expression`].
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(BigInt),
    Float(f64),
    Boolean(bool),
    String(String),
    Glyph(char),
    Codepoint(char),
    Null,
}

impl Literal {
    pub fn value(&self) -> Option<ConstValue> {
        Some(match self {
            Literal::Integer(value) => ConstValue::Number(BigRational::from_integer(value.clone())),
            Literal::Float(value) => ConstValue::Number(BigRational::from_f64(*value)?),
            Literal::Boolean(value) => ConstValue::Boolean(*value),
            Literal::String(value) => ConstValue::Text(value.clone()),
            Literal::Glyph(value) => ConstValue::Text(value.to_string()),
            Literal::Codepoint(_) => return None,
            Literal::Null => ConstValue::Null,
        })
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Literal::Integer(value) => value.is_zero(),
            Literal::Float(value) => *value == 0.0,
            _ => false,
        }
    }

    pub fn is_one(&self) -> bool {
        match self {
            Literal::Integer(value) => value.is_one(),
            Literal::Float(value) => *value == 1.0,
            _ => false,
        }
    }
}
