use super::{SourceFile, intern::InternedSymbol};
use crate::frontend::lexer::Span;

#[derive(Debug)]
pub struct Module<'source> {
    pub source_file: &'source SourceFile,
    /// Top level statements in source order
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone, Copy)]
pub struct Identifier {
    pub id: NodeId,
    pub span: Span,
    pub symbol: InternedSymbol,
}

#[derive(Debug)]
pub struct Type {
    pub id: NodeId,
    pub span: Span,
    pub kind: TypeKind,
}

#[derive(Debug)]
pub enum TypeKind {
    /// int32, string, any, ...
    Named(Identifier),
    /// [T]
    Array(Box<Type>),
    /// *T
    Pointer(Box<Type>),
    /// T?
    Optional(Box<Type>),
    /// conjure(P1, P2) -> R
    Function {
        parameters: Vec<Type>,
        return_type: Option<Box<Type>>,
    },
}

#[derive(Debug)]
pub struct Block {
    pub id: NodeId,
    pub span: Span,
    pub statements: Vec<Statement>,
}

#[derive(Debug)]
pub struct Statement {
    pub id: NodeId,
    pub span: Span,
    pub kind: StatementKind,
}

#[derive(Debug)]
pub enum StatementKind {
    /// affix module@symbol;
    Import(Box<Import>),
    /// evoke name(params) -> ty { ... }
    FunctionDefinition(Box<FunctionDefinition>),
    /// name: (params) -> ty = conjure { ... };
    ConjureBinding(Box<ConjureBinding>),
    /// main = { ... }
    Main(Box<Block>),
    /// let / const / `name: ty = value;`
    Local(Box<Local>),
    /// exscribe value;
    Print(Box<Expression>),
    /// invoke call(args);
    Invoke(Box<Expression>),
    Assignment {
        target: Box<Expression>,
        value: Box<Expression>,
    },
    Increment(Box<Expression>),
    Decrement(Box<Expression>),
    If(Box<If>),
    While {
        condition: Box<Expression>,
        block: Box<Block>,
    },
    Break,
    Return(Option<Box<Expression>>),
    Block(Box<Block>),
    Expression(Box<Expression>),
}

#[derive(Debug)]
pub struct Import {
    pub id: NodeId,
    pub span: Span,
    pub module: Identifier,
    pub symbol: Identifier,
}

#[derive(Debug)]
pub struct FunctionDefinition {
    pub id: NodeId,
    pub span: Span,
    pub name: Identifier,
    pub parameters: FunctionParameterList,
    pub return_type: Option<Type>,
    pub body: FunctionBody,
}

#[derive(Debug)]
pub enum FunctionBody {
    Block(Block),
    /// `= expr;` shorthand
    Expression(Expression),
}

#[derive(Debug)]
pub struct ConjureBinding {
    pub id: NodeId,
    pub span: Span,
    pub name: Identifier,
    pub parameters: FunctionParameterList,
    pub return_type: Option<Type>,
    pub body: Block,
}

#[derive(Debug)]
pub struct FunctionParameterList {
    pub id: NodeId,
    pub span: Span,
    pub parameters: Vec<FunctionParameter>,
}

#[derive(Debug)]
pub struct FunctionParameter {
    pub id: NodeId,
    pub span: Span,
    pub name: Identifier,
    pub ty: Type,
}

#[derive(Debug)]
pub struct Local {
    pub id: NodeId,
    pub span: Span,
    pub is_mutable: bool,
    pub name: Identifier,
    pub ty: Option<Type>,
    pub initializer: Expression,
}

#[derive(Debug)]
pub struct If {
    pub id: NodeId,
    pub span: Span,
    pub condition: Expression,
    pub positive: Block,
    pub negative: Option<ElseBranch>,
}

#[derive(Debug)]
pub enum ElseBranch {
    Block(Block),
    If(Box<If>),
}

#[derive(Debug)]
pub struct Expression {
    pub id: NodeId,
    pub span: Span,
    pub kind: ExpressionKind,
}

#[derive(Debug)]
pub enum ExpressionKind {
    Literal(Literal),
    Identifier(Identifier),
    Grouping(Box<Expression>),
    Array(Vec<Expression>),
    FunctionCall {
        target: Box<Expression>,
        arguments: Vec<Expression>,
    },
    Subscript {
        target: Box<Expression>,
        index: Box<Expression>,
    },
    Binary {
        lhs: Box<Expression>,
        operator: BinaryOperator,
        rhs: Box<Expression>,
    },
    Unary {
        operator: UnaryOperator,
        operand: Box<Expression>,
    },
    /// conjure { ... }
    Conjure(Box<Block>),
}

#[derive(Debug, Clone, Copy)]
pub struct Literal {
    pub id: NodeId,
    pub span: Span,
    pub kind: LiteralKind,
    /// Raw source text of the literal
    pub symbol: InternedSymbol,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    Boolean,
    Null,
    Integer,
    Float,
    String,
    Glyph,
    Codepoint,
}

#[derive(Debug, Clone, Copy)]
pub struct BinaryOperator {
    pub id: NodeId,
    pub span: Span,
    pub kind: BinaryOperatorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperatorKind {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulus,
    Power,
    LogicalAnd,
    LogicalOr,
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEqualTo,
    GreaterThan,
    GreaterThanOrEqualTo,
}

impl BinaryOperatorKind {
    pub fn is_logical(self) -> bool {
        matches!(self, Self::LogicalAnd | Self::LogicalOr)
    }

    pub fn is_equality(self) -> bool {
        matches!(self, Self::Equals | Self::NotEquals)
    }

    pub fn is_ordering(self) -> bool {
        matches!(
            self,
            Self::LessThan
                | Self::LessThanOrEqualTo
                | Self::GreaterThan
                | Self::GreaterThanOrEqualTo
        )
    }
}

impl core::fmt::Display for BinaryOperatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Modulus => "%",
            Self::Power => "**",
            Self::LogicalAnd => "&&",
            Self::LogicalOr => "||",
            Self::Equals => "==",
            Self::NotEquals => "!=",
            Self::LessThan => "<",
            Self::LessThanOrEqualTo => "<=",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqualTo => ">=",
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct UnaryOperator {
    pub id: NodeId,
    pub span: Span,
    pub kind: UnaryOperatorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOperatorKind {
    /// -x
    Negate,
    /// !x
    LogicalNot,
    /// *x
    Deref,
    /// &x
    AddressOf,
}

impl core::fmt::Display for UnaryOperatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Negate => "-",
            Self::LogicalNot => "!",
            Self::Deref => "*",
            Self::AddressOf => "&",
        })
    }
}
