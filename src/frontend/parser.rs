use std::vec;

use itertools::{PeekNth, peek_nth};
use tracing::trace;

use super::{
    ast::{
        BinaryOperator, BinaryOperatorKind, Block, ConjureBinding, ElseBranch, Expression,
        ExpressionKind, FunctionBody, FunctionDefinition, FunctionParameter,
        FunctionParameterList, Identifier, If, Import, Literal, LiteralKind, Local, Module,
        NodeId, Statement, StatementKind, Type, TypeKind, UnaryOperator, UnaryOperatorKind,
    },
    intern::InternedSymbol,
    lexer::{Keyword, Lexer, Span, SyntaxError, Token, TokenKind},
};
use crate::frontend::SourceFile;

pub type ParseResult<T> = Result<T, SyntaxError>;

#[derive(Debug)]
pub struct Parser<'source> {
    source: &'source SourceFile,
    tokens: PeekNth<vec::IntoIter<Token>>,
    next_node_id: u32,
}

impl<'source> Parser<'source> {
    pub fn parse_module(source_file: &'source SourceFile) -> ParseResult<Module<'source>> {
        let tokens = Lexer::new(source_file).collect::<Result<Vec<_>, _>>()?;

        trace!(tokens = tokens.len(), "lexed source file");

        let mut parser = Self {
            source: source_file,
            tokens: peek_nth(tokens),
            next_node_id: 0,
        };

        let mut module = Module {
            source_file,
            statements: Vec::new(),
        };

        while parser.skip_empty_statements() {
            module.statements.push(parser.parse_statement()?);
        }

        Ok(module)
    }

    fn create_node_id(&mut self) -> NodeId {
        let id = NodeId(self.next_node_id);
        self.next_node_id += 1;
        id
    }

    fn end_of_file_span(&self) -> Span {
        Span::new(self.source.contents.len(), self.source.contents.len())
    }

    fn unexpected(&self, token: Token, expecting: &str) -> SyntaxError {
        SyntaxError::new(
            format!(
                "expected {expecting} but found `{}`",
                self.source.value_of_span(token.span)
            ),
            token.span,
        )
    }

    fn peek(&mut self) -> Option<Token> {
        self.tokens.peek().copied()
    }

    fn peek_kind_is(&mut self, n: usize, kind: TokenKind) -> bool {
        self.tokens.peek_nth(n).is_some_and(|t| t.kind == kind)
    }

    fn expect_peek(&mut self, expecting: &str) -> ParseResult<Token> {
        self.peek().ok_or_else(|| {
            SyntaxError::new(
                format!("expected {expecting} but reached end of file"),
                self.end_of_file_span(),
            )
        })
    }

    fn expect_next(&mut self, expecting: &str) -> ParseResult<Token> {
        let token = self.expect_peek(expecting)?;
        self.tokens.next();
        Ok(token)
    }

    fn expect_next_to_be(&mut self, kind: TokenKind, expecting: &str) -> ParseResult<Token> {
        let token = self.expect_next(expecting)?;

        if token.kind != kind {
            return Err(self.unexpected(token, expecting));
        }

        Ok(token)
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> ParseResult<Token> {
        self.expect_next_to_be(
            TokenKind::Keyword(keyword),
            &format!("`{}` keyword", format!("{keyword:?}").to_lowercase()),
        )
    }

    fn next_if(&mut self, kind: TokenKind) -> Option<Token> {
        self.tokens.next_if(|t| t.kind == kind)
    }

    /// Consumes stray semicolons, returning whether any tokens remain
    fn skip_empty_statements(&mut self) -> bool {
        while self.next_if(TokenKind::Semicolon).is_some() {}

        self.peek().is_some()
    }

    /// A statement terminator may be omitted before a closing brace or the end
    /// of the file. Returns the end of the statement.
    fn expect_terminator(&mut self, end: usize) -> ParseResult<usize> {
        match self.peek() {
            Some(token) if token.kind == TokenKind::Semicolon => {
                self.tokens.next();
                Ok(token.span.end)
            }
            Some(token) if token.kind == TokenKind::CloseBrace => Ok(end),
            None => Ok(end),
            Some(token) => Err(self.unexpected(token, "`;`")),
        }
    }

    fn parse_identifier(&mut self) -> ParseResult<Identifier> {
        let token = self.expect_next_to_be(TokenKind::Identifier, "identifier")?;

        Ok(Identifier {
            id: self.create_node_id(),
            span: token.span,
            symbol: InternedSymbol::new(self.source.value_of_span(token.span)),
        })
    }

    /// Library symbols may share their name with a keyword (`io@exscribe`)
    fn parse_symbol_name(&mut self) -> ParseResult<Identifier> {
        let token = self.expect_next("library symbol")?;

        if !matches!(token.kind, TokenKind::Identifier | TokenKind::Keyword(_)) {
            return Err(self.unexpected(token, "library symbol"));
        }

        Ok(Identifier {
            id: self.create_node_id(),
            span: token.span,
            symbol: InternedSymbol::new(self.source.value_of_span(token.span)),
        })
    }

    fn parse_statement(&mut self) -> ParseResult<Statement> {
        let peeked = self.expect_peek("statement")?;

        match peeked.kind {
            TokenKind::Keyword(Keyword::Affix) => self.parse_import(),
            TokenKind::Keyword(Keyword::Evoke) => self.parse_function_definition(),
            TokenKind::Keyword(Keyword::Main) => self.parse_main(),
            TokenKind::Keyword(Keyword::Let | Keyword::Const) => self.parse_local(),
            TokenKind::Keyword(Keyword::Exscribe) => self.parse_print(),
            TokenKind::Keyword(Keyword::Invoke) => self.parse_invoke(),
            TokenKind::Keyword(Keyword::If) => {
                let if_statement = self.parse_if()?;

                Ok(Statement {
                    id: self.create_node_id(),
                    span: if_statement.span,
                    kind: StatementKind::If(Box::new(if_statement)),
                })
            }
            TokenKind::Keyword(Keyword::While) => self.parse_while(),
            TokenKind::Keyword(Keyword::Break) => {
                let break_keyword = self.expect_keyword(Keyword::Break)?;
                let end = self.expect_terminator(break_keyword.span.end)?;

                Ok(Statement {
                    id: self.create_node_id(),
                    span: Span::new(break_keyword.span.start, end),
                    kind: StatementKind::Break,
                })
            }
            TokenKind::Keyword(Keyword::Return) => self.parse_return(),
            TokenKind::OpenBrace => {
                let block = self.parse_block()?;

                Ok(Statement {
                    id: self.create_node_id(),
                    span: block.span,
                    kind: StatementKind::Block(Box::new(block)),
                })
            }
            TokenKind::Identifier if self.peek_kind_is(1, TokenKind::Colon) => {
                self.parse_typed_binding()
            }
            _ => self.parse_expression_statement(),
        }
    }

    /// affix module@symbol;
    fn parse_import(&mut self) -> ParseResult<Statement> {
        let affix_keyword = self.expect_keyword(Keyword::Affix)?;
        let module = self.parse_identifier()?;
        self.expect_next_to_be(TokenKind::At, "`@`")?;
        let symbol = self.parse_symbol_name()?;
        let end = self.expect_terminator(symbol.span.end)?;

        let span = Span::new(affix_keyword.span.start, end);

        Ok(Statement {
            id: self.create_node_id(),
            span,
            kind: StatementKind::Import(Box::new(Import {
                id: self.create_node_id(),
                span,
                module,
                symbol,
            })),
        })
    }

    /// evoke name(param: ty) -> return_type { ... }
    /// evoke name(param: ty) -> return_type = expression;
    fn parse_function_definition(&mut self) -> ParseResult<Statement> {
        let evoke_keyword = self.expect_keyword(Keyword::Evoke)?;

        let name = self.parse_identifier()?;
        let parameters = self.parse_function_parameter_list()?;
        let return_type = self.parse_return_type()?;

        let (body, end) = if self.next_if(TokenKind::Equals).is_some() {
            let expression = self.parse_expression()?;
            let end = self.expect_terminator(expression.span.end)?;

            (FunctionBody::Expression(expression), end)
        } else {
            let block = self.parse_block()?;
            let end = block.span.end;

            (FunctionBody::Block(block), end)
        };

        let span = Span::new(evoke_keyword.span.start, end);

        Ok(Statement {
            id: self.create_node_id(),
            span,
            kind: StatementKind::FunctionDefinition(Box::new(FunctionDefinition {
                id: self.create_node_id(),
                span,
                name,
                parameters,
                return_type,
                body,
            })),
        })
    }

    fn parse_return_type(&mut self) -> ParseResult<Option<Type>> {
        if self.next_if(TokenKind::Arrow).is_none() {
            return Ok(None);
        }

        self.parse_type().map(Some)
    }

    /// main = { ... }
    /// main = statement
    fn parse_main(&mut self) -> ParseResult<Statement> {
        let main_keyword = self.expect_keyword(Keyword::Main)?;
        self.expect_next_to_be(TokenKind::Equals, "`=` after main")?;

        let block = if self.peek_kind_is(0, TokenKind::OpenBrace) {
            let block = self.parse_block()?;
            self.next_if(TokenKind::Semicolon);
            block
        } else {
            let statement = self.parse_statement()?;

            Block {
                id: self.create_node_id(),
                span: statement.span,
                statements: vec![statement],
            }
        };

        Ok(Statement {
            id: self.create_node_id(),
            span: Span::new(main_keyword.span.start, block.span.end),
            kind: StatementKind::Main(Box::new(block)),
        })
    }

    /// (a: int32, b: int32)
    fn parse_function_parameter_list(&mut self) -> ParseResult<FunctionParameterList> {
        let mut parameters = Vec::new();

        let open_paren = self.expect_next_to_be(TokenKind::OpenParen, "`(`")?;

        if !self.peek_kind_is(0, TokenKind::CloseParen) {
            // If a close paren was not found then there MUST be at least one
            // parameter
            parameters.push(self.parse_function_parameter()?);

            while self.next_if(TokenKind::Comma).is_some() {
                parameters.push(self.parse_function_parameter()?);
            }
        }

        let close_paren = self.expect_next_to_be(TokenKind::CloseParen, "`)`")?;

        Ok(FunctionParameterList {
            id: self.create_node_id(),
            span: open_paren.span.to(close_paren.span),
            parameters,
        })
    }

    // a: int32
    fn parse_function_parameter(&mut self) -> ParseResult<FunctionParameter> {
        let name = self.parse_identifier()?;
        self.expect_next_to_be(TokenKind::Colon, "`:`")?;
        let ty = self.parse_type()?;

        Ok(FunctionParameter {
            id: self.create_node_id(),
            span: name.span.to(ty.span),
            name,
            ty,
        })
    }

    // type = "*" type
    //        | type "?"
    //        | "[" type "]"
    //        | "(" type ")"
    //        | "conjure" "(" ( type ( "," type )* )? ")" ( "->" type )?
    //        | IDENTIFIER
    fn parse_type(&mut self) -> ParseResult<Type> {
        let peeked = self.expect_peek("type")?;

        if peeked.kind == TokenKind::Asterisk {
            let asterisk = self.expect_next("`*`")?;
            let ty = self.parse_type()?;

            return Ok(Type {
                id: self.create_node_id(),
                span: asterisk.span.to(ty.span),
                kind: TypeKind::Pointer(Box::new(ty)),
            });
        }

        let mut ty = match peeked.kind {
            TokenKind::OpenBracket => {
                let open_bracket = self.expect_next("`[`")?;
                let element = self.parse_type()?;
                let close_bracket = self.expect_next_to_be(TokenKind::CloseBracket, "`]`")?;

                Type {
                    id: self.create_node_id(),
                    span: open_bracket.span.to(close_bracket.span),
                    kind: TypeKind::Array(Box::new(element)),
                }
            }
            TokenKind::OpenParen => {
                let open_paren = self.expect_next("`(`")?;
                let mut inner = self.parse_type()?;
                let close_paren = self.expect_next_to_be(TokenKind::CloseParen, "`)`")?;

                inner.span = open_paren.span.to(close_paren.span);
                inner
            }
            TokenKind::Keyword(Keyword::Conjure) => self.parse_function_type()?,
            TokenKind::Identifier => {
                let name = self.parse_identifier()?;

                Type {
                    id: self.create_node_id(),
                    span: name.span,
                    kind: TypeKind::Named(name),
                }
            }
            _ => return Err(self.unexpected(peeked, "type")),
        };

        while let Some(question) = self.next_if(TokenKind::Question) {
            ty = Type {
                id: self.create_node_id(),
                span: ty.span.to(question.span),
                kind: TypeKind::Optional(Box::new(ty)),
            };
        }

        Ok(ty)
    }

    // conjure(int32, string) -> bool
    fn parse_function_type(&mut self) -> ParseResult<Type> {
        let conjure_keyword = self.expect_keyword(Keyword::Conjure)?;
        self.expect_next_to_be(TokenKind::OpenParen, "`(`")?;

        let mut parameters = Vec::new();

        if !self.peek_kind_is(0, TokenKind::CloseParen) {
            parameters.push(self.parse_type()?);

            while self.next_if(TokenKind::Comma).is_some() {
                parameters.push(self.parse_type()?);
            }
        }

        let close_paren = self.expect_next_to_be(TokenKind::CloseParen, "`)`")?;
        let return_type = self.parse_return_type()?;

        let end = return_type
            .as_ref()
            .map(|ty| ty.span.end)
            .unwrap_or(close_paren.span.end);

        Ok(Type {
            id: self.create_node_id(),
            span: Span::new(conjure_keyword.span.start, end),
            kind: TypeKind::Function {
                parameters,
                return_type: return_type.map(Box::new),
            },
        })
    }

    // "{" ( statement )* "}"
    fn parse_block(&mut self) -> ParseResult<Block> {
        let mut statements = Vec::new();

        let open_brace = self.expect_next_to_be(TokenKind::OpenBrace, "`{`")?;

        while self.skip_empty_statements() && !self.peek_kind_is(0, TokenKind::CloseBrace) {
            statements.push(self.parse_statement()?);
        }

        let close_brace = self.expect_next_to_be(TokenKind::CloseBrace, "`}`")?;

        Ok(Block {
            id: self.create_node_id(),
            span: open_brace.span.to(close_brace.span),
            statements,
        })
    }

    /// let x: int32 = 1;
    /// const y = "text";
    fn parse_local(&mut self) -> ParseResult<Statement> {
        let keyword = self.expect_next("`let` or `const`")?;
        let is_mutable = keyword.kind == TokenKind::Keyword(Keyword::Let);

        let name = self.parse_identifier()?;

        let ty = if self.next_if(TokenKind::Colon).is_some() {
            Some(self.parse_type()?)
        } else {
            None
        };

        self.expect_next_to_be(TokenKind::Equals, "`=`")?;
        let initializer = self.parse_expression()?;
        let end = self.expect_terminator(initializer.span.end)?;

        let span = Span::new(keyword.span.start, end);

        Ok(Statement {
            id: self.create_node_id(),
            span,
            kind: StatementKind::Local(Box::new(Local {
                id: self.create_node_id(),
                span,
                is_mutable,
                name,
                ty,
                initializer,
            })),
        })
    }

    /// name: (x: int32) -> int32 = conjure { ... };
    /// name: type = expression;
    fn parse_typed_binding(&mut self) -> ParseResult<Statement> {
        // A parameter list starts with `()` or `(name:`, a parenthesized type
        // never does
        let is_conjure_binding = self.peek_kind_is(2, TokenKind::OpenParen)
            && (self.peek_kind_is(3, TokenKind::CloseParen)
                || (self.peek_kind_is(3, TokenKind::Identifier)
                    && self.peek_kind_is(4, TokenKind::Colon)));

        let name = self.parse_identifier()?;
        self.expect_next_to_be(TokenKind::Colon, "`:`")?;

        if !is_conjure_binding {
            let ty = self.parse_type()?;
            self.expect_next_to_be(TokenKind::Equals, "`=`")?;
            let initializer = self.parse_expression()?;
            let end = self.expect_terminator(initializer.span.end)?;

            let span = Span::new(name.span.start, end);

            return Ok(Statement {
                id: self.create_node_id(),
                span,
                kind: StatementKind::Local(Box::new(Local {
                    id: self.create_node_id(),
                    span,
                    is_mutable: false,
                    name,
                    ty: Some(ty),
                    initializer,
                })),
            });
        }

        let parameters = self.parse_function_parameter_list()?;
        let return_type = self.parse_return_type()?;
        self.expect_next_to_be(TokenKind::Equals, "`=`")?;
        self.expect_keyword(Keyword::Conjure)?;
        let body = self.parse_block()?;
        let end = self.expect_terminator(body.span.end)?;

        let span = Span::new(name.span.start, end);

        Ok(Statement {
            id: self.create_node_id(),
            span,
            kind: StatementKind::ConjureBinding(Box::new(ConjureBinding {
                id: self.create_node_id(),
                span,
                name,
                parameters,
                return_type,
                body,
            })),
        })
    }

    /// exscribe expression;
    fn parse_print(&mut self) -> ParseResult<Statement> {
        let exscribe_keyword = self.expect_keyword(Keyword::Exscribe)?;
        let expression = self.parse_expression()?;
        let end = self.expect_terminator(expression.span.end)?;

        Ok(Statement {
            id: self.create_node_id(),
            span: Span::new(exscribe_keyword.span.start, end),
            kind: StatementKind::Print(Box::new(expression)),
        })
    }

    /// invoke function(args);
    fn parse_invoke(&mut self) -> ParseResult<Statement> {
        let invoke_keyword = self.expect_keyword(Keyword::Invoke)?;
        let call = self.parse_expression()?;

        if !matches!(call.kind, ExpressionKind::FunctionCall { .. }) {
            return Err(SyntaxError::new(
                "expected function call after `invoke`",
                call.span,
            ));
        }

        let end = self.expect_terminator(call.span.end)?;

        Ok(Statement {
            id: self.create_node_id(),
            span: Span::new(invoke_keyword.span.start, end),
            kind: StatementKind::Invoke(Box::new(call)),
        })
    }

    /// "if" expression BLOCK ( "else" ( BLOCK | if ) )?
    fn parse_if(&mut self) -> ParseResult<If> {
        let if_keyword = self.expect_keyword(Keyword::If)?;
        let condition = self.parse_expression()?;
        let positive = self.parse_block()?;

        let negative = if self.next_if(TokenKind::Keyword(Keyword::Else)).is_some() {
            let peeked = self.expect_peek("`if` or `{` after `else`")?;

            Some(match peeked.kind {
                TokenKind::Keyword(Keyword::If) => ElseBranch::If(Box::new(self.parse_if()?)),
                TokenKind::OpenBrace => ElseBranch::Block(self.parse_block()?),
                _ => return Err(self.unexpected(peeked, "`if` or `{` after `else`")),
            })
        } else {
            None
        };

        let end = match &negative {
            Some(ElseBranch::Block(block)) => block.span.end,
            Some(ElseBranch::If(if_statement)) => if_statement.span.end,
            None => positive.span.end,
        };

        Ok(If {
            id: self.create_node_id(),
            span: Span::new(if_keyword.span.start, end),
            condition,
            positive,
            negative,
        })
    }

    /// "while" expression BLOCK
    fn parse_while(&mut self) -> ParseResult<Statement> {
        let while_keyword = self.expect_keyword(Keyword::While)?;
        let condition = self.parse_expression()?;
        let block = self.parse_block()?;

        Ok(Statement {
            id: self.create_node_id(),
            span: while_keyword.span.to(block.span),
            kind: StatementKind::While {
                condition: Box::new(condition),
                block: Box::new(block),
            },
        })
    }

    /// "return" expression?
    fn parse_return(&mut self) -> ParseResult<Statement> {
        let return_keyword = self.expect_keyword(Keyword::Return)?;

        // Unless we are at the end of a block or have a semicolon we expect an
        // expression to follow
        let expression = match self.peek() {
            Some(token) if !matches!(token.kind, TokenKind::Semicolon | TokenKind::CloseBrace) => {
                Some(self.parse_expression()?)
            }
            _ => None,
        };

        let end = self.expect_terminator(
            expression
                .as_ref()
                .map(|e| e.span.end)
                .unwrap_or(return_keyword.span.end),
        )?;

        Ok(Statement {
            id: self.create_node_id(),
            span: Span::new(return_keyword.span.start, end),
            kind: StatementKind::Return(expression.map(Box::new)),
        })
    }

    /// expression ( "=" expression | "++" | "--" )? ";"
    fn parse_expression_statement(&mut self) -> ParseResult<Statement> {
        let expression = self.parse_expression()?;
        let start = expression.span.start;

        let (kind, end) = if self.next_if(TokenKind::Equals).is_some() {
            let value = self.parse_expression()?;
            let end = value.span.end;

            (
                StatementKind::Assignment {
                    target: Box::new(expression),
                    value: Box::new(value),
                },
                end,
            )
        } else if let Some(operator) = self.next_if(TokenKind::Increment) {
            (StatementKind::Increment(Box::new(expression)), operator.span.end)
        } else if let Some(operator) = self.next_if(TokenKind::Decrement) {
            (StatementKind::Decrement(Box::new(expression)), operator.span.end)
        } else {
            let end = expression.span.end;
            (StatementKind::Expression(Box::new(expression)), end)
        };

        let end = self.expect_terminator(end)?;

        Ok(Statement {
            id: self.create_node_id(),
            span: Span::new(start, end),
            kind,
        })
    }

    /// expression     -> logical_or
    /// logical_or     -> logical_and ( "||" logical_and )*
    /// logical_and    -> equality ( "&&" equality )*
    /// equality       -> comparison ( ( "!=" | "==" ) comparison )*
    /// comparison     -> term ( ( "<" | "<=" | ">" | ">=" ) term )*
    /// term           -> factor ( ( "-" | "+" ) factor )*
    /// factor         -> power ( ( "/" | "*" | "%" ) power )*
    /// power          -> unary ( "**" power )?
    /// unary          -> ( "!" | "-" | "*" | "&" ) unary
    ///                   | postfix
    /// postfix        -> atom ( "(" arguments? ")" | "[" expression "]" )*
    /// atom           -> IDENTIFIER | LITERAL | "(" expression ")"
    ///                   | "[" ( expression ( "," expression )* )? "]"
    ///                   | "conjure" BLOCK
    pub fn parse_expression(&mut self) -> ParseResult<Expression> {
        self.parse_logical_or_expression()
    }

    fn binary(
        &mut self,
        lhs: Expression,
        operator: Token,
        kind: BinaryOperatorKind,
        rhs: Expression,
    ) -> Expression {
        Expression {
            id: self.create_node_id(),
            span: lhs.span.to(rhs.span),
            kind: ExpressionKind::Binary {
                lhs: Box::new(lhs),
                operator: BinaryOperator {
                    id: self.create_node_id(),
                    span: operator.span,
                    kind,
                },
                rhs: Box::new(rhs),
            },
        }
    }

    fn parse_logical_or_expression(&mut self) -> ParseResult<Expression> {
        let mut expression = self.parse_logical_and_expression()?;

        while let Some(operator) = self.next_if(TokenKind::LogicalOr) {
            let rhs = self.parse_logical_and_expression()?;
            expression = self.binary(expression, operator, BinaryOperatorKind::LogicalOr, rhs);
        }

        Ok(expression)
    }

    fn parse_logical_and_expression(&mut self) -> ParseResult<Expression> {
        let mut expression = self.parse_equality_expression()?;

        while let Some(operator) = self.next_if(TokenKind::LogicalAnd) {
            let rhs = self.parse_equality_expression()?;
            expression = self.binary(expression, operator, BinaryOperatorKind::LogicalAnd, rhs);
        }

        Ok(expression)
    }

    fn parse_equality_expression(&mut self) -> ParseResult<Expression> {
        let mut expression = self.parse_comparison_expression()?;

        while let Some(operator) = self.tokens.next_if(|t| t.kind.is_equality_operator()) {
            let kind = match operator.kind {
                TokenKind::DoubleEquals => BinaryOperatorKind::Equals,
                _ => BinaryOperatorKind::NotEquals,
            };

            let rhs = self.parse_comparison_expression()?;
            expression = self.binary(expression, operator, kind, rhs);
        }

        Ok(expression)
    }

    fn parse_comparison_expression(&mut self) -> ParseResult<Expression> {
        let mut expression = self.parse_term_expression()?;

        while let Some(operator) = self.tokens.next_if(|t| t.kind.is_comparison_operator()) {
            let kind = match operator.kind {
                TokenKind::LessThan => BinaryOperatorKind::LessThan,
                TokenKind::LessThanOrEqualTo => BinaryOperatorKind::LessThanOrEqualTo,
                TokenKind::GreaterThan => BinaryOperatorKind::GreaterThan,
                _ => BinaryOperatorKind::GreaterThanOrEqualTo,
            };

            let rhs = self.parse_term_expression()?;
            expression = self.binary(expression, operator, kind, rhs);
        }

        Ok(expression)
    }

    fn parse_term_expression(&mut self) -> ParseResult<Expression> {
        let mut expression = self.parse_factor_expression()?;

        while let Some(operator) = self.tokens.next_if(|t| t.kind.is_term_operator()) {
            let kind = match operator.kind {
                TokenKind::Plus => BinaryOperatorKind::Add,
                _ => BinaryOperatorKind::Subtract,
            };

            let rhs = self.parse_factor_expression()?;
            expression = self.binary(expression, operator, kind, rhs);
        }

        Ok(expression)
    }

    fn parse_factor_expression(&mut self) -> ParseResult<Expression> {
        let mut expression = self.parse_power_expression()?;

        while let Some(operator) = self.tokens.next_if(|t| t.kind.is_factor_operator()) {
            let kind = match operator.kind {
                TokenKind::Asterisk => BinaryOperatorKind::Multiply,
                TokenKind::Divide => BinaryOperatorKind::Divide,
                _ => BinaryOperatorKind::Modulus,
            };

            let rhs = self.parse_power_expression()?;
            expression = self.binary(expression, operator, kind, rhs);
        }

        Ok(expression)
    }

    fn parse_power_expression(&mut self) -> ParseResult<Expression> {
        let base = self.parse_unary_expression()?;

        match self.next_if(TokenKind::Power) {
            Some(operator) => {
                let exponent = self.parse_power_expression()?;
                Ok(self.binary(base, operator, BinaryOperatorKind::Power, exponent))
            }
            None => Ok(base),
        }
    }

    fn parse_unary_expression(&mut self) -> ParseResult<Expression> {
        let Some(operator) = self.tokens.next_if(|t| t.kind.is_unary_operator()) else {
            return self.parse_postfix_expression();
        };

        let kind = match operator.kind {
            TokenKind::Asterisk => UnaryOperatorKind::Deref,
            TokenKind::Ampersand => UnaryOperatorKind::AddressOf,
            TokenKind::Bang => UnaryOperatorKind::LogicalNot,
            _ => UnaryOperatorKind::Negate,
        };

        let operand = self.parse_unary_expression()?;

        Ok(Expression {
            id: self.create_node_id(),
            span: operator.span.to(operand.span),
            kind: ExpressionKind::Unary {
                operator: UnaryOperator {
                    id: self.create_node_id(),
                    span: operator.span,
                    kind,
                },
                operand: Box::new(operand),
            },
        })
    }

    fn parse_postfix_expression(&mut self) -> ParseResult<Expression> {
        let mut expression = self.parse_atomic_expression()?;

        loop {
            if self.next_if(TokenKind::OpenParen).is_some() {
                let arguments = self.parse_comma_separated(TokenKind::CloseParen)?;
                let close_paren = self.expect_next_to_be(TokenKind::CloseParen, "`)`")?;

                expression = Expression {
                    id: self.create_node_id(),
                    span: expression.span.to(close_paren.span),
                    kind: ExpressionKind::FunctionCall {
                        target: Box::new(expression),
                        arguments,
                    },
                };
            } else if self.next_if(TokenKind::OpenBracket).is_some() {
                let index = self.parse_expression()?;
                let close_bracket = self.expect_next_to_be(TokenKind::CloseBracket, "`]`")?;

                expression = Expression {
                    id: self.create_node_id(),
                    span: expression.span.to(close_bracket.span),
                    kind: ExpressionKind::Subscript {
                        target: Box::new(expression),
                        index: Box::new(index),
                    },
                };
            } else {
                return Ok(expression);
            }
        }
    }

    /// Parses `expression ( "," expression )*` up to (not including) `close`
    fn parse_comma_separated(&mut self, close: TokenKind) -> ParseResult<Vec<Expression>> {
        let mut expressions = Vec::new();

        if self.peek_kind_is(0, close) {
            return Ok(expressions);
        }

        expressions.push(self.parse_expression()?);

        while self.next_if(TokenKind::Comma).is_some() {
            expressions.push(self.parse_expression()?);
        }

        Ok(expressions)
    }

    fn parse_atomic_expression(&mut self) -> ParseResult<Expression> {
        let peeked = self.expect_peek("expression")?;

        match peeked.kind {
            TokenKind::Identifier => {
                let identifier = self.parse_identifier()?;

                Ok(Expression {
                    id: self.create_node_id(),
                    span: identifier.span,
                    kind: ExpressionKind::Identifier(identifier),
                })
            }
            TokenKind::OpenParen => {
                let open_paren = self.expect_next("`(`")?;
                let expression = self.parse_expression()?;
                let close_paren = self.expect_next_to_be(TokenKind::CloseParen, "`)`")?;

                Ok(Expression {
                    id: self.create_node_id(),
                    span: open_paren.span.to(close_paren.span),
                    kind: ExpressionKind::Grouping(Box::new(expression)),
                })
            }
            TokenKind::OpenBracket => {
                let open_bracket = self.expect_next("`[`")?;
                let elements = self.parse_comma_separated(TokenKind::CloseBracket)?;
                let close_bracket = self.expect_next_to_be(TokenKind::CloseBracket, "`]`")?;

                Ok(Expression {
                    id: self.create_node_id(),
                    span: open_bracket.span.to(close_bracket.span),
                    kind: ExpressionKind::Array(elements),
                })
            }
            TokenKind::Keyword(Keyword::Conjure) => {
                let conjure_keyword = self.expect_keyword(Keyword::Conjure)?;
                let block = self.parse_block()?;

                Ok(Expression {
                    id: self.create_node_id(),
                    span: conjure_keyword.span.to(block.span),
                    kind: ExpressionKind::Conjure(Box::new(block)),
                })
            }
            kind if kind.is_literal() => {
                let literal = self.parse_literal()?;

                Ok(Expression {
                    id: self.create_node_id(),
                    span: literal.span,
                    kind: ExpressionKind::Literal(literal),
                })
            }
            _ => Err(self.unexpected(peeked, "expression")),
        }
    }

    fn parse_literal(&mut self) -> ParseResult<Literal> {
        let token = self.expect_next("literal")?;

        let kind = match token.kind {
            TokenKind::BooleanLiteral => LiteralKind::Boolean,
            TokenKind::NullLiteral => LiteralKind::Null,
            TokenKind::IntegerLiteral => LiteralKind::Integer,
            TokenKind::FloatLiteral => LiteralKind::Float,
            TokenKind::StringLiteral => LiteralKind::String,
            TokenKind::GlyphLiteral => LiteralKind::Glyph,
            TokenKind::CodepointLiteral => LiteralKind::Codepoint,
            _ => return Err(self.unexpected(token, "literal")),
        };

        Ok(Literal {
            id: self.create_node_id(),
            span: token.span,
            kind,
            symbol: InternedSymbol::new(self.source.value_of_span(token.span)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Vec<StatementKind> {
        let source = SourceFile::from_memory(source);

        Parser::parse_module(&source)
            .unwrap()
            .statements
            .into_iter()
            .map(|statement| statement.kind)
            .collect()
    }

    fn parse_error(source: &str) -> SyntaxError {
        let source = SourceFile::from_memory(source);

        Parser::parse_module(&source).unwrap_err()
    }

    #[test]
    fn parses_imports_and_main() {
        let statements = parse("affix io@exscribe;\nmain = exscribe (2 + 2);");

        let [StatementKind::Import(import), StatementKind::Main(main)] = statements.as_slice() else {
            panic!("unexpected statements: {statements:#?}");
        };

        assert_eq!(import.module.symbol.value(), "io");
        assert_eq!(import.symbol.symbol.value(), "exscribe");
        assert!(matches!(main.statements[0].kind, StatementKind::Print(_)));
    }

    #[test]
    fn terminator_is_optional_before_closing_brace() {
        let statements = parse("evoke add(a: int32, b: int32) -> int32 { return (a + b) }");

        let [StatementKind::FunctionDefinition(definition)] = statements.as_slice() else {
            panic!("unexpected statements: {statements:#?}");
        };

        assert_eq!(definition.parameters.parameters.len(), 2);
        assert!(definition.return_type.is_some());

        let FunctionBody::Block(body) = &definition.body else {
            panic!("expected block body");
        };

        assert!(matches!(body.statements[0].kind, StatementKind::Return(Some(_))));
    }

    #[test]
    fn parses_expression_bodied_functions() {
        let statements = parse("evoke square(x: int32) -> int32 = (x * x);");

        let [StatementKind::FunctionDefinition(definition)] = statements.as_slice() else {
            panic!("unexpected statements: {statements:#?}");
        };

        assert!(matches!(definition.body, FunctionBody::Expression(_)));
    }

    #[test]
    fn power_is_right_associative_and_binds_tighter_than_factors() {
        let statements = parse("x = 2 * 3 ** 2 ** 1;");

        let [StatementKind::Assignment { value, .. }] = statements.as_slice() else {
            panic!("unexpected statements: {statements:#?}");
        };

        let ExpressionKind::Binary { operator, rhs, .. } = &value.kind else {
            panic!("expected binary expression");
        };

        assert_eq!(operator.kind, BinaryOperatorKind::Multiply);

        let ExpressionKind::Binary { operator, rhs, .. } = &rhs.kind else {
            panic!("expected power expression");
        };

        assert_eq!(operator.kind, BinaryOperatorKind::Power);
        assert!(matches!(
            &rhs.kind,
            ExpressionKind::Binary { operator, .. } if operator.kind == BinaryOperatorKind::Power
        ));
    }

    #[test]
    fn parses_type_modifiers() {
        let statements = parse("let d: (*int32)? = null; let f: *(int32?) = &z; let g: [[uint8]] = [];");

        let kinds = statements
            .iter()
            .map(|statement| match statement {
                StatementKind::Local(local) => match &local.ty.as_ref().unwrap().kind {
                    TypeKind::Optional(inner) => format!("optional {:?}", matches!(inner.kind, TypeKind::Pointer(_))),
                    TypeKind::Pointer(inner) => format!("pointer {:?}", matches!(inner.kind, TypeKind::Optional(_))),
                    TypeKind::Array(inner) => format!("array {:?}", matches!(inner.kind, TypeKind::Array(_))),
                    other => format!("{other:?}"),
                },
                other => format!("{other:?}"),
            })
            .collect::<Vec<_>>();

        assert_eq!(kinds, vec!["optional true", "pointer true", "array true"]);
    }

    #[test]
    fn distinguishes_conjure_bindings_from_constant_bindings() {
        let statements = parse(
            "double: (x: int32) -> int32 = conjure { return x * 2 };\nlimit: uint8 = 200;\nf: conjure(int32) -> int32 = double;",
        );

        assert!(matches!(statements[0], StatementKind::ConjureBinding(_)));
        assert!(matches!(&statements[1], StatementKind::Local(local) if !local.is_mutable));
        assert!(matches!(
            &statements[2],
            StatementKind::Local(local)
                if matches!(local.ty.as_ref().unwrap().kind, TypeKind::Function { .. })
        ));
    }

    #[test]
    fn parses_else_if_chains_and_postfix_statements() {
        let statements = parse("if a { x++; } else if b { x--; } else { break; }");

        let [StatementKind::If(if_statement)] = statements.as_slice() else {
            panic!("unexpected statements: {statements:#?}");
        };

        let Some(ElseBranch::If(nested)) = &if_statement.negative else {
            panic!("expected else-if");
        };

        assert!(matches!(nested.negative, Some(ElseBranch::Block(_))));
        assert!(matches!(if_statement.positive.statements[0].kind, StatementKind::Increment(_)));
    }

    #[test]
    fn invoke_requires_a_call() {
        let error = parse_error("invoke x;");

        assert_eq!(error.message, "expected function call after `invoke`");
        assert_eq!(error.span, Span::new(7, 8));
    }

    #[test]
    fn reports_missing_terminators() {
        let error = parse_error("let x = 1 let y = 2;");

        assert_eq!(error.message, "expected `;` but found `let`");
    }

    #[test]
    fn reports_unexpected_end_of_file() {
        let error = parse_error("evoke f(");

        assert_eq!(error.message, "expected identifier but reached end of file");
    }
}
