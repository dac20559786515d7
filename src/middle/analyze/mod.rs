//! Semantic analysis: resolves every name against the lexical scope chain,
//! type checks the parsed [`Module`] and lowers it into a [`Program`].
//!
//! Analysis stops at the first error. Function definitions are hoisted per
//! statement list so a function may call itself or anything declared later
//! beside it.

mod error;
mod scope;

use hashbrown::{HashMap, HashSet};
use num::{BigInt, BigRational, Signed, ToPrimitive, Zero};
use tracing::debug;

pub use self::{
    error::{AnalysisError, AnalysisErrorKind, AnalysisResult, Expected, TypeBoundary},
    scope::{Entity, ScopeId, ScopeTree},
};
use super::{
    hir::{
        Expression, ExpressionKind, Function, FunctionId, FunctionKind, Literal, Program,
        Statement, UnaryOperator, Variable, VariableId,
    },
    primitive::NumericType,
    stdlib::{self, Intrinsic},
    ty::{ConstValue, FunctionType, Type},
};
use crate::{
    frontend::{
        ast::{self, BinaryOperatorKind, LiteralKind, Module, NodeId, UnaryOperatorKind},
        intern::InternedSymbol,
        lexer::{Span, decode_codepoint, decode_quoted},
    },
    index::IndexVec,
};

pub fn analyze_module(module: &Module) -> AnalysisResult<Program> {
    let mut analyzer = Analyzer::default();
    let root = analyzer.scopes.root();
    let statements = analyzer.analyze_statements(&module.statements, root)?;

    debug!(
        variables = analyzer.variables.len(),
        functions = analyzer.functions.len(),
        "analyzed module"
    );

    Ok(Program {
        statements,
        variables: analyzer.variables,
        functions: analyzer.functions,
    })
}

#[derive(Debug, Default)]
struct Analyzer {
    scopes: ScopeTree,
    variables: IndexVec<VariableId, Variable>,
    functions: IndexVec<FunctionId, Function>,
    /// Function definitions registered ahead of their statement
    hoisted: HashMap<NodeId, FunctionId>,
    /// Functions whose return type comes from their `return` statements
    inferring: HashSet<FunctionId>,
    /// Inferred functions that have not reached a `return` yet
    unresolved: HashSet<FunctionId>,
    seen_main: bool,
}

impl Analyzer {
    fn analyze_statements(
        &mut self,
        statements: &[ast::Statement],
        scope: ScopeId,
    ) -> AnalysisResult<Vec<Statement>> {
        for statement in statements {
            if let ast::StatementKind::FunctionDefinition(definition) = &statement.kind {
                let function = self.declare_function(
                    definition.name,
                    &definition.parameters,
                    definition.return_type.as_ref(),
                    FunctionKind::Declared,
                    scope,
                )?;

                self.hoisted.insert(statement.id, function);
            }
        }

        statements
            .iter()
            .map(|statement| self.analyze_statement(statement, scope))
            .collect()
    }

    fn analyze_block(&mut self, block: &ast::Block, scope: ScopeId) -> AnalysisResult<Vec<Statement>> {
        let scope = self.scopes.child(scope);
        self.analyze_statements(&block.statements, scope)
    }

    fn analyze_statement(
        &mut self,
        statement: &ast::Statement,
        scope: ScopeId,
    ) -> AnalysisResult<Statement> {
        match &statement.kind {
            ast::StatementKind::Import(import) => self.analyze_import(import, scope),
            ast::StatementKind::FunctionDefinition(definition) => {
                let function = match self.hoisted.get(&statement.id).copied() {
                    Some(function) => function,
                    None => self.declare_function(
                        definition.name,
                        &definition.parameters,
                        definition.return_type.as_ref(),
                        FunctionKind::Declared,
                        scope,
                    )?,
                };

                let body_scope = self.enter_function(function, &definition.parameters, scope)?;
                let body = match &definition.body {
                    ast::FunctionBody::Block(block) => {
                        self.analyze_statements(&block.statements, body_scope)?
                    }
                    ast::FunctionBody::Expression(expression) => {
                        vec![self.analyze_return(Some(expression), expression.span, body_scope)?]
                    }
                };

                self.finish_function(function, &body, false, definition.name.span)?;

                Ok(Statement::FunctionDeclaration { function, body })
            }
            ast::StatementKind::ConjureBinding(binding) => {
                let function = self.declare_function(
                    binding.name,
                    &binding.parameters,
                    binding.return_type.as_ref(),
                    FunctionKind::Conjured,
                    scope,
                )?;

                let body_scope = self.enter_function(function, &binding.parameters, scope)?;
                let body = self.analyze_statements(&binding.body.statements, body_scope)?;

                self.finish_function(function, &body, true, binding.name.span)?;

                Ok(Statement::FunctionDeclaration { function, body })
            }
            ast::StatementKind::Main(block) => {
                if self.seen_main {
                    return Err(AnalysisError::duplicate("main", statement.span));
                }
                self.seen_main = true;

                Ok(Statement::Main(self.analyze_block(block, scope)?))
            }
            ast::StatementKind::Local(local) => self.analyze_local(local, scope),
            ast::StatementKind::Print(expression) => {
                match self.scopes.lookup(scope, InternedSymbol::new("exscribe")) {
                    Some(Entity::Intrinsic(Intrinsic::Exscribe)) => {}
                    _ => return Err(AnalysisError::undeclared("exscribe", statement.span)),
                }

                self.analyze_print(expression, scope)
            }
            ast::StatementKind::Invoke(expression) => {
                if let Some(argument) = self.as_exscribe_call(expression, scope) {
                    return self.analyze_print(argument, scope);
                }

                Ok(Statement::Invoke(self.analyze_expression(expression, scope)?))
            }
            ast::StatementKind::Assignment { target, value } => {
                self.analyze_assignment(target, value, scope)
            }
            ast::StatementKind::Increment(target) => {
                let variable = self.analyze_step_target(target, scope)?;
                Ok(Statement::Increment(variable))
            }
            ast::StatementKind::Decrement(target) => {
                let variable = self.analyze_step_target(target, scope)?;
                Ok(Statement::Decrement(variable))
            }
            ast::StatementKind::If(if_statement) => self.analyze_if(if_statement, scope),
            ast::StatementKind::While { condition, block } => {
                let condition =
                    self.analyze_condition(condition, TypeBoundary::WhileCondition, scope)?;
                let body_scope = self.scopes.enter_loop(scope);
                let body = self.analyze_statements(&block.statements, body_scope)?;

                Ok(Statement::While { condition, body })
            }
            ast::StatementKind::Break => {
                if !self.scopes.in_loop(scope) {
                    return Err(AnalysisError::new(
                        AnalysisErrorKind::BreakOutsideLoop,
                        statement.span,
                    ));
                }

                Ok(Statement::Break)
            }
            ast::StatementKind::Return(value) => {
                self.analyze_return(value.as_deref(), statement.span, scope)
            }
            ast::StatementKind::Block(block) => Ok(Statement::Block(self.analyze_block(block, scope)?)),
            ast::StatementKind::Expression(expression) => {
                if let Some(argument) = self.as_exscribe_call(expression, scope) {
                    return self.analyze_print(argument, scope);
                }

                Ok(Statement::Expression(self.analyze_expression(expression, scope)?))
            }
        }
    }

    fn analyze_import(&mut self, import: &ast::Import, scope: ScopeId) -> AnalysisResult<Statement> {
        let intrinsic = stdlib::lookup(import.module.symbol.value(), import.symbol.symbol.value())
            .map_err(|error| AnalysisError::library(error, import.span))?;

        self.scopes
            .declare(scope, import.symbol.symbol, Entity::Intrinsic(intrinsic))
            .map_err(|_| AnalysisError::duplicate(import.symbol.symbol.value(), import.symbol.span))?;

        Ok(Statement::Import(intrinsic))
    }

    /// Registers a function's signature in `scope` without looking at its body
    fn declare_function(
        &mut self,
        name: ast::Identifier,
        parameters: &ast::FunctionParameterList,
        return_type: Option<&ast::Type>,
        kind: FunctionKind,
        scope: ScopeId,
    ) -> AnalysisResult<FunctionId> {
        let mut parameter_ids = Vec::with_capacity(parameters.parameters.len());

        for parameter in &parameters.parameters {
            let ty = self.resolve_type(&parameter.ty)?;

            parameter_ids.push(self.variables.push(Variable {
                name: parameter.name.symbol,
                ty,
                mutable: false,
                constant: None,
            }));
        }

        let inferred = return_type.is_none();
        let return_type = match return_type {
            Some(ty) => self.resolve_type(ty)?,
            None => Type::VOID,
        };

        let function = self.functions.push(Function {
            name: name.symbol,
            parameters: parameter_ids,
            return_type,
            kind,
        });

        if inferred {
            self.inferring.insert(function);
            self.unresolved.insert(function);
        }

        self.scopes
            .declare(scope, name.symbol, Entity::Function(function))
            .map_err(|_| AnalysisError::duplicate(name.symbol.value(), name.span))?;

        debug!(name = %name.symbol, ty = %self.function_type(function), "declared function");

        Ok(function)
    }

    /// Opens the body scope of `function` and binds its parameters there
    fn enter_function(
        &mut self,
        function: FunctionId,
        parameters: &ast::FunctionParameterList,
        scope: ScopeId,
    ) -> AnalysisResult<ScopeId> {
        let body_scope = self.scopes.enter_function(scope, function);

        for (parameter, variable) in parameters
            .parameters
            .iter()
            .zip(self.functions[function].parameters.clone())
        {
            self.scopes
                .declare(body_scope, parameter.name.symbol, Entity::Variable(variable))
                .map_err(|_| {
                    AnalysisError::duplicate(parameter.name.symbol.value(), parameter.name.span)
                })?;
        }

        Ok(body_scope)
    }

    /// Settles the return type of `function` once its body has been analyzed
    /// and checks that the body returns where it has to.
    fn finish_function(
        &mut self,
        function: FunctionId,
        body: &[Statement],
        require_return: bool,
        span: Span,
    ) -> AnalysisResult<()> {
        let inferred = self.inferring.remove(&function);
        // An inferred function that never returned a value returns void
        self.unresolved.remove(&function);

        let declaration = &self.functions[function];
        let missing_return = || {
            AnalysisError::new(
                AnalysisErrorKind::MissingReturn {
                    name: declaration.name.value().to_owned(),
                },
                span,
            )
        };

        if require_return && !contains_return(body) {
            return Err(missing_return());
        }

        let returns_value = !declaration.return_type.is_void() && !declaration.return_type.is_any();
        if !inferred && returns_value && !always_returns(body) {
            return Err(missing_return());
        }

        Ok(())
    }

    fn function_type(&self, function: FunctionId) -> Type {
        let declaration = &self.functions[function];
        let parameters = declaration
            .parameters
            .iter()
            .map(|parameter| self.variables[*parameter].ty.clone())
            .collect();

        Type::function(parameters, self.return_type_of(function))
    }

    /// Calls to a function whose return type is still being inferred (direct
    /// recursion, or a call to a later sibling) are typed `any`
    fn return_type_of(&self, function: FunctionId) -> Type {
        if self.unresolved.contains(&function) {
            Type::ANY
        } else {
            self.functions[function].return_type.clone()
        }
    }

    fn analyze_return(
        &mut self,
        value: Option<&ast::Expression>,
        span: Span,
        scope: ScopeId,
    ) -> AnalysisResult<Statement> {
        let Some(function) = self.scopes.function(scope) else {
            return Err(AnalysisError::new(
                AnalysisErrorKind::ReturnOutsideFunction,
                span,
            ));
        };

        let boundary = if self.inferring.contains(&function) {
            TypeBoundary::InferredReturn
        } else {
            TypeBoundary::ExplicitReturn
        };

        let value = match value {
            Some(value) => {
                let span = value.span;
                let value = self.analyze_expression(value, scope)?;

                if value.ty.is_void() {
                    return Err(AnalysisError::mismatch(boundary, Expected::Value, &value.ty, span));
                }

                Some((value, span))
            }
            None => None,
        };

        if self.unresolved.remove(&function) {
            let return_type = value
                .as_ref()
                .map_or(Type::VOID, |(value, _)| value.ty.clone());

            debug!(
                name = %self.functions[function].name,
                ty = %return_type,
                "inferred return type"
            );

            self.functions[function].return_type = return_type;
            return Ok(Statement::Return(value.map(|(value, _)| value)));
        }

        let expected = self.functions[function].return_type.clone();

        match value {
            None if expected.is_void() || expected.is_any() => Ok(Statement::Return(None)),
            None => Err(AnalysisError::mismatch(
                boundary,
                Expected::Type(expected),
                &Type::VOID,
                span,
            )),
            Some((value, value_span)) => {
                if expected.is_void() {
                    return Err(AnalysisError::mismatch(
                        boundary,
                        Expected::Type(expected),
                        &value.ty,
                        value_span,
                    ));
                }

                let value = self.coerce(value, &expected, boundary, value_span)?;
                Ok(Statement::Return(Some(value)))
            }
        }
    }

    fn analyze_local(&mut self, local: &ast::Local, scope: ScopeId) -> AnalysisResult<Statement> {
        if let (false, Some(annotation), ast::ExpressionKind::Conjure(block)) =
            (local.is_mutable, &local.ty, &local.initializer.kind)
        {
            if let Type::Function(signature) = self.resolve_type(annotation)? {
                return self.analyze_annotated_conjure(local.name, &signature, block, scope);
            }
        }

        let span = local.initializer.span;
        let mut initializer = self.analyze_expression(&local.initializer, scope)?;

        if initializer.ty.is_void() {
            return Err(AnalysisError::mismatch(
                TypeBoundary::LetStatement,
                Expected::Value,
                &initializer.ty,
                span,
            ));
        }

        if let Some(ty) = &local.ty {
            let ty = self.resolve_type(ty)?;
            initializer = self.coerce(initializer, &ty, TypeBoundary::LetStatement, span)?;
        }

        let constant = if local.is_mutable {
            None
        } else {
            self.known_value(&initializer)
        };

        let variable = self.variables.push(Variable {
            name: local.name.symbol,
            ty: initializer.ty.clone(),
            mutable: local.is_mutable,
            constant,
        });

        self.scopes
            .declare(scope, local.name.symbol, Entity::Variable(variable))
            .map_err(|_| AnalysisError::duplicate(local.name.symbol.value(), local.name.span))?;

        Ok(Statement::VariableDeclaration {
            variable,
            initializer,
        })
    }

    /// `name: conjure(int32) -> int32 = conjure { ... };`
    ///
    /// The annotation only names parameter types, so the parameters get no
    /// binding inside the body.
    fn analyze_annotated_conjure(
        &mut self,
        name: ast::Identifier,
        signature: &FunctionType,
        block: &ast::Block,
        scope: ScopeId,
    ) -> AnalysisResult<Statement> {
        let parameters = signature
            .parameters
            .iter()
            .map(|ty| {
                self.variables.push(Variable {
                    name: InternedSymbol::new("arg"),
                    ty: ty.clone(),
                    mutable: false,
                    constant: None,
                })
            })
            .collect();

        let function = self.functions.push(Function {
            name: name.symbol,
            parameters,
            return_type: (*signature.return_type).clone(),
            kind: FunctionKind::Conjured,
        });

        self.scopes
            .declare(scope, name.symbol, Entity::Function(function))
            .map_err(|_| AnalysisError::duplicate(name.symbol.value(), name.span))?;

        debug!(name = %name.symbol, ty = %self.function_type(function), "declared function");

        let body_scope = self.scopes.enter_function(scope, function);
        let body = self.analyze_statements(&block.statements, body_scope)?;

        self.finish_function(function, &body, true, name.span)?;

        Ok(Statement::FunctionDeclaration { function, body })
    }

    fn analyze_print(&mut self, value: &ast::Expression, scope: ScopeId) -> AnalysisResult<Statement> {
        let expression = self.analyze_expression(value, scope)?;

        if expression.ty.is_void() {
            return Err(AnalysisError::mismatch(
                TypeBoundary::Print,
                Expected::Value,
                &expression.ty,
                value.span,
            ));
        }

        Ok(Statement::Print(expression))
    }

    /// `exscribe(x)` written as a call is the print statement in disguise
    fn as_exscribe_call<'a>(
        &self,
        expression: &'a ast::Expression,
        scope: ScopeId,
    ) -> Option<&'a ast::Expression> {
        let ast::ExpressionKind::FunctionCall { target, arguments } = &expression.kind else {
            return None;
        };

        let ast::ExpressionKind::Identifier(identifier) = &target.kind else {
            return None;
        };

        match (self.scopes.lookup(scope, identifier.symbol), arguments.as_slice()) {
            (Some(Entity::Intrinsic(Intrinsic::Exscribe)), [argument]) => Some(argument),
            _ => None,
        }
    }

    fn analyze_assignment(
        &mut self,
        target: &ast::Expression,
        value: &ast::Expression,
        scope: ScopeId,
    ) -> AnalysisResult<Statement> {
        self.check_assignable(target, scope)?;

        let target = self.analyze_expression(target, scope)?;
        let value_span = value.span;
        let value = self.analyze_expression(value, scope)?;

        if value.ty.is_void() {
            return Err(AnalysisError::mismatch(
                TypeBoundary::Assignment,
                Expected::Value,
                &value.ty,
                value_span,
            ));
        }

        let value = self.coerce(value, &target.ty, TypeBoundary::Assignment, value_span)?;

        Ok(Statement::Assignment { target, value })
    }

    /// A place is a mutable variable, an element of one, or a dereferenced
    /// pointer
    fn check_assignable(&self, target: &ast::Expression, scope: ScopeId) -> AnalysisResult<()> {
        match &target.kind {
            ast::ExpressionKind::Grouping(inner) => self.check_assignable(inner, scope),
            ast::ExpressionKind::Identifier(identifier) => {
                match self.scopes.lookup(scope, identifier.symbol) {
                    Some(Entity::Variable(variable)) if self.variables[variable].mutable => Ok(()),
                    Some(Entity::Variable(_)) => Err(AnalysisError::new(
                        AnalysisErrorKind::ImmutableAssignment {
                            name: identifier.symbol.value().to_owned(),
                        },
                        target.span,
                    )),
                    Some(_) => Err(AnalysisError::new(
                        AnalysisErrorKind::NotAssignable,
                        target.span,
                    )),
                    None => Err(AnalysisError::undeclared(
                        identifier.symbol.value(),
                        identifier.span,
                    )),
                }
            }
            ast::ExpressionKind::Subscript { target: array, .. } => match &array.kind {
                ast::ExpressionKind::Identifier(_)
                | ast::ExpressionKind::Grouping(_)
                | ast::ExpressionKind::Subscript { .. } => self.check_assignable(array, scope),
                _ => Ok(()),
            },
            ast::ExpressionKind::Unary { operator, .. }
                if operator.kind == UnaryOperatorKind::Deref =>
            {
                Ok(())
            }
            _ => Err(AnalysisError::new(
                AnalysisErrorKind::NotAssignable,
                target.span,
            )),
        }
    }

    /// The target of `x++` or `x--`
    fn analyze_step_target(
        &mut self,
        target: &ast::Expression,
        scope: ScopeId,
    ) -> AnalysisResult<VariableId> {
        self.check_assignable(target, scope)?;

        let expression = self.analyze_expression(target, scope)?;

        let ExpressionKind::Variable(variable) = expression.kind else {
            return Err(AnalysisError::new(
                AnalysisErrorKind::NotAssignable,
                target.span,
            ));
        };

        if !expression.ty.is_numeric() && !expression.ty.is_any() {
            return Err(AnalysisError::mismatch(
                TypeBoundary::Increment,
                Expected::Numeric,
                &expression.ty,
                target.span,
            ));
        }

        Ok(variable)
    }

    fn analyze_if(&mut self, if_statement: &ast::If, scope: ScopeId) -> AnalysisResult<Statement> {
        let condition =
            self.analyze_condition(&if_statement.condition, TypeBoundary::IfCondition, scope)?;
        let positive = self.analyze_block(&if_statement.positive, scope)?;
        let negative = match &if_statement.negative {
            Some(ast::ElseBranch::Block(block)) => self.analyze_block(block, scope)?,
            Some(ast::ElseBranch::If(nested)) => vec![self.analyze_if(nested, scope)?],
            None => Vec::new(),
        };

        Ok(Statement::If {
            condition,
            positive,
            negative,
        })
    }

    fn analyze_condition(
        &mut self,
        condition: &ast::Expression,
        boundary: TypeBoundary,
        scope: ScopeId,
    ) -> AnalysisResult<Expression> {
        let expression = self.analyze_expression(condition, scope)?;

        if !expression.ty.is_bool() {
            return Err(AnalysisError::mismatch(
                boundary,
                Expected::Boolean,
                &expression.ty,
                condition.span,
            ));
        }

        Ok(expression)
    }

    /// Checks that `expression` may be stored where a `target` is expected
    /// and retypes it to `target`
    fn coerce(
        &self,
        mut expression: Expression,
        target: &Type,
        boundary: TypeBoundary,
        span: Span,
    ) -> AnalysisResult<Expression> {
        let value = self.known_value(&expression);

        if !expression.ty.can_convert(target, value.as_ref()) {
            return Err(AnalysisError::mismatch(
                boundary,
                Expected::Type(target.clone()),
                &expression.ty,
                span,
            ));
        }

        if !target.is_any() {
            expression.ty = target.clone();
        }

        Ok(expression)
    }

    fn analyze_expression(
        &mut self,
        expression: &ast::Expression,
        scope: ScopeId,
    ) -> AnalysisResult<Expression> {
        match &expression.kind {
            ast::ExpressionKind::Literal(literal) => self.analyze_literal(literal),
            ast::ExpressionKind::Identifier(identifier) => {
                match self.scopes.lookup(scope, identifier.symbol) {
                    Some(Entity::Variable(variable)) => Ok(Expression::new(
                        ExpressionKind::Variable(variable),
                        self.variables[variable].ty.clone(),
                    )),
                    Some(Entity::Function(function)) => Ok(Expression::new(
                        ExpressionKind::Function(function),
                        self.function_type(function),
                    )),
                    Some(Entity::Intrinsic(intrinsic)) => Err(AnalysisError::new(
                        AnalysisErrorKind::MisplacedIntrinsic {
                            name: intrinsic.symbol().to_owned(),
                        },
                        identifier.span,
                    )),
                    None => Err(AnalysisError::undeclared(
                        identifier.symbol.value(),
                        identifier.span,
                    )),
                }
            }
            ast::ExpressionKind::Grouping(inner) => self.analyze_expression(inner, scope),
            ast::ExpressionKind::Array(elements) => self.analyze_array(elements, scope),
            ast::ExpressionKind::FunctionCall { target, arguments } => {
                self.analyze_call(target, arguments, expression.span, scope)
            }
            ast::ExpressionKind::Subscript { target, index } => {
                self.analyze_subscript(target, index, scope)
            }
            ast::ExpressionKind::Binary { lhs, operator, rhs } => {
                self.analyze_binary(lhs, operator.kind, rhs, scope)
            }
            ast::ExpressionKind::Unary { operator, operand } => {
                self.analyze_unary(operator.kind, operand, expression.span, scope)
            }
            ast::ExpressionKind::Conjure(block) => {
                let function = self.functions.push(Function {
                    name: InternedSymbol::new("conjure"),
                    parameters: Vec::new(),
                    return_type: Type::VOID,
                    kind: FunctionKind::Anonymous,
                });
                self.inferring.insert(function);
                self.unresolved.insert(function);

                let body_scope = self.scopes.enter_function(scope, function);
                let body = self.analyze_statements(&block.statements, body_scope)?;

                self.finish_function(function, &body, true, expression.span)?;

                Ok(Expression::new(
                    ExpressionKind::Conjure { function, body },
                    self.functions[function].return_type.clone(),
                ))
            }
        }
    }

    fn analyze_literal(&self, literal: &ast::Literal) -> AnalysisResult<Expression> {
        let text = literal.symbol.value();
        let invalid = || {
            AnalysisError::new(
                AnalysisErrorKind::InvalidLiteral {
                    text: text.to_owned(),
                },
                literal.span,
            )
        };

        let (value, ty) = match literal.kind {
            LiteralKind::Boolean => (Literal::Boolean(text == "true"), Type::BOOL),
            LiteralKind::Null => (Literal::Null, Type::optional_of(Type::ANY)),
            LiteralKind::Integer => {
                let value = text.parse::<BigInt>().map_err(|_| invalid())?;
                let ty = Type::Numeric(NumericType::for_integer_literal(&value));

                (Literal::Integer(value), ty)
            }
            LiteralKind::Float => {
                let value = text
                    .parse::<f64>()
                    .ok()
                    .filter(|value| value.is_finite())
                    .ok_or_else(invalid)?;

                (Literal::Float(value), Type::Numeric(NumericType::FLOAT32))
            }
            LiteralKind::String => (Literal::String(decode_quoted(text)), Type::STRING),
            LiteralKind::Glyph => {
                let decoded = decode_quoted(text);
                let mut chars = decoded.chars();

                match (chars.next(), chars.next()) {
                    (Some(glyph), None) => (Literal::Glyph(glyph), Type::GLYPH),
                    _ => return Err(invalid()),
                }
            }
            LiteralKind::Codepoint => {
                let codepoint = decode_codepoint(text).ok_or_else(invalid)?;

                (Literal::Codepoint(codepoint), Type::CODEPOINT)
            }
        };

        Ok(Expression::literal(value, ty))
    }

    fn analyze_array(
        &mut self,
        elements: &[ast::Expression],
        scope: ScopeId,
    ) -> AnalysisResult<Expression> {
        let mut analyzed: Vec<Expression> = Vec::with_capacity(elements.len());

        for element in elements {
            let expression = self.analyze_expression(element, scope)?;

            if expression.ty.is_void() {
                return Err(AnalysisError::mismatch(
                    TypeBoundary::ArrayElement,
                    Expected::Value,
                    &expression.ty,
                    element.span,
                ));
            }

            // The first element decides the element type
            if let Some(first) = analyzed.first() {
                let value = self.known_value(&expression);

                if !expression.ty.can_convert(&first.ty, value.as_ref()) {
                    return Err(AnalysisError::mismatch(
                        TypeBoundary::ArrayElement,
                        Expected::Type(first.ty.clone()),
                        &expression.ty,
                        element.span,
                    ));
                }
            }

            analyzed.push(expression);
        }

        let element_type = analyzed
            .first()
            .map_or(Type::ANY, |first| first.ty.clone());
        let ty = Type::array_of(element_type);

        Ok(Expression::new(ExpressionKind::Array(analyzed), ty))
    }

    fn analyze_subscript(
        &mut self,
        target: &ast::Expression,
        index: &ast::Expression,
        scope: ScopeId,
    ) -> AnalysisResult<Expression> {
        let array = self.analyze_expression(target, scope)?;

        let element_type = match array.ty.unwrap_array() {
            Some(element) => element.clone(),
            None if array.ty.is_any() => Type::ANY,
            None => {
                return Err(AnalysisError::new(
                    AnalysisErrorKind::NotAnArray {
                        found: array.ty.clone(),
                    },
                    target.span,
                ));
            }
        };

        let index_span = index.span;
        let index = self.analyze_expression(index, scope)?;

        if !index.ty.is_numeric() && !index.ty.is_any() {
            return Err(AnalysisError::mismatch(
                TypeBoundary::SubscriptIndex,
                Expected::Numeric,
                &index.ty,
                index_span,
            ));
        }

        if let Some(ConstValue::Number(position)) = self.known_value(&index) {
            if position.is_negative() {
                return Err(AnalysisError::new(
                    AnalysisErrorKind::NegativeIndex,
                    index_span,
                ));
            }

            if let Some(ConstValue::Array(items)) = self.known_value(&array) {
                let in_range = position
                    .to_integer()
                    .to_usize()
                    .is_some_and(|position| position < items.len());

                if !in_range {
                    return Err(AnalysisError::new(
                        AnalysisErrorKind::IndexOutOfRange {
                            index: position.to_string(),
                            length: items.len(),
                        },
                        index_span,
                    ));
                }
            }
        }

        Ok(Expression::new(
            ExpressionKind::Subscript {
                array: Box::new(array),
                index: Box::new(index),
            },
            element_type,
        ))
    }

    fn analyze_binary(
        &mut self,
        lhs_node: &ast::Expression,
        operator: BinaryOperatorKind,
        rhs_node: &ast::Expression,
        scope: ScopeId,
    ) -> AnalysisResult<Expression> {
        let lhs = self.analyze_expression(lhs_node, scope)?;
        let rhs = self.analyze_expression(rhs_node, scope)?;

        for (operand, node) in [(&lhs, lhs_node), (&rhs, rhs_node)] {
            if operand.ty.is_void() {
                return Err(AnalysisError::mismatch(
                    TypeBoundary::BinaryOperand,
                    Expected::Value,
                    &operand.ty,
                    node.span,
                ));
            }
        }

        let lhs_value = self.known_value(&lhs);
        let rhs_value = self.known_value(&rhs);

        let require = |operand: &Expression, node: &ast::Expression, accepts: fn(&Type) -> bool, expected: Expected| {
            if accepts(&operand.ty) || operand.ty.is_any() {
                Ok(())
            } else {
                Err(AnalysisError::mismatch(
                    TypeBoundary::BinaryOperand,
                    expected,
                    &operand.ty,
                    node.span,
                ))
            }
        };

        let compatible = || {
            if lhs
                .ty
                .are_compatible(&rhs.ty, lhs_value.as_ref(), rhs_value.as_ref())
            {
                Ok(())
            } else {
                Err(AnalysisError::mismatch(
                    TypeBoundary::BinaryOperand,
                    Expected::Type(lhs.ty.clone()),
                    &rhs.ty,
                    rhs_node.span,
                ))
            }
        };

        let ty = if operator.is_logical() {
            require(&lhs, lhs_node, Type::is_bool, Expected::Boolean)?;
            require(&rhs, rhs_node, Type::is_bool, Expected::Boolean)?;

            Type::BOOL
        } else if operator.is_equality() {
            compatible()?;

            Type::BOOL
        } else if operator.is_ordering() {
            require(&lhs, lhs_node, Type::is_numeric, Expected::Numeric)?;
            require(&rhs, rhs_node, Type::is_numeric, Expected::Numeric)?;
            compatible()?;

            Type::BOOL
        } else if operator == BinaryOperatorKind::Add && (lhs.ty.is_text() || rhs.ty.is_text()) {
            // Concatenation always produces a string, even for two glyphs
            require(&lhs, lhs_node, Type::is_text, Expected::Type(Type::STRING))?;
            require(&rhs, rhs_node, Type::is_text, Expected::Type(Type::STRING))?;

            Type::STRING
        } else {
            let expected = if operator == BinaryOperatorKind::Add {
                Expected::NumericOrText
            } else {
                Expected::Numeric
            };

            require(&lhs, lhs_node, Type::is_numeric, expected.clone())?;
            require(&rhs, rhs_node, Type::is_numeric, expected)?;
            compatible()?;

            let divides = matches!(
                operator,
                BinaryOperatorKind::Divide | BinaryOperatorKind::Modulus
            );
            if divides && matches!(&rhs_value, Some(ConstValue::Number(divisor)) if divisor.is_zero())
            {
                return Err(AnalysisError::new(
                    AnalysisErrorKind::DivisionByZero,
                    rhs_node.span,
                ));
            }

            // The left operand decides the result type
            if lhs.ty.is_any() || rhs.ty.is_any() {
                Type::ANY
            } else {
                lhs.ty.clone()
            }
        };

        Ok(Expression::new(
            ExpressionKind::Binary {
                operator,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            ty,
        ))
    }

    fn analyze_unary(
        &mut self,
        operator: UnaryOperatorKind,
        operand_node: &ast::Expression,
        span: Span,
        scope: ScopeId,
    ) -> AnalysisResult<Expression> {
        let operator = match operator {
            UnaryOperatorKind::AddressOf => {
                return self.analyze_address_of(operand_node, span, scope);
            }
            UnaryOperatorKind::Deref => return self.analyze_dereference(operand_node, scope),
            UnaryOperatorKind::Negate => UnaryOperator::Negate,
            UnaryOperatorKind::LogicalNot => UnaryOperator::LogicalNot,
        };

        let operand = self.analyze_expression(operand_node, scope)?;

        let (accepted, expected, ty) = match operator {
            UnaryOperator::Negate => (operand.ty.is_numeric(), Expected::Numeric, operand.ty.clone()),
            UnaryOperator::LogicalNot => (operand.ty.is_bool(), Expected::Boolean, Type::BOOL),
        };

        if !accepted && !operand.ty.is_any() {
            return Err(AnalysisError::mismatch(
                TypeBoundary::UnaryOperand,
                expected,
                &operand.ty,
                operand_node.span,
            ));
        }

        Ok(Expression::new(
            ExpressionKind::Unary {
                operator,
                operand: Box::new(operand),
            },
            ty,
        ))
    }

    fn analyze_dereference(
        &mut self,
        operand_node: &ast::Expression,
        scope: ScopeId,
    ) -> AnalysisResult<Expression> {
        let operand = self.analyze_expression(operand_node, scope)?;

        let ty = match operand.ty.unwrap_pointer() {
            Some(pointee) => pointee.clone(),
            None if operand.ty.is_any() => Type::ANY,
            None => {
                return Err(AnalysisError::mismatch(
                    TypeBoundary::Dereference,
                    Expected::Pointer,
                    &operand.ty,
                    operand_node.span,
                ));
            }
        };

        Ok(Expression::new(
            ExpressionKind::Dereference(Box::new(operand)),
            ty,
        ))
    }

    fn analyze_address_of(
        &mut self,
        operand: &ast::Expression,
        span: Span,
        scope: ScopeId,
    ) -> AnalysisResult<Expression> {
        let mut place = operand;
        while let ast::ExpressionKind::Grouping(inner) = &place.kind {
            place = inner;
        }

        let ast::ExpressionKind::Identifier(identifier) = &place.kind else {
            return Err(AnalysisError::new(AnalysisErrorKind::NotAddressable, span));
        };

        let variable = match self.scopes.lookup(scope, identifier.symbol) {
            Some(Entity::Variable(variable)) => variable,
            Some(_) => return Err(AnalysisError::new(AnalysisErrorKind::NotAddressable, span)),
            None => {
                return Err(AnalysisError::undeclared(
                    identifier.symbol.value(),
                    identifier.span,
                ));
            }
        };

        let ty = self.variables[variable].ty.clone();

        Ok(Expression::new(
            ExpressionKind::AddressOf(Box::new(Expression::new(
                ExpressionKind::Variable(variable),
                ty.clone(),
            ))),
            Type::pointer_to(ty),
        ))
    }

    fn analyze_call(
        &mut self,
        target: &ast::Expression,
        arguments: &[ast::Expression],
        span: Span,
        scope: ScopeId,
    ) -> AnalysisResult<Expression> {
        if let ast::ExpressionKind::Identifier(identifier) = &target.kind {
            if let Some(Entity::Intrinsic(intrinsic)) = self.scopes.lookup(scope, identifier.symbol) {
                return self.analyze_intrinsic_call(intrinsic, arguments, span, scope);
            }
        }

        let callee = self.analyze_expression(target, scope)?;

        let name = match &callee.kind {
            ExpressionKind::Function(function) => self.functions[*function].name.value(),
            _ => "function",
        };

        if callee.ty.is_any() {
            let arguments = arguments
                .iter()
                .map(|argument| self.analyze_expression(argument, scope))
                .collect::<AnalysisResult<_>>()?;

            return Ok(Expression::new(
                ExpressionKind::Call {
                    callee: Box::new(callee),
                    arguments,
                },
                Type::ANY,
            ));
        }

        let Some(signature) = callee.ty.as_function().cloned() else {
            return Err(AnalysisError::new(
                AnalysisErrorKind::NotCallable {
                    found: callee.ty.clone(),
                },
                target.span,
            ));
        };

        if signature.parameters.len() != arguments.len() {
            return Err(AnalysisError::new(
                AnalysisErrorKind::ArityMismatch {
                    name: name.to_owned(),
                    expected: signature.parameters.len(),
                    found: arguments.len(),
                },
                span,
            ));
        }

        let mut analyzed = Vec::with_capacity(arguments.len());

        for (argument, parameter) in arguments.iter().zip(&signature.parameters) {
            let expression = self.analyze_expression(argument, scope)?;
            analyzed.push(self.coerce(
                expression,
                parameter,
                TypeBoundary::FunctionArgument,
                argument.span,
            )?);
        }

        Ok(Expression::new(
            ExpressionKind::Call {
                callee: Box::new(callee),
                arguments: analyzed,
            },
            signature.return_type.as_ref().clone(),
        ))
    }

    fn analyze_intrinsic_call(
        &mut self,
        intrinsic: Intrinsic,
        arguments: &[ast::Expression],
        span: Span,
        scope: ScopeId,
    ) -> AnalysisResult<Expression> {
        if arguments.len() != intrinsic.arity() {
            return Err(AnalysisError::new(
                AnalysisErrorKind::ArityMismatch {
                    name: intrinsic.symbol().to_owned(),
                    expected: intrinsic.arity(),
                    found: arguments.len(),
                },
                span,
            ));
        }

        match (intrinsic, arguments) {
            (Intrinsic::TypeOf, [argument]) => {
                let ty = self.describe_type_of(argument, scope)?;
                Ok(Expression::new(ExpressionKind::TypeOf(ty), Type::STRING))
            }
            (Intrinsic::Apply, [function_node, array_node]) => {
                let function = self.analyze_expression(function_node, scope)?;
                let array = self.analyze_expression(array_node, scope)?;

                let return_type = match &function.ty {
                    Type::Function(signature) if signature.parameters.len() == 1 => {
                        let parameter = &signature.parameters[0];
                        let element = match array.ty.unwrap_array() {
                            Some(element) => element,
                            None if array.ty.is_any() => &Type::ANY,
                            None => {
                                return Err(AnalysisError::new(
                                    AnalysisErrorKind::NotAnArray {
                                        found: array.ty.clone(),
                                    },
                                    array_node.span,
                                ));
                            }
                        };

                        if !element.can_convert(parameter, None) {
                            return Err(AnalysisError::mismatch(
                                TypeBoundary::FunctionArgument,
                                Expected::Type(parameter.clone()),
                                element,
                                array_node.span,
                            ));
                        }

                        signature.return_type.as_ref().clone()
                    }
                    ty if ty.is_any() => Type::ANY,
                    ty => {
                        return Err(AnalysisError::mismatch(
                            TypeBoundary::IntrinsicArgument,
                            Expected::Function,
                            ty,
                            function_node.span,
                        ));
                    }
                };

                Ok(Expression::new(
                    ExpressionKind::Apply {
                        function: Box::new(function),
                        array: Box::new(array),
                    },
                    Type::array_of(return_type),
                ))
            }
            (Intrinsic::Supplant, [text, pattern, replacement]) => {
                let text = self.analyze_text_argument(text, scope)?;
                let pattern = self.analyze_text_argument(pattern, scope)?;
                let replacement = self.analyze_text_argument(replacement, scope)?;

                Ok(Expression::new(
                    ExpressionKind::Supplant {
                        text: Box::new(text),
                        pattern: Box::new(pattern),
                        replacement: Box::new(replacement),
                    },
                    Type::STRING,
                ))
            }
            // exscribe only ever appears as a statement
            _ => Err(AnalysisError::new(
                AnalysisErrorKind::MisplacedIntrinsic {
                    name: intrinsic.symbol().to_owned(),
                },
                span,
            )),
        }
    }

    fn analyze_text_argument(
        &mut self,
        argument: &ast::Expression,
        scope: ScopeId,
    ) -> AnalysisResult<Expression> {
        let expression = self.analyze_expression(argument, scope)?;

        self.coerce(
            expression,
            &Type::STRING,
            TypeBoundary::IntrinsicArgument,
            argument.span,
        )
    }

    /// `typeof(f(x))` describes `f` itself rather than evaluating the call
    fn describe_type_of(&mut self, argument: &ast::Expression, scope: ScopeId) -> AnalysisResult<Type> {
        let ast::ExpressionKind::FunctionCall { target, .. } = &argument.kind else {
            return Ok(self.analyze_expression(argument, scope)?.ty);
        };

        if let ast::ExpressionKind::Identifier(identifier) = &target.kind {
            if let Some(Entity::Intrinsic(intrinsic)) = self.scopes.lookup(scope, identifier.symbol) {
                return Ok(Type::Function(intrinsic.signature()));
            }
        }

        Ok(self.analyze_expression(target, scope)?.ty)
    }

    fn resolve_type(&self, ty: &ast::Type) -> AnalysisResult<Type> {
        Ok(match &ty.kind {
            ast::TypeKind::Named(identifier) => Type::from_name(identifier.symbol.value())
                .ok_or_else(|| {
                    AnalysisError::new(
                        AnalysisErrorKind::UnknownType {
                            name: identifier.symbol.value().to_owned(),
                        },
                        identifier.span,
                    )
                })?,
            ast::TypeKind::Array(element) => Type::array_of(self.resolve_type(element)?),
            ast::TypeKind::Pointer(pointee) => Type::pointer_to(self.resolve_type(pointee)?),
            ast::TypeKind::Optional(inner) => Type::optional_of(self.resolve_type(inner)?),
            ast::TypeKind::Function {
                parameters,
                return_type,
            } => {
                let parameters = parameters
                    .iter()
                    .map(|parameter| self.resolve_type(parameter))
                    .collect::<AnalysisResult<_>>()?;
                let return_type = match return_type {
                    Some(return_type) => self.resolve_type(return_type)?,
                    None => Type::VOID,
                };

                Type::function(parameters, return_type)
            }
        })
    }

    /// The compile time value of `expression`, if it is built from literals,
    /// constants and exact arithmetic on them
    fn known_value(&self, expression: &Expression) -> Option<ConstValue> {
        match &expression.kind {
            ExpressionKind::Literal(literal) => literal.value(),
            ExpressionKind::Variable(variable) => self.variables[*variable].constant.clone(),
            ExpressionKind::Array(elements) => elements
                .iter()
                .map(|element| self.known_value(element))
                .collect::<Option<_>>()
                .map(ConstValue::Array),
            ExpressionKind::Unary { operator, operand } => {
                match (operator, self.known_value(operand)?) {
                    (UnaryOperator::Negate, ConstValue::Number(value)) => {
                        Some(ConstValue::Number(-value))
                    }
                    (UnaryOperator::LogicalNot, ConstValue::Boolean(value)) => {
                        Some(ConstValue::Boolean(!value))
                    }
                    _ => None,
                }
            }
            ExpressionKind::Binary { operator, lhs, rhs } => {
                let (ConstValue::Number(lhs), ConstValue::Number(rhs)) =
                    (self.known_value(lhs)?, self.known_value(rhs)?)
                else {
                    return None;
                };

                let value: BigRational = match operator {
                    BinaryOperatorKind::Add => lhs + rhs,
                    BinaryOperatorKind::Subtract => lhs - rhs,
                    BinaryOperatorKind::Multiply => lhs * rhs,
                    BinaryOperatorKind::Divide if !rhs.is_zero() => lhs / rhs,
                    _ => return None,
                };

                Some(ConstValue::Number(value))
            }
            ExpressionKind::Subscript { array, index } => {
                let ConstValue::Array(items) = self.known_value(array)? else {
                    return None;
                };
                let ConstValue::Number(index) = self.known_value(index)? else {
                    return None;
                };

                if !index.is_integer() {
                    return None;
                }

                items.get(index.to_integer().to_usize()?).cloned()
            }
            _ => None,
        }
    }
}

/// Whether every path through `statements` ends in a `return`.
///
/// A `while` only counts when its condition is the literal `true` and its
/// body has no `break` of its own, since any other loop may run zero times
/// or exit early.
pub fn always_returns(statements: &[Statement]) -> bool {
    statements.iter().any(|statement| match statement {
        Statement::Return(_) => true,
        Statement::If {
            positive, negative, ..
        } => always_returns(positive) && always_returns(negative),
        Statement::While { condition, body } => {
            matches!(condition.as_literal(), Some(Literal::Boolean(true))) && !contains_break(body)
        }
        Statement::Block(statements) => always_returns(statements),
        _ => false,
    })
}

/// Whether a `return` is reachable anywhere in the function body, not
/// counting nested functions
pub fn contains_return(statements: &[Statement]) -> bool {
    statements.iter().any(|statement| match statement {
        Statement::Return(_) => true,
        Statement::If {
            positive, negative, ..
        } => contains_return(positive) || contains_return(negative),
        Statement::While { body, .. } | Statement::Block(body) => contains_return(body),
        _ => false,
    })
}

/// A `break` belonging to the loop whose body is `statements`
fn contains_break(statements: &[Statement]) -> bool {
    statements.iter().any(|statement| match statement {
        Statement::Break => true,
        Statement::If {
            positive, negative, ..
        } => contains_break(positive) || contains_break(negative),
        Statement::Block(statements) => contains_break(statements),
        _ => false,
    })
}
