//! Constant folding and dead code elimination over an analyzed [`Program`].
//!
//! Rewrites run bottom-up, so a parent only ever inspects children that are
//! already fully reduced. Every replacement expression keeps the type of the
//! node it replaces, and running the pass on its own output changes nothing.

use num::{BigInt, Integer, One, ToPrimitive, Zero, pow};
use tracing::debug;

use super::{
    hir::{Expression, ExpressionKind, Literal, Program, Statement, UnaryOperator},
    ty::Type,
};
use crate::frontend::ast::BinaryOperatorKind;

/// Largest exponent `**` is folded for, keeping folded literals a sane size
const MAX_FOLDED_EXPONENT: u32 = 256;
/// Upper bound on the bit length of a folded power
const MAX_FOLDED_BITS: u64 = 4096;

pub fn optimize(program: Program) -> Program {
    let Program {
        statements,
        variables,
        functions,
    } = program;

    let before = statements.len();
    let statements = optimize_statements(statements);

    debug!(before, after = statements.len(), "optimized top level statements");

    Program {
        statements,
        variables,
        functions,
    }
}

fn optimize_statements(statements: Vec<Statement>) -> Vec<Statement> {
    let mut optimized = Vec::with_capacity(statements.len());

    for statement in statements {
        for statement in optimize_statement(statement) {
            push_statement(&mut optimized, statement);
        }
    }

    optimized
}

/// Appends `statement`, folding an increment or decrement into the directly
/// preceding declaration of the same variable when that declaration has a
/// numeric literal initializer.
fn push_statement(statements: &mut Vec<Statement>, statement: Statement) {
    let (target, step) = match &statement {
        Statement::Increment(variable) => (*variable, 1),
        Statement::Decrement(variable) => (*variable, -1),
        _ => {
            statements.push(statement);
            return;
        }
    };

    if let Some(Statement::VariableDeclaration {
        variable,
        initializer,
    }) = statements.last_mut()
    {
        if *variable == target {
            if let ExpressionKind::Literal(literal) = &mut initializer.kind {
                match literal {
                    Literal::Integer(value) => {
                        *value += BigInt::from(step);
                        return;
                    }
                    Literal::Float(value) => {
                        *value += f64::from(step);
                        return;
                    }
                    _ => {}
                }
            }
        }
    }

    statements.push(statement);
}

fn optimize_statement(statement: Statement) -> Vec<Statement> {
    match statement {
        Statement::VariableDeclaration {
            variable,
            initializer,
        } => vec![Statement::VariableDeclaration {
            variable,
            initializer: optimize_expression(initializer),
        }],
        Statement::FunctionDeclaration { function, body } => vec![Statement::FunctionDeclaration {
            function,
            body: optimize_statements(body),
        }],
        Statement::Assignment { target, value } => {
            let target = optimize_expression(target);
            let value = optimize_expression(value);

            if target == value && is_pure(&target) {
                return Vec::new();
            }

            vec![Statement::Assignment { target, value }]
        }
        Statement::If {
            condition,
            positive,
            negative,
        } => {
            let condition = optimize_expression(condition);
            let known = match condition.as_literal() {
                Some(Literal::Boolean(value)) => Some(*value),
                _ => None,
            };

            match known {
                Some(true) => optimize_statements(positive),
                Some(false) => optimize_statements(negative),
                None => vec![Statement::If {
                    condition,
                    positive: optimize_statements(positive),
                    negative: optimize_statements(negative),
                }],
            }
        }
        Statement::While { condition, body } => {
            let condition = optimize_expression(condition);

            if let Some(Literal::Boolean(false)) = condition.as_literal() {
                return Vec::new();
            }

            vec![Statement::While {
                condition,
                body: optimize_statements(body),
            }]
        }
        Statement::Return(value) => vec![Statement::Return(value.map(optimize_expression))],
        Statement::Print(value) => vec![Statement::Print(optimize_expression(value))],
        Statement::Invoke(call) => vec![Statement::Invoke(optimize_expression(call))],
        Statement::Expression(expression) => {
            vec![Statement::Expression(optimize_expression(expression))]
        }
        Statement::Block(statements) => {
            let statements = optimize_statements(statements);

            if statements.is_empty() {
                Vec::new()
            } else {
                vec![Statement::Block(statements)]
            }
        }
        Statement::Main(statements) => vec![Statement::Main(optimize_statements(statements))],
        statement @ (Statement::Import(_)
        | Statement::Increment(_)
        | Statement::Decrement(_)
        | Statement::Break) => vec![statement],
    }
}

fn optimize_expression(expression: Expression) -> Expression {
    let Expression { kind, ty } = expression;

    let kind = match kind {
        ExpressionKind::Binary { operator, lhs, rhs } => {
            let lhs = optimize_expression(*lhs);
            let rhs = optimize_expression(*rhs);

            return fold_binary(operator, lhs, rhs, ty);
        }
        ExpressionKind::Unary { operator, operand } => {
            return fold_unary(operator, optimize_expression(*operand), ty);
        }
        ExpressionKind::Dereference(operand) => {
            let operand = optimize_expression(*operand);

            // *&x is just x
            if let ExpressionKind::AddressOf(place) = operand.kind {
                return Expression::new(place.kind, ty);
            }

            ExpressionKind::Dereference(Box::new(operand))
        }
        ExpressionKind::AddressOf(place) => {
            ExpressionKind::AddressOf(Box::new(optimize_expression(*place)))
        }
        ExpressionKind::Call { callee, arguments } => ExpressionKind::Call {
            callee: Box::new(optimize_expression(*callee)),
            arguments: arguments.into_iter().map(optimize_expression).collect(),
        },
        ExpressionKind::Subscript { array, index } => ExpressionKind::Subscript {
            array: Box::new(optimize_expression(*array)),
            index: Box::new(optimize_expression(*index)),
        },
        ExpressionKind::Array(elements) => {
            ExpressionKind::Array(elements.into_iter().map(optimize_expression).collect())
        }
        ExpressionKind::Conjure { function, body } => ExpressionKind::Conjure {
            function,
            body: optimize_statements(body),
        },
        ExpressionKind::Apply { function, array } => ExpressionKind::Apply {
            function: Box::new(optimize_expression(*function)),
            array: Box::new(optimize_expression(*array)),
        },
        ExpressionKind::Supplant {
            text,
            pattern,
            replacement,
        } => ExpressionKind::Supplant {
            text: Box::new(optimize_expression(*text)),
            pattern: Box::new(optimize_expression(*pattern)),
            replacement: Box::new(optimize_expression(*replacement)),
        },
        kind @ (ExpressionKind::Literal(_)
        | ExpressionKind::Variable(_)
        | ExpressionKind::Function(_)
        | ExpressionKind::TypeOf(_)) => kind,
    };

    Expression::new(kind, ty)
}

fn fold_binary(
    operator: BinaryOperatorKind,
    lhs: Expression,
    rhs: Expression,
    ty: Type,
) -> Expression {
    if let (Some(a), Some(b)) = (lhs.as_literal(), rhs.as_literal()) {
        if let Some(folded) = fold_literals(operator, a, b) {
            return Expression::literal(folded, ty);
        }
    }

    // Short circuiting only needs the left operand to be known
    let known_lhs = match lhs.as_literal() {
        Some(Literal::Boolean(value)) => Some(*value),
        _ => None,
    };

    match (operator, known_lhs) {
        (BinaryOperatorKind::LogicalAnd, Some(true))
        | (BinaryOperatorKind::LogicalOr, Some(false)) => {
            return Expression::new(rhs.kind, ty);
        }
        (BinaryOperatorKind::LogicalAnd, Some(false))
        | (BinaryOperatorKind::LogicalOr, Some(true)) => {
            return Expression::new(lhs.kind, ty);
        }
        _ => {}
    }

    let is_zero = |side: &Expression| side.as_literal().is_some_and(Literal::is_zero);
    let is_one = |side: &Expression| side.as_literal().is_some_and(Literal::is_one);

    // Algebraic identities never apply to `any` operands, which may hold
    // text at runtime
    if lhs.ty.is_numeric() && rhs.ty.is_numeric() {
        match operator {
            BinaryOperatorKind::Add | BinaryOperatorKind::Subtract if is_zero(&rhs) => {
                return Expression::new(lhs.kind, ty);
            }
            BinaryOperatorKind::Add if is_zero(&lhs) => return Expression::new(rhs.kind, ty),
            BinaryOperatorKind::Subtract if is_zero(&lhs) => {
                return Expression::new(
                    ExpressionKind::Unary {
                        operator: UnaryOperator::Negate,
                        operand: Box::new(rhs),
                    },
                    ty,
                );
            }
            BinaryOperatorKind::Multiply | BinaryOperatorKind::Divide if is_one(&rhs) => {
                return Expression::new(lhs.kind, ty);
            }
            BinaryOperatorKind::Multiply if is_one(&lhs) => return Expression::new(rhs.kind, ty),
            BinaryOperatorKind::Multiply if is_zero(&lhs) && is_pure(&rhs) => {
                return Expression::new(lhs.kind, ty);
            }
            BinaryOperatorKind::Multiply if is_zero(&rhs) && is_pure(&lhs) => {
                return Expression::new(rhs.kind, ty);
            }
            BinaryOperatorKind::Power if is_one(&lhs) && is_pure(&rhs) => {
                return Expression::new(lhs.kind, ty);
            }
            BinaryOperatorKind::Power if is_zero(&rhs) && is_pure(&lhs) => {
                return Expression::literal(Literal::Integer(BigInt::one()), ty);
            }
            _ => {}
        }
    }

    Expression::new(
        ExpressionKind::Binary {
            operator,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        ty,
    )
}

fn fold_literals(operator: BinaryOperatorKind, lhs: &Literal, rhs: &Literal) -> Option<Literal> {
    match (lhs, rhs) {
        (Literal::Integer(a), Literal::Integer(b)) => fold_integers(operator, a, b),
        (Literal::Integer(_) | Literal::Float(_), Literal::Integer(_) | Literal::Float(_)) => {
            fold_floats(operator, as_f64(lhs)?, as_f64(rhs)?)
        }
        (Literal::Boolean(a), Literal::Boolean(b)) => Some(Literal::Boolean(match operator {
            BinaryOperatorKind::LogicalAnd => *a && *b,
            BinaryOperatorKind::LogicalOr => *a || *b,
            BinaryOperatorKind::Equals => a == b,
            BinaryOperatorKind::NotEquals => a != b,
            _ => return None,
        })),
        _ => {
            let (a, b) = (as_text(lhs)?, as_text(rhs)?);

            match operator {
                BinaryOperatorKind::Equals => Some(Literal::Boolean(a == b)),
                BinaryOperatorKind::NotEquals => Some(Literal::Boolean(a != b)),
                _ => None,
            }
        }
    }
}

fn fold_integers(operator: BinaryOperatorKind, a: &BigInt, b: &BigInt) -> Option<Literal> {
    let value = match operator {
        BinaryOperatorKind::Add => a + b,
        BinaryOperatorKind::Subtract => a - b,
        BinaryOperatorKind::Multiply => a * b,
        // Division stays a runtime operation unless the quotient is whole
        BinaryOperatorKind::Divide if !b.is_zero() && a.is_multiple_of(b) => a / b,
        BinaryOperatorKind::Modulus if !b.is_zero() => a % b,
        BinaryOperatorKind::Power => {
            let exponent = b.to_u32().filter(|exponent| *exponent <= MAX_FOLDED_EXPONENT)?;
            if a.bits().saturating_mul(u64::from(exponent)) > MAX_FOLDED_BITS {
                return None;
            }

            pow(a.clone(), exponent as usize)
        }
        _ => {
            let ordering = a.cmp(b);

            return Some(Literal::Boolean(match operator {
                BinaryOperatorKind::Equals => ordering.is_eq(),
                BinaryOperatorKind::NotEquals => ordering.is_ne(),
                BinaryOperatorKind::LessThan => ordering.is_lt(),
                BinaryOperatorKind::LessThanOrEqualTo => ordering.is_le(),
                BinaryOperatorKind::GreaterThan => ordering.is_gt(),
                BinaryOperatorKind::GreaterThanOrEqualTo => ordering.is_ge(),
                _ => return None,
            }));
        }
    };

    Some(Literal::Integer(value))
}

fn fold_floats(operator: BinaryOperatorKind, a: f64, b: f64) -> Option<Literal> {
    let value = match operator {
        BinaryOperatorKind::Add => a + b,
        BinaryOperatorKind::Subtract => a - b,
        BinaryOperatorKind::Multiply => a * b,
        BinaryOperatorKind::Divide => a / b,
        BinaryOperatorKind::Modulus => a % b,
        BinaryOperatorKind::Power => a.powf(b),
        BinaryOperatorKind::Equals => return Some(Literal::Boolean(a == b)),
        BinaryOperatorKind::NotEquals => return Some(Literal::Boolean(a != b)),
        BinaryOperatorKind::LessThan => return Some(Literal::Boolean(a < b)),
        BinaryOperatorKind::LessThanOrEqualTo => return Some(Literal::Boolean(a <= b)),
        BinaryOperatorKind::GreaterThan => return Some(Literal::Boolean(a > b)),
        BinaryOperatorKind::GreaterThanOrEqualTo => return Some(Literal::Boolean(a >= b)),
        BinaryOperatorKind::LogicalAnd | BinaryOperatorKind::LogicalOr => return None,
    };

    value.is_finite().then_some(Literal::Float(value))
}

fn as_f64(literal: &Literal) -> Option<f64> {
    match literal {
        Literal::Integer(value) => value.to_f64(),
        Literal::Float(value) => Some(*value),
        _ => None,
    }
}

fn as_text(literal: &Literal) -> Option<String> {
    match literal {
        Literal::String(value) => Some(value.clone()),
        Literal::Glyph(value) => Some(value.to_string()),
        _ => None,
    }
}

fn fold_unary(operator: UnaryOperator, operand: Expression, ty: Type) -> Expression {
    let folded = match (operator, operand.as_literal()) {
        (UnaryOperator::Negate, Some(Literal::Integer(value))) => Some(Literal::Integer(-value)),
        (UnaryOperator::Negate, Some(Literal::Float(value))) => Some(Literal::Float(-value)),
        (UnaryOperator::LogicalNot, Some(Literal::Boolean(value))) => {
            Some(Literal::Boolean(!value))
        }
        _ => None,
    };

    match folded {
        Some(literal) => Expression::literal(literal, ty),
        None => Expression::new(
            ExpressionKind::Unary {
                operator,
                operand: Box::new(operand),
            },
            ty,
        ),
    }
}

/// Whether evaluating `expression` can be skipped without changing what the
/// program does
fn is_pure(expression: &Expression) -> bool {
    match &expression.kind {
        ExpressionKind::Literal(_)
        | ExpressionKind::Variable(_)
        | ExpressionKind::Function(_)
        | ExpressionKind::TypeOf(_) => true,
        ExpressionKind::Binary { lhs, rhs, .. } => is_pure(lhs) && is_pure(rhs),
        ExpressionKind::Unary { operand, .. }
        | ExpressionKind::AddressOf(operand)
        | ExpressionKind::Dereference(operand) => is_pure(operand),
        ExpressionKind::Subscript { array, index } => is_pure(array) && is_pure(index),
        ExpressionKind::Array(elements) => elements.iter().all(is_pure),
        ExpressionKind::Call { .. }
        | ExpressionKind::Conjure { .. }
        | ExpressionKind::Apply { .. }
        | ExpressionKind::Supplant { .. } => false,
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;
    use crate::{
        frontend::{SourceFile, parser::Parser},
        middle::{analyze::analyze_module, ty::Type},
    };

    fn analyzed(source: &str) -> Program {
        let source = SourceFile::from_memory(source);
        let module = Parser::parse_module(&source).unwrap();

        analyze_module(&module).unwrap()
    }

    fn optimized(source: &str) -> Program {
        optimize(analyzed(source))
    }

    fn initializer(program: &Program, index: usize) -> &Expression {
        match &program.statements[index] {
            Statement::VariableDeclaration { initializer, .. } => initializer,
            statement => panic!("expected a declaration, found {statement:?}"),
        }
    }

    fn int(value: i64) -> Literal {
        Literal::Integer(BigInt::from(value))
    }

    #[test]
    fn folds_integer_arithmetic_exactly() {
        let program = optimized(indoc! {"
            const a = 1 + 2;
            const b = 6 / 3;
            const c = -5 / 2;
            const d = 2 ** 10 % 1000;
            const e = 1 < 2;
        "});

        assert_eq!(initializer(&program, 0).as_literal(), Some(&int(3)));
        assert_eq!(initializer(&program, 1).as_literal(), Some(&int(2)));
        assert!(matches!(initializer(&program, 2).kind, ExpressionKind::Binary { .. }));
        assert_eq!(initializer(&program, 3).as_literal(), Some(&int(24)));
        assert_eq!(
            initializer(&program, 4).as_literal(),
            Some(&Literal::Boolean(true))
        );
    }

    #[test]
    fn powers_with_huge_results_stay_unfolded() {
        let program = optimized(indoc! {"
            const a = 2 ** 256;
            const b = (2 ** 256) ** 256;
            const c = ((2 ** 256) ** 256) ** 256;
        "});

        assert_eq!(
            initializer(&program, 0).as_literal(),
            Some(&Literal::Integer(pow(BigInt::from(2), 256)))
        );

        let ExpressionKind::Binary { lhs, rhs, .. } = &initializer(&program, 1).kind else {
            panic!("expected `b` to stay a power, found {:?}", initializer(&program, 1));
        };
        assert_eq!(lhs.as_literal(), Some(&Literal::Integer(pow(BigInt::from(2), 256))));
        assert_eq!(rhs.as_literal(), Some(&int(256)));

        assert!(matches!(initializer(&program, 2).kind, ExpressionKind::Binary { .. }));
    }

    #[test]
    fn folded_literals_keep_the_node_type() {
        let program = optimized("const small: uint8 = 200 + 55;");
        let folded = initializer(&program, 0);

        assert_eq!(folded.as_literal(), Some(&int(255)));
        assert_eq!(folded.ty, Type::from_name("uint8").unwrap());
    }

    #[test]
    fn mixes_integers_and_floats_natively() {
        let program = optimized("const a = 1 + 2.5;");

        assert_eq!(initializer(&program, 0).as_literal(), Some(&Literal::Float(3.5)));
    }

    #[test]
    fn short_circuits_on_a_known_left_operand() {
        let program = optimized(indoc! {"
            let b = true;
            const x = true && b;
            const y = false && b;
            const z = false || b;
        "});

        assert!(matches!(initializer(&program, 1).kind, ExpressionKind::Variable(_)));
        assert_eq!(
            initializer(&program, 2).as_literal(),
            Some(&Literal::Boolean(false))
        );
        assert!(matches!(initializer(&program, 3).kind, ExpressionKind::Variable(_)));
        assert!(initializer(&program, 1).ty.is_bool());
    }

    #[test]
    fn applies_identities_only_to_numeric_operands() {
        let program = optimized(indoc! {"
            evoke f() -> int32 = 3;
            let n = 4;
            const a = n + 0;
            const b = 1 * n;
            const c = 0 - n;
            const d = f() * 0;
            const e = n * 0;
        "});

        assert!(matches!(initializer(&program, 2).kind, ExpressionKind::Variable(_)));
        assert!(matches!(initializer(&program, 3).kind, ExpressionKind::Variable(_)));
        assert!(matches!(
            initializer(&program, 4).kind,
            ExpressionKind::Unary {
                operator: UnaryOperator::Negate,
                ..
            }
        ));
        assert!(matches!(initializer(&program, 5).kind, ExpressionKind::Binary { .. }));
        assert_eq!(initializer(&program, 6).as_literal(), Some(&int(0)));
    }

    #[test]
    fn eliminates_dead_branches_and_loops() {
        let program = optimized(indoc! {"
            affix io@exscribe;
            if false { exscribe 1; } else { exscribe 2; }
            while false { exscribe 3; }
            if true { exscribe 4; }
        "});

        assert_eq!(
            program.statements[1..],
            [
                Statement::Print(Expression::literal(int(2), Type::from_name("int32").unwrap())),
                Statement::Print(Expression::literal(int(4), Type::from_name("int32").unwrap())),
            ]
        );
    }

    #[test]
    fn removes_self_assignment() {
        let program = optimized("let x = 1; x = x;");

        assert_eq!(program.statements.len(), 1);
    }

    #[test]
    fn folds_steps_into_the_preceding_declaration() {
        let program = optimized("let x = 5; x++; x++; x--; let y = 1.5; y++;");

        assert_eq!(program.statements.len(), 2);
        assert_eq!(initializer(&program, 0).as_literal(), Some(&int(6)));
        assert_eq!(initializer(&program, 1).as_literal(), Some(&Literal::Float(2.5)));

        let program = optimized("let x = 5; let y = 1; x++;");
        assert_eq!(program.statements.len(), 3);
    }

    #[test]
    fn collapses_pointer_round_trips() {
        let program = optimized("let x = 5; const y = *&x;");

        assert!(matches!(initializer(&program, 1).kind, ExpressionKind::Variable(_)));
    }

    #[test]
    fn is_idempotent() {
        let once = optimized(indoc! {"
            affix io@exscribe;
            evoke f(n: int32) -> int32 {
                if n > 1 + 1 { return n * 1; }
                return 0 - n;
            }
            let x = 2 ** 3;
            x++;
            if true { x++; }
            while x < 10 { x = x + (0 * 5); }
            main = exscribe f(x);
        "});
        let twice = optimize(once.clone());

        assert_eq!(once, twice);
    }
}
