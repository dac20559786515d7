use hashbrown::HashMap;
use itertools::Itertools;
use num::Signed;
use tracing::debug;

use crate::{
    frontend::ast::BinaryOperatorKind,
    middle::hir::{
        Expression, ExpressionKind, FunctionId, FunctionKind, Literal, Program, Statement,
        UnaryOperator, VariableId,
    },
};

const INDENT: &str = "    ";

/// Emits a JavaScript rendition of `program`, one statement per line.
pub fn generate(program: &Program) -> String {
    let mut generator = Generator::new(program);
    generator.statements(&program.statements);

    let output = generator.into_output();
    debug!(lines = output.lines().count(), "generated javascript");

    output
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Binding {
    Variable(VariableId),
    Function(FunctionId),
}

struct Generator<'a> {
    output: String,
    depth: usize,
    program: &'a Program,
    /// Display names, numbered in the order entities are first emitted
    names: HashMap<Binding, String>,
}

impl<'a> Generator<'a> {
    fn new(program: &'a Program) -> Self {
        Self {
            output: String::new(),
            depth: 0,
            program,
            names: HashMap::new(),
        }
    }

    fn into_output(self) -> String {
        self.output
    }

    fn push_line(&mut self, string: impl AsRef<str>) {
        self.output.push_str(string.as_ref());
        self.output.push('\n');
    }

    fn emit(&mut self, string: impl AsRef<str>) {
        for _ in 0..self.depth {
            self.output.push_str(INDENT);
        }
        self.push_line(string);
    }

    fn name_of(&mut self, binding: Binding) -> String {
        if let Some(name) = self.names.get(&binding) {
            return name.clone();
        }

        let base = match binding {
            Binding::Variable(variable) => self.program.variables[variable].name,
            Binding::Function(function) => self.program.functions[function].name,
        };
        let name = format!("{base}_{}", self.names.len() + 1);

        self.names.insert(binding, name.clone());
        name
    }

    fn variable(&mut self, variable: VariableId) -> String {
        self.name_of(Binding::Variable(variable))
    }

    fn function(&mut self, function: FunctionId) -> String {
        self.name_of(Binding::Function(function))
    }

    fn statements(&mut self, statements: &[Statement]) {
        for statement in statements {
            self.statement(statement);
        }
    }

    /// Emits `statements` one level deeper than the current line
    fn nested(&mut self, statements: &[Statement]) {
        self.depth += 1;
        self.statements(statements);
        self.depth -= 1;
    }

    fn statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Import(_) => {}
            Statement::VariableDeclaration {
                variable,
                initializer,
            } => {
                let keyword = if self.program.variables[*variable].mutable {
                    "let"
                } else {
                    "const"
                };
                let name = self.variable(*variable);
                let initializer = self.expression(initializer);

                self.emit(format!("{keyword} {name} = {initializer};"));
            }
            Statement::FunctionDeclaration { function, body } => {
                let name = self.function(*function);
                let parameters = self.parameters(*function);

                match self.program.functions[*function].kind {
                    FunctionKind::Conjured => {
                        self.emit(format!("const {name} = ({parameters}) => {{"));
                        self.nested(body);
                        self.emit("};");
                    }
                    FunctionKind::Declared | FunctionKind::Anonymous => {
                        self.emit(format!("function {name}({parameters}) {{"));
                        self.nested(body);
                        self.emit("}");
                    }
                }
            }
            Statement::Assignment { target, value } => {
                let target = self.expression(target);
                let value = self.expression(value);

                self.emit(format!("{target} = {value};"));
            }
            Statement::Increment(variable) => {
                let name = self.variable(*variable);
                self.emit(format!("{name}++;"));
            }
            Statement::Decrement(variable) => {
                let name = self.variable(*variable);
                self.emit(format!("{name}--;"));
            }
            Statement::If { .. } => self.if_chain(statement, false),
            Statement::While { condition, body } => {
                let condition = self.expression(condition);

                self.emit(format!("while ({condition}) {{"));
                self.nested(body);
                self.emit("}");
            }
            Statement::Break => self.emit("break;"),
            Statement::Return(Some(value)) => {
                let value = self.expression(value);
                self.emit(format!("return {value};"));
            }
            Statement::Return(None) => self.emit("return;"),
            Statement::Print(value) => {
                let value = self.expression(value);
                self.emit(format!("console.log({value});"));
            }
            Statement::Invoke(expression) | Statement::Expression(expression) => {
                let expression = self.expression(expression);
                self.emit(format!("{expression};"));
            }
            Statement::Block(statements) => {
                self.emit("{");
                self.nested(statements);
                self.emit("}");
            }
            Statement::Main(statements) => self.statements(statements),
        }
    }

    /// Emits an `if`, continuing the previous line's `} else` when `chained`
    fn if_chain(&mut self, statement: &Statement, chained: bool) {
        let Statement::If {
            condition,
            positive,
            negative,
        } = statement
        else {
            return self.statement(statement);
        };

        let condition = self.expression(condition);
        if chained {
            self.emit(format!("}} else if ({condition}) {{"));
        } else {
            self.emit(format!("if ({condition}) {{"));
        }
        self.nested(positive);

        match negative.as_slice() {
            [] => self.emit("}"),
            [nested @ Statement::If { .. }] => self.if_chain(nested, true),
            statements => {
                self.emit("} else {");
                self.nested(statements);
                self.emit("}");
            }
        }
    }

    fn parameters(&mut self, function: FunctionId) -> String {
        let program = self.program;

        program.functions[function]
            .parameters
            .iter()
            .map(|parameter| self.variable(*parameter))
            .join(", ")
    }

    fn expression(&mut self, expression: &Expression) -> String {
        match &expression.kind {
            ExpressionKind::Literal(literal) => literal_fragment(literal),
            ExpressionKind::Variable(variable) => self.variable(*variable),
            ExpressionKind::Function(function) => self.function(*function),
            ExpressionKind::Binary { operator, lhs, rhs } => {
                let lhs = self.expression(lhs);
                let rhs = self.expression(rhs);
                let operator = match operator {
                    BinaryOperatorKind::Equals => "===".to_owned(),
                    BinaryOperatorKind::NotEquals => "!==".to_owned(),
                    operator => operator.to_string(),
                };

                format!("({lhs} {operator} {rhs})")
            }
            ExpressionKind::Unary { operator, operand } => {
                let operand = self.expression(operand);

                match operator {
                    UnaryOperator::Negate => format!("(-{operand})"),
                    UnaryOperator::LogicalNot => format!("(!{operand})"),
                }
            }
            ExpressionKind::AddressOf(target) => {
                let target = self.expression(target);
                format!("(() => ({{ value: {target} }}))()")
            }
            ExpressionKind::Dereference(pointer) => {
                let pointer = self.expression(pointer);
                format!("{pointer}.value")
            }
            ExpressionKind::Call { callee, arguments } => {
                let callee = self.expression(callee);
                let arguments = arguments
                    .iter()
                    .map(|argument| self.expression(argument))
                    .join(", ");

                format!("{callee}({arguments})")
            }
            ExpressionKind::Subscript { array, index } => {
                let array = self.expression(array);
                let index = self.expression(index);

                format!("{array}[{index}]")
            }
            ExpressionKind::Array(elements) => {
                let elements = elements
                    .iter()
                    .map(|element| self.expression(element))
                    .join(",");

                format!("[{elements}]")
            }
            ExpressionKind::Conjure { body, .. } => self.immediately_invoked(body),
            ExpressionKind::TypeOf(ty) => format!("{:?}", ty.to_string()),
            ExpressionKind::Apply { function, array } => {
                let function = self.expression(function);
                let array = self.expression(array);

                format!("{array}.map((element) => {function}(element))")
            }
            ExpressionKind::Supplant {
                text,
                pattern,
                replacement,
            } => {
                let text = self.expression(text);
                let pattern = self.expression(pattern);
                let replacement = self.expression(replacement);

                format!("{text}.replaceAll({pattern}, {replacement})")
            }
        }
    }

    /// Renders `body` as an arrow function invoked on the spot. The body
    /// lines are emitted into a scratch buffer at the current depth.
    fn immediately_invoked(&mut self, body: &[Statement]) -> String {
        let outer = std::mem::take(&mut self.output);
        self.nested(body);
        let inner = std::mem::replace(&mut self.output, outer);

        let closing = INDENT.repeat(self.depth);
        format!("(() => {{\n{inner}{closing}}})()")
    }
}

fn literal_fragment(literal: &Literal) -> String {
    match literal {
        Literal::Integer(value) if value.is_negative() => format!("({value})"),
        Literal::Integer(value) => value.to_string(),
        Literal::Float(value) if value.is_nan() => "NaN".to_owned(),
        Literal::Float(value) if value.is_infinite() && value.is_sign_positive() => {
            "Infinity".to_owned()
        }
        Literal::Float(value) if value.is_infinite() => "(-Infinity)".to_owned(),
        Literal::Float(value) if value.is_sign_negative() => format!("({value})"),
        Literal::Float(value) => value.to_string(),
        Literal::Boolean(value) => value.to_string(),
        Literal::String(value) => format!("{value:?}"),
        Literal::Glyph(value) => format!("{:?}", value.to_string()),
        Literal::Codepoint(value) => u32::from(*value).to_string(),
        Literal::Null => "null".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use num::BigInt;

    use super::*;
    use crate::{
        frontend::{SourceFile, parser::Parser},
        middle::{analyze::analyze_module, optimize::optimize},
    };

    fn generated(source: &str) -> String {
        let source = SourceFile::from_memory(source);
        let module = Parser::parse_module(&source).unwrap();

        generate(&analyze_module(&module).unwrap())
    }

    #[test]
    fn names_entities_in_order_of_first_appearance() {
        let output = generated(indoc! {"
            affix io@exscribe;
            evoke square(x: int32) -> int32 = x * x;
            evoke sum(a: int32, b: int32) -> int32 = a + b;
            main = { exscribe sum(square(3), square(4)); }
        "});

        assert_eq!(
            output,
            indoc! {"
                function square_1(x_2) {
                    return (x_2 * x_2);
                }
                function sum_3(a_4, b_5) {
                    return (a_4 + b_5);
                }
                console.log(sum_3(square_1(3), square_1(4)));
            "}
        );
    }

    #[test]
    fn boxes_pointers() {
        let output = generated(indoc! {"
            let x: int32 = 10;
            let p: *int32 = &x;
            let y: int32 = *p;
            *p = 3;
        "});

        assert_eq!(
            output,
            indoc! {"
                let x_1 = 10;
                let p_2 = (() => ({ value: x_1 }))();
                let y_3 = p_2.value;
                p_2.value = 3;
            "}
        );
    }

    #[test]
    fn flattens_else_if_chains() {
        let output = generated(indoc! {"
            affix io@exscribe;
            let n = 5;
            if n > 3 { exscribe 1; } else if n == 1 { exscribe 2; } else { exscribe 3; }
            while n > 0 { n--; if n == 2 { break; } }
        "});

        assert_eq!(
            output,
            indoc! {"
                let n_1 = 5;
                if ((n_1 > 3)) {
                    console.log(1);
                } else if ((n_1 === 1)) {
                    console.log(2);
                } else {
                    console.log(3);
                }
                while ((n_1 > 0)) {
                    n_1--;
                    if ((n_1 === 2)) {
                        break;
                    }
                }
            "}
        );
    }

    #[test]
    fn conjured_functions() {
        let output = generated(indoc! {"
            twice: (n: int32) -> int32 = conjure { return n * 2; };
            const four = conjure { return twice(2); };
        "});

        assert_eq!(
            output,
            indoc! {"
                const twice_1 = (n_2) => {
                    return (n_2 * 2);
                };
                const four_3 = (() => {
                    return twice_1(2);
                })();
            "}
        );
    }

    #[test]
    fn function_typed_bindings_are_conjured_functions() {
        let output = generated(indoc! {"
            affix io@exscribe;
            f: conjure() -> int32 = conjure { return 1; };
            exscribe f();
        "});

        assert_eq!(
            output,
            indoc! {"
                const f_1 = () => {
                    return 1;
                };
                console.log(f_1());
            "}
        );
    }

    #[test]
    fn standard_library_intrinsics() {
        let output = generated(indoc! {r#"
            affix typing@typeof;
            affix function@apply;
            affix string@supplant;
            evoke square(x: int32) -> int32 = x * x;
            const t = typeof(square(2));
            const squares = apply(square, [1, 2, 3]);
            const s = supplant("a-b", "-", "+");
        "#});

        assert_eq!(
            output,
            indoc! {r#"
                function square_1(x_2) {
                    return (x_2 * x_2);
                }
                const t_3 = "conjure(int32) -> int32";
                const squares_4 = [1,2,3].map((element) => square_1(element));
                const s_5 = "a-b".replaceAll("-", "+");
            "#}
        );
    }

    #[test]
    fn negative_literals_are_parenthesized() {
        let source = SourceFile::from_memory("const a = -42; const b = -3.5; const c = [-1, 0];");
        let module = Parser::parse_module(&source).unwrap();
        let output = generate(&optimize(analyze_module(&module).unwrap()));

        assert_eq!(
            output,
            indoc! {"
                const a_1 = (-42);
                const b_2 = (-3.5);
                const c_3 = [(-1),0];
            "}
        );
    }

    #[test]
    fn literal_fragments() {
        assert_eq!(literal_fragment(&Literal::Integer(BigInt::from(7))), "7");
        assert_eq!(literal_fragment(&Literal::Float(6.28)), "6.28");
        assert_eq!(literal_fragment(&Literal::Float(f64::INFINITY)), "Infinity");
        assert_eq!(literal_fragment(&Literal::Float(f64::NEG_INFINITY)), "(-Infinity)");
        assert_eq!(literal_fragment(&Literal::String("say \"hi\"".into())), r#""say \"hi\"""#);
        assert_eq!(literal_fragment(&Literal::Glyph('a')), r#""a""#);
        assert_eq!(literal_fragment(&Literal::Codepoint('A')), "65");
        assert_eq!(literal_fragment(&Literal::Null), "null");
    }
}
