use glyphc::{
    driver::{self, Artifact, CompileError, CompileOptions, Emit, compile_to_js},
    frontend::SourceFile,
    middle::{
        analyze::{AnalysisErrorKind, TypeBoundary},
        hir::{ExpressionKind, Literal, Program, Statement},
    },
};
use indoc::indoc;
use num::BigInt;

fn javascript(source: &str) -> String {
    compile_to_js(&SourceFile::from_memory(source), true).unwrap()
}

fn optimized(source: &str) -> Program {
    let source = SourceFile::from_memory(source);
    let options = CompileOptions {
        emit: Emit::Optimized,
        optimize: true,
    };

    match driver::compile(&source, &options).unwrap() {
        Artifact::Optimized(program) => program,
        artifact => panic!("expected an optimized program, found {artifact:?}"),
    }
}

fn analysis_error(source: &str) -> AnalysisErrorKind {
    match compile_to_js(&SourceFile::from_memory(source), true) {
        Err(CompileError::Analysis(error)) => error.kind,
        result => panic!("expected an analysis error, found {result:?}"),
    }
}

#[test]
fn printing_a_constant_sum() {
    let source = indoc! {"
        affix io@exscribe;
        main = exscribe (2 + 2);
    "};

    let program = optimized(source);
    let Statement::Main(body) = &program.statements[1] else {
        panic!("expected main, found {:?}", program.statements[1]);
    };
    let [Statement::Print(value)] = body.as_slice() else {
        panic!("expected a single print, found {body:?}");
    };
    assert_eq!(value.kind, ExpressionKind::Literal(Literal::Integer(BigInt::from(4))));

    assert_eq!(javascript(source), "console.log(4);\n");
}

#[test]
fn declaring_and_printing_a_variable() {
    let output = javascript(indoc! {"
        affix io@exscribe;
        main = {
            let x: int32 = 42;
            exscribe x;
        }
    "});

    assert_eq!(
        output,
        indoc! {"
            let x_1 = 42;
            console.log(x_1);
        "}
    );
}

#[test]
fn calling_a_declared_function() {
    let output = javascript(indoc! {"
        affix io@exscribe;
        evoke add(a: int32, b: int32) -> int32 { return (a + b) }
        main = { exscribe add(2, 3); }
    "});

    assert_eq!(
        output,
        indoc! {"
            function add_1(a_2, b_3) {
                return (a_2 + b_3);
            }
            console.log(add_1(2, 3));
        "}
    );
}

#[test]
fn string_assigned_to_an_integer() {
    let kind = analysis_error(r#"main = { let x: int32 = "forty two"; }"#);

    assert!(matches!(
        kind,
        AnalysisErrorKind::TypeMismatch {
            boundary: TypeBoundary::LetStatement,
            ..
        }
    ));
}

#[test]
fn break_outside_of_a_loop() {
    assert_eq!(analysis_error("main = { break; }"), AnalysisErrorKind::BreakOutsideLoop);
}

#[test]
fn loop_that_never_runs() {
    let source = indoc! {"
        affix io@exscribe;
        while false { exscribe 1; }
    "};

    let program = optimized(source);
    assert_eq!(program.statements.len(), 1);
    assert!(matches!(program.statements[0], Statement::Import(_)));

    assert_eq!(javascript(source), "");
}
