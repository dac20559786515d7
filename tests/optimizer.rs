use glyphc::{
    driver::{self, Artifact, CompileOptions, Emit},
    frontend::SourceFile,
    index::Index,
    middle::{
        hir::{Expression, ExpressionKind, Literal, Program, Statement, VariableId},
        optimize::optimize,
    },
};
use indoc::indoc;
use num::BigInt;

fn analyzed(source: &str) -> Program {
    let source = SourceFile::from_memory(source);
    let options = CompileOptions {
        emit: Emit::Analyzed,
        optimize: false,
    };

    match driver::compile(&source, &options).unwrap() {
        Artifact::Analyzed(program) => program,
        artifact => panic!("expected an analyzed program, found {artifact:?}"),
    }
}

fn initializers(statements: &[Statement]) -> Vec<&Expression> {
    statements
        .iter()
        .filter_map(|statement| match statement {
            Statement::VariableDeclaration { initializer, .. } => Some(initializer),
            _ => None,
        })
        .collect()
}

const PROGRAMS: [&str; 4] = [
    indoc! {"
        affix io@exscribe;
        const a = 1 + 2 * 3;
        let b = a - 0;
        b++;
        if a > 2 && true { exscribe b; } else { exscribe a; }
    "},
    indoc! {"
        affix io@exscribe;
        evoke f(x: int32) -> int32 {
            let y = x;
            if false { return 0; }
            while false { y = y; }
            return y * 1 + 0;
        }
        main = { exscribe f(2 ** 3); }
    "},
    indoc! {"
        let x: int32 = 5;
        let p = &x;
        let y = *&x;
        x = x;
        { }
    "},
    indoc! {"
        affix io@exscribe;
        let flag = false;
        while !false || flag { exscribe \"looping\"; break; }
    "},
];

#[test]
fn optimizing_twice_changes_nothing() {
    for source in PROGRAMS {
        let once = optimize(analyzed(source));
        let twice = optimize(once.clone());

        assert_eq!(once, twice, "optimizing is not idempotent for:\n{source}");
    }
}

#[test]
fn folding_preserves_types() {
    let source = indoc! {"
        const a = 1 + 2;
        const b: uint8 = 2 * 3;
        const c: int64 = 7 % 4;
        const d = true && false;
        const e = 10 > 3;
        const f: float64 = 1.5 * 2.0;
        const g = -(4);
    "};

    let before = analyzed(source);
    let after = optimize(before.clone());

    let before = initializers(&before.statements);
    let after = initializers(&after.statements);
    assert_eq!(before.len(), after.len());

    for (before, after) in before.iter().zip(&after) {
        assert!(after.as_literal().is_some(), "{after:?} was not folded");
        assert_eq!(before.ty, after.ty);
    }
}

#[test]
fn folds_constant_arithmetic() {
    let program = optimize(analyzed("const x = 1 + 2;"));

    assert_eq!(
        initializers(&program.statements)[0].kind,
        ExpressionKind::Literal(Literal::Integer(BigInt::from(3)))
    );
}

#[test]
fn short_circuits_on_known_operands() {
    let program = optimize(analyzed(
        "let x = false; const y = true && x; const z = false || x; const w = false && x;",
    ));
    let initializers = initializers(&program.statements);
    let x = ExpressionKind::Variable(VariableId::new(0));

    assert_eq!(initializers[1].kind, x);
    assert_eq!(initializers[2].kind, x);
    assert_eq!(initializers[3].kind, ExpressionKind::Literal(Literal::Boolean(false)));
}

#[test]
fn discards_branches_that_cannot_run() {
    let program = optimize(analyzed(indoc! {"
        affix io@exscribe;
        if (false) { exscribe 1; exscribe 2; } else { exscribe 3; }
    "}));

    let [Statement::Import(_), Statement::Print(value)] = program.statements.as_slice() else {
        panic!("expected the else branch only, found {:?}", program.statements);
    };
    assert_eq!(value.kind, ExpressionKind::Literal(Literal::Integer(BigInt::from(3))));
}
