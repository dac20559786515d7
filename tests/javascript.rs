use glyphc::{driver::compile_to_js, frontend::SourceFile};
use indoc::indoc;

struct Fixture {
    name: &'static str,
    source: &'static str,
    expected: &'static str,
}

/// Generated without optimization, so every construct shows up as written
const FIXTURES: &[Fixture] = &[
    Fixture {
        name: "function declaration",
        source: indoc! {"
            affix io@exscribe;

            evoke is_pythag_triple(a: uint8, b: uint8, c: uint8) -> bool
                = (a ** 2 + b ** 2 == c ** 2);

            main = {
                exscribe is_pythag_triple(3, 4, 5);
                exscribe is_pythag_triple(3, 4, 6);
            }
        "},
        expected: indoc! {"
            function is_pythag_triple_1(a_2, b_3, c_4) {
                return (((a_2 ** 2) + (b_3 ** 2)) === (c_4 ** 2));
            }
            console.log(is_pythag_triple_1(3, 4, 5));
            console.log(is_pythag_triple_1(3, 4, 6));
        "},
    },
    Fixture {
        name: "variable shadowing",
        source: indoc! {"
            affix io@exscribe;
            let x = 0;
            let y = x;
            {
                let x = y;
                exscribe x;
            }
        "},
        expected: indoc! {"
            let x_1 = 0;
            let y_2 = x_1;
            {
                let x_3 = y_2;
                console.log(x_3);
            }
        "},
    },
    Fixture {
        name: "array access",
        source: indoc! {"
            affix io@exscribe;

            main = {
                const arr: [[int32]] = [[1, 2], [3, 4]];
                exscribe arr[1][0];
            }
        "},
        expected: indoc! {"
            const arr_1 = [[1,2],[3,4]];
            console.log(arr_1[1][0]);
        "},
    },
    Fixture {
        name: "pointers and optionals",
        source: indoc! {"
            affix io@exscribe;

            main = {
                let x: int32 = 10;
                let p: *int32 = &x;
                let p2: **int32 = &p;
                let y: int32 = *p;
                let z: int32? = null;
                /@ boxes capture the variable, not its value @/
                let a: int32 = 10;
                let b: int32? = 11;
                b = null;
                const c: int32? = null;
                let d: (*int32)? = null;
                let f: *(int32?) = &z;

                exscribe x+y*a;
            }
        "},
        expected: indoc! {"
            let x_1 = 10;
            let p_2 = (() => ({ value: x_1 }))();
            let p2_3 = (() => ({ value: p_2 }))();
            let y_4 = p_2.value;
            let z_5 = null;
            let a_6 = 10;
            let b_7 = 11;
            b_7 = null;
            const c_8 = null;
            let d_9 = null;
            let f_10 = (() => ({ value: z_5 }))();
            console.log((x_1 + (y_4 * a_6)));
        "},
    },
    Fixture {
        name: "while loop and break",
        source: indoc! {"
            affix io@exscribe;

            main = {
                let n: int32 = 5;
                let fact: int32 = 1;
                while n > 1 {
                    if fact==0 {
                        break;
                    }
                    fact = fact * n;
                    n = n - 1;
                }
                exscribe fact;
            }
        "},
        expected: indoc! {"
            let n_1 = 5;
            let fact_2 = 1;
            while ((n_1 > 1)) {
                if ((fact_2 === 0)) {
                    break;
                }
                fact_2 = (fact_2 * n_1);
                n_1 = (n_1 - 1);
            }
            console.log(fact_2);
        "},
    },
    Fixture {
        name: "text and glyphs",
        source: indoc! {r#"
            affix io@exscribe;
            const greeting = "Hello " + 'W' + "orld";
            exscribe greeting != "bye";
        "#},
        expected: indoc! {r#"
            const greeting_1 = (("Hello " + "W") + "orld");
            console.log((greeting_1 !== "bye"));
        "#},
    },
];

#[test]
fn generated_javascript_matches_fixtures() {
    for fixture in FIXTURES {
        let source = SourceFile::from_memory(fixture.source);
        let actual = match compile_to_js(&source, false) {
            Ok(actual) => actual,
            Err(error) => panic!("{} failed to compile: {error}", fixture.name),
        };

        assert_eq!(actual, fixture.expected, "fixture `{}`", fixture.name);
    }
}

#[test]
fn optimized_output_is_smaller() {
    let source = SourceFile::from_memory(indoc! {"
        affix io@exscribe;
        let total = 1;
        total++;
        total++;
        if 2 > 3 { exscribe \"unreachable\"; } else { exscribe total * 1; }
    "});

    assert_eq!(
        compile_to_js(&source, true).unwrap(),
        indoc! {"
            let total_1 = 3;
            console.log(total_1);
        "}
    );
}
