//! End-to-end pipeline tests through the public API: parse, analyze,
//! emit, and drive files through the driver without the external
//! toolchain.

use std::fs;

use minicc::driver::{self, Options, Outcome};
use minicc::sema;
use minicc::Error;
use minicc_syntax::parser;

fn emit(source: &str) -> String {
    let mut program = parser::parse(source).expect("source should parse");
    let errors = sema::check(&mut program);
    assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
    let mut out = Vec::new();
    minicc::codegen::generate(&program, &mut out).expect("emission should succeed");
    String::from_utf8(out).expect("IR is UTF-8")
}

fn options(input: &std::path::Path, output: &std::path::Path) -> Options {
    Options {
        input: input.to_path_buf(),
        output: Some(output.to_path_buf()),
        link: false,
        opt_level: 0,
        force: false,
        type_check_only: false,
        dump_ast: false,
    }
}

#[test]
fn text_editor_style_program_compiles() {
    // a condensed mix of the feature set: structs, enums, globals,
    // loops, strings, pointers and calls
    let ir = emit(
        "int printf(char *fmt, ...);\n\
         enum mode { NORMAL, INSERT };\n\
         struct cursor { int row; int col; };\n\
         struct cursor cur;\n\
         int clamp(int v, int lo, int hi) {\n\
             if (v < lo) return lo;\n\
             if (v > hi) return hi;\n\
             return v;\n\
         }\n\
         int main() {\n\
             int mode = NORMAL;\n\
             cur.row = clamp(12, 0, 10);\n\
             while (cur.col < cur.row) {\n\
                 cur.col = cur.col + 1;\n\
             }\n\
             printf(\"%d\\n\", cur.col);\n\
             return mode;\n\
         }\n",
    );
    assert!(ir.contains("%struct.cursor = type { i32, i32 }"));
    assert!(ir.contains("declare i32 @printf(i8*, ...)"));
    assert!(ir.contains("define i32 @clamp(i32 %v, i32 %lo, i32 %hi)"));
    assert!(ir.contains("call i32 @clamp(i32 12, i32 0, i32 10)"));
    assert!(ir.contains("@.str1"));
}

#[test]
fn semantic_errors_stop_the_driver() {
    let dir = std::env::temp_dir();
    let input = dir.join("minicc_sema_err.c");
    let output = dir.join("minicc_sema_err.ll");
    fs::write(&input, "int main() { return missing; }").expect("test file is writable");

    let result = driver::run(&options(&input, &output));
    match result {
        Err(Error::Semantic { count }) => assert_eq!(count, 1),
        other => panic!("expected a semantic failure, got {:?}", other),
    }

    let _ = fs::remove_file(&input);
    let _ = fs::remove_file(&output);
}

#[test]
fn forced_emission_still_writes_ir() {
    let dir = std::env::temp_dir();
    let input = dir.join("minicc_forced.c");
    let output = dir.join("minicc_forced.ll");
    fs::write(&input, "int main() { return missing; }").expect("test file is writable");

    let mut opts = options(&input, &output);
    opts.force = true;
    let outcome = driver::run(&opts).expect("forced emission succeeds");
    assert_eq!(outcome, Outcome::Warnings);
    let ir = fs::read_to_string(&output).expect("IR file was written");
    assert!(ir.contains("define i32 @main()"));

    let _ = fs::remove_file(&input);
    let _ = fs::remove_file(&output);
}

#[test]
fn type_check_only_emits_nothing() {
    let dir = std::env::temp_dir();
    let input = dir.join("minicc_tc.c");
    let output = dir.join("minicc_tc.ll");
    fs::write(&input, "int main() { return 0; }").expect("test file is writable");

    let mut opts = options(&input, &output);
    opts.type_check_only = true;
    let outcome = driver::run(&opts).expect("type check succeeds");
    assert_eq!(outcome, Outcome::Success);
    assert!(!output.exists());

    let _ = fs::remove_file(&input);
}

#[test]
fn parse_errors_are_hard_failures() {
    let dir = std::env::temp_dir();
    let input = dir.join("minicc_parse_err.c");
    fs::write(&input, "int main( { return 0; }").expect("test file is writable");

    let result = driver::run(&options(&input, &dir.join("minicc_parse_err.ll")));
    assert!(matches!(result, Err(Error::Syntax(_))));

    let _ = fs::remove_file(&input);
}

#[test]
fn error_kinds_are_reported() {
    let source = "\
        int f(int a) { return a; }\n\
        int main() {\n\
            int x = 1;\n\
            int x = 2;\n\
            f(1, 2);\n\
            3 = x;\n\
            break;\n\
            goto nowhere;\n\
            return 0;\n\
        }\n";
    let mut program = parser::parse(source).expect("source should parse");
    let errors = sema::check(&mut program);
    let rendered: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
    assert!(rendered.iter().any(|e| e.contains("redeclaration of `x`")));
    assert!(rendered.iter().any(|e| e.contains("expected 1")));
    assert!(rendered.iter().any(|e| e.contains("not assignable")));
    assert!(rendered.iter().any(|e| e.contains("`break` outside")));
    assert!(rendered
        .iter()
        .any(|e| e.contains("label `nowhere` used but never defined")));
}
