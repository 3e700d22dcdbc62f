use almaz_lib::compiler::{CompilationError, CompileOptions};
use almaz_lib::core::{decode_text, OpCode};
use almaz_lib::loader::{load_and_invoke, ExecutionError};
use almaz_lib::vm::{self, Engine, LoadError, VerifyError};
use almaz_lib::{compile_source, run_source, Error};
use pretty_assertions::assert_eq;

fn output_of(src: &str) -> String {
    let mut engine = Engine::with_output(Vec::new());
    run_source(&mut engine, src, &CompileOptions::default()).unwrap();
    String::from_utf8(engine.into_output()).unwrap()
}

#[test]
fn arithmetic_respects_precedence_and_grouping() {
    assert_eq!(output_of("print 2 + 3 * 4"), "14\n");
    assert_eq!(output_of("print (2 + 3) * 4"), "20\n");
    assert_eq!(output_of("print 10 / 3"), "3\n");
    assert_eq!(output_of("print 10 - 4 - 3"), "3\n");
    assert_eq!(output_of("print 0 - 7 / 2"), "-3\n");
}

#[test]
fn strings_print_without_quotes() {
    assert_eq!(output_of("print \"hello\""), "hello\n");
    assert_eq!(output_of("print \"\""), "\n");
}

#[test]
fn variables_hold_their_value() {
    assert_eq!(output_of("let x = 7 print x"), "7\n");
    assert_eq!(
        output_of("let a = 2; let b = a * 10; print b + a; let a = 1; print a + b;"),
        "22\n21\n"
    );
}

#[test]
fn one_line_per_print_in_order() {
    let src = (1..=5)
        .map(|i| format!("print {};", i))
        .collect::<Vec<_>>()
        .join("\n");
    assert_eq!(output_of(&src), "1\n2\n3\n4\n5\n");
}

#[test]
fn empty_program_runs_and_prints_nothing() {
    let (module, _) = compile_source("", &CompileOptions::default()).unwrap();
    assert_eq!(decode_text(&module.entry.text).unwrap(), vec![(0, OpCode::Return)]);
    assert_eq!(output_of("// nothing here\n"), "");
}

#[test]
fn undeclared_identifier_produces_no_module() {
    let err = compile_source("print 1 print y", &CompileOptions::default()).unwrap_err();
    match err {
        Error::Compilation(CompilationError::UndeclaredIdentifier { name, .. }) => {
            assert_eq!(name, "y")
        }
        other => panic!("unexpected error: {other}"),
    }

    let mut engine = Engine::with_output(Vec::new());
    assert!(run_source(&mut engine, "print y", &CompileOptions::default()).is_err());
    assert!(!engine.is_installed("Program"));
    assert!(engine.output().is_empty());
}

#[test]
fn variable_is_not_visible_in_its_own_initializer() {
    let err = compile_source("let x = x + 1", &CompileOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        Error::Compilation(CompilationError::UndeclaredIdentifier { .. })
    ));
}

#[test]
fn syntax_errors_are_parse_errors() {
    let err = compile_source("print (1 + ", &CompileOptions::default()).unwrap_err();
    assert!(matches!(err, Error::Parse(_)));
    let err = compile_source("print 99999999999999999999", &CompileOptions::default()).unwrap_err();
    assert!(matches!(err, Error::Parse(_)));
}

#[test]
fn unit_can_only_be_installed_once() {
    let options = CompileOptions::default();
    let (module, _) = compile_source("print 1", &options).unwrap();
    let image = module.to_image().unwrap();

    let mut engine = Engine::with_output(Vec::new());
    load_and_invoke(&mut engine, &image, &options).unwrap();
    let err = load_and_invoke(&mut engine, &image, &options).unwrap_err();
    assert!(matches!(err, ExecutionError::Load(LoadError::DuplicateUnit(_))));
    assert_eq!(engine.output(), b"1\n");

    let renamed = CompileOptions {
        unit_name: "Second".into(),
        ..CompileOptions::default()
    };
    run_source(&mut engine, "print 2", &renamed).unwrap();
    assert_eq!(engine.output(), b"1\n2\n");
}

#[test]
fn under_declared_stack_is_rejected_at_load() {
    let options = CompileOptions::default();
    let (mut module, _) = compile_source("print 1 + 2 * 3", &options).unwrap();
    assert_eq!(module.entry.max_stack, 4);
    module.entry.max_stack = 3;

    let mut engine = Engine::with_output(Vec::new());
    let err = load_and_invoke(&mut engine, &module.to_image().unwrap(), &options).unwrap_err();
    match err {
        ExecutionError::Load(LoadError::Verification { failure, .. }) => {
            assert_eq!(
                failure.reason,
                VerifyError::StackOverflow { depth: 4, max_stack: 3 }
            )
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(engine.output().is_empty());
}

#[test]
fn corrupt_image_is_a_load_error() {
    let mut engine = Engine::with_output(Vec::new());
    let err = load_and_invoke(&mut engine, &[1, 2, 3], &CompileOptions::default()).unwrap_err();
    assert!(matches!(err, ExecutionError::Load(LoadError::Decode(_))));
}

#[test]
fn division_by_zero_fails_while_running() {
    let options = CompileOptions::default();
    let (module, info) = compile_source("print 5\nprint 5 / (3 - 3)", &options).unwrap();
    let mut engine = Engine::with_output(Vec::new());
    let err = load_and_invoke(&mut engine, &module.to_image().unwrap(), &options).unwrap_err();

    let offset = err.offset().unwrap();
    assert!(matches!(
        err,
        ExecutionError::Runtime(vm::RuntimeError { error: vm::Error::DivisionByZero, .. })
    ));
    assert!(info.offset_to_ast_id(offset).is_some());
    assert_eq!(engine.output(), b"5\n");
}
