use std::path::Path;

use rox::driver::{exit_code, parse_program, read_source, run_source, scan};
use rox::error::{LoxError, EXIT_IO_ERROR, EXIT_RUNTIME_ERROR, EXIT_STATIC_ERROR};
use rox::interpreter::Interpreter;
use rox::token::TokenType;

fn errors_of(source: &str) -> Vec<LoxError> {
    let mut interpreter = Interpreter::with_output(Box::new(std::io::sink()));
    run_source(&mut interpreter, source).expect_err("source should fail")
}

#[test]
fn test_static_errors_exit_65() {
    assert_eq!(exit_code(&errors_of("var;")), EXIT_STATIC_ERROR);
    assert_eq!(exit_code(&errors_of("return 1;")), EXIT_STATIC_ERROR);
    assert_eq!(exit_code(&errors_of("print \"open;")), EXIT_STATIC_ERROR);
    assert_eq!(EXIT_STATIC_ERROR, 65);
}

#[test]
fn test_runtime_errors_exit_70() {
    assert_eq!(exit_code(&errors_of("print -nil;")), EXIT_RUNTIME_ERROR);
    assert_eq!(EXIT_RUNTIME_ERROR, 70);
}

#[test]
fn test_missing_file_is_io_error() {
    let err = read_source(Path::new("definitely/not/here.lox")).unwrap_err();

    assert!(matches!(err, LoxError::Io(_)));
    assert_eq!(err.exit_code(), EXIT_IO_ERROR);
}

#[test]
fn test_scan_keeps_going_past_errors() {
    let (tokens, errors) = scan("1 # 2");

    assert_eq!(errors.len(), 1);
    let types: Vec<&TokenType> = tokens.iter().map(|t| &t.token_type).collect();
    assert_eq!(
        types,
        vec![&TokenType::NUMBER(1.0), &TokenType::NUMBER(2.0), &TokenType::EOF]
    );
}

#[test]
fn test_static_error_prevents_execution() {
    let mut interpreter = Interpreter::with_output(Box::new(std::io::sink()));

    // The resolver rejects the program, so `a` is never defined.
    assert!(run_source(&mut interpreter, "var a = 1; { var b; var b; }").is_err());
    let errors = run_source(&mut interpreter, "print a;").unwrap_err();

    assert_eq!(exit_code(&errors), EXIT_RUNTIME_ERROR);
}

#[test]
fn test_successful_program_parses() {
    assert!(parse_program("var a = 1; print a;").is_ok());
}
