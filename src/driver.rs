//! Pipeline glue: scan → parse → resolve → interpret, in that fixed order.
//!
//! Each stage only runs when every earlier stage was clean, so a syntax or
//! resolution error never touches interpreter state.

use std::fs;
use std::path::Path;

use log::{debug, info};

use crate::ast::{Expr, Stmt};
use crate::error::{LoxError, Result};
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scanner::Scanner;
use crate::token::Token;

/// Reads a script from disk as UTF‑8.
pub fn read_source(path: &Path) -> Result<String> {
    info!("Reading file: {:?}", path);

    let bytes = fs::read(path)?;

    info!("Read {} bytes from {:?}", bytes.len(), path);

    Ok(String::from_utf8(bytes)?)
}

/// Scans the whole source, keeping going past lexical errors.
pub fn scan(source: &str) -> (Vec<Token>, Vec<LoxError>) {
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    for result in Scanner::new(source) {
        match result {
            Ok(token) => tokens.push(token),
            Err(err) => {
                debug!("Tokenization debug: {}", err);
                errors.push(err);
            }
        }
    }

    (tokens, errors)
}

/// Scans and parses a program. Lexical and syntax errors are reported
/// together.
pub fn parse_program(source: &str) -> std::result::Result<Vec<Stmt>, Vec<LoxError>> {
    let (tokens, mut errors) = scan(source);

    match Parser::new(tokens).parse() {
        Ok(statements) if errors.is_empty() => Ok(statements),
        Ok(_) => Err(errors),
        Err(parse_errors) => {
            errors.extend(parse_errors);
            Err(errors)
        }
    }
}

/// Scans and parses a single expression.
pub fn parse_expression(source: &str) -> std::result::Result<Expr, Vec<LoxError>> {
    let (tokens, errors) = scan(source);

    if !errors.is_empty() {
        return Err(errors);
    }

    Parser::new(tokens).parse_expression().map_err(|err| vec![err])
}

/// Runs one chunk of source against `interpreter`. Globals defined by
/// earlier chunks remain visible, which is what the REPL relies on.
///
/// Static errors come back all at once; a runtime error comes back alone.
pub fn run_source(
    interpreter: &mut Interpreter,
    source: &str,
) -> std::result::Result<(), Vec<LoxError>> {
    let statements = parse_program(source)?;

    debug!("Parsed {} statements", statements.len());

    let locals = Resolver::new().resolve(&statements)?;
    interpreter.resolve(locals);

    interpreter.interpret(&statements).map_err(|err| vec![err])
}

/// Exit status for a failed batch run: the kind of the first error decides.
pub fn exit_code(errors: &[LoxError]) -> i32 {
    errors.first().map(LoxError::exit_code).unwrap_or(0)
}
