//! Public operations over a schema.
//!
//! Each operation compiles the schema for one direction and runs the
//! resulting parser. The `try_*` and [`assert_valid`] variants trade
//! the three-state result for a `Result` carrying a rendered
//! [`ParseFailure`]; they succeed on warnings, since a usable value
//! was produced.

use crate::ast::ArcAst;
use crate::parse::{self, Direction, ParseOptions, Parser};
use crate::reporting::{ParseFailure, ParseResult};
use crate::value::Value;

/// Compile a decoder: raw input to validated value.
pub fn decoder(ast: &ArcAst) -> Parser {
    parse::compile(Direction::Decode, ast)
}

/// Compile a membership checker for the target shape.
pub fn checker(ast: &ArcAst) -> Parser {
    parse::compile(Direction::Guard, ast)
}

/// Compile an encoder: validated value back to raw output.
pub fn encoder(ast: &ArcAst) -> Parser {
    parse::compile(Direction::Encode, ast)
}

/// Decode `input` against `ast`.
pub fn decode(ast: &ArcAst, input: &Value, options: &ParseOptions) -> ParseResult<Value> {
    decoder(ast)(input, options)
}

/// Decode `input`, failing with a rendered summary.
pub fn try_decode(
    ast: &ArcAst,
    input: &Value,
    options: &ParseOptions,
) -> Result<Value, ParseFailure> {
    into_result(decode(ast, input, options))
}

/// Is `input` already in the shape described by `ast`?
pub fn guard(ast: &ArcAst, input: &Value, options: &ParseOptions) -> bool {
    checker(ast)(input, options).is_ok()
}

/// Check membership, failing with a rendered summary.
pub fn assert_valid(
    ast: &ArcAst,
    input: &Value,
    options: &ParseOptions,
) -> Result<(), ParseFailure> {
    into_result(checker(ast)(input, options)).map(|_| ())
}

/// Encode `value` against `ast`.
pub fn encode(ast: &ArcAst, value: &Value, options: &ParseOptions) -> ParseResult<Value> {
    encoder(ast)(value, options)
}

/// Encode `value`, failing with a rendered summary.
pub fn try_encode(
    ast: &ArcAst,
    value: &Value,
    options: &ParseOptions,
) -> Result<Value, ParseFailure> {
    into_result(encode(ast, value, options))
}

fn into_result(result: ParseResult<Value>) -> Result<Value, ParseFailure> {
    match result {
        ParseResult::Success(value) | ParseResult::Warning(_, value) => Ok(value),
        ParseResult::Failure(errors) => Err(ParseFailure::new(errors)),
    }
}
