//! Diagnostics: structural parse errors, the three-state parse
//! result, and the plain-text rendering used by the fallible
//! operations.

use itertools::Itertools;

use crate::ast::ArcAst;
use crate::value::{PropertyKey, Value};

/// A structural diagnostic.
///
/// Shape errors are produced at the node that detected the
/// violation; path errors (`Index`, `Key`, `Member`) wrap the errors
/// of a nested position and always carry at least one child.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    /// The value failed a shape check.
    Type { expected: ArcAst, actual: Value },
    /// A required element or key was absent.
    Missing,
    /// An element or key was present but not permitted.
    Unexpected { actual: Value },
    /// A literal or unique symbol did not match.
    Equal { expected: Value, actual: Value },
    /// A transform step rejected the value.
    Transform { from: ArcAst, to: ArcAst, actual: Value },
    /// Nested errors at an array index.
    Index { index: usize, errors: Vec<ParseError> },
    /// Nested errors at an object key.
    Key { key: PropertyKey, errors: Vec<ParseError> },
    /// Nested errors from one union member.
    Member { errors: Vec<ParseError> },
}

impl ParseError {
    pub fn ty(expected: &ArcAst, actual: &Value) -> ParseError {
        ParseError::Type { expected: expected.clone(), actual: actual.clone() }
    }

    pub fn unexpected(actual: &Value) -> ParseError {
        ParseError::Unexpected { actual: actual.clone() }
    }

    pub fn equal(expected: Value, actual: &Value) -> ParseError {
        ParseError::Equal { expected, actual: actual.clone() }
    }

    pub fn transform(from: &ArcAst, to: &ArcAst, actual: &Value) -> ParseError {
        ParseError::Transform { from: from.clone(), to: to.clone(), actual: actual.clone() }
    }

    pub fn index(index: usize, errors: Vec<ParseError>) -> ParseError {
        debug_assert!(!errors.is_empty());
        ParseError::Index { index, errors }
    }

    pub fn key(key: impl Into<PropertyKey>, errors: Vec<ParseError>) -> ParseError {
        debug_assert!(!errors.is_empty());
        ParseError::Key { key: key.into(), errors }
    }

    pub fn member(errors: Vec<ParseError>) -> ParseError {
        debug_assert!(!errors.is_empty());
        ParseError::Member { errors }
    }

    /// The number of `Unexpected` diagnostics in this subtree.
    pub fn unexpected_count(&self) -> usize {
        match self {
            ParseError::Unexpected { .. } => 1,
            ParseError::Index { errors, .. }
            | ParseError::Key { errors, .. }
            | ParseError::Member { errors } => {
                errors.iter().map(ParseError::unexpected_count).sum()
            }
            _ => 0,
        }
    }

    fn message(&self) -> String {
        match self {
            ParseError::Type { expected, actual } => {
                format!("expected {}, found {}", expected.describe(), actual)
            }
            ParseError::Missing => "is missing".to_owned(),
            ParseError::Unexpected { actual } => format!("found unexpected {actual}"),
            ParseError::Equal { expected, actual } => {
                format!("expected {expected}, found {actual}")
            }
            ParseError::Transform { from, to, actual } => {
                format!("could not convert {} from {} to {}", actual, from.describe(), to.describe())
            }
            ParseError::Index { index, .. } => format!("at index {index}"),
            ParseError::Key { key, .. } => format!("at key {key}"),
            ParseError::Member { .. } => "union member".to_owned(),
        }
    }
}

/// Render an error list as an indented multi-line summary, one line
/// per error, children of path errors indented below them.
pub fn render_errors(errors: &[ParseError]) -> String {
    let mut lines = Vec::new();
    for error in errors {
        push_lines(error, 0, &mut lines);
    }
    lines.iter().join("\n")
}

fn push_lines(error: &ParseError, depth: usize, lines: &mut Vec<String>) {
    lines.push(format!("{}{}", "  ".repeat(depth), error.message()));
    match error {
        ParseError::Index { errors, .. }
        | ParseError::Key { errors, .. }
        | ParseError::Member { errors } => {
            for error in errors {
                push_lines(error, depth + 1, lines);
            }
        }
        _ => {}
    }
}

/// The outcome of running a parser.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseResult<A> {
    /// The input matched.
    Success(A),
    /// The value is usable but diagnostics exist. Non-empty.
    Warning(Vec<ParseError>, A),
    /// The input was rejected. Non-empty.
    Failure(Vec<ParseError>),
}

impl<A> ParseResult<A> {
    /// True for `Success` and `Warning`: a value was produced.
    pub fn is_ok(&self) -> bool {
        !matches!(self, ParseResult::Failure(_))
    }

    pub fn ok(self) -> Option<A> {
        match self {
            ParseResult::Success(value) | ParseResult::Warning(_, value) => Some(value),
            ParseResult::Failure(_) => None,
        }
    }

    pub fn errors(&self) -> &[ParseError] {
        match self {
            ParseResult::Success(_) => &[],
            ParseResult::Warning(errors, _) | ParseResult::Failure(errors) => errors,
        }
    }

    pub fn map<B>(self, f: impl FnOnce(A) -> B) -> ParseResult<B> {
        match self {
            ParseResult::Success(value) => ParseResult::Success(f(value)),
            ParseResult::Warning(errors, value) => ParseResult::Warning(errors, f(value)),
            ParseResult::Failure(errors) => ParseResult::Failure(errors),
        }
    }

    /// Sequence a second step, carrying earlier warnings into its
    /// result. A failure after warnings keeps the warnings at the
    /// front of the error list.
    pub fn and_then<B>(self, f: impl FnOnce(A) -> ParseResult<B>) -> ParseResult<B> {
        match self {
            ParseResult::Success(value) => f(value),
            ParseResult::Warning(mut warnings, value) => match f(value) {
                ParseResult::Success(value) => ParseResult::Warning(warnings, value),
                ParseResult::Warning(errors, value) => {
                    warnings.extend(errors);
                    ParseResult::Warning(warnings, value)
                }
                ParseResult::Failure(errors) => {
                    warnings.extend(errors);
                    ParseResult::Failure(warnings)
                }
            },
            ParseResult::Failure(errors) => ParseResult::Failure(errors),
        }
    }
}

/// The error returned by the fallible operations: the rendered
/// summary plus the structured error list it was derived from.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{summary}")]
pub struct ParseFailure {
    summary: String,
    errors: Vec<ParseError>,
}

impl ParseFailure {
    pub(crate) fn new(errors: Vec<ParseError>) -> ParseFailure {
        ParseFailure { summary: render_errors(&errors), errors }
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Ast;

    #[test]
    fn unexpected_count_walks_the_tree() {
        let error = ParseError::member(vec![
            ParseError::key("a", vec![ParseError::unexpected(&Value::from(1))]),
            ParseError::index(0, vec![ParseError::Missing]),
            ParseError::unexpected(&Value::Null),
        ]);

        assert_eq!(error.unexpected_count(), 2);
    }

    #[test]
    fn and_then_accumulates_warnings() {
        let warned = ParseResult::Warning(vec![ParseError::Missing], Value::from(1));

        let failed = warned.clone().and_then(|value| {
            ParseResult::<Value>::Failure(vec![ParseError::unexpected(&value)])
        });
        assert_eq!(
            failed,
            ParseResult::Failure(vec![
                ParseError::Missing,
                ParseError::unexpected(&Value::from(1)),
            ]),
        );

        let passed = warned.and_then(ParseResult::Success);
        assert_eq!(passed, ParseResult::Warning(vec![ParseError::Missing], Value::from(1)));
    }

    #[test]
    fn rendering_indents_children() {
        let errors = vec![ParseError::key(
            "id",
            vec![ParseError::ty(&Ast::string_keyword(), &Value::from(1))],
        )];

        assert_eq!(render_errors(&errors), "at key \"id\"\n  expected a string, found 1");
    }
}
