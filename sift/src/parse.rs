//! The interpreter: compiles a schema and a direction into a parser.
//!
//! Compilation is a total function over the node kinds. Each node
//! compiles once; the returned parser closes over its children's
//! parsers. Every compiled parser is pure, never mutates its input,
//! and allocates fresh output containers, so parsers may be shared
//! across threads freely.

use std::cmp;
use std::sync::Arc;

use fxhash::FxHashSet;
use num_bigint::BigInt;
use num_traits::FromPrimitive;

use crate::ast::{ArcAst, Ast, Refinement, Transform, Tuple, TypeAlias, TypeLiteral};
use crate::hooks;
use crate::reporting::{ParseError, ParseResult};
use crate::value::{PropertyKey, Value, ValueMap};

/// Options honoured by every compiled parser.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// Demote unexpected keys and indexes to warnings.
    pub allow_unexpected: bool,
    /// Visit every position instead of stopping at the first fatal
    /// error.
    pub all_errors: bool,
}

/// The interpretation direction.
///
/// Direction only changes the meaning of transform nodes; every
/// other node behaves identically in all three.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Direction {
    /// Raw input to validated value; applies refinements and the
    /// forward leg of transforms.
    Decode,
    /// Membership test for the target shape; transforms contribute
    /// their target side only.
    Guard,
    /// Validated value back to raw output; applies the inverse leg
    /// of transforms.
    Encode,
}

impl Direction {
    pub(crate) fn index(self) -> usize {
        match self {
            Direction::Decode => 0,
            Direction::Guard => 1,
            Direction::Encode => 2,
        }
    }
}

/// A compiled parser.
pub type Parser = Arc<dyn Fn(&Value, &ParseOptions) -> ParseResult<Value> + Send + Sync>;

/// Compile `ast` into a parser for `direction`.
pub(crate) fn compile(direction: Direction, ast: &ArcAst) -> Parser {
    Compiler::new(direction).compile(ast)
}

/// Compilation context for one direction.
struct Compiler {
    direction: Direction,
}

impl Compiler {
    fn new(direction: Direction) -> Compiler {
        Compiler { direction }
    }

    fn compile(&self, ast: &ArcAst) -> Parser {
        match ast.as_ref() {
            Ast::TypeAlias(alias) => self.compile_alias(alias),
            Ast::Literal(value) => equality_parser(value.clone()),
            Ast::UniqueSymbol(symbol) => equality_parser(Value::Symbol(*symbol)),
            Ast::UndefinedKeyword | Ast::VoidKeyword => {
                type_parser(ast, |value| matches!(value, Value::Undefined))
            }
            Ast::NeverKeyword => {
                let expected = ast.clone();
                parser(move |input, _| {
                    ParseResult::Failure(vec![ParseError::ty(&expected, input)])
                })
            }
            Ast::UnknownKeyword | Ast::AnyKeyword => {
                parser(|input, _| ParseResult::Success(input.clone()))
            }
            Ast::StringKeyword => type_parser(ast, |value| matches!(value, Value::String(_))),
            Ast::NumberKeyword => type_parser(ast, |value| matches!(value, Value::Number(_))),
            Ast::BooleanKeyword => type_parser(ast, |value| matches!(value, Value::Bool(_))),
            Ast::BigIntKeyword => bigint_parser(ast),
            Ast::SymbolKeyword => type_parser(ast, |value| matches!(value, Value::Symbol(_))),
            Ast::ObjectKeyword => {
                type_parser(ast, |value| matches!(value, Value::Object(_) | Value::Array(_)))
            }
            Ast::Tuple(tuple) => self.compile_tuple(tuple),
            Ast::TypeLiteral(literal) => self.compile_type_literal(literal),
            Ast::Union(types) => self.compile_union(types),
            Ast::Lazy(lazy) => {
                let lazy = lazy.clone();
                let direction = self.direction;
                parser(move |input, options| (lazy.parser(direction))(input, options))
            }
            Ast::Enums(enums) => {
                let expected = ast.clone();
                let values: Vec<Value> =
                    enums.enums.iter().map(|(_, value)| value.clone()).collect();
                parser(move |input, _| {
                    if values.iter().any(|value| value == input) {
                        ParseResult::Success(input.clone())
                    } else {
                        ParseResult::Failure(vec![ParseError::ty(&expected, input)])
                    }
                })
            }
            Ast::Refinement(refinement) => self.compile_refinement(refinement),
            Ast::TemplateLiteral(template) => {
                let expected = ast.clone();
                let pattern = template.pattern().clone();
                parser(move |input, _| match input {
                    Value::String(text) if pattern.is_match(text) => {
                        ParseResult::Success(input.clone())
                    }
                    Value::String(_) => {
                        ParseResult::Failure(vec![ParseError::ty(&expected, input)])
                    }
                    _ => ParseResult::Failure(vec![ParseError::ty(&Ast::string_keyword(), input)]),
                })
            }
            Ast::Transform(transform) => self.compile_transform(transform),
        }
    }

    /// Aliases are the hookable node kind: a registered handler for
    /// the alias identifier receives the compiled type parameters in
    /// place of expanding the aliased body.
    fn compile_alias(&self, alias: &TypeAlias) -> Parser {
        if let Some(identifier) = alias.annotations.identifier() {
            if let Some(hook) = hooks::lookup(identifier) {
                let parameters: Vec<Parser> = alias
                    .type_parameters
                    .iter()
                    .map(|parameter| self.compile(parameter))
                    .collect();
                return hook(&parameters);
            }
        }
        self.compile(&alias.aliased)
    }

    fn compile_tuple(&self, tuple: &Tuple) -> Parser {
        let elements: Vec<(Parser, bool)> = tuple
            .elements
            .iter()
            .map(|element| (self.compile(&element.ty), element.optional))
            .collect();
        let rest: Option<(Parser, Vec<Parser>)> =
            tuple.rest.as_ref().and_then(|rest| rest.split_first()).map(|(head, tail)| {
                (self.compile(head), tail.iter().map(|ty| self.compile(ty)).collect())
            });

        parser(move |input, options| {
            let items = match input {
                Value::Array(items) => items,
                _ => {
                    return ParseResult::Failure(vec![ParseError::ty(
                        &Ast::unknown_array(),
                        input,
                    )])
                }
            };

            let mut diags = Diagnostics::default();
            let mut out = Vec::with_capacity(items.len());

            for (index, (element, optional)) in elements.iter().enumerate() {
                if index >= items.len() {
                    if *optional {
                        continue;
                    }
                    if diags.fatal(ParseError::index(index, vec![ParseError::Missing]), options) {
                        return diags.failure();
                    }
                    continue;
                }
                match diags.nested(
                    element(&items[index], options),
                    |errors| ParseError::index(index, errors),
                    options,
                ) {
                    Ok(Some(value)) => out.push(value),
                    Ok(None) => {}
                    Err(Stop) => return diags.failure(),
                }
            }

            if let Some((head, tail)) = &rest {
                let start = elements.len();
                let middle_end = cmp::max(start, items.len().saturating_sub(tail.len()));
                for index in start..middle_end {
                    match diags.nested(
                        head(&items[index], options),
                        |errors| ParseError::index(index, errors),
                        options,
                    ) {
                        Ok(Some(value)) => out.push(value),
                        Ok(None) => {}
                        Err(Stop) => return diags.failure(),
                    }
                }
                // The fixed elements after the variadic region sit at
                // the final positions; absent ones are missing at
                // their absolute index.
                for (offset, element) in tail.iter().enumerate() {
                    let index = middle_end + offset;
                    if index >= items.len() {
                        if diags
                            .fatal(ParseError::index(index, vec![ParseError::Missing]), options)
                        {
                            return diags.failure();
                        }
                        continue;
                    }
                    match diags.nested(
                        element(&items[index], options),
                        |errors| ParseError::index(index, errors),
                        options,
                    ) {
                        Ok(Some(value)) => out.push(value),
                        Ok(None) => {}
                        Err(Stop) => return diags.failure(),
                    }
                }
            } else {
                for index in elements.len()..items.len() {
                    let error =
                        ParseError::index(index, vec![ParseError::unexpected(&items[index])]);
                    if diags.unexpected(error, options) {
                        return diags.failure();
                    }
                }
            }

            diags.finish(Value::Array(out))
        })
    }

    fn compile_type_literal(&self, literal: &TypeLiteral) -> Parser {
        let properties: Vec<(PropertyKey, Parser, bool)> = literal
            .property_signatures
            .iter()
            .map(|signature| {
                (signature.name.clone(), self.compile(&signature.ty), signature.optional)
            })
            .collect();
        let indexes: Vec<(ArcAst, Parser, Parser)> = literal
            .index_signatures
            .iter()
            .map(|signature| {
                (
                    signature.parameter.clone(),
                    self.compile(&signature.parameter),
                    self.compile(&signature.ty),
                )
            })
            .collect();
        let expected: FxHashSet<PropertyKey> =
            literal.property_signatures.iter().map(|signature| signature.name.clone()).collect();

        parser(move |input, options| {
            let map = match input {
                Value::Object(map) => map,
                _ => {
                    return ParseResult::Failure(vec![ParseError::ty(
                        &Ast::unknown_record(),
                        input,
                    )])
                }
            };

            let mut diags = Diagnostics::default();
            let mut out = ValueMap::new();

            for (name, property, optional) in &properties {
                match map.get(name) {
                    None => {
                        if *optional {
                            continue;
                        }
                        if diags
                            .fatal(ParseError::key(name.clone(), vec![ParseError::Missing]), options)
                        {
                            return diags.failure();
                        }
                    }
                    Some(value) => match diags.nested(
                        property(value, options),
                        |errors| ParseError::key(name.clone(), errors),
                        options,
                    ) {
                        Ok(Some(value)) => out.insert(name.clone(), value),
                        Ok(None) => {}
                        Err(Stop) => return diags.failure(),
                    },
                }
            }

            if indexes.is_empty() {
                for (key, value) in map.iter() {
                    if expected.contains(key) {
                        continue;
                    }
                    let error = ParseError::key(key.clone(), vec![ParseError::unexpected(value)]);
                    if diags.unexpected(error, options) {
                        return diags.failure();
                    }
                }
            } else {
                for (parameter, key_parser, value_parser) in &indexes {
                    for (key, value) in map.iter() {
                        if expected.contains(key) || !key_matches(parameter, key) {
                            continue;
                        }
                        match diags.nested(
                            key_parser(&key.to_value(), options),
                            |errors| ParseError::key(key.clone(), errors),
                            options,
                        ) {
                            Ok(Some(_)) => {}
                            Ok(None) => continue,
                            Err(Stop) => return diags.failure(),
                        }
                        match diags.nested(
                            value_parser(value, options),
                            |errors| ParseError::key(key.clone(), errors),
                            options,
                        ) {
                            Ok(Some(value)) => out.insert(key.clone(), value),
                            Ok(None) => {}
                            Err(Stop) => return diags.failure(),
                        }
                    }
                }
            }

            diags.finish(Value::Object(out))
        })
    }

    fn compile_union(&self, types: &[ArcAst]) -> Parser {
        let branches: Vec<Parser> = types.iter().map(|ty| self.compile(ty)).collect();

        parser(move |input, options| {
            // Branches run with unexpected entries tolerated, so a
            // near miss surfaces as a ranked candidate rather than a
            // hard failure. The candidate with the fewest unexpected
            // diagnostics wins; ties keep the first branch.
            let lenient = ParseOptions { allow_unexpected: true, ..*options };
            let mut candidate: Option<(usize, ParseResult<Value>)> = None;
            let mut members = Vec::new();

            for branch in &branches {
                match branch(input, &lenient) {
                    result @ ParseResult::Success(_) => return result,
                    ParseResult::Warning(errors, value) => {
                        let count =
                            errors.iter().map(ParseError::unexpected_count).sum::<usize>();
                        if candidate.as_ref().map_or(true, |(best, _)| count < *best) {
                            candidate = Some((count, ParseResult::Warning(errors, value)));
                        }
                    }
                    ParseResult::Failure(errors) => members.push(ParseError::member(errors)),
                }
            }

            if let Some((_, result)) = candidate {
                return result;
            }
            if !members.is_empty() {
                return ParseResult::Failure(members);
            }
            ParseResult::Failure(vec![ParseError::ty(&Ast::never_keyword(), input)])
        })
    }

    fn compile_refinement(&self, refinement: &Refinement) -> Parser {
        let from = self.compile(&refinement.from);
        let decode = refinement.decode.clone();
        parser(move |input, options| from(input, options).and_then(|value| decode(&value)))
    }

    fn compile_transform(&self, transform: &Transform) -> Parser {
        match self.direction {
            Direction::Guard => self.compile(&transform.to),
            Direction::Decode => {
                let from = self.compile(&transform.from);
                let decode = transform.decode.clone();
                parser(move |input, options| {
                    from(input, options).and_then(|value| decode(&value, options))
                })
            }
            // Encoding runs the inverse leg first and then re-parses
            // the source shape, so a transform stays invertible via
            // the same interpreter path.
            Direction::Encode => {
                let from = self.compile(&transform.from);
                let encode = transform.encode.clone();
                parser(move |input, options| {
                    encode(input, options).and_then(|value| from(&value, options))
                })
            }
        }
    }
}

fn parser(f: impl Fn(&Value, &ParseOptions) -> ParseResult<Value> + Send + Sync + 'static) -> Parser {
    Arc::new(f)
}

/// A singleton shape: success on equality, `Equal` otherwise.
fn equality_parser(expected: Value) -> Parser {
    parser(move |input, _| {
        if *input == expected {
            ParseResult::Success(input.clone())
        } else {
            ParseResult::Failure(vec![ParseError::equal(expected.clone(), input)])
        }
    })
}

/// A primitive shape: success when the predicate holds, `Type`
/// otherwise.
fn type_parser(expected: &ArcAst, predicate: fn(&Value) -> bool) -> Parser {
    let expected = expected.clone();
    parser(move |input, _| {
        if predicate(input) {
            ParseResult::Success(input.clone())
        } else {
            ParseResult::Failure(vec![ParseError::ty(&expected, input)])
        }
    })
}

/// Big integers accept their own kind as-is and coerce strings,
/// numbers and booleans. A coercible kind that fails to convert
/// reports the conversion; any other kind fails the shape check.
fn bigint_parser(expected: &ArcAst) -> Parser {
    let expected = expected.clone();
    parser(move |input, _| match input {
        Value::BigInt(_) => ParseResult::Success(input.clone()),
        Value::String(text) => match text.trim().parse::<BigInt>() {
            Ok(number) => ParseResult::Success(Value::BigInt(number)),
            Err(_) => ParseResult::Failure(vec![ParseError::transform(
                &Ast::string_keyword(),
                &expected,
                input,
            )]),
        },
        Value::Number(number) => match integral_bigint(*number) {
            Some(number) => ParseResult::Success(Value::BigInt(number)),
            None => ParseResult::Failure(vec![ParseError::transform(
                &Ast::number_keyword(),
                &expected,
                input,
            )]),
        },
        Value::Bool(flag) => ParseResult::Success(Value::BigInt(BigInt::from(*flag as u8))),
        _ => ParseResult::Failure(vec![ParseError::ty(&expected, input)]),
    })
}

fn integral_bigint(number: f64) -> Option<BigInt> {
    (number.is_finite() && number.fract() == 0.0)
        .then(|| BigInt::from_f64(number))
        .flatten()
}

/// Does `key` fall under an index-signature parameter's key kind?
fn key_matches(parameter: &ArcAst, key: &PropertyKey) -> bool {
    match (parameter.as_ref(), key) {
        (Ast::StringKeyword, PropertyKey::String(_)) => true,
        (Ast::SymbolKeyword, PropertyKey::Symbol(_)) => true,
        (Ast::TemplateLiteral(template), PropertyKey::String(text)) => {
            template.pattern().is_match(text)
        }
        _ => false,
    }
}

/// Stop marker for short-circuited container traversals.
struct Stop;

/// Error accounting for container nodes: warnings collect, the first
/// fatal error short-circuits unless `all_errors` is set. The final
/// list interleaves warnings and fatal errors in traversal order, so
/// a short-circuited list is a prefix of the exhaustive one.
#[derive(Default)]
struct Diagnostics {
    errors: Vec<ParseError>,
    has_fatal: bool,
}

impl Diagnostics {
    fn warn(&mut self, error: ParseError) {
        self.errors.push(error);
    }

    /// Record a fatal error; true means stop visiting further
    /// positions.
    fn fatal(&mut self, error: ParseError, options: &ParseOptions) -> bool {
        self.errors.push(error);
        self.has_fatal = true;
        !options.all_errors
    }

    /// Record an unexpected element or key, fatal unless tolerated.
    fn unexpected(&mut self, error: ParseError, options: &ParseOptions) -> bool {
        if options.allow_unexpected {
            self.warn(error);
            false
        } else {
            self.fatal(error, options)
        }
    }

    /// Fold one child result at a position, wrapping its diagnostics
    /// with `wrap`. `Ok(Some(value))` keeps the value, `Ok(None)`
    /// keeps going without one.
    fn nested(
        &mut self,
        result: ParseResult<Value>,
        wrap: impl FnOnce(Vec<ParseError>) -> ParseError,
        options: &ParseOptions,
    ) -> Result<Option<Value>, Stop> {
        match result {
            ParseResult::Success(value) => Ok(Some(value)),
            ParseResult::Warning(errors, value) => {
                self.warn(wrap(errors));
                Ok(Some(value))
            }
            ParseResult::Failure(errors) => {
                if self.fatal(wrap(errors), options) {
                    Err(Stop)
                } else {
                    Ok(None)
                }
            }
        }
    }

    fn failure(self) -> ParseResult<Value> {
        ParseResult::Failure(self.errors)
    }

    fn finish(self, value: Value) -> ParseResult<Value> {
        if self.has_fatal {
            ParseResult::Failure(self.errors)
        } else if self.errors.is_empty() {
            ParseResult::Success(value)
        } else {
            ParseResult::Warning(self.errors, value)
        }
    }
}
