//! Schema abstract syntax trees.
//!
//! An [`Ast`] describes an expected shape. Nodes are immutable and
//! shared behind [`ArcAst`]; the interpreter in [`crate::parse`]
//! walks them to produce parsers. Construction goes through the
//! associated functions on [`Ast`], which enforce the structural
//! invariants (unions carry at least two members, rest segments are
//! non-empty, property names are unique) and hand out shared
//! singletons for the keyword nodes.

use std::fmt;
use std::sync::Arc;

use fxhash::{FxHashMap, FxHashSet};
use itertools::Itertools;
use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;

use crate::parse::{Direction, ParseOptions, Parser};
use crate::reporting::ParseResult;
use crate::symbol::Symbol;
use crate::value::{PropertyKey, Value};

/// Atomically reference counted AST nodes.
pub type ArcAst = Arc<Ast>;

/// A conversion step supplied by a transform author.
pub type TransformFn = Arc<dyn Fn(&Value, &ParseOptions) -> ParseResult<Value> + Send + Sync>;

/// A narrowing predicate supplied by a refinement author.
pub type RefineFn = Arc<dyn Fn(&Value) -> ParseResult<Value> + Send + Sync>;

/// A deferred schema reference.
pub type ThunkFn = Arc<dyn Fn() -> ArcAst + Send + Sync>;

/// Errors reported by the AST constructors when a structural
/// invariant is violated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AstError {
    #[error("a union needs at least two members, got {0}")]
    UnionTooSmall(usize),

    #[error("a rest segment must describe at least the variadic element")]
    EmptyRest,

    #[error("duplicate property signature: {0}")]
    DuplicateProperty(String),

    #[error("a literal must be a string, number, boolean, null or bigint, got {0}")]
    InvalidLiteral(&'static str),

    #[error("an enum value must be a string or number, got {0}")]
    InvalidEnumValue(&'static str),

    #[error("an index signature must be keyed by strings, symbols or a template literal")]
    InvalidIndexParameter,
}

/// Per-node annotations, queryable by kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Annotations {
    entries: FxHashMap<String, Value>,
}

impl Annotations {
    /// The well-known kind naming a node. The identifier doubles as
    /// the key into the hook registry and feeds diagnostics.
    pub const IDENTIFIER: &'static str = "identifier";

    pub fn new() -> Annotations {
        Annotations::default()
    }

    /// Record an annotation, returning the updated map.
    pub fn with(mut self, kind: impl Into<String>, value: impl Into<Value>) -> Annotations {
        self.entries.insert(kind.into(), value.into());
        self
    }

    pub fn get(&self, kind: &str) -> Option<&Value> {
        self.entries.get(kind)
    }

    /// The identifier annotation, when present and a string.
    pub fn identifier(&self) -> Option<&str> {
        match self.get(Annotations::IDENTIFIER)? {
            Value::String(identifier) => Some(identifier),
            _ => None,
        }
    }
}

/// A named wrapper around another node; the hookable node kind.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeAlias {
    pub annotations: Annotations,
    pub type_parameters: Vec<ArcAst>,
    pub aliased: ArcAst,
}

/// One fixed tuple element.
#[derive(Debug, Clone, PartialEq)]
pub struct TupleElement {
    pub ty: ArcAst,
    pub optional: bool,
}

impl TupleElement {
    pub fn required(ty: ArcAst) -> TupleElement {
        TupleElement { ty, optional: false }
    }

    pub fn optional(ty: ArcAst) -> TupleElement {
        TupleElement { ty, optional: true }
    }
}

/// A heterogeneous sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    pub elements: Vec<TupleElement>,
    /// When present: the variadic element followed by the fixed
    /// elements that close the tuple. Non-empty.
    pub rest: Option<Vec<ArcAst>>,
    pub is_readonly: bool,
}

/// One fixed key of a record shape.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertySignature {
    pub name: PropertyKey,
    pub ty: ArcAst,
    pub optional: bool,
}

impl PropertySignature {
    pub fn required(name: impl Into<PropertyKey>, ty: ArcAst) -> PropertySignature {
        PropertySignature { name: name.into(), ty, optional: false }
    }

    pub fn optional(name: impl Into<PropertyKey>, ty: ArcAst) -> PropertySignature {
        PropertySignature { name: name.into(), ty, optional: true }
    }
}

/// A rule assigning a type to every key matching a key kind.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSignature {
    pub parameter: ArcAst,
    pub ty: ArcAst,
}

impl IndexSignature {
    pub fn new(parameter: ArcAst, ty: ArcAst) -> IndexSignature {
        IndexSignature { parameter, ty }
    }
}

/// A record shape with fixed keys and/or index signatures.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeLiteral {
    pub property_signatures: Vec<PropertySignature>,
    pub index_signatures: Vec<IndexSignature>,
}

/// A placeholder segment of a template literal together with the
/// literal text that follows it.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateSpan {
    pub ty: ArcAst,
    pub literal: String,
}

/// A string shape matched by a generated pattern.
#[derive(Debug, Clone)]
pub struct TemplateLiteral {
    pub head: String,
    pub spans: Vec<TemplateSpan>,
    pattern: Regex,
}

impl TemplateLiteral {
    /// The pattern generated from the head and spans.
    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }
}

impl PartialEq for TemplateLiteral {
    fn eq(&self, other: &TemplateLiteral) -> bool {
        self.head == other.head && self.spans == other.spans
    }
}

/// A narrowing predicate over an already-parsed value.
#[derive(Clone)]
pub struct Refinement {
    pub from: ArcAst,
    pub decode: RefineFn,
}

impl fmt::Debug for Refinement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Refinement").field("from", &self.from).finish_non_exhaustive()
    }
}

impl PartialEq for Refinement {
    fn eq(&self, other: &Refinement) -> bool {
        self.from == other.from && Arc::ptr_eq(&self.decode, &other.decode)
    }
}

/// An invertible conversion between two shapes.
#[derive(Clone)]
pub struct Transform {
    pub from: ArcAst,
    pub to: ArcAst,
    pub decode: TransformFn,
    pub encode: TransformFn,
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transform")
            .field("from", &self.from)
            .field("to", &self.to)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Transform {
    fn eq(&self, other: &Transform) -> bool {
        self.from == other.from
            && self.to == other.to
            && Arc::ptr_eq(&self.decode, &other.decode)
            && Arc::ptr_eq(&self.encode, &other.encode)
    }
}

/// A thunked recursive reference.
///
/// The node owns a shared memo box: one cell for the expanded tree
/// and one compiled parser per direction. Each cell is written at
/// most once; clones share the box, which is also the node's
/// identity.
#[derive(Clone)]
pub struct LazyNode {
    pub identifier: String,
    thunk: ThunkFn,
    memo: Arc<LazyMemo>,
}

#[derive(Default)]
struct LazyMemo {
    ast: OnceCell<ArcAst>,
    parsers: [OnceCell<Parser>; 3],
}

impl LazyNode {
    /// The aliased tree, expanding the thunk on first use.
    pub fn ast(&self) -> ArcAst {
        self.memo.ast.get_or_init(|| (self.thunk)()).clone()
    }

    /// The compiled parser for `direction`, built on first use.
    ///
    /// Compilation never parses, so initialising a cell cannot
    /// re-enter that same cell: recursive occurrences compile to
    /// closures that read the box later.
    pub(crate) fn parser(&self, direction: Direction) -> Parser {
        self.memo.parsers[direction.index()]
            .get_or_init(|| crate::parse::compile(direction, &self.ast()))
            .clone()
    }
}

impl fmt::Debug for LazyNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lazy").field("identifier", &self.identifier).finish_non_exhaustive()
    }
}

impl PartialEq for LazyNode {
    fn eq(&self, other: &LazyNode) -> bool {
        Arc::ptr_eq(&self.memo, &other.memo)
    }
}

/// Enumerated values; input must equal one of them.
#[derive(Debug, Clone, PartialEq)]
pub struct Enums {
    pub enums: Vec<(String, Value)>,
}

/// A schema node.
///
/// The set of node kinds is closed; the interpreter matches on it
/// exhaustively.
#[derive(Debug, Clone, PartialEq)]
pub enum Ast {
    TypeAlias(TypeAlias),
    Literal(Value),
    UniqueSymbol(Symbol),
    UndefinedKeyword,
    VoidKeyword,
    NeverKeyword,
    UnknownKeyword,
    AnyKeyword,
    StringKeyword,
    NumberKeyword,
    BooleanKeyword,
    BigIntKeyword,
    SymbolKeyword,
    ObjectKeyword,
    Tuple(Tuple),
    TypeLiteral(TypeLiteral),
    Union(Vec<ArcAst>),
    Lazy(LazyNode),
    Enums(Enums),
    Refinement(Refinement),
    TemplateLiteral(TemplateLiteral),
    Transform(Transform),
}

macro_rules! keyword_constructor {
    ($(#[$meta:meta])* $name:ident, $variant:ident) => {
        $(#[$meta])*
        pub fn $name() -> ArcAst {
            static NODE: Lazy<ArcAst> = Lazy::new(|| Arc::new(Ast::$variant));
            NODE.clone()
        }
    };
}

impl Ast {
    keyword_constructor!(
        /// Accepts only `undefined`.
        undefined_keyword, UndefinedKeyword);
    keyword_constructor!(
        /// Accepts only `undefined`.
        void_keyword, VoidKeyword);
    keyword_constructor!(
        /// Always fails.
        never_keyword, NeverKeyword);
    keyword_constructor!(
        /// Always succeeds.
        unknown_keyword, UnknownKeyword);
    keyword_constructor!(
        /// Always succeeds.
        any_keyword, AnyKeyword);
    keyword_constructor!(string_keyword, StringKeyword);
    keyword_constructor!(number_keyword, NumberKeyword);
    keyword_constructor!(boolean_keyword, BooleanKeyword);
    keyword_constructor!(
        /// Accepts big integers and coerces strings, numbers and
        /// booleans.
        bigint_keyword, BigIntKeyword);
    keyword_constructor!(symbol_keyword, SymbolKeyword);
    keyword_constructor!(
        /// Accepts any object or array.
        object_keyword, ObjectKeyword);

    /// The array shape reported when rejecting non-array input.
    pub fn unknown_array() -> ArcAst {
        static NODE: Lazy<ArcAst> = Lazy::new(|| {
            Arc::new(Ast::Tuple(Tuple {
                elements: Vec::new(),
                rest: Some(vec![Ast::unknown_keyword()]),
                is_readonly: true,
            }))
        });
        NODE.clone()
    }

    /// The record shape reported when rejecting non-object input.
    pub fn unknown_record() -> ArcAst {
        static NODE: Lazy<ArcAst> = Lazy::new(|| {
            Arc::new(Ast::TypeLiteral(TypeLiteral {
                property_signatures: Vec::new(),
                index_signatures: vec![
                    IndexSignature::new(Ast::string_keyword(), Ast::unknown_keyword()),
                    IndexSignature::new(Ast::symbol_keyword(), Ast::unknown_keyword()),
                ],
            }))
        });
        NODE.clone()
    }

    /// A singleton shape. Accepts string, number, boolean, null and
    /// bigint payloads.
    pub fn literal(value: impl Into<Value>) -> Result<ArcAst, AstError> {
        let value = value.into();
        match value {
            Value::String(_) | Value::Number(_) | Value::Bool(_) | Value::Null
            | Value::BigInt(_) => Ok(Arc::new(Ast::Literal(value))),
            other => Err(AstError::InvalidLiteral(other.kind())),
        }
    }

    /// A singleton symbol shape.
    pub fn unique_symbol(symbol: Symbol) -> ArcAst {
        Arc::new(Ast::UniqueSymbol(symbol))
    }

    pub fn type_alias(
        annotations: Annotations,
        type_parameters: Vec<ArcAst>,
        aliased: ArcAst,
    ) -> ArcAst {
        Arc::new(Ast::TypeAlias(TypeAlias { annotations, type_parameters, aliased }))
    }

    /// A named alias with no type parameters.
    pub fn named(identifier: impl Into<String>, aliased: ArcAst) -> ArcAst {
        Ast::type_alias(
            Annotations::new().with(Annotations::IDENTIFIER, identifier.into()),
            Vec::new(),
            aliased,
        )
    }

    pub fn tuple(
        elements: Vec<TupleElement>,
        rest: Option<Vec<ArcAst>>,
        is_readonly: bool,
    ) -> Result<ArcAst, AstError> {
        if rest.as_ref().is_some_and(|rest| rest.is_empty()) {
            return Err(AstError::EmptyRest);
        }
        Ok(Arc::new(Ast::Tuple(Tuple { elements, rest, is_readonly })))
    }

    pub fn type_literal(
        property_signatures: Vec<PropertySignature>,
        index_signatures: Vec<IndexSignature>,
    ) -> Result<ArcAst, AstError> {
        let mut seen = FxHashSet::default();
        for signature in &property_signatures {
            if !seen.insert(signature.name.clone()) {
                return Err(AstError::DuplicateProperty(signature.name.to_string()));
            }
        }
        for signature in &index_signatures {
            if !matches!(
                signature.parameter.as_ref(),
                Ast::StringKeyword | Ast::SymbolKeyword | Ast::TemplateLiteral(_),
            ) {
                return Err(AstError::InvalidIndexParameter);
            }
        }
        Ok(Arc::new(Ast::TypeLiteral(TypeLiteral { property_signatures, index_signatures })))
    }

    pub fn union(types: Vec<ArcAst>) -> Result<ArcAst, AstError> {
        if types.len() < 2 {
            return Err(AstError::UnionTooSmall(types.len()));
        }
        Ok(Arc::new(Ast::Union(types)))
    }

    pub fn lazy(
        identifier: impl Into<String>,
        thunk: impl Fn() -> ArcAst + Send + Sync + 'static,
    ) -> ArcAst {
        Arc::new(Ast::Lazy(LazyNode {
            identifier: identifier.into(),
            thunk: Arc::new(thunk),
            memo: Arc::new(LazyMemo::default()),
        }))
    }

    pub fn enums(enums: Vec<(String, Value)>) -> Result<ArcAst, AstError> {
        for (_, value) in &enums {
            if !matches!(value, Value::String(_) | Value::Number(_)) {
                return Err(AstError::InvalidEnumValue(value.kind()));
            }
        }
        Ok(Arc::new(Ast::Enums(Enums { enums })))
    }

    pub fn refinement(
        from: ArcAst,
        decode: impl Fn(&Value) -> ParseResult<Value> + Send + Sync + 'static,
    ) -> ArcAst {
        Arc::new(Ast::Refinement(Refinement { from, decode: Arc::new(decode) }))
    }

    pub fn template_literal(head: impl Into<String>, spans: Vec<TemplateSpan>) -> ArcAst {
        let head = head.into();
        let pattern = template_pattern(&head, &spans);
        Arc::new(Ast::TemplateLiteral(TemplateLiteral { head, spans, pattern }))
    }

    pub fn transform(
        from: ArcAst,
        to: ArcAst,
        decode: impl Fn(&Value, &ParseOptions) -> ParseResult<Value> + Send + Sync + 'static,
        encode: impl Fn(&Value, &ParseOptions) -> ParseResult<Value> + Send + Sync + 'static,
    ) -> ArcAst {
        Arc::new(Ast::Transform(Transform {
            from,
            to,
            decode: Arc::new(decode),
            encode: Arc::new(encode),
        }))
    }

    /// A short human description of the node, used in diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Ast::TypeAlias(alias) => alias
                .annotations
                .identifier()
                .map(str::to_owned)
                .unwrap_or_else(|| alias.aliased.describe()),
            Ast::Literal(value) => value.to_string(),
            Ast::UniqueSymbol(symbol) => symbol.to_string(),
            Ast::UndefinedKeyword | Ast::VoidKeyword => "undefined".to_owned(),
            Ast::NeverKeyword => "never".to_owned(),
            Ast::UnknownKeyword => "unknown".to_owned(),
            Ast::AnyKeyword => "any".to_owned(),
            Ast::StringKeyword => "a string".to_owned(),
            Ast::NumberKeyword => "a number".to_owned(),
            Ast::BooleanKeyword => "a boolean".to_owned(),
            Ast::BigIntKeyword => "a bigint".to_owned(),
            Ast::SymbolKeyword => "a symbol".to_owned(),
            Ast::ObjectKeyword => "an object".to_owned(),
            Ast::Tuple(_) => "an array".to_owned(),
            Ast::TypeLiteral(_) => "a record".to_owned(),
            Ast::Union(types) => types.iter().map(|ty| ty.describe()).join(" or "),
            Ast::Lazy(lazy) => lazy.identifier.clone(),
            Ast::Enums(enums) => enums.enums.iter().map(|(_, value)| value.to_string()).join(" | "),
            Ast::Refinement(refinement) => refinement.from.describe(),
            Ast::TemplateLiteral(template) => {
                format!("a string matching {}", template.pattern().as_str())
            }
            Ast::Transform(transform) => transform.to.describe(),
        }
    }
}

/// The regular expression matching a template literal: escaped
/// literal segments interleaved with placeholder classes.
fn template_pattern(head: &str, spans: &[TemplateSpan]) -> Regex {
    let mut source = String::from("^");
    source.push_str(&regex::escape(head));
    for span in spans {
        match span.ty.as_ref() {
            Ast::NumberKeyword => source.push_str(r"[+-]?\d*\.?\d+(?:[eE][+-]?\d+)?"),
            _ => source.push_str(".*"),
        }
        source.push_str(&regex::escape(&span.literal));
    }
    source.push('$');
    // Escaped fragments and fixed classes only.
    Regex::new(&source).unwrap()
}
