#![doc = include_str!("../README.md")]

// Data model
pub mod symbol;
pub mod value;

// Schema trees and diagnostics
pub mod ast;
pub mod reporting;

// Interpretation
pub mod hooks;
pub mod ops;
pub mod parse;

// Interop
pub mod json;

// Public exports
pub use ast::{
    Annotations, ArcAst, Ast, AstError, IndexSignature, PropertySignature, TemplateSpan,
    TupleElement,
};
pub use ops::{
    assert_valid, checker, decode, decoder, encode, encoder, guard, try_decode, try_encode,
};
pub use parse::{Direction, ParseOptions, Parser};
pub use reporting::{render_errors, ParseError, ParseFailure, ParseResult};
pub use symbol::Symbol;
pub use value::{PropertyKey, Value, ValueMap};
