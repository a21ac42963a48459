//! Refinements, transforms, the encode and guard directions, and
//! property tests over the engine's invariants.

use once_cell::sync::Lazy;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::json;
use sift::{
    assert_valid, decode, encode, guard, render_errors, try_decode, ArcAst, Ast, ParseError,
    ParseOptions, ParseResult, PropertySignature, TupleElement, Value, ValueMap,
};

fn v(json: serde_json::Value) -> Value {
    Value::from(json)
}

const STRICT: ParseOptions = ParseOptions { allow_unexpected: false, all_errors: false };
const ALL_ERRORS: ParseOptions = ParseOptions { allow_unexpected: false, all_errors: true };
const TOLERANT: ParseOptions = ParseOptions { allow_unexpected: true, all_errors: false };

/// `string <-> number` via decimal notation.
fn number_from_string() -> ArcAst {
    Ast::transform(
        Ast::string_keyword(),
        Ast::number_keyword(),
        |value, _| match value {
            Value::String(text) => match text.parse::<f64>() {
                Ok(number) => ParseResult::Success(Value::Number(number)),
                Err(_) => ParseResult::Failure(vec![ParseError::transform(
                    &Ast::string_keyword(),
                    &Ast::number_keyword(),
                    value,
                )]),
            },
            other => ParseResult::Failure(vec![ParseError::ty(&Ast::string_keyword(), other)]),
        },
        |value, _| match value {
            Value::Number(number) => ParseResult::Success(Value::String(number.to_string())),
            other => ParseResult::Failure(vec![ParseError::ty(&Ast::number_keyword(), other)]),
        },
    )
}

fn field(map: &ValueMap, name: &str) -> Option<f64> {
    match map.get(&name.into()) {
        Some(Value::Number(number)) => Some(*number),
        _ => None,
    }
}

fn parse_date(text: &str) -> Option<(i32, i32, i32)> {
    let mut parts = text.split('-');
    let year = parts.next()?.parse().ok()?;
    let month = parts.next()?.parse().ok()?;
    let day = parts.next()?.parse().ok()?;
    parts.next().is_none().then_some((year, month, day))
}

/// `"YYYY-MM-DD" <-> { year, month, day }`
fn date_schema() -> ArcAst {
    let from = Ast::string_keyword();
    let to = Ast::type_literal(
        vec![
            PropertySignature::required("year", Ast::number_keyword()),
            PropertySignature::required("month", Ast::number_keyword()),
            PropertySignature::required("day", Ast::number_keyword()),
        ],
        Vec::new(),
    )
    .unwrap();

    let decode_from = from.clone();
    let decode_to = to.clone();
    let encode_to = to.clone();

    Ast::transform(
        from,
        to,
        move |value, _| {
            let Value::String(text) = value else {
                return ParseResult::Failure(vec![ParseError::ty(&decode_from, value)]);
            };
            match parse_date(text) {
                Some((year, month, day)) => ParseResult::Success(Value::object([
                    ("year".into(), Value::from(year)),
                    ("month".into(), Value::from(month)),
                    ("day".into(), Value::from(day)),
                ])),
                None => {
                    ParseResult::Failure(vec![ParseError::transform(&decode_from, &decode_to, value)])
                }
            }
        },
        move |value, _| {
            let fields = match value {
                Value::Object(map) => (field(map, "year"), field(map, "month"), field(map, "day")),
                _ => (None, None, None),
            };
            match fields {
                (Some(year), Some(month), Some(day)) => ParseResult::Success(Value::String(
                    format!("{:04}-{:02}-{:02}", year as i64, month as i64, day as i64),
                )),
                _ => ParseResult::Failure(vec![ParseError::ty(&encode_to, value)]),
            }
        },
    )
}

#[test]
fn refinement_narrows_after_the_base_shape() {
    let expected = Ast::named("PositiveNumber", Ast::number_keyword());
    let schema = {
        let expected = expected.clone();
        Ast::refinement(Ast::number_keyword(), move |value| match value {
            Value::Number(number) if *number > 0.0 => ParseResult::Success(value.clone()),
            _ => ParseResult::Failure(vec![ParseError::ty(&expected, value)]),
        })
    };

    assert_eq!(decode(&schema, &v(json!(2.5)), &STRICT), ParseResult::Success(v(json!(2.5))));
    assert_eq!(
        decode(&schema, &v(json!(-1)), &STRICT),
        ParseResult::Failure(vec![ParseError::ty(&expected, &v(json!(-1)))]),
    );
    // The base shape is checked first.
    assert_eq!(
        decode(&schema, &v(json!("2.5")), &STRICT),
        ParseResult::Failure(vec![ParseError::ty(&Ast::number_keyword(), &v(json!("2.5")))]),
    );

    // Refinements apply in every direction.
    assert!(guard(&schema, &v(json!(2.5)), &STRICT));
    assert!(!guard(&schema, &v(json!(-1)), &STRICT));
    assert!(encode(&schema, &v(json!(-1)), &STRICT).errors().len() == 1);
}

#[test]
fn transform_decodes_forward_and_encodes_backward() {
    let schema = number_from_string();

    assert_eq!(decode(&schema, &v(json!("42")), &STRICT), ParseResult::Success(v(json!(42.0))));
    assert_eq!(
        decode(&schema, &v(json!("x")), &STRICT),
        ParseResult::Failure(vec![ParseError::transform(
            &Ast::string_keyword(),
            &Ast::number_keyword(),
            &v(json!("x")),
        )]),
    );
    assert_eq!(encode(&schema, &v(json!(42.0)), &STRICT), ParseResult::Success(v(json!("42"))));

    // Guarding sees the target side only.
    assert!(guard(&schema, &v(json!(42.0)), &STRICT));
    assert!(!guard(&schema, &v(json!("42")), &STRICT));
}

#[test]
fn date_transform_round_trips() {
    let schema = date_schema();
    let raw = v(json!("2023-01-02"));
    let date = v(json!({ "year": 2023, "month": 1, "day": 2 }));

    assert_eq!(decode(&schema, &raw, &STRICT), ParseResult::Success(date.clone()));
    assert_eq!(encode(&schema, &date, &STRICT), ParseResult::Success(raw));
}

#[test]
fn transforms_nest_inside_containers() {
    let schema = Ast::type_literal(
        vec![PropertySignature::required("n", number_from_string())],
        Vec::new(),
    )
    .unwrap();

    assert_eq!(
        decode(&schema, &v(json!({ "n": "42" })), &STRICT),
        ParseResult::Success(v(json!({ "n": 42.0 }))),
    );
    assert_eq!(
        encode(&schema, &v(json!({ "n": 42.0 })), &STRICT),
        ParseResult::Success(v(json!({ "n": "42" }))),
    );
    assert_eq!(
        decode(&schema, &v(json!({ "n": "x" })), &STRICT),
        ParseResult::Failure(vec![ParseError::key(
            "n",
            vec![ParseError::transform(
                &Ast::string_keyword(),
                &Ast::number_keyword(),
                &v(json!("x")),
            )],
        )]),
    );
}

#[test]
fn fallible_operations_render_summaries() {
    let schema = Ast::type_literal(
        vec![PropertySignature::required("id", Ast::string_keyword())],
        Vec::new(),
    )
    .unwrap();

    let failure = try_decode(&schema, &v(json!({})), &STRICT).unwrap_err();
    assert_eq!(failure.summary(), "at key \"id\"\n  is missing");
    assert_eq!(failure.errors(), &[ParseError::key("id", vec![ParseError::Missing])]);
    assert_eq!(failure.to_string(), failure.summary());

    assert!(assert_valid(&schema, &v(json!({ "id": "a" })), &STRICT).is_ok());
    assert!(assert_valid(&schema, &v(json!({})), &STRICT).is_err());

    // Warnings still produce a usable value.
    let tolerated = try_decode(&schema, &v(json!({ "id": "a", "z": 1 })), &TOLERANT);
    assert_eq!(tolerated.unwrap(), v(json!({ "id": "a" })));
}

/// A transform-free schema exercising tuples, records, unions and
/// refinements at once.
fn sample_schema() -> ArcAst {
    static SCHEMA: Lazy<ArcAst> = Lazy::new(|| {
        let record = Ast::type_literal(
            vec![
                PropertySignature::required("id", Ast::string_keyword()),
                PropertySignature::optional("flag", Ast::boolean_keyword()),
            ],
            Vec::new(),
        )
        .unwrap();
        let row = Ast::tuple(
            vec![TupleElement::required(Ast::number_keyword())],
            Some(vec![Ast::string_keyword()]),
            false,
        )
        .unwrap();
        let positive = Ast::refinement(Ast::number_keyword(), |value| match value {
            Value::Number(number) if *number >= 0.0 => ParseResult::Success(value.clone()),
            _ => ParseResult::Failure(vec![ParseError::ty(&Ast::number_keyword(), value)]),
        });
        Ast::union(vec![record, row, positive]).unwrap()
    });
    SCHEMA.clone()
}

fn arb_json() -> impl Strategy<Value = serde_json::Value> {
    let leaf = prop_oneof![
        Just(serde_json::Value::Null),
        any::<bool>().prop_map(serde_json::Value::Bool),
        any::<i32>().prop_map(|number| json!(number)),
        "[a-z]{0,4}".prop_map(serde_json::Value::String),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 0..4).prop_map(serde_json::Value::Array),
            proptest::collection::btree_map("[a-z]{0,3}", inner, 0..4)
                .prop_map(|map| serde_json::Value::Object(map.into_iter().collect())),
        ]
    })
}

proptest! {
    // Membership and decoding agree on transform-free schemas.
    #[test]
    fn guard_agrees_with_decode(json in arb_json()) {
        let schema = sample_schema();
        let input = Value::from(json);
        for options in [STRICT, ALL_ERRORS, TOLERANT] {
            prop_assert_eq!(
                guard(&schema, &input, &options),
                decode(&schema, &input, &options).is_ok(),
            );
        }
    }

    // Stopping early only truncates the diagnostics; it never
    // reorders or rewrites them.
    #[test]
    fn strict_errors_prefix_exhaustive_errors(json in arb_json()) {
        let schema = sample_schema();
        let input = Value::from(json);

        let strict = decode(&schema, &input, &STRICT);
        let full = decode(&schema, &input, &ALL_ERRORS);

        prop_assert!(render_errors(full.errors()).starts_with(&render_errors(strict.errors())));
    }

    #[test]
    fn encode_then_decode_round_trips(year in 1i32..3000, month in 1i32..13, day in 1i32..29) {
        let schema = date_schema();
        let date = Value::object([
            ("year".into(), Value::from(year)),
            ("month".into(), Value::from(month)),
            ("day".into(), Value::from(day)),
        ]);

        let encoded = encode(&schema, &date, &STRICT).ok().unwrap();
        prop_assert_eq!(decode(&schema, &encoded, &STRICT), ParseResult::Success(date));
    }
}
