//! Security-focused tests: structural limits, blocked identifiers,
//! injection-shaped input, and resource exhaustion.

use formula_engine::{
    ComputedField, EngineConfig, EvaluationError, Evaluator, EvaluatorConfig, FormulaEngine,
    ParseError, Parser,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;

fn context(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}

#[test]
fn test_formula_length_limit() {
    let parser = Parser::new();

    let at_limit = format!("{}1", " ".repeat(9_999));
    assert!(parser.parse(&at_limit).is_ok());

    let over_limit = format!("{}1", " ".repeat(10_000));
    assert!(matches!(
        parser.parse(&over_limit),
        Err(ParseError::TooLong {
            length: 10_001,
            max: 10_000
        })
    ));
}

#[test]
fn test_nesting_depth_limit() {
    let parser = Parser::new();

    let deep_ok = format!("{}1{}", "(".repeat(20), ")".repeat(20));
    assert!(parser.parse(&deep_ok).is_ok());

    let too_deep = format!("{}1{}", "(".repeat(21), ")".repeat(21));
    assert!(matches!(
        parser.parse(&too_deep),
        Err(ParseError::TooDeep { .. })
    ));
}

#[test]
fn test_node_budget() {
    let parser = Parser::new();

    let at_budget = format!("1{}", "+1".repeat(500));
    assert!(parser.parse(&at_budget).is_ok());

    let over_budget = format!("1{}", "+1".repeat(501));
    assert!(matches!(
        parser.parse(&over_budget),
        Err(ParseError::TooComplex { .. })
    ));
}

#[test]
fn test_blocked_property_names() {
    let parser = Parser::new();

    for formula in [
        "__proto__",
        "__proto__.polluted",
        "obj.__proto__.polluted",
        "constructor",
        "a.constructor.b",
        "character.prototype",
    ] {
        assert!(
            matches!(
                parser.parse(formula),
                Err(ParseError::BlockedProperty { .. })
            ),
            "{formula} should be rejected"
        );
    }

    // near-misses parse as ordinary identifiers
    assert!(parser.parse("proto").is_ok());
    assert!(parser.parse("my_constructor_field").is_ok());
}

#[test]
fn test_blocked_property_rechecked_at_evaluation() {
    use formula_engine::Expr;

    let expr = Expr::Property(vec!["constructor".to_string()]);
    let result = Evaluator::new().evaluate(&expr, &HashMap::new());
    assert!(matches!(
        result,
        Err(EvaluationError::SecurityViolation { name }) if name == "constructor"
    ));
}

#[test]
fn test_function_allow_list_is_closed() {
    let engine = FormulaEngine::new();
    let ctx = context(&[]);

    for formula in [
        "eval(\"1\")",
        "require(\"fs\")",
        "setTimeout(1, 2, 3)",
        "Function(\"return 1\")",
    ] {
        let field = ComputedField::new("f", formula);
        let err = engine.evaluate(&field, &ctx, true).unwrap_err();
        assert!(
            err.to_string().contains("Unknown function"),
            "{formula}: {err}"
        );
    }
}

#[test]
fn test_injection_shaped_input_rejected() {
    let engine = FormulaEngine::new();

    for formula in [
        "1; system(\"rm\")",
        "a = 5",
        "a && b",
        "a || b",
        "`template`",
        "{key: 1}",
    ] {
        let validation = engine.validate_formula(formula);
        assert!(!validation.valid, "{formula} should not validate");
        assert!(validation.error.is_some());
    }
}

#[test]
fn test_unterminated_string_rejected() {
    let parser = Parser::new();
    assert!(parser.parse("\"open").is_err());
    assert!(parser.parse("'open").is_err());
}

#[test]
fn test_evaluation_timeout() {
    let evaluator = Evaluator::with_config(EvaluatorConfig {
        timeout: Duration::ZERO,
        ..EvaluatorConfig::default()
    });
    let ast = Parser::new().parse("1 + 2 + 3").unwrap();

    std::thread::sleep(Duration::from_millis(2));
    assert!(matches!(
        evaluator.evaluate(&ast, &HashMap::new()),
        Err(EvaluationError::Timeout { .. })
    ));
}

#[test]
fn test_oversized_array_rejected() {
    let engine = FormulaEngine::new();
    let big: Vec<Value> = (0..1001).map(|i| json!(i)).collect();
    let ctx = context(&[("items", Value::Array(big))]);

    let indexed = ComputedField::new("f", "items[0]");
    let err = engine.evaluate(&indexed, &ctx, true).unwrap_err();
    assert!(err.to_string().contains("1001"));

    let summed = ComputedField::new("g", "sum(items)");
    assert!(engine.evaluate(&summed, &ctx, true).is_err());
}

#[test]
fn test_tightened_engine_limits() {
    let engine = FormulaEngine::with_config(EngineConfig {
        parser_limits: formula_engine::ParserLimits {
            max_length: 20,
            max_nodes: 5,
            max_depth: 3,
        },
        ..EngineConfig::default()
    });

    assert!(engine.validate_formula("1 + 2").valid);
    assert!(!engine.validate_formula("1 + 2 + 3 + 4 + 5 + 6").valid);
    assert!(!engine.validate_formula("((((1))))").valid);
}

#[test]
fn test_division_by_zero_is_an_error_not_infinity() {
    let engine = FormulaEngine::new();
    let field = ComputedField::new("f", "5 / 0");
    let err = engine.evaluate(&field, &context(&[]), true).unwrap_err();
    assert!(err.to_string().contains("Division by zero"));
}
