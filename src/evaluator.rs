//! Formula evaluator
//!
//! Walks a parsed formula against a live entity context and produces a
//! value. Resource limits are enforced cooperatively: the wall-clock timeout
//! is checked before every node visit, and array operations are bounded per
//! step, so an expensive formula aborts between steps instead of hanging the
//! caller.

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::error::EvaluationError;
use crate::functions::{FunctionRegistry, MAX_ARRAY_LENGTH};
use crate::parser::is_blocked_property;
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Configuration for the evaluator
#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
    /// Wall-clock evaluation timeout
    pub timeout: Duration,
    /// Maximum array length a single operation may process
    pub max_array_length: usize,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(1000),
            max_array_length: MAX_ARRAY_LENGTH,
        }
    }
}

/// Formula evaluator with safety limits
pub struct Evaluator {
    config: EvaluatorConfig,
    functions: FunctionRegistry,
}

impl Evaluator {
    /// Create an evaluator with the default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(EvaluatorConfig::default())
    }

    /// Create an evaluator with a custom configuration
    #[must_use]
    pub fn with_config(config: EvaluatorConfig) -> Self {
        Self {
            config,
            functions: FunctionRegistry::new(),
        }
    }

    /// Evaluate a formula against the given entity context
    ///
    /// A property path whose intermediate values are absent degrades to
    /// `Value::Null` rather than erroring, so formulas over not-yet-populated
    /// entities produce "no value" instead of failures.
    ///
    /// # Errors
    ///
    /// Returns an [`EvaluationError`] on timeout, division by zero, operand
    /// type mismatches, unknown functions, oversized arrays, or blocked
    /// property access.
    pub fn evaluate(
        &self,
        expr: &Expr,
        context: &HashMap<String, Value>,
    ) -> Result<Value, EvaluationError> {
        let mut eval = EvalContext {
            variables: context,
            start_time: Instant::now(),
            config: &self.config,
            functions: &self.functions,
        };
        eval.evaluate_expr(expr)
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

/// Internal evaluation context
struct EvalContext<'a> {
    variables: &'a HashMap<String, Value>,
    start_time: Instant,
    config: &'a EvaluatorConfig,
    functions: &'a FunctionRegistry,
}

impl EvalContext<'_> {
    fn check_timeout(&self) -> Result<(), EvaluationError> {
        let elapsed = self.start_time.elapsed();
        if elapsed > self.config.timeout {
            return Err(EvaluationError::Timeout {
                elapsed_ms: elapsed.as_millis() as u64,
                limit_ms: self.config.timeout.as_millis() as u64,
            });
        }
        Ok(())
    }

    fn evaluate_expr(&mut self, expr: &Expr) -> Result<Value, EvaluationError> {
        self.check_timeout()?;

        match expr {
            Expr::Number(n) => number_value(*n),
            Expr::String(s) => Ok(Value::String(s.clone())),
            Expr::Boolean(b) => Ok(Value::Bool(*b)),

            Expr::Property(path) => self.lookup_property(path),

            Expr::Binary { op, left, right } => {
                // Both operands are always evaluated, `and`/`or` included;
                // there is no short-circuiting anywhere in the language.
                let left_val = self.evaluate_expr(left)?;
                let right_val = self.evaluate_expr(right)?;
                self.apply_binary(*op, left_val, right_val)
            }

            Expr::Unary { op, operand } => {
                let val = self.evaluate_expr(operand)?;
                match op {
                    UnaryOp::Negate => match &val {
                        Value::Number(n) => number_value(-n.as_f64().unwrap_or(0.0)),
                        other => Err(EvaluationError::unary_type_error(
                            "negate",
                            value_type_name(other),
                        )),
                    },
                    UnaryOp::Not => Ok(Value::Bool(!is_truthy(&val))),
                }
            }

            Expr::Function { name, args } => self.evaluate_function(name, args),

            Expr::Index { array, index } => {
                let array_val = self.evaluate_expr(array)?;
                let index_val = self.evaluate_expr(index)?;
                self.apply_index(&array_val, &index_val)
            }

            Expr::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                // All three are evaluated eagerly, matching `if()`.
                let condition_val = self.evaluate_expr(condition)?;
                let then_val = self.evaluate_expr(then_branch)?;
                let else_val = self.evaluate_expr(else_branch)?;
                Ok(if is_truthy(&condition_val) {
                    then_val
                } else {
                    else_val
                })
            }
        }
    }

    /// Walk the context segment by segment. Blocked names are re-checked
    /// here even though the parser already screened them, in case an AST
    /// reached the evaluator through another path.
    fn lookup_property(&self, path: &[String]) -> Result<Value, EvaluationError> {
        for segment in path {
            if is_blocked_property(segment) {
                return Err(EvaluationError::SecurityViolation {
                    name: segment.clone(),
                });
            }
        }

        let mut segments = path.iter();
        let Some(first) = segments.next() else {
            return Ok(Value::Null);
        };
        let Some(mut current) = self.variables.get(first) else {
            return Ok(Value::Null);
        };

        for segment in segments {
            match current {
                Value::Object(map) => match map.get(segment) {
                    Some(next) => current = next,
                    None => return Ok(Value::Null),
                },
                Value::Array(items) => match segment.parse::<usize>() {
                    Ok(idx) if idx < items.len() => current = &items[idx],
                    _ => return Ok(Value::Null),
                },
                _ => return Ok(Value::Null),
            }
        }

        Ok(current.clone())
    }

    fn apply_binary(
        &self,
        op: BinaryOp,
        left: Value,
        right: Value,
    ) -> Result<Value, EvaluationError> {
        match op {
            BinaryOp::Add => {
                let (l, r) = numeric_operands("add", &left, &right)?;
                number_value(l + r)
            }
            BinaryOp::Subtract => {
                let (l, r) = numeric_operands("subtract", &left, &right)?;
                number_value(l - r)
            }
            BinaryOp::Multiply => {
                let (l, r) = numeric_operands("multiply", &left, &right)?;
                number_value(l * r)
            }
            BinaryOp::Divide => {
                let (l, r) = numeric_operands("divide", &left, &right)?;
                if r == 0.0 {
                    return Err(EvaluationError::DivisionByZero);
                }
                number_value(l / r)
            }
            BinaryOp::Modulo => {
                let (l, r) = numeric_operands("take modulo of", &left, &right)?;
                if r == 0.0 {
                    return Err(EvaluationError::DivisionByZero);
                }
                number_value(l % r)
            }
            BinaryOp::Power => {
                let (l, r) = numeric_operands("exponentiate", &left, &right)?;
                number_value(l.powf(r))
            }

            BinaryOp::Equal => Ok(Value::Bool(values_equal(&left, &right))),
            BinaryOp::NotEqual => Ok(Value::Bool(!values_equal(&left, &right))),

            BinaryOp::Less => compare(&left, &right, |o| o == std::cmp::Ordering::Less),
            BinaryOp::Greater => compare(&left, &right, |o| o == std::cmp::Ordering::Greater),
            BinaryOp::LessOrEqual => compare(&left, &right, |o| o != std::cmp::Ordering::Greater),
            BinaryOp::GreaterOrEqual => compare(&left, &right, |o| o != std::cmp::Ordering::Less),

            BinaryOp::And => Ok(Value::Bool(is_truthy(&left) && is_truthy(&right))),
            BinaryOp::Or => Ok(Value::Bool(is_truthy(&left) || is_truthy(&right))),
        }
    }

    fn apply_index(&self, array: &Value, index: &Value) -> Result<Value, EvaluationError> {
        let items = match array {
            Value::Array(items) => items,
            other => {
                return Err(EvaluationError::TypeError {
                    message: format!("Cannot index value of type {}", value_type_name(other)),
                });
            }
        };

        if items.len() > self.config.max_array_length {
            return Err(EvaluationError::ArrayTooLarge {
                length: items.len(),
                max: self.config.max_array_length,
            });
        }

        let idx = match index {
            Value::Number(n) => n.as_f64().unwrap_or(-1.0),
            other => {
                return Err(EvaluationError::TypeError {
                    message: format!(
                        "Array index must be a number, got {}",
                        value_type_name(other)
                    ),
                });
            }
        };

        // negative and fractional indices address no element, like any
        // other out-of-range access
        if idx.fract() != 0.0 || idx < 0.0 {
            return Ok(Value::Null);
        }

        Ok(items.get(idx as usize).cloned().unwrap_or(Value::Null))
    }

    fn evaluate_function(&mut self, name: &str, args: &[Expr]) -> Result<Value, EvaluationError> {
        let Some(function) = self.functions.get(name) else {
            return Err(EvaluationError::UnknownFunction {
                name: name.to_string(),
            });
        };

        // Arguments are evaluated eagerly, left to right; `if()` included.
        let mut arg_values = Vec::with_capacity(args.len());
        for arg in args {
            arg_values.push(self.evaluate_expr(arg)?);
        }

        function
            .validate_arity(&arg_values)
            .and_then(|()| function.call(arg_values))
            .map_err(|e| EvaluationError::FunctionError {
                name: name.to_string(),
                message: e.message,
            })
    }
}

// Value helpers, shared with the function registry.

pub(crate) fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().unwrap_or(0.0) != 0.0,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

pub(crate) fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(l), Value::Bool(r)) => l == r,
        (Value::Number(l), Value::Number(r)) => l.as_f64() == r.as_f64(),
        (Value::String(l), Value::String(r)) => l == r,
        _ => false,
    }
}

fn number_value(val: f64) -> Result<Value, EvaluationError> {
    serde_json::Number::from_f64(val)
        .map(Value::Number)
        .ok_or(EvaluationError::NumericOverflow)
}

fn numeric_operands(op: &str, left: &Value, right: &Value) -> Result<(f64, f64), EvaluationError> {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => {
            Ok((l.as_f64().unwrap_or(0.0), r.as_f64().unwrap_or(0.0)))
        }
        _ => Err(EvaluationError::binary_type_error(
            op,
            value_type_name(left),
            value_type_name(right),
        )),
    }
}

fn compare(
    left: &Value,
    right: &Value,
    accept: impl Fn(std::cmp::Ordering) -> bool,
) -> Result<Value, EvaluationError> {
    let ordering = match (left, right) {
        (Value::Number(l), Value::Number(r)) => l
            .as_f64()
            .unwrap_or(0.0)
            .partial_cmp(&r.as_f64().unwrap_or(0.0)),
        (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
        _ => {
            return Err(EvaluationError::binary_type_error(
                "compare",
                value_type_name(left),
                value_type_name(right),
            ));
        }
    };

    match ordering {
        Some(o) => Ok(Value::Bool(accept(o))),
        None => Err(EvaluationError::TypeError {
            message: "Cannot compare NaN".to_string(),
        }),
    }
}
