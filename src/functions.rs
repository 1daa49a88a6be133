//! Built-in functions for computed-field formulas
//!
//! The registry is a closed allow-list: formulas cannot define functions and
//! the engine exposes no registration API, so anything outside this set
//! fails with an unknown-function error at evaluation time.

use crate::evaluator::is_truthy;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Maximum number of array elements a single function call may process
pub const MAX_ARRAY_LENGTH: usize = 1000;

/// Error type for function calls
#[derive(Debug)]
pub struct FunctionError {
    /// Human-readable failure description
    pub message: String,
}

impl fmt::Display for FunctionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for FunctionError {}

impl FunctionError {
    /// Create an error from a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Argument-count mismatch
    #[must_use]
    pub fn wrong_arity(expected: &str, actual: usize) -> Self {
        Self {
            message: format!("expects {expected} arguments, got {actual}"),
        }
    }

    /// Argument with the wrong shape or value
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

fn f64_to_number(val: f64) -> Result<serde_json::Number, FunctionError> {
    serde_json::Number::from_f64(val)
        .ok_or_else(|| FunctionError::new("result is not a finite number (NaN or infinity)"))
}

fn numeric_arg(args: &[Value], index: usize) -> Result<f64, FunctionError> {
    match &args[index] {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| FunctionError::invalid_argument("argument is not a valid number")),
        other => Err(FunctionError::invalid_argument(format!(
            "expected numeric argument, got {}",
            crate::evaluator::value_type_name(other)
        ))),
    }
}

fn array_arg<'a>(args: &'a [Value], index: usize) -> Result<&'a Vec<Value>, FunctionError> {
    match &args[index] {
        Value::Array(items) => {
            if items.len() > MAX_ARRAY_LENGTH {
                return Err(FunctionError::new(format!(
                    "array length {} exceeds maximum of {MAX_ARRAY_LENGTH} elements",
                    items.len()
                )));
            }
            Ok(items)
        }
        other => Err(FunctionError::invalid_argument(format!(
            "expected array argument, got {}",
            crate::evaluator::value_type_name(other)
        ))),
    }
}

/// Function signature trait
pub trait BuiltinFunction: Send + Sync {
    /// Function name as it appears in formulas
    fn name(&self) -> &'static str;

    /// Validate argument count
    ///
    /// # Errors
    ///
    /// Returns an error if the number of arguments is invalid for this
    /// function.
    fn validate_arity(&self, args: &[Value]) -> Result<(), FunctionError>;

    /// Execute the function over already-evaluated arguments
    ///
    /// # Errors
    ///
    /// Returns an error if arguments have the wrong shape or the result is
    /// not representable.
    fn call(&self, args: Vec<Value>) -> Result<Value, FunctionError>;
}

/// Single-argument numeric functions: floor, ceil, round, abs, sqrt
struct UnaryMathFunction {
    name: &'static str,
    apply: fn(f64) -> Result<f64, FunctionError>,
}

impl BuiltinFunction for UnaryMathFunction {
    fn name(&self) -> &'static str {
        self.name
    }

    fn validate_arity(&self, args: &[Value]) -> Result<(), FunctionError> {
        if args.len() != 1 {
            return Err(FunctionError::wrong_arity("1", args.len()));
        }
        Ok(())
    }

    fn call(&self, args: Vec<Value>) -> Result<Value, FunctionError> {
        let val = numeric_arg(&args, 0)?;
        Ok(Value::Number(f64_to_number((self.apply)(val)?)?))
    }
}

/// Variadic numeric reducers: min, max
struct FoldFunction {
    name: &'static str,
    apply: fn(f64, f64) -> f64,
}

impl BuiltinFunction for FoldFunction {
    fn name(&self) -> &'static str {
        self.name
    }

    fn validate_arity(&self, args: &[Value]) -> Result<(), FunctionError> {
        if args.is_empty() {
            return Err(FunctionError::wrong_arity("at least 1", 0));
        }
        Ok(())
    }

    fn call(&self, args: Vec<Value>) -> Result<Value, FunctionError> {
        let mut acc = numeric_arg(&args, 0)?;
        for i in 1..args.len() {
            acc = (self.apply)(acc, numeric_arg(&args, i)?);
        }
        Ok(Value::Number(f64_to_number(acc)?))
    }
}

/// `sum()` - add up the numeric elements of one array
struct SumFunction;

impl BuiltinFunction for SumFunction {
    fn name(&self) -> &'static str {
        "sum"
    }

    fn validate_arity(&self, args: &[Value]) -> Result<(), FunctionError> {
        if args.len() != 1 {
            return Err(FunctionError::wrong_arity("1", args.len()));
        }
        Ok(())
    }

    fn call(&self, args: Vec<Value>) -> Result<Value, FunctionError> {
        let items = array_arg(&args, 0)?;
        let mut total = 0.0;
        for item in items {
            match item {
                Value::Number(n) => total += n.as_f64().unwrap_or(0.0),
                other => {
                    return Err(FunctionError::invalid_argument(format!(
                        "cannot sum non-numeric element of type {}",
                        crate::evaluator::value_type_name(other)
                    )));
                }
            }
        }
        Ok(Value::Number(f64_to_number(total)?))
    }
}

/// `count()` - number of elements in one array
struct CountFunction;

impl BuiltinFunction for CountFunction {
    fn name(&self) -> &'static str {
        "count"
    }

    fn validate_arity(&self, args: &[Value]) -> Result<(), FunctionError> {
        if args.len() != 1 {
            return Err(FunctionError::wrong_arity("1", args.len()));
        }
        Ok(())
    }

    fn call(&self, args: Vec<Value>) -> Result<Value, FunctionError> {
        let items = array_arg(&args, 0)?;
        Ok(Value::Number(serde_json::Number::from(items.len())))
    }
}

/// `if(cond, then, else)` - select on truthiness
///
/// All three arguments arrive already evaluated; there is no short-circuit
/// skipping of the untaken branch.
struct IfFunction;

impl BuiltinFunction for IfFunction {
    fn name(&self) -> &'static str {
        "if"
    }

    fn validate_arity(&self, args: &[Value]) -> Result<(), FunctionError> {
        if args.len() != 3 {
            return Err(FunctionError::wrong_arity("3", args.len()));
        }
        Ok(())
    }

    fn call(&self, mut args: Vec<Value>) -> Result<Value, FunctionError> {
        let selected = if is_truthy(&args[0]) { 1 } else { 2 };
        Ok(args.swap_remove(selected))
    }
}

/// Registry of the built-in allow-list
pub struct FunctionRegistry {
    functions: HashMap<&'static str, Box<dyn BuiltinFunction>>,
}

impl FunctionRegistry {
    /// Create the registry with the complete allow-list
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self {
            functions: HashMap::new(),
        };

        registry.register(Box::new(UnaryMathFunction {
            name: "floor",
            apply: |v| Ok(v.floor()),
        }));
        registry.register(Box::new(UnaryMathFunction {
            name: "ceil",
            apply: |v| Ok(v.ceil()),
        }));
        registry.register(Box::new(UnaryMathFunction {
            name: "round",
            apply: |v| Ok(v.round()),
        }));
        registry.register(Box::new(UnaryMathFunction {
            name: "abs",
            apply: |v| Ok(v.abs()),
        }));
        registry.register(Box::new(UnaryMathFunction {
            name: "sqrt",
            apply: |v| {
                if v < 0.0 {
                    Err(FunctionError::invalid_argument(
                        "cannot take square root of negative number",
                    ))
                } else {
                    Ok(v.sqrt())
                }
            },
        }));
        registry.register(Box::new(FoldFunction {
            name: "min",
            apply: f64::min,
        }));
        registry.register(Box::new(FoldFunction {
            name: "max",
            apply: f64::max,
        }));
        registry.register(Box::new(SumFunction));
        registry.register(Box::new(CountFunction));
        registry.register(Box::new(IfFunction));

        registry
    }

    fn register(&mut self, function: Box<dyn BuiltinFunction>) {
        self.functions.insert(function.name(), function);
    }

    /// Look up a function by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn BuiltinFunction> {
        self.functions.get(name).map(Box::as_ref)
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
