//! Error types for the formula engine
//!
//! Parse-time errors (structural limits, security screens, malformed token
//! sequences) and evaluation-time errors are kept as separate enums so
//! callers can surface them differently; `FormulaError` is the engine-level
//! wrapper handed to external collaborators.

use thiserror::Error;

/// Engine-level error returned by the facade operations
#[derive(Debug, Error)]
pub enum FormulaError {
    /// Parse failure attributed to a specific field
    #[error("Failed to parse formula for {field_id}: {source}")]
    FieldParse {
        /// The field whose formula failed to parse
        field_id: String,
        /// The underlying parse error
        source: ParseError,
    },

    /// Error during parsing
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Error during evaluation
    #[error("Evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),
}

/// Errors that can occur during parsing
#[derive(Debug, Clone, Error)]
pub enum ParseError {
    /// Formula text exceeds the length limit
    #[error("Formula length {length} exceeds maximum of {max} characters")]
    TooLong {
        /// Actual formula length
        length: usize,
        /// Maximum allowed length
        max: usize,
    },

    /// Formula builds more nodes than the complexity budget allows
    #[error("Formula complexity {nodes} nodes exceeds maximum of {max}")]
    TooComplex {
        /// Node count at the point parsing was aborted
        nodes: usize,
        /// Maximum allowed node count
        max: usize,
    },

    /// Formula nests deeper than the depth budget allows
    #[error("Formula nesting depth {depth} exceeds maximum of {max}")]
    TooDeep {
        /// Nesting depth at the point parsing was aborted
        depth: usize,
        /// Maximum allowed nesting depth
        max: usize,
    },

    /// A property path segment matched the blocked-name set
    #[error("Blocked property name '{name}' is not allowed")]
    BlockedProperty {
        /// The offending segment
        name: String,
    },

    /// Unexpected token
    #[error("Unexpected token '{token}' at position {position}")]
    UnexpectedToken {
        /// The unexpected token that was encountered
        token: String,
        /// Position in the input where the token was found
        position: usize,
    },

    /// Unexpected end of input
    #[error("Unexpected end of input at position {position}")]
    UnexpectedEof {
        /// Position in the input where parsing failed
        position: usize,
    },

    /// Invalid number format
    #[error("Invalid number '{value}' at position {position}")]
    InvalidNumber {
        /// The numeric text that could not be parsed
        value: String,
        /// Position in the input where the number was found
        position: usize,
    },

    /// Invalid string literal
    #[error("Invalid string literal at position {position}: {reason}")]
    InvalidString {
        /// Position in the input where the string began
        position: usize,
        /// Reason why the string is invalid
        reason: String,
    },

    /// Missing closing delimiter
    #[error("Missing closing '{delimiter}' at position {position}")]
    MissingDelimiter {
        /// The delimiter character that was expected but not found
        delimiter: char,
        /// Position in the input where the delimiter was expected
        position: usize,
    },

    /// Trailing input after a complete expression
    #[error("Unexpected input after expression: '{input}'")]
    TrailingInput {
        /// The unexpected input that remained after parsing
        input: String,
    },
}

/// Errors that can occur during evaluation
#[derive(Debug, Clone, Error)]
pub enum EvaluationError {
    /// Wall-clock timeout exceeded
    #[error("Evaluation timed out after {elapsed_ms}ms (limit {limit_ms}ms)")]
    Timeout {
        /// Elapsed milliseconds at the point evaluation was aborted
        elapsed_ms: u64,
        /// Configured timeout in milliseconds
        limit_ms: u64,
    },

    /// Division or modulo by zero
    #[error("Division by zero")]
    DivisionByZero,

    /// Wrong operand shape for an operator or function
    #[error("Type error: {message}")]
    TypeError {
        /// Description of the type error
        message: String,
    },

    /// Blocked property access caught during context traversal
    #[error("Security violation: blocked property name '{name}'")]
    SecurityViolation {
        /// The offending path segment
        name: String,
    },

    /// Function name outside the allow-list
    #[error("Unknown function '{name}'")]
    UnknownFunction {
        /// Name of the function that was not recognized
        name: String,
    },

    /// Array larger than the per-operation processing limit
    #[error("Array length {length} exceeds maximum of {max} elements")]
    ArrayTooLarge {
        /// Actual array length
        length: usize,
        /// Maximum allowed length
        max: usize,
    },

    /// Function evaluation error
    #[error("Function '{name}' error: {message}")]
    FunctionError {
        /// Name of the function that failed
        name: String,
        /// Error message from the function
        message: String,
    },

    /// Non-finite result from a numeric operation
    #[error("Numeric overflow in operation")]
    NumericOverflow,
}

impl EvaluationError {
    /// Create a type error for binary operations
    #[must_use]
    pub fn binary_type_error(op: &str, left: &str, right: &str) -> Self {
        Self::TypeError {
            message: format!("Cannot {op} values of type {left} and {right}"),
        }
    }

    /// Create a type error for unary operations
    #[must_use]
    pub fn unary_type_error(op: &str, value: &str) -> Self {
        Self::TypeError {
            message: format!("Cannot {op} value of type {value}"),
        }
    }
}
