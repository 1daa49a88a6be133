//! Sandboxed formula engine for computed form fields
//!
//! Parses, analyzes, caches, and evaluates small user-authored expressions
//! such as `floor((abilities.strength.value - 10) / 2) + proficiency`
//! against live entity data. Built for hostile input: structural limits are
//! enforced during parsing, evaluation runs under a wall-clock timeout, and
//! functions come from a closed allow-list.
//!
//! # Example
//!
//! ```
//! use formula_engine::{ComputedField, FormulaEngine};
//! use serde_json::json;
//! use std::collections::HashMap;
//!
//! let engine = FormulaEngine::new();
//! let field = ComputedField::new(
//!     "strength_mod",
//!     "floor((abilities.strength.value - 10) / 2)",
//! );
//!
//! let mut context = HashMap::new();
//! context.insert("abilities".to_string(), json!({"strength": {"value": 16}}));
//!
//! let value = engine.evaluate(&field, &context, false).unwrap();
//! assert_eq!(value, json!(3.0));
//! ```
//!
//! Bursty callers use [`FormulaEngine::evaluate_debounced`] (per-field
//! coalescing) or [`FormulaEngine::queue_batch_evaluation`] (cross-field
//! windows evaluated in dependency order). On entity mutation, notify the
//! engine with [`FormulaEngine::invalidate_dependents`].

#![warn(missing_docs)]

pub mod ast;
pub mod cache;
pub mod dependencies;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod parser;
mod scheduler;

pub use ast::{BinaryOp, Expr, UnaryOp};
pub use cache::{CacheStats, FieldCache};
pub use engine::{ComputedField, EngineConfig, FormulaEngine, Validation};
pub use error::{EvaluationError, FormulaError, ParseError};
pub use evaluator::{Evaluator, EvaluatorConfig};
pub use functions::{BuiltinFunction, FunctionRegistry, MAX_ARRAY_LENGTH};
pub use parser::{Parser, ParserLimits, BLOCKED_PROPERTY_NAMES};
