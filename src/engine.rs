//! Engine facade
//!
//! `FormulaEngine` ties the parser, dependency extractor, evaluator, cache,
//! and scheduler together behind the surface external collaborators call.
//! One engine is constructed per editing session and handed around by
//! cloning; there is no shared global instance.

use crate::ast::Expr;
use crate::cache::{CacheStats, FieldCache};
use crate::dependencies;
use crate::error::FormulaError;
use crate::evaluator::{Evaluator, EvaluatorConfig};
use crate::parser::{Parser, ParserLimits};
use crate::scheduler::{self, PendingBatch, PendingDebounce};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::oneshot;

/// A computed field descriptor, supplied by the form-definition layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputedField {
    /// Field identifier, also the cache key
    pub id: String,
    /// Formula source text
    pub formula: String,
}

impl ComputedField {
    /// Convenience constructor
    pub fn new(id: impl Into<String>, formula: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            formula: formula.into(),
        }
    }
}

/// Engine configuration
///
/// `Default` carries the production constants; tests tighten individual
/// limits to make slow paths observable.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Structural limits enforced while parsing
    pub parser_limits: ParserLimits,
    /// Wall-clock evaluation timeout
    pub evaluation_timeout: Duration,
    /// Maximum array length a single operation may process
    pub max_array_length: usize,
    /// Age past which a cached value is treated as stale
    pub cache_ttl: Duration,
    /// Coalescing window for repeated requests on one field
    pub debounce_window: Duration,
    /// Collection window for cross-field batch requests
    pub batch_window: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parser_limits: ParserLimits::default(),
            evaluation_timeout: Duration::from_millis(1000),
            max_array_length: crate::functions::MAX_ARRAY_LENGTH,
            cache_ttl: Duration::from_secs(60),
            debounce_window: Duration::from_millis(50),
            batch_window: Duration::from_millis(10),
        }
    }
}

/// Result of a syntax-only formula check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validation {
    /// Whether the formula parsed
    pub valid: bool,
    /// Parse error description when it did not
    pub error: Option<String>,
}

/// A parsed formula with its extracted dependency set
struct ParsedFormula {
    source: String,
    ast: Expr,
    dependencies: BTreeSet<String>,
}

struct EngineInner {
    config: EngineConfig,
    parser: Parser,
    evaluator: Evaluator,
    cache: FieldCache,
    formulas: RwLock<HashMap<String, Arc<ParsedFormula>>>,
    debounces: Mutex<HashMap<String, PendingDebounce>>,
    batch: Mutex<PendingBatch>,
    parse_count: AtomicU64,
}

/// Computed-field engine
///
/// Cheap to clone; all clones share the same caches and pending windows.
#[derive(Clone)]
pub struct FormulaEngine {
    inner: Arc<EngineInner>,
}

impl FormulaEngine {
    /// Create an engine with the default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Create an engine with a custom configuration
    #[must_use]
    pub fn with_config(config: EngineConfig) -> Self {
        let evaluator = Evaluator::with_config(EvaluatorConfig {
            timeout: config.evaluation_timeout,
            max_array_length: config.max_array_length,
        });
        let parser = Parser::with_limits(config.parser_limits);
        let cache = FieldCache::new(config.cache_ttl);
        Self {
            inner: Arc::new(EngineInner {
                config,
                parser,
                evaluator,
                cache,
                formulas: RwLock::new(HashMap::new()),
                debounces: Mutex::new(HashMap::new()),
                batch: Mutex::new(PendingBatch::default()),
                parse_count: AtomicU64::new(0),
            }),
        }
    }

    /// Parse a field's formula and cache the AST for later evaluation
    ///
    /// # Errors
    ///
    /// Returns [`FormulaError::FieldParse`] with the field id in the message
    /// when the formula is invalid.
    pub fn parse_formula(&self, field_id: &str, formula: &str) -> Result<(), FormulaError> {
        let field = ComputedField::new(field_id, formula);
        self.parsed_formula(&field)?;
        Ok(())
    }

    /// Evaluate one field against the given context
    ///
    /// Returns the memoized value when a valid cache entry exists and
    /// `skip_cache` is false. A fresh result is stored together with the
    /// formula's dependency set.
    ///
    /// # Errors
    ///
    /// Propagates parse and evaluation failures; the batch path swallows
    /// these instead.
    pub fn evaluate(
        &self,
        field: &ComputedField,
        context: &HashMap<String, Value>,
        skip_cache: bool,
    ) -> Result<Value, FormulaError> {
        if !skip_cache {
            if let Some(value) = self.inner.cache.get(&field.id) {
                return Ok(value);
            }
        }

        let parsed = self.parsed_formula(field)?;
        let value = self.inner.evaluator.evaluate(&parsed.ast, context)?;
        self.inner
            .cache
            .insert(&field.id, value.clone(), parsed.dependencies.clone());
        Ok(value)
    }

    /// Evaluate a field after the debounce window, coalescing bursts
    ///
    /// Repeated calls for the same field within the window are collapsed to
    /// one evaluation using the most recently supplied context; every caller
    /// from the window receives that single value. The future never fails;
    /// evaluation errors resolve to `Value::Null`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn evaluate_debounced(
        &self,
        field: &ComputedField,
        context: &HashMap<String, Value>,
    ) -> impl Future<Output = Value> + Send + 'static {
        let (tx, rx) = oneshot::channel();

        let generation = {
            let mut debounces = self
                .inner
                .debounces
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let pending = debounces
                .entry(field.id.clone())
                .or_insert_with(|| PendingDebounce {
                    generation: 0,
                    context: HashMap::new(),
                    waiters: Vec::new(),
                });
            pending.generation += 1;
            pending.context = context.clone();
            pending.waiters.push(tx);
            pending.generation
        };

        let engine = self.clone();
        let field = field.clone();
        tokio::spawn(async move {
            tokio::time::sleep(engine.inner.config.debounce_window).await;
            engine.flush_debounce(&field, generation);
        });

        async move { rx.await.unwrap_or(Value::Null) }
    }

    /// Queue a field into the current batch window
    ///
    /// The first request in a window arms the flush; the flush evaluates all
    /// collected fields in dependency order via [`Self::evaluate_batch`] and
    /// delivers each field's value to its waiters. Never fails; per-field
    /// errors resolve to `Value::Null`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn queue_batch_evaluation(
        &self,
        field: &ComputedField,
        context: &HashMap<String, Value>,
    ) -> impl Future<Output = Value> + Send + 'static {
        let (tx, rx) = oneshot::channel();

        let arm_flush = {
            let mut batch = self
                .inner
                .batch
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            batch.add_field(field.clone());
            batch.context = context.clone();
            batch
                .waiters
                .entry(field.id.clone())
                .or_default()
                .push(tx);
            !std::mem::replace(&mut batch.scheduled, true)
        };

        if arm_flush {
            let engine = self.clone();
            tokio::spawn(async move {
                tokio::time::sleep(engine.inner.config.batch_window).await;
                engine.flush_batch();
            });
        }

        async move { rx.await.unwrap_or(Value::Null) }
    }

    /// Evaluate several fields sharing one context, in dependency order
    ///
    /// Fields referencing another field's id (directly or via a dotted path
    /// beneath it) are evaluated after it, observing its freshly computed
    /// value. Circular references are broken with a warning. Parse or
    /// evaluation failures map the affected field to `Value::Null` without
    /// aborting the rest.
    pub fn evaluate_batch(
        &self,
        fields: &[ComputedField],
        context: &HashMap<String, Value>,
    ) -> HashMap<String, Value> {
        let parsed: Vec<Option<Arc<ParsedFormula>>> = fields
            .iter()
            .map(|field| match self.parsed_formula(field) {
                Ok(p) => Some(p),
                Err(error) => {
                    tracing::warn!(field = %field.id, %error, "skipping unparsable batch member");
                    None
                }
            })
            .collect();

        let dependency_sets: Vec<BTreeSet<String>> = parsed
            .iter()
            .map(|p| p.as_ref().map(|p| p.dependencies.clone()).unwrap_or_default())
            .collect();

        let mut working = context.clone();
        let mut results = HashMap::with_capacity(fields.len());

        for index in scheduler::evaluation_order(fields, &dependency_sets) {
            let field = &fields[index];
            let Some(parsed) = &parsed[index] else {
                results.insert(field.id.clone(), Value::Null);
                continue;
            };

            let value = match self.inner.evaluator.evaluate(&parsed.ast, &working) {
                Ok(value) => value,
                Err(error) => {
                    tracing::warn!(field = %field.id, %error, "batch member failed to evaluate");
                    Value::Null
                }
            };

            inject_at_path(&mut working, &field.id, value.clone());
            self.inner
                .cache
                .insert(&field.id, value.clone(), parsed.dependencies.clone());
            results.insert(field.id.clone(), value);
        }

        results
    }

    /// Drop one field's cached value and parsed formula
    pub fn invalidate(&self, field_id: &str) {
        self.inner.cache.invalidate(field_id);
        self.inner
            .formulas
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(field_id);
    }

    /// Drop every cached value whose dependencies match the changed path
    ///
    /// Parsed formulas are kept; a context change does not alter what a
    /// formula reads.
    pub fn invalidate_dependents(&self, changed_path: &str) {
        self.inner.cache.invalidate_dependents(changed_path);
    }

    /// Drop all cached values and parsed formulas
    pub fn clear_cache(&self) {
        self.inner.cache.clear();
        self.inner
            .formulas
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Dependency set of a previously parsed field
    #[must_use]
    pub fn get_dependencies(&self, field_id: &str) -> Option<BTreeSet<String>> {
        self.inner
            .formulas
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(field_id)
            .map(|p| p.dependencies.clone())
    }

    /// Syntax-check a formula without evaluating it. Never fails.
    #[must_use]
    pub fn validate_formula(&self, formula: &str) -> Validation {
        match self.inner.parser.parse(formula) {
            Ok(_) => Validation {
                valid: true,
                error: None,
            },
            Err(error) => Validation {
                valid: false,
                error: Some(error.to_string()),
            },
        }
    }

    /// Number of times the parser has actually run (cache hits excluded)
    #[must_use]
    pub fn parse_count(&self) -> u64 {
        self.inner.parse_count.load(Ordering::Relaxed)
    }

    /// Value-cache statistics
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.inner.cache.stats()
    }

    /// Fetch the parsed formula for a field, reparsing only when the source
    /// text changed since the last parse.
    fn parsed_formula(&self, field: &ComputedField) -> Result<Arc<ParsedFormula>, FormulaError> {
        {
            let formulas = self
                .inner
                .formulas
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(parsed) = formulas.get(&field.id) {
                if parsed.source == field.formula {
                    return Ok(Arc::clone(parsed));
                }
            }
        }

        self.inner.parse_count.fetch_add(1, Ordering::Relaxed);
        let ast = self
            .inner
            .parser
            .parse(&field.formula)
            .map_err(|source| FormulaError::FieldParse {
                field_id: field.id.clone(),
                source,
            })?;
        let dependencies = dependencies::extract(&ast);
        let parsed = Arc::new(ParsedFormula {
            source: field.formula.clone(),
            ast,
            dependencies,
        });

        self.inner
            .formulas
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(field.id.clone(), Arc::clone(&parsed));
        Ok(parsed)
    }

    fn flush_debounce(&self, field: &ComputedField, generation: u64) {
        let pending = {
            let mut debounces = self
                .inner
                .debounces
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            match debounces.get(&field.id) {
                // a newer request owns the window now
                Some(p) if p.generation != generation => return,
                Some(_) => debounces.remove(&field.id),
                None => return,
            }
        };
        let Some(pending) = pending else { return };

        let value = match self.evaluate(field, &pending.context, false) {
            Ok(value) => value,
            Err(error) => {
                tracing::warn!(field = %field.id, %error, "debounced evaluation failed");
                Value::Null
            }
        };

        for waiter in pending.waiters {
            let _ = waiter.send(value.clone());
        }
    }

    fn flush_batch(&self) {
        let batch = {
            let mut pending = self
                .inner
                .batch
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *pending)
        };

        let results = self.evaluate_batch(&batch.fields, &batch.context);

        for (field_id, waiters) in batch.waiters {
            let value = results.get(&field_id).cloned().unwrap_or(Value::Null);
            for waiter in waiters {
                let _ = waiter.send(value.clone());
            }
        }
    }
}

impl Default for FormulaEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Write a value into the working context at a dotted path, creating
/// intermediate objects as needed, so later batch members can read it.
fn inject_at_path(context: &mut HashMap<String, Value>, path: &str, value: Value) {
    let mut segments = path.split('.');
    let Some(first) = segments.next() else { return };
    let rest: Vec<&str> = segments.collect();

    if rest.is_empty() {
        context.insert(first.to_string(), value);
        return;
    }

    let mut current = context
        .entry(first.to_string())
        .or_insert_with(|| Value::Object(serde_json::Map::new()));

    for (i, segment) in rest.iter().enumerate() {
        if !matches!(current, Value::Object(_)) {
            *current = Value::Object(serde_json::Map::new());
        }
        let Value::Object(map) = current else { return };

        if i + 1 == rest.len() {
            map.insert((*segment).to_string(), value);
            return;
        }
        current = map
            .entry((*segment).to_string())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
    }
}
