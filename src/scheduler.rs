//! Debounce/batch scheduling support
//!
//! Holds the transient per-field and per-window state the engine keeps while
//! requests coalesce, plus the dependency ordering used for batch passes.
//! The timer tasks themselves are spawned by the engine facade.

use crate::engine::ComputedField;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use tokio::sync::oneshot;

/// Pending debounced evaluation for one field
///
/// Each new request within the window replaces the context, bumps the
/// generation, and adds a waiter. The timer task that flushes compares its
/// generation against the current one; a mismatch means a newer request
/// superseded it and the flush is a no-op.
pub(crate) struct PendingDebounce {
    pub generation: u64,
    pub context: HashMap<String, Value>,
    pub waiters: Vec<oneshot::Sender<Value>>,
}

/// Accumulating batch for the current window
///
/// The first request in a window arms the flush timer; later requests only
/// append. Fields are deduplicated by id, keeping the latest formula.
#[derive(Default)]
pub(crate) struct PendingBatch {
    pub fields: Vec<ComputedField>,
    pub context: HashMap<String, Value>,
    pub waiters: HashMap<String, Vec<oneshot::Sender<Value>>>,
    pub scheduled: bool,
}

impl PendingBatch {
    pub fn add_field(&mut self, field: ComputedField) {
        match self.fields.iter_mut().find(|f| f.id == field.id) {
            Some(existing) => existing.formula = field.formula,
            None => self.fields.push(field),
        }
    }
}

/// Does a dependency path refer to the given field id?
///
/// True for the id itself and for any path beneath it, so a formula reading
/// `subtotal.value` is ordered after the field `subtotal`.
fn refers_to_field(dependency: &str, field_id: &str) -> bool {
    dependency == field_id
        || (dependency.len() > field_id.len()
            && dependency.as_bytes()[field_id.len()] == b'.'
            && dependency.starts_with(field_id))
}

/// Order batch members so every field is evaluated after the fields it reads.
///
/// `dependencies[i]` is the dependency set of `fields[i]` (empty for fields
/// whose formulas failed to parse). Returns indices into `fields`. Cycles are
/// reported via `tracing::warn!` and broken by dropping the back edge; every
/// field still appears exactly once in the result.
pub(crate) fn evaluation_order(
    fields: &[ComputedField],
    dependencies: &[BTreeSet<String>],
) -> Vec<usize> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        OnStack,
        Done,
    }

    fn visit(
        index: usize,
        fields: &[ComputedField],
        dependencies: &[BTreeSet<String>],
        marks: &mut [Mark],
        order: &mut Vec<usize>,
    ) {
        marks[index] = Mark::OnStack;

        for (other, field) in fields.iter().enumerate() {
            if other == index {
                continue;
            }
            let depends = dependencies[index]
                .iter()
                .any(|dep| refers_to_field(dep, &field.id));
            if !depends {
                continue;
            }
            match marks[other] {
                Mark::Unvisited => visit(other, fields, dependencies, marks, order),
                Mark::OnStack => {
                    tracing::warn!(
                        field = %fields[index].id,
                        depends_on = %field.id,
                        "circular dependency between computed fields, breaking cycle"
                    );
                }
                Mark::Done => {}
            }
        }

        marks[index] = Mark::Done;
        order.push(index);
    }

    let mut marks = vec![Mark::Unvisited; fields.len()];
    let mut order = Vec::with_capacity(fields.len());
    for index in 0..fields.len() {
        if marks[index] == Mark::Unvisited {
            visit(index, fields, dependencies, &mut marks, &mut order);
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(id: &str, formula: &str) -> ComputedField {
        ComputedField {
            id: id.to_string(),
            formula: formula.to_string(),
        }
    }

    fn deps(paths: &[&str]) -> BTreeSet<String> {
        paths.iter().map(|p| (*p).to_string()).collect()
    }

    fn ordered_ids(fields: &[ComputedField], dependencies: &[BTreeSet<String>]) -> Vec<String> {
        evaluation_order(fields, dependencies)
            .into_iter()
            .map(|i| fields[i].id.clone())
            .collect()
    }

    #[test]
    fn test_dependency_before_dependent() {
        let fields = [field("total", "subtotal * 2"), field("sub", "price")];
        // "total" reads "subtotal" which is NOT the id "sub"
        let ids = ordered_ids(&fields, &[deps(&["subtotal"]), deps(&["price"])]);
        assert_eq!(ids, vec!["total", "sub"]);

        let fields = [field("total", "subtotal * 2"), field("subtotal", "price")];
        let ids = ordered_ids(&fields, &[deps(&["subtotal"]), deps(&["price"])]);
        assert_eq!(ids, vec!["subtotal", "total"]);
    }

    #[test]
    fn test_order_independent_of_input_order() {
        let a = field("subtotal", "price");
        let b = field("total", "subtotal * 2");
        let a_deps = deps(&["price"]);
        let b_deps = deps(&["subtotal"]);

        let ids = ordered_ids(&[b.clone(), a.clone()], &[b_deps.clone(), a_deps.clone()]);
        assert_eq!(ids, vec!["subtotal", "total"]);
        let ids = ordered_ids(&[a, b], &[a_deps, b_deps]);
        assert_eq!(ids, vec!["subtotal", "total"]);
    }

    #[test]
    fn test_dotted_reference_counts() {
        let fields = [field("total", "subtotal.value * 2"), field("subtotal", "1")];
        let ids = ordered_ids(&fields, &[deps(&["subtotal.value"]), deps(&[])]);
        assert_eq!(ids, vec!["subtotal", "total"]);
    }

    #[test]
    fn test_cycle_is_broken() {
        let fields = [field("a", "b + 1"), field("b", "a + 1")];
        let order = evaluation_order(&fields, &[deps(&["b"]), deps(&["a"])]);
        // both fields appear exactly once
        let mut sorted = order.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![0, 1]);
    }

    #[test]
    fn test_independent_fields_keep_input_order() {
        let fields = [field("x", "1"), field("y", "2"), field("z", "3")];
        let ids = ordered_ids(&fields, &[deps(&[]), deps(&[]), deps(&[])]);
        assert_eq!(ids, vec!["x", "y", "z"]);
    }

    #[test]
    fn test_batch_dedupes_by_field_id() {
        let mut batch = PendingBatch::default();
        batch.add_field(field("hp", "1"));
        batch.add_field(field("hp", "2"));
        assert_eq!(batch.fields.len(), 1);
        assert_eq!(batch.fields[0].formula, "2");
    }
}
