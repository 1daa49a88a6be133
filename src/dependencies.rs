//! Dependency extraction
//!
//! Walks a parsed formula and collects the set of dot-joined property paths
//! it reads. The set drives cache invalidation and batch ordering.

use crate::ast::Expr;
use std::collections::BTreeSet;

/// Extract the dependency set of a formula.
///
/// Pure function over an already-validated tree; it cannot fail. Indexed
/// access over a property additionally records the element path: `items[0]`
/// yields `items` and `items.0`, while a computed index yields the wildcard
/// `items.*` so invalidation can match any element.
#[must_use]
pub fn extract(expr: &Expr) -> BTreeSet<String> {
    let mut deps = BTreeSet::new();
    collect(expr, &mut deps);
    deps
}

fn collect(expr: &Expr, deps: &mut BTreeSet<String>) {
    match expr {
        Expr::Number(_) | Expr::String(_) | Expr::Boolean(_) => {}

        Expr::Property(path) => {
            deps.insert(path.join("."));
        }

        Expr::Binary { left, right, .. } => {
            collect(left, deps);
            collect(right, deps);
        }

        Expr::Unary { operand, .. } => collect(operand, deps),

        Expr::Function { args, .. } => {
            for arg in args {
                collect(arg, deps);
            }
        }

        Expr::Index { array, index } => {
            collect(array, deps);
            collect(index, deps);

            if let Expr::Property(path) = array.as_ref() {
                let base = path.join(".");
                match index.as_ref() {
                    Expr::Number(n) if n.fract() == 0.0 && *n >= 0.0 => {
                        deps.insert(format!("{base}.{}", *n as u64));
                    }
                    _ => {
                        deps.insert(format!("{base}.*"));
                    }
                }
            }
        }

        Expr::Conditional {
            condition,
            then_branch,
            else_branch,
        } => {
            collect(condition, deps);
            collect(then_branch, deps);
            collect(else_branch, deps);
        }
    }
}
