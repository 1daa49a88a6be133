//! Abstract syntax tree for computed-field formulas

use serde::{Deserialize, Serialize};
use std::fmt;

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    /// Addition operator (+)
    Add,
    /// Subtraction operator (-)
    Subtract,
    /// Multiplication operator (*)
    Multiply,
    /// Division operator (/)
    Divide,
    /// Modulo operator (%)
    Modulo,
    /// Exponentiation operator (^)
    Power,
    /// Equality operator (==)
    Equal,
    /// Inequality operator (!=)
    NotEqual,
    /// Less than operator (<)
    Less,
    /// Greater than operator (>)
    Greater,
    /// Less than or equal operator (<=)
    LessOrEqual,
    /// Greater than or equal operator (>=)
    GreaterOrEqual,
    /// Logical AND operator (and)
    And,
    /// Logical OR operator (or)
    Or,
}

impl BinaryOp {
    /// Source-level spelling of the operator
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Power => "^",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::Greater => ">",
            BinaryOp::LessOrEqual => "<=",
            BinaryOp::GreaterOrEqual => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    /// Numeric negation operator (-)
    Negate,
    /// Logical NOT operator (not)
    Not,
}

/// A node in a parsed formula
///
/// Owned exclusively by the engine; external collaborators only ever see
/// formula text going in and values coming out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Numeric literal
    Number(f64),
    /// String literal
    String(String),
    /// Boolean literal
    Boolean(bool),

    /// Property path into the entity context, one identifier per segment
    Property(Vec<String>),

    /// Binary operation
    Binary {
        /// The operator
        op: BinaryOp,
        /// Left operand
        left: Box<Expr>,
        /// Right operand
        right: Box<Expr>,
    },

    /// Unary operation
    Unary {
        /// The operator
        op: UnaryOp,
        /// The operand
        operand: Box<Expr>,
    },

    /// Function call against the built-in allow-list
    Function {
        /// Function name (resolved at evaluation time)
        name: String,
        /// Ordered argument expressions
        args: Vec<Expr>,
    },

    /// Array element access
    Index {
        /// Expression producing the array
        array: Box<Expr>,
        /// Expression producing the index
        index: Box<Expr>,
    },

    /// Conditional expression; surfaced in the language only via `if()`
    Conditional {
        /// Condition to evaluate
        condition: Box<Expr>,
        /// Expression selected when the condition is truthy
        then_branch: Box<Expr>,
        /// Expression selected when the condition is falsy
        else_branch: Box<Expr>,
    },
}

impl Expr {
    /// Depth of the expression tree
    #[must_use]
    pub fn depth(&self) -> usize {
        match self {
            Expr::Number(_) | Expr::String(_) | Expr::Boolean(_) | Expr::Property(_) => 1,

            Expr::Unary { operand, .. } => 1 + operand.depth(),

            Expr::Binary { left, right, .. } => 1 + left.depth().max(right.depth()),

            Expr::Function { args, .. } => 1 + args.iter().map(Expr::depth).max().unwrap_or(0),

            Expr::Index { array, index } => 1 + array.depth().max(index.depth()),

            Expr::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                1 + condition
                    .depth()
                    .max(then_branch.depth())
                    .max(else_branch.depth())
            }
        }
    }

    /// Total number of nodes in the expression tree
    #[must_use]
    pub fn node_count(&self) -> usize {
        match self {
            Expr::Number(_) | Expr::String(_) | Expr::Boolean(_) | Expr::Property(_) => 1,

            Expr::Unary { operand, .. } => 1 + operand.node_count(),

            Expr::Binary { left, right, .. } => 1 + left.node_count() + right.node_count(),

            Expr::Function { args, .. } => 1 + args.iter().map(Expr::node_count).sum::<usize>(),

            Expr::Index { array, index } => 1 + array.node_count() + index.node_count(),

            Expr::Conditional {
                condition,
                then_branch,
                else_branch,
            } => 1 + condition.node_count() + then_branch.node_count() + else_branch.node_count(),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(n) => write!(f, "{n}"),
            Expr::String(s) => write!(f, "\"{s}\""),
            Expr::Boolean(b) => write!(f, "{b}"),
            Expr::Property(path) => write!(f, "{}", path.join(".")),

            Expr::Binary { op, left, right } => {
                write!(f, "({left} {} {right})", op.symbol())
            }

            Expr::Unary { op, operand } => match op {
                UnaryOp::Negate => write!(f, "-{operand}"),
                UnaryOp::Not => write!(f, "not {operand}"),
            },

            Expr::Function { name, args } => {
                write!(f, "{name}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }

            Expr::Index { array, index } => write!(f, "{array}[{index}]"),

            Expr::Conditional {
                condition,
                then_branch,
                else_branch,
            } => write!(f, "if({condition}, {then_branch}, {else_branch})"),
        }
    }
}
