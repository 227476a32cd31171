//! Predicate IR and negation normal form.
//!
//! The step vocabulary can only negate whole sub-traversals (`not(...)`), so
//! negation is pushed down to the terminals before lowering:
//!
//! ```text
//! not(A and B)  =>  not(A) or not(B)
//! not(A or B)   =>  not(A) and not(B)
//! not(not(A))   =>  A
//! not(t op v)   =>  t inverse(op) v      (when the operator has an inverse)
//! ```
//!
//! Terminals whose operator has no inverse (`between`, `inside`, `outside`)
//! keep an explicit `Not` around the single terminal.

use std::fmt;

use graphstep_model::Identifier;
use serde_json::Value;

use crate::label::StepLabel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    Within,
    Without,
    Between,
    Inside,
    Outside,
    StartingWith,
    NotStartingWith,
    EndingWith,
    NotEndingWith,
    Containing,
    NotContaining,
}

impl CompareOp {
    pub fn inverse(self) -> Option<CompareOp> {
        use CompareOp::*;
        Some(match self {
            Eq => Neq,
            Neq => Eq,
            Lt => Gte,
            Gte => Lt,
            Gt => Lte,
            Lte => Gt,
            Within => Without,
            Without => Within,
            StartingWith => NotStartingWith,
            NotStartingWith => StartingWith,
            EndingWith => NotEndingWith,
            NotEndingWith => EndingWith,
            Containing => NotContaining,
            NotContaining => Containing,
            Between | Inside | Outside => return None,
        })
    }

    /// The operator that keeps the meaning when both operands swap sides.
    pub fn mirrored(self) -> Option<CompareOp> {
        use CompareOp::*;
        match self {
            Eq | Neq => Some(self),
            Lt => Some(Gt),
            Gt => Some(Lt),
            Lte => Some(Gte),
            Gte => Some(Lte),
            _ => None,
        }
    }

    /// Operators that compare against exactly one value (and so may take a
    /// step label as their argument).
    pub fn is_single_argument(self) -> bool {
        use CompareOp::*;
        matches!(self, Eq | Neq | Lt | Lte | Gt | Gte)
    }

    /// Gremlin predicate name.
    pub fn gremlin_name(self) -> &'static str {
        use CompareOp::*;
        match self {
            Eq => "eq",
            Neq => "neq",
            Lt => "lt",
            Lte => "lte",
            Gt => "gt",
            Gte => "gte",
            Within => "within",
            Without => "without",
            Between => "between",
            Inside => "inside",
            Outside => "outside",
            StartingWith => "startingWith",
            NotStartingWith => "notStartingWith",
            EndingWith => "endingWith",
            NotEndingWith => "notEndingWith",
            Containing => "containing",
            NotContaining => "notContaining",
        }
    }

    pub fn symbol(self) -> &'static str {
        use CompareOp::*;
        match self {
            Eq => "==",
            Neq => "!=",
            Lt => "<",
            Lte => "<=",
            Gt => ">",
            Gte => ">=",
            other => other.gremlin_name(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Literal(Value),
    List(Vec<Value>),
    Range(Value, Value),
    Label(StepLabel),
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Literal(value) => write!(f, "{value}"),
            Argument::List(values) => write!(f, "{}", Value::Array(values.clone())),
            Argument::Range(low, high) => write!(f, "{low}..{high}"),
            Argument::Label(label) => write!(f, "{label}"),
        }
    }
}

/// A single Gremlin `P` predicate: operator plus argument.
#[derive(Debug, Clone, PartialEq)]
pub struct P {
    pub op: CompareOp,
    pub argument: Argument,
}

impl P {
    pub fn new(op: CompareOp, argument: Argument) -> Self {
        Self { op, argument }
    }

    fn literal(op: CompareOp, value: impl Into<Value>) -> Self {
        Self::new(op, Argument::Literal(value.into()))
    }

    pub fn eq(value: impl Into<Value>) -> Self {
        Self::literal(CompareOp::Eq, value)
    }

    pub fn neq(value: impl Into<Value>) -> Self {
        Self::literal(CompareOp::Neq, value)
    }

    pub fn lt(value: impl Into<Value>) -> Self {
        Self::literal(CompareOp::Lt, value)
    }

    pub fn lte(value: impl Into<Value>) -> Self {
        Self::literal(CompareOp::Lte, value)
    }

    pub fn gt(value: impl Into<Value>) -> Self {
        Self::literal(CompareOp::Gt, value)
    }

    pub fn gte(value: impl Into<Value>) -> Self {
        Self::literal(CompareOp::Gte, value)
    }

    pub fn within<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        Self::new(
            CompareOp::Within,
            Argument::List(values.into_iter().map(Into::into).collect()),
        )
    }

    pub fn without<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        Self::new(
            CompareOp::Without,
            Argument::List(values.into_iter().map(Into::into).collect()),
        )
    }

    pub fn between(low: impl Into<Value>, high: impl Into<Value>) -> Self {
        Self::new(CompareOp::Between, Argument::Range(low.into(), high.into()))
    }

    pub fn inside(low: impl Into<Value>, high: impl Into<Value>) -> Self {
        Self::new(CompareOp::Inside, Argument::Range(low.into(), high.into()))
    }

    pub fn outside(low: impl Into<Value>, high: impl Into<Value>) -> Self {
        Self::new(CompareOp::Outside, Argument::Range(low.into(), high.into()))
    }

    pub fn starting_with(prefix: impl Into<String>) -> Self {
        Self::literal(CompareOp::StartingWith, prefix.into())
    }

    pub fn ending_with(suffix: impl Into<String>) -> Self {
        Self::literal(CompareOp::EndingWith, suffix.into())
    }

    pub fn containing(infix: impl Into<String>) -> Self {
        Self::literal(CompareOp::Containing, infix.into())
    }

    /// Compare against the value bound to `label`.
    pub fn label(op: CompareOp, label: &StepLabel) -> Self {
        Self::new(op, Argument::Label(label.clone()))
    }

    /// Same argument, inverted operator.
    pub fn negate(&self) -> Option<P> {
        self.op.inverse().map(|op| P {
            op,
            argument: self.argument.clone(),
        })
    }

    pub fn references_label(&self) -> Option<&StepLabel> {
        match &self.argument {
            Argument::Label(label) => Some(label),
            _ => None,
        }
    }
}

impl fmt::Display for P {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.op.symbol(), self.argument)
    }
}

/// What a terminal predicate tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalKey {
    /// The traversal's current value itself.
    Value,
    /// A property of the current element.
    Property(Identifier),
    /// The `value` of a property element.
    PropertyValue,
    /// A raw map key.
    Key(String),
}

impl fmt::Display for TerminalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminalKey::Value => f.write_str("_"),
            TerminalKey::Property(id) => write!(f, "{id}"),
            TerminalKey::PropertyValue => f.write_str("value"),
            TerminalKey::Key(key) => write!(f, "[{key}]"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Terminal { key: TerminalKey, p: P },
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn terminal(key: TerminalKey, p: P) -> Self {
        Predicate::Terminal { key, p }
    }

    pub fn and(left: Predicate, right: Predicate) -> Self {
        Predicate::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: Predicate, right: Predicate) -> Self {
        Predicate::Or(Box::new(left), Box::new(right))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(inner: Predicate) -> Self {
        Predicate::Not(Box::new(inner))
    }

    /// Negation normal form. Idempotent.
    pub fn normalize(self) -> Predicate {
        self.push_negation(false)
    }

    fn push_negation(self, negate: bool) -> Predicate {
        match self {
            Predicate::Terminal { key, p } if negate => match p.negate() {
                Some(p) => Predicate::Terminal { key, p },
                None => Predicate::not(Predicate::Terminal { key, p }),
            },
            terminal @ Predicate::Terminal { .. } => terminal,
            Predicate::And(left, right) if negate => {
                Predicate::or(left.push_negation(true), right.push_negation(true))
            }
            Predicate::And(left, right) => {
                Predicate::and(left.push_negation(false), right.push_negation(false))
            }
            Predicate::Or(left, right) if negate => {
                Predicate::and(left.push_negation(true), right.push_negation(true))
            }
            Predicate::Or(left, right) => {
                Predicate::or(left.push_negation(false), right.push_negation(false))
            }
            Predicate::Not(inner) => inner.push_negation(!negate),
        }
    }

    /// `true` when every `Not` wraps a single terminal.
    pub fn is_normalized(&self) -> bool {
        match self {
            Predicate::Terminal { .. } => true,
            Predicate::Not(inner) => matches!(**inner, Predicate::Terminal { .. }),
            Predicate::And(left, right) | Predicate::Or(left, right) => {
                left.is_normalized() && right.is_normalized()
            }
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Terminal { key, p } => write!(f, "{key} {p}"),
            Predicate::And(left, right) => write!(f, "({left} and {right})"),
            Predicate::Or(left, right) => write!(f, "({left} or {right})"),
            Predicate::Not(inner) => write!(f, "not({inner})"),
        }
    }
}
