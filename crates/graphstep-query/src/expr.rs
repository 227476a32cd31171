//! Boolean test expressions over the current traversal value.
//!
//! Expressions are composed explicitly:
//!
//! ```
//! use graphstep_query::Expr;
//!
//! let adult_bob = Expr::field("age").gt(30).and(Expr::field("name").eq("Bob"));
//! assert_eq!(adult_bob.to_string(), r#"(age > 30 && name == "Bob")"#);
//! ```
//!
//! The tree can also represent shapes the compiler rejects (method calls,
//! nested member chains, bare literals as conditions); those surface as
//! [`QueryError::ExpressionNotSupported`](crate::QueryError) carrying the
//! offending node.

use std::fmt;

use serde_json::Value;

use crate::label::StepLabel;
use crate::predicate::CompareOp;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// The traversal's current value.
    Value,
    /// A property of the current element.
    Field(String),
    /// A raw key of the current map value.
    Key(String),
    /// The `value` of the current property element.
    PropertyValue,
    /// `base.name` where `base` is itself a member access.
    Member { base: Box<Expr>, name: String },
    Literal(Value),
    Label(StepLabel),
    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Call {
        target: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn value() -> Self {
        Expr::Value
    }

    pub fn field(name: impl Into<String>) -> Self {
        Expr::Field(name.into())
    }

    pub fn key(name: impl Into<String>) -> Self {
        Expr::Key(name.into())
    }

    pub fn property_value() -> Self {
        Expr::PropertyValue
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn label(label: &StepLabel) -> Self {
        Expr::Label(label.clone())
    }

    pub fn call(target: Expr, method: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Call {
            target: Box::new(target),
            method: method.into(),
            args,
        }
    }

    pub fn member(self, name: impl Into<String>) -> Self {
        Expr::Member {
            base: Box::new(self),
            name: name.into(),
        }
    }

    pub fn compare(self, op: CompareOp, right: impl Into<Expr>) -> Self {
        Expr::Compare {
            op,
            left: Box::new(self),
            right: Box::new(right.into()),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn eq(self, right: impl Into<Expr>) -> Self {
        self.compare(CompareOp::Eq, right)
    }

    pub fn neq(self, right: impl Into<Expr>) -> Self {
        self.compare(CompareOp::Neq, right)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn lt(self, right: impl Into<Expr>) -> Self {
        self.compare(CompareOp::Lt, right)
    }

    pub fn lte(self, right: impl Into<Expr>) -> Self {
        self.compare(CompareOp::Lte, right)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn gt(self, right: impl Into<Expr>) -> Self {
        self.compare(CompareOp::Gt, right)
    }

    pub fn gte(self, right: impl Into<Expr>) -> Self {
        self.compare(CompareOp::Gte, right)
    }

    pub fn within<V: Into<Value>>(self, values: impl IntoIterator<Item = V>) -> Self {
        let values = values.into_iter().map(Into::into).collect::<Vec<_>>();
        self.compare(CompareOp::Within, Expr::Literal(Value::Array(values)))
    }

    pub fn without<V: Into<Value>>(self, values: impl IntoIterator<Item = V>) -> Self {
        let values = values.into_iter().map(Into::into).collect::<Vec<_>>();
        self.compare(CompareOp::Without, Expr::Literal(Value::Array(values)))
    }

    pub fn between(self, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        self.range(CompareOp::Between, low, high)
    }

    pub fn inside(self, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        self.range(CompareOp::Inside, low, high)
    }

    pub fn outside(self, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        self.range(CompareOp::Outside, low, high)
    }

    fn range(self, op: CompareOp, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        self.compare(op, Expr::Literal(Value::Array(vec![low.into(), high.into()])))
    }

    pub fn starts_with(self, prefix: impl Into<String>) -> Self {
        self.compare(CompareOp::StartingWith, Expr::Literal(Value::String(prefix.into())))
    }

    pub fn ends_with(self, suffix: impl Into<String>) -> Self {
        self.compare(CompareOp::EndingWith, Expr::Literal(Value::String(suffix.into())))
    }

    pub fn contains(self, infix: impl Into<String>) -> Self {
        self.compare(CompareOp::Containing, Expr::Literal(Value::String(infix.into())))
    }

    pub fn and(self, right: Expr) -> Self {
        Expr::And(Box::new(self), Box::new(right))
    }

    pub fn or(self, right: Expr) -> Self {
        Expr::Or(Box::new(self), Box::new(right))
    }

    pub fn negate(self) -> Self {
        Expr::Not(Box::new(self))
    }
}

impl std::ops::Not for Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        self.negate()
    }
}

/// `field == value`
pub fn field_equals(field: impl Into<String>, value: impl Into<Expr>) -> Expr {
    Expr::field(field).eq(value)
}

/// `field > value`
pub fn field_greater_than(field: impl Into<String>, value: impl Into<Expr>) -> Expr {
    Expr::field(field).gt(value)
}

/// `field == <value bound to label>`
pub fn references_label(field: impl Into<String>, label: &StepLabel) -> Expr {
    Expr::field(field).eq(Expr::label(label))
}

impl From<&StepLabel> for Expr {
    fn from(label: &StepLabel) -> Self {
        Expr::label(label)
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Expr::Literal(value)
    }
}

impl From<&str> for Expr {
    fn from(value: &str) -> Self {
        Expr::Literal(Value::from(value))
    }
}

impl From<String> for Expr {
    fn from(value: String) -> Self {
        Expr::Literal(Value::from(value))
    }
}

macro_rules! literal_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Expr {
                fn from(value: $ty) -> Self {
                    Expr::Literal(Value::from(value))
                }
            }
        )*
    };
}

literal_from!(bool, i32, i64, u32, u64, f64);

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Value => f.write_str("_"),
            Expr::Field(name) => f.write_str(name),
            Expr::Key(key) => write!(f, "_[{key:?}]"),
            Expr::PropertyValue => f.write_str("_.value"),
            Expr::Member { base, name } => write!(f, "{base}.{name}"),
            Expr::Literal(value) => write!(f, "{value}"),
            Expr::Label(label) => write!(f, "{label}"),
            Expr::Compare { op, left, right } => write!(f, "{left} {} {right}", op.symbol()),
            Expr::And(left, right) => write!(f, "({left} && {right})"),
            Expr::Or(left, right) => write!(f, "({left} || {right})"),
            Expr::Not(inner) => write!(f, "!({inner})"),
            Expr::Call {
                target,
                method,
                args,
            } => {
                write!(f, "{target}.{method}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
        }
    }
}
