//! Expression → predicate IR → steps.
//!
//! [`PredicateCompiler::compile`] classifies an [`Expr`] into the predicate
//! IR, resolving property names through the environment's model for the
//! traversal's current shape. [`lower`] turns a normalized predicate into
//! steps:
//!
//! | predicate                        | steps                                  |
//! |----------------------------------|----------------------------------------|
//! | `And(a, b)`                      | `and(where a, where b)`                |
//! | `Or(a, b)`                       | `or(where a, where b)`                 |
//! | `Not(t)`                         | `not(where t)`                         |
//! | value terminal, label argument   | `where(p)`                             |
//! | value terminal                   | `is(p)`                                |
//! | property terminal, label arg     | `has(key, where(p))`                   |
//! | property terminal                | `has(key, p)`                          |
//! | property-value terminal          | `hasValue(p)`                          |
//! | map-key terminal                 | `has(key, p)`                          |

use graphstep_model::Identifier;
use serde_json::Value;

use crate::environment::QueryEnvironment;
use crate::error::{QueryError, QueryResult};
use crate::expr::Expr;
use crate::predicate::{Argument, CompareOp, Predicate, TerminalKey, P};
use crate::shape::Shape;
use crate::step::Step;
use crate::traversal::Traversal;

pub struct PredicateCompiler<'a> {
    env: &'a QueryEnvironment,
    shape: &'a Shape,
}

impl<'a> PredicateCompiler<'a> {
    pub fn new(env: &'a QueryEnvironment, shape: &'a Shape) -> Self {
        Self { env, shape }
    }

    /// Classify `expr` into the predicate IR. The result is not normalized.
    pub fn compile(&self, expr: &Expr) -> QueryResult<Predicate> {
        match expr {
            Expr::And(left, right) => Ok(Predicate::and(self.compile(left)?, self.compile(right)?)),
            Expr::Or(left, right) => Ok(Predicate::or(self.compile(left)?, self.compile(right)?)),
            Expr::Not(inner) => Ok(Predicate::not(self.compile(inner)?)),
            Expr::Compare { op, left, right } => self.comparison(expr, *op, left, right),
            other => Err(QueryError::unsupported(other)),
        }
    }

    fn comparison(
        &self,
        whole: &Expr,
        op: CompareOp,
        left: &Expr,
        right: &Expr,
    ) -> QueryResult<Predicate> {
        // `30 < age` is `age > 30`.
        let (op, left, right) = if is_operand(left) && !is_operand(right) {
            let mirrored = op.mirrored().ok_or_else(|| QueryError::unsupported(whole))?;
            (mirrored, right, left)
        } else {
            (op, left, right)
        };

        let key = self.terminal_key(left)?;
        let argument = argument(whole, op, right)?;
        Ok(Predicate::terminal(key, P::new(op, argument)))
    }

    fn terminal_key(&self, left: &Expr) -> QueryResult<TerminalKey> {
        match left {
            Expr::Value => Ok(TerminalKey::Value),
            Expr::Field(name) => Ok(TerminalKey::Property(self.env.identifier(self.shape, name))),
            Expr::Key(key) => Ok(TerminalKey::Key(key.clone())),
            Expr::PropertyValue => Ok(TerminalKey::PropertyValue),
            other => Err(QueryError::unsupported(other)),
        }
    }
}

/// Literal or label: something a comparison tests against.
fn is_operand(expr: &Expr) -> bool {
    matches!(expr, Expr::Literal(_) | Expr::Label(_))
}

fn argument(whole: &Expr, op: CompareOp, right: &Expr) -> QueryResult<Argument> {
    use CompareOp::*;

    // Labels first; they are not literals even though they look like values.
    if let Expr::Label(label) = right {
        return if op.is_single_argument() {
            Ok(Argument::Label(label.clone()))
        } else {
            Err(QueryError::unsupported(whole))
        };
    }

    let Expr::Literal(value) = right else {
        return Err(QueryError::unsupported(right));
    };

    match (op, value) {
        (Within | Without, Value::Array(items)) => Ok(Argument::List(items.clone())),
        (Within | Without, single) => Ok(Argument::List(vec![single.clone()])),
        (Between | Inside | Outside, Value::Array(bounds)) if bounds.len() == 2 => {
            Ok(Argument::Range(bounds[0].clone(), bounds[1].clone()))
        }
        (Between | Inside | Outside, _) => Err(QueryError::unsupported(whole)),
        (
            StartingWith | NotStartingWith | EndingWith | NotEndingWith | Containing
            | NotContaining,
            Value::String(_),
        ) => Ok(Argument::Literal(value.clone())),
        (
            StartingWith | NotStartingWith | EndingWith | NotEndingWith | Containing
            | NotContaining,
            _,
        ) => Err(QueryError::unsupported(whole)),
        _ => Ok(Argument::Literal(value.clone())),
    }
}

/// Append the steps for a normalized `predicate` to `traversal`.
pub fn lower(traversal: &Traversal, predicate: &Predicate) -> QueryResult<Traversal> {
    match predicate {
        Predicate::And(left, right) => {
            traversal.and([&**left, &**right].map(|p| move |t: Traversal| lower(&t, p)))
        }
        Predicate::Or(left, right) => {
            traversal.or([&**left, &**right].map(|p| move |t: Traversal| lower(&t, p)))
        }
        Predicate::Not(inner) => traversal.not(|t| lower(&t, inner)),
        Predicate::Terminal { key, p } => Ok(traversal.add_step(terminal_step(traversal, key, p))),
    }
}

fn terminal_step(traversal: &Traversal, key: &TerminalKey, p: &P) -> Step {
    let compares_label = p.references_label().is_some();
    match key {
        TerminalKey::Value if compares_label => Step::WherePredicate(p.clone()),
        TerminalKey::Value => Step::Is(p.clone()),
        TerminalKey::Property(id) if compares_label => Step::HasTraversal(
            id.clone(),
            traversal
                .anonymize()
                .add_step(Step::WherePredicate(p.clone())),
        ),
        TerminalKey::Property(id) => Step::Has(id.clone(), p.clone()),
        TerminalKey::PropertyValue => Step::HasValue(p.clone()),
        TerminalKey::Key(key) if compares_label => Step::HasTraversal(
            Identifier::key(key.as_str()),
            traversal
                .anonymize()
                .add_step(Step::WherePredicate(p.clone())),
        ),
        TerminalKey::Key(key) => Step::Has(Identifier::key(key.as_str()), p.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::StepLabel;
    use graphstep_model::{GraphModel, TypeDecl, TypeGraph, VERTEX};
    use serde_json::json;
    use std::sync::Arc;

    fn env() -> Arc<QueryEnvironment> {
        let types = TypeGraph::element_builder()
            .declare(TypeDecl::class("Person").extends(VERTEX))
            .build()
            .unwrap();
        let model = GraphModel::builder(types)
            .vertex("Person", "person", [("age", Identifier::key("years"))])
            .build()
            .unwrap();
        QueryEnvironment::builder().model(model).build()
    }

    #[test]
    fn test_field_resolves_through_model() {
        let env = env();
        let shape = Shape::vertex("Person");
        let compiler = PredicateCompiler::new(&env, &shape);
        let predicate = compiler.compile(&Expr::field("age").gt(30)).unwrap();
        assert_eq!(
            predicate,
            Predicate::terminal(TerminalKey::Property(Identifier::key("years")), P::gt(30))
        );
    }

    #[test]
    fn test_literal_on_the_left_is_mirrored() {
        let env = env();
        let shape = Shape::vertex("Person");
        let compiler = PredicateCompiler::new(&env, &shape);
        let predicate = compiler
            .compile(&Expr::literal(30).lt(Expr::field("name")))
            .unwrap();
        assert_eq!(
            predicate,
            Predicate::terminal(TerminalKey::Property(Identifier::key("name")), P::gt(30))
        );
    }

    #[test]
    fn test_label_argument_detected_before_literals() {
        let env = env();
        let shape = Shape::vertex("Person");
        let label = StepLabel::new(Shape::value());
        let compiler = PredicateCompiler::new(&env, &shape);
        let predicate = compiler.compile(&Expr::value().eq(&label)).unwrap();
        assert_eq!(
            predicate,
            Predicate::terminal(TerminalKey::Value, P::label(CompareOp::Eq, &label))
        );

        let within_label = Expr::value().compare(CompareOp::Within, &label);
        assert!(compiler.compile(&within_label).is_err());
    }

    #[test]
    fn test_range_operators_need_two_bounds() {
        let env = env();
        let shape = Shape::value();
        let compiler = PredicateCompiler::new(&env, &shape);
        let ok = compiler.compile(&Expr::value().between(1, 5)).unwrap();
        assert_eq!(ok, Predicate::terminal(TerminalKey::Value, P::between(1, 5)));

        let bad = Expr::value().compare(CompareOp::Between, json!([1, 2, 3]));
        assert!(matches!(
            compiler.compile(&bad),
            Err(QueryError::ExpressionNotSupported { .. })
        ));
    }

    #[test]
    fn test_unsupported_expression_carries_offending_node() {
        let env = env();
        let shape = Shape::vertex("Person");
        let compiler = PredicateCompiler::new(&env, &shape);
        let call = Expr::call(Expr::field("name"), "to_uppercase", Vec::new());
        let err = compiler.compile(&call.clone().eq("BOB")).unwrap_err();
        match err {
            QueryError::ExpressionNotSupported { expr } => assert_eq!(expr, call),
            other => panic!("unexpected error: {other}"),
        }

        let nested = Expr::field("address").member("city").eq("Berlin");
        assert!(compiler.compile(&nested).is_err());
        assert!(compiler.compile(&Expr::literal(true)).is_err());
    }
}
