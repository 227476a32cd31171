//! Wire encoding of finished traversals.
//!
//! Encoders receive the structural traversal, never a pre-rendered string.
//! [`GroovyEncoder`] is the reference encoder: it renders a parameterized
//! Gremlin-Groovy script where literals become bindings named `_a, _b, ...`
//! (deduplicated, in order of first appearance) and step labels are rendered
//! as `'l1', 'l2', ...` in order of first appearance.

use std::collections::BTreeMap;

use graphstep_model::Identifier;
use serde::Serialize;
use serde_json::Value;

use crate::label::StepLabel;
use crate::predicate::{Argument, P};
use crate::step::{Cardinality, Order, Scope, Step};
use crate::traversal::Traversal;

pub trait WireEncoder {
    type Output;

    fn encode(&self, traversal: &Traversal) -> Self::Output;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroovyScript {
    pub script: String,
    pub bindings: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GroovyEncoder;

impl WireEncoder for GroovyEncoder {
    type Output = GroovyScript;

    fn encode(&self, traversal: &Traversal) -> GroovyScript {
        let mut writer = GroovyWriter::default();
        let script = writer.traversal(traversal);
        GroovyScript {
            script,
            bindings: writer
                .parameters
                .into_iter()
                .map(|(value, name)| (name, value))
                .collect(),
        }
    }
}

#[derive(Default)]
struct GroovyWriter {
    parameters: Vec<(Value, String)>,
    labels: Vec<(StepLabel, String)>,
}

impl GroovyWriter {
    fn parameter(&mut self, value: &Value) -> String {
        if let Some((_, name)) = self.parameters.iter().find(|(known, _)| known == value) {
            return name.clone();
        }
        let name = parameter_name(self.parameters.len());
        self.parameters.push((value.clone(), name.clone()));
        name
    }

    fn label(&mut self, label: &StepLabel) -> String {
        if let Some((_, name)) = self.labels.iter().find(|(known, _)| known == label) {
            return format!("'{name}'");
        }
        let name = format!("l{}", self.labels.len() + 1);
        self.labels.push((label.clone(), name.clone()));
        format!("'{name}'")
    }

    // Anything not rooted at a source is spawned from `__`.
    fn traversal(&mut self, traversal: &Traversal) -> String {
        let mut out = String::new();
        if !matches!(traversal.steps().first(), Some(Step::Identifier(_))) {
            out.push_str("__");
            if traversal.is_empty() {
                out.push_str(".identity()");
            }
        }
        for step in traversal.steps().iter() {
            let rendered = self.step(step);
            out.push_str(&rendered);
        }
        out
    }

    fn step(&mut self, step: &Step) -> String {
        let (name, args) = match step {
            Step::Identifier(source) => return source.clone(),
            Step::V(ids) => ("V", self.values(ids)),
            Step::E(ids) => ("E", self.values(ids)),
            Step::AddV(label) => ("addV", vec![self.parameter(&Value::from(label.as_str()))]),
            Step::AddE(label) => ("addE", vec![self.parameter(&Value::from(label.as_str()))]),
            Step::Property {
                cardinality,
                key,
                value,
            } => {
                let mut args = Vec::new();
                if let Some(cardinality) = cardinality {
                    args.push(cardinality_name(*cardinality).to_string());
                }
                args.push(self.identifier(key));
                args.push(self.parameter(value));
                ("property", args)
            }
            Step::Has(key, p) => ("has", vec![self.identifier(key), self.predicate(p)]),
            Step::HasTraversal(key, t) => ("has", vec![self.identifier(key), self.traversal(t)]),
            Step::HasNot(key) => ("hasNot", vec![self.identifier(key)]),
            Step::HasLabel(labels) => ("hasLabel", self.strings(labels)),
            Step::HasValue(p) => ("hasValue", vec![self.predicate(p)]),
            Step::Is(p) => ("is", vec![self.predicate(p)]),
            Step::WherePredicate(p) => ("where", vec![self.predicate(p)]),
            Step::WhereTraversal(t) => ("where", vec![self.traversal(t)]),
            Step::And(ts) => ("and", self.traversals(ts)),
            Step::Or(ts) => ("or", self.traversals(ts)),
            Step::Not(t) => ("not", vec![self.traversal(t)]),
            Step::Dedup => ("dedup", Vec::new()),
            Step::Limit(count) => ("limit", vec![self.parameter(&Value::from(*count))]),
            Step::Range(low, high) => (
                "range",
                vec![
                    self.parameter(&Value::from(*low)),
                    self.parameter(&Value::from(*high)),
                ],
            ),
            Step::Skip(count) => ("skip", vec![self.parameter(&Value::from(*count))]),
            Step::Tail(count) => ("tail", vec![self.parameter(&Value::from(*count))]),
            Step::ChoosePredicate {
                predicate,
                then,
                otherwise,
            } => {
                let mut args = vec![self.predicate(predicate), self.traversal(then)];
                if let Some(otherwise) = otherwise {
                    args.push(self.traversal(otherwise));
                }
                ("choose", args)
            }
            Step::ChooseTraversal {
                condition,
                then,
                otherwise,
            } => {
                let mut args = vec![self.traversal(condition), self.traversal(then)];
                if let Some(otherwise) = otherwise {
                    args.push(self.traversal(otherwise));
                }
                ("choose", args)
            }
            Step::Coalesce(ts) => ("coalesce", self.traversals(ts)),
            Step::Union(ts) => ("union", self.traversals(ts)),
            Step::Optional(t) => ("optional", vec![self.traversal(t)]),
            Step::Local(t) => ("local", vec![self.traversal(t)]),
            Step::Map(t) => ("map", vec![self.traversal(t)]),
            Step::FlatMap(t) => ("flatMap", vec![self.traversal(t)]),
            Step::SideEffect(t) => ("sideEffect", vec![self.traversal(t)]),
            Step::Repeat(t) => ("repeat", vec![self.traversal(t)]),
            Step::Until(t) => ("until", vec![self.traversal(t)]),
            Step::Times(count) => ("times", vec![self.parameter(&Value::from(*count))]),
            Step::Emit => ("emit", Vec::new()),
            Step::Match(ts) => ("match", self.traversals(ts)),
            Step::Fold => ("fold", Vec::new()),
            Step::Unfold => ("unfold", Vec::new()),
            Step::Order => ("order", Vec::new()),
            Step::ByMember(key, order) => (
                "by",
                vec![self.identifier(key), order_name(*order).to_string()],
            ),
            Step::ByTraversal(t, order) => {
                let mut args = vec![self.traversal(t)];
                if let Some(order) = order {
                    args.push(order_name(*order).to_string());
                }
                ("by", args)
            }
            Step::Project(keys) => ("project", self.strings(keys)),
            Step::Group => ("group", Vec::new()),
            Step::As(labels) => ("as", labels.iter().map(|label| self.label(label)).collect()),
            Step::Select(labels) => (
                "select",
                labels.iter().map(|label| self.label(label)).collect(),
            ),
            Step::Aggregate(label) => ("aggregate", vec![self.label(label)]),
            Step::Count => ("count", Vec::new()),
            Step::Sum(Scope::Global) => ("sum", Vec::new()),
            Step::Sum(Scope::Local) => ("sum", vec!["Scope.local".to_string()]),
            Step::Id => ("id", Vec::new()),
            Step::Label => ("label", Vec::new()),
            Step::Values(keys) => ("values", keys.iter().map(|key| self.identifier(key)).collect()),
            Step::ValueMap(keys) => ("valueMap", self.strings(keys)),
            Step::Properties(keys) => (
                "properties",
                keys.iter().map(|key| self.identifier(key)).collect(),
            ),
            Step::Inject(values) => ("inject", self.values(values)),
            Step::Identity => ("identity", Vec::new()),
            Step::Barrier => ("barrier", Vec::new()),
            Step::Drop => ("drop", Vec::new()),
            Step::Out(labels) => ("out", self.strings(labels)),
            Step::In(labels) => ("in", self.strings(labels)),
            Step::Both(labels) => ("both", self.strings(labels)),
            Step::OutE(labels) => ("outE", self.strings(labels)),
            Step::InE(labels) => ("inE", self.strings(labels)),
            Step::BothE(labels) => ("bothE", self.strings(labels)),
            Step::OutV => ("outV", Vec::new()),
            Step::InV => ("inV", Vec::new()),
            Step::OtherV => ("otherV", Vec::new()),
            Step::FromLabel(label) => ("from", vec![self.label(label)]),
            Step::FromTraversal(t) => ("from", vec![self.traversal(t)]),
            Step::ToLabel(label) => ("to", vec![self.label(label)]),
            Step::ToTraversal(t) => ("to", vec![self.traversal(t)]),
        };
        format!(".{name}({})", args.join(", "))
    }

    fn values(&mut self, values: &[Value]) -> Vec<String> {
        values.iter().map(|value| self.parameter(value)).collect()
    }

    fn strings(&mut self, strings: &[String]) -> Vec<String> {
        strings
            .iter()
            .map(|s| self.parameter(&Value::from(s.as_str())))
            .collect()
    }

    fn traversals(&mut self, traversals: &[Traversal]) -> Vec<String> {
        traversals.iter().map(|t| self.traversal(t)).collect()
    }

    fn identifier(&mut self, identifier: &Identifier) -> String {
        match identifier {
            Identifier::Id => "T.id".to_string(),
            Identifier::Label => "T.label".to_string(),
            Identifier::Key(key) => self.parameter(&Value::from(key.as_str())),
        }
    }

    fn predicate(&mut self, p: &P) -> String {
        let name = p.op.gremlin_name();
        let args = match &p.argument {
            Argument::Literal(value) => vec![self.parameter(value)],
            Argument::List(values) => self.values(values),
            Argument::Range(low, high) => vec![self.parameter(low), self.parameter(high)],
            Argument::Label(label) => vec![self.label(label)],
        };
        format!("{name}({})", args.join(", "))
    }
}

fn parameter_name(mut index: usize) -> String {
    let mut name = Vec::new();
    loop {
        name.push(b'a' + (index % 26) as u8);
        index /= 26;
        if index == 0 {
            break;
        }
    }
    name.reverse();
    format!("_{}", String::from_utf8_lossy(&name))
}

fn order_name(order: Order) -> &'static str {
    match order {
        Order::Increasing => "Order.asc",
        Order::Decreasing => "Order.desc",
        Order::Shuffle => "Order.shuffle",
    }
}

fn cardinality_name(cardinality: Cardinality) -> &'static str {
    match cardinality {
        Cardinality::Single => "single",
        Cardinality::List => "list",
        Cardinality::Set => "set",
    }
}
