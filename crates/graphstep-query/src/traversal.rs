//! The immutable traversal builder.
//!
//! A [`Traversal`] is a value: every combinator returns a new traversal and
//! leaves the receiver untouched. Steps live in a persistent [`StepList`], so
//! branching off an existing traversal shares all of its steps.
//!
//! Structural combinators (`union`, `optional`, `where_traversal`, ...) take
//! continuations. Each continuation receives an anonymized copy of the
//! receiver ([`Traversal::anonymize`]: same environment and shape, no steps,
//! no bindings) and the label bindings of whatever it returns are merged back
//! into the result.
//!
//! Combinators that can fail return [`QueryResult`]; failures never leave a
//! partially built traversal behind.

use std::fmt;
use std::sync::Arc;

use graphstep_model::{ElementKind, Identifier, TypeKey};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::compiler::{lower, PredicateCompiler};
use crate::deserialization::from_collapsed;
use crate::encoder::{GroovyEncoder, GroovyScript, WireEncoder};
use crate::environment::QueryEnvironment;
use crate::error::{QueryError, QueryResult};
use crate::expr::Expr;
use crate::label::{LabelBindings, StepLabel};
use crate::predicate::{Predicate, TerminalKey, P};
use crate::shape::{Shape, ShapeKind};
use crate::step::{Cardinality, Order, Scope, Step, StepList};

/// Boxed continuation, for passing differently typed closures to the
/// multi-branch combinators.
pub type Branch<'a> = Box<dyn FnOnce(Traversal) -> QueryResult<Traversal> + 'a>;

#[derive(Clone)]
pub struct Traversal {
    env: Arc<QueryEnvironment>,
    steps: StepList,
    bindings: LabelBindings,
    shape: Shape,
    anonymous: bool,
}

impl Traversal {
    pub(crate) fn start(env: Arc<QueryEnvironment>, steps: StepList, shape: Shape) -> Self {
        Self {
            env,
            steps,
            bindings: LabelBindings::new(),
            shape,
            anonymous: false,
        }
    }

    /// A disconnected traversal (`__`) over `env`. It cannot be executed.
    pub fn anonymous(env: Arc<QueryEnvironment>) -> Self {
        Self {
            anonymous: true,
            ..Self::start(env, StepList::new(), Shape::value())
        }
    }

    /// Same environment and shape; no steps and no bindings.
    pub fn anonymize(&self) -> Self {
        Self {
            env: self.env.clone(),
            steps: StepList::new(),
            bindings: LabelBindings::new(),
            shape: self.shape.clone(),
            anonymous: true,
        }
    }

    pub fn environment(&self) -> &Arc<QueryEnvironment> {
        &self.env
    }

    pub fn steps(&self) -> &StepList {
        &self.steps
    }

    pub fn bindings(&self) -> &LabelBindings {
        &self.bindings
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn is_anonymous(&self) -> bool {
        self.anonymous
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    // ========================================================================
    // Plumbing
    // ========================================================================

    pub(crate) fn add_step(&self, step: Step) -> Self {
        self.add_shared(Arc::new(step))
    }

    fn add_shared(&self, step: Arc<Step>) -> Self {
        Self {
            steps: self.steps.push_shared(step),
            ..self.clone()
        }
    }

    fn add_step_as(&self, step: Step, shape: Shape) -> Self {
        self.add_step(step).with_shape(shape)
    }

    fn with_shape(self, shape: Shape) -> Self {
        Self { shape, ..self }
    }

    fn continue_with<F>(&self, continuation: F) -> QueryResult<Traversal>
    where
        F: FnOnce(Traversal) -> QueryResult<Traversal>,
    {
        continuation(self.anonymize())
    }

    fn continue_all<I, F>(&self, continuations: I) -> QueryResult<Vec<Traversal>>
    where
        I: IntoIterator<Item = F>,
        F: FnOnce(Traversal) -> QueryResult<Traversal>,
    {
        continuations
            .into_iter()
            .map(|continuation| self.continue_with(continuation))
            .collect()
    }

    fn merge_bindings<'t>(
        self,
        others: impl IntoIterator<Item = &'t Traversal>,
    ) -> QueryResult<Self> {
        let bindings = others
            .into_iter()
            .try_fold(self.bindings.clone(), |acc, other| acc.merge(&other.bindings))?;
        Ok(Self { bindings, ..self })
    }

    /// Append a step embedding `embedded`, merging their bindings.
    fn embed(&self, step: Step, shape: Shape, embedded: &[&Traversal]) -> QueryResult<Self> {
        let next = self.clone().merge_bindings(embedded.iter().copied())?;
        Ok(next.add_step_as(step, shape))
    }

    fn require(&self, operation: &'static str, kinds: &[ShapeKind]) -> QueryResult<()> {
        if kinds.contains(&self.shape.kind()) {
            Ok(())
        } else {
            Err(QueryError::transition(operation, &self.shape))
        }
    }

    fn element_kind(&self, operation: &'static str) -> QueryResult<ElementKind> {
        self.shape
            .element_kind()
            .ok_or_else(|| QueryError::transition(operation, &self.shape))
    }

    fn identifier(&self, field: &str) -> Identifier {
        self.env.identifier(&self.shape, field)
    }

    fn edge_labels(&self, edge: &TypeKey) -> Vec<String> {
        self.env.model().filter_labels(ElementKind::Edge, edge)
    }

    // ========================================================================
    // Labels
    // ========================================================================

    /// Bind `label` to the logical `name`.
    pub fn bind_label(&self, label: &StepLabel, name: impl Into<String>) -> QueryResult<Traversal> {
        Ok(Self {
            bindings: self.bindings.bind(label, name)?,
            ..self.clone()
        })
    }

    /// Label the current values with a fresh label and continue with it.
    pub fn as_<F>(&self, continuation: F) -> QueryResult<Traversal>
    where
        F: FnOnce(Traversal, StepLabel) -> QueryResult<Traversal>,
    {
        let label = StepLabel::new(self.shape.clone());
        continuation(self.as_label(&label), label)
    }

    pub fn as_label(&self, label: &StepLabel) -> Traversal {
        self.add_step(Step::As(vec![label.clone()]))
    }

    pub fn select(&self, label: &StepLabel) -> Traversal {
        self.add_step_as(Step::Select(vec![label.clone()]), label.shape().clone())
    }

    /// `select(l1, l2, ...)` with each label bound to a result member name.
    pub fn select_as(&self, labels: &[(&StepLabel, &str)]) -> QueryResult<Traversal> {
        let bindings = labels
            .iter()
            .try_fold(self.bindings.clone(), |acc, (label, name)| acc.bind(label, *name))?;
        let step = Step::Select(labels.iter().map(|(label, _)| (*label).clone()).collect());
        Ok(Self {
            bindings,
            ..self.add_step_as(step, Shape::value())
        })
    }

    /// Aggregate the current values into a fresh side-effect label.
    pub fn aggregate<F>(&self, continuation: F) -> QueryResult<Traversal>
    where
        F: FnOnce(Traversal, StepLabel) -> QueryResult<Traversal>,
    {
        let label = StepLabel::new(Shape::array(self.shape.clone()));
        continuation(self.add_step(Step::Aggregate(label.clone())), label)
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    pub fn out(&self, edge: impl Into<TypeKey>) -> QueryResult<Traversal> {
        self.adjacent("out", edge.into(), Step::Out)
    }

    pub fn in_(&self, edge: impl Into<TypeKey>) -> QueryResult<Traversal> {
        self.adjacent("in", edge.into(), Step::In)
    }

    pub fn both(&self, edge: impl Into<TypeKey>) -> QueryResult<Traversal> {
        self.adjacent("both", edge.into(), Step::Both)
    }

    fn adjacent(
        &self,
        operation: &'static str,
        edge: TypeKey,
        step: fn(Vec<String>) -> Step,
    ) -> QueryResult<Traversal> {
        self.require(operation, &[ShapeKind::Vertex])?;
        let labels = self.edge_labels(&edge);
        Ok(self.add_step_as(step(labels), Shape::vertex(graphstep_model::VERTEX)))
    }

    pub fn out_e(&self, edge: impl Into<TypeKey>) -> QueryResult<Traversal> {
        self.require("outE", &[ShapeKind::Vertex])?;
        let edge = edge.into();
        let shape = Shape::edge_between(edge.clone(), self.shape.element_type(), None);
        Ok(self.add_step_as(Step::OutE(self.edge_labels(&edge)), shape))
    }

    pub fn in_e(&self, edge: impl Into<TypeKey>) -> QueryResult<Traversal> {
        self.require("inE", &[ShapeKind::Vertex])?;
        let edge = edge.into();
        let shape = Shape::edge_between(edge.clone(), None, self.shape.element_type());
        Ok(self.add_step_as(Step::InE(self.edge_labels(&edge)), shape))
    }

    pub fn both_e(&self, edge: impl Into<TypeKey>) -> QueryResult<Traversal> {
        self.require("bothE", &[ShapeKind::Vertex])?;
        let edge = edge.into();
        let labels = self.edge_labels(&edge);
        Ok(self.add_step_as(Step::BothE(labels), Shape::edge(edge)))
    }

    pub fn out_v(&self) -> QueryResult<Traversal> {
        self.require("outV", &[ShapeKind::Edge])?;
        let vertex = self.shape.out_vertex().cloned();
        Ok(self.add_step_as(Step::OutV, endpoint(vertex)))
    }

    pub fn in_v(&self) -> QueryResult<Traversal> {
        self.require("inV", &[ShapeKind::Edge])?;
        let vertex = self.shape.in_vertex().cloned();
        Ok(self.add_step_as(Step::InV, endpoint(vertex)))
    }

    pub fn other_v(&self) -> QueryResult<Traversal> {
        self.require("otherV", &[ShapeKind::Edge])?;
        Ok(self.add_step_as(Step::OtherV, endpoint(None)))
    }

    /// Narrow the current elements to `ty`.
    ///
    /// No step is added when the current element type already is a `ty`
    /// (unless type optimization is disabled) or when every registered type
    /// matches. Otherwise a `hasLabel` filter with the derived labels.
    pub fn of_type(&self, ty: impl Into<TypeKey>) -> QueryResult<Traversal> {
        let kind = self.element_kind("ofType")?;
        let ty = ty.into();
        let cast = self.shape.cast(ty.clone());

        let types = self.env.model().types();
        let already_typed = self
            .shape
            .element_type()
            .is_some_and(|current| types.is_assignable(current.as_str(), ty.as_str()));
        if already_typed && !self.env.options().disable_type_optimization {
            return Ok(self.clone().with_shape(cast));
        }

        let labels = self.env.model().filter_labels(kind, &ty);
        if labels.is_empty() {
            Ok(self.clone().with_shape(cast))
        } else {
            Ok(self.add_step_as(Step::HasLabel(labels), cast))
        }
    }

    /// Reinterpret the current values as `ty` without adding a step.
    pub fn cast(&self, ty: impl Into<TypeKey>) -> Traversal {
        let shape = match self.shape.kind() {
            ShapeKind::Value => Shape::value_of(ty),
            _ => self.shape.cast(ty),
        };
        self.clone().with_shape(shape)
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    pub fn add_v<T: Serialize>(
        &self,
        ty: impl Into<TypeKey>,
        vertex: &T,
    ) -> QueryResult<Traversal> {
        let ty = ty.into();
        let label = self.env.model().vertices().label_of(ty.as_str());
        let properties = property_steps(&self.env, ElementKind::Vertex, &ty, vertex)?;
        let next = self.add_step_as(Step::AddV(label), Shape::vertex(ty));
        Ok(properties.into_iter().fold(next, |acc, step| acc.add_step(step)))
    }

    /// Add an edge; when started from vertices they become its out-vertex.
    pub fn add_e<T: Serialize>(&self, ty: impl Into<TypeKey>, edge: &T) -> QueryResult<Traversal> {
        let ty = ty.into();
        let label = self.env.model().edges().label_of(ty.as_str());
        let properties = property_steps(&self.env, ElementKind::Edge, &ty, edge)?;
        let out_vertex = match self.shape.kind() {
            ShapeKind::Vertex => self.shape.element_type(),
            _ => None,
        };
        let next = self.add_step_as(Step::AddE(label), Shape::edge_between(ty, out_vertex, None));
        Ok(properties.into_iter().fold(next, |acc, step| acc.add_step(step)))
    }

    pub fn from_label(&self, label: &StepLabel) -> QueryResult<Traversal> {
        self.require("from", &[ShapeKind::Edge])?;
        let shape = self.endpoints(label.shape().element_type(), self.shape.in_vertex().cloned());
        Ok(self.add_step_as(Step::FromLabel(label.clone()), shape))
    }

    pub fn to_label(&self, label: &StepLabel) -> QueryResult<Traversal> {
        self.require("to", &[ShapeKind::Edge])?;
        let shape = self.endpoints(self.shape.out_vertex().cloned(), label.shape().element_type());
        Ok(self.add_step_as(Step::ToLabel(label.clone()), shape))
    }

    pub fn from_traversal<F>(&self, from: F) -> QueryResult<Traversal>
    where
        F: FnOnce(Traversal) -> QueryResult<Traversal>,
    {
        self.require("from", &[ShapeKind::Edge])?;
        let from = self.continue_with(from)?;
        let shape = self.endpoints(from.shape.element_type(), self.shape.in_vertex().cloned());
        self.embed(Step::FromTraversal(from.clone()), shape, &[&from])
    }

    pub fn to_traversal<F>(&self, to: F) -> QueryResult<Traversal>
    where
        F: FnOnce(Traversal) -> QueryResult<Traversal>,
    {
        self.require("to", &[ShapeKind::Edge])?;
        let to = self.continue_with(to)?;
        let shape = self.endpoints(self.shape.out_vertex().cloned(), to.shape.element_type());
        self.embed(Step::ToTraversal(to.clone()), shape, &[&to])
    }

    fn endpoints(&self, out_vertex: Option<TypeKey>, in_vertex: Option<TypeKey>) -> Shape {
        let edge = self.shape.result_type();
        Shape::edge_between(edge, out_vertex, in_vertex)
    }

    /// Set `field` on the current element, or drop it when `value` is `None`.
    pub fn property(&self, field: &str, value: Option<Value>) -> QueryResult<Traversal> {
        self.require(
            "property",
            &[ShapeKind::Vertex, ShapeKind::Edge, ShapeKind::VertexProperty],
        )?;
        let Some(value) = value else {
            let field = field.to_string();
            return self.side_effect(move |t| Ok(t.properties(&[field.as_str()])?.drop()));
        };

        let key = self.identifier(field);
        let steps = if self.shape.kind() == ShapeKind::Vertex {
            vertex_property_steps(key, value)
        } else {
            vec![Step::Property {
                cardinality: None,
                key,
                value,
            }]
        };
        Ok(steps.into_iter().fold(self.clone(), |acc, step| acc.add_step(step)))
    }

    pub fn drop(&self) -> Traversal {
        self.add_step_as(Step::Drop, Shape::value())
    }

    // ========================================================================
    // Filters
    // ========================================================================

    pub fn has(&self, field: &str, predicate: P) -> Traversal {
        self.add_step(Step::Has(self.identifier(field), predicate))
    }

    pub fn has_not(&self, field: &str) -> Traversal {
        self.add_step(Step::HasNot(self.identifier(field)))
    }

    pub fn has_label<S: Into<String>>(&self, labels: impl IntoIterator<Item = S>) -> Traversal {
        self.add_step(Step::HasLabel(labels.into_iter().map(Into::into).collect()))
    }

    pub fn has_value(&self, predicate: P) -> QueryResult<Traversal> {
        self.require("hasValue", &[ShapeKind::VertexProperty, ShapeKind::Property])?;
        Ok(self.add_step(Step::HasValue(predicate)))
    }

    pub fn is(&self, predicate: P) -> Traversal {
        self.add_step(Step::Is(predicate))
    }

    /// Filter by a boolean expression over the current values.
    pub fn where_(&self, expr: &Expr) -> QueryResult<Traversal> {
        let predicate = PredicateCompiler::new(&self.env, &self.shape).compile(expr)?;
        self.where_predicate(predicate)
    }

    /// Filter by a predicate; it is normalized before lowering.
    pub fn where_predicate(&self, predicate: Predicate) -> QueryResult<Traversal> {
        lower(self, &predicate.normalize())
    }

    pub fn where_traversal<F>(&self, filter: F) -> QueryResult<Traversal>
    where
        F: FnOnce(Traversal) -> QueryResult<Traversal>,
    {
        let filter = self.continue_with(filter)?;
        self.embed(Step::WhereTraversal(filter.clone()), self.shape.clone(), &[&filter])
    }

    /// `has(field, <traversal over the property value>)`
    pub fn where_field<F>(&self, field: &str, filter: F) -> QueryResult<Traversal>
    where
        F: FnOnce(Traversal) -> QueryResult<Traversal>,
    {
        let filter = filter(self.anonymize().with_shape(Shape::value()))?;
        let step = Step::HasTraversal(self.identifier(field), filter.clone());
        self.embed(step, self.shape.clone(), &[&filter])
    }

    pub fn and<I, F>(&self, branches: I) -> QueryResult<Traversal>
    where
        I: IntoIterator<Item = F>,
        F: FnOnce(Traversal) -> QueryResult<Traversal>,
    {
        let branches = self.continue_all(branches)?;
        let embedded: Vec<&Traversal> = branches.iter().collect();
        self.embed(Step::And(branches.clone()), self.shape.clone(), &embedded)
    }

    pub fn or<I, F>(&self, branches: I) -> QueryResult<Traversal>
    where
        I: IntoIterator<Item = F>,
        F: FnOnce(Traversal) -> QueryResult<Traversal>,
    {
        let branches = self.continue_all(branches)?;
        let embedded: Vec<&Traversal> = branches.iter().collect();
        self.embed(Step::Or(branches.clone()), self.shape.clone(), &embedded)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not<F>(&self, negated: F) -> QueryResult<Traversal>
    where
        F: FnOnce(Traversal) -> QueryResult<Traversal>,
    {
        let negated = self.continue_with(negated)?;
        self.embed(Step::Not(negated.clone()), self.shape.clone(), &[&negated])
    }

    pub fn dedup(&self) -> Traversal {
        self.add_step(Step::Dedup)
    }

    /// `limit(1)` shares a single step instance across all traversals.
    pub fn limit(&self, count: u64) -> Traversal {
        if count == 1 {
            self.add_shared(Step::limit_one())
        } else {
            self.add_step(Step::Limit(count))
        }
    }

    pub fn range(&self, low: u64, high: u64) -> Traversal {
        self.add_step(Step::Range(low, high))
    }

    pub fn skip(&self, count: u64) -> Traversal {
        self.add_step(Step::Skip(count))
    }

    pub fn tail(&self, count: u64) -> Traversal {
        self.add_step(Step::Tail(count))
    }

    // ========================================================================
    // Branching
    // ========================================================================

    pub fn choose<C, T>(&self, condition: C, then: T) -> QueryResult<Traversal>
    where
        C: FnOnce(Traversal) -> QueryResult<Traversal>,
        T: FnOnce(Traversal) -> QueryResult<Traversal>,
    {
        let condition = self.continue_with(condition)?;
        let then = self.continue_with(then)?;
        let step = Step::ChooseTraversal {
            condition: condition.clone(),
            then: then.clone(),
            otherwise: None,
        };
        self.embed(step, Shape::common([&self.shape, &then.shape]), &[&condition, &then])
    }

    pub fn choose_else<C, T, E>(
        &self,
        condition: C,
        then: T,
        otherwise: E,
    ) -> QueryResult<Traversal>
    where
        C: FnOnce(Traversal) -> QueryResult<Traversal>,
        T: FnOnce(Traversal) -> QueryResult<Traversal>,
        E: FnOnce(Traversal) -> QueryResult<Traversal>,
    {
        let condition = self.continue_with(condition)?;
        let then = self.continue_with(then)?;
        let otherwise = self.continue_with(otherwise)?;
        let step = Step::ChooseTraversal {
            condition: condition.clone(),
            then: then.clone(),
            otherwise: Some(otherwise.clone()),
        };
        let shape = Shape::common([&then.shape, &otherwise.shape]);
        self.embed(step, shape, &[&condition, &then, &otherwise])
    }

    /// `choose(p, then)` where `expr` must test the current value itself.
    pub fn choose_where<T>(&self, expr: &Expr, then: T) -> QueryResult<Traversal>
    where
        T: FnOnce(Traversal) -> QueryResult<Traversal>,
    {
        let predicate = self.value_predicate(expr)?;
        let then = self.continue_with(then)?;
        let step = Step::ChoosePredicate {
            predicate,
            then: then.clone(),
            otherwise: None,
        };
        self.embed(step, Shape::common([&self.shape, &then.shape]), &[&then])
    }

    pub fn choose_where_else<T, E>(
        &self,
        expr: &Expr,
        then: T,
        otherwise: E,
    ) -> QueryResult<Traversal>
    where
        T: FnOnce(Traversal) -> QueryResult<Traversal>,
        E: FnOnce(Traversal) -> QueryResult<Traversal>,
    {
        let predicate = self.value_predicate(expr)?;
        let then = self.continue_with(then)?;
        let otherwise = self.continue_with(otherwise)?;
        let step = Step::ChoosePredicate {
            predicate,
            then: then.clone(),
            otherwise: Some(otherwise.clone()),
        };
        let shape = Shape::common([&then.shape, &otherwise.shape]);
        self.embed(step, shape, &[&then, &otherwise])
    }

    fn value_predicate(&self, expr: &Expr) -> QueryResult<P> {
        let predicate = PredicateCompiler::new(&self.env, &self.shape)
            .compile(expr)?
            .normalize();
        match predicate {
            Predicate::Terminal {
                key: TerminalKey::Value,
                p,
            } => Ok(p),
            _ => Err(QueryError::unsupported(expr)),
        }
    }

    pub fn coalesce<I, F>(&self, branches: I) -> QueryResult<Traversal>
    where
        I: IntoIterator<Item = F>,
        F: FnOnce(Traversal) -> QueryResult<Traversal>,
    {
        let branches = self.continue_all(branches)?;
        let shape = Shape::common(branches.iter().map(|b| &b.shape));
        let embedded: Vec<&Traversal> = branches.iter().collect();
        self.embed(Step::Coalesce(branches.clone()), shape, &embedded)
    }

    pub fn union<I, F>(&self, branches: I) -> QueryResult<Traversal>
    where
        I: IntoIterator<Item = F>,
        F: FnOnce(Traversal) -> QueryResult<Traversal>,
    {
        let branches = self.continue_all(branches)?;
        let shape = Shape::common(branches.iter().map(|b| &b.shape));
        let embedded: Vec<&Traversal> = branches.iter().collect();
        self.embed(Step::Union(branches.clone()), shape, &embedded)
    }

    pub fn optional<F>(&self, optional: F) -> QueryResult<Traversal>
    where
        F: FnOnce(Traversal) -> QueryResult<Traversal>,
    {
        let optional = self.continue_with(optional)?;
        let shape = Shape::common([&self.shape, &optional.shape]);
        self.embed(Step::Optional(optional.clone()), shape, &[&optional])
    }

    pub fn local<F>(&self, local: F) -> QueryResult<Traversal>
    where
        F: FnOnce(Traversal) -> QueryResult<Traversal>,
    {
        let local = self.continue_with(local)?;
        self.embed(Step::Local(local.clone()), local.shape.clone(), &[&local])
    }

    pub fn map<F>(&self, mapping: F) -> QueryResult<Traversal>
    where
        F: FnOnce(Traversal) -> QueryResult<Traversal>,
    {
        let mapping = self.continue_with(mapping)?;
        self.embed(Step::Map(mapping.clone()), mapping.shape.clone(), &[&mapping])
    }

    pub fn flat_map<F>(&self, mapping: F) -> QueryResult<Traversal>
    where
        F: FnOnce(Traversal) -> QueryResult<Traversal>,
    {
        let mapping = self.continue_with(mapping)?;
        self.embed(Step::FlatMap(mapping.clone()), mapping.shape.clone(), &[&mapping])
    }

    pub fn side_effect<F>(&self, effect: F) -> QueryResult<Traversal>
    where
        F: FnOnce(Traversal) -> QueryResult<Traversal>,
    {
        let effect = self.continue_with(effect)?;
        self.embed(Step::SideEffect(effect.clone()), self.shape.clone(), &[&effect])
    }

    pub fn repeat<F>(&self, repeat: F) -> QueryResult<Traversal>
    where
        F: FnOnce(Traversal) -> QueryResult<Traversal>,
    {
        let repeat = self.continue_with(repeat)?;
        let shape = Shape::common([&self.shape, &repeat.shape]);
        self.embed(Step::Repeat(repeat.clone()), shape, &[&repeat])
    }

    pub fn repeat_until<F, U>(&self, repeat: F, until: U) -> QueryResult<Traversal>
    where
        F: FnOnce(Traversal) -> QueryResult<Traversal>,
        U: FnOnce(Traversal) -> QueryResult<Traversal>,
    {
        let repeat = self.continue_with(repeat)?;
        let until = self.continue_with(until)?;
        let shape = Shape::common([&self.shape, &repeat.shape]);
        Ok(self
            .embed(Step::Repeat(repeat.clone()), shape, &[&repeat, &until])?
            .add_step(Step::Until(until)))
    }

    pub fn times(&self, count: u32) -> Traversal {
        self.add_step(Step::Times(count))
    }

    pub fn emit(&self) -> Traversal {
        self.add_step(Step::Emit)
    }

    pub fn match_<I, F>(&self, patterns: I) -> QueryResult<Traversal>
    where
        I: IntoIterator<Item = F>,
        F: FnOnce(Traversal) -> QueryResult<Traversal>,
    {
        let patterns = self.continue_all(patterns)?;
        let embedded: Vec<&Traversal> = patterns.iter().collect();
        self.embed(Step::Match(patterns.clone()), Shape::value(), &embedded)
    }

    // ========================================================================
    // Projection
    // ========================================================================

    pub fn fold(&self) -> Traversal {
        self.add_step_as(Step::Fold, Shape::array(self.shape.clone()))
    }

    pub fn unfold(&self) -> Traversal {
        let shape = self.shape.folded().cloned().unwrap_or_else(Shape::value);
        self.add_step_as(Step::Unfold, shape)
    }

    pub fn order_by(&self, field: &str, order: Order) -> Traversal {
        self.add_step(Step::Order)
            .add_step(Step::ByMember(self.identifier(field), order))
    }

    pub fn order_by_traversal<F>(&self, by: F, order: Order) -> QueryResult<Traversal>
    where
        F: FnOnce(Traversal) -> QueryResult<Traversal>,
    {
        let by = self.continue_with(by)?;
        self.add_step(Step::Order)
            .embed(Step::ByTraversal(by.clone(), Some(order)), self.shape.clone(), &[&by])
    }

    /// `project(k1, k2, ...).by(t1).by(t2)...`
    pub fn project<I, K, F>(&self, projections: I) -> QueryResult<Traversal>
    where
        I: IntoIterator<Item = (K, F)>,
        K: Into<String>,
        F: FnOnce(Traversal) -> QueryResult<Traversal>,
    {
        let mut keys = Vec::new();
        let mut bys = Vec::new();
        for (key, projection) in projections {
            keys.push(key.into());
            bys.push(self.continue_with(projection)?);
        }

        let next = self
            .clone()
            .merge_bindings(bys.iter())?
            .add_step_as(Step::Project(keys), Shape::value());
        Ok(bys
            .into_iter()
            .fold(next, |acc, by| acc.add_step(Step::ByTraversal(by, None))))
    }

    /// `group().by(key).by(value)`
    pub fn group<K, V>(&self, key_by: K, value_by: V) -> QueryResult<Traversal>
    where
        K: FnOnce(Traversal) -> QueryResult<Traversal>,
        V: FnOnce(Traversal) -> QueryResult<Traversal>,
    {
        let key_by = self.continue_with(key_by)?;
        let value_by = self.continue_with(value_by)?;
        Ok(self
            .clone()
            .merge_bindings([&key_by, &value_by])?
            .add_step_as(Step::Group, Shape::value())
            .add_step(Step::ByTraversal(key_by, None))
            .add_step(Step::ByTraversal(value_by, None)))
    }

    pub fn count(&self) -> Traversal {
        self.add_step_as(Step::Count, Shape::value())
    }

    pub fn sum(&self, scope: Scope) -> Traversal {
        self.add_step_as(Step::Sum(scope), Shape::value())
    }

    pub fn id(&self) -> Traversal {
        self.add_step_as(Step::Id, Shape::value())
    }

    pub fn label(&self) -> Traversal {
        self.add_step_as(Step::Label, Shape::value())
    }

    pub fn values(&self, fields: &[&str]) -> Traversal {
        let keys = fields.iter().map(|field| self.identifier(field)).collect();
        self.add_step_as(Step::Values(keys), Shape::value())
    }

    pub fn value_map(&self, fields: &[&str]) -> Traversal {
        let keys = fields
            .iter()
            .map(|field| self.identifier(field).to_string())
            .collect();
        self.add_step_as(Step::ValueMap(keys), Shape::value())
    }

    pub fn properties(&self, fields: &[&str]) -> QueryResult<Traversal> {
        let shape = match self.element_kind("properties")? {
            ElementKind::Vertex => Shape::vertex_property(None),
            ElementKind::Edge => Shape::property(),
        };
        let keys = fields.iter().map(|field| self.identifier(field)).collect();
        Ok(self.add_step_as(Step::Properties(keys), shape))
    }

    pub fn inject<V: Into<Value>>(&self, values: impl IntoIterator<Item = V>) -> Traversal {
        let values = values.into_iter().map(Into::into).collect();
        self.add_step_as(Step::Inject(values), Shape::value())
    }

    pub fn identity(&self) -> Traversal {
        self.add_step(Step::Identity)
    }

    pub fn barrier(&self) -> Traversal {
        self.add_step(Step::Barrier)
    }

    // ========================================================================
    // Boundary
    // ========================================================================

    pub fn encode<E: WireEncoder>(&self, encoder: &E) -> E::Output {
        encoder.encode(self)
    }

    pub fn to_groovy(&self) -> GroovyScript {
        self.encode(&GroovyEncoder)
    }

    /// Hand the traversal to the environment's executor once and deserialize
    /// every result into `T`. Sequence fields accept a single collapsed value.
    pub fn execute<T: DeserializeOwned>(&self) -> QueryResult<Vec<T>> {
        if self.anonymous {
            return Err(QueryError::AnonymousExecution);
        }

        let requested = self.shape.result_type();
        if self.env.options().log_queries {
            let script = self.to_groovy();
            tracing::debug!(
                steps = self.len(),
                requested = %requested,
                script = %script.script,
                "executing traversal"
            );
        } else {
            tracing::debug!(steps = self.len(), requested = %requested, "executing traversal");
        }

        let results = self.env.executor().execute(self, &requested)?;
        let deserializer = self.env.deserializer();
        results
            .map(|raw| {
                let value = deserializer.deserialize(&raw?, &requested, &self.env);
                from_collapsed(value).map_err(|source| QueryError::Deserialize {
                    requested: std::any::type_name::<T>().to_string(),
                    source,
                })
            })
            .collect()
    }
}

impl PartialEq for Traversal {
    fn eq(&self, other: &Self) -> bool {
        self.steps == other.steps && self.shape == other.shape
    }
}

impl fmt::Debug for Traversal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Traversal")
            .field("steps", &self.steps)
            .field("shape", &self.shape)
            .field("bindings", &self.bindings)
            .field("anonymous", &self.anonymous)
            .finish()
    }
}

fn endpoint(vertex: Option<TypeKey>) -> Shape {
    Shape::vertex(vertex.unwrap_or_else(|| TypeKey::new(graphstep_model::VERTEX)))
}

fn vertex_property_steps(key: Identifier, value: Value) -> Vec<Step> {
    match value {
        Value::Array(items) if key != Identifier::Id => items
            .into_iter()
            .filter(|item| !item.is_null())
            .map(|item| Step::Property {
                cardinality: Some(Cardinality::List),
                key: key.clone(),
                value: item,
            })
            .collect(),
        value => vec![Step::Property {
            cardinality: None,
            key,
            value,
        }],
    }
}

/// `property(...)` steps for a serialized element; `null` fields are skipped
/// and the label is carried by the `addV`/`addE` step itself.
pub(crate) fn property_steps<T: Serialize>(
    env: &QueryEnvironment,
    kind: ElementKind,
    ty: &TypeKey,
    element: &T,
) -> QueryResult<Vec<Step>> {
    let serialized = serde_json::to_value(element).map_err(|source| QueryError::Serialize {
        ty: ty.to_string(),
        source,
    })?;
    let Value::Object(fields) = serialized else {
        return Err(QueryError::Serialize {
            ty: ty.to_string(),
            source: serde::ser::Error::custom("elements must serialize to a map of properties"),
        });
    };

    let mut steps = Vec::new();
    for (name, value) in fields {
        if value.is_null() {
            continue;
        }
        let key = env.model().identifier(kind, ty.as_str(), &name);
        if key == Identifier::Label {
            continue;
        }
        match kind {
            ElementKind::Vertex => steps.extend(vertex_property_steps(key, value)),
            ElementKind::Edge => steps.push(Step::Property {
                cardinality: None,
                key,
                value,
            }),
        }
    }
    Ok(steps)
}
