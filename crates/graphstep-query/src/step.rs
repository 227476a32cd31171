//! Gremlin step vocabulary and the persistent step list.

use std::sync::{Arc, OnceLock};

use graphstep_model::Identifier;
use serde_json::Value;

use crate::label::StepLabel;
use crate::predicate::P;
use crate::traversal::Traversal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Order {
    Increasing,
    Decreasing,
    Shuffle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Global,
    Local,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    Single,
    List,
    Set,
}

/// One traversal step. Steps that embed sub-traversals make the step list a
/// tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Traversal source name (`g`).
    Identifier(String),
    V(Vec<Value>),
    E(Vec<Value>),
    AddV(String),
    AddE(String),
    Property {
        cardinality: Option<Cardinality>,
        key: Identifier,
        value: Value,
    },

    // ------------------------------------------------------------------------
    // Filters
    // ------------------------------------------------------------------------
    Has(Identifier, P),
    HasTraversal(Identifier, Traversal),
    HasNot(Identifier),
    HasLabel(Vec<String>),
    HasValue(P),
    Is(P),
    WherePredicate(P),
    WhereTraversal(Traversal),
    And(Vec<Traversal>),
    Or(Vec<Traversal>),
    Not(Traversal),
    Dedup,
    Limit(u64),
    Range(u64, u64),
    Skip(u64),
    Tail(u64),

    // ------------------------------------------------------------------------
    // Branching
    // ------------------------------------------------------------------------
    ChoosePredicate {
        predicate: P,
        then: Traversal,
        otherwise: Option<Traversal>,
    },
    ChooseTraversal {
        condition: Traversal,
        then: Traversal,
        otherwise: Option<Traversal>,
    },
    Coalesce(Vec<Traversal>),
    Union(Vec<Traversal>),
    Optional(Traversal),
    Local(Traversal),
    Map(Traversal),
    FlatMap(Traversal),
    SideEffect(Traversal),
    Repeat(Traversal),
    Until(Traversal),
    Times(u32),
    Emit,
    Match(Vec<Traversal>),

    // ------------------------------------------------------------------------
    // Projection
    // ------------------------------------------------------------------------
    Fold,
    Unfold,
    Order,
    ByMember(Identifier, Order),
    ByTraversal(Traversal, Option<Order>),
    Project(Vec<String>),
    Group,
    As(Vec<StepLabel>),
    Select(Vec<StepLabel>),
    Aggregate(StepLabel),
    Count,
    Sum(Scope),
    Id,
    Label,
    Values(Vec<Identifier>),
    ValueMap(Vec<String>),
    Properties(Vec<Identifier>),
    Inject(Vec<Value>),
    Identity,
    Barrier,
    Drop,

    // ------------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------------
    Out(Vec<String>),
    In(Vec<String>),
    Both(Vec<String>),
    OutE(Vec<String>),
    InE(Vec<String>),
    BothE(Vec<String>),
    OutV,
    InV,
    OtherV,
    FromLabel(StepLabel),
    FromTraversal(Traversal),
    ToLabel(StepLabel),
    ToTraversal(Traversal),
}

impl Step {
    /// Shared `limit(1)` instance.
    pub fn limit_one() -> Arc<Step> {
        static LIMIT_ONE: OnceLock<Arc<Step>> = OnceLock::new();
        LIMIT_ONE.get_or_init(|| Arc::new(Step::Limit(1))).clone()
    }
}

// ============================================================================
// StepList
// ============================================================================

struct StepNode {
    step: Arc<Step>,
    prev: Option<Arc<StepNode>>,
}

/// Append-only persistent list of steps.
///
/// `push` shares the whole existing list with the result, so keeping an older
/// traversal around costs nothing and the older traversal never observes the
/// new step.
#[derive(Clone, Default)]
pub struct StepList {
    head: Option<Arc<StepNode>>,
    len: usize,
}

impl StepList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, step: Step) -> Self {
        self.push_shared(Arc::new(step))
    }

    pub fn push_shared(&self, step: Arc<Step>) -> Self {
        Self {
            head: Some(Arc::new(StepNode {
                step,
                prev: self.head.clone(),
            })),
            len: self.len + 1,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn last(&self) -> Option<&Arc<Step>> {
        self.head.as_ref().map(|node| &node.step)
    }

    pub fn first(&self) -> Option<&Step> {
        self.shared().into_iter().next().map(|step| &**step)
    }

    /// Steps in insertion order, as the shared instances stored in the list.
    pub fn shared(&self) -> Vec<&Arc<Step>> {
        let mut steps = Vec::with_capacity(self.len);
        let mut cursor = self.head.as_deref();
        while let Some(node) = cursor {
            steps.push(&node.step);
            cursor = node.prev.as_deref();
        }
        steps.reverse();
        steps
    }

    /// Steps in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Step> {
        self.shared().into_iter().map(|step| &**step)
    }
}

impl PartialEq for StepList {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.iter().eq(other.iter())
    }
}

impl std::fmt::Debug for StepList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

// Unlink iteratively so very long lists do not recurse on drop.
impl Drop for StepList {
    fn drop(&mut self) {
        let mut next = self.head.take();
        while let Some(node) = next {
            match Arc::try_unwrap(node) {
                Ok(mut node) => next = node.prev.take(),
                Err(_) => break,
            }
        }
    }
}
