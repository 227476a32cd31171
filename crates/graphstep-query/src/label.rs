//! Step labels and their logical-name bindings.
//!
//! A [`StepLabel`] is a process-local identity token: two labels are equal
//! only if one is a clone of the other. Tokens come from a global atomic
//! counter, in the same way database tokens are branded elsewhere.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::QueryError;
use crate::shape::Shape;

static NEXT_STEP_LABEL: AtomicU64 = AtomicU64::new(1);

/// Names an intermediate point of a traversal for later retrieval.
#[derive(Clone)]
pub struct StepLabel {
    id: u64,
    shape: Arc<Shape>,
}

impl StepLabel {
    /// A fresh label for values of `shape`.
    pub fn new(shape: Shape) -> Self {
        Self {
            id: NEXT_STEP_LABEL.fetch_add(1, Ordering::Relaxed),
            shape: Arc::new(shape),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Shape of the values the label was attached to; `select` yields it.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }
}

impl PartialEq for StepLabel {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for StepLabel {}

impl Hash for StepLabel {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for StepLabel {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StepLabel {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl fmt::Debug for StepLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StepLabel#{}({})", self.id, self.shape)
    }
}

impl fmt::Display for StepLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "label#{}", self.id)
    }
}

// ============================================================================
// Bindings
// ============================================================================

/// Persistent `StepLabel -> logical name` map.
///
/// Updates clone the underlying map; a traversal's bindings are never
/// modified in place, so older traversals keep seeing what they saw.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelBindings {
    entries: Arc<BTreeMap<StepLabel, String>>,
}

impl LabelBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `label` to `name`.
    ///
    /// Binding to the name it already has is a no-op; binding to a different
    /// name fails with [`QueryError::LabelRebindingConflict`].
    pub fn bind(&self, label: &StepLabel, name: impl Into<String>) -> Result<Self, QueryError> {
        let name = name.into();
        match self.entries.get(label) {
            Some(existing) if *existing == name => Ok(self.clone()),
            Some(existing) => Err(QueryError::LabelRebindingConflict {
                label: label.clone(),
                existing: existing.clone(),
                requested: name,
            }),
            None => {
                let mut entries = (*self.entries).clone();
                entries.insert(label.clone(), name);
                Ok(Self {
                    entries: Arc::new(entries),
                })
            }
        }
    }

    /// Apply every binding of `other` under the same conflict rule.
    pub fn merge(&self, other: &LabelBindings) -> Result<Self, QueryError> {
        if other.is_empty() || Arc::ptr_eq(&self.entries, &other.entries) {
            return Ok(self.clone());
        }
        other
            .iter()
            .try_fold(self.clone(), |acc, (label, name)| acc.bind(label, name))
    }

    pub fn get(&self, label: &StepLabel) -> Option<&str> {
        self.entries.get(label).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StepLabel, &str)> {
        self.entries.iter().map(|(label, name)| (label, name.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_compare_by_identity() {
        let a = StepLabel::new(Shape::value());
        let b = StepLabel::new(Shape::value());
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_merge_detects_conflicts_and_keeps_receiver() {
        let label = StepLabel::new(Shape::vertex("Person"));
        let left = LabelBindings::new().bind(&label, "x").unwrap();
        let right = LabelBindings::new().bind(&label, "y").unwrap();

        let err = left.merge(&right).unwrap_err();
        assert!(matches!(err, QueryError::LabelRebindingConflict { .. }));
        assert_eq!(left.get(&label), Some("x"));

        let same = LabelBindings::new().bind(&label, "x").unwrap();
        assert_eq!(left.merge(&same).unwrap(), left);
    }
}
