//! Label derivation: the minimal label set that filters to a type's subtree.
//!
//! For a queried type `T`, the result is computed over the concrete
//! (non-abstract) types registered in one [`ElementModel`]:
//!
//! - the model root (`Vertex` / `Edge`) never needs a filter,
//! - no concrete type assignable to `T` → [`LabelFilter::Unmatched`],
//! - every concrete type assignable to `T` → [`LabelFilter::Unrestricted`]
//!   (emitting `hasLabel(...)` would be an always-true filter),
//! - otherwise the matching labels, sorted and deduplicated so generated
//!   queries are reproducible.
//!
//! Results are memoized per model instance. The cache lives inside the model,
//! so a transformed model (new labels) starts with an empty cache.

use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::DashMap;

use crate::element::ElementModel;
use crate::types::TypeKey;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelFilter {
    /// Every element of the model already satisfies the type; omit the filter.
    Unrestricted,
    /// Sorted, deduplicated labels of the concrete matching types.
    Labels(Arc<[String]>),
    /// No registered concrete type matches.
    Unmatched,
}

impl LabelFilter {
    pub fn labels(&self) -> Option<&[String]> {
        match self {
            LabelFilter::Labels(labels) => Some(labels),
            _ => None,
        }
    }
}

/// Compute-once, publish-once memo of derived label filters.
///
/// Two threads racing on the same missing key both compute; the first insert
/// wins and both observe equal values. No lock is held while computing.
#[derive(Debug, Default)]
pub(crate) struct LabelCache {
    entries: DashMap<TypeKey, LabelFilter>,
}

impl LabelCache {
    pub(crate) fn get_or_derive(
        &self,
        ty: &TypeKey,
        derive: impl FnOnce() -> LabelFilter,
    ) -> LabelFilter {
        if let Some(hit) = self.entries.get(ty) {
            return hit.value().clone();
        }

        let computed = derive();
        tracing::trace!(ty = %ty, filter = ?computed, "derived label filter");
        self.entries
            .entry(ty.clone())
            .or_insert(computed)
            .value()
            .clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

pub(crate) fn derive_label_filter(model: &ElementModel, ty: &TypeKey) -> LabelFilter {
    if ty == model.root() {
        return LabelFilter::Unrestricted;
    }

    let types = model.types();
    let mut concrete_total = 0usize;
    let mut matched = 0usize;
    let mut labels = BTreeSet::new();

    for (registered, metadata) in model.iter() {
        if types.is_abstract(registered.as_str()) {
            continue;
        }
        concrete_total += 1;
        if types.is_assignable(registered.as_str(), ty.as_str()) {
            matched += 1;
            labels.insert(metadata.label().to_string());
        }
    }

    if matched == 0 {
        LabelFilter::Unmatched
    } else if matched == concrete_total {
        LabelFilter::Unrestricted
    } else {
        LabelFilter::Labels(labels.into_iter().collect::<Vec<_>>().into())
    }
}
