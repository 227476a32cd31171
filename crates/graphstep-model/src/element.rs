//! Graph Element Model: entity type → label + property wire identifiers.
//!
//! An [`ElementModel`] is configured once and never mutated. Transformations
//! (`with_lower_case_labels`, `configure_labels`, ...) are pure and return a
//! new model, which also means a fresh label-derivation cache.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::casing::to_camel_case;
use crate::labels::{derive_label_filter, LabelCache, LabelFilter};
use crate::types::{TypeGraph, TypeKey};
use crate::ModelError;

/// How a property is addressed on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Identifier {
    /// The element id token (`T.id`).
    Id,
    /// The element label token (`T.label`).
    Label,
    /// A plain property key.
    Key(String),
}

impl Identifier {
    pub fn key(name: impl Into<String>) -> Self {
        Identifier::Key(name.into())
    }

    pub fn as_key(&self) -> Option<&str> {
        match self {
            Identifier::Key(key) => Some(key),
            _ => None,
        }
    }

    /// Default identifier for a property that has no explicit mapping.
    pub fn for_property(name: &str) -> Self {
        match name {
            "id" => Identifier::Id,
            "label" => Identifier::Label,
            other => Identifier::Key(other.to_string()),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Id => f.write_str("T.id"),
            Identifier::Label => f.write_str("T.label"),
            Identifier::Key(key) => f.write_str(key),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementMetadata {
    label: String,
    properties: BTreeMap<String, Identifier>,
}

impl ElementMetadata {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, identifier: Identifier) -> Self {
        self.properties.insert(name.into(), identifier);
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn properties(&self) -> &BTreeMap<String, Identifier> {
        &self.properties
    }

    pub fn identifier(&self, property: &str) -> Option<&Identifier> {
        self.properties.get(property)
    }

    /// Reverse lookup: which property is stored under `wire_key`?
    pub fn property_for_key(&self, wire_key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(_, id)| id.as_key() == Some(wire_key))
            .map(|(name, _)| name.as_str())
    }
}

// ============================================================================
// ElementModel
// ============================================================================

#[derive(Debug)]
pub struct ElementModel {
    types: Arc<TypeGraph>,
    root: TypeKey,
    metadata: Arc<BTreeMap<TypeKey, ElementMetadata>>,
    labels: LabelCache,
}

impl ElementModel {
    pub fn builder(types: Arc<TypeGraph>, root: impl Into<TypeKey>) -> ElementModelBuilder {
        ElementModelBuilder {
            types,
            root: root.into(),
            registrations: Vec::new(),
        }
    }

    /// A model with no registered types.
    pub fn empty(types: Arc<TypeGraph>, root: impl Into<TypeKey>) -> Self {
        Self::from_parts(types, root.into(), BTreeMap::new())
    }

    fn from_parts(
        types: Arc<TypeGraph>,
        root: TypeKey,
        metadata: BTreeMap<TypeKey, ElementMetadata>,
    ) -> Self {
        Self {
            types,
            root,
            metadata: Arc::new(metadata),
            labels: LabelCache::default(),
        }
    }

    pub fn types(&self) -> &Arc<TypeGraph> {
        &self.types
    }

    pub fn root(&self) -> &TypeKey {
        &self.root
    }

    pub fn metadata(&self, ty: &str) -> Option<&ElementMetadata> {
        self.metadata.get(ty)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TypeKey, &ElementMetadata)> {
        self.metadata.iter()
    }

    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    /// `true` if `ty` belongs to this model's root (e.g. is a vertex type).
    pub fn covers(&self, ty: &str) -> bool {
        self.types.is_assignable(ty, self.root.as_str())
    }

    /// The label used for `ty`: its registered label, else the bare type name.
    pub fn label_of(&self, ty: &str) -> String {
        self.metadata(ty)
            .map(|meta| meta.label().to_string())
            .unwrap_or_else(|| ty.to_string())
    }

    /// First concrete registered type carrying `label`.
    pub fn type_for_label(&self, label: &str) -> Option<&TypeKey> {
        self.metadata
            .iter()
            .find(|(ty, meta)| meta.label() == label && !self.types.is_abstract(ty.as_str()))
            .map(|(ty, _)| ty)
    }

    /// Resolve a property of `ty` to its wire identifier.
    ///
    /// Explicit mapping on `ty`, then on its parent chain, then on its
    /// interfaces; otherwise [`Identifier::for_property`].
    pub fn identifier(&self, ty: &str, property: &str) -> Identifier {
        self.find_identifier(ty, property)
            .cloned()
            .unwrap_or_else(|| Identifier::for_property(property))
    }

    fn find_identifier(&self, ty: &str, property: &str) -> Option<&Identifier> {
        if let Some(id) = self.metadata(ty).and_then(|meta| meta.identifier(property)) {
            return Some(id);
        }
        if let Some(parent) = self.types.parent(ty) {
            if let Some(id) = self.find_identifier(parent.as_str(), property) {
                return Some(id);
            }
        }
        self.types
            .interfaces(ty)
            .iter()
            .find_map(|iface| self.find_identifier(iface.as_str(), property))
    }

    /// Memoized label derivation for `ty`.
    pub fn derive_labels(&self, ty: &TypeKey) -> LabelFilter {
        self.labels
            .get_or_derive(ty, || derive_label_filter(self, ty))
    }

    /// Labels to put into a `hasLabel` step for `ty`.
    ///
    /// Empty means "no filter needed". When no concrete type matches, the bare
    /// type name is used as the single label.
    pub fn filter_labels(&self, ty: &TypeKey) -> Vec<String> {
        match self.derive_labels(ty) {
            LabelFilter::Unrestricted => Vec::new(),
            LabelFilter::Labels(labels) => labels.to_vec(),
            LabelFilter::Unmatched => {
                // TODO: decide what abstract/unregistered types should filter on;
                // the bare type name is kept for compatibility with existing graphs.
                tracing::warn!(
                    ty = %ty,
                    "no registered concrete type matches; falling back to the type name as label"
                );
                vec![ty.to_string()]
            }
        }
    }

    pub fn cached_label_filters(&self) -> usize {
        self.labels.len()
    }

    // ========================================================================
    // Transformations (pure; each returns a new model)
    // ========================================================================

    pub fn configure_labels(&self, transform: impl Fn(&TypeKey, &str) -> String) -> Self {
        let metadata = self
            .metadata
            .iter()
            .map(|(ty, meta)| {
                let mut meta = meta.clone();
                meta.label = transform(ty, &meta.label);
                (ty.clone(), meta)
            })
            .collect();
        Self::from_parts(self.types.clone(), self.root.clone(), metadata)
    }

    pub fn with_lower_case_labels(&self) -> Self {
        self.configure_labels(|_, label| label.to_lowercase())
    }

    pub fn with_camel_case_labels(&self) -> Self {
        self.configure_labels(|_, label| to_camel_case(label))
    }

    pub fn configure_properties(
        &self,
        transform: impl Fn(&TypeKey, &str, &Identifier) -> Identifier,
    ) -> Self {
        let metadata = self
            .metadata
            .iter()
            .map(|(ty, meta)| {
                let mut meta = meta.clone();
                meta.properties = meta
                    .properties
                    .iter()
                    .map(|(name, id)| (name.clone(), transform(ty, name, id)))
                    .collect();
                (ty.clone(), meta)
            })
            .collect();
        Self::from_parts(self.types.clone(), self.root.clone(), metadata)
    }
}

pub struct ElementModelBuilder {
    types: Arc<TypeGraph>,
    root: TypeKey,
    registrations: Vec<(TypeKey, ElementMetadata)>,
}

impl ElementModelBuilder {
    /// Register `ty` with an explicit label and property map.
    pub fn register<I, K>(
        mut self,
        ty: impl Into<TypeKey>,
        label: impl Into<String>,
        properties: I,
    ) -> Self
    where
        I: IntoIterator<Item = (K, Identifier)>,
        K: Into<String>,
    {
        let mut metadata = ElementMetadata::new(label);
        for (name, id) in properties {
            metadata = metadata.with_property(name, id);
        }
        self.registrations.push((ty.into(), metadata));
        self
    }

    /// Register `ty` using its type name as label and default identifiers.
    pub fn register_type(mut self, ty: impl Into<TypeKey>) -> Self {
        let ty = ty.into();
        let metadata = ElementMetadata::new(ty.as_str());
        self.registrations.push((ty, metadata));
        self
    }

    pub fn build(self) -> Result<ElementModel, ModelError> {
        let mut metadata = BTreeMap::new();
        for (ty, meta) in self.registrations {
            if !self.types.contains(ty.as_str()) {
                return Err(ModelError::UnknownType { ty: ty.to_string() });
            }
            if !self.types.is_assignable(ty.as_str(), self.root.as_str()) {
                return Err(ModelError::NotUnderRoot {
                    ty: ty.to_string(),
                    root: self.root.to_string(),
                });
            }
            if metadata.insert(ty.clone(), meta).is_some() {
                return Err(ModelError::DuplicateType { ty: ty.to_string() });
            }
        }
        Ok(ElementModel::from_parts(self.types, self.root, metadata))
    }
}
