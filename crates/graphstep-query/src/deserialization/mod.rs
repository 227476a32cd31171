//! Type-directed result deserialization.
//!
//! Raw results arrive as JSON fragments. A classifier assigns each fragment an
//! observed type in a [`TypeGraph`]; the most specific handler registered for
//! that type (or, failing that, for one of its interfaces, inherited ones
//! included, then its nearest ancestor) rewrites the fragment. Handlers
//! recurse into children through the deserializer they are handed, so
//! overrides apply at every depth.
//!
//! Registrations are chained: overriding a shape keeps the previous handler
//! reachable through [`Prior::invoke`]. Resolution results are memoized per
//! `(declared, observed)` pair for the lifetime of the deserializer instance.
//!
//! A dispatch miss is not an error: the fragment passes through unchanged.

mod collapsed;
mod graphson;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use graphstep_model::{TypeGraph, TypeKey};
use serde_json::Value;

use crate::environment::QueryEnvironment;

pub use collapsed::from_collapsed;
pub use graphson::{
    GRAPHSON_TYPED, JSON, JSON_ARRAY, JSON_BOOL, JSON_CONTAINER, JSON_NULL, JSON_NUMBER,
    JSON_OBJECT, JSON_SCALAR, JSON_STRING,
};

/// What a handler made of a fragment.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Value(Value),
    /// Leave the fragment as it is.
    PassThrough,
}

type Handler = Box<
    dyn Fn(&Value, &TypeKey, &QueryEnvironment, &Prior<'_>, &FragmentDeserializer) -> Outcome
        + Send
        + Sync,
>;

type Classifier = Arc<dyn Fn(&Value) -> TypeKey + Send + Sync>;

// ============================================================================
// Handler chain
// ============================================================================

/// One registration for a shape, linked to the registration it replaced.
pub struct HandlerNode {
    shape: TypeKey,
    handler: Handler,
    prior: Option<Arc<HandlerNode>>,
}

impl HandlerNode {
    pub fn shape(&self) -> &TypeKey {
        &self.shape
    }

    pub fn prior(&self) -> Option<&Arc<HandlerNode>> {
        self.prior.as_ref()
    }

    fn invoke(
        &self,
        fragment: &Value,
        requested: &TypeKey,
        env: &QueryEnvironment,
        recurse: &FragmentDeserializer,
    ) -> Value {
        let prior = Prior {
            node: self.prior.as_deref(),
            requested,
            env,
            recurse,
        };
        match (self.handler)(fragment, requested, env, &prior, recurse) {
            Outcome::Value(value) => value,
            Outcome::PassThrough => fragment.clone(),
        }
    }
}

impl fmt::Debug for HandlerNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerNode")
            .field("shape", &self.shape)
            .field("prior", &self.prior)
            .finish_non_exhaustive()
    }
}

/// The registration a handler overrode, bound to the current call.
pub struct Prior<'a> {
    node: Option<&'a HandlerNode>,
    requested: &'a TypeKey,
    env: &'a QueryEnvironment,
    recurse: &'a FragmentDeserializer,
}

impl Prior<'_> {
    pub fn exists(&self) -> bool {
        self.node.is_some()
    }

    /// Run the overridden handler on `fragment`. Without one, the fragment is
    /// returned as is.
    pub fn invoke(&self, fragment: &Value) -> Value {
        match self.node {
            Some(node) => node.invoke(fragment, self.requested, self.env, self.recurse),
            None => fragment.clone(),
        }
    }
}

// ============================================================================
// FragmentDeserializer
// ============================================================================

pub struct FragmentDeserializer {
    types: Arc<TypeGraph>,
    root: TypeKey,
    classifier: Classifier,
    registry: Arc<HashMap<TypeKey, Arc<HandlerNode>>>,
    memo: DashMap<(TypeKey, TypeKey), Option<Arc<HandlerNode>>>,
}

impl FragmentDeserializer {
    /// A deserializer without handlers over `types`. `classifier` assigns
    /// every fragment its observed type; `root` is the declared type used by
    /// [`deserialize`](Self::deserialize).
    pub fn new(
        types: TypeGraph,
        root: impl Into<TypeKey>,
        classifier: impl Fn(&Value) -> TypeKey + Send + Sync + 'static,
    ) -> Self {
        Self {
            types: Arc::new(types),
            root: root.into(),
            classifier: Arc::new(classifier),
            registry: Arc::new(HashMap::new()),
            memo: DashMap::new(),
        }
    }

    /// Returns every fragment unchanged.
    pub fn identity() -> Self {
        Self::new(TypeGraph::default(), JSON, |_| TypeKey::new(JSON))
    }

    /// GraphSON-aware handler set over the builtin JSON/GraphSON type graph.
    pub fn graphson() -> Self {
        graphson::deserializer()
    }

    pub fn types(&self) -> &TypeGraph {
        &self.types
    }

    pub fn root(&self) -> &TypeKey {
        &self.root
    }

    pub fn classify(&self, fragment: &Value) -> TypeKey {
        (self.classifier)(fragment)
    }

    /// A new deserializer where `handler` handles `shape`. An existing
    /// registration for `shape` stays reachable through [`Prior::invoke`].
    pub fn override_with<F>(&self, shape: impl Into<TypeKey>, handler: F) -> Self
    where
        F: Fn(&Value, &TypeKey, &QueryEnvironment, &Prior<'_>, &FragmentDeserializer) -> Outcome
            + Send
            + Sync
            + 'static,
    {
        let shape = shape.into();
        let mut registry = (*self.registry).clone();
        let node = HandlerNode {
            shape: shape.clone(),
            handler: Box::new(handler),
            prior: registry.get(&shape).cloned(),
        };
        registry.insert(shape, Arc::new(node));
        self.with_registry(registry)
    }

    /// A new deserializer with every registration for `shape` removed.
    pub fn without(&self, shape: &str) -> Self {
        let mut registry = (*self.registry).clone();
        registry.remove(shape);
        self.with_registry(registry)
    }

    fn with_registry(&self, registry: HashMap<TypeKey, Arc<HandlerNode>>) -> Self {
        Self {
            types: self.types.clone(),
            root: self.root.clone(),
            classifier: self.classifier.clone(),
            registry: Arc::new(registry),
            memo: DashMap::new(),
        }
    }

    /// Most specific registration for `observed`: exact match, then every
    /// implemented interface (own before inherited), then the ancestors.
    pub fn resolve(&self, declared: &TypeKey, observed: &TypeKey) -> Option<Arc<HandlerNode>> {
        let key = (declared.clone(), observed.clone());
        if let Some(hit) = self.memo.get(&key) {
            return hit.value().clone();
        }

        let resolved = self.search(observed);
        tracing::trace!(
            declared = %declared,
            observed = %observed,
            handler = resolved.as_ref().map(|node| node.shape().as_str()),
            "resolved deserialization handler"
        );
        self.memo.entry(key).or_insert(resolved).value().clone()
    }

    fn search(&self, observed: &TypeKey) -> Option<Arc<HandlerNode>> {
        if let Some(node) = self.registry.get(observed) {
            return Some(node.clone());
        }
        self.types
            .all_interfaces(observed.as_str())
            .iter()
            .find_map(|interface| self.registry.get(interface).cloned())
            .or_else(|| {
                let mut ancestor = self.types.parent(observed.as_str());
                while let Some(ty) = ancestor {
                    if let Some(node) = self.registry.get(ty) {
                        return Some(node.clone());
                    }
                    ancestor = self.types.parent(ty.as_str());
                }
                None
            })
    }

    /// Number of memoized resolutions.
    pub fn cached_resolutions(&self) -> usize {
        self.memo.len()
    }

    pub fn deserialize(
        &self,
        fragment: &Value,
        requested: &TypeKey,
        env: &QueryEnvironment,
    ) -> Value {
        self.deserialize_as(&self.root, fragment, requested, env)
    }

    pub fn deserialize_as(
        &self,
        declared: &TypeKey,
        fragment: &Value,
        requested: &TypeKey,
        env: &QueryEnvironment,
    ) -> Value {
        let observed = self.classify(fragment);
        match self.resolve(declared, &observed) {
            Some(node) => node.invoke(fragment, requested, env, self),
            None => fragment.clone(),
        }
    }
}

// The memo belongs to one registry; clones start with an empty one.
impl Clone for FragmentDeserializer {
    fn clone(&self) -> Self {
        self.with_registry((*self.registry).clone())
    }
}

impl fmt::Debug for FragmentDeserializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut shapes: Vec<&str> = self.registry.keys().map(TypeKey::as_str).collect();
        shapes.sort_unstable();
        f.debug_struct("FragmentDeserializer")
            .field("root", &self.root)
            .field("shapes", &shapes)
            .field("cached_resolutions", &self.memo.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn env() -> Arc<QueryEnvironment> {
        QueryEnvironment::builder()
            .deserializer(FragmentDeserializer::identity())
            .build()
    }

    #[test]
    fn test_identity_passes_everything_through() {
        let env = env();
        let deserializer = FragmentDeserializer::identity();
        let fragment = json!({"@type": "g:Int32", "@value": 1});
        assert_eq!(
            deserializer.deserialize(&fragment, &TypeKey::new("i32"), &env),
            fragment
        );
    }

    #[test]
    fn test_resolution_is_memoized_per_pair() {
        let deserializer = FragmentDeserializer::graphson()
            .override_with(JSON_ARRAY, |_, _, _, _, _| Outcome::Value(json!("array")));
        let declared = TypeKey::new(JSON);
        let observed = TypeKey::new(JSON_ARRAY);

        let first = deserializer.resolve(&declared, &observed).unwrap();
        let second = deserializer.resolve(&declared, &observed).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(deserializer.cached_resolutions(), 1);

        assert!(deserializer
            .resolve(&TypeKey::new(JSON_OBJECT), &observed)
            .is_some());
        assert_eq!(deserializer.cached_resolutions(), 2);
    }

    #[test]
    fn test_override_keeps_prior_and_starts_fresh_memo() {
        let base = FragmentDeserializer::graphson();
        let declared = TypeKey::new(JSON);
        base.resolve(&declared, &TypeKey::new(JSON_ARRAY));
        assert_eq!(base.cached_resolutions(), 1);

        let overridden = base.override_with(JSON_ARRAY, |_, _, _, _, _| {
            Outcome::Value(json!("array"))
        });
        assert_eq!(overridden.cached_resolutions(), 0);
        let node = overridden
            .resolve(&declared, &TypeKey::new(JSON_ARRAY))
            .unwrap();
        assert!(node.prior().is_some());
        assert_eq!(node.shape().as_str(), JSON_ARRAY);
    }

    #[test]
    fn test_unknown_observed_type_is_a_miss() {
        let deserializer = FragmentDeserializer::graphson();
        assert!(deserializer
            .resolve(&TypeKey::new(JSON), &TypeKey::new("nowhere"))
            .is_none());
    }
}
