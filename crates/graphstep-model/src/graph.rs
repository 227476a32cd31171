//! Vertex + edge element models over one shared type graph.

use std::sync::Arc;

use crate::element::{ElementModel, ElementModelBuilder, Identifier};
use crate::types::{TypeGraph, TypeKey, EDGE, VERTEX};
use crate::ModelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Vertex,
    Edge,
}

#[derive(Debug, Clone)]
pub struct GraphModel {
    types: Arc<TypeGraph>,
    vertices: Arc<ElementModel>,
    edges: Arc<ElementModel>,
}

impl GraphModel {
    pub fn builder(types: TypeGraph) -> GraphModelBuilder {
        let types = Arc::new(types);
        GraphModelBuilder {
            vertices: ElementModel::builder(types.clone(), VERTEX),
            edges: ElementModel::builder(types.clone(), EDGE),
            types,
        }
    }

    /// No registered element types; every label filter falls back to type names.
    pub fn empty() -> Self {
        let types = Arc::new(TypeGraph::element_roots());
        Self {
            vertices: Arc::new(ElementModel::empty(types.clone(), VERTEX)),
            edges: Arc::new(ElementModel::empty(types.clone(), EDGE)),
            types,
        }
    }

    pub fn types(&self) -> &Arc<TypeGraph> {
        &self.types
    }

    pub fn vertices(&self) -> &ElementModel {
        &self.vertices
    }

    pub fn edges(&self) -> &ElementModel {
        &self.edges
    }

    pub fn elements(&self, kind: ElementKind) -> &ElementModel {
        match kind {
            ElementKind::Vertex => &self.vertices,
            ElementKind::Edge => &self.edges,
        }
    }

    /// Which element model `ty` belongs to, if any.
    pub fn kind_of(&self, ty: &str) -> Option<ElementKind> {
        if self.vertices.covers(ty) {
            Some(ElementKind::Vertex)
        } else if self.edges.covers(ty) {
            Some(ElementKind::Edge)
        } else {
            None
        }
    }

    pub fn identifier(&self, kind: ElementKind, ty: &str, property: &str) -> Identifier {
        self.elements(kind).identifier(ty, property)
    }

    pub fn filter_labels(&self, kind: ElementKind, ty: &TypeKey) -> Vec<String> {
        self.elements(kind).filter_labels(ty)
    }

    pub fn configure_labels(&self, transform: impl Fn(&TypeKey, &str) -> String) -> Self {
        Self {
            types: self.types.clone(),
            vertices: Arc::new(self.vertices.configure_labels(&transform)),
            edges: Arc::new(self.edges.configure_labels(&transform)),
        }
    }

    /// Rewrite property identifiers in both element models.
    pub fn configure_properties(
        &self,
        transform: impl Fn(&TypeKey, &str, &Identifier) -> Identifier,
    ) -> Self {
        Self {
            types: self.types.clone(),
            vertices: Arc::new(self.vertices.configure_properties(&transform)),
            edges: Arc::new(self.edges.configure_properties(&transform)),
        }
    }

    pub fn with_lower_case_labels(&self) -> Self {
        Self {
            types: self.types.clone(),
            vertices: Arc::new(self.vertices.with_lower_case_labels()),
            edges: Arc::new(self.edges.with_lower_case_labels()),
        }
    }

    pub fn with_camel_case_labels(&self) -> Self {
        Self {
            types: self.types.clone(),
            vertices: Arc::new(self.vertices.with_camel_case_labels()),
            edges: Arc::new(self.edges.with_camel_case_labels()),
        }
    }
}

impl Default for GraphModel {
    fn default() -> Self {
        Self::empty()
    }
}

pub struct GraphModelBuilder {
    types: Arc<TypeGraph>,
    vertices: ElementModelBuilder,
    edges: ElementModelBuilder,
}

impl GraphModelBuilder {
    pub fn vertex<I, K>(
        mut self,
        ty: impl Into<TypeKey>,
        label: impl Into<String>,
        properties: I,
    ) -> Self
    where
        I: IntoIterator<Item = (K, Identifier)>,
        K: Into<String>,
    {
        self.vertices = self.vertices.register(ty, label, properties);
        self
    }

    pub fn vertex_type(mut self, ty: impl Into<TypeKey>) -> Self {
        self.vertices = self.vertices.register_type(ty);
        self
    }

    pub fn edge<I, K>(
        mut self,
        ty: impl Into<TypeKey>,
        label: impl Into<String>,
        properties: I,
    ) -> Self
    where
        I: IntoIterator<Item = (K, Identifier)>,
        K: Into<String>,
    {
        self.edges = self.edges.register(ty, label, properties);
        self
    }

    pub fn edge_type(mut self, ty: impl Into<TypeKey>) -> Self {
        self.edges = self.edges.register_type(ty);
        self
    }

    pub fn build(self) -> Result<GraphModel, ModelError> {
        Ok(GraphModel {
            vertices: Arc::new(self.vertices.build()?),
            edges: Arc::new(self.edges.build()?),
            types: self.types,
        })
    }
}
