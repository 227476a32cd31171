//! Result-shape descriptor carried by every [`Traversal`](crate::Traversal).
//!
//! The shape records what the traversal currently emits (plain values,
//! vertices, edges, properties, folded arrays) and, for elements, which model
//! type they are known to have. Combinators consult it to reject invalid
//! transitions and to resolve property identifiers.

use std::fmt;
use std::sync::Arc;

use graphstep_model::{ElementKind, TypeKey, EDGE, VERTEX};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Value,
    Vertex,
    Edge,
    VertexProperty,
    Property,
    Array,
}

impl ShapeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ShapeKind::Value => "Value",
            ShapeKind::Vertex => "Vertex",
            ShapeKind::Edge => "Edge",
            ShapeKind::VertexProperty => "VertexProperty",
            ShapeKind::Property => "Property",
            ShapeKind::Array => "Array",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shape {
    kind: ShapeKind,
    element: Option<TypeKey>,
    out_vertex: Option<TypeKey>,
    in_vertex: Option<TypeKey>,
    meta: Option<TypeKey>,
    folded: Option<Arc<Shape>>,
}

impl Shape {
    fn of_kind(kind: ShapeKind, element: Option<TypeKey>) -> Self {
        Self {
            kind,
            element,
            out_vertex: None,
            in_vertex: None,
            meta: None,
            folded: None,
        }
    }

    /// Untyped scalar/opaque values.
    pub fn value() -> Self {
        Self::of_kind(ShapeKind::Value, None)
    }

    pub fn value_of(ty: impl Into<TypeKey>) -> Self {
        Self::of_kind(ShapeKind::Value, Some(ty.into()))
    }

    pub fn vertex(ty: impl Into<TypeKey>) -> Self {
        Self::of_kind(ShapeKind::Vertex, Some(ty.into()))
    }

    pub fn edge(ty: impl Into<TypeKey>) -> Self {
        Self::of_kind(ShapeKind::Edge, Some(ty.into()))
    }

    pub fn edge_between(
        ty: impl Into<TypeKey>,
        out_vertex: Option<TypeKey>,
        in_vertex: Option<TypeKey>,
    ) -> Self {
        Self {
            out_vertex,
            in_vertex,
            ..Self::edge(ty)
        }
    }

    pub fn vertex_property(meta: Option<TypeKey>) -> Self {
        Self {
            meta,
            ..Self::of_kind(ShapeKind::VertexProperty, None)
        }
    }

    pub fn property() -> Self {
        Self::of_kind(ShapeKind::Property, None)
    }

    /// The shape produced by `fold()` over `folded`.
    pub fn array(folded: Shape) -> Self {
        Self {
            folded: Some(Arc::new(folded)),
            ..Self::of_kind(ShapeKind::Array, None)
        }
    }

    pub fn kind(&self) -> ShapeKind {
        self.kind
    }

    pub fn element(&self) -> Option<&TypeKey> {
        self.element.as_ref()
    }

    pub fn out_vertex(&self) -> Option<&TypeKey> {
        self.out_vertex.as_ref()
    }

    pub fn in_vertex(&self) -> Option<&TypeKey> {
        self.in_vertex.as_ref()
    }

    pub fn meta(&self) -> Option<&TypeKey> {
        self.meta.as_ref()
    }

    pub fn folded(&self) -> Option<&Shape> {
        self.folded.as_deref()
    }

    /// Vertex or edge shapes map onto a model; everything else does not.
    pub fn element_kind(&self) -> Option<ElementKind> {
        match self.kind {
            ShapeKind::Vertex => Some(ElementKind::Vertex),
            ShapeKind::Edge => Some(ElementKind::Edge),
            _ => None,
        }
    }

    /// Element type, defaulting to the model root for untyped elements.
    pub fn element_type(&self) -> Option<TypeKey> {
        match (self.element_kind(), &self.element) {
            (Some(_), Some(ty)) => Some(ty.clone()),
            (Some(ElementKind::Vertex), None) => Some(TypeKey::new(VERTEX)),
            (Some(ElementKind::Edge), None) => Some(TypeKey::new(EDGE)),
            (None, _) => None,
        }
    }

    /// Same kind and endpoints, new element type.
    pub fn cast(&self, ty: impl Into<TypeKey>) -> Self {
        Self {
            element: Some(ty.into()),
            ..self.clone()
        }
    }

    /// Logical result type handed to the executor and the deserializer.
    pub fn result_type(&self) -> TypeKey {
        match &self.element {
            Some(ty) => ty.clone(),
            None => TypeKey::new(self.kind.as_str()),
        }
    }

    /// Shape shared by all branches, or untyped values when they disagree.
    pub fn common<'a>(shapes: impl IntoIterator<Item = &'a Shape>) -> Shape {
        let mut shapes = shapes.into_iter();
        let Some(first) = shapes.next() else {
            return Shape::value();
        };
        if shapes.all(|shape| shape == first) {
            first.clone()
        } else {
            Shape::value()
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind.as_str())?;
        match (&self.element, self.folded.as_deref()) {
            (Some(ty), _) => write!(f, "<{ty}>"),
            (None, Some(folded)) => write!(f, "<{folded}>"),
            (None, None) => Ok(()),
        }
    }
}
