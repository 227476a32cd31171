//! graphstep model: what the graph looks like to the query builder.
//!
//! - [`types`]: explicit type-capability graph (parents, interfaces, closure)
//! - [`element`]: per-type label and property wire identifiers
//! - [`labels`]: memoized label derivation for type filters
//! - [`graph`]: vertex and edge models sharing one type graph
//!
//! Everything here is immutable after construction and `Send + Sync`; the
//! only interior mutability is the label-derivation memo owned by each
//! [`ElementModel`].

pub mod casing;
pub mod element;
pub mod graph;
pub mod labels;
pub mod types;

use thiserror::Error;

pub use element::{ElementMetadata, ElementModel, ElementModelBuilder, Identifier};
pub use graph::{ElementKind, GraphModel, GraphModelBuilder};
pub use labels::LabelFilter;
pub use types::{TypeDecl, TypeGraph, TypeGraphBuilder, TypeInfo, TypeKey, TypeKind, EDGE, VERTEX};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("type `{ty}` is not declared")]
    UnknownType { ty: String },
    #[error("type `{ty}` is declared more than once")]
    DuplicateType { ty: String },
    #[error("type `{ty}` cannot extend `{parent}`: interfaces cannot be extended as classes")]
    ParentIsInterface { ty: String, parent: String },
    #[error("type `{ty}` cannot implement `{interface}`: not an interface")]
    NotAnInterface { ty: String, interface: String },
    #[error("type `{ty}` is not a subtype of the model root `{root}`")]
    NotUnderRoot { ty: String, root: String },
}
