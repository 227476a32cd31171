//! Type-capability graph.
//!
//! Traversal construction and result deserialization both need to answer
//! "is `A` usable where `B` is expected?" and "which capabilities does `A`
//! expose, in which order?". Rust has no runtime reflection over user types,
//! so the hierarchy is declared explicitly, once, at model-configuration time:
//!
//! - every type has an optional parent class and a list of implemented
//!   interfaces (kept in declaration order, which matters for dispatch),
//! - the reflexive supertype closure is precomputed at build time, so
//!   assignability checks are a single hash lookup.
//!
//! Declarations must reference already-declared types. That keeps the graph
//! acyclic without a separate cycle check.

use std::borrow::Borrow;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::ModelError;

/// Root type every vertex type extends.
pub const VERTEX: &str = "Vertex";
/// Root type every edge type extends.
pub const EDGE: &str = "Edge";

// ============================================================================
// TypeKey
// ============================================================================

/// Interned type name (cheap to clone, ordered, hashable).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeKey(Arc<str>);

impl TypeKey {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self.0)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for TypeKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TypeKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TypeKey {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}

impl From<&TypeKey> for TypeKey {
    fn from(value: &TypeKey) -> Self {
        value.clone()
    }
}

// ============================================================================
// Declarations
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Class { is_abstract: bool },
    Interface,
}

/// A single type declaration, fed to [`TypeGraphBuilder::declare`].
#[derive(Debug, Clone)]
pub struct TypeDecl {
    key: TypeKey,
    kind: TypeKind,
    parent: Option<TypeKey>,
    interfaces: Vec<TypeKey>,
}

impl TypeDecl {
    pub fn class(name: impl Into<TypeKey>) -> Self {
        Self::new(name.into(), TypeKind::Class { is_abstract: false })
    }

    pub fn abstract_class(name: impl Into<TypeKey>) -> Self {
        Self::new(name.into(), TypeKind::Class { is_abstract: true })
    }

    pub fn interface(name: impl Into<TypeKey>) -> Self {
        Self::new(name.into(), TypeKind::Interface)
    }

    fn new(key: TypeKey, kind: TypeKind) -> Self {
        Self {
            key,
            kind,
            parent: None,
            interfaces: Vec::new(),
        }
    }

    pub fn extends(mut self, parent: impl Into<TypeKey>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn implements(mut self, interface: impl Into<TypeKey>) -> Self {
        self.interfaces.push(interface.into());
        self
    }
}

/// Resolved information about one registered type.
#[derive(Debug, Clone)]
pub struct TypeInfo {
    pub key: TypeKey,
    pub kind: TypeKind,
    pub parent: Option<TypeKey>,
    /// Implemented interfaces, in declaration order.
    pub interfaces: Vec<TypeKey>,
}

impl TypeInfo {
    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }

    /// Interfaces and abstract classes cannot have instances.
    pub fn is_abstract(&self) -> bool {
        match self.kind {
            TypeKind::Class { is_abstract } => is_abstract,
            TypeKind::Interface => true,
        }
    }
}

// ============================================================================
// TypeGraph
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct TypeGraph {
    types: HashMap<TypeKey, TypeInfo>,
    /// Declaration order (iteration order for callers).
    order: Vec<TypeKey>,
    /// Reflexive supertype closure: `ty -> {ty, parent, interfaces, ...}`.
    supertypes_of: HashMap<TypeKey, HashSet<TypeKey>>,
}

impl TypeGraph {
    pub fn builder() -> TypeGraphBuilder {
        TypeGraphBuilder::default()
    }

    /// Builder pre-seeded with the abstract `Vertex` and `Edge` roots.
    pub fn element_builder() -> TypeGraphBuilder {
        TypeGraphBuilder::default()
            .declare(TypeDecl::abstract_class(VERTEX))
            .declare(TypeDecl::abstract_class(EDGE))
    }

    /// A graph holding only the element roots.
    pub fn element_roots() -> Self {
        Self::element_builder().build().unwrap_or_default()
    }

    pub fn contains(&self, ty: &str) -> bool {
        self.types.contains_key(ty)
    }

    pub fn get(&self, ty: &str) -> Option<&TypeInfo> {
        self.types.get(ty)
    }

    pub fn parent(&self, ty: &str) -> Option<&TypeKey> {
        self.types.get(ty).and_then(|info| info.parent.as_ref())
    }

    pub fn interfaces(&self, ty: &str) -> &[TypeKey] {
        self.types
            .get(ty)
            .map(|info| info.interfaces.as_slice())
            .unwrap_or(&[])
    }

    /// Every interface `ty` implements, inherited ones included.
    ///
    /// Own interfaces come first in declaration order, each followed by the
    /// interfaces it extends; the parent's set follows. Duplicates keep their
    /// first position.
    pub fn all_interfaces(&self, ty: &str) -> Vec<TypeKey> {
        let mut out = Vec::new();
        let mut current = self.types.get(ty);
        while let Some(info) = current {
            for interface in &info.interfaces {
                self.collect_interface(interface, &mut out);
            }
            current = info.parent.as_ref().and_then(|parent| self.types.get(parent));
        }
        out
    }

    fn collect_interface(&self, interface: &TypeKey, out: &mut Vec<TypeKey>) {
        if out.contains(interface) {
            return;
        }
        out.push(interface.clone());
        for inherited in self.interfaces(interface.as_str()) {
            self.collect_interface(inherited, out);
        }
    }

    pub fn is_abstract(&self, ty: &str) -> bool {
        self.types.get(ty).map(TypeInfo::is_abstract).unwrap_or(false)
    }

    pub fn is_interface(&self, ty: &str) -> bool {
        self.types.get(ty).map(TypeInfo::is_interface).unwrap_or(false)
    }

    /// `true` if a value of type `sub` can be used where `sup` is expected.
    ///
    /// Reflexive, also for types the graph does not know about.
    pub fn is_assignable(&self, sub: &str, sup: &str) -> bool {
        self.supertypes_of
            .get(sub)
            .map(|supers| supers.contains(sup))
            .unwrap_or(sub == sup)
    }

    /// Registered types in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &TypeInfo> {
        self.order.iter().filter_map(|key| self.types.get(key))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct TypeGraphBuilder {
    decls: Vec<TypeDecl>,
}

impl TypeGraphBuilder {
    pub fn declare(mut self, decl: TypeDecl) -> Self {
        self.decls.push(decl);
        self
    }

    pub fn build(self) -> Result<TypeGraph, ModelError> {
        let mut types: HashMap<TypeKey, TypeInfo> = HashMap::with_capacity(self.decls.len());
        let mut order = Vec::with_capacity(self.decls.len());

        for decl in self.decls {
            if types.contains_key(&decl.key) {
                return Err(ModelError::DuplicateType {
                    ty: decl.key.to_string(),
                });
            }

            if let Some(parent) = &decl.parent {
                let Some(parent_info) = types.get(parent) else {
                    return Err(ModelError::UnknownType {
                        ty: parent.to_string(),
                    });
                };
                if decl.kind == TypeKind::Interface || parent_info.is_interface() {
                    return Err(ModelError::ParentIsInterface {
                        ty: decl.key.to_string(),
                        parent: parent.to_string(),
                    });
                }
            }

            for iface in &decl.interfaces {
                match types.get(iface) {
                    None => {
                        return Err(ModelError::UnknownType {
                            ty: iface.to_string(),
                        })
                    }
                    Some(info) if !info.is_interface() => {
                        return Err(ModelError::NotAnInterface {
                            ty: decl.key.to_string(),
                            interface: iface.to_string(),
                        })
                    }
                    Some(_) => {}
                }
            }

            order.push(decl.key.clone());
            types.insert(
                decl.key.clone(),
                TypeInfo {
                    key: decl.key,
                    kind: decl.kind,
                    parent: decl.parent,
                    interfaces: decl.interfaces,
                },
            );
        }

        let supertypes_of = compute_supertypes_closure(&types);

        Ok(TypeGraph {
            types,
            order,
            supertypes_of,
        })
    }
}

fn compute_supertypes_closure(
    types: &HashMap<TypeKey, TypeInfo>,
) -> HashMap<TypeKey, HashSet<TypeKey>> {
    let direct_supers = |ty: &TypeKey| -> Vec<TypeKey> {
        types
            .get(ty)
            .map(|info| {
                info.parent
                    .iter()
                    .chain(info.interfaces.iter())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    };

    let mut supertypes_of: HashMap<TypeKey, HashSet<TypeKey>> = HashMap::new();
    for ty in types.keys() {
        let mut supers = HashSet::new();
        supers.insert(ty.clone());
        let mut stack = direct_supers(ty);
        while let Some(sup) = stack.pop() {
            if supers.insert(sup.clone()) {
                stack.extend(direct_supers(&sup));
            }
        }
        supertypes_of.insert(ty.clone(), supers);
    }
    supertypes_of
}
