//! Traversal source (`g`).

use std::sync::Arc;

use graphstep_model::{TypeKey, EDGE, VERTEX};
use serde::Serialize;
use serde_json::Value;

use crate::environment::QueryEnvironment;
use crate::error::QueryResult;
use crate::shape::Shape;
use crate::step::{Step, StepList};
use crate::traversal::Traversal;

#[derive(Debug, Clone)]
pub struct GraphSource {
    env: Arc<QueryEnvironment>,
    name: String,
}

impl GraphSource {
    pub fn new(env: Arc<QueryEnvironment>) -> Self {
        Self {
            env,
            name: "g".to_string(),
        }
    }

    pub fn with_name(self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self
        }
    }

    pub fn environment(&self) -> &Arc<QueryEnvironment> {
        &self.env
    }

    fn root(&self, shape: Shape) -> Traversal {
        let steps = StepList::new().push(Step::Identifier(self.name.clone()));
        Traversal::start(self.env.clone(), steps, shape)
    }

    /// All vertices.
    pub fn v(&self) -> Traversal {
        self.root(Shape::vertex(VERTEX)).add_step(Step::V(Vec::new()))
    }

    pub fn v_ids<V: Into<Value>>(&self, ids: impl IntoIterator<Item = V>) -> Traversal {
        let ids = ids.into_iter().map(Into::into).collect();
        self.root(Shape::vertex(VERTEX)).add_step(Step::V(ids))
    }

    /// All edges.
    pub fn e(&self) -> Traversal {
        self.root(Shape::edge(EDGE)).add_step(Step::E(Vec::new()))
    }

    pub fn e_ids<V: Into<Value>>(&self, ids: impl IntoIterator<Item = V>) -> Traversal {
        let ids = ids.into_iter().map(Into::into).collect();
        self.root(Shape::edge(EDGE)).add_step(Step::E(ids))
    }

    pub fn add_v<T: Serialize>(
        &self,
        ty: impl Into<TypeKey>,
        vertex: &T,
    ) -> QueryResult<Traversal> {
        self.root(Shape::value()).add_v(ty, vertex)
    }

    pub fn add_e<T: Serialize>(&self, ty: impl Into<TypeKey>, edge: &T) -> QueryResult<Traversal> {
        self.root(Shape::value()).add_e(ty, edge)
    }

    pub fn inject<V: Into<Value>>(&self, values: impl IntoIterator<Item = V>) -> Traversal {
        self.root(Shape::value()).inject(values)
    }
}
