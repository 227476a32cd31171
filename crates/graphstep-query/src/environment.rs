//! Everything a traversal needs besides its steps: model, executor,
//! result deserializer and options.

use std::fmt;
use std::sync::Arc;

use graphstep_model::{GraphModel, Identifier};

use crate::deserialization::FragmentDeserializer;
use crate::executor::{InvalidExecutor, QueryExecutor};
use crate::options::{LabelCasing, QueryOptions};
use crate::shape::Shape;
use crate::source::GraphSource;

pub struct QueryEnvironment {
    model: GraphModel,
    executor: Arc<dyn QueryExecutor>,
    deserializer: FragmentDeserializer,
    options: QueryOptions,
}

impl QueryEnvironment {
    pub fn builder() -> QueryEnvironmentBuilder {
        QueryEnvironmentBuilder::default()
    }

    /// Empty model, no executor, GraphSON deserializer, default options.
    pub fn anonymous() -> Arc<Self> {
        Self::builder().build()
    }

    pub fn model(&self) -> &GraphModel {
        &self.model
    }

    pub fn executor(&self) -> &dyn QueryExecutor {
        self.executor.as_ref()
    }

    pub fn deserializer(&self) -> &FragmentDeserializer {
        &self.deserializer
    }

    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    /// Wire identifier of `field` for values of `shape`.
    pub fn identifier(&self, shape: &Shape, field: &str) -> Identifier {
        match (shape.element_kind(), shape.element_type()) {
            (Some(kind), Some(ty)) => self.model.identifier(kind, ty.as_str(), field),
            _ => Identifier::key(field),
        }
    }

    /// Traversal source (`g`) over this environment.
    pub fn source(self: &Arc<Self>) -> GraphSource {
        GraphSource::new(self.clone())
    }
}

impl fmt::Debug for QueryEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryEnvironment")
            .field("vertex_types", &self.model.vertices().len())
            .field("edge_types", &self.model.edges().len())
            .field("executor", &self.executor)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
pub struct QueryEnvironmentBuilder {
    model: Option<GraphModel>,
    executor: Option<Arc<dyn QueryExecutor>>,
    deserializer: Option<FragmentDeserializer>,
    options: QueryOptions,
}

impl QueryEnvironmentBuilder {
    pub fn model(mut self, model: GraphModel) -> Self {
        self.model = Some(model);
        self
    }

    pub fn executor(mut self, executor: impl QueryExecutor + 'static) -> Self {
        self.executor = Some(Arc::new(executor));
        self
    }

    pub fn shared_executor(mut self, executor: Arc<dyn QueryExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn deserializer(mut self, deserializer: FragmentDeserializer) -> Self {
        self.deserializer = Some(deserializer);
        self
    }

    pub fn options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> Arc<QueryEnvironment> {
        let model = self.model.unwrap_or_default();
        let model = match self.options.label_casing {
            LabelCasing::AsDeclared => model,
            LabelCasing::LowerCase => model.with_lower_case_labels(),
            LabelCasing::CamelCase => model.with_camel_case_labels(),
        };

        Arc::new(QueryEnvironment {
            model,
            executor: self.executor.unwrap_or_else(|| Arc::new(InvalidExecutor)),
            deserializer: self
                .deserializer
                .unwrap_or_else(FragmentDeserializer::graphson),
            options: self.options,
        })
    }
}
