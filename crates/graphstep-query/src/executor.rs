//! Boundary to whatever actually runs a traversal.

use std::fmt;

use anyhow::anyhow;
use graphstep_model::TypeKey;
use serde_json::Value;

use crate::traversal::Traversal;

/// One-shot, lazily produced raw results.
pub type RawResults = Box<dyn Iterator<Item = anyhow::Result<Value>> + Send>;

/// Runs a finished traversal. Failures propagate to the caller unchanged;
/// retries and timeouts belong to the implementation.
pub trait QueryExecutor: Send + Sync + fmt::Debug {
    fn execute(&self, traversal: &Traversal, requested: &TypeKey) -> anyhow::Result<RawResults>;
}

/// Executor of environments that have none configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct InvalidExecutor;

impl QueryExecutor for InvalidExecutor {
    fn execute(&self, _traversal: &Traversal, requested: &TypeKey) -> anyhow::Result<RawResults> {
        Err(anyhow!(
            "no query executor is configured (requested `{requested}`)"
        ))
    }
}

/// Executor that never yields results.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyExecutor;

impl QueryExecutor for EmptyExecutor {
    fn execute(&self, _traversal: &Traversal, _requested: &TypeKey) -> anyhow::Result<RawResults> {
        Ok(Box::new(std::iter::empty()))
    }
}
