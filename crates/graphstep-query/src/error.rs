use graphstep_model::ModelError;
use thiserror::Error;

use crate::expr::Expr;
use crate::label::StepLabel;
use crate::shape::Shape;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("expression not supported: {expr}")]
    ExpressionNotSupported { expr: Expr },

    #[error("{label} is already bound to `{existing}` and cannot be rebound to `{requested}`")]
    LabelRebindingConflict {
        label: StepLabel,
        existing: String,
        requested: String,
    },

    #[error("`{operation}` is not supported on a {shape} traversal")]
    UnsupportedShapeTransition {
        operation: &'static str,
        shape: Shape,
    },

    #[error("anonymous traversals cannot be executed")]
    AnonymousExecution,

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Execution(#[from] anyhow::Error),

    #[error("cannot serialize `{ty}` into element properties: {source}")]
    Serialize {
        ty: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot deserialize result as `{requested}`: {source}")]
    Deserialize {
        requested: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid query options: {0}")]
    InvalidOptions(#[source] serde_json::Error),
}

impl QueryError {
    pub(crate) fn unsupported(expr: &Expr) -> Self {
        QueryError::ExpressionNotSupported { expr: expr.clone() }
    }

    pub(crate) fn transition(operation: &'static str, shape: &Shape) -> Self {
        QueryError::UnsupportedShapeTransition {
            operation,
            shape: shape.clone(),
        }
    }
}

pub type QueryResult<T> = Result<T, QueryError>;
