//! graphstep query: typed Gremlin traversals as values.
//!
//! - [`traversal`]: the immutable traversal builder and its combinators
//! - [`label`]: step labels and per-traversal label bindings
//! - [`expr`] / [`compiler`] / [`predicate`]: filter expressions, their
//!   compilation into a predicate IR, negation normal form, and lowering
//!   into steps
//! - [`step`]: the step vocabulary and the persistent step list
//! - [`deserialization`]: type-directed, memoized result deserialization
//! - [`encoder`]: wire encoders (Gremlin-Groovy scripts)
//! - [`environment`] / [`executor`] / [`options`]: what a traversal runs against
//!
//! ```
//! use graphstep_query::{Expr, QueryEnvironment};
//!
//! let g = QueryEnvironment::anonymous().source();
//! let query = g
//!     .v()
//!     .where_(&Expr::field("age").gt(30))
//!     .unwrap()
//!     .to_groovy();
//! assert_eq!(query.script, "g.V().has(_a, gt(_b))");
//! ```

pub mod compiler;
pub mod deserialization;
pub mod encoder;
pub mod environment;
pub mod error;
pub mod executor;
pub mod expr;
pub mod label;
pub mod options;
pub mod predicate;
pub mod shape;
pub mod source;
pub mod step;
pub mod traversal;

pub use compiler::{lower, PredicateCompiler};
pub use deserialization::{FragmentDeserializer, HandlerNode, Outcome, Prior};
pub use encoder::{GroovyEncoder, GroovyScript, WireEncoder};
pub use environment::{QueryEnvironment, QueryEnvironmentBuilder};
pub use error::{QueryError, QueryResult};
pub use executor::{EmptyExecutor, InvalidExecutor, QueryExecutor, RawResults};
pub use expr::{field_equals, field_greater_than, references_label, Expr};
pub use label::{LabelBindings, StepLabel};
pub use options::{LabelCasing, QueryOptions};
pub use predicate::{Argument, CompareOp, Predicate, TerminalKey, P};
pub use shape::{Shape, ShapeKind};
pub use source::GraphSource;
pub use step::{Cardinality, Order, Scope, Step, StepList};
pub use traversal::{Branch, Traversal};
