#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! In-memory `OData` query-option binder.
//!
//! Takes already-parsed query options (`$filter` AST, `$orderby` keys, `$select` /
//! `$expand` paths, `$skip` / `$top`) and compiles them into closures that run over a
//! pulled sequence of [`Entity`] values:
//!
//! ```text
//! source -> filter -> order -> skip -> top -> project -> ODataRecord
//! ```
//!
//! The entry point is [`QueryEngine::apply`]. The EDM ([`EdmModel`]) supplies property
//! descriptors and precomputed accessors; [`QueryBuilder`] resolves name-based options
//! against it.
pub mod ast;
pub mod builder;
pub mod edm;
pub mod errors;
pub mod filter;
pub mod limits;
pub mod metadata;
pub mod order;
pub mod pagination;
pub mod path;
pub mod pipeline;
pub mod problem;
pub mod projection;
pub mod record;
pub mod service_document;
pub mod value;

pub use ast::{BinaryOp, Expr, Literal, UnaryOp};
pub use builder::QueryBuilder;
pub use edm::{
    Capabilities, EdmModel, EdmModelBuilder, EdmType, EntitySet, EnumType, FieldKind, Property,
    StructuredType, TypeDef,
};
pub use errors::ErrDef;
pub use filter::{Predicate, PredicateCompiler};
pub use limits::ODataLimits;
pub use metadata::metadata_document;
pub use order::{ODataOrderBy, OrderComparator, OrderKey, OrderKeyCompiler, SortDir};
pub use pagination::Pagination;
pub use path::PropertyPath;
pub use pipeline::{EntitySource, QueryEngine, QueryOptions, QueryResults, TypedSource};
pub use problem::{APPLICATION_PROBLEM_JSON, Problem};
pub use projection::{ProjectionCompiler, Projector, Selection};
pub use record::{ODataRecord, RecordValue};
pub use service_document::{
    MetadataLevel, ServiceDocument, ServiceDocumentOptions, service_document,
};
pub use value::{Entity, Value};

/// Unified error type for binding and executing `OData` query options.
///
/// Everything except [`Error::Evaluation`] (and a per-element [`Error::TypeMismatch`])
/// is raised eagerly, before the first element of a result sequence is produced.
///
/// ## HTTP Mapping
///
/// See [`problem`]: `InvalidArgument`, `Bind`, `LimitExceeded` → 400,
/// `UnsupportedOperation` → 501, everything else → 500.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A required input is missing or empty, or a name does not resolve.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A source element type does not match the entity set's declared type.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// AST node kind, operator, operand combination or function outside the supported set.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// A constant cannot be converted to its statically expected type.
    #[error("cannot bind {literal} to {expected}")]
    Bind { expected: String, literal: String },

    /// Evaluating an accessor or operator against a particular entity failed.
    #[error("evaluation failed: {0}")]
    Evaluation(String),

    /// Query options exceed the configured [`ODataLimits`].
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// EDM definitions are inconsistent (unknown types, inheritance cycles, ...).
    #[error("invalid model: {0}")]
    InvalidModel(String),

    #[error("configuration error: {0}")]
    Config(String),
}
