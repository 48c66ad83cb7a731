use thiserror::Error;

use crate::condition::Mode;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("An error occurred deserializing policy definition: {0}.")]
    Deserializing(#[source] serde_json::Error),

    #[error("An error occurred validating policy definition: {0}.")]
    Validation(String),

    #[error("Unrecognized policy option `{key}`.")]
    UnknownOption { key: String },

    #[error("Invalid value for policy option `{key}`: {reason}.")]
    InvalidOption { key: String, reason: String },

    #[error("Predicate on field `{field}` does not support {mode:?} mode.")]
    UnsupportedPredicateMode { field: String, mode: Mode },

    #[error("Resource type `{resource_type}` has no field or relation `{field}`.")]
    UnknownField {
        resource_type: String,
        field: String,
    },

    #[error("Field `{field}` of resource type `{resource_type}` is not a relation.")]
    NotARelation {
        resource_type: String,
        field: String,
    },

    #[error("Field `{field}` of resource type `{resource_type}` is a relation, not an attribute.")]
    NotAnAttribute {
        resource_type: String,
        field: String,
    },

    #[error("Relation `{field}` of resource type `{resource_type}` is not loaded.")]
    RelationNotLoaded {
        resource_type: String,
        field: String,
    },

    #[error("Derived condition depth limit exceeded (max: {max_depth}).")]
    DepthLimitExceeded { max_depth: usize },
}
