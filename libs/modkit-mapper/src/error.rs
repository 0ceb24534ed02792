//! Error types for the mapper.

use crate::ports::ValidationFailures;
use crate::rules::identifier_text;
use serde_json::Value;
use thiserror::Error;

/// Errors raised by a mapping call.
///
/// Every variant aborts the whole top-level call: a failure deep inside a
/// relation tree unwinds through all ancestors without assigning anything to
/// the entity that failed or to any entity above it.
#[derive(Error, Debug)]
pub enum MapperError {
    /// The explicit identifier and the one embedded in the payload differ.
    #[error("Identifier conflict for {entity}: explicit {explicit} != payload {embedded}")]
    IdentifierConflict {
        entity: String,
        explicit: Value,
        embedded: Value,
    },

    /// An identifier was supplied but the store has no such entity.
    #[error("Entity {entity} with identifier '{id}' not found")]
    EntityNotFound { entity: String, id: String },

    /// A restricting gate refused a submitted field.
    #[error("Permission denied: '{ability}' is required to set {entity}.{field}")]
    PermissionDenied {
        entity: String,
        field: String,
        ability: String,
    },

    /// The rule checker reported failures for one entity.
    #[error("Validation failed for {entity}: {failures}")]
    ValidationFailed {
        entity: String,
        failures: ValidationFailures,
    },

    /// The store has no descriptor for the entity type.
    #[error("Unknown entity type: {0}")]
    UnknownEntity(String),

    /// The input is not a JSON object.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// A relation value has the wrong shape for its cardinality.
    #[error("Invalid relation {entity}.{field}: expected {expected}")]
    InvalidRelation {
        entity: String,
        field: String,
        expected: &'static str,
    },

    /// A typed setter could not accept the value.
    #[error("Invalid value for {entity}.{field}: {reason}")]
    InvalidValue {
        entity: String,
        field: String,
        reason: String,
    },

    /// The payload nests relations deeper than the configured limit.
    #[error("Relation nesting exceeds the limit of {limit}")]
    DepthLimitExceeded { limit: usize },

    /// A collaborator (store, factory, rule checker) failed.
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl MapperError {
    #[must_use]
    pub fn identifier_conflict(entity: impl Into<String>, explicit: Value, embedded: Value) -> Self {
        Self::IdentifierConflict {
            entity: entity.into(),
            explicit,
            embedded,
        }
    }

    #[must_use]
    pub fn entity_not_found(entity: impl Into<String>, id: &Value) -> Self {
        Self::EntityNotFound {
            entity: entity.into(),
            id: identifier_text(id).into_owned(),
        }
    }

    #[must_use]
    pub fn permission_denied(
        entity: impl Into<String>,
        field: impl Into<String>,
        ability: impl Into<String>,
    ) -> Self {
        Self::PermissionDenied {
            entity: entity.into(),
            field: field.into(),
            ability: ability.into(),
        }
    }

    #[must_use]
    pub fn validation_failed(entity: impl Into<String>, failures: ValidationFailures) -> Self {
        Self::ValidationFailed {
            entity: entity.into(),
            failures,
        }
    }

    #[must_use]
    pub fn unknown_entity(entity: impl Into<String>) -> Self {
        Self::UnknownEntity(entity.into())
    }

    #[must_use]
    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self::InvalidPayload(message.into())
    }

    #[must_use]
    pub fn invalid_relation(
        entity: impl Into<String>,
        field: impl Into<String>,
        expected: &'static str,
    ) -> Self {
        Self::InvalidRelation {
            entity: entity.into(),
            field: field.into(),
            expected,
        }
    }

    #[must_use]
    pub fn invalid_value(
        entity: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            entity: entity.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::EntityNotFound { .. })
    }

    #[must_use]
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied { .. })
    }

    #[must_use]
    pub fn is_validation_failed(&self) -> bool {
        matches!(self, Self::ValidationFailed { .. })
    }

    /// Returns the collected failures if this is a `ValidationFailed` error.
    #[must_use]
    pub fn failures(&self) -> Option<&ValidationFailures> {
        match self {
            Self::ValidationFailed { failures, .. } => Some(failures),
            _ => None,
        }
    }
}
