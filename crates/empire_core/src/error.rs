//! Error types for the tick engine.
//!
//! Two layers live here. [`GameError`] is returned through `Result` for
//! misuse of the API itself (bad configuration, undecodable bytes).
//! Per-entity problems found while ticking are never returned as `Err`:
//! they are collected into an [`ErrorReport`] so one broken ship cannot
//! abort the tick for everyone else.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entities::EntityRef;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for engine API failures.
#[derive(Debug, Error)]
pub enum GameError {
    /// Engine configuration could not be loaded.
    #[error("Invalid engine configuration: {0}")]
    Config(String),

    /// Failed to read a configuration or snapshot file.
    #[error("Failed to read '{path}': {message}")]
    Io {
        /// Path that failed.
        path: String,
        /// Error message.
        message: String,
    },

    /// Invalid entity reference.
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityRef),

    /// Snapshot or delta could not be encoded/decoded.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Invalid world state.
    #[error("Invalid world state: {0}")]
    InvalidState(String),
}

/// How severe a per-entity error is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Malformed but repairable: the entity was clamped or skipped this tick.
    Validation,
    /// Too corrupt to process: the entity is quarantined until repaired.
    Fatal,
}

/// A problem with one entity, found during a tick.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum EntityError {
    /// A field was outside its legal range and has been clamped.
    #[error("{entity}: {field} out of range ({detail}), clamped")]
    Clamped {
        /// Offending entity.
        entity: EntityRef,
        /// Field name.
        field: String,
        /// What was wrong and what it became.
        detail: String,
    },

    /// The entity was skipped for this tick.
    #[error("{entity}: skipped this tick: {reason}")]
    Skipped {
        /// Offending entity.
        entity: EntityRef,
        /// Why.
        reason: String,
    },

    /// The entity references class stats that do not exist.
    #[error("{entity}: missing ship class {class}")]
    MissingClass {
        /// Offending entity.
        entity: EntityRef,
        /// Class id that was not found.
        class: u16,
    },

    /// The entity's state cannot be processed at all.
    #[error("{entity}: corrupt state: {reason}")]
    Corrupt {
        /// Offending entity.
        entity: EntityRef,
        /// Why.
        reason: String,
    },
}

impl EntityError {
    /// Entity the error refers to.
    #[must_use]
    pub fn entity(&self) -> EntityRef {
        match self {
            Self::Clamped { entity, .. }
            | Self::Skipped { entity, .. }
            | Self::MissingClass { entity, .. }
            | Self::Corrupt { entity, .. } => *entity,
        }
    }

    /// Severity of this error.
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            Self::Clamped { .. } | Self::Skipped { .. } => Severity::Validation,
            Self::MissingClass { .. } | Self::Corrupt { .. } => Severity::Fatal,
        }
    }

    /// Convenience constructor for [`EntityError::Clamped`].
    pub fn clamped(entity: EntityRef, field: &str, detail: impl Into<String>) -> Self {
        Self::Clamped {
            entity,
            field: field.to_string(),
            detail: detail.into(),
        }
    }

    /// Convenience constructor for [`EntityError::Skipped`].
    pub fn skipped(entity: EntityRef, reason: impl Into<String>) -> Self {
        Self::Skipped {
            entity,
            reason: reason.into(),
        }
    }
}

/// All per-entity errors of one tick, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Errors in the order they were found.
    pub errors: Vec<EntityError>,
}

impl ErrorReport {
    /// Record an error.
    pub fn push(&mut self, error: EntityError) {
        tracing::debug!(error = %error, "entity error");
        self.errors.push(error);
    }

    /// Whether nothing went wrong.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of errors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Errors of the given severity.
    pub fn by_severity(&self, severity: Severity) -> impl Iterator<Item = &EntityError> {
        self.errors.iter().filter(move |e| e.severity() == severity)
    }

    /// Entities that must be quarantined, deduplicated and sorted.
    #[must_use]
    pub fn quarantined(&self) -> Vec<EntityRef> {
        let mut out: Vec<EntityRef> = self
            .by_severity(Severity::Fatal)
            .map(|e| e.entity())
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Whether the given entity was reported as fatally broken.
    #[must_use]
    pub fn is_quarantined(&self, entity: EntityRef) -> bool {
        self.by_severity(Severity::Fatal).any(|e| e.entity() == entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_classification() {
        let clamp = EntityError::clamped(EntityRef::Ship(1), "energy", "-5 -> 0");
        let missing = EntityError::MissingClass {
            entity: EntityRef::Ship(2),
            class: 9,
        };
        assert_eq!(clamp.severity(), Severity::Validation);
        assert_eq!(missing.severity(), Severity::Fatal);
    }

    #[test]
    fn test_report_quarantine_list_is_sorted_and_unique() {
        let mut report = ErrorReport::default();
        report.push(EntityError::Corrupt {
            entity: EntityRef::Ship(7),
            reason: "zero max energy".into(),
        });
        report.push(EntityError::MissingClass {
            entity: EntityRef::Ship(3),
            class: 1,
        });
        report.push(EntityError::MissingClass {
            entity: EntityRef::Ship(7),
            class: 1,
        });
        report.push(EntityError::skipped(EntityRef::Planet(1), "test"));

        assert_eq!(report.len(), 4);
        assert_eq!(report.quarantined(), vec![EntityRef::Ship(3), EntityRef::Ship(7)]);
        assert!(report.is_quarantined(EntityRef::Ship(3)));
        assert!(!report.is_quarantined(EntityRef::Planet(1)));
    }

    #[test]
    fn test_error_display() {
        let err = EntityError::MissingClass {
            entity: EntityRef::Ship(4),
            class: 12,
        };
        assert_eq!(err.to_string(), "ship#4: missing ship class 12");
    }
}
