use std::fmt;

use thiserror::Error;

/// Why a requested slot set was refused after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictReason {
    /// Two requested items overlap on the same sub-court and date
    InternalOverlap { sub_court_id: i32, date: String },
    /// A requested item overlaps a committed, non-voided reservation
    SlotTaken { sub_court_id: i32, date: String },
    /// The sub-courts (or the declared court) resolve to more than one court
    CrossCourtMismatch,
    /// Item prices do not add up to the declared total
    PriceMismatch { declared: i64, computed: i64 },
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InternalOverlap { sub_court_id, date } => write!(
                f,
                "requested items overlap on sub-court {} at {}",
                sub_court_id, date
            ),
            Self::SlotTaken { sub_court_id, date } => write!(
                f,
                "slot already taken on sub-court {} at {}",
                sub_court_id, date
            ),
            Self::CrossCourtMismatch => {
                write!(f, "all sub-courts must belong to the same court")
            }
            Self::PriceMismatch { declared, computed } => write!(
                f,
                "declared total {} does not match item sum {}",
                declared, computed
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found: {entity} with {field}={value}")]
    NotFound {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conflict: {0}")]
    Conflict(ConflictReason),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl DomainError {
    /// Whether this error is likely transient (e.g. DB connection lost)
    /// and the operation may succeed if retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, DomainError::Storage(_))
    }

    pub fn conflict_reason(&self) -> Option<&ConflictReason> {
        match self {
            DomainError::Conflict(reason) => Some(reason),
            _ => None,
        }
    }
}

impl From<sea_orm::DbErr> for DomainError {
    fn from(e: sea_orm::DbErr) -> Self {
        DomainError::Storage(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("MQTT error: {0}")]
    Mqtt(String),
}

impl From<rumqttc::ClientError> for InfraError {
    fn from(e: rumqttc::ClientError) -> Self {
        InfraError::Mqtt(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Infra(#[from] InfraError),
}

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_are_transient() {
        assert!(DomainError::Storage("connection reset".into()).is_transient());
        assert!(!DomainError::Forbidden("nope".into()).is_transient());
    }

    #[test]
    fn conflict_reason_is_exposed() {
        let err = DomainError::Conflict(ConflictReason::CrossCourtMismatch);
        assert_eq!(err.conflict_reason(), Some(&ConflictReason::CrossCourtMismatch));
        assert!(err.to_string().starts_with("Conflict:"));
    }
}
