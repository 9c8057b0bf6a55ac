use convenios_storage::StorageError;

use crate::ports::ServiceError;

/// Errors returned by [`Workflow`](crate::Workflow) operations.
///
/// Each variant is one caller-facing kind; the HTTP layer maps kinds to
/// status codes.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// Missing, unknown or expired session.
    #[error("authentication required")]
    Unauthenticated,

    /// Authenticated, but the operation needs the admin role.
    #[error("administrator role required")]
    Unauthorized,

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    /// Stale version, lost race, or serial allocation exhausted its retries.
    #[error("conflict: {0}")]
    Conflict(String),

    /// An external service (storage backend, document store, identity
    /// provider) failed.
    #[error("{service} failed: {message}")]
    Dependency { service: String, message: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl WorkflowError {
    /// Stable machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowError::Unauthenticated => "unauthenticated",
            WorkflowError::Unauthorized => "unauthorized",
            WorkflowError::Validation(_) => "validation",
            WorkflowError::NotFound(_) => "not_found",
            WorkflowError::Conflict(_) => "conflict",
            WorkflowError::Dependency { .. } => "dependency",
            WorkflowError::Internal(_) => "internal",
        }
    }
}

impl From<StorageError> for WorkflowError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::AgreementNotFound { agreement_id } => {
                WorkflowError::NotFound(format!("agreement {}", agreement_id))
            }
            StorageError::TypeNotFound { type_id } => {
                WorkflowError::NotFound(format!("agreement type {}", type_id))
            }
            StorageError::DraftNotFound { draft_id } => {
                WorkflowError::NotFound(format!("draft {}", draft_id))
            }
            e @ (StorageError::ConcurrentConflict { .. }
            | StorageError::AlreadyExists { .. }
            | StorageError::SerialConflict { .. }
            | StorageError::DraftConflict { .. }) => WorkflowError::Conflict(e.to_string()),
            StorageError::Backend(message) => WorkflowError::Dependency {
                service: "storage".to_string(),
                message,
            },
        }
    }
}

impl From<ServiceError> for WorkflowError {
    fn from(e: ServiceError) -> Self {
        WorkflowError::Dependency {
            service: e.service.to_string(),
            message: e.message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_conflicts_become_conflict_kind() {
        let err: WorkflowError = StorageError::ConcurrentConflict {
            agreement_id: "a1".into(),
            expected_version: 3,
        }
        .into();
        assert_eq!(err.kind(), "conflict");

        let err: WorkflowError = StorageError::SerialConflict {
            serial_number: "2025-001".into(),
        }
        .into();
        assert_eq!(err.kind(), "conflict");
    }

    #[test]
    fn missing_rows_become_not_found() {
        let err: WorkflowError = StorageError::TypeNotFound { type_id: 9 }.into();
        assert_eq!(err.to_string(), "agreement type 9 not found");
    }

    #[test]
    fn backend_errors_are_dependency_failures() {
        let err: WorkflowError = StorageError::Backend("connection reset".into()).into();
        assert_eq!(err.kind(), "dependency");
        assert_eq!(err.to_string(), "storage failed: connection reset");
    }
}
