/// All errors that can be returned by a ConvenioStorage implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Optimistic concurrency control conflict: another transaction modified
    /// the agreement concurrently. The expected version was not found.
    #[error("concurrent conflict on agreement {agreement_id}: expected version {expected_version}")]
    ConcurrentConflict {
        agreement_id: String,
        expected_version: i64,
    },

    /// No agreement with the given id.
    #[error("agreement not found: {agreement_id}")]
    AgreementNotFound { agreement_id: String },

    /// An agreement with this id already exists.
    #[error("agreement already exists: {agreement_id}")]
    AlreadyExists { agreement_id: String },

    /// Serial number uniqueness violated. Callers retry allocation.
    #[error("serial number already taken: {serial_number}")]
    SerialConflict { serial_number: String },

    /// No agreement type with the given id.
    #[error("agreement type not found: {type_id}")]
    TypeNotFound { type_id: i64 },

    /// No draft with the given id.
    #[error("draft not found: {draft_id}")]
    DraftNotFound { draft_id: String },

    /// Draft was saved by someone else since it was read. `None` means the
    /// caller expected to create it.
    #[error("draft {draft_id} changed concurrently: expected version {expected_version:?}")]
    DraftConflict {
        draft_id: String,
        expected_version: Option<i64>,
    },

    /// A backend-specific storage error (DB connection, serialization, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}
