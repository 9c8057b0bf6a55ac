use async_trait::async_trait;

use crate::error::StorageError;
use crate::record::{
    ActivityRecord, AgreementRecord, AgreementTypeRecord, AgreementUpdate, DraftRecord,
    ObservationRecord,
};

/// The storage trait for the agreements service.
///
/// A `ConvenioStorage` implementation provides durable, transactional storage
/// for agreements, their observations and activity log, the agreement-type
/// catalog and in-progress drafts.
///
/// ## Snapshot Semantics
///
/// All mutating agreement operations take `&mut Self::Snapshot`, a type
/// representing an in-progress transaction. The lifecycle is:
///
/// 1. `begin_snapshot()` — start a transaction, returns a `Snapshot`
/// 2. Call mutating methods with `&mut snapshot`
/// 3. `commit_snapshot(snapshot)` — commit and consume the transaction
///    OR `abort_snapshot(snapshot)` — roll back and consume the transaction
///
/// If a `Snapshot` is dropped without committing, its writes are discarded.
/// Commit is all-or-nothing.
///
/// ## Uniqueness
///
/// Serial numbers are unique across all agreements. A duplicate is reported
/// as `StorageError::SerialConflict`, either by `insert_agreement` or by
/// `commit_snapshot` when a concurrent transaction committed it first.
/// Allocators that read `latest_serial_for_year` first never hit it, since
/// that read serializes them.
///
/// ## OCC Conflict Detection
///
/// `update_agreement` is conditional on `version = expected_version`. A
/// mismatch yields `StorageError::ConcurrentConflict`, again either
/// immediately or at commit.
#[async_trait]
pub trait ConvenioStorage: Send + Sync + 'static {
    /// The snapshot (transaction) type used by this storage backend.
    type Snapshot: Send;

    // ── Snapshot lifecycle ────────────────────────────────────────────────────

    /// Begin a new snapshot (transaction).
    async fn begin_snapshot(&self) -> Result<Self::Snapshot, StorageError>;

    /// Commit a snapshot, making all mutations durable.
    async fn commit_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError>;

    /// Abort (roll back) a snapshot, discarding all mutations.
    async fn abort_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError>;

    // ── Agreement operations (within snapshot) ───────────────────────────────

    /// Insert a new agreement row.
    ///
    /// Returns `AlreadyExists` for a duplicate id and `SerialConflict` for a
    /// duplicate serial number.
    async fn insert_agreement(
        &self,
        snapshot: &mut Self::Snapshot,
        record: AgreementRecord,
    ) -> Result<(), StorageError>;

    /// Read an agreement as seen by this snapshot (committed state plus the
    /// snapshot's own staged writes).
    async fn get_agreement_for_update(
        &self,
        snapshot: &mut Self::Snapshot,
        agreement_id: &str,
    ) -> Result<AgreementRecord, StorageError>;

    /// Apply a version-validated update. Returns the new version.
    async fn update_agreement(
        &self,
        snapshot: &mut Self::Snapshot,
        agreement_id: &str,
        expected_version: i64,
        update: AgreementUpdate,
    ) -> Result<i64, StorageError>;

    /// Highest serial number of `year`, compared by numeric suffix.
    ///
    /// Locks serial allocation for the rest of the snapshot: a concurrent
    /// snapshot calling this waits until the holder commits, aborts or is
    /// dropped, and then sees the holder's insert.
    async fn latest_serial_for_year(
        &self,
        snapshot: &mut Self::Snapshot,
        year: i32,
    ) -> Result<Option<String>, StorageError>;

    /// Insert an observation. The agreement must exist.
    async fn insert_observation(
        &self,
        snapshot: &mut Self::Snapshot,
        record: ObservationRecord,
    ) -> Result<(), StorageError>;

    /// Append an activity entry. The agreement must exist.
    async fn insert_activity(
        &self,
        snapshot: &mut Self::Snapshot,
        record: ActivityRecord,
    ) -> Result<(), StorageError>;

    // ── Query operations (outside snapshot) ───────────────────────────────────

    /// Read a committed agreement.
    async fn get_agreement(&self, agreement_id: &str) -> Result<AgreementRecord, StorageError>;

    /// Agreements created by `owner_id`, most recently updated first.
    /// `limit` of 0 means no limit.
    async fn list_agreements_by_owner(
        &self,
        owner_id: &str,
        limit: usize,
    ) -> Result<Vec<AgreementRecord>, StorageError>;

    /// Activity entries across all agreements, newest first.
    /// `limit` of 0 means no limit.
    async fn list_activity(&self, limit: usize) -> Result<Vec<ActivityRecord>, StorageError>;

    /// Observations attached to an agreement, oldest first.
    async fn list_observations(
        &self,
        agreement_id: &str,
    ) -> Result<Vec<ObservationRecord>, StorageError>;

    // ── Catalog ───────────────────────────────────────────────────────────────

    async fn get_agreement_type(&self, type_id: i64) -> Result<AgreementTypeRecord, StorageError>;

    async fn list_agreement_types(&self) -> Result<Vec<AgreementTypeRecord>, StorageError>;

    async fn upsert_agreement_type(&self, record: AgreementTypeRecord)
        -> Result<(), StorageError>;

    // ── Drafts ────────────────────────────────────────────────────────────────

    /// Save a draft. With `expected_version`, the stored draft must be at that
    /// version (`DraftConflict` otherwise); without it, the draft must not
    /// exist yet. Returns the stored version.
    async fn save_draft(
        &self,
        record: DraftRecord,
        expected_version: Option<i64>,
    ) -> Result<i64, StorageError>;

    async fn get_draft(&self, draft_id: &str) -> Result<DraftRecord, StorageError>;

    async fn delete_draft(&self, draft_id: &str) -> Result<(), StorageError>;
}
