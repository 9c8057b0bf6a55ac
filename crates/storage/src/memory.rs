//! In-process `ConvenioStorage` backend.
//!
//! Committed state lives behind a tokio `RwLock`. A snapshot is a list of
//! staged writes; reads inside a snapshot replay those writes over a copy of
//! the committed tables, and commit re-validates every write against the
//! latest committed state before swapping it in. Uniqueness and version
//! checks therefore hold across concurrent snapshots.
//!
//! Reading the latest serial takes the store's serial lock and keeps it for
//! the rest of the snapshot, so serial allocation is serialized the way a
//! `SELECT ... FOR UPDATE` on a counter row would be.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::error::StorageError;
use crate::record::{
    ActivityRecord, AgreementRecord, AgreementTypeRecord, AgreementUpdate, DraftRecord,
    ObservationRecord,
};
use crate::traits::ConvenioStorage;

#[derive(Debug, Clone, Default)]
struct Tables {
    agreements: BTreeMap<String, AgreementRecord>,
    observations: Vec<ObservationRecord>,
    activity: Vec<ActivityRecord>,
    types: BTreeMap<i64, AgreementTypeRecord>,
    drafts: BTreeMap<String, DraftRecord>,
}

#[derive(Debug, Clone)]
enum StagedWrite {
    InsertAgreement(AgreementRecord),
    UpdateAgreement {
        agreement_id: String,
        expected_version: i64,
        update: AgreementUpdate,
    },
    InsertObservation(ObservationRecord),
    InsertActivity(ActivityRecord),
}

/// Writes staged by one transaction against [`MemoryStorage`].
#[derive(Debug, Default)]
pub struct MemorySnapshot {
    writes: Vec<StagedWrite>,
    /// Held from the first `latest_serial_for_year` until commit or abort.
    serial_guard: Option<OwnedMutexGuard<()>>,
}

/// Non-durable storage backend used by the server binary and by tests.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    tables: RwLock<Tables>,
    serial_lock: Arc<Mutex<()>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed state with this snapshot's writes replayed on top.
    async fn staged_view(&self, snapshot: &MemorySnapshot) -> Result<Tables, StorageError> {
        let mut view = self.tables.read().await.clone();
        for write in &snapshot.writes {
            view.apply(write.clone())?;
        }
        Ok(view)
    }
}

/// Numeric suffix of `serial` when it belongs to `year`.
fn serial_sequence(serial: &str, year: i32) -> Option<u64> {
    serial
        .strip_prefix(&format!("{year}-"))
        .and_then(|suffix| suffix.parse::<u64>().ok())
}

impl Tables {
    fn check_insert(&self, record: &AgreementRecord) -> Result<(), StorageError> {
        if self.agreements.contains_key(&record.id) {
            return Err(StorageError::AlreadyExists {
                agreement_id: record.id.clone(),
            });
        }
        if self
            .agreements
            .values()
            .any(|a| a.serial_number == record.serial_number)
        {
            return Err(StorageError::SerialConflict {
                serial_number: record.serial_number.clone(),
            });
        }
        Ok(())
    }

    fn agreement(&self, agreement_id: &str) -> Result<&AgreementRecord, StorageError> {
        self.agreements
            .get(agreement_id)
            .ok_or_else(|| StorageError::AgreementNotFound {
                agreement_id: agreement_id.to_string(),
            })
    }

    fn apply(&mut self, write: StagedWrite) -> Result<(), StorageError> {
        match write {
            StagedWrite::InsertAgreement(record) => {
                self.check_insert(&record)?;
                self.agreements.insert(record.id.clone(), record);
            }
            StagedWrite::UpdateAgreement {
                agreement_id,
                expected_version,
                update,
            } => {
                let record = self.agreements.get_mut(&agreement_id).ok_or_else(|| {
                    StorageError::AgreementNotFound {
                        agreement_id: agreement_id.clone(),
                    }
                })?;
                if record.version != expected_version {
                    return Err(StorageError::ConcurrentConflict {
                        agreement_id,
                        expected_version,
                    });
                }
                update.apply_to(record);
            }
            StagedWrite::InsertObservation(record) => {
                self.agreement(&record.agreement_id)?;
                self.observations.push(record);
            }
            StagedWrite::InsertActivity(record) => {
                self.agreement(&record.agreement_id)?;
                self.activity.push(record);
            }
        }
        Ok(())
    }

    fn latest_serial(&self, year: i32) -> Option<String> {
        self.agreements
            .values()
            .filter_map(|a| serial_sequence(&a.serial_number, year).map(|n| (n, a)))
            .max_by_key(|(n, _)| *n)
            .map(|(_, a)| a.serial_number.clone())
    }
}

fn apply_limit<T>(mut rows: Vec<T>, limit: usize) -> Vec<T> {
    if limit > 0 {
        rows.truncate(limit);
    }
    rows
}

#[async_trait]
impl ConvenioStorage for MemoryStorage {
    type Snapshot = MemorySnapshot;

    async fn begin_snapshot(&self) -> Result<MemorySnapshot, StorageError> {
        Ok(MemorySnapshot::default())
    }

    async fn commit_snapshot(&self, snapshot: MemorySnapshot) -> Result<(), StorageError> {
        let MemorySnapshot {
            writes,
            serial_guard,
        } = snapshot;
        let mut tables = self.tables.write().await;
        let mut next = tables.clone();
        for write in writes {
            next.apply(write)?;
        }
        *tables = next;
        drop(tables);
        drop(serial_guard);
        Ok(())
    }

    async fn abort_snapshot(&self, snapshot: MemorySnapshot) -> Result<(), StorageError> {
        drop(snapshot);
        Ok(())
    }

    async fn insert_agreement(
        &self,
        snapshot: &mut MemorySnapshot,
        record: AgreementRecord,
    ) -> Result<(), StorageError> {
        self.staged_view(snapshot).await?.check_insert(&record)?;
        snapshot.writes.push(StagedWrite::InsertAgreement(record));
        Ok(())
    }

    async fn get_agreement_for_update(
        &self,
        snapshot: &mut MemorySnapshot,
        agreement_id: &str,
    ) -> Result<AgreementRecord, StorageError> {
        let view = self.staged_view(snapshot).await?;
        view.agreement(agreement_id).cloned()
    }

    async fn update_agreement(
        &self,
        snapshot: &mut MemorySnapshot,
        agreement_id: &str,
        expected_version: i64,
        update: AgreementUpdate,
    ) -> Result<i64, StorageError> {
        let view = self.staged_view(snapshot).await?;
        let current = view.agreement(agreement_id)?;
        if current.version != expected_version {
            return Err(StorageError::ConcurrentConflict {
                agreement_id: agreement_id.to_string(),
                expected_version,
            });
        }
        snapshot.writes.push(StagedWrite::UpdateAgreement {
            agreement_id: agreement_id.to_string(),
            expected_version,
            update,
        });
        Ok(expected_version + 1)
    }

    async fn latest_serial_for_year(
        &self,
        snapshot: &mut MemorySnapshot,
        year: i32,
    ) -> Result<Option<String>, StorageError> {
        if snapshot.serial_guard.is_none() {
            snapshot.serial_guard = Some(self.serial_lock.clone().lock_owned().await);
        }
        Ok(self.staged_view(snapshot).await?.latest_serial(year))
    }

    async fn insert_observation(
        &self,
        snapshot: &mut MemorySnapshot,
        record: ObservationRecord,
    ) -> Result<(), StorageError> {
        self.staged_view(snapshot)
            .await?
            .agreement(&record.agreement_id)?;
        snapshot.writes.push(StagedWrite::InsertObservation(record));
        Ok(())
    }

    async fn insert_activity(
        &self,
        snapshot: &mut MemorySnapshot,
        record: ActivityRecord,
    ) -> Result<(), StorageError> {
        self.staged_view(snapshot)
            .await?
            .agreement(&record.agreement_id)?;
        snapshot.writes.push(StagedWrite::InsertActivity(record));
        Ok(())
    }

    async fn get_agreement(&self, agreement_id: &str) -> Result<AgreementRecord, StorageError> {
        self.tables.read().await.agreement(agreement_id).cloned()
    }

    async fn list_agreements_by_owner(
        &self,
        owner_id: &str,
        limit: usize,
    ) -> Result<Vec<AgreementRecord>, StorageError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<AgreementRecord> = tables
            .agreements
            .values()
            .filter(|a| a.owner_id == owner_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(apply_limit(rows, limit))
    }

    async fn list_activity(&self, limit: usize) -> Result<Vec<ActivityRecord>, StorageError> {
        let tables = self.tables.read().await;
        // Newest insert first, so equal timestamps keep append order reversed.
        let mut rows: Vec<ActivityRecord> = tables.activity.iter().rev().cloned().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(apply_limit(rows, limit))
    }

    async fn list_observations(
        &self,
        agreement_id: &str,
    ) -> Result<Vec<ObservationRecord>, StorageError> {
        let tables = self.tables.read().await;
        Ok(tables
            .observations
            .iter()
            .filter(|o| o.agreement_id == agreement_id)
            .cloned()
            .collect())
    }

    async fn get_agreement_type(&self, type_id: i64) -> Result<AgreementTypeRecord, StorageError> {
        self.tables
            .read()
            .await
            .types
            .get(&type_id)
            .cloned()
            .ok_or(StorageError::TypeNotFound { type_id })
    }

    async fn list_agreement_types(&self) -> Result<Vec<AgreementTypeRecord>, StorageError> {
        Ok(self.tables.read().await.types.values().cloned().collect())
    }

    async fn upsert_agreement_type(
        &self,
        record: AgreementTypeRecord,
    ) -> Result<(), StorageError> {
        self.tables.write().await.types.insert(record.id, record);
        Ok(())
    }

    async fn save_draft(
        &self,
        mut record: DraftRecord,
        expected_version: Option<i64>,
    ) -> Result<i64, StorageError> {
        let mut tables = self.tables.write().await;
        let next_version = match (tables.drafts.get(&record.id), expected_version) {
            (None, None) => 0,
            (Some(existing), Some(expected)) if existing.version == expected => expected + 1,
            (None, Some(_)) => {
                return Err(StorageError::DraftNotFound {
                    draft_id: record.id,
                })
            }
            (Some(_), expected) => {
                return Err(StorageError::DraftConflict {
                    draft_id: record.id,
                    expected_version: expected,
                })
            }
        };
        record.version = next_version;
        tables.drafts.insert(record.id.clone(), record);
        Ok(next_version)
    }

    async fn get_draft(&self, draft_id: &str) -> Result<DraftRecord, StorageError> {
        self.tables
            .read()
            .await
            .drafts
            .get(draft_id)
            .cloned()
            .ok_or_else(|| StorageError::DraftNotFound {
                draft_id: draft_id.to_string(),
            })
    }

    async fn delete_draft(&self, draft_id: &str) -> Result<(), StorageError> {
        self.tables
            .write()
            .await
            .drafts
            .remove(draft_id)
            .map(|_| ())
            .ok_or_else(|| StorageError::DraftNotFound {
                draft_id: draft_id.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agreement(id: &str, serial: &str) -> AgreementRecord {
        AgreementRecord {
            id: id.to_string(),
            title: "Convenio".to_string(),
            type_id: 1,
            status: "enviado".to_string(),
            serial_number: serial.to_string(),
            document_path: None,
            owner_id: "owner".to_string(),
            reviewer_id: None,
            content: serde_json::json!({}),
            version: 0,
            created_at: "2025-01-01T00:00:00.000000Z".to_string(),
            updated_at: "2025-01-01T00:00:00.000000Z".to_string(),
            approved_at: None,
        }
    }

    #[test]
    fn serial_sequence_parses_matching_year_only() {
        assert_eq!(serial_sequence("2025-007", 2025), Some(7));
        assert_eq!(serial_sequence("2025-1000", 2025), Some(1000));
        assert_eq!(serial_sequence("2024-007", 2025), None);
        assert_eq!(serial_sequence("2025-abc", 2025), None);
    }

    #[tokio::test]
    async fn staged_insert_visible_inside_snapshot_only() {
        let storage = MemoryStorage::new();
        let mut snap = storage.begin_snapshot().await.unwrap();
        storage
            .insert_agreement(&mut snap, agreement("a", "2025-001"))
            .await
            .unwrap();

        assert!(storage.get_agreement_for_update(&mut snap, "a").await.is_ok());
        assert!(matches!(
            storage.get_agreement("a").await,
            Err(StorageError::AgreementNotFound { .. })
        ));

        storage.commit_snapshot(snap).await.unwrap();
        assert!(storage.get_agreement("a").await.is_ok());
    }

    #[tokio::test]
    async fn latest_serial_sees_staged_inserts() {
        let storage = MemoryStorage::new();
        let mut snap = storage.begin_snapshot().await.unwrap();
        storage
            .insert_agreement(&mut snap, agreement("a", "2025-009"))
            .await
            .unwrap();
        let latest = storage.latest_serial_for_year(&mut snap, 2025).await.unwrap();
        assert_eq!(latest.as_deref(), Some("2025-009"));
    }

    #[tokio::test]
    async fn serial_read_blocks_other_allocators_until_commit() {
        let storage = Arc::new(MemoryStorage::new());
        let mut first = storage.begin_snapshot().await.unwrap();
        assert_eq!(
            storage.latest_serial_for_year(&mut first, 2025).await.unwrap(),
            None
        );

        let waiter = {
            let storage = storage.clone();
            tokio::spawn(async move {
                let mut second = storage.begin_snapshot().await.unwrap();
                let latest = storage.latest_serial_for_year(&mut second, 2025).await;
                storage.abort_snapshot(second).await.unwrap();
                latest
            })
        };
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        storage
            .insert_agreement(&mut first, agreement("a", "2025-001"))
            .await
            .unwrap();
        storage.commit_snapshot(first).await.unwrap();

        let latest = waiter.await.unwrap().unwrap();
        assert_eq!(latest.as_deref(), Some("2025-001"));
    }

    #[tokio::test]
    async fn dropped_snapshot_releases_serial_lock() {
        let storage = MemoryStorage::new();
        let mut first = storage.begin_snapshot().await.unwrap();
        storage.latest_serial_for_year(&mut first, 2025).await.unwrap();
        drop(first);

        let mut second = storage.begin_snapshot().await.unwrap();
        let latest = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            storage.latest_serial_for_year(&mut second, 2025),
        )
        .await;
        assert!(matches!(latest, Ok(Ok(None))));
    }

    #[tokio::test]
    async fn update_in_same_snapshot_chains_versions() {
        let storage = MemoryStorage::new();
        let mut snap = storage.begin_snapshot().await.unwrap();
        storage
            .insert_agreement(&mut snap, agreement("a", "2025-001"))
            .await
            .unwrap();
        let update = AgreementUpdate {
            status: Some("aprobado".to_string()),
            updated_at: "2025-01-02T00:00:00.000000Z".to_string(),
            ..AgreementUpdate::default()
        };
        let v1 = storage
            .update_agreement(&mut snap, "a", 0, update.clone())
            .await
            .unwrap();
        let v2 = storage
            .update_agreement(&mut snap, "a", v1, update)
            .await
            .unwrap();
        assert_eq!(v2, 2);
        storage.commit_snapshot(snap).await.unwrap();
        assert_eq!(storage.get_agreement("a").await.unwrap().version, 2);
    }
}
