use std::future::Future;

use super::TestResult;
use crate::{ConvenioStorage, DraftRecord, StorageError};

pub(super) async fn run_draft_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: ConvenioStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "draft",
        "create_then_get_at_version_zero",
        create_then_get_at_version_zero(factory).await,
    ));
    results.push(TestResult::from_result(
        "draft",
        "versioned_save_increments",
        versioned_save_increments(factory).await,
    ));
    results.push(TestResult::from_result(
        "draft",
        "stale_save_returns_conflict",
        stale_save_returns_conflict(factory).await,
    ));
    results.push(TestResult::from_result(
        "draft",
        "delete_removes_draft",
        delete_removes_draft(factory).await,
    ));

    results
}

fn make_draft(id: &str) -> DraftRecord {
    DraftRecord {
        id: id.to_string(),
        owner_id: "owner-1".to_string(),
        payload: serde_json::json!({"title": "Convenio Marco"}),
        version: 0,
        updated_at: "2025-01-01T00:00:00.000000Z".to_string(),
    }
}

async fn create_then_get_at_version_zero<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ConvenioStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let version = storage
        .save_draft(make_draft("d-1"), None)
        .await
        .map_err(|e| format!("save: {e}"))?;
    let stored = storage
        .get_draft("d-1")
        .await
        .map_err(|e| format!("get: {e}"))?;
    if version != 0 || stored.version != 0 || stored.payload != make_draft("d-1").payload {
        return Err(format!("unexpected draft: {stored:?} (version {version})"));
    }
    Ok(())
}

async fn versioned_save_increments<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ConvenioStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    storage
        .save_draft(make_draft("d-1"), None)
        .await
        .map_err(|e| format!("create: {e}"))?;
    let mut next = make_draft("d-1");
    next.payload = serde_json::json!({"title": "Convenio Específico"});
    let version = storage
        .save_draft(next.clone(), Some(0))
        .await
        .map_err(|e| format!("save: {e}"))?;
    let stored = storage
        .get_draft("d-1")
        .await
        .map_err(|e| format!("get: {e}"))?;
    if version != 1 || stored.version != 1 || stored.payload != next.payload {
        return Err(format!("unexpected draft after save: {stored:?}"));
    }
    Ok(())
}

async fn stale_save_returns_conflict<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ConvenioStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    storage
        .save_draft(make_draft("d-1"), None)
        .await
        .map_err(|e| format!("create: {e}"))?;
    storage
        .save_draft(make_draft("d-1"), Some(0))
        .await
        .map_err(|e| format!("first save: {e}"))?;

    match storage.save_draft(make_draft("d-1"), Some(0)).await {
        Err(StorageError::DraftConflict { .. }) => {}
        other => return Err(format!("expected DraftConflict for stale save, got {other:?}")),
    }
    match storage.save_draft(make_draft("d-1"), None).await {
        Err(StorageError::DraftConflict {
            expected_version: None,
            ..
        }) => Ok(()),
        other => Err(format!("expected DraftConflict for re-create, got {other:?}")),
    }
}

async fn delete_removes_draft<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ConvenioStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    storage
        .save_draft(make_draft("d-1"), None)
        .await
        .map_err(|e| format!("create: {e}"))?;
    storage
        .delete_draft("d-1")
        .await
        .map_err(|e| format!("delete: {e}"))?;
    match storage.get_draft("d-1").await {
        Err(StorageError::DraftNotFound { .. }) => {}
        other => return Err(format!("expected DraftNotFound, got {other:?}")),
    }
    match storage.delete_draft("d-1").await {
        Err(StorageError::DraftNotFound { .. }) => Ok(()),
        other => Err(format!("expected DraftNotFound on second delete, got {other:?}")),
    }
}
