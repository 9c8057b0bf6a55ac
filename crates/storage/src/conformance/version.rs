use std::future::Future;

use super::{make_agreement, make_status_update, seed_agreement, TestResult};
use crate::{ConvenioStorage, StorageError};

pub(super) async fn run_version_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: ConvenioStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "version",
        "version_starts_at_zero",
        version_starts_at_zero(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "update_with_correct_version_increments",
        update_with_correct_version_increments(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "update_applies_columns",
        update_applies_columns(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "update_with_wrong_version_returns_conflict",
        update_with_wrong_version_returns_conflict(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "stale_version_after_intervening_commit",
        stale_version_after_intervening_commit(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "update_nonexistent_returns_not_found",
        update_nonexistent_returns_not_found(factory).await,
    ));

    results
}

async fn version_starts_at_zero<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ConvenioStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    seed_agreement(&storage, make_agreement("conv-1", "2025-001")).await?;
    let record = storage
        .get_agreement("conv-1")
        .await
        .map_err(|e| format!("get: {e}"))?;
    if record.version != 0 {
        return Err(format!("expected version 0, got {}", record.version));
    }
    Ok(())
}

async fn update_with_correct_version_increments<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ConvenioStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    seed_agreement(&storage, make_agreement("conv-1", "2025-001")).await?;

    for expected in 0..3 {
        let mut snap = storage
            .begin_snapshot()
            .await
            .map_err(|e| format!("begin: {e}"))?;
        let new_version = storage
            .update_agreement(
                &mut snap,
                "conv-1",
                expected,
                make_status_update("revision", "2025-01-02T00:00:00.000000Z"),
            )
            .await
            .map_err(|e| format!("update from {expected}: {e}"))?;
        if new_version != expected + 1 {
            return Err(format!(
                "expected new version {}, got {new_version}",
                expected + 1
            ));
        }
        storage
            .commit_snapshot(snap)
            .await
            .map_err(|e| format!("commit: {e}"))?;
    }

    let record = storage
        .get_agreement("conv-1")
        .await
        .map_err(|e| format!("get: {e}"))?;
    if record.version != 3 {
        return Err(format!("expected version 3, got {}", record.version));
    }
    Ok(())
}

async fn update_applies_columns<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ConvenioStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let mut record = make_agreement("conv-1", "2025-001");
    record.document_path = Some("documents/d/file-1/doc.txt".to_string());
    seed_agreement(&storage, record).await?;

    let mut update = make_status_update("aprobado", "2025-02-01T00:00:00.000000Z");
    update.approved_at = Some("2025-02-01T00:00:00.000000Z".to_string());
    update.document_path = Some(None);

    let mut snap = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin: {e}"))?;
    storage
        .update_agreement(&mut snap, "conv-1", 0, update)
        .await
        .map_err(|e| format!("update: {e}"))?;
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit: {e}"))?;

    let stored = storage
        .get_agreement("conv-1")
        .await
        .map_err(|e| format!("get: {e}"))?;
    if stored.status != "aprobado"
        || stored.reviewer_id.as_deref() != Some("admin-1")
        || stored.approved_at.is_none()
        || stored.document_path.is_some()
        || stored.updated_at != "2025-02-01T00:00:00.000000Z"
        || stored.title != "Convenio conv-1"
    {
        return Err(format!("update not applied as expected: {stored:?}"));
    }
    Ok(())
}

async fn update_with_wrong_version_returns_conflict<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ConvenioStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    seed_agreement(&storage, make_agreement("conv-1", "2025-001")).await?;

    let mut snap = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin: {e}"))?;
    let result = storage
        .update_agreement(
            &mut snap,
            "conv-1",
            5,
            make_status_update("aprobado", "2025-01-02T00:00:00.000000Z"),
        )
        .await;
    let _ = storage.abort_snapshot(snap).await;
    match result {
        Err(StorageError::ConcurrentConflict {
            agreement_id,
            expected_version: 5,
        }) if agreement_id == "conv-1" => Ok(()),
        other => Err(format!("expected ConcurrentConflict, got {other:?}")),
    }
}

/// Two snapshots read version 0; after the first commits, the second must
/// not be able to commit its update.
async fn stale_version_after_intervening_commit<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ConvenioStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    seed_agreement(&storage, make_agreement("conv-1", "2025-001")).await?;

    let mut first = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin first: {e}"))?;
    storage
        .update_agreement(
            &mut first,
            "conv-1",
            0,
            make_status_update("aprobado", "2025-01-02T00:00:00.000000Z"),
        )
        .await
        .map_err(|e| format!("update first: {e}"))?;
    storage
        .commit_snapshot(first)
        .await
        .map_err(|e| format!("commit first: {e}"))?;

    let mut second = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin second: {e}"))?;
    let result = storage
        .update_agreement(
            &mut second,
            "conv-1",
            0,
            make_status_update("rechazado", "2025-01-03T00:00:00.000000Z"),
        )
        .await;
    let _ = storage.abort_snapshot(second).await;
    if !matches!(result, Err(StorageError::ConcurrentConflict { .. })) {
        return Err(format!("expected ConcurrentConflict, got {result:?}"));
    }

    let stored = storage
        .get_agreement("conv-1")
        .await
        .map_err(|e| format!("get: {e}"))?;
    if stored.status != "aprobado" {
        return Err(format!("stale update leaked: {}", stored.status));
    }
    Ok(())
}

async fn update_nonexistent_returns_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ConvenioStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let mut snap = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin: {e}"))?;
    let result = storage
        .update_agreement(
            &mut snap,
            "missing",
            0,
            make_status_update("aprobado", "2025-01-02T00:00:00.000000Z"),
        )
        .await;
    let _ = storage.abort_snapshot(snap).await;
    match result {
        Err(StorageError::AgreementNotFound { .. }) => Ok(()),
        other => Err(format!("expected AgreementNotFound, got {other:?}")),
    }
}
