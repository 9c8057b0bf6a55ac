use std::future::Future;

use super::{make_activity, make_agreement, seed_agreement, TestResult};
use crate::{ConvenioStorage, StorageError};

pub(super) async fn run_activity_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: ConvenioStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "activity",
        "activity_listed_newest_first",
        activity_listed_newest_first(factory).await,
    ));
    results.push(TestResult::from_result(
        "activity",
        "activity_respects_limit",
        activity_respects_limit(factory).await,
    ));
    results.push(TestResult::from_result(
        "activity",
        "activity_fields_preserved",
        activity_fields_preserved(factory).await,
    ));
    results.push(TestResult::from_result(
        "activity",
        "activity_for_missing_agreement_rejected",
        activity_for_missing_agreement_rejected(factory).await,
    ));

    results
}

async fn append<S: ConvenioStorage>(
    storage: &S,
    id: &str,
    action: &str,
    created_at: &str,
) -> Result<(), String> {
    let mut snap = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin: {e}"))?;
    storage
        .insert_activity(&mut snap, make_activity(id, "conv-1", action, created_at))
        .await
        .map_err(|e| format!("insert {id}: {e}"))?;
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit {id}: {e}"))
}

async fn activity_listed_newest_first<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ConvenioStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    seed_agreement(&storage, make_agreement("conv-1", "2025-001")).await?;
    append(&storage, "act-1", "create", "2025-01-01T00:00:00.000000Z").await?;
    append(&storage, "act-2", "correct", "2025-01-02T00:00:00.000000Z").await?;
    append(&storage, "act-3", "approve", "2025-01-03T00:00:00.000000Z").await?;

    let rows = storage
        .list_activity(0)
        .await
        .map_err(|e| format!("list: {e}"))?;
    let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
    if ids != ["act-3", "act-2", "act-1"] {
        return Err(format!("unexpected order: {ids:?}"));
    }
    Ok(())
}

async fn activity_respects_limit<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ConvenioStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    seed_agreement(&storage, make_agreement("conv-1", "2025-001")).await?;
    for i in 1..=4 {
        append(
            &storage,
            &format!("act-{i}"),
            "update",
            &format!("2025-01-0{i}T00:00:00.000000Z"),
        )
        .await?;
    }
    let rows = storage
        .list_activity(2)
        .await
        .map_err(|e| format!("list: {e}"))?;
    let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
    if ids != ["act-4", "act-3"] {
        return Err(format!("expected the two newest entries, got {ids:?}"));
    }
    Ok(())
}

async fn activity_fields_preserved<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ConvenioStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    seed_agreement(&storage, make_agreement("conv-1", "2025-001")).await?;
    let mut record = make_activity("act-1", "conv-1", "create", "2025-01-01T00:00:00.000000Z");
    record.status_from = None;
    record.status_to = Some("enviado".to_string());
    record.metadata = serde_json::json!({"title": "Convenio", "type": 2});
    record.ip_address = "10.0.0.7".to_string();

    let mut snap = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin: {e}"))?;
    storage
        .insert_activity(&mut snap, record.clone())
        .await
        .map_err(|e| format!("insert: {e}"))?;
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit: {e}"))?;

    let rows = storage
        .list_activity(0)
        .await
        .map_err(|e| format!("list: {e}"))?;
    if rows != vec![record] {
        return Err(format!("activity not preserved: {rows:?}"));
    }
    Ok(())
}

async fn activity_for_missing_agreement_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
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
        .insert_activity(
            &mut snap,
            make_activity("act-1", "missing", "create", "2025-01-01T00:00:00.000000Z"),
        )
        .await;
    let _ = storage.abort_snapshot(snap).await;
    match result {
        Err(StorageError::AgreementNotFound { .. }) => Ok(()),
        other => Err(format!("expected AgreementNotFound, got {other:?}")),
    }
}
