use std::future::Future;

use super::{
    make_activity, make_agreement, make_observation, make_status_update, seed_agreement,
    TestResult,
};
use crate::{ConvenioStorage, StorageError};

pub(super) async fn run_snapshot_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: ConvenioStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "snapshot",
        "abort_discards_all_writes",
        abort_discards_all_writes(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "commit_applies_all_writes",
        commit_applies_all_writes(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "failed_commit_applies_nothing",
        failed_commit_applies_nothing(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "read_for_update_sees_own_writes",
        read_for_update_sees_own_writes(factory).await,
    ));

    results
}

async fn abort_discards_all_writes<S, F, Fut>(factory: &F) -> Result<(), String>
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
    storage
        .insert_agreement(&mut snap, make_agreement("conv-1", "2025-001"))
        .await
        .map_err(|e| format!("insert: {e}"))?;
    storage
        .insert_activity(
            &mut snap,
            make_activity("act-1", "conv-1", "create", "2025-01-01T00:00:00.000000Z"),
        )
        .await
        .map_err(|e| format!("activity: {e}"))?;
    storage
        .abort_snapshot(snap)
        .await
        .map_err(|e| format!("abort: {e}"))?;

    if storage.get_agreement("conv-1").await.is_ok() {
        return Err("aborted agreement is visible".to_string());
    }
    let activity = storage
        .list_activity(0)
        .await
        .map_err(|e| format!("list: {e}"))?;
    if !activity.is_empty() {
        return Err(format!("aborted activity is visible: {activity:?}"));
    }
    Ok(())
}

async fn commit_applies_all_writes<S, F, Fut>(factory: &F) -> Result<(), String>
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
    storage
        .update_agreement(
            &mut snap,
            "conv-1",
            0,
            make_status_update("enviado", "2025-01-02T00:00:00.000000Z"),
        )
        .await
        .map_err(|e| format!("update: {e}"))?;
    storage
        .insert_observation(&mut snap, make_observation("obs-1", "conv-1"))
        .await
        .map_err(|e| format!("observation: {e}"))?;
    storage
        .insert_activity(
            &mut snap,
            make_activity("act-1", "conv-1", "correct", "2025-01-02T00:00:00.000000Z"),
        )
        .await
        .map_err(|e| format!("activity: {e}"))?;
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit: {e}"))?;

    let record = storage
        .get_agreement("conv-1")
        .await
        .map_err(|e| format!("get: {e}"))?;
    let observations = storage
        .list_observations("conv-1")
        .await
        .map_err(|e| format!("observations: {e}"))?;
    let activity = storage
        .list_activity(0)
        .await
        .map_err(|e| format!("activity: {e}"))?;
    if record.version != 1 || observations.len() != 1 || activity.len() != 1 {
        return Err(format!(
            "expected all writes applied: version {}, {} observations, {} activity",
            record.version,
            observations.len(),
            activity.len()
        ));
    }
    Ok(())
}

/// A snapshot whose update goes stale must not leak its other writes.
async fn failed_commit_applies_nothing<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ConvenioStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    seed_agreement(&storage, make_agreement("conv-1", "2025-001")).await?;

    let mut loser = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin loser: {e}"))?;
    storage
        .insert_activity(
            &mut loser,
            make_activity("act-loser", "conv-1", "reject", "2025-01-02T00:00:00.000000Z"),
        )
        .await
        .map_err(|e| format!("loser activity: {e}"))?;
    storage
        .update_agreement(
            &mut loser,
            "conv-1",
            0,
            make_status_update("rechazado", "2025-01-02T00:00:00.000000Z"),
        )
        .await
        .map_err(|e| format!("loser update: {e}"))?;

    let mut winner = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin winner: {e}"))?;
    storage
        .update_agreement(
            &mut winner,
            "conv-1",
            0,
            make_status_update("aprobado", "2025-01-02T00:00:01.000000Z"),
        )
        .await
        .map_err(|e| format!("winner update: {e}"))?;
    storage
        .commit_snapshot(winner)
        .await
        .map_err(|e| format!("winner commit: {e}"))?;

    match storage.commit_snapshot(loser).await {
        Err(StorageError::ConcurrentConflict { .. }) => {}
        other => return Err(format!("expected ConcurrentConflict, got {other:?}")),
    }

    let activity = storage
        .list_activity(0)
        .await
        .map_err(|e| format!("list: {e}"))?;
    if activity.iter().any(|a| a.id == "act-loser") {
        return Err("activity from failed commit is visible".to_string());
    }
    Ok(())
}

async fn read_for_update_sees_own_writes<S, F, Fut>(factory: &F) -> Result<(), String>
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
    storage
        .update_agreement(
            &mut snap,
            "conv-1",
            0,
            make_status_update("aprobado", "2025-01-02T00:00:00.000000Z"),
        )
        .await
        .map_err(|e| format!("update: {e}"))?;
    let seen = storage
        .get_agreement_for_update(&mut snap, "conv-1")
        .await
        .map_err(|e| format!("read: {e}"))?;
    let _ = storage.abort_snapshot(snap).await;

    if seen.status != "aprobado" || seen.version != 1 {
        return Err(format!("snapshot read missed own write: {seen:?}"));
    }
    Ok(())
}
