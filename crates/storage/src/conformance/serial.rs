use std::future::Future;

use super::{make_agreement, seed_agreement, TestResult};
use crate::{ConvenioStorage, StorageError};

pub(super) async fn run_serial_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: ConvenioStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "serial",
        "latest_serial_none_for_empty_year",
        latest_serial_none_for_empty_year(factory).await,
    ));
    results.push(TestResult::from_result(
        "serial",
        "latest_serial_scoped_to_year",
        latest_serial_scoped_to_year(factory).await,
    ));
    results.push(TestResult::from_result(
        "serial",
        "latest_serial_compares_numerically",
        latest_serial_compares_numerically(factory).await,
    ));
    results.push(TestResult::from_result(
        "serial",
        "duplicate_serial_rejected_on_insert",
        duplicate_serial_rejected_on_insert(factory).await,
    ));
    results.push(TestResult::from_result(
        "serial",
        "duplicate_serial_rejected_at_commit",
        duplicate_serial_rejected_at_commit(factory).await,
    ));

    results
}

async fn latest_serial_none_for_empty_year<S, F, Fut>(factory: &F) -> Result<(), String>
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
    let latest = storage
        .latest_serial_for_year(&mut snap, 2025)
        .await
        .map_err(|e| format!("latest: {e}"))?;
    let _ = storage.abort_snapshot(snap).await;
    if latest.is_some() {
        return Err(format!("expected no serial, got {latest:?}"));
    }
    Ok(())
}

async fn latest_serial_scoped_to_year<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ConvenioStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    seed_agreement(&storage, make_agreement("a", "2024-050")).await?;
    seed_agreement(&storage, make_agreement("b", "2025-002")).await?;
    seed_agreement(&storage, make_agreement("c", "2025-001")).await?;

    let mut snap = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin: {e}"))?;
    let latest = storage
        .latest_serial_for_year(&mut snap, 2025)
        .await
        .map_err(|e| format!("latest: {e}"))?;
    let previous = storage
        .latest_serial_for_year(&mut snap, 2024)
        .await
        .map_err(|e| format!("latest 2024: {e}"))?;
    let _ = storage.abort_snapshot(snap).await;

    if latest.as_deref() != Some("2025-002") || previous.as_deref() != Some("2024-050") {
        return Err(format!("unexpected serials: {latest:?} / {previous:?}"));
    }
    Ok(())
}

/// `2025-1000` sorts before `2025-999` as a string; the store must compare
/// the numeric suffix.
async fn latest_serial_compares_numerically<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ConvenioStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    seed_agreement(&storage, make_agreement("a", "2025-999")).await?;
    seed_agreement(&storage, make_agreement("b", "2025-1000")).await?;

    let mut snap = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin: {e}"))?;
    let latest = storage
        .latest_serial_for_year(&mut snap, 2025)
        .await
        .map_err(|e| format!("latest: {e}"))?;
    let _ = storage.abort_snapshot(snap).await;
    if latest.as_deref() != Some("2025-1000") {
        return Err(format!("expected 2025-1000, got {latest:?}"));
    }
    Ok(())
}

async fn duplicate_serial_rejected_on_insert<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ConvenioStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    seed_agreement(&storage, make_agreement("a", "2025-001")).await?;

    let mut snap = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin: {e}"))?;
    let result = storage
        .insert_agreement(&mut snap, make_agreement("b", "2025-001"))
        .await;
    let _ = storage.abort_snapshot(snap).await;
    match result {
        Err(StorageError::SerialConflict { serial_number }) if serial_number == "2025-001" => {
            Ok(())
        }
        other => Err(format!("expected SerialConflict, got {other:?}")),
    }
}

/// Two snapshots stage the same serial; only the first commit lands.
async fn duplicate_serial_rejected_at_commit<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ConvenioStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;

    let mut first = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin first: {e}"))?;
    let mut second = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin second: {e}"))?;
    storage
        .insert_agreement(&mut first, make_agreement("a", "2025-001"))
        .await
        .map_err(|e| format!("insert first: {e}"))?;
    let staged = storage
        .insert_agreement(&mut second, make_agreement("b", "2025-001"))
        .await;

    storage
        .commit_snapshot(first)
        .await
        .map_err(|e| format!("commit first: {e}"))?;
    match staged {
        Ok(()) => match storage.commit_snapshot(second).await {
            Err(StorageError::SerialConflict { .. }) => {}
            other => return Err(format!("expected SerialConflict at commit, got {other:?}")),
        },
        Err(StorageError::SerialConflict { .. }) => {
            let _ = storage.abort_snapshot(second).await;
        }
        Err(e) => return Err(format!("insert second: {e}")),
    }

    match storage.get_agreement("b").await {
        Err(StorageError::AgreementNotFound { .. }) => Ok(()),
        other => Err(format!("losing insert must not be visible, got {other:?}")),
    }
}
