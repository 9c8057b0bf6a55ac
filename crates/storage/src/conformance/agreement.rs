use std::future::Future;

use super::{make_agreement, make_observation, seed_agreement, TestResult};
use crate::{AgreementTypeRecord, ConvenioStorage, StorageError};

pub(super) async fn run_agreement_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: ConvenioStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "agreement",
        "insert_then_get_returns_record",
        insert_then_get_returns_record(factory).await,
    ));
    results.push(TestResult::from_result(
        "agreement",
        "get_nonexistent_returns_not_found",
        get_nonexistent_returns_not_found(factory).await,
    ));
    results.push(TestResult::from_result(
        "agreement",
        "duplicate_id_returns_already_exists",
        duplicate_id_returns_already_exists(factory).await,
    ));
    results.push(TestResult::from_result(
        "agreement",
        "list_by_owner_filters_and_orders",
        list_by_owner_filters_and_orders(factory).await,
    ));
    results.push(TestResult::from_result(
        "agreement",
        "list_by_owner_respects_limit",
        list_by_owner_respects_limit(factory).await,
    ));
    results.push(TestResult::from_result(
        "agreement",
        "observation_listed_for_agreement",
        observation_listed_for_agreement(factory).await,
    ));
    results.push(TestResult::from_result(
        "agreement",
        "observation_for_missing_agreement_rejected",
        observation_for_missing_agreement_rejected(factory).await,
    ));
    results.push(TestResult::from_result(
        "agreement",
        "agreement_type_upsert_and_get",
        agreement_type_upsert_and_get(factory).await,
    ));
    results.push(TestResult::from_result(
        "agreement",
        "agreement_type_missing_returns_type_not_found",
        agreement_type_missing_returns_type_not_found(factory).await,
    ));

    results
}

async fn insert_then_get_returns_record<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ConvenioStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let record = make_agreement("conv-1", "2025-001");
    seed_agreement(&storage, record.clone()).await?;

    let stored = storage
        .get_agreement("conv-1")
        .await
        .map_err(|e| format!("get: {e}"))?;
    if stored != record {
        return Err(format!("stored record differs: {stored:?}"));
    }
    Ok(())
}

async fn get_nonexistent_returns_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ConvenioStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    match storage.get_agreement("missing").await {
        Err(StorageError::AgreementNotFound { agreement_id }) if agreement_id == "missing" => {
            Ok(())
        }
        other => Err(format!("expected AgreementNotFound, got {other:?}")),
    }
}

async fn duplicate_id_returns_already_exists<S, F, Fut>(factory: &F) -> Result<(), String>
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
        .insert_agreement(&mut snap, make_agreement("conv-1", "2025-002"))
        .await;
    let _ = storage.abort_snapshot(snap).await;
    match result {
        Err(StorageError::AlreadyExists { .. }) => Ok(()),
        other => Err(format!("expected AlreadyExists, got {other:?}")),
    }
}

async fn list_by_owner_filters_and_orders<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ConvenioStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;

    let mut older = make_agreement("conv-old", "2025-001");
    older.updated_at = "2025-01-01T00:00:00.000000Z".to_string();
    let mut newer = make_agreement("conv-new", "2025-002");
    newer.updated_at = "2025-03-01T00:00:00.000000Z".to_string();
    let mut foreign = make_agreement("conv-foreign", "2025-003");
    foreign.owner_id = "owner-2".to_string();

    seed_agreement(&storage, older).await?;
    seed_agreement(&storage, newer).await?;
    seed_agreement(&storage, foreign).await?;

    let rows = storage
        .list_agreements_by_owner("owner-1", 0)
        .await
        .map_err(|e| format!("list: {e}"))?;
    let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
    if ids != ["conv-new", "conv-old"] {
        return Err(format!("unexpected order or filter: {ids:?}"));
    }
    Ok(())
}

async fn list_by_owner_respects_limit<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ConvenioStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    for i in 1..=5 {
        seed_agreement(
            &storage,
            make_agreement(&format!("conv-{i}"), &format!("2025-{i:03}")),
        )
        .await?;
    }
    let rows = storage
        .list_agreements_by_owner("owner-1", 3)
        .await
        .map_err(|e| format!("list: {e}"))?;
    if rows.len() != 3 {
        return Err(format!("expected 3 rows, got {}", rows.len()));
    }
    Ok(())
}

async fn observation_listed_for_agreement<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ConvenioStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    seed_agreement(&storage, make_agreement("conv-1", "2025-001")).await?;
    seed_agreement(&storage, make_agreement("conv-2", "2025-002")).await?;

    let mut snap = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin: {e}"))?;
    storage
        .insert_observation(&mut snap, make_observation("obs-1", "conv-1"))
        .await
        .map_err(|e| format!("insert observation: {e}"))?;
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit: {e}"))?;

    let first = storage
        .list_observations("conv-1")
        .await
        .map_err(|e| format!("list: {e}"))?;
    let second = storage
        .list_observations("conv-2")
        .await
        .map_err(|e| format!("list: {e}"))?;
    if first.len() != 1 || first[0].resolved || !second.is_empty() {
        return Err(format!("unexpected observations: {first:?} / {second:?}"));
    }
    Ok(())
}

async fn observation_for_missing_agreement_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
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
        .insert_observation(&mut snap, make_observation("obs-1", "missing"))
        .await;
    let _ = storage.abort_snapshot(snap).await;
    match result {
        Err(StorageError::AgreementNotFound { .. }) => Ok(()),
        other => Err(format!("expected AgreementNotFound, got {other:?}")),
    }
}

async fn agreement_type_upsert_and_get<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ConvenioStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let mut record = AgreementTypeRecord {
        id: 2,
        name: "Convenio Marco".to_string(),
        template: "Entre {{entidad}} y la Universidad".to_string(),
    };
    storage
        .upsert_agreement_type(record.clone())
        .await
        .map_err(|e| format!("upsert: {e}"))?;
    record.name = "Convenio Marco (v2)".to_string();
    storage
        .upsert_agreement_type(record.clone())
        .await
        .map_err(|e| format!("upsert again: {e}"))?;

    let stored = storage
        .get_agreement_type(2)
        .await
        .map_err(|e| format!("get: {e}"))?;
    let all = storage
        .list_agreement_types()
        .await
        .map_err(|e| format!("list: {e}"))?;
    if stored != record || all.len() != 1 {
        return Err(format!("unexpected catalog: {stored:?} / {all:?}"));
    }
    Ok(())
}

async fn agreement_type_missing_returns_type_not_found<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: ConvenioStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    match storage.get_agreement_type(99).await {
        Err(StorageError::TypeNotFound { type_id: 99 }) => Ok(()),
        other => Err(format!("expected TypeNotFound, got {other:?}")),
    }
}
