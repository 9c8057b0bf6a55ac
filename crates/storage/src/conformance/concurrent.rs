use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::{make_agreement, make_status_update, seed_agreement, TestResult};
use crate::{ConvenioStorage, StorageError};

/// Number of concurrent tasks to spawn in each test.
const N: usize = 32;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: ConvenioStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_serial_allocation_never_duplicates",
        concurrent_serial_allocation_never_duplicates(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "serial_read_waits_for_holder",
        serial_read_waits_for_holder(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_reviews_exactly_one_wins",
        concurrent_reviews_exactly_one_wins(factory).await,
    ));

    results
}

/// Read-then-insert allocation with retry on `SerialConflict`, as the
/// workflow does it.
async fn allocate_and_insert<S: ConvenioStorage>(
    storage: &S,
    agreement_id: &str,
) -> Result<String, StorageError> {
    loop {
        let mut snap = storage.begin_snapshot().await?;
        let next = storage
            .latest_serial_for_year(&mut snap, 2025)
            .await?
            .and_then(|s| s.strip_prefix("2025-").and_then(|n| n.parse::<u32>().ok()))
            .unwrap_or(0)
            + 1;
        let serial = format!("2025-{next:03}");

        let staged = storage
            .insert_agreement(&mut snap, make_agreement(agreement_id, &serial))
            .await;
        let committed = match staged {
            Ok(()) => storage.commit_snapshot(snap).await,
            Err(e) => {
                let _ = storage.abort_snapshot(snap).await;
                Err(e)
            }
        };
        match committed {
            Ok(()) => return Ok(serial),
            Err(StorageError::SerialConflict { .. }) => continue,
            Err(e) => return Err(e),
        }
    }
}

/// N tasks allocate serials for the same year at once. Every task must end
/// up with a distinct serial and together they cover 001..=N.
async fn concurrent_serial_allocation_never_duplicates<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: ConvenioStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            allocate_and_insert(s.as_ref(), &format!("conv-{i}")).await
        }));
    }

    let mut serials = BTreeSet::new();
    for handle in handles {
        let serial = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e| format!("storage error: {e}"))?;
        if !serials.insert(serial.clone()) {
            return Err(format!("serial {serial} allocated twice"));
        }
    }

    let expected: BTreeSet<String> = (1..=N).map(|n| format!("2025-{n:03}")).collect();
    if serials != expected {
        return Err(format!("expected {expected:?}, got {serials:?}"));
    }
    Ok(())
}

/// A snapshot that has read the latest serial holds allocation until it
/// commits; a second reader waits and then sees the committed serial.
async fn serial_read_waits_for_holder<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ConvenioStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    let mut holder = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin holder: {e}"))?;
    storage
        .latest_serial_for_year(&mut holder, 2025)
        .await
        .map_err(|e| format!("latest holder: {e}"))?;

    let s = storage.clone();
    let waiter = tokio::spawn(async move {
        let mut snap = s.begin_snapshot().await?;
        let latest = s.latest_serial_for_year(&mut snap, 2025).await;
        let _ = s.abort_snapshot(snap).await;
        latest
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    if waiter.is_finished() {
        return Err("second reader did not wait for the serial holder".to_string());
    }

    storage
        .insert_agreement(&mut holder, make_agreement("held", "2025-001"))
        .await
        .map_err(|e| format!("insert holder: {e}"))?;
    storage
        .commit_snapshot(holder)
        .await
        .map_err(|e| format!("commit holder: {e}"))?;

    let latest = tokio::time::timeout(Duration::from_secs(5), waiter)
        .await
        .map_err(|_| "second reader never resumed".to_string())?
        .map_err(|e| format!("task panic: {e}"))?
        .map_err(|e| format!("latest waiter: {e}"))?;
    if latest.as_deref() != Some("2025-001") {
        return Err(format!("waiter expected 2025-001, got {latest:?}"));
    }
    Ok(())
}

/// N reviewers transition the same agreement from version 0. Exactly one
/// commit succeeds; the rest must get ConcurrentConflict.
async fn concurrent_reviews_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ConvenioStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    seed_agreement(storage.as_ref(), make_agreement("conv-1", "2025-001")).await?;

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            let status = if i % 2 == 0 { "aprobado" } else { "rechazado" };
            let mut snap = s.begin_snapshot().await?;
            let staged = s
                .update_agreement(
                    &mut snap,
                    "conv-1",
                    0,
                    make_status_update(status, "2025-01-02T00:00:00.000000Z"),
                )
                .await;
            let committed = match staged {
                Ok(_) => s.commit_snapshot(snap).await,
                Err(e) => {
                    let _ = s.abort_snapshot(snap).await;
                    Err(e)
                }
            };
            match committed {
                Ok(()) => Ok(true),
                Err(StorageError::ConcurrentConflict { .. }) => Ok(false),
                Err(e) => Err(e),
            }
        }));
    }

    let mut winners = 0usize;
    let mut losers = 0usize;
    for handle in handles {
        let won = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
        if won {
            winners += 1;
        } else {
            losers += 1;
        }
    }

    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {winners}"));
    }
    if losers != N - 1 {
        return Err(format!("expected {} losers, got {losers}", N - 1));
    }

    let record = storage
        .get_agreement("conv-1")
        .await
        .map_err(|e| format!("get: {e}"))?;
    if record.version != 1 {
        return Err(format!("expected version 1, got {}", record.version));
    }
    Ok(())
}
