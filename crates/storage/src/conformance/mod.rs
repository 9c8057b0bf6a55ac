//! Conformance test suite for `ConvenioStorage` implementations.
//!
//! This module provides a backend-agnostic test suite that any
//! `ConvenioStorage` implementation can run to verify correctness. The suite
//! covers:
//!
//! - **Agreements**: insert, read, duplicate detection, owner listing order
//! - **Serials**: uniqueness, year scoping, numeric ordering past 999
//! - **Version validation / OCC**: optimistic concurrency conflict detection
//! - **Snapshots**: abort discards, commit is all-or-nothing
//! - **Activity**: newest-first listing, limits, referential integrity
//! - **Drafts**: create, versioned save, delete
//! - **Concurrency**: racing serial allocation and racing reviews
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh, empty storage instance for each test:
//!
//! ```ignore
//! use convenios_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn postgres_conformance() {
//!     let report = run_conformance_suite(|| async {
//!         create_test_postgres_storage().await
//!     }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod activity;
mod agreement;
mod concurrent;
mod draft;
mod serial;
mod snapshot;
mod version;

use std::fmt;
use std::future::Future;

use crate::record::{ActivityRecord, AgreementRecord, AgreementUpdate, ObservationRecord};
use crate::ConvenioStorage;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "agreement", "serial", "version").
    pub category: String,
    /// Test name (e.g. "insert_then_get_returns_record").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn pass(category: &str, name: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(category: &str, name: &str, msg: String) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: false,
            message: Some(msg),
        }
    }

    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::pass(category, name),
            Err(msg) => Self::fail(category, name, msg),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a storage backend.
///
/// The `factory` function is called once per test to create a fresh, empty
/// storage instance, ensuring test isolation.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: ConvenioStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(agreement::run_agreement_tests(&factory).await);
    results.extend(serial::run_serial_tests(&factory).await);
    results.extend(version::run_version_tests(&factory).await);
    results.extend(snapshot::run_snapshot_tests(&factory).await);
    results.extend(activity::run_activity_tests(&factory).await);
    results.extend(draft::run_draft_tests(&factory).await);
    results.extend(concurrent::run_concurrent_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers: record constructors with sensible defaults ──────────────────────

fn make_agreement(id: &str, serial_number: &str) -> AgreementRecord {
    AgreementRecord {
        id: id.to_string(),
        title: format!("Convenio {id}"),
        type_id: 1,
        status: "enviado".to_string(),
        serial_number: serial_number.to_string(),
        document_path: None,
        owner_id: "owner-1".to_string(),
        reviewer_id: None,
        content: serde_json::json!({"entidad": "Universidad"}),
        version: 0,
        created_at: "2025-01-01T00:00:00.000000Z".to_string(),
        updated_at: "2025-01-01T00:00:00.000000Z".to_string(),
        approved_at: None,
    }
}

fn make_status_update(status: &str, updated_at: &str) -> AgreementUpdate {
    AgreementUpdate {
        status: Some(status.to_string()),
        reviewer_id: Some("admin-1".to_string()),
        updated_at: updated_at.to_string(),
        ..AgreementUpdate::default()
    }
}

fn make_activity(id: &str, agreement_id: &str, action: &str, created_at: &str) -> ActivityRecord {
    ActivityRecord {
        id: id.to_string(),
        agreement_id: agreement_id.to_string(),
        actor_id: "admin-1".to_string(),
        action: action.to_string(),
        status_from: Some("enviado".to_string()),
        status_to: Some("aprobado".to_string()),
        metadata: serde_json::json!({}),
        ip_address: "127.0.0.1".to_string(),
        created_at: created_at.to_string(),
    }
}

fn make_observation(id: &str, agreement_id: &str) -> ObservationRecord {
    ObservationRecord {
        id: id.to_string(),
        agreement_id: agreement_id.to_string(),
        author_id: "admin-1".to_string(),
        content: "Falta la firma del representante".to_string(),
        resolved: false,
        created_at: "2025-01-02T00:00:00.000000Z".to_string(),
    }
}

/// Insert and commit one agreement in its own snapshot.
async fn seed_agreement<S: ConvenioStorage>(
    storage: &S,
    record: AgreementRecord,
) -> Result<(), String> {
    let mut snap = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin: {e}"))?;
    storage
        .insert_agreement(&mut snap, record)
        .await
        .map_err(|e| format!("insert: {e}"))?;
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit: {e}"))
}
