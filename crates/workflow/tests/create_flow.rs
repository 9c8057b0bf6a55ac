mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::{harness, request, OWNER};
use convenios_storage::ConvenioStorage;
use convenios_workflow::documents::file_id_from_location;
use convenios_workflow::identity::hash_token;
use convenios_workflow::ports::Folder;
use convenios_workflow::serial::SerialNumber;
use convenios_workflow::{AgreementStatus, CreateAgreement, WorkflowError};
use time::macros::datetime;

#[tokio::test]
async fn create_assigns_serial_and_stores_document() {
    let h = harness().await;
    let outcome = h
        .workflow
        .create_agreement(OWNER, request("Practicas ACME"), "10.0.0.7")
        .await
        .unwrap();
    assert!(outcome.warnings.is_empty());

    let agreement = outcome.value;
    assert_eq!(agreement.serial_number, "2025-001");
    assert_eq!(agreement.status, AgreementStatus::Enviado);
    assert_eq!(agreement.owner_id, "owner-1");
    assert!(agreement.reviewer_id.is_none());

    let location = agreement.document_path.clone().unwrap();
    assert!(location.ends_with("/Convenio_Practicas_ACME_2025-05-20.txt"));
    let file_id = file_id_from_location(&location).unwrap();
    assert_eq!(h.documents.inner.locate(file_id).await, Some(Folder::Pending));

    let file = h
        .dir
        .path()
        .join("pending")
        .join(file_id)
        .join("Convenio_Practicas_ACME_2025-05-20.txt");
    let text = std::fs::read_to_string(file).unwrap();
    assert!(text.starts_with("Practicas ACME"));
    assert!(text.contains("Entity: ACME S.A."));

    let stored = h.storage.get_agreement(&agreement.id).await.unwrap();
    assert_eq!(stored.document_path.as_deref(), Some(location.as_str()));

    let activity = h.storage.list_activity(0).await.unwrap();
    assert_eq!(activity.len(), 1);
    assert_eq!(activity[0].action, "create");
    assert_eq!(activity[0].status_from, None);
    assert_eq!(activity[0].status_to.as_deref(), Some("enviado"));
    assert_eq!(activity[0].ip_address, "10.0.0.7");
    assert_eq!(activity[0].metadata["title"], "Practicas ACME");
    assert_eq!(activity[0].metadata["type_id"], 1);
    assert_eq!(activity[0].metadata["document_sha256"], hash_token(&text));
}

#[tokio::test]
async fn nth_agreement_of_the_year_gets_nth_serial() {
    let h = harness().await;
    for n in 1..=12 {
        let agreement = h
            .workflow
            .create_agreement(OWNER, request(&format!("Agreement {}", n)), "unknown")
            .await
            .unwrap()
            .value;
        assert_eq!(agreement.serial_number, format!("2025-{:03}", n));
    }
}

#[tokio::test]
async fn serial_restarts_in_a_new_year() {
    let h = harness().await;
    h.workflow
        .create_agreement(OWNER, request("Old"), "unknown")
        .await
        .unwrap();
    h.workflow
        .create_agreement(OWNER, request("Old 2"), "unknown")
        .await
        .unwrap();

    h.set_now(datetime!(2026-01-02 08:00:00 UTC));
    let agreement = h
        .workflow
        .create_agreement(OWNER, request("New"), "unknown")
        .await
        .unwrap()
        .value;
    assert_eq!(agreement.serial_number, "2026-001");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_creations_never_share_a_serial() {
    const CREATORS: usize = 64;
    let h = Arc::new(harness().await);
    let mut handles = Vec::new();
    for n in 0..CREATORS {
        let h = h.clone();
        handles.push(tokio::spawn(async move {
            h.workflow
                .create_agreement(OWNER, request(&format!("Race {}", n)), "unknown")
                .await
                .map(|o| o.value.serial_number)
        }));
    }
    let mut serials = Vec::new();
    for handle in handles {
        serials.push(handle.await.unwrap().expect("every creator succeeds"));
    }
    serials.sort_by_key(|s| s.parse::<SerialNumber>().unwrap());
    serials.dedup();
    assert_eq!(serials.len(), CREATORS);
    assert_eq!(serials.first().map(String::as_str), Some("2025-001"));
    assert_eq!(serials.last().map(String::as_str), Some("2025-064"));
}

#[tokio::test]
async fn missing_session_is_unauthenticated() {
    let h = harness().await;
    let err = h
        .workflow
        .create_agreement(None, request("X"), "unknown")
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Unauthenticated));

    let err = h
        .workflow
        .create_agreement(Some("forged"), request("X"), "unknown")
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Unauthenticated));
}

#[tokio::test]
async fn missing_fields_fail_before_any_write() {
    let h = harness().await;
    let err = h
        .workflow
        .create_agreement(
            OWNER,
            CreateAgreement {
                title: Some("Only a title".into()),
                ..Default::default()
            },
            "unknown",
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "validation");
    assert!(h
        .storage
        .list_agreements_by_owner("owner-1", 0)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn unknown_type_is_not_found() {
    let h = harness().await;
    let mut req = request("X");
    req.type_id = Some(99);
    let err = h
        .workflow
        .create_agreement(OWNER, req, "unknown")
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::NotFound(_)));
}

#[tokio::test]
async fn failed_upload_leaves_a_retrievable_draft_row() {
    let h = harness().await;
    h.documents.fail_upload.store(true, Ordering::SeqCst);

    let err = h
        .workflow
        .create_agreement(OWNER, request("Doomed"), "unknown")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "dependency");

    let rows = h
        .storage
        .list_agreements_by_owner("owner-1", 0)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    let row = h.storage.get_agreement(&rows[0].id).await.unwrap();
    assert_eq!(row.status, "borrador");
    assert_eq!(row.document_path, None);
    assert_eq!(row.serial_number, "2025-001");
    assert!(h.storage.list_activity(0).await.unwrap().is_empty());
}
