mod common;

use std::collections::BTreeMap;

use common::{harness, request, ADMIN, OTHER, OWNER};
use convenios_storage::ConvenioStorage;
use convenios_workflow::activity::{format_activity, ActivityView, Severity};
use convenios_workflow::draft::{DraftStep, DraftStepInput, StartDraft};
use convenios_workflow::{TransitionRequest, WorkflowError};
use time::macros::datetime;

#[tokio::test]
async fn empty_feed_shows_welcome_entry() {
    let h = harness().await;
    let feed = h.workflow.activity_feed(OWNER, 50).await.unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].title, "Welcome");
}

#[tokio::test]
async fn approved_agreement_shows_one_success_entry() {
    let h = harness().await;
    let agreement = h
        .workflow
        .create_agreement(OWNER, request("Practicas ACME"), "unknown")
        .await
        .unwrap()
        .value;
    h.workflow
        .transition(
            ADMIN,
            &agreement.id,
            TransitionRequest {
                action: "approve".into(),
                ..Default::default()
            },
            "unknown",
        )
        .await
        .unwrap();

    let feed = h.workflow.activity_feed(OWNER, 50).await.unwrap();
    assert_eq!(feed.len(), 2);
    let successes: Vec<_> = feed
        .iter()
        .filter(|item| item.severity == Severity::Success)
        .collect();
    assert_eq!(successes.len(), 1);
    assert_eq!(successes[0].title, "Agreement approved");
    assert_eq!(
        successes[0].description,
        "Ana Admin approved \"Practicas ACME\" (No. 2025-001)"
    );
    assert!(feed
        .iter()
        .any(|item| item.description == "Olga Owner created \"Practicas ACME\" (No. 2025-001)"));
}

#[tokio::test]
async fn feed_respects_limit() {
    let h = harness().await;
    for n in 0..3 {
        h.workflow
            .create_agreement(OWNER, request(&format!("A{}", n)), "unknown")
            .await
            .unwrap();
    }
    assert_eq!(h.workflow.activity_feed(OWNER, 2).await.unwrap().len(), 2);
    assert!(matches!(
        h.workflow.activity_feed(None, 2).await,
        Err(WorkflowError::Unauthenticated)
    ));
}

#[test]
fn formatting_is_pure() {
    let view = ActivityView {
        action: "something_new".into(),
        created_at: "2025-05-20T09:00:00.000000Z".into(),
        ..Default::default()
    };
    let now = datetime!(2025-05-20 10:00:00 UTC);
    let first = format_activity(&view, now);
    let second = format_activity(&view, now);
    assert_eq!(first, second);
    assert_eq!(first.description, "Activity on \"Agreement\"");
}

#[tokio::test]
async fn agreement_list_is_owner_scoped_and_limited() {
    let h = harness().await;
    for n in 0..5 {
        h.workflow
            .create_agreement(OWNER, request(&format!("Mine {}", n)), "unknown")
            .await
            .unwrap();
    }
    h.workflow
        .create_agreement(OTHER, request("Theirs"), "unknown")
        .await
        .unwrap();

    let mine = h.workflow.list_agreements(OWNER, 4).await.unwrap();
    assert_eq!(mine.len(), 4);
    assert!(mine.iter().all(|s| s.title.starts_with("Mine")));
    assert_eq!(mine[0].date, "20/05/2025");
    assert_eq!(mine[0].type_label, "Convenio Particular de Práctica Supervisada");
    assert_eq!(mine[0].status, "enviado");

    let theirs = h.workflow.list_agreements(OTHER, 4).await.unwrap();
    assert_eq!(theirs.len(), 1);
}

#[tokio::test]
async fn detail_is_visible_to_owner_and_admin_only() {
    let h = harness().await;
    let agreement = h
        .workflow
        .create_agreement(OWNER, request("Private"), "unknown")
        .await
        .unwrap()
        .value;
    h.workflow
        .transition(
            ADMIN,
            &agreement.id,
            TransitionRequest {
                action: "correct".into(),
                observation: Some("Add annex".into()),
                expected_version: None,
            },
            "unknown",
        )
        .await
        .unwrap();

    let detail = h
        .workflow
        .agreement_detail(OWNER, &agreement.id)
        .await
        .unwrap();
    assert_eq!(detail.agreement.id, agreement.id);
    assert_eq!(detail.observations.len(), 1);
    assert_eq!(detail.observations[0].content, "Add annex");

    assert!(h
        .workflow
        .agreement_detail(ADMIN, &agreement.id)
        .await
        .is_ok());
    assert!(matches!(
        h.workflow.agreement_detail(OTHER, &agreement.id).await,
        Err(WorkflowError::NotFound(_))
    ));
}

#[tokio::test]
async fn types_are_listed_for_authenticated_callers() {
    let h = harness().await;
    let types = h.workflow.list_agreement_types(OWNER).await.unwrap();
    assert_eq!(types.len(), 5);
    assert_eq!(types[1].name, "Convenio Marco");
    assert!(h.workflow.list_agreement_types(None).await.is_err());
}

fn step(step: DraftStep, fields: &[(&str, &str)], version: i64) -> DraftStepInput {
    DraftStepInput {
        step,
        fields: fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<BTreeMap<_, _>>(),
        title: None,
        type_id: None,
        complete: true,
        expected_version: version,
    }
}

#[tokio::test]
async fn draft_walks_through_steps_and_submits() {
    let h = harness().await;
    let draft = h
        .workflow
        .start_draft(
            OWNER,
            StartDraft {
                type_id: Some(2),
                title: Some("Marco ACME".into()),
            },
        )
        .await
        .unwrap();
    assert_eq!(draft.version, 0);

    let draft = h
        .workflow
        .update_draft_step(OWNER, &draft.id, step(DraftStep::Entity, &[("entidad_nombre", "ACME")], 0))
        .await
        .unwrap();
    let draft = h
        .workflow
        .update_draft_step(
            OWNER,
            &draft.id,
            step(DraftStep::Representative, &[("representante_nombre", "Rita")], 1),
        )
        .await
        .unwrap();

    let err = h
        .workflow
        .submit_draft(OWNER, &draft.id, "unknown")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "validation");

    let draft = h
        .workflow
        .update_draft_step(OWNER, &draft.id, step(DraftStep::Dates, &[("fecha_inicio", "01/06/2025")], 2))
        .await
        .unwrap();
    assert_eq!(draft.current_step(), None);

    let outcome = h
        .workflow
        .submit_draft(OWNER, &draft.id, "unknown")
        .await
        .unwrap();
    let agreement = outcome.value;
    assert_eq!(agreement.title, "Marco ACME");
    assert_eq!(agreement.type_id, 2);
    assert_eq!(agreement.content["entidad_nombre"], "ACME");
    assert_eq!(agreement.content["fecha_inicio"], "01/06/2025");
    assert!(h.storage.get_draft(&draft.id).await.is_err());
}

#[tokio::test]
async fn drafts_are_private_and_versioned() {
    let h = harness().await;
    let draft = h
        .workflow
        .start_draft(OWNER, StartDraft::default())
        .await
        .unwrap();

    assert!(matches!(
        h.workflow.get_draft(OTHER, &draft.id).await,
        Err(WorkflowError::NotFound(_))
    ));

    h.workflow
        .update_draft_step(OWNER, &draft.id, step(DraftStep::Entity, &[("a", "1")], 0))
        .await
        .unwrap();
    let err = h
        .workflow
        .update_draft_step(OWNER, &draft.id, step(DraftStep::Entity, &[("a", "2")], 0))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Conflict(_)));

    let current = h.workflow.get_draft(OWNER, &draft.id).await.unwrap();
    assert_eq!(current.version, 1);
    assert_eq!(current.steps[&DraftStep::Entity]["a"], "1");
}

#[tokio::test]
async fn draft_with_unknown_type_is_refused() {
    let h = harness().await;
    let err = h
        .workflow
        .start_draft(
            OWNER,
            StartDraft {
                type_id: Some(77),
                title: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::NotFound(_)));
}
