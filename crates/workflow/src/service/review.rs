use convenios_storage::{
    ActivityRecord, AgreementRecord, AgreementUpdate, ConvenioStorage, ObservationRecord,
};
use serde_json::json;
use tracing::{debug, info};

use super::Workflow;
use crate::clock::format_timestamp;
use crate::documents::file_id_from_location;
use crate::error::WorkflowError;
use crate::notify::review_notification;
use crate::outcome::{Outcome, Warning};
use crate::types::{
    AgreementStatus, Identity, ParseCodeError, ReviewAction, TransitionReceipt, TransitionRequest,
};

struct Staged {
    before: AgreementRecord,
    status_from: AgreementStatus,
    version: i64,
}

impl<S: ConvenioStorage> Workflow<S> {
    /// Apply an admin review action.
    ///
    /// The status update, the observation (for `correct`) and the activity
    /// entry commit together. Moving the document and notifying the owner
    /// happen afterwards; their failures become warnings.
    pub async fn transition(
        &self,
        session: Option<&str>,
        agreement_id: &str,
        request: TransitionRequest,
        origin: &str,
    ) -> Result<Outcome<TransitionReceipt>, WorkflowError> {
        let reviewer = self.require_admin(session).await?;
        let action: ReviewAction = request
            .action
            .trim()
            .parse()
            .map_err(|e: ParseCodeError| WorkflowError::Validation(e.to_string()))?;
        let observation = request
            .observation
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty());
        if action == ReviewAction::Correct && observation.is_none() {
            return Err(WorkflowError::Validation(
                "observations are required to request a correction".to_string(),
            ));
        }

        let mut snap = self.storage.begin_snapshot().await?;
        let staged = match self
            .stage_transition(
                &mut snap,
                agreement_id,
                action,
                observation,
                request.expected_version,
                &reviewer,
                origin,
            )
            .await
        {
            Ok(staged) => staged,
            Err(e) => {
                let _ = self.storage.abort_snapshot(snap).await;
                return Err(e);
            }
        };
        self.storage.commit_snapshot(snap).await?;

        let status_to = action.target_status();
        info!(
            %agreement_id,
            action = action.as_str(),
            from = %staged.status_from,
            to = %status_to,
            reviewer = %reviewer.user_id,
            "agreement reviewed"
        );

        let mut outcome = Outcome::new(TransitionReceipt {
            agreement_id: agreement_id.to_string(),
            status_from: staged.status_from,
            status_to,
            version: staged.version,
        });
        self.relocate_document(&staged.before, action, &mut outcome).await;
        self.notify_owner(&staged.before, action, observation, &mut outcome)
            .await;
        Ok(outcome)
    }

    #[allow(clippy::too_many_arguments)]
    async fn stage_transition(
        &self,
        snap: &mut S::Snapshot,
        agreement_id: &str,
        action: ReviewAction,
        observation: Option<&str>,
        expected_version: Option<i64>,
        reviewer: &Identity,
        origin: &str,
    ) -> Result<Staged, WorkflowError> {
        let before = self.storage.get_agreement_for_update(snap, agreement_id).await?;
        if let Some(expected) = expected_version {
            if expected != before.version {
                return Err(WorkflowError::Conflict(format!(
                    "agreement {} is at version {}, expected {}",
                    agreement_id, before.version, expected
                )));
            }
        }
        let status_from: AgreementStatus = before.status.parse().map_err(|e| {
            WorkflowError::Internal(format!("agreement {}: {}", agreement_id, e))
        })?;
        let status_to = action.target_status();
        let timestamp = format_timestamp(self.now());

        let update = AgreementUpdate {
            status: Some(status_to.as_str().to_string()),
            reviewer_id: Some(reviewer.user_id.clone()),
            approved_at: (action == ReviewAction::Approve).then(|| timestamp.clone()),
            updated_at: timestamp.clone(),
            ..Default::default()
        };
        let version = self
            .storage
            .update_agreement(snap, agreement_id, before.version, update)
            .await?;

        if action == ReviewAction::Correct {
            if let Some(text) = observation {
                self.storage
                    .insert_observation(
                        snap,
                        ObservationRecord {
                            id: uuid::Uuid::new_v4().to_string(),
                            agreement_id: agreement_id.to_string(),
                            author_id: reviewer.user_id.clone(),
                            content: text.to_string(),
                            resolved: false,
                            created_at: timestamp.clone(),
                        },
                    )
                    .await?;
            }
        }

        self.storage
            .insert_activity(
                snap,
                ActivityRecord {
                    id: uuid::Uuid::new_v4().to_string(),
                    agreement_id: agreement_id.to_string(),
                    actor_id: reviewer.user_id.clone(),
                    action: action.activity_action().as_str().to_string(),
                    status_from: Some(status_from.as_str().to_string()),
                    status_to: Some(status_to.as_str().to_string()),
                    metadata: json!({ "observations": observation }),
                    ip_address: origin.to_string(),
                    created_at: timestamp,
                },
            )
            .await?;

        Ok(Staged {
            before,
            status_from,
            version,
        })
    }

    async fn relocate_document(
        &self,
        agreement: &AgreementRecord,
        action: ReviewAction,
        outcome: &mut Outcome<TransitionReceipt>,
    ) {
        let Some(location) = agreement.document_path.as_deref() else {
            debug!(agreement_id = %agreement.id, "no document to move");
            return;
        };
        let Some(file_id) = file_id_from_location(location) else {
            debug!(agreement_id = %agreement.id, %location, "document location has no file id");
            return;
        };
        if let Err(e) = self.documents.move_to_folder(file_id, action.folder()).await {
            outcome.warn(Warning::DocumentMoveFailed {
                file_id: file_id.to_string(),
                message: e.to_string(),
            });
        }
    }

    async fn notify_owner(
        &self,
        agreement: &AgreementRecord,
        action: ReviewAction,
        observation: Option<&str>,
        outcome: &mut Outcome<TransitionReceipt>,
    ) {
        let email = match self.identity.profile(&agreement.owner_id).await {
            Ok(profile) => profile.and_then(|p| p.email),
            Err(e) => {
                outcome.warn(Warning::NotificationFailed {
                    message: e.to_string(),
                });
                return;
            }
        };
        let Some(email) = email else {
            debug!(owner = %agreement.owner_id, "owner has no contact address");
            return;
        };
        let notification = review_notification(
            &email,
            action,
            &agreement.title,
            &agreement.serial_number,
            observation,
        );
        if let Err(e) = self.notifier.notify(&notification).await {
            outcome.warn(Warning::NotificationFailed {
                message: e.to_string(),
            });
        }
    }
}
