use convenios_storage::ConvenioStorage;
use tracing::info;

use super::Workflow;
use crate::clock::format_timestamp;
use crate::draft::{AgreementDraft, DraftStepInput, StartDraft};
use crate::error::WorkflowError;
use crate::outcome::{Outcome, Warning};
use crate::types::{Agreement, Identity};

impl<S: ConvenioStorage> Workflow<S> {
    pub async fn start_draft(
        &self,
        session: Option<&str>,
        start: StartDraft,
    ) -> Result<AgreementDraft, WorkflowError> {
        let owner = self.authenticate(session).await?;
        if let Some(type_id) = start.type_id {
            self.storage.get_agreement_type(type_id).await?;
        }
        let mut draft = AgreementDraft::new(
            uuid::Uuid::new_v4().to_string(),
            owner.user_id,
            start,
            format_timestamp(self.now()),
        );
        draft.version = self.storage.save_draft(draft.to_record()?, None).await?;
        info!(draft_id = %draft.id, owner = %draft.owner_id, "draft started");
        Ok(draft)
    }

    pub async fn get_draft(
        &self,
        session: Option<&str>,
        draft_id: &str,
    ) -> Result<AgreementDraft, WorkflowError> {
        let owner = self.authenticate(session).await?;
        self.owned_draft(&owner, draft_id).await
    }

    /// Merge one step's fields. `expected_version` must match the stored
    /// draft.
    pub async fn update_draft_step(
        &self,
        session: Option<&str>,
        draft_id: &str,
        input: DraftStepInput,
    ) -> Result<AgreementDraft, WorkflowError> {
        let owner = self.authenticate(session).await?;
        let mut draft = self.owned_draft(&owner, draft_id).await?;
        if let Some(type_id) = input.type_id {
            self.storage.get_agreement_type(type_id).await?;
        }
        let expected = input.expected_version;
        if expected != draft.version {
            return Err(WorkflowError::Conflict(format!(
                "draft {} is at version {}, expected {}",
                draft_id, draft.version, expected
            )));
        }
        draft.apply(input, format_timestamp(self.now()))?;
        draft.version = self
            .storage
            .save_draft(draft.to_record()?, Some(expected))
            .await?;
        Ok(draft)
    }

    /// Create the agreement a complete draft describes, then delete the
    /// draft.
    pub async fn submit_draft(
        &self,
        session: Option<&str>,
        draft_id: &str,
        origin: &str,
    ) -> Result<Outcome<Agreement>, WorkflowError> {
        let owner = self.authenticate(session).await?;
        let draft = self.owned_draft(&owner, draft_id).await?;
        let request = draft.to_create_request()?;
        let mut outcome = self.create_agreement(session, request, origin).await?;
        if let Err(e) = self.storage.delete_draft(draft_id).await {
            outcome.warn(Warning::DraftCleanupFailed {
                draft_id: draft_id.to_string(),
                message: e.to_string(),
            });
        }
        info!(%draft_id, agreement_id = %outcome.value.id, "draft submitted");
        Ok(outcome)
    }

    /// Drafts of other users are reported as missing.
    async fn owned_draft(
        &self,
        owner: &Identity,
        draft_id: &str,
    ) -> Result<AgreementDraft, WorkflowError> {
        let draft = AgreementDraft::from_record(self.storage.get_draft(draft_id).await?)?;
        if draft.owner_id != owner.user_id {
            return Err(WorkflowError::NotFound(format!("draft {}", draft_id)));
        }
        Ok(draft)
    }
}
