use convenios_storage::{ActivityRecord, AgreementRecord, AgreementUpdate, ConvenioStorage};
use serde_json::{json, Map, Value};
use time::OffsetDateTime;
use tracing::{error, info};

use super::Workflow;
use crate::clock::{file_date, format_timestamp};
use crate::error::WorkflowError;
use crate::outcome::{Outcome, Warning};
use crate::ports::TemplateField;
use crate::serial::allocate_and_insert;
use crate::types::{ActivityAction, Agreement, AgreementStatus, CreateAgreement, Identity};

impl<S: ConvenioStorage> Workflow<S> {
    /// Create an agreement and its document.
    ///
    /// The row is committed with status `enviado` before the document is
    /// uploaded. If the upload fails the row is kept, downgraded to
    /// `borrador`, and the call fails with a dependency error.
    pub async fn create_agreement(
        &self,
        session: Option<&str>,
        request: CreateAgreement,
        origin: &str,
    ) -> Result<Outcome<Agreement>, WorkflowError> {
        let owner = self.authenticate(session).await?;
        let request = request.validate()?;

        let agreement_type = self.storage.get_agreement_type(request.type_id).await?;
        let fields = template_fields(&request.title, &request.content);
        let document = self.assembler.assemble(&agreement_type.template, &fields)?;

        let now = self.now();
        let timestamp = format_timestamp(now);
        let content = Value::Object(request.content);
        let record = allocate_and_insert(self.storage.as_ref(), now.year(), |serial| {
            AgreementRecord {
                id: uuid::Uuid::new_v4().to_string(),
                title: request.title.clone(),
                type_id: request.type_id,
                status: AgreementStatus::Enviado.as_str().to_string(),
                serial_number: serial.to_string(),
                document_path: None,
                owner_id: owner.user_id.clone(),
                reviewer_id: None,
                content: content.clone(),
                version: 0,
                created_at: timestamp.clone(),
                updated_at: timestamp.clone(),
                approved_at: None,
            }
        })
        .await?;
        info!(
            agreement_id = %record.id,
            serial_number = %record.serial_number,
            owner = %owner.user_id,
            "agreement created"
        );

        let file_name = document_file_name(&record.title, now, &document.extension);
        let stored = match self.documents.upload(document.bytes, &file_name).await {
            Ok(stored) => stored,
            Err(e) => {
                self.revert_to_draft(&record.id).await;
                return Err(WorkflowError::Dependency {
                    service: e.service.to_string(),
                    message: format!(
                        "upload failed, agreement {} kept as draft: {}",
                        record.id, e.message
                    ),
                });
            }
        };

        let mut outcome = Outcome::new(());
        let mut record = record;
        match self.set_document_path(&record.id, &stored.location).await {
            Ok(version) => record.version = version,
            Err(e) => outcome.warn(Warning::DocumentPathUpdateFailed {
                message: e.to_string(),
            }),
        }
        record.document_path = Some(stored.location.clone());

        if let Err(e) = self
            .log_creation(&record, &stored.checksum, &owner, origin)
            .await
        {
            outcome.warn(Warning::ActivityLogFailed {
                message: e.to_string(),
            });
        }

        let agreement = Agreement::try_from(record)?;
        Ok(outcome.map(|()| agreement))
    }

    /// Compensation after a failed upload: mark the row `borrador` with no
    /// document. Failures here are logged only.
    async fn revert_to_draft(&self, agreement_id: &str) {
        let update = AgreementUpdate {
            status: Some(AgreementStatus::Borrador.as_str().to_string()),
            document_path: Some(None),
            updated_at: format_timestamp(self.now()),
            ..Default::default()
        };
        match self.update_current(agreement_id, update).await {
            Ok(_) => info!(%agreement_id, "agreement reverted to draft after upload failure"),
            Err(e) => error!(%agreement_id, error = %e, "could not revert agreement to draft"),
        }
    }

    async fn set_document_path(
        &self,
        agreement_id: &str,
        location: &str,
    ) -> Result<i64, WorkflowError> {
        let update = AgreementUpdate {
            document_path: Some(Some(location.to_string())),
            updated_at: format_timestamp(self.now()),
            ..Default::default()
        };
        self.update_current(agreement_id, update).await
    }

    /// Apply `update` against whatever version is current.
    async fn update_current(
        &self,
        agreement_id: &str,
        update: AgreementUpdate,
    ) -> Result<i64, WorkflowError> {
        let mut snap = self.storage.begin_snapshot().await?;
        let current = match self.storage.get_agreement_for_update(&mut snap, agreement_id).await {
            Ok(current) => current,
            Err(e) => {
                let _ = self.storage.abort_snapshot(snap).await;
                return Err(e.into());
            }
        };
        let version = match self
            .storage
            .update_agreement(&mut snap, agreement_id, current.version, update)
            .await
        {
            Ok(version) => version,
            Err(e) => {
                let _ = self.storage.abort_snapshot(snap).await;
                return Err(e.into());
            }
        };
        self.storage.commit_snapshot(snap).await?;
        Ok(version)
    }

    async fn log_creation(
        &self,
        record: &AgreementRecord,
        checksum: &str,
        owner: &Identity,
        origin: &str,
    ) -> Result<(), WorkflowError> {
        let entry = ActivityRecord {
            id: uuid::Uuid::new_v4().to_string(),
            agreement_id: record.id.clone(),
            actor_id: owner.user_id.clone(),
            action: ActivityAction::Create.as_str().to_string(),
            status_from: None,
            status_to: Some(AgreementStatus::Enviado.as_str().to_string()),
            metadata: json!({
                "title": record.title,
                "type_id": record.type_id,
                "document_path": record.document_path,
                "document_sha256": checksum,
            }),
            ip_address: origin.to_string(),
            created_at: format_timestamp(self.now()),
        };
        let mut snap = self.storage.begin_snapshot().await?;
        if let Err(e) = self.storage.insert_activity(&mut snap, entry).await {
            let _ = self.storage.abort_snapshot(snap).await;
            return Err(e.into());
        }
        self.storage.commit_snapshot(snap).await?;
        Ok(())
    }
}

/// Template fields from the content payload, plus `title` unless the
/// payload defines it.
fn template_fields(title: &str, content: &Map<String, Value>) -> Vec<TemplateField> {
    let mut fields: Vec<TemplateField> = content
        .iter()
        .map(|(key, value)| TemplateField {
            key: key.clone(),
            value: match value {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            },
        })
        .collect();
    if !content.contains_key("title") {
        fields.push(TemplateField {
            key: "title".to_string(),
            value: title.to_string(),
        });
    }
    fields
}

/// `Convenio_<title>_<YYYY-MM-DD>.<ext>`
fn document_file_name(title: &str, at: OffsetDateTime, extension: &str) -> String {
    let title: String = title
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    format!("Convenio_{}_{}.{}", title, file_date(at), extension)
}
