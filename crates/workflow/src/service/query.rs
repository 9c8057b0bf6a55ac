use std::collections::HashMap;

use convenios_storage::{AgreementRecord, ConvenioStorage, StorageError};
use serde::Serialize;
use tracing::debug;

use super::Workflow;
use crate::activity::{format_activity, welcome_entry, ActivityView, FeedItem};
use crate::catalog::TypeLabels;
use crate::clock::format_list_date;
use crate::error::WorkflowError;
use crate::types::{Agreement, AgreementSummary, AgreementTypeSummary, Observation};

pub const DEFAULT_AGREEMENT_LIMIT: usize = 4;
pub const DEFAULT_ACTIVITY_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgreementDetail {
    pub agreement: Agreement,
    pub observations: Vec<Observation>,
}

/// Parse a `limit` query parameter. Absent means `default`; anything other
/// than a positive integer is a validation error.
pub fn parse_limit(raw: Option<&str>, default: usize) -> Result<usize, WorkflowError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.trim().parse::<usize>() {
        Ok(limit) if limit > 0 => Ok(limit),
        _ => Err(WorkflowError::Validation(format!("invalid limit '{}'", raw))),
    }
}

impl<S: ConvenioStorage> Workflow<S> {
    /// The caller's own agreements, most recently updated first.
    pub async fn list_agreements(
        &self,
        session: Option<&str>,
        limit: usize,
    ) -> Result<Vec<AgreementSummary>, WorkflowError> {
        let caller = self.authenticate(session).await?;
        let records = self
            .storage
            .list_agreements_by_owner(&caller.user_id, limit)
            .await?;
        let labels = TypeLabels::new(&self.storage.list_agreement_types().await?);
        Ok(records
            .into_iter()
            .map(|record| AgreementSummary {
                date: format_list_date(&record.created_at),
                type_label: labels.label(record.type_id).to_string(),
                title: if record.title.trim().is_empty() {
                    "Untitled".to_string()
                } else {
                    record.title
                },
                id: record.id,
                status: record.status,
                serial_number: record.serial_number,
            })
            .collect())
    }

    /// Recent activity across all agreements, formatted for display. An
    /// empty log yields the welcome entry.
    pub async fn activity_feed(
        &self,
        session: Option<&str>,
        limit: usize,
    ) -> Result<Vec<FeedItem>, WorkflowError> {
        self.authenticate(session).await?;
        let entries = self.storage.list_activity(limit).await?;
        if entries.is_empty() {
            return Ok(vec![welcome_entry()]);
        }

        let now = self.now();
        let mut agreements: HashMap<String, Option<AgreementRecord>> = HashMap::new();
        let mut actors: HashMap<String, Option<String>> = HashMap::new();
        let mut feed = Vec::with_capacity(entries.len());
        for entry in entries {
            if !agreements.contains_key(&entry.agreement_id) {
                let agreement = match self.storage.get_agreement(&entry.agreement_id).await {
                    Ok(record) => Some(record),
                    Err(StorageError::AgreementNotFound { .. }) => None,
                    Err(e) => return Err(e.into()),
                };
                agreements.insert(entry.agreement_id.clone(), agreement);
            }
            if !actors.contains_key(&entry.actor_id) {
                let name = match self.identity.profile(&entry.actor_id).await {
                    Ok(profile) => profile.and_then(|p| p.display_name),
                    Err(e) => {
                        debug!(actor = %entry.actor_id, error = %e, "actor lookup failed");
                        None
                    }
                };
                actors.insert(entry.actor_id.clone(), name);
            }
            let agreement = agreements.get(&entry.agreement_id).and_then(Option::as_ref);
            let view = ActivityView {
                action: entry.action,
                status_from: entry.status_from,
                status_to: entry.status_to,
                agreement_title: agreement.map(|a| a.title.clone()),
                agreement_serial: agreement.map(|a| a.serial_number.clone()),
                actor_name: actors.get(&entry.actor_id).cloned().flatten(),
                created_at: entry.created_at,
            };
            feed.push(format_activity(&view, now));
        }
        Ok(feed)
    }

    /// One agreement with its observations. Only the owner and admins may
    /// read it; anyone else gets `NotFound`.
    pub async fn agreement_detail(
        &self,
        session: Option<&str>,
        agreement_id: &str,
    ) -> Result<AgreementDetail, WorkflowError> {
        let caller = self.authenticate(session).await?;
        let record = self.storage.get_agreement(agreement_id).await?;
        if record.owner_id != caller.user_id && !caller.is_admin() {
            return Err(WorkflowError::NotFound(format!("agreement {}", agreement_id)));
        }
        let observations = self
            .storage
            .list_observations(agreement_id)
            .await?
            .into_iter()
            .map(Observation::from)
            .collect();
        Ok(AgreementDetail {
            agreement: Agreement::try_from(record)?,
            observations,
        })
    }

    pub async fn list_agreement_types(
        &self,
        session: Option<&str>,
    ) -> Result<Vec<AgreementTypeSummary>, WorkflowError> {
        self.authenticate(session).await?;
        Ok(self
            .storage
            .list_agreement_types()
            .await?
            .into_iter()
            .map(|t| AgreementTypeSummary {
                id: t.id,
                name: t.name,
            })
            .collect())
    }
}
