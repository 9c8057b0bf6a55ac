//! Multi-step agreement drafts.
//!
//! A draft is an explicit, serializable object owned by one user. Each step
//! collects a map of template fields; once every step is complete the draft
//! can be submitted, which flattens the steps into a creation request.

use std::collections::{BTreeMap, BTreeSet};

use convenios_storage::DraftRecord;
use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;
use crate::types::CreateAgreement;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftStep {
    Entity,
    Representative,
    Dates,
}

impl DraftStep {
    pub const ALL: [DraftStep; 3] = [DraftStep::Entity, DraftStep::Representative, DraftStep::Dates];

    pub fn title(&self) -> &'static str {
        match self {
            DraftStep::Entity => "Entity details",
            DraftStep::Representative => "Legal representative",
            DraftStep::Dates => "Dates and duration",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgreementDraft {
    pub id: String,
    pub owner_id: String,
    #[serde(default)]
    pub type_id: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub steps: BTreeMap<DraftStep, BTreeMap<String, String>>,
    #[serde(default)]
    pub completed: BTreeSet<DraftStep>,
    /// Mirrors the stored record's version; not part of the payload.
    #[serde(skip)]
    pub version: i64,
    pub updated_at: String,
}

/// Input to start a draft.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartDraft {
    #[serde(default)]
    pub type_id: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
}

/// Changes to one step of a draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftStepInput {
    pub step: DraftStep,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub type_id: Option<i64>,
    /// Mark the step complete after merging.
    #[serde(default)]
    pub complete: bool,
    pub expected_version: i64,
}

impl AgreementDraft {
    pub fn new(id: String, owner_id: String, start: StartDraft, updated_at: String) -> Self {
        AgreementDraft {
            id,
            owner_id,
            type_id: start.type_id,
            title: clean(start.title),
            steps: BTreeMap::new(),
            completed: BTreeSet::new(),
            version: 0,
            updated_at,
        }
    }

    /// Merge `input` into the draft. Empty values remove the field. A step
    /// can only be marked complete if it holds at least one value.
    pub fn apply(&mut self, input: DraftStepInput, updated_at: String) -> Result<(), WorkflowError> {
        if let Some(title) = clean(input.title) {
            self.title = Some(title);
        }
        if input.type_id.is_some() {
            self.type_id = input.type_id;
        }
        let step = self.steps.entry(input.step).or_default();
        for (key, value) in input.fields {
            let value = value.trim().to_string();
            if value.is_empty() {
                step.remove(&key);
            } else {
                step.insert(key, value);
            }
        }
        if input.complete {
            if step.is_empty() {
                return Err(WorkflowError::Validation(format!(
                    "step '{}' has no values",
                    input.step.title()
                )));
            }
            self.completed.insert(input.step);
        } else if step.is_empty() {
            self.completed.remove(&input.step);
        }
        self.updated_at = updated_at;
        Ok(())
    }

    /// First step not yet completed.
    pub fn current_step(&self) -> Option<DraftStep> {
        DraftStep::ALL
            .into_iter()
            .find(|step| !self.completed.contains(step))
    }

    pub fn progress_percent(&self) -> u8 {
        (self.completed.len() * 100 / DraftStep::ALL.len()) as u8
    }

    /// Flatten into a creation request. Later steps win on key collisions.
    pub fn to_create_request(&self) -> Result<CreateAgreement, WorkflowError> {
        let mut missing: Vec<&str> = Vec::new();
        if self.title.is_none() {
            missing.push("title");
        }
        if self.type_id.is_none() {
            missing.push("type_id");
        }
        for step in DraftStep::ALL {
            if !self.completed.contains(&step) {
                missing.push(step.title());
            }
        }
        if !missing.is_empty() {
            return Err(WorkflowError::Validation(format!(
                "draft is incomplete: {}",
                missing.join(", ")
            )));
        }
        let content = DraftStep::ALL
            .iter()
            .filter_map(|step| self.steps.get(step))
            .flatten()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();
        Ok(CreateAgreement {
            title: self.title.clone(),
            type_id: self.type_id,
            content: Some(content),
        })
    }

    pub fn to_record(&self) -> Result<DraftRecord, WorkflowError> {
        let payload = serde_json::to_value(self)
            .map_err(|e| WorkflowError::Internal(format!("draft serialization: {}", e)))?;
        Ok(DraftRecord {
            id: self.id.clone(),
            owner_id: self.owner_id.clone(),
            payload,
            version: self.version,
            updated_at: self.updated_at.clone(),
        })
    }

    pub fn from_record(record: DraftRecord) -> Result<Self, WorkflowError> {
        let mut draft: AgreementDraft = serde_json::from_value(record.payload).map_err(|e| {
            WorkflowError::Internal(format!("draft {} is corrupt: {}", record.id, e))
        })?;
        draft.version = record.version;
        Ok(draft)
    }
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
