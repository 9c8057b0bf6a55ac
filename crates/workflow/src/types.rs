use std::fmt;
use std::str::FromStr;

use convenios_storage::{AgreementRecord, ObservationRecord};
use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;
use crate::ports::Folder;

/// A wire code that does not name any known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseCodeError {
    pub kind: &'static str,
    pub value: String,
}

/// Lifecycle status of an agreement. Serialized with the wire codes the
/// rest of the system stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgreementStatus {
    Borrador,
    Enviado,
    Revision,
    Pendiente,
    Aprobado,
    Rechazado,
}

impl AgreementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgreementStatus::Borrador => "borrador",
            AgreementStatus::Enviado => "enviado",
            AgreementStatus::Revision => "revision",
            AgreementStatus::Pendiente => "pendiente",
            AgreementStatus::Aprobado => "aprobado",
            AgreementStatus::Rechazado => "rechazado",
        }
    }
}

impl fmt::Display for AgreementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgreementStatus {
    type Err = ParseCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "borrador" => Ok(AgreementStatus::Borrador),
            "enviado" => Ok(AgreementStatus::Enviado),
            "revision" => Ok(AgreementStatus::Revision),
            "pendiente" => Ok(AgreementStatus::Pendiente),
            "aprobado" => Ok(AgreementStatus::Aprobado),
            "rechazado" => Ok(AgreementStatus::Rechazado),
            other => Err(ParseCodeError {
                kind: "agreement status",
                value: other.to_string(),
            }),
        }
    }
}

/// Admin review decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewAction {
    Approve,
    Reject,
    Correct,
}

impl ReviewAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewAction::Approve => "approve",
            ReviewAction::Reject => "reject",
            ReviewAction::Correct => "correct",
        }
    }

    /// Status the agreement lands in. A correction sends it back to the
    /// owner as `enviado`.
    pub fn target_status(&self) -> AgreementStatus {
        match self {
            ReviewAction::Approve => AgreementStatus::Aprobado,
            ReviewAction::Reject => AgreementStatus::Rechazado,
            ReviewAction::Correct => AgreementStatus::Enviado,
        }
    }

    /// Review folder the agreement's document moves to.
    pub fn folder(&self) -> Folder {
        match self {
            ReviewAction::Approve => Folder::Approved,
            ReviewAction::Reject => Folder::Rejected,
            ReviewAction::Correct => Folder::Pending,
        }
    }

    /// Past-tense phrase used in notifications.
    pub fn outcome_phrase(&self) -> &'static str {
        match self {
            ReviewAction::Approve => "approved",
            ReviewAction::Reject => "rejected",
            ReviewAction::Correct => "correction requested",
        }
    }

    pub fn activity_action(&self) -> ActivityAction {
        match self {
            ReviewAction::Approve => ActivityAction::Approve,
            ReviewAction::Reject => ActivityAction::Reject,
            ReviewAction::Correct => ActivityAction::Correct,
        }
    }
}

impl FromStr for ReviewAction {
    type Err = ParseCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" => Ok(ReviewAction::Approve),
            "reject" => Ok(ReviewAction::Reject),
            "correct" => Ok(ReviewAction::Correct),
            other => Err(ParseCodeError {
                kind: "review action",
                value: other.to_string(),
            }),
        }
    }
}

/// Action codes recorded in the activity log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityAction {
    Create,
    Update,
    StatusChange,
    ResubmitConvenio,
    UpdateStatus,
    Approve,
    Reject,
    Correct,
}

impl ActivityAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityAction::Create => "create",
            ActivityAction::Update => "update",
            ActivityAction::StatusChange => "status_change",
            ActivityAction::ResubmitConvenio => "resubmit_convenio",
            ActivityAction::UpdateStatus => "update_status",
            ActivityAction::Approve => "approve",
            ActivityAction::Reject => "reject",
            ActivityAction::Correct => "correct",
        }
    }

    /// `None` for codes written by other producers; the feed renders those
    /// with a generic entry.
    pub fn from_code(code: &str) -> Option<Self> {
        Some(match code {
            "create" => ActivityAction::Create,
            "update" => ActivityAction::Update,
            "status_change" => ActivityAction::StatusChange,
            "resubmit_convenio" => ActivityAction::ResubmitConvenio,
            "update_status" => ActivityAction::UpdateStatus,
            "approve" => ActivityAction::Approve,
            "reject" => ActivityAction::Reject,
            "correct" => ActivityAction::Correct,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    /// Any role other than `admin` is a regular user.
    pub fn from_code(code: &str) -> Self {
        if code.eq_ignore_ascii_case("admin") {
            Role::Admin
        } else {
            Role::User
        }
    }
}

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub user_id: String,
    pub role: Role,
    pub display_name: Option<String>,
    pub email: Option<String>,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Request to create an agreement. All three fields are required; they are
/// optional here so missing ones are reported together.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateAgreement {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, alias = "convenio_type_id")]
    pub type_id: Option<i64>,
    #[serde(default, alias = "content_data")]
    pub content: Option<serde_json::Map<String, serde_json::Value>>,
}

pub(crate) struct ValidCreate {
    pub title: String,
    pub type_id: i64,
    pub content: serde_json::Map<String, serde_json::Value>,
}

impl CreateAgreement {
    pub(crate) fn validate(self) -> Result<ValidCreate, WorkflowError> {
        let title = self
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        let mut missing = Vec::new();
        if title.is_none() {
            missing.push("title");
        }
        if self.type_id.is_none() {
            missing.push("type_id");
        }
        if self.content.is_none() {
            missing.push("content");
        }
        match (title, self.type_id, self.content) {
            (Some(title), Some(type_id), Some(content)) => Ok(ValidCreate {
                title,
                type_id,
                content,
            }),
            _ => Err(WorkflowError::Validation(format!(
                "missing required fields: {}",
                missing.join(", ")
            ))),
        }
    }
}

/// Admin review request. `action` stays a string so an unknown value is a
/// validation error rather than a deserialization failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransitionRequest {
    pub action: String,
    #[serde(default, alias = "observaciones")]
    pub observation: Option<String>,
    #[serde(default)]
    pub expected_version: Option<i64>,
}

/// Result of a committed review transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionReceipt {
    pub agreement_id: String,
    pub status_from: AgreementStatus,
    pub status_to: AgreementStatus,
    pub version: i64,
}

/// An agreement as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Agreement {
    pub id: String,
    pub title: String,
    pub type_id: i64,
    pub status: AgreementStatus,
    pub serial_number: String,
    pub document_path: Option<String>,
    pub owner_id: String,
    pub reviewer_id: Option<String>,
    pub content: serde_json::Value,
    pub version: i64,
    pub created_at: String,
    pub updated_at: String,
    pub approved_at: Option<String>,
}

impl TryFrom<AgreementRecord> for Agreement {
    type Error = WorkflowError;

    fn try_from(record: AgreementRecord) -> Result<Self, Self::Error> {
        let status = record.status.parse::<AgreementStatus>().map_err(|e| {
            WorkflowError::Internal(format!("agreement {}: {}", record.id, e))
        })?;
        Ok(Agreement {
            id: record.id,
            title: record.title,
            type_id: record.type_id,
            status,
            serial_number: record.serial_number,
            document_path: record.document_path,
            owner_id: record.owner_id,
            reviewer_id: record.reviewer_id,
            content: record.content,
            version: record.version,
            created_at: record.created_at,
            updated_at: record.updated_at,
            approved_at: record.approved_at,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Observation {
    pub id: String,
    pub author_id: String,
    pub content: String,
    pub resolved: bool,
    pub created_at: String,
}

impl From<ObservationRecord> for Observation {
    fn from(record: ObservationRecord) -> Self {
        Observation {
            id: record.id,
            author_id: record.author_id,
            content: record.content,
            resolved: record.resolved,
            created_at: record.created_at,
        }
    }
}

/// One row of the caller's agreement list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgreementSummary {
    pub id: String,
    pub title: String,
    /// `dd/mm/yyyy`, or "No date" when the stored timestamp is unreadable.
    pub date: String,
    pub type_label: String,
    /// Raw status code, passed through even when unrecognized.
    pub status: String,
    pub serial_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgreementTypeSummary {
    pub id: i64,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_round_trip_through_from_str() {
        for status in [
            AgreementStatus::Borrador,
            AgreementStatus::Enviado,
            AgreementStatus::Revision,
            AgreementStatus::Pendiente,
            AgreementStatus::Aprobado,
            AgreementStatus::Rechazado,
        ] {
            assert_eq!(status.as_str().parse::<AgreementStatus>(), Ok(status));
        }
        assert!("archivado".parse::<AgreementStatus>().is_err());
    }

    #[test]
    fn review_actions_map_to_target_statuses() {
        assert_eq!(
            ReviewAction::Approve.target_status(),
            AgreementStatus::Aprobado
        );
        assert_eq!(
            ReviewAction::Reject.target_status(),
            AgreementStatus::Rechazado
        );
        assert_eq!(
            ReviewAction::Correct.target_status(),
            AgreementStatus::Enviado
        );
        let err = "delete".parse::<ReviewAction>().unwrap_err();
        assert_eq!(err.to_string(), "unknown review action 'delete'");
    }

    #[test]
    fn non_admin_role_codes_are_users() {
        assert_eq!(Role::from_code("admin"), Role::Admin);
        assert_eq!(Role::from_code("ADMIN"), Role::Admin);
        assert_eq!(Role::from_code("student"), Role::User);
        assert_eq!(Role::from_code(""), Role::User);
    }

    #[test]
    fn activity_codes_are_stable() {
        for action in [
            ActivityAction::Create,
            ActivityAction::Update,
            ActivityAction::StatusChange,
            ActivityAction::ResubmitConvenio,
            ActivityAction::UpdateStatus,
            ActivityAction::Approve,
            ActivityAction::Reject,
            ActivityAction::Correct,
        ] {
            assert_eq!(ActivityAction::from_code(action.as_str()), Some(action));
        }
        assert_eq!(ActivityAction::from_code("archive"), None);
    }

    #[test]
    fn create_request_reports_every_missing_field() {
        let err = CreateAgreement {
            title: Some("   ".into()),
            type_id: None,
            content: None,
        }
        .validate()
        .err()
        .unwrap();
        assert_eq!(
            err.to_string(),
            "invalid input: missing required fields: title, type_id, content"
        );
    }

    #[test]
    fn create_request_accepts_legacy_field_names() {
        let request: CreateAgreement = serde_json::from_value(serde_json::json!({
            "title": "Practicas",
            "convenio_type_id": 2,
            "content_data": {"entidad_nombre": "ACME"}
        }))
        .unwrap();
        let valid = request.validate().unwrap();
        assert_eq!(valid.title, "Practicas");
        assert_eq!(valid.type_id, 2);
        assert_eq!(valid.content["entidad_nombre"], "ACME");
    }

    #[test]
    fn unknown_stored_status_is_internal_error() {
        let record = AgreementRecord {
            id: "a1".into(),
            title: "T".into(),
            type_id: 1,
            status: "archivado".into(),
            serial_number: "2025-001".into(),
            document_path: None,
            owner_id: "u1".into(),
            reviewer_id: None,
            content: serde_json::json!({}),
            version: 0,
            created_at: "2025-01-01T00:00:00.000000Z".into(),
            updated_at: "2025-01-01T00:00:00.000000Z".into(),
            approved_at: None,
        };
        let err = Agreement::try_from(record).unwrap_err();
        assert_eq!(err.kind(), "internal");
    }
}
