use serde::{Deserialize, Serialize};

/// An agreement ("convenio") row as stored in the backend.
///
/// `status` holds the wire code (`enviado`, `aprobado`, ...); the workflow
/// crate owns the typed state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgreementRecord {
    pub id: String,
    pub title: String,
    pub type_id: i64,
    pub status: String,
    /// `<year>-<NNN>`, unique across the store.
    pub serial_number: String,
    /// Location of the generated document. None until upload succeeds.
    pub document_path: Option<String>,
    pub owner_id: String,
    pub reviewer_id: Option<String>,
    /// Field name -> value payload used to fill the document template.
    pub content: serde_json::Value,
    /// OCC version. Starts at 0, incremented on every update.
    pub version: i64,
    /// RFC 3339 timestamp string (fixed microsecond precision, UTC).
    pub created_at: String,
    pub updated_at: String,
    pub approved_at: Option<String>,
}

/// A partial update applied to an agreement row. `None` leaves a column as is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgreementUpdate {
    pub status: Option<String>,
    pub reviewer_id: Option<String>,
    pub approved_at: Option<String>,
    /// `Some(None)` clears the document reference.
    pub document_path: Option<Option<String>>,
    pub updated_at: String,
}

impl AgreementUpdate {
    pub(crate) fn apply_to(&self, record: &mut AgreementRecord) {
        if let Some(status) = &self.status {
            record.status = status.clone();
        }
        if let Some(reviewer) = &self.reviewer_id {
            record.reviewer_id = Some(reviewer.clone());
        }
        if let Some(approved_at) = &self.approved_at {
            record.approved_at = Some(approved_at.clone());
        }
        if let Some(path) = &self.document_path {
            record.document_path = path.clone();
        }
        record.updated_at = self.updated_at.clone();
        record.version += 1;
    }
}

/// Correction feedback attached to an agreement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationRecord {
    pub id: String,
    pub agreement_id: String,
    pub author_id: String,
    pub content: String,
    pub resolved: bool,
    pub created_at: String,
}

/// Append-only audit entry for one action on one agreement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub id: String,
    pub agreement_id: String,
    pub actor_id: String,
    pub action: String,
    pub status_from: Option<String>,
    pub status_to: Option<String>,
    pub metadata: serde_json::Value,
    pub ip_address: String,
    pub created_at: String,
}

/// Catalog entry: which template and label an agreement type uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgreementTypeRecord {
    pub id: i64,
    pub name: String,
    pub template: String,
}

/// A persisted multi-step draft. The payload is opaque to storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftRecord {
    pub id: String,
    pub owner_id: String,
    pub payload: serde_json::Value,
    pub version: i64,
    pub updated_at: String,
}
