use std::fmt;

use serde::Serialize;

/// A side effect that failed after the primary write committed.
///
/// The operation still succeeded; warnings tell the caller which follow-up
/// steps did not happen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    DocumentMoveFailed { file_id: String, message: String },
    DocumentPathUpdateFailed { message: String },
    NotificationFailed { message: String },
    ActivityLogFailed { message: String },
    DraftCleanupFailed { draft_id: String, message: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::DocumentMoveFailed { file_id, message } => {
                write!(f, "could not move document {}: {}", file_id, message)
            }
            Warning::DocumentPathUpdateFailed { message } => {
                write!(f, "could not record document location: {}", message)
            }
            Warning::NotificationFailed { message } => {
                write!(f, "could not notify owner: {}", message)
            }
            Warning::ActivityLogFailed { message } => {
                write!(f, "could not write activity entry: {}", message)
            }
            Warning::DraftCleanupFailed { draft_id, message } => {
                write!(f, "could not delete draft {}: {}", draft_id, message)
            }
        }
    }
}

/// Successful result plus the warnings collected along the way.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome<T> {
    pub value: T,
    pub warnings: Vec<Warning>,
}

impl<T> Outcome<T> {
    pub fn new(value: T) -> Self {
        Outcome {
            value,
            warnings: Vec::new(),
        }
    }

    /// Record a warning and log it.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!(%warning, "side effect failed");
        self.warnings.push(warning);
    }

    pub fn is_degraded(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            value: f(self.value),
            warnings: self.warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warnings_serialize_with_kind_tag() {
        let warning = Warning::DocumentMoveFailed {
            file_id: "f1".into(),
            message: "timeout".into(),
        };
        let json = serde_json::to_value(&warning).unwrap();
        assert_eq!(json["kind"], "document_move_failed");
        assert_eq!(json["file_id"], "f1");
    }

    #[test]
    fn map_keeps_warnings() {
        let mut outcome = Outcome::new(2);
        outcome.warn(Warning::NotificationFailed {
            message: "smtp down".into(),
        });
        let mapped = outcome.map(|v| v * 10);
        assert_eq!(mapped.value, 20);
        assert!(mapped.is_degraded());
    }
}
