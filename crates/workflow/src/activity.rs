//! Turns raw activity entries into display items for the feed.

use serde::Serialize;
use time::OffsetDateTime;

use crate::clock::time_ago;
use crate::types::{ActivityAction, AgreementStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// An activity entry joined with the agreement and actor it refers to.
/// Either side may be missing (deleted agreement, unknown actor).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityView {
    pub action: String,
    pub status_from: Option<String>,
    pub status_to: Option<String>,
    pub agreement_title: Option<String>,
    pub agreement_serial: Option<String>,
    pub actor_name: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedItem {
    pub title: String,
    pub description: String,
    /// Relative age, e.g. "3 hours ago".
    pub time: String,
    pub severity: Severity,
    pub icon: String,
}

/// Shown when there is no activity at all.
pub fn welcome_entry() -> FeedItem {
    FeedItem {
        title: "Welcome".to_string(),
        description: "Your agreement activity will show up here".to_string(),
        time: "now".to_string(),
        severity: Severity::Info,
        icon: "info".to_string(),
    }
}

pub fn format_activity(view: &ActivityView, now: OffsetDateTime) -> FeedItem {
    let title = view.agreement_title.as_deref().unwrap_or("Agreement");
    let serial = view.agreement_serial.as_deref().unwrap_or("No number");
    let actor = view.actor_name.as_deref().unwrap_or("User");

    let (severity, icon, heading, description) = match ActivityAction::from_code(&view.action) {
        Some(ActivityAction::Create) => (
            Severity::Info,
            "file-plus",
            "New agreement created".to_string(),
            format!("{} created \"{}\" (No. {})", actor, title, serial),
        ),
        Some(ActivityAction::Update) => (
            Severity::Info,
            "edit",
            "Agreement updated".to_string(),
            format!("Changes were made to \"{}\" (No. {})", title, serial),
        ),
        Some(ActivityAction::StatusChange) => status_change(view, title),
        Some(ActivityAction::ResubmitConvenio) => (
            Severity::Info,
            "refresh-ccw",
            "Agreement resubmitted".to_string(),
            format!("{} resubmitted \"{}\" with corrections", actor, title),
        ),
        Some(ActivityAction::UpdateStatus) => (
            Severity::Info,
            "arrow-right-left",
            "Status updated".to_string(),
            format!(
                "\"{}\" changed from {} to {}",
                title,
                view.status_from.as_deref().unwrap_or("-"),
                view.status_to.as_deref().unwrap_or("-")
            ),
        ),
        Some(ActivityAction::Approve) => (
            Severity::Success,
            "check",
            "Agreement approved".to_string(),
            format!("{} approved \"{}\" (No. {})", actor, title, serial),
        ),
        Some(ActivityAction::Reject) => (
            Severity::Error,
            "alert-circle",
            "Agreement rejected".to_string(),
            format!("{} rejected \"{}\" (No. {})", actor, title, serial),
        ),
        Some(ActivityAction::Correct) => (
            Severity::Warning,
            "alert-triangle",
            "Correction requested".to_string(),
            format!("{} requested corrections to \"{}\"", actor, title),
        ),
        None => (
            Severity::Info,
            "info",
            "Agreement activity".to_string(),
            format!("Activity on \"{}\"", title),
        ),
    };

    FeedItem {
        title: heading,
        description,
        time: time_ago(&view.created_at, now),
        severity,
        icon: icon.to_string(),
    }
}

fn status_change(view: &ActivityView, title: &str) -> (Severity, &'static str, String, String) {
    match view.status_to.as_deref().and_then(|s| s.parse().ok()) {
        Some(AgreementStatus::Aprobado) => (
            Severity::Success,
            "check",
            "Agreement approved".to_string(),
            format!("\"{}\" has been approved", title),
        ),
        Some(AgreementStatus::Rechazado) => (
            Severity::Error,
            "alert-circle",
            "Agreement rejected".to_string(),
            format!("\"{}\" has been rejected", title),
        ),
        Some(AgreementStatus::Revision) => (
            Severity::Info,
            "clock",
            "Agreement under review".to_string(),
            format!("\"{}\" is being reviewed", title),
        ),
        _ => (
            Severity::Info,
            "file",
            "Agreement status changed".to_string(),
            format!(
                "\"{}\" is now {}",
                title,
                view.status_to.as_deref().unwrap_or("in an unknown state")
            ),
        ),
    }
}
