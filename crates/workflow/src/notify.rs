//! Owner notifications for review outcomes.

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::ports::{Notification, Notifier, ServiceError};
use crate::types::ReviewAction;

const WEBHOOK: &str = "notification webhook";

/// Upper bound on one webhook delivery, connect through response.
pub const DEFAULT_WEBHOOK_TIMEOUT: Duration = Duration::from_secs(5);

/// Build the message sent to an agreement owner after a review.
pub fn review_notification(
    to: &str,
    action: ReviewAction,
    title: &str,
    serial_number: &str,
    observation: Option<&str>,
) -> Notification {
    let mut body = format!(
        "Your agreement \"{}\" (No. {}) is now {}: {}.",
        title,
        serial_number,
        action.target_status(),
        action.outcome_phrase()
    );
    if let Some(text) = observation {
        body.push_str("\n\nObservations: ");
        body.push_str(text);
    }
    Notification {
        to: to.to_string(),
        subject: format!("Agreement {}", action.outcome_phrase()),
        body,
    }
}

/// Writes notifications to the log instead of delivering them.
#[derive(Debug, Clone, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), ServiceError> {
        info!(
            to = %notification.to,
            subject = %notification.subject,
            body = %notification.body,
            "notification"
        );
        Ok(())
    }
}

/// POSTs each notification as JSON to a webhook. A delivery that exceeds
/// the timeout fails like any other delivery error.
#[derive(Clone)]
pub struct WebhookNotifier {
    url: String,
    agent: ureq::Agent,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_timeout(url, DEFAULT_WEBHOOK_TIMEOUT)
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        WebhookNotifier {
            url: url.into(),
            agent,
        }
    }
}

fn post_notification(
    agent: &ureq::Agent,
    url: &str,
    notification: &Notification,
) -> Result<(), ServiceError> {
    agent
        .post(url)
        .header("content-type", "application/json")
        .send_json(notification)
        .map_err(|e| ServiceError::new(WEBHOOK, format!("request failed: {}", e)))?;
    Ok(())
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), ServiceError> {
        // ureq is synchronous
        let agent = self.agent.clone();
        let url = self.url.clone();
        let notification = notification.clone();
        tokio::task::spawn_blocking(move || post_notification(&agent, &url, &notification))
            .await
            .map_err(|e| ServiceError::new(WEBHOOK, format!("task join error: {}", e)))?
    }
}
