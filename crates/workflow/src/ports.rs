//! Interfaces to the services the workflow depends on.
//!
//! Adapters shipped with this crate: [`StaticIdentityProvider`](crate::identity::StaticIdentityProvider),
//! [`TemplateAssembler`](crate::documents::TemplateAssembler),
//! [`FsDocumentStore`](crate::documents::FsDocumentStore),
//! [`TracingNotifier`](crate::notify::TracingNotifier) and
//! [`WebhookNotifier`](crate::notify::WebhookNotifier).

use async_trait::async_trait;
use serde::Serialize;

use crate::types::Role;

/// Failure reported by an external service adapter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{service}: {message}")]
pub struct ServiceError {
    pub service: &'static str,
    pub message: String,
}

impl ServiceError {
    pub fn new(service: &'static str, message: impl Into<String>) -> Self {
        ServiceError {
            service,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub user_id: String,
    pub role: Role,
    pub display_name: Option<String>,
    pub email: Option<String>,
}

/// Resolves session tokens to users and users to profiles.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The user a session token belongs to, or `None` if the token is not
    /// recognized.
    async fn resolve_session(&self, token: &str) -> Result<Option<String>, ServiceError>;

    async fn profile(&self, user_id: &str) -> Result<Option<Profile>, ServiceError>;
}

/// One placeholder substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateField {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledDocument {
    pub bytes: Vec<u8>,
    /// File extension without the dot.
    pub extension: String,
}

/// Fills an agreement type's template with field values.
pub trait DocumentAssembler: Send + Sync {
    fn assemble(
        &self,
        template: &str,
        fields: &[TemplateField],
    ) -> Result<AssembledDocument, ServiceError>;
}

/// Review folders a stored document moves between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Folder {
    Pending,
    Approved,
    Rejected,
}

impl Folder {
    pub fn dir_name(&self) -> &'static str {
        match self {
            Folder::Pending => "pending",
            Folder::Approved => "approved",
            Folder::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredDocument {
    pub file_id: String,
    /// Shareable location recorded on the agreement.
    pub location: String,
    /// Hex SHA-256 of the stored bytes, kept in the creation activity entry.
    pub checksum: String,
}

/// Durable home for generated documents. New uploads land in
/// [`Folder::Pending`].
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn upload(&self, bytes: Vec<u8>, file_name: &str)
        -> Result<StoredDocument, ServiceError>;

    async fn move_to_folder(&self, file_id: &str, folder: Folder) -> Result<(), ServiceError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Delivers review outcomes to agreement owners.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), ServiceError>;
}
