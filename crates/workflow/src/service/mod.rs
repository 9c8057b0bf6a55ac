//! The [`Workflow`] application service.
//!
//! Operations are split by concern: creation in `create`, admin review in
//! `review`, read models in `query` and drafts in `drafts`.

mod create;
mod drafts;
mod query;
mod review;

use std::sync::Arc;

use convenios_storage::ConvenioStorage;
use time::OffsetDateTime;

use crate::clock::{system_clock, Clock};
use crate::error::WorkflowError;
use crate::ports::{DocumentAssembler, DocumentStore, IdentityProvider, Notifier};
use crate::types::{Identity, Role};

pub use query::{parse_limit, AgreementDetail, DEFAULT_ACTIVITY_LIMIT, DEFAULT_AGREEMENT_LIMIT};

/// Agreement workflow over a storage backend and external services.
pub struct Workflow<S: ConvenioStorage> {
    storage: Arc<S>,
    identity: Arc<dyn IdentityProvider>,
    assembler: Arc<dyn DocumentAssembler>,
    documents: Arc<dyn DocumentStore>,
    notifier: Arc<dyn Notifier>,
    clock: Clock,
}

impl<S: ConvenioStorage> Workflow<S> {
    pub fn new(
        storage: Arc<S>,
        identity: Arc<dyn IdentityProvider>,
        assembler: Arc<dyn DocumentAssembler>,
        documents: Arc<dyn DocumentStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Workflow {
            storage,
            identity,
            assembler,
            documents,
            notifier,
            clock: system_clock(),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    fn now(&self) -> OffsetDateTime {
        (self.clock)()
    }

    /// Resolve the caller behind a session token.
    ///
    /// A missing token, an unknown token, and a token whose user has no
    /// profile all fail with `Unauthenticated`.
    pub async fn authenticate(&self, session: Option<&str>) -> Result<Identity, WorkflowError> {
        let token = session
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(WorkflowError::Unauthenticated)?;
        let user_id = self
            .identity
            .resolve_session(token)
            .await?
            .ok_or(WorkflowError::Unauthenticated)?;
        let profile = self
            .identity
            .profile(&user_id)
            .await?
            .ok_or(WorkflowError::Unauthenticated)?;
        Ok(Identity {
            user_id,
            role: profile.role,
            display_name: profile.display_name,
            email: profile.email,
        })
    }

    /// Authenticate and require the admin role.
    pub async fn require_admin(&self, session: Option<&str>) -> Result<Identity, WorkflowError> {
        let identity = self.authenticate(session).await?;
        if identity.role != Role::Admin {
            return Err(WorkflowError::Unauthorized);
        }
        Ok(identity)
    }
}
