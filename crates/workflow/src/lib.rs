//! Agreement ("convenio") lifecycle.
//!
//! [`Workflow`] is the application service: it authenticates callers,
//! creates agreements with year-scoped serial numbers, applies admin review
//! transitions, and builds the activity feed. Storage is any
//! [`ConvenioStorage`](convenios_storage::ConvenioStorage); identity,
//! document generation, document storage and notifications sit behind the
//! traits in [`ports`].

pub mod activity;
pub mod catalog;
pub mod clock;
pub mod documents;
pub mod draft;
mod error;
pub mod identity;
pub mod notify;
mod outcome;
pub mod ports;
pub mod serial;
mod service;
mod types;

pub use error::WorkflowError;
pub use outcome::{Outcome, Warning};
pub use service::{
    parse_limit, AgreementDetail, Workflow, DEFAULT_ACTIVITY_LIMIT, DEFAULT_AGREEMENT_LIMIT,
};
pub use types::{
    ActivityAction, Agreement, AgreementStatus, AgreementSummary, AgreementTypeSummary,
    CreateAgreement, Identity, Observation, ParseCodeError, ReviewAction, Role,
    TransitionReceipt, TransitionRequest,
};
