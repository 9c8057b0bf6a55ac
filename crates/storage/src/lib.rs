pub mod conformance;
mod error;
mod memory;
mod record;
mod traits;

pub use error::StorageError;
pub use memory::{MemorySnapshot, MemoryStorage};
pub use record::{
    ActivityRecord, AgreementRecord, AgreementTypeRecord, AgreementUpdate, DraftRecord,
    ObservationRecord,
};
pub use traits::ConvenioStorage;
