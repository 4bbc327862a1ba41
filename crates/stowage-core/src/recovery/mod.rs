//! Recovery descriptors: one JSON file per in-flight bulk job.
//!
//! A descriptor is written before any data moves and removed only once the
//! appliance confirms the job completed, so a later process can find and
//! resume (or clean up) the job.

mod error;
mod store;
mod types;

pub use error::RecoveryError;
pub use store::{
    default_recovery_dir, DeletedDescriptor, DescriptorIter, RecoveryStore, DESCRIPTOR_EXTENSION,
};
pub use types::{BulkJobType, JobDescriptor, JobFilter, JobId};
