//! Sync decision engine: transfer-only-if-newer.
//!
//! Remote timestamps come from object metadata, supplied by the caller. The
//! only I/O performed here is reading local modification times (and, for
//! mirror deletes, walking the local directory).

mod decide;
mod mirror;

pub use decide::{decide, decide_times, RemoteState, SyncCandidate, SyncDecision, TransferDirection};
pub use mirror::{apply_delete_set, mirror_delete_set};
