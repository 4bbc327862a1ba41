//! Cooperative cancellation for running transfers.
//!
//! The CLI holds an [`AbortToken`] and flips it on Ctrl-C; the transfer loop
//! checks it between objects and stops with [`JobAborted`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Error returned when a transfer is stopped by the operator.
#[derive(Debug, Error)]
#[error("job aborted by user")]
pub struct JobAborted;

/// Shared abort flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct AbortToken(Arc<AtomicBool>);

impl AbortToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every holder of this token to stop at the next checkpoint.
    pub fn request_abort(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn check(&self) -> Result<(), JobAborted> {
        if self.is_aborted() {
            Err(JobAborted)
        } else {
            Ok(())
        }
    }
}

/// True if `err` (or anything in its chain) is a [`JobAborted`].
pub fn is_aborted(err: &anyhow::Error) -> bool {
    err.chain().any(|e| e.downcast_ref::<JobAborted>().is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let token = AbortToken::new();
        let worker = token.clone();
        assert!(worker.check().is_ok());
        token.request_abort();
        assert!(worker.is_aborted());
        assert!(worker.check().is_err());
    }

    #[test]
    fn aborted_is_found_through_context() {
        let err = anyhow::Error::new(JobAborted).context("transfer job 1");
        assert!(is_aborted(&err));
        assert!(!is_aborted(&anyhow::anyhow!("disk full")));
    }
}
