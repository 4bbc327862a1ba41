//! Mapping from error class to operator-facing rendering.
//!
//! Built once by the CLI and passed to the command runner. Tests construct
//! their own mapping with [`ErrorHandlers::with`].

use std::collections::HashMap;
use std::fmt;

use crate::bulk::{JobInterrupted, NonResumableJob, RecoverSelectionError};
use crate::health::HealthCheckFailed;
use crate::recovery::RecoveryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    HealthCheck,
    DescriptorNotFound,
    DescriptorCorrupt,
    NonResumableJob,
    Interrupted,
    RecoverSelection,
    Other,
}

type Render = Box<dyn Fn(&anyhow::Error) -> String + Send + Sync>;

/// Find a typed error at the top of `err` or anywhere in its chain.
fn find<T: std::error::Error + Send + Sync + 'static>(err: &anyhow::Error) -> Option<&T> {
    err.downcast_ref::<T>()
        .or_else(|| err.chain().find_map(|e| e.downcast_ref::<T>()))
}

pub fn classify(err: &anyhow::Error) -> ErrorClass {
    if find::<HealthCheckFailed>(err).is_some() {
        return ErrorClass::HealthCheck;
    }
    if let Some(e) = find::<RecoveryError>(err) {
        return match e {
            RecoveryError::NotFound(_) => ErrorClass::DescriptorNotFound,
            RecoveryError::Corrupt { .. } => ErrorClass::DescriptorCorrupt,
            RecoveryError::Io { .. } => ErrorClass::Other,
        };
    }
    if find::<NonResumableJob>(err).is_some() {
        return ErrorClass::NonResumableJob;
    }
    if find::<JobInterrupted>(err).is_some() {
        return ErrorClass::Interrupted;
    }
    if find::<RecoverSelectionError>(err).is_some() {
        return ErrorClass::RecoverSelection;
    }
    ErrorClass::Other
}

pub struct ErrorHandlers {
    renderers: HashMap<ErrorClass, Render>,
}

impl ErrorHandlers {
    /// Mapping with no specialised renderers; every error renders as `stowage error: {:#}`.
    pub fn empty() -> Self {
        Self {
            renderers: HashMap::new(),
        }
    }

    pub fn standard() -> Self {
        Self::empty()
            .with(ErrorClass::HealthCheck, |err| {
                find::<HealthCheckFailed>(err)
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| format!("{err:#}"))
            })
            .with(ErrorClass::DescriptorNotFound, |err| {
                format!("{err:#}\nRun `stowage recover` to list recoverable jobs.")
            })
            .with(ErrorClass::DescriptorCorrupt, |err| format!("{err:#}"))
            .with(ErrorClass::NonResumableJob, |err| {
                find::<NonResumableJob>(err)
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| format!("{err:#}"))
            })
            .with(ErrorClass::Interrupted, |err| {
                let id = find::<JobInterrupted>(err).map(|e| e.job_id.to_string());
                format!(
                    "{err:#}\nThe recovery descriptor was kept; run `stowage recover --id {}` to inspect it.",
                    id.as_deref().unwrap_or("<job-id>")
                )
            })
            .with(ErrorClass::RecoverSelection, |err| {
                find::<RecoverSelectionError>(err)
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| format!("{err:#}"))
            })
    }

    /// Replace the renderer for `class`.
    pub fn with<F>(mut self, class: ErrorClass, render: F) -> Self
    where
        F: Fn(&anyhow::Error) -> String + Send + Sync + 'static,
    {
        self.renderers.insert(class, Box::new(render));
        self
    }

    pub fn render(&self, err: &anyhow::Error) -> String {
        match self.renderers.get(&classify(err)) {
            Some(render) => render(err),
            None => format!("stowage error: {err:#}"),
        }
    }
}

impl Default for ErrorHandlers {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Debug for ErrorHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorHandlers")
            .field("classes", &self.renderers.keys().collect::<Vec<_>>())
            .finish()
    }
}
