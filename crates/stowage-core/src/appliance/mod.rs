//! Seam to the storage appliance and its transfer client.
//!
//! Bulk commands only ever talk to an `Arc<dyn Appliance>`. Job creation,
//! chunk movement and retry belong to the implementation; the orchestrator
//! hands it a job id and an [`ObjectChannels`] that knows where each object
//! lives locally and which metadata travels with it.

mod dir;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

use crate::control::AbortToken;
use crate::health::{FailureCategory, FailureEntry};
use crate::metadata::Metadata;
use crate::recovery::JobId;

pub use dir::DirAppliance;

/// Remote object as listed by the appliance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub name: String,
    pub size: u64,
    pub metadata: Metadata,
    /// Storage-layer creation time. Never used for sync decisions.
    pub created_ms: i64,
}

/// Object to be written by a PUT job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutObject {
    pub name: String,
    pub size: u64,
    /// Lowercase hex SHA-256, verified by the appliance on receipt.
    #[serde(default)]
    pub checksum: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    InProgress,
    Completed,
    Canceled,
}

#[derive(Debug, Clone)]
pub struct TransferOptions {
    /// Maximum objects in flight.
    pub threads: usize,
    pub abort: AbortToken,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferSummary {
    pub objects: usize,
    pub bytes: u64,
}

#[derive(Debug, Error)]
pub enum ApplianceError {
    #[error("job {0} is not known to the appliance")]
    UnknownJob(JobId),
    #[error("job {0} was canceled on the appliance")]
    JobCanceled(JobId),
    #[error("bucket {0} does not exist")]
    NoSuchBucket(String),
    #[error("Object: {name} not found in bucket {bucket}")]
    NoSuchObject { bucket: String, name: String },
    #[error("invalid bucket name {0:?}")]
    InvalidBucketName(String),
    #[error("invalid object name {0:?}")]
    InvalidObjectName(String),
    #[error("checksum mismatch for {name}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        name: String,
        expected: String,
        actual: String,
    },
    #[error("unsupported endpoint {0}; only file:// endpoints are available")]
    UnsupportedEndpoint(String),
}

/// Where object bytes come from (PUT) or go to (GET), and which metadata
/// travels with them. Called from transfer workers, possibly concurrently.
pub trait ObjectChannels: Send + Sync {
    fn local_path(&self, name: &str) -> Result<PathBuf>;

    /// Metadata attached to an object being written.
    fn outgoing_metadata(&self, _name: &str) -> Metadata {
        Metadata::new()
    }

    /// Called after an object has been written locally, with its stored metadata.
    fn object_completed(&self, _name: &str, _metadata: &Metadata) {}
}

#[async_trait]
pub trait Appliance: Send + Sync {
    /// Create the bucket if it does not exist.
    async fn ensure_bucket(&self, bucket: &str) -> Result<()>;

    async fn list_objects(&self, bucket: &str, prefix: Option<&str>) -> Result<Vec<ObjectInfo>>;

    async fn head_object(&self, bucket: &str, name: &str) -> Result<Option<ObjectInfo>>;

    async fn start_write_job(&self, bucket: &str, objects: &[PutObject]) -> Result<JobId>;

    /// Fails with [`ApplianceError::NoSuchObject`] if any name is absent.
    async fn start_read_job(&self, bucket: &str, names: &[String]) -> Result<JobId>;

    /// `None` when the id is unknown (canceled and purged, or expired).
    async fn job_status(&self, id: JobId) -> Result<Option<JobStatus>>;

    async fn cancel_job(&self, id: JobId) -> Result<()>;

    /// `None` when the appliance does not support the category.
    async fn failures(&self, category: FailureCategory) -> Result<Option<Vec<FailureEntry>>>;

    /// Move every object of the job not yet completed. Stops between objects
    /// once the abort token is set, failing with [`crate::control::JobAborted`].
    async fn transfer(
        &self,
        id: JobId,
        channels: Arc<dyn ObjectChannels>,
        options: TransferOptions,
    ) -> Result<TransferSummary>;
}

/// Open the appliance behind `endpoint`.
pub fn connect(endpoint: &str) -> Result<Arc<dyn Appliance>> {
    let url = Url::parse(endpoint)
        .map_err(|e| anyhow::anyhow!("invalid endpoint {endpoint:?}: {e}"))?;
    match url.scheme() {
        "file" => {
            let root = url
                .to_file_path()
                .map_err(|_| anyhow::anyhow!("endpoint {endpoint} is not a local path"))?;
            tracing::debug!(root = %root.display(), "using directory appliance");
            Ok(Arc::new(DirAppliance::open(root)?))
        }
        _ => Err(ApplianceError::UnsupportedEndpoint(endpoint.to_string()).into()),
    }
}

/// Find a typed appliance error anywhere in an error chain.
pub fn find_appliance_error(err: &anyhow::Error) -> Option<&ApplianceError> {
    err.chain().find_map(|e| e.downcast_ref::<ApplianceError>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_accepts_file_endpoints_only() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = Url::from_directory_path(dir.path()).unwrap().to_string();
        assert!(connect(&endpoint).is_ok());

        let err = connect("https://appliance.example:8443").err().unwrap();
        assert!(matches!(
            find_appliance_error(&err),
            Some(ApplianceError::UnsupportedEndpoint(_))
        ));
        assert!(connect("not a url").is_err());
    }
}
