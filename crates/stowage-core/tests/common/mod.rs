//! Shared helpers for the bulk job integration tests.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use filetime::FileTime;
use std::path::Path;
use std::sync::Arc;
use stowage_core::appliance::{
    Appliance, DirAppliance, JobStatus, ObjectChannels, ObjectInfo, PutObject, TransferOptions,
    TransferSummary,
};
use stowage_core::bulk::BulkContext;
use stowage_core::health::{FailureCategory, FailureEntry};
use stowage_core::recovery::{JobId, RecoveryStore};

/// Seconds since the epoch used as the "original" mtime in tests.
pub const T0_SECS: i64 = 1_700_000_000;
pub const T0_MS: i64 = T0_SECS * 1000;

/// Write `data` to `root/rel` and pin its mtime to `secs`.
pub fn write_file(root: &Path, rel: &str, data: &[u8], secs: i64) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, data).unwrap();
    filetime::set_file_mtime(&path, FileTime::from_unix_time(secs, 0)).unwrap();
}

pub fn context(appliance: Arc<dyn Appliance>, recovery_dir: &Path) -> BulkContext {
    BulkContext::new(appliance, RecoveryStore::new(recovery_dir.to_path_buf()))
}

pub fn tape_failure() -> FailureEntry {
    FailureEntry {
        id: "f-1".into(),
        resource_id: Some("TAPE0001".into()),
        date: chrono::Utc::now(),
        error_type: "DRIVE_ERROR".into(),
        message: "drive reported a media error".into(),
    }
}

pub fn set_tape_failure(appliance: &DirAppliance, category: FailureCategory) {
    appliance.set_failures(category, &[tape_failure()]).unwrap();
}

/// Wraps a [`DirAppliance`] whose transfers fail before moving any object,
/// like a link that drops right after the job is created.
pub struct CrashingAppliance {
    pub inner: DirAppliance,
}

#[async_trait]
impl Appliance for CrashingAppliance {
    async fn ensure_bucket(&self, bucket: &str) -> Result<()> {
        self.inner.ensure_bucket(bucket).await
    }

    async fn list_objects(&self, bucket: &str, prefix: Option<&str>) -> Result<Vec<ObjectInfo>> {
        self.inner.list_objects(bucket, prefix).await
    }

    async fn head_object(&self, bucket: &str, name: &str) -> Result<Option<ObjectInfo>> {
        self.inner.head_object(bucket, name).await
    }

    async fn start_write_job(&self, bucket: &str, objects: &[PutObject]) -> Result<JobId> {
        self.inner.start_write_job(bucket, objects).await
    }

    async fn start_read_job(&self, bucket: &str, names: &[String]) -> Result<JobId> {
        self.inner.start_read_job(bucket, names).await
    }

    async fn job_status(&self, id: JobId) -> Result<Option<JobStatus>> {
        self.inner.job_status(id).await
    }

    async fn cancel_job(&self, id: JobId) -> Result<()> {
        self.inner.cancel_job(id).await
    }

    async fn failures(&self, category: FailureCategory) -> Result<Option<Vec<FailureEntry>>> {
        self.inner.failures(category).await
    }

    async fn transfer(
        &self,
        _id: JobId,
        _channels: Arc<dyn ObjectChannels>,
        _options: TransferOptions,
    ) -> Result<TransferSummary> {
        anyhow::bail!("connection reset by appliance")
    }
}
