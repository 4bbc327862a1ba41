//! Directory-backed appliance for offline staging and tests.
//!
//! Objects, metadata, jobs and failure reports are plain files under one
//! root (see `layout`). Every job records per-object progress after each
//! object, so a transfer interrupted at any point resumes with what is left.

mod layout;

use anyhow::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::{
    Appliance, ApplianceError, JobStatus, ObjectChannels, ObjectInfo, PutObject, TransferOptions,
    TransferSummary,
};
use crate::control::JobAborted;
use crate::health::{FailureCategory, FailureEntry};
use crate::metadata::Metadata;
use crate::recovery::JobId;

use layout::Layout;

#[derive(Debug, Clone)]
pub struct DirAppliance {
    layout: Layout,
    /// Serializes job-record updates within this process.
    job_lock: Arc<Mutex<()>>,
}

impl DirAppliance {
    /// Open (creating if needed) an appliance rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        for sub in ["buckets", "jobs"] {
            std::fs::create_dir_all(root.join(sub)).map_err(|e| {
                anyhow::anyhow!("create appliance dir {}: {}", root.join(sub).display(), e)
            })?;
        }
        Ok(Self {
            layout: Layout::new(root),
            job_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    /// Store an object outside of any job (seeding, tests).
    pub fn import_object(
        &self,
        bucket: &str,
        name: &str,
        data: &[u8],
        metadata: Metadata,
    ) -> Result<()> {
        self.layout.import_object(bucket, name, data, metadata)
    }

    /// Replace the failure list for `category`; an empty list marks it supported and clean.
    pub fn set_failures(&self, category: FailureCategory, entries: &[FailureEntry]) -> Result<()> {
        self.layout.write_failures(category, entries)
    }

    /// Make `category` unsupported again.
    pub fn clear_failures(&self, category: FailureCategory) -> Result<()> {
        match std::fs::remove_file(self.layout.failures_path(category)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Layout, &Mutex<()>) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let layout = self.layout.clone();
        let lock = Arc::clone(&self.job_lock);
        tokio::task::spawn_blocking(move || f(&layout, &lock))
            .await
            .map_err(|e| anyhow::anyhow!("appliance task join: {}", e))?
    }
}

#[async_trait]
impl Appliance for DirAppliance {
    async fn ensure_bucket(&self, bucket: &str) -> Result<()> {
        let bucket = bucket.to_string();
        self.blocking(move |l, _| l.ensure_bucket(&bucket)).await
    }

    async fn list_objects(&self, bucket: &str, prefix: Option<&str>) -> Result<Vec<ObjectInfo>> {
        let bucket = bucket.to_string();
        let prefix = prefix.map(str::to_string);
        self.blocking(move |l, _| l.list_objects(&bucket, prefix.as_deref()))
            .await
    }

    async fn head_object(&self, bucket: &str, name: &str) -> Result<Option<ObjectInfo>> {
        let bucket = bucket.to_string();
        let name = name.to_string();
        self.blocking(move |l, _| l.head_object(&bucket, &name)).await
    }

    async fn start_write_job(&self, bucket: &str, objects: &[PutObject]) -> Result<JobId> {
        let bucket = bucket.to_string();
        let objects = objects.to_vec();
        self.blocking(move |l, _| l.create_put_job(&bucket, &objects))
            .await
    }

    async fn start_read_job(&self, bucket: &str, names: &[String]) -> Result<JobId> {
        let bucket = bucket.to_string();
        let names = names.to_vec();
        self.blocking(move |l, _| l.create_get_job(&bucket, &names)).await
    }

    async fn job_status(&self, id: JobId) -> Result<Option<JobStatus>> {
        self.blocking(move |l, _| Ok(l.load_job(id)?.map(|job| job.status)))
            .await
    }

    async fn cancel_job(&self, id: JobId) -> Result<()> {
        self.blocking(move |l, lock| l.cancel_job(id, lock)).await
    }

    async fn failures(&self, category: FailureCategory) -> Result<Option<Vec<FailureEntry>>> {
        self.blocking(move |l, _| l.failures(category)).await
    }

    async fn transfer(
        &self,
        id: JobId,
        channels: Arc<dyn ObjectChannels>,
        options: TransferOptions,
    ) -> Result<TransferSummary> {
        let job = self.blocking(move |l, _| l.require_job(id)).await?;
        match job.status {
            JobStatus::Canceled => return Err(ApplianceError::JobCanceled(id).into()),
            JobStatus::Completed => return Ok(TransferSummary::default()),
            JobStatus::InProgress => {}
        }

        let job = Arc::new(job);
        let mut pending: VecDeque<usize> = job
            .objects
            .iter()
            .enumerate()
            .filter(|(_, o)| !o.done)
            .map(|(i, _)| i)
            .collect();
        tracing::info!(job_id = %id, pending = pending.len(), threads = options.threads, "transfer started");

        let max_in_flight = options.threads.max(1);
        let mut join_set = tokio::task::JoinSet::new();
        let mut summary = TransferSummary::default();
        let mut first_error: Option<anyhow::Error> = None;

        loop {
            while join_set.len() < max_in_flight
                && first_error.is_none()
                && !options.abort.is_aborted()
            {
                let Some(index) = pending.pop_front() else {
                    break;
                };
                let layout = self.layout.clone();
                let lock = Arc::clone(&self.job_lock);
                let job = Arc::clone(&job);
                let channels = Arc::clone(&channels);
                join_set.spawn_blocking(move || {
                    layout.move_object(&job, &job.objects[index], channels.as_ref(), &lock)
                });
            }

            let Some(res) = join_set.join_next().await else {
                break;
            };
            match res.map_err(|e| anyhow::anyhow!("transfer task join: {}", e)) {
                Ok(Ok(bytes)) => {
                    summary.objects += 1;
                    summary.bytes += bytes;
                }
                Ok(Err(e)) | Err(e) => {
                    tracing::error!(job_id = %id, "object transfer failed: {:#}", e);
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e.context(format!("transfer for job {id}")));
        }
        if !pending.is_empty() {
            tracing::info!(job_id = %id, remaining = pending.len(), "transfer stopped by abort");
            return Err(JobAborted.into());
        }

        self.blocking(move |l, lock| l.finish_job(id, lock)).await?;
        tracing::info!(job_id = %id, objects = summary.objects, bytes = summary.bytes, "transfer finished");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests;
