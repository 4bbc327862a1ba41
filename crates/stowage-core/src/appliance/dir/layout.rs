//! On-disk layout of the directory appliance and its blocking operations.
//!
//! ```text
//! <root>/buckets/<bucket>/data/<name>
//! <root>/buckets/<bucket>/meta/<name>.json
//! <root>/jobs/<job-id>.json
//! <root>/failures/<category>.json   (absent: category unsupported)
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use walkdir::WalkDir;

use crate::appliance::{ApplianceError, JobStatus, ObjectChannels, ObjectInfo, PutObject};
use crate::checksum;
use crate::health::{FailureCategory, FailureEntry};
use crate::metadata::Metadata;
use crate::names;
use crate::recovery::JobId;
use crate::storage::{self, StagedCopy};

const META_SUFFIX: &str = ".json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct ObjectRecord {
    pub name: String,
    pub size: u64,
    #[serde(default)]
    pub metadata: Metadata,
    pub created_ms: i64,
    #[serde(default)]
    pub checksum: Option<String>,
}

impl ObjectRecord {
    fn info(self) -> ObjectInfo {
        ObjectInfo {
            name: self.name,
            size: self.size,
            metadata: self.metadata,
            created_ms: self.created_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(super) enum JobDirection {
    Put,
    Get,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct JobObject {
    pub name: String,
    pub size: u64,
    #[serde(default)]
    pub checksum: Option<String>,
    #[serde(default)]
    pub done: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct JobRecord {
    pub id: JobId,
    pub bucket: String,
    pub direction: JobDirection,
    pub status: JobStatus,
    pub created: DateTime<Utc>,
    pub objects: Vec<JobObject>,
}

#[derive(Debug, Clone)]
pub(super) struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_dir(&self, bucket: &str) -> Result<PathBuf> {
        if bucket.is_empty() || bucket == "." || bucket == ".." || bucket.contains(['/', '\\']) {
            return Err(ApplianceError::InvalidBucketName(bucket.to_string()).into());
        }
        Ok(self.root.join("buckets").join(bucket))
    }

    fn existing_bucket_dir(&self, bucket: &str) -> Result<PathBuf> {
        let dir = self.bucket_dir(bucket)?;
        if !dir.is_dir() {
            return Err(ApplianceError::NoSuchBucket(bucket.to_string()).into());
        }
        Ok(dir)
    }

    fn data_path(&self, bucket_dir: &Path, name: &str) -> Result<PathBuf> {
        names::local_path_for(&bucket_dir.join("data"), name, None)
            .map_err(|_| ApplianceError::InvalidObjectName(name.to_string()).into())
    }

    fn meta_path(&self, bucket_dir: &Path, name: &str) -> Result<PathBuf> {
        let base = names::local_path_for(&bucket_dir.join("meta"), name, None)
            .map_err(|_| anyhow::Error::from(ApplianceError::InvalidObjectName(name.to_string())))?;
        let mut o = base.into_os_string();
        o.push(META_SUFFIX);
        Ok(PathBuf::from(o))
    }

    fn job_path(&self, id: JobId) -> PathBuf {
        self.root.join("jobs").join(format!("{id}.json"))
    }

    pub fn failures_path(&self, category: FailureCategory) -> PathBuf {
        self.root.join("failures").join(format!("{}.json", category.key()))
    }

    pub fn ensure_bucket(&self, bucket: &str) -> Result<()> {
        let dir = self.bucket_dir(bucket)?;
        for sub in ["data", "meta"] {
            fs::create_dir_all(dir.join(sub))
                .with_context(|| format!("create bucket {bucket}"))?;
        }
        Ok(())
    }

    fn read_object(&self, bucket_dir: &Path, name: &str) -> Result<Option<ObjectRecord>> {
        let path = self.meta_path(bucket_dir, name)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(
                serde_json::from_slice(&bytes)
                    .with_context(|| format!("parse object record {}", path.display()))?,
            )),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("read {}", path.display())),
        }
    }

    pub fn head_object(&self, bucket: &str, name: &str) -> Result<Option<ObjectInfo>> {
        let dir = self.existing_bucket_dir(bucket)?;
        Ok(self.read_object(&dir, name)?.map(ObjectRecord::info))
    }

    pub fn list_objects(&self, bucket: &str, prefix: Option<&str>) -> Result<Vec<ObjectInfo>> {
        let dir = self.existing_bucket_dir(bucket)?;
        let meta_root = dir.join("meta");
        let mut out = Vec::new();
        for entry in WalkDir::new(&meta_root).min_depth(1).sort_by_file_name() {
            let entry = entry.with_context(|| format!("list bucket {bucket}"))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let is_record = entry
                .file_name()
                .to_str()
                .is_some_and(|n| n.ends_with(META_SUFFIX));
            if !is_record {
                continue;
            }
            let bytes = fs::read(entry.path())
                .with_context(|| format!("read {}", entry.path().display()))?;
            let record: ObjectRecord = serde_json::from_slice(&bytes)
                .with_context(|| format!("parse object record {}", entry.path().display()))?;
            if prefix.map_or(true, |p| record.name.starts_with(p)) {
                out.push(record.info());
            }
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    /// Store an object directly, outside any job.
    pub fn import_object(
        &self,
        bucket: &str,
        name: &str,
        data: &[u8],
        metadata: Metadata,
    ) -> Result<()> {
        self.ensure_bucket(bucket)?;
        let dir = self.existing_bucket_dir(bucket)?;
        let data_path = self.data_path(&dir, name)?;
        storage::write_atomic(&data_path, data)
            .with_context(|| format!("write {}", data_path.display()))?;
        self.write_object_record(
            &dir,
            ObjectRecord {
                name: name.to_string(),
                size: data.len() as u64,
                metadata,
                created_ms: Utc::now().timestamp_millis(),
                checksum: None,
            },
        )
    }

    fn write_object_record(&self, bucket_dir: &Path, record: ObjectRecord) -> Result<()> {
        let path = self.meta_path(bucket_dir, &record.name)?;
        let body = serde_json::to_vec_pretty(&record)?;
        storage::write_atomic(&path, &body).with_context(|| format!("write {}", path.display()))
    }

    pub fn create_put_job(&self, bucket: &str, objects: &[PutObject]) -> Result<JobId> {
        let dir = self.existing_bucket_dir(bucket)?;
        let mut job_objects = Vec::with_capacity(objects.len());
        for object in objects {
            self.data_path(&dir, &object.name)?;
            job_objects.push(JobObject {
                name: object.name.clone(),
                size: object.size,
                checksum: object.checksum.clone(),
                done: false,
            });
        }
        self.create_job(bucket, JobDirection::Put, job_objects)
    }

    pub fn create_get_job(&self, bucket: &str, names: &[String]) -> Result<JobId> {
        let dir = self.existing_bucket_dir(bucket)?;
        let mut job_objects = Vec::with_capacity(names.len());
        for name in names {
            let record = self.read_object(&dir, name)?.ok_or_else(|| {
                ApplianceError::NoSuchObject {
                    bucket: bucket.to_string(),
                    name: name.clone(),
                }
            })?;
            job_objects.push(JobObject {
                name: name.clone(),
                size: record.size,
                checksum: record.checksum,
                done: false,
            });
        }
        self.create_job(bucket, JobDirection::Get, job_objects)
    }

    fn create_job(&self, bucket: &str, direction: JobDirection, objects: Vec<JobObject>) -> Result<JobId> {
        let record = JobRecord {
            id: JobId::new_v4(),
            bucket: bucket.to_string(),
            direction,
            status: JobStatus::InProgress,
            created: Utc::now(),
            objects,
        };
        self.save_job(&record)?;
        tracing::info!(job_id = %record.id, bucket, ?direction, objects = record.objects.len(), "created job");
        Ok(record.id)
    }

    pub fn load_job(&self, id: JobId) -> Result<Option<JobRecord>> {
        let path = self.job_path(id);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(
                serde_json::from_slice(&bytes)
                    .with_context(|| format!("parse job record {}", path.display()))?,
            )),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("read {}", path.display())),
        }
    }

    pub fn require_job(&self, id: JobId) -> Result<JobRecord> {
        self.load_job(id)?
            .ok_or_else(|| ApplianceError::UnknownJob(id).into())
    }

    fn save_job(&self, record: &JobRecord) -> Result<()> {
        let path = self.job_path(record.id);
        let body = serde_json::to_vec_pretty(record)?;
        storage::write_atomic(&path, &body).with_context(|| format!("write {}", path.display()))
    }

    pub fn cancel_job(&self, id: JobId, lock: &Mutex<()>) -> Result<()> {
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut record = self.require_job(id)?;
        if record.status == JobStatus::InProgress {
            record.status = JobStatus::Canceled;
            self.save_job(&record)?;
            tracing::info!(job_id = %id, "canceled job");
        }
        Ok(())
    }

    /// Record one object as done. Re-reads the job so a cancel from another
    /// process is noticed and not overwritten.
    fn mark_done(&self, id: JobId, name: &str, lock: &Mutex<()>) -> Result<()> {
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut record = self.require_job(id)?;
        if record.status == JobStatus::Canceled {
            return Err(ApplianceError::JobCanceled(id).into());
        }
        if let Some(object) = record.objects.iter_mut().find(|o| o.name == name) {
            object.done = true;
        }
        self.save_job(&record)
    }

    /// Mark the job completed once every object is done.
    pub fn finish_job(&self, id: JobId, lock: &Mutex<()>) -> Result<JobStatus> {
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut record = self.require_job(id)?;
        match record.status {
            JobStatus::Canceled => return Err(ApplianceError::JobCanceled(id).into()),
            JobStatus::Completed => return Ok(JobStatus::Completed),
            JobStatus::InProgress => {}
        }
        if record.objects.iter().all(|o| o.done) {
            record.status = JobStatus::Completed;
            self.save_job(&record)?;
            tracing::info!(job_id = %id, "job completed");
        }
        Ok(record.status)
    }

    /// Move one object of a job and record it as done. Returns bytes moved.
    pub fn move_object(
        &self,
        job: &JobRecord,
        object: &JobObject,
        channels: &dyn ObjectChannels,
        lock: &Mutex<()>,
    ) -> Result<u64> {
        let dir = self.existing_bucket_dir(&job.bucket)?;
        let bytes = match job.direction {
            JobDirection::Put => self.receive_object(&dir, object, channels)?,
            JobDirection::Get => self.send_object(&job.bucket, &dir, object, channels)?,
        };
        self.mark_done(job.id, &object.name, lock)?;
        tracing::debug!(job_id = %job.id, object = %object.name, bytes, "object done");
        Ok(bytes)
    }

    fn receive_object(
        &self,
        bucket_dir: &Path,
        object: &JobObject,
        channels: &dyn ObjectChannels,
    ) -> Result<u64> {
        let src = channels.local_path(&object.name)?;
        let dst = self.data_path(bucket_dir, &object.name)?;
        let staged = StagedCopy::create(&src, &dst)
            .with_context(|| format!("copy {} into appliance", src.display()))?;
        if let Some(expected) = &object.checksum {
            let actual = checksum::sha256_path(staged.temp_path())?;
            if !checksum::digest_matches(expected, &actual) {
                staged.discard();
                return Err(ApplianceError::ChecksumMismatch {
                    name: object.name.clone(),
                    expected: expected.clone(),
                    actual,
                }
                .into());
            }
        }
        let bytes = staged
            .finalize()
            .with_context(|| format!("finalize {}", dst.display()))?;
        self.write_object_record(
            bucket_dir,
            ObjectRecord {
                name: object.name.clone(),
                size: bytes,
                metadata: channels.outgoing_metadata(&object.name),
                created_ms: Utc::now().timestamp_millis(),
                checksum: object.checksum.clone(),
            },
        )?;
        Ok(bytes)
    }

    fn send_object(
        &self,
        bucket: &str,
        bucket_dir: &Path,
        object: &JobObject,
        channels: &dyn ObjectChannels,
    ) -> Result<u64> {
        let record = self
            .read_object(bucket_dir, &object.name)?
            .ok_or_else(|| ApplianceError::NoSuchObject {
                bucket: bucket.to_string(),
                name: object.name.clone(),
            })?;
        let src = self.data_path(bucket_dir, &object.name)?;
        let dst = channels.local_path(&object.name)?;
        let bytes = StagedCopy::create(&src, &dst)
            .and_then(StagedCopy::finalize)
            .with_context(|| format!("write {}", dst.display()))?;
        channels.object_completed(&object.name, &record.metadata);
        Ok(bytes)
    }

    pub fn failures(&self, category: FailureCategory) -> Result<Option<Vec<FailureEntry>>> {
        let path = self.failures_path(category);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(
                serde_json::from_slice(&bytes)
                    .with_context(|| format!("parse {}", path.display()))?,
            )),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("read {}", path.display())),
        }
    }

    pub fn write_failures(&self, category: FailureCategory, entries: &[FailureEntry]) -> Result<()> {
        let path = self.failures_path(category);
        let body = serde_json::to_vec_pretty(entries)?;
        storage::write_atomic(&path, &body).with_context(|| format!("write {}", path.display()))
    }
}
