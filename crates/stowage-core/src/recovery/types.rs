//! Descriptor types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Job identifier assigned by the appliance.
pub type JobId = uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BulkJobType {
    PutBulk,
    GetBulk,
}

impl BulkJobType {
    pub fn as_str(self) -> &'static str {
        match self {
            BulkJobType::PutBulk => "PUT_BULK",
            BulkJobType::GetBulk => "GET_BULK",
        }
    }

    /// Label shown to operators, e.g. `recover_put_bulk`.
    pub fn recovery_command(self) -> String {
        format!("recover_{}", self.as_str().to_lowercase())
    }
}

impl fmt::Display for BulkJobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BulkJobType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().replace('-', "_").as_str() {
            "PUT_BULK" | "PUT" => Ok(BulkJobType::PutBulk),
            "GET_BULK" | "GET" => Ok(BulkJobType::GetBulk),
            other => Err(format!("unknown job type: {other}")),
        }
    }
}

/// Persisted record of an in-flight bulk job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub job_type: BulkJobType,
    pub id: JobId,
    pub bucket_name: String,
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default)]
    pub prefixes: Vec<String>,
    pub number_of_threads: usize,
    pub creation_date: DateTime<Utc>,
    #[serde(default)]
    pub recovery_command: String,
}

impl JobDescriptor {
    pub fn new(
        job_type: BulkJobType,
        id: JobId,
        bucket_name: impl Into<String>,
        directory: Option<PathBuf>,
        prefixes: Vec<String>,
        number_of_threads: usize,
    ) -> Self {
        Self {
            job_type,
            id,
            bucket_name: bucket_name.into(),
            directory,
            prefixes,
            number_of_threads,
            creation_date: Utc::now(),
            recovery_command: job_type.recovery_command(),
        }
    }
}

impl fmt::Display for JobDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Bucket: {}, ", self.job_type, self.bucket_name)?;
        match &self.directory {
            Some(dir) => write!(f, "Directory: {}, ", dir.display())?,
            None => write!(f, "Directory: (none), ")?,
        }
        write!(
            f,
            "Created: {}, ID: {}",
            self.creation_date.format("%Y-%m-%d %H:%M:%S UTC"),
            self.id
        )
    }
}

/// Search criteria for `recover`. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobFilter {
    pub id: Option<JobId>,
    pub bucket: Option<String>,
    pub job_type: Option<BulkJobType>,
}

impl JobFilter {
    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.bucket.is_none() && self.job_type.is_none()
    }

    pub fn matches(&self, d: &JobDescriptor) -> bool {
        self.id.map_or(true, |id| id == d.id)
            && self.bucket.as_deref().map_or(true, |b| b == d.bucket_name)
            && self.job_type.map_or(true, |t| t == d.job_type)
    }
}
