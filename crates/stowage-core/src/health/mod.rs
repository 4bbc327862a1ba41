//! Pre-flight failure gate.
//!
//! Before a bulk job starts, the four failure categories are queried from the
//! appliance. Outstanding failures refuse the job unless the operator forces
//! it. Nothing is cached between calls.

mod table;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::appliance::Appliance;

pub use table::render_report;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    System,
    Pool,
    StorageDomain,
    Tape,
}

impl FailureCategory {
    pub const ALL: [FailureCategory; 4] = [
        FailureCategory::System,
        FailureCategory::Pool,
        FailureCategory::StorageDomain,
        FailureCategory::Tape,
    ];

    /// File stem used by the directory appliance (`failures/<key>.json`).
    pub fn key(self) -> &'static str {
        match self {
            FailureCategory::System => "system",
            FailureCategory::Pool => "pool",
            FailureCategory::StorageDomain => "storage_domain",
            FailureCategory::Tape => "tape",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            FailureCategory::System => "System Failures",
            FailureCategory::Pool => "Pool Failures",
            FailureCategory::StorageDomain => "Storage Domain Failures",
            FailureCategory::Tape => "Tape Failures",
        }
    }

    /// Header for the associated-resource column; system failures have none.
    pub fn resource_header(self) -> Option<&'static str> {
        match self {
            FailureCategory::System => None,
            FailureCategory::Pool => Some("Pool ID"),
            FailureCategory::StorageDomain => Some("Storage Domain ID"),
            FailureCategory::Tape => Some("Tape ID"),
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// One outstanding failure as reported by the appliance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureEntry {
    pub id: String,
    #[serde(default)]
    pub resource_id: Option<String>,
    pub date: DateTime<Utc>,
    pub error_type: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureReport {
    pub category: FailureCategory,
    pub entries: Vec<FailureEntry>,
}

impl FailureReport {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Refusal raised by the gate. Renders every non-empty category.
#[derive(Debug, Error)]
pub struct HealthCheckFailed {
    /// First category with failures.
    pub category: FailureCategory,
    pub reports: Vec<FailureReport>,
}

impl fmt::Display for HealthCheckFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "appliance reports outstanding failures:")?;
        for report in &self.reports {
            writeln!(f)?;
            f.write_str(&render_report(report))?;
        }
        writeln!(f)?;
        write!(f, "To ignore this error use --force")
    }
}

/// Query all four categories. Unsupported categories come back empty.
pub async fn collect_failures(appliance: &dyn Appliance) -> Result<Vec<FailureReport>> {
    let mut reports = Vec::with_capacity(FailureCategory::ALL.len());
    for category in FailureCategory::ALL {
        let entries = match appliance.failures(category).await? {
            Some(entries) => entries,
            None => {
                tracing::debug!(%category, "failure category not supported by appliance");
                Vec::new()
            }
        };
        reports.push(FailureReport { category, entries });
    }
    Ok(reports)
}

/// Gate a bulk job. Returns the non-empty reports that were overridden by
/// `force`; fails with [`HealthCheckFailed`] when not forced.
pub async fn check_health(appliance: &dyn Appliance, force: bool) -> Result<Vec<FailureReport>> {
    let outstanding: Vec<FailureReport> = collect_failures(appliance)
        .await?
        .into_iter()
        .filter(|r| !r.is_empty())
        .collect();

    let Some(first) = outstanding.first() else {
        tracing::debug!("health check passed");
        return Ok(Vec::new());
    };

    if !force {
        return Err(HealthCheckFailed {
            category: first.category,
            reports: outstanding,
        }
        .into());
    }

    for report in &outstanding {
        for entry in &report.entries {
            tracing::warn!(
                category = %report.category,
                id = %entry.id,
                error_type = %entry.error_type,
                "ignoring appliance failure (--force): {}",
                entry.message
            );
        }
    }
    Ok(outstanding)
}
