use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Initiated,
    HealthChecked,
    CandidatesFiltered,
    DescriptorPersisted,
    Transferring,
    Completed,
    Interrupted,
}

impl JobPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            JobPhase::Initiated => "INITIATED",
            JobPhase::HealthChecked => "HEALTH_CHECKED",
            JobPhase::CandidatesFiltered => "CANDIDATES_FILTERED",
            JobPhase::DescriptorPersisted => "DESCRIPTOR_PERSISTED",
            JobPhase::Transferring => "TRANSFERRING",
            JobPhase::Completed => "COMPLETED",
            JobPhase::Interrupted => "INTERRUPTED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobPhase::Completed | JobPhase::Interrupted)
    }

    /// Legal successors. `CandidatesFiltered -> Completed` covers the case
    /// where sync leaves nothing to move and no job is created.
    fn can_advance_to(self, next: JobPhase) -> bool {
        use JobPhase::*;
        matches!(
            (self, next),
            (Initiated, HealthChecked)
                | (HealthChecked, CandidatesFiltered)
                | (CandidatesFiltered, DescriptorPersisted)
                | (CandidatesFiltered, Completed)
                | (DescriptorPersisted, Transferring)
                | (DescriptorPersisted, Completed)
                | (DescriptorPersisted, Interrupted)
                | (Transferring, Completed)
                | (Transferring, Interrupted)
        )
    }
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks one job through its phases, refusing illegal transitions.
#[derive(Debug, Clone)]
pub struct PhaseTracker {
    current: JobPhase,
    history: Vec<JobPhase>,
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self {
            current: JobPhase::Initiated,
            history: vec![JobPhase::Initiated],
        }
    }

    /// Re-entry point for `recover`: the descriptor already exists.
    pub fn resumed() -> Self {
        Self {
            current: JobPhase::DescriptorPersisted,
            history: vec![JobPhase::DescriptorPersisted],
        }
    }

    pub fn current(&self) -> JobPhase {
        self.current
    }

    pub fn history(&self) -> &[JobPhase] {
        &self.history
    }

    pub fn advance(&mut self, next: JobPhase) -> anyhow::Result<()> {
        if !self.current.can_advance_to(next) {
            anyhow::bail!("illegal job phase transition {} -> {}", self.current, next);
        }
        tracing::debug!(from = %self.current, to = %next, "job phase");
        self.current = next;
        self.history.push(next);
        Ok(())
    }
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}
