use serde::{Deserialize, Serialize};

use crate::ids::JobId;

/// A job's lifecycle state (spec §3, §4.3 state machine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Pending,
    Running,
    Complete,
    Cancelled,
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Complete => "COMPLETE",
            Self::Cancelled => "CANCELLED",
        };
        write!(f, "{s}")
    }
}

/// Progress is either a fraction in [0, 1] or indeterminate (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Progress {
    Fraction(f64),
    Indeterminate,
}

/// A published status event (spec §3, §4.4). `event_id` is monotonic and
/// strictly increasing across the whole process, not just per job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatus {
    pub event_id: u64,
    pub job_id: JobId,
    pub description: String,
    pub state: JobState,
    pub progress: Progress,
    pub status_text: String,
}
