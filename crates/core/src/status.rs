//! Job status state machine.
//!
//! Statuses progress strictly forward through [`JobStatus::ORDER`]; `error`
//! can be entered from any non-terminal status. `completed` and `error` are
//! absorbing.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Starting,
    CheckingFfmpeg,
    Initializing,
    GeneratingFrames,
    AssemblingVideo,
    Completed,
    Error,
}

impl JobStatus {
    /// The linear success path, in order.
    pub const ORDER: [JobStatus; 6] = [
        JobStatus::Starting,
        JobStatus::CheckingFfmpeg,
        JobStatus::Initializing,
        JobStatus::GeneratingFrames,
        JobStatus::AssemblingVideo,
        JobStatus::Completed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Starting => "starting",
            JobStatus::CheckingFfmpeg => "checking_ffmpeg",
            JobStatus::Initializing => "initializing",
            JobStatus::GeneratingFrames => "generating_frames",
            JobStatus::AssemblingVideo => "assembling_video",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }

    /// Position on the success path; `None` for `error`.
    fn rank(self) -> Option<usize> {
        Self::ORDER.iter().position(|s| *s == self)
    }

    /// Whether moving from `self` to `next` keeps the status monotonic.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == JobStatus::Error {
            return true;
        }
        match (self.rank(), next.rank()) {
            (Some(from), Some(to)) => to > from,
            _ => false,
        }
    }

    /// Validate a transition, returning a `Conflict` error if it is not allowed.
    pub fn transition(self, next: JobStatus) -> Result<JobStatus, CoreError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(CoreError::Conflict(format!(
                "Invalid job status transition: {self} -> {next}"
            )))
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "starting" => Ok(JobStatus::Starting),
            "checking_ffmpeg" => Ok(JobStatus::CheckingFfmpeg),
            "initializing" => Ok(JobStatus::Initializing),
            "generating_frames" => Ok(JobStatus::GeneratingFrames),
            "assembling_video" => Ok(JobStatus::AssemblingVideo),
            "completed" => Ok(JobStatus::Completed),
            "error" => Ok(JobStatus::Error),
            other => Err(CoreError::Validation(format!("Unknown job status '{other}'"))),
        }
    }
}
