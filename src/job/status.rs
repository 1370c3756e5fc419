// src/job/status.rs

//! Job status state machine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a [`Job`](crate::job::Job).
///
/// ```text
/// Submitted ──► Pending ──► Running ──► Completed | Failed
///     │            ▲  │
///     ▼            │  └──► Skipped
///  Blocked ────────┘
///
/// {Submitted, Blocked, Pending}           ──► Canceled   (the targeted job)
/// {Submitted, Blocked, Pending, Running}  ──► Abandoned  (downstream jobs)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Submitted,
    Blocked,
    Pending,
    Running,
    Canceled,
    Failed,
    Completed,
    Skipped,
    Abandoned,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Status::Completed
                | Status::Skipped
                | Status::Failed
                | Status::Canceled
                | Status::Abandoned
        )
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: Status) -> bool {
        use Status::*;

        match (self, next) {
            (Submitted, Pending | Blocked | Canceled | Abandoned) => true,
            (Blocked, Pending | Canceled | Abandoned) => true,
            (Pending, Running | Skipped | Canceled | Abandoned) => true,
            (Running, Completed | Failed | Abandoned) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Submitted => "SUBMITTED",
            Status::Blocked => "BLOCKED",
            Status::Pending => "PENDING",
            Status::Running => "RUNNING",
            Status::Canceled => "CANCELED",
            Status::Failed => "FAILED",
            Status::Completed => "COMPLETED",
            Status::Skipped => "SKIPPED",
            Status::Abandoned => "ABANDONED",
        };
        f.pad(s)
    }
}
