// src/data/mod.rs

//! Data nodes: the lockable artifacts tasks read and write.
//!
//! The orchestrator only consumes the signals defined on [`DataNode`]:
//! validity, readiness, last edit date and the advisory edit lock. Reading
//! and writing actual content is left to the concrete node types.
//!
//! - [`memory`] provides [`InMemoryDataNode`], holding a JSON value.
//! - [`file`] provides [`FileDataNode`], backed by a path on disk.

pub mod file;
pub mod memory;

use std::fmt::Debug;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::job::JobId;

pub use file::FileDataNode;
pub use memory::InMemoryDataNode;

/// Contract between the orchestration core and a data node.
pub trait DataNode: Send + Sync + Debug {
    fn config_id(&self) -> &str;

    /// Whether the cached content is usable (written and not expired).
    fn is_valid(&self) -> bool;

    /// Whether a reader may consume the node now.
    ///
    /// Must be `false` between `lock_edit` and the matching `unlock_edit`.
    fn is_ready_for_reading(&self) -> bool;

    fn last_edit_date(&self) -> Option<DateTime<Utc>>;

    /// Take the advisory write lock.
    fn lock_edit(&self);

    /// Release the advisory write lock. Releasing an unlocked node is a no-op.
    fn unlock_edit(&self);

    /// Record that `job_id` wrote this node.
    fn track_edit(&self, job_id: &JobId);

    /// Edit history, oldest first.
    fn edits(&self) -> Vec<Edit>;
}

/// One recorded write of a data node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edit {
    pub timestamp: DateTime<Utc>,
    /// The job that produced the write, or `None` for a direct write.
    pub job_id: Option<JobId>,
}

/// Edit-lock and history bookkeeping shared by the concrete node types.
#[derive(Debug, Default)]
pub(crate) struct EditState {
    pub(crate) edit_in_progress: bool,
    pub(crate) edits: Vec<Edit>,
}

impl EditState {
    pub(crate) fn last_edit_date(&self) -> Option<DateTime<Utc>> {
        self.edits.iter().map(|e| e.timestamp).max()
    }

    pub(crate) fn record(&mut self, timestamp: DateTime<Utc>, job_id: Option<JobId>) {
        self.edits.push(Edit { timestamp, job_id });
    }
}

/// `true` if `last_edit` exists and is still within `validity`.
///
/// A period reaching past the representable range never expires.
pub(crate) fn within_validity(
    last_edit: Option<DateTime<Utc>>,
    validity: Option<Duration>,
) -> bool {
    match (last_edit, validity) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(edit), Some(period)) => edit
            .checked_add_signed(period)
            .is_none_or(|expiry| Utc::now() < expiry),
    }
}
