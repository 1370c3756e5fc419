// src/data/file.rs

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use crate::data::{DataNode, Edit, EditState, within_validity};
use crate::job::JobId;

/// Data node backed by a file.
///
/// The last edit date is the later of the latest tracked edit and the file's
/// modification time. A missing file has no edit date, so it is neither
/// valid nor ready for reading.
#[derive(Debug)]
pub struct FileDataNode {
    config_id: String,
    path: PathBuf,
    validity_period: Option<Duration>,
    edit: Mutex<EditState>,
}

impl FileDataNode {
    pub fn new(config_id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            config_id: config_id.into(),
            path: path.into(),
            validity_period: None,
            edit: Mutex::new(EditState::default()),
        }
    }

    pub fn with_validity_period(mut self, period: Duration) -> Self {
        self.validity_period = Some(period);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn modified_on_disk(&self) -> Option<DateTime<Utc>> {
        let modified = fs::metadata(&self.path).and_then(|m| m.modified()).ok()?;
        Some(DateTime::<Utc>::from(modified))
    }
}

impl DataNode for FileDataNode {
    fn config_id(&self) -> &str {
        &self.config_id
    }

    fn is_valid(&self) -> bool {
        self.path.exists() && within_validity(self.last_edit_date(), self.validity_period)
    }

    fn is_ready_for_reading(&self) -> bool {
        if self.edit.lock().edit_in_progress {
            return false;
        }
        self.last_edit_date().is_some()
    }

    fn last_edit_date(&self) -> Option<DateTime<Utc>> {
        let on_disk = self.modified_on_disk()?;
        let tracked = self.edit.lock().last_edit_date();
        Some(tracked.map_or(on_disk, |t| t.max(on_disk)))
    }

    fn lock_edit(&self) {
        self.edit.lock().edit_in_progress = true;
    }

    fn unlock_edit(&self) {
        self.edit.lock().edit_in_progress = false;
    }

    fn track_edit(&self, job_id: &JobId) {
        self.edit.lock().record(Utc::now(), Some(job_id.clone()));
    }

    fn edits(&self) -> Vec<Edit> {
        self.edit.lock().edits.clone()
    }
}
