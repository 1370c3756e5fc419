// src/data/memory.rs

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde_json::Value;

use crate::data::{DataNode, Edit, EditState, within_validity};
use crate::job::JobId;

#[derive(Debug, Default)]
struct State {
    value: Option<Value>,
    edit: EditState,
}

/// Data node holding a JSON value in memory.
#[derive(Debug)]
pub struct InMemoryDataNode {
    config_id: String,
    validity_period: Option<Duration>,
    state: Mutex<State>,
}

impl InMemoryDataNode {
    /// An empty node: never written, so neither valid nor ready for reading.
    pub fn new(config_id: impl Into<String>) -> Self {
        Self {
            config_id: config_id.into(),
            validity_period: None,
            state: Mutex::new(State::default()),
        }
    }

    /// A node already holding `value`.
    pub fn with_value(config_id: impl Into<String>, value: Value) -> Self {
        let node = Self::new(config_id);
        node.write(value);
        node
    }

    pub fn with_validity_period(mut self, period: Duration) -> Self {
        self.validity_period = Some(period);
        self
    }

    pub fn read(&self) -> Option<Value> {
        self.state.lock().value.clone()
    }

    /// Store `value` and record a direct edit.
    pub fn write(&self, value: Value) {
        self.write_at(value, Utc::now());
    }

    /// Store `value` and record a direct edit dated `timestamp`.
    pub fn write_at(&self, value: Value, timestamp: DateTime<Utc>) {
        let mut state = self.state.lock();
        state.value = Some(value);
        state.edit.record(timestamp, None);
    }
}

impl DataNode for InMemoryDataNode {
    fn config_id(&self) -> &str {
        &self.config_id
    }

    fn is_valid(&self) -> bool {
        let state = self.state.lock();
        within_validity(state.edit.last_edit_date(), self.validity_period)
    }

    fn is_ready_for_reading(&self) -> bool {
        let state = self.state.lock();
        !state.edit.edit_in_progress && state.edit.last_edit_date().is_some()
    }

    fn last_edit_date(&self) -> Option<DateTime<Utc>> {
        self.state.lock().edit.last_edit_date()
    }

    fn lock_edit(&self) {
        self.state.lock().edit.edit_in_progress = true;
    }

    fn unlock_edit(&self) {
        self.state.lock().edit.edit_in_progress = false;
    }

    fn track_edit(&self, job_id: &JobId) {
        self.state
            .lock()
            .edit
            .record(Utc::now(), Some(job_id.clone()));
    }

    fn edits(&self) -> Vec<Edit> {
        self.state.lock().edit.edits.clone()
    }
}
