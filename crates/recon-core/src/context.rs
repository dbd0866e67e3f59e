//! Shared handles to the record store and both backends

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};

use crate::backend::StorageBackend;
use crate::layout::LayoutPolicy;
use crate::records::RecordStore;

/// Default deadline for a single backend call.
pub const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything the auditor and the migration engine act on.
///
/// Cheap to clone; the only shared state is behind the three adapters.
#[derive(Clone)]
pub struct EngineContext {
    pub records: Arc<dyn RecordStore>,
    pub local: Arc<dyn StorageBackend>,
    pub objects: Arc<dyn StorageBackend>,
    pub policy: LayoutPolicy,
    /// Deadline applied to every backend call
    pub deadline: Duration,
    /// Fixed date used instead of the clock for records without a date
    today: Option<NaiveDate>,
}

impl EngineContext {
    pub fn new(
        records: Arc<dyn RecordStore>,
        local: Arc<dyn StorageBackend>,
        objects: Arc<dyn StorageBackend>,
    ) -> Self {
        Self {
            records,
            local,
            objects,
            policy: LayoutPolicy::default(),
            deadline: DEFAULT_BACKEND_TIMEOUT,
            today: None,
        }
    }

    pub fn with_policy(mut self, policy: LayoutPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Utc::now().date_naive())
    }
}

impl std::fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineContext")
            .field("local", &self.local.name())
            .field("objects", &self.objects.name())
            .field("policy", &self.policy)
            .field("deadline", &self.deadline)
            .finish()
    }
}
