//! Migration tasks and the per-entity claim registry

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::records::EntityRef;
use crate::{Error, Result};

/// Lifecycle of a migration task: `Pending -> Migrating -> {Success | Error}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskStatus {
    Pending,
    Migrating,
    Success,
    Error,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }
}

/// One attempt to move one record's file into object storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationTask {
    pub id: Uuid,
    #[serde(flatten)]
    pub entity: EntityRef,
    pub source_path: String,
    pub target_path: Option<String>,
    pub status: TaskStatus,
    pub error_message: Option<String>,
    /// The bytes were already in object storage; only the record moved
    #[serde(default)]
    pub relinked: bool,
    pub created_at: DateTime<Utc>,
}

impl MigrationTask {
    pub fn new(entity: EntityRef, source_path: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            entity,
            source_path: source_path.into(),
            target_path: None,
            status: TaskStatus::Pending,
            error_message: None,
            relinked: false,
            created_at: Utc::now(),
        }
    }

    pub(crate) fn begin(&mut self) {
        if self.status == TaskStatus::Pending {
            self.status = TaskStatus::Migrating;
        }
    }

    pub(crate) fn succeed(&mut self, target: String, relinked: bool) {
        self.target_path = Some(target);
        self.relinked = relinked;
        self.status = TaskStatus::Success;
    }

    pub(crate) fn fail(&mut self, error: &Error) {
        self.error_message = Some(error.to_string());
        self.status = TaskStatus::Error;
    }
}

/// Why a claim is being taken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimPurpose {
    /// Rejected while in flight or after a successful migration
    Migrate,
    /// Rejected only while in flight
    Cleanup,
}

#[derive(Debug, Default)]
struct Claims {
    in_flight: HashSet<EntityRef>,
    migrated: HashSet<EntityRef>,
}

/// Per-engine mutual exclusion keyed by `(entityType, entityId)`.
///
/// A second claim for the same key is rejected, never queued.
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    claims: Arc<Mutex<Claims>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Claims> {
        // The set stays consistent even if a holder panicked
        self.claims.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Take the key for `entity`, or explain why it is unavailable.
    pub fn claim(&self, entity: EntityRef, purpose: ClaimPurpose) -> Result<ClaimGuard> {
        let mut claims = self.lock();
        if claims.in_flight.contains(&entity) {
            return Err(Error::TaskRejected {
                entity: entity.to_string(),
                reason: "another task for this record is in flight".into(),
            });
        }
        if purpose == ClaimPurpose::Migrate && claims.migrated.contains(&entity) {
            return Err(Error::TaskRejected {
                entity: entity.to_string(),
                reason: "already migrated successfully".into(),
            });
        }
        claims.in_flight.insert(entity);
        Ok(ClaimGuard {
            registry: self.clone(),
            entity,
        })
    }

    pub fn is_in_flight(&self, entity: EntityRef) -> bool {
        self.lock().in_flight.contains(&entity)
    }

    pub fn is_migrated(&self, entity: EntityRef) -> bool {
        self.lock().migrated.contains(&entity)
    }
}

/// Holds a claimed key; dropping it releases the key.
#[derive(Debug)]
pub struct ClaimGuard {
    registry: TaskRegistry,
    entity: EntityRef,
}

impl ClaimGuard {
    /// Release the key and remember the record as migrated.
    pub fn complete_migration(self) {
        self.registry.lock().migrated.insert(self.entity);
    }
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        self.registry.lock().in_flight.remove(&self.entity);
    }
}

/// Object targets currently being written by this engine.
///
/// Two records with the same name and date share a canonical target; the
/// reservation keeps a concurrent task from writing over the other's bytes.
#[derive(Debug, Clone, Default)]
pub struct TargetReservations {
    targets: Arc<Mutex<HashSet<String>>>,
}

impl TargetReservations {
    /// Reserve `target`, or `None` if another task holds it.
    pub fn try_reserve(&self, target: &str) -> Option<Reservation> {
        let mut targets = self.targets.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !targets.insert(target.to_string()) {
            return None;
        }
        Some(Reservation {
            owner: self.clone(),
            target: target.to_string(),
        })
    }
}

/// A reserved target; released on drop.
#[derive(Debug)]
pub struct Reservation {
    owner: TargetReservations,
    target: String,
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.owner
            .targets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&self.target);
    }
}

/// Stops a batch before it starts further tasks.
///
/// Tasks that already started always run to completion.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_moves_through_states() {
        let mut task = MigrationTask::new(EntityRef::document(1), "/uploads/a.pdf");
        assert_eq!(task.status, TaskStatus::Pending);

        task.begin();
        assert_eq!(task.status, TaskStatus::Migrating);

        task.succeed("/objects/documents/2025/05/a.pdf".into(), false);
        assert_eq!(task.status, TaskStatus::Success);
        assert!(task.status.is_terminal());
    }

    #[test]
    fn failed_task_keeps_message() {
        let mut task = MigrationTask::new(EntityRef::activity(2), "/uploads/b.pdf");
        task.begin();
        task.fail(&Error::SourceRead {
            path: "/uploads/b.pdf".into(),
            reason: "permission denied".into(),
        });
        assert_eq!(task.status, TaskStatus::Error);
        assert!(task.error_message.unwrap().contains("permission denied"));
        assert_eq!(task.target_path, None);
    }

    #[test]
    fn second_claim_is_rejected_while_first_is_held() {
        let registry = TaskRegistry::new();
        let entity = EntityRef::document(7);

        let guard = registry.claim(entity, ClaimPurpose::Migrate).unwrap();
        assert!(matches!(
            registry.claim(entity, ClaimPurpose::Migrate),
            Err(Error::TaskRejected { .. })
        ));
        assert!(registry.claim(entity, ClaimPurpose::Cleanup).is_err());

        drop(guard);
        assert!(!registry.is_in_flight(entity));
        assert!(registry.claim(entity, ClaimPurpose::Migrate).is_ok());
    }

    #[test]
    fn successful_migration_blocks_new_migrations_only() {
        let registry = TaskRegistry::new();
        let entity = EntityRef::document(8);

        registry
            .claim(entity, ClaimPurpose::Migrate)
            .unwrap()
            .complete_migration();

        assert!(registry.is_migrated(entity));
        assert!(registry.claim(entity, ClaimPurpose::Migrate).is_err());
        assert!(registry.claim(entity, ClaimPurpose::Cleanup).is_ok());
    }

    #[test]
    fn distinct_keys_do_not_conflict() {
        let registry = TaskRegistry::new();
        let _a = registry.claim(EntityRef::document(1), ClaimPurpose::Migrate).unwrap();
        let _b = registry.claim(EntityRef::activity(1), ClaimPurpose::Migrate).unwrap();
    }

    #[test]
    fn reservations_are_exclusive_until_dropped() {
        let reservations = TargetReservations::default();
        let first = reservations.try_reserve("/objects/documents/2025/05/a.pdf").unwrap();
        assert!(reservations.try_reserve("/objects/documents/2025/05/a.pdf").is_none());
        assert!(reservations.try_reserve("/objects/documents/2025/05/b.pdf").is_some());

        drop(first);
        assert!(reservations.try_reserve("/objects/documents/2025/05/a.pdf").is_some());
    }

    #[test]
    fn task_serializes_flat_entity() {
        let task = MigrationTask::new(EntityRef::activity(3), "/uploads/c.pdf");
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["entityType"], "activity");
        assert_eq!(json["entityId"], 3);
        assert_eq!(json["status"], "pending");
        assert_eq!(json["sourcePath"], "/uploads/c.pdf");
    }
}
