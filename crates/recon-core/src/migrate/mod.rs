//! Migration and repair engine
//!
//! The only component that mutates anything. Both operations keep one
//! invariant: a record is repointed only after its new location has been
//! verified to exist, and the legacy copy is never removed.

mod cleanup;
mod task;

pub use cleanup::{CleanupAction, CleanupStatus};
pub use task::{
    CancelToken, ClaimGuard, ClaimPurpose, MigrationTask, Reservation, TargetReservations,
    TaskRegistry, TaskStatus,
};

use std::sync::Arc;

use recon_fs::checksum::compute_content_checksum;
use serde::Serialize;
use tokio::sync::Semaphore;

use crate::backend::{WriteAttributes, content_type_for, find_migrated_copy, with_deadline};
use crate::context::EngineContext;
use crate::layout::{PathClassification, collision_target};
use crate::records::{EntityRef, FileReference};
use crate::{Error, Result};

/// Default number of migrations run at once.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Per-entity result of a batch
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum BatchOutcome {
    /// A task ran; it may have succeeded or failed
    Task(MigrationTask),
    /// No task was created
    Rejected { entity: EntityRef, reason: String },
    /// Not started because the batch was cancelled
    Cancelled { entity: EntityRef },
}

impl BatchOutcome {
    pub fn entity(&self) -> EntityRef {
        match self {
            Self::Task(task) => task.entity,
            Self::Rejected { entity, .. } | Self::Cancelled { entity } => *entity,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Task(task) if task.status == TaskStatus::Success)
    }
}

/// Where the bytes of a migration end up.
enum Placement {
    /// Nothing there yet; write while holding the reservation
    Write(String, Reservation),
    /// Identical bytes already there; reuse
    Reuse(String),
}

/// Engine for migrations and cleanups
#[derive(Clone)]
pub struct MigrationEngine {
    ctx: EngineContext,
    registry: TaskRegistry,
    reservations: TargetReservations,
    concurrency: usize,
}

impl MigrationEngine {
    pub fn new(ctx: EngineContext) -> Self {
        Self {
            ctx,
            registry: TaskRegistry::new(),
            reservations: TargetReservations::default(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn context(&self) -> &EngineContext {
        &self.ctx
    }

    /// Migrate one record's legacy file into object storage.
    ///
    /// Returns `Err` when no task could be created (key already claimed or
    /// migrated, record absent, reference not a legacy file). Once a task
    /// exists every failure is recorded on it and the record is untouched.
    pub async fn migrate(&self, entity: EntityRef) -> Result<MigrationTask> {
        let guard = self.registry.claim(entity, ClaimPurpose::Migrate)?;

        let record = self
            .ctx
            .records
            .fetch_record(entity)
            .await?
            .ok_or_else(|| Error::NotFound(entity.to_string()))?;
        let reference =
            FileReference::project(entity.kind, &record)?.ok_or_else(|| Error::TaskRejected {
                entity: entity.to_string(),
                reason: "record has no file reference".into(),
            })?;

        match self.ctx.policy.classify(Some(&reference.raw_path)) {
            PathClassification::LegacyLocal => {}
            PathClassification::ObjectStorageCanonical => {
                return Err(Error::TaskRejected {
                    entity: entity.to_string(),
                    reason: "already in object storage".into(),
                });
            }
            PathClassification::Malformed | PathClassification::Empty => {
                return Err(Error::Classification {
                    path: reference.raw_path.clone(),
                    reason: "not a migratable legacy reference".into(),
                });
            }
        }

        let mut task = MigrationTask::new(entity, reference.raw_path.clone());
        task.begin();
        tracing::debug!(%entity, source = %task.source_path, task = %task.id, "Migration started");

        match self.run(&reference).await {
            Ok((target, relinked)) => {
                tracing::info!(%entity, target = %target, relinked, "Migration succeeded");
                task.succeed(target, relinked);
                guard.complete_migration();
            }
            Err(e) => {
                tracing::warn!(%entity, error = %e, "Migration failed");
                task.fail(&e);
                if e.is_structural() {
                    return Err(e);
                }
            }
        }
        Ok(task)
    }

    /// Steps 2-4: read, place, verify, repoint. Returns the new reference.
    async fn run(&self, reference: &FileReference) -> Result<(String, bool)> {
        let source = reference.raw_path.as_str();
        let deadline = self.ctx.deadline;

        let read = self.ctx.local.read(source);
        let bytes = match with_deadline("read", source, deadline, read).await {
            Ok(bytes) => bytes,
            Err(e) if e.is_not_found() => return self.relink(reference).await,
            Err(e @ (Error::Timeout { .. } | Error::SourceRead { .. })) => return Err(e),
            Err(e) => {
                return Err(Error::SourceRead {
                    path: source.to_string(),
                    reason: e.to_string(),
                });
            }
        };

        let (target, _reservation) = match self.place(reference, &bytes).await? {
            Placement::Reuse(target) => {
                tracing::debug!(target = %target, "Identical object already present");
                (target, None)
            }
            Placement::Write(target, reservation) => {
                let content_type =
                    content_type_for(reference.file_type.as_deref(), &reference.file_name);
                let attributes =
                    WriteAttributes::new(content_type, reference.access).owned_by(reference.entity);
                let write = self.ctx.objects.write(&target, &bytes, &attributes);
                with_deadline("write", &target, deadline, write)
                    .await
                    .map_err(|e| destination_failure(&target, e))?;
                (target, Some(reservation))
            }
        };

        self.verify_and_repoint(reference, &target).await?;
        Ok((target, false))
    }

    /// Pick the canonical target, or its suffixed alternative when the
    /// canonical one already holds different bytes.
    async fn place(&self, reference: &FileReference, bytes: &[u8]) -> Result<Placement> {
        let canonical = self.ctx.policy.canonical_target(
            reference.entity,
            reference.reference_date,
            &reference.file_name,
            self.ctx.today(),
        );
        let checksum = compute_content_checksum(bytes);

        for target in [canonical.clone(), collision_target(&canonical, reference.entity)] {
            let Some(reservation) = self.reservations.try_reserve(&target) else {
                tracing::debug!(target = %target, "Target reserved by a concurrent task");
                continue;
            };
            let deadline = self.ctx.deadline;
            let check = self.ctx.objects.exists(&target);
            let present = with_deadline("exists", &target, deadline, check)
                .await
                .map_err(|e| destination_failure(&target, e))?;
            if !present {
                return Ok(Placement::Write(target, reservation));
            }

            let existing = with_deadline("read", &target, deadline, self.ctx.objects.read(&target))
                .await
                .map_err(|e| destination_failure(&target, e))?;
            if existing.len() == bytes.len() && compute_content_checksum(&existing) == checksum {
                return Ok(Placement::Reuse(target));
            }
            tracing::debug!(target = %target, "Target holds different content");
        }

        Err(Error::DestinationWrite {
            path: canonical,
            reason: "canonical and suffixed targets are both taken by other content".into(),
        })
    }

    /// The legacy file is gone; repoint the record if a previous run already
    /// placed its bytes.
    async fn relink(&self, reference: &FileReference) -> Result<(String, bool)> {
        let candidates = self.ctx.policy.migrated_locations(
            reference.entity,
            reference.reference_date,
            &reference.file_name,
            self.ctx.today(),
        );
        let canonical = candidates[1].clone();

        let found = find_migrated_copy(
            self.ctx.objects.as_ref(),
            candidates,
            reference.entity,
            self.ctx.deadline,
        )
        .await
        .map_err(|e| destination_failure(&canonical, e))?;

        match found {
            Some(target) => {
                self.repoint(reference, &target).await?;
                Ok((target, true))
            }
            None => Err(Error::SourceRead {
                path: reference.raw_path.clone(),
                reason: "legacy file not found and no migrated copy exists".into(),
            }),
        }
    }

    async fn verify_and_repoint(&self, reference: &FileReference, target: &str) -> Result<()> {
        let check = self.ctx.objects.exists(target);
        let visible = with_deadline("exists", target, self.ctx.deadline, check)
            .await
            .map_err(|e| destination_failure(target, e))?;
        if !visible {
            return Err(Error::DestinationWrite {
                path: target.to_string(),
                reason: "object not visible after write".into(),
            });
        }
        self.repoint(reference, target).await
    }

    async fn repoint(&self, reference: &FileReference, target: &str) -> Result<()> {
        let entity = reference.entity;
        self.ctx
            .records
            .update_file_reference(entity.kind, entity.id, Some(target))
            .await
    }

    /// Migrate many records with bounded concurrency.
    ///
    /// Every entity gets an outcome, in input order. Tasks run as detached
    /// tokio tasks, so a started task finishes even if this future is
    /// dropped. Cancelling `cancel` stops further tasks from starting. A
    /// structural failure cancels the rest of the batch and is returned
    /// once started tasks have finished.
    pub async fn migrate_all(
        &self,
        entities: &[EntityRef],
        cancel: &CancelToken,
    ) -> Result<Vec<BatchOutcome>> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut pending = Vec::with_capacity(entities.len());

        for &entity in entities {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    pending.push((entity, None));
                    continue;
                }
            };
            if cancel.is_cancelled() {
                pending.push((entity, None));
                continue;
            }

            let engine = self.clone();
            let cancel = cancel.clone();
            let handle = tokio::spawn(async move {
                let result = engine.migrate(entity).await;
                if matches!(&result, Err(e) if e.is_structural()) {
                    cancel.cancel();
                }
                drop(permit);
                result
            });
            pending.push((entity, Some(handle)));
        }

        let mut outcomes = Vec::with_capacity(pending.len());
        let mut structural = None;
        for (entity, handle) in pending {
            let Some(handle) = handle else {
                outcomes.push(BatchOutcome::Cancelled { entity });
                continue;
            };
            let outcome = match handle.await {
                Ok(Ok(task)) => BatchOutcome::Task(task),
                Ok(Err(e)) if e.is_structural() => {
                    let reason = e.to_string();
                    structural.get_or_insert(e);
                    BatchOutcome::Rejected { entity, reason }
                }
                Ok(Err(e)) => BatchOutcome::Rejected {
                    entity,
                    reason: e.to_string(),
                },
                Err(join) => BatchOutcome::Rejected {
                    entity,
                    reason: format!("task aborted: {}", join),
                },
            };
            outcomes.push(outcome);
        }

        if let Some(e) = structural {
            return Err(e);
        }

        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        tracing::info!(total = outcomes.len(), succeeded, "Batch migration finished");
        Ok(outcomes)
    }
}

fn destination_failure(target: &str, error: Error) -> Error {
    match error {
        e @ (Error::DestinationWrite { .. } | Error::Timeout { .. }) => e,
        other => Error::DestinationWrite {
            path: target.to_string(),
            reason: other.to_string(),
        },
    }
}
