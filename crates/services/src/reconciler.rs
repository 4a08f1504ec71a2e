//! Cache-to-server progress reconciliation.
//!
//! The reconciler drains the write-ahead cache toward the server in one
//! batch merge, folds the server's answer back into a merged per-lecture
//! view, and only then clears the cache, and only the exact entries it
//! snapshotted at the start. Entries written while the merge was in flight
//! stay cached for the next pass, and any failure leaves the whole cache
//! untouched.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};

use course_core::model::{
    CourseId, CourseProgressSnapshot, LectureId, LectureProgressRecord,
};
use storage::repository::{ProgressCacheRecord, ProgressCacheRepository};

use crate::error::ProgressError;
use crate::gateway::ProgressGateway;

/// Result of one reconciliation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileOutcome {
    /// Derived course aggregates after the merge.
    pub snapshot: CourseProgressSnapshot,
    /// Merged per-lecture records, ordered by lecture.
    pub lectures: Vec<LectureProgressRecord>,
}

pub struct ProgressReconciler {
    repo: Arc<dyn ProgressCacheRepository>,
    gateway: Arc<dyn ProgressGateway>,
}

impl ProgressReconciler {
    #[must_use]
    pub fn new(repo: Arc<dyn ProgressCacheRepository>, gateway: Arc<dyn ProgressGateway>) -> Self {
        Self { repo, gateway }
    }

    /// Run one reconciliation pass for a course.
    ///
    /// An empty cache still calls the merge endpoint: the server's records
    /// and totals are the only way to derive a current snapshot, and the
    /// merge is idempotent so the extra call is harmless.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError` on gateway or storage failures. On failure the
    /// cache is left intact and the pass can simply be retried; max/OR
    /// merging makes the replay safe.
    pub async fn reconcile(&self, course_id: CourseId) -> Result<ReconcileOutcome, ProgressError> {
        // Snapshot the cache keys first. Only these entries may be cleared,
        // no matter what lands in the cache while the merge is in flight.
        let cached = self.repo.list_for_course(course_id).await?;
        let snapshot_keys: Vec<LectureId> = cached.iter().map(|r| r.lecture_id).collect();
        let local: Vec<LectureProgressRecord> = cached
            .into_iter()
            .map(ProgressCacheRecord::into_record)
            .collect();

        debug!(course = %course_id, batch = local.len(), "merging cached progress");
        let merged = match self.gateway.merge_progress(course_id, &local).await {
            Ok(merged) => merged,
            Err(err) => {
                warn!(course = %course_id, error = %err, "merge failed, keeping cache");
                return Err(err.into());
            }
        };

        // Fold the server's records into the local batch with the same
        // max/OR rule the server applies, so both sides converge even when
        // one of them held records the other never saw.
        let mut by_lecture: BTreeMap<LectureId, LectureProgressRecord> =
            local.into_iter().map(|r| (r.lecture_id, r)).collect();
        for server in merged.lectures {
            by_lecture
                .entry(server.lecture_id)
                .and_modify(|ours| *ours = ours.merged_with(&server))
                .or_insert(server);
        }
        let lectures: Vec<LectureProgressRecord> = by_lecture.into_values().collect();

        let snapshot = CourseProgressSnapshot::recompute(&lectures, merged.totals);

        // The merge is acknowledged; clear exactly what we snapshotted.
        self.repo.delete_many(course_id, &snapshot_keys).await?;
        debug!(
            course = %course_id,
            cleared = snapshot_keys.len(),
            overall = snapshot.overall_percent,
            "reconciliation complete"
        );

        Ok(ReconcileOutcome { snapshot, lectures })
    }

    /// Push a single lecture's record immediately, bypassing the batch.
    ///
    /// Used when the learner explicitly marks a lecture watched and the UI
    /// wants the server's answer now. The cache entry is cleared only after
    /// the server acknowledges, and only if no fresher tick landed while the
    /// call was in flight; a newer entry waits for the next reconcile pass.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError` on gateway or storage failures; the cache
    /// entry survives either.
    pub async fn push_lecture(
        &self,
        course_id: CourseId,
        record: &LectureProgressRecord,
    ) -> Result<ReconcileOutcome, ProgressError> {
        let update = self
            .gateway
            .update_lecture_progress(course_id, record.lecture_id, record)
            .await?;

        if let Some(cached) = self.repo.get(course_id, record.lecture_id).await? {
            if cached.last_updated <= record.last_updated {
                self.repo.delete(course_id, record.lecture_id).await?;
            } else {
                debug!(
                    course = %course_id,
                    lecture = %record.lecture_id,
                    "cache entry advanced mid-push, leaving it for reconcile"
                );
            }
        }

        let mut lectures = update.course.lectures;
        lectures.sort_by_key(|r| r.lecture_id);
        let snapshot = CourseProgressSnapshot::recompute(&lectures, update.course.totals);
        Ok(ReconcileOutcome { snapshot, lectures })
    }
}
