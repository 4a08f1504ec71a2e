use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::eligibility;
use crate::model::ids::LectureId;

/// Watched fraction at which a lecture counts as completed.
pub const COMPLETION_THRESHOLD_PERCENT: f64 = 90.0;

//
// ─── LECTURE PROGRESS ──────────────────────────────────────────────────────────
//

/// Per-lecture watch progress, as cached locally and as held by the server.
///
/// Two invariants hold for anything persisted:
/// - `completed` is sticky: once true, no later partial write flips it back;
/// - `progress_percent` is monotonically non-decreasing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LectureProgressRecord {
    pub lecture_id: LectureId,
    pub progress_percent: f64,
    pub last_timestamp_seconds: f64,
    pub duration_seconds: f64,
    pub completed: bool,
    pub last_updated: DateTime<Utc>,
}

impl LectureProgressRecord {
    /// Build a record from one playback tick.
    ///
    /// Progress is `min(current/duration * 100, 100)`, and 0 when the
    /// duration is unknown or non-positive. The record is completed when the
    /// threshold is reached or the caller says so (e.g. a "mark watched"
    /// action).
    #[must_use]
    pub fn from_playback(
        lecture_id: LectureId,
        current_time_seconds: f64,
        duration_seconds: f64,
        completed_override: bool,
        now: DateTime<Utc>,
    ) -> Self {
        let progress_percent = if duration_seconds <= 0.0 {
            0.0
        } else {
            ((current_time_seconds / duration_seconds) * 100.0).min(100.0)
        };
        Self {
            lecture_id,
            progress_percent,
            last_timestamp_seconds: current_time_seconds.max(0.0),
            duration_seconds: duration_seconds.max(0.0),
            completed: completed_override || progress_percent >= COMPLETION_THRESHOLD_PERCENT,
            last_updated: now,
        }
    }

    /// Fold a newer observation into this record, monotonically.
    ///
    /// Percent never decreases, `completed` never downgrades, and
    /// `last_updated` never moves backwards. Timestamp/duration follow the
    /// newer observation since they describe the playhead, not progress.
    pub fn absorb(&mut self, newer: &LectureProgressRecord) {
        if newer.progress_percent > self.progress_percent {
            self.progress_percent = newer.progress_percent;
        }
        self.completed = self.completed || newer.completed;
        self.last_timestamp_seconds = newer.last_timestamp_seconds;
        if newer.duration_seconds > 0.0 {
            self.duration_seconds = newer.duration_seconds;
        }
        if newer.last_updated > self.last_updated {
            self.last_updated = newer.last_updated;
        }
    }

    /// Merge a local record with the server's record for the same lecture.
    ///
    /// The rule is `max` on percent and `OR` on completion, which makes the
    /// merge commutative, associative and idempotent: replaying the same
    /// merge over a flaky network can never lose or double-count progress.
    /// Playhead fields follow whichever side is fresher.
    #[must_use]
    pub fn merged_with(&self, server: &LectureProgressRecord) -> LectureProgressRecord {
        debug_assert_eq!(self.lecture_id, server.lecture_id);
        let (fresher, staler) = if server.last_updated >= self.last_updated {
            (server, self)
        } else {
            (self, server)
        };
        LectureProgressRecord {
            lecture_id: self.lecture_id,
            progress_percent: self.progress_percent.max(server.progress_percent),
            last_timestamp_seconds: fresher.last_timestamp_seconds,
            duration_seconds: if fresher.duration_seconds > 0.0 {
                fresher.duration_seconds
            } else {
                staler.duration_seconds
            },
            completed: self.completed || server.completed,
            last_updated: fresher.last_updated,
        }
    }
}

//
// ─── COURSE SNAPSHOT ───────────────────────────────────────────────────────────
//

/// Denominators the snapshot is derived against, supplied by the course
/// definition and the server's quiz bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseTotals {
    pub total_lectures: u32,
    pub total_quizzes: u32,
    pub completed_quizzes: u32,
}

/// Derived view over per-item records. Recomputed on every reconciliation,
/// never stored as an independent source of truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseProgressSnapshot {
    pub completed_lectures_count: u32,
    pub total_lectures_count: u32,
    pub completed_quizzes_count: u32,
    pub total_quizzes_count: u32,
    pub video_percent: u8,
    pub quiz_percent: u8,
    pub overall_percent: u8,
    pub certificate_progress_percent: u8,
    pub certificate_eligible: bool,
    pub is_completed: bool,
}

impl CourseProgressSnapshot {
    /// Recompute every aggregate from the merged per-lecture records.
    #[must_use]
    pub fn recompute(records: &[LectureProgressRecord], totals: CourseTotals) -> Self {
        let completed_lectures = u32::try_from(records.iter().filter(|r| r.completed).count())
            .unwrap_or(u32::MAX)
            .min(totals.total_lectures);
        let completed_quizzes = totals.completed_quizzes.min(totals.total_quizzes);

        let video_percent = ratio_percent(completed_lectures, totals.total_lectures);
        let quiz_percent = ratio_percent(completed_quizzes, totals.total_quizzes);
        let overall_percent = ratio_percent(
            completed_lectures + completed_quizzes,
            totals.total_lectures + totals.total_quizzes,
        );

        let certificate_progress_percent =
            eligibility::certificate_progress_percent(completed_lectures, totals.total_lectures);

        Self {
            completed_lectures_count: completed_lectures,
            total_lectures_count: totals.total_lectures,
            completed_quizzes_count: completed_quizzes,
            total_quizzes_count: totals.total_quizzes,
            video_percent,
            quiz_percent,
            overall_percent,
            certificate_progress_percent,
            certificate_eligible: eligibility::is_certificate_eligible(
                completed_lectures,
                totals.total_lectures,
            ),
            is_completed: completed_lectures == totals.total_lectures
                && completed_quizzes == totals.total_quizzes
                && totals.total_lectures + totals.total_quizzes > 0,
        }
    }
}

fn ratio_percent(count: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (f64::from(count) / f64::from(total) * 100.0).round();
    // count <= total is enforced by callers, so this stays within 0..=100.
    pct.clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    const L1: LectureId = LectureId::new(1);

    fn record(percent: f64, completed: bool, updated_offset_s: i64) -> LectureProgressRecord {
        LectureProgressRecord {
            lecture_id: L1,
            progress_percent: percent,
            last_timestamp_seconds: percent,
            duration_seconds: 100.0,
            completed,
            last_updated: fixed_now() + Duration::seconds(updated_offset_s),
        }
    }

    #[test]
    fn playback_tick_computes_percent() {
        let r = LectureProgressRecord::from_playback(L1, 45.0, 100.0, false, fixed_now());
        assert!((r.progress_percent - 45.0).abs() < f64::EPSILON);
        assert!(!r.completed);
    }

    #[test]
    fn playback_past_threshold_completes() {
        let r = LectureProgressRecord::from_playback(L1, 95.0, 100.0, false, fixed_now());
        assert!((r.progress_percent - 95.0).abs() < f64::EPSILON);
        assert!(r.completed);
    }

    #[test]
    fn zero_duration_yields_zero_percent() {
        let r = LectureProgressRecord::from_playback(L1, 45.0, 0.0, false, fixed_now());
        assert!(r.progress_percent.abs() < f64::EPSILON);
        assert!(!r.completed);
    }

    #[test]
    fn override_completes_regardless_of_percent() {
        let r = LectureProgressRecord::from_playback(L1, 10.0, 100.0, true, fixed_now());
        assert!(r.completed);
    }

    #[test]
    fn overshoot_clamps_to_100() {
        let r = LectureProgressRecord::from_playback(L1, 150.0, 100.0, false, fixed_now());
        assert!((r.progress_percent - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn absorb_keeps_completion_sticky() {
        let mut r = record(95.0, true, 0);
        r.absorb(&record(20.0, false, 10));
        assert!(r.completed);
        assert!((r.progress_percent - 95.0).abs() < f64::EPSILON);
    }

    #[test]
    fn absorb_advances_percent_and_clock() {
        let mut r = record(95.0, true, 0);
        r.absorb(&record(96.0, true, 10));
        assert!((r.progress_percent - 96.0).abs() < f64::EPSILON);
        assert_eq!(r.last_updated, fixed_now() + Duration::seconds(10));
    }

    #[test]
    fn merge_takes_max_and_or() {
        let local = record(40.0, false, 0);
        let server = record(70.0, false, 5);
        let merged = local.merged_with(&server);
        assert!((merged.progress_percent - 70.0).abs() < f64::EPSILON);
        assert!(!merged.completed);

        let local = record(95.0, true, 10);
        let server = record(30.0, false, 0);
        let merged = local.merged_with(&server);
        assert!((merged.progress_percent - 95.0).abs() < f64::EPSILON);
        assert!(merged.completed);
    }

    #[test]
    fn merge_is_commutative_and_idempotent() {
        let a = record(40.0, false, 0);
        let b = record(70.0, true, 5);
        assert_eq!(a.merged_with(&b), b.merged_with(&a));

        let once = a.merged_with(&b);
        let twice = once.merged_with(&b);
        assert_eq!(once, twice);
    }

    #[test]
    fn merge_is_associative() {
        let a = record(40.0, false, 0);
        let b = record(70.0, false, 5);
        let c = record(55.0, true, 3);
        assert_eq!(
            a.merged_with(&b).merged_with(&c),
            a.merged_with(&b.merged_with(&c))
        );
    }

    #[test]
    fn snapshot_counts_and_percentages() {
        let records: Vec<_> = (1..=10)
            .map(|i| LectureProgressRecord {
                lecture_id: LectureId::new(i),
                progress_percent: if i <= 9 { 100.0 } else { 10.0 },
                last_timestamp_seconds: 0.0,
                duration_seconds: 100.0,
                completed: i <= 9,
                last_updated: fixed_now(),
            })
            .collect();

        let snap = CourseProgressSnapshot::recompute(
            &records,
            CourseTotals {
                total_lectures: 10,
                total_quizzes: 2,
                completed_quizzes: 1,
            },
        );
        assert_eq!(snap.completed_lectures_count, 9);
        assert_eq!(snap.video_percent, 90);
        assert_eq!(snap.quiz_percent, 50);
        assert_eq!(snap.overall_percent, 83);
        assert_eq!(snap.certificate_progress_percent, 90);
        assert!(snap.certificate_eligible);
        assert!(!snap.is_completed);
    }

    #[test]
    fn empty_course_is_neither_eligible_nor_complete() {
        let snap = CourseProgressSnapshot::recompute(
            &[],
            CourseTotals {
                total_lectures: 0,
                total_quizzes: 0,
                completed_quizzes: 0,
            },
        );
        assert!(!snap.certificate_eligible);
        assert!(!snap.is_completed);
        assert_eq!(snap.overall_percent, 0);
    }
}
