use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::model::LessonId;

/// The three independent completion flags for one lesson.
///
/// Persisted field names (`readDone` etc.) match the original progress
/// record so existing stores keep working.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonMarks {
    #[serde(default, rename = "readDone")]
    pub read_done: bool,
    #[serde(default, rename = "codeDone")]
    pub code_done: bool,
    #[serde(default, rename = "quizDone")]
    pub quiz_done: bool,
}

impl LessonMarks {
    /// A lesson is fully complete iff all three flags are set.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.read_done && self.code_done && self.quiz_done
    }

    /// Number of flags set, for the `n/3` list marker.
    #[must_use]
    pub fn done_count(&self) -> usize {
        usize::from(self.read_done) + usize::from(self.code_done) + usize::from(self.quiz_done)
    }

    /// Returns true when no flag has been set yet.
    #[must_use]
    pub fn is_untouched(&self) -> bool {
        self.done_count() == 0
    }
}

/// One of the three completion flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressField {
    Read,
    Code,
    Quiz,
}

/// Process-wide persisted completion state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    #[serde(default)]
    lessons: HashMap<LessonId, LessonMarks>,
    /// Derived counter; recomputed on every mutation rather than trusted
    /// as stored truth.
    #[serde(default, rename = "totalCompleted")]
    total_completed: u32,
}

impl Progress {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Completion flags for a lesson; defaults when the lesson was never touched.
    #[must_use]
    pub fn marks(&self, id: &LessonId) -> LessonMarks {
        self.lessons.get(id).copied().unwrap_or_default()
    }

    /// Idempotently set one flag, creating the per-lesson record if absent.
    pub fn mark(&mut self, id: &LessonId, field: ProgressField, value: bool) {
        let marks = self.lessons.entry(id.clone()).or_default();
        match field {
            ProgressField::Read => marks.read_done = value,
            ProgressField::Code => marks.code_done = value,
            ProgressField::Quiz => marks.quiz_done = value,
        }
        self.recompute_total();
    }

    /// Drop every per-lesson record.
    pub fn clear(&mut self) {
        self.lessons.clear();
        self.total_completed = 0;
    }

    #[must_use]
    pub fn total_completed(&self) -> u32 {
        self.total_completed
    }

    /// Count of fully complete lessons among the given ids.
    pub fn completed_among<'a>(&self, ids: impl Iterator<Item = &'a LessonId>) -> usize {
        ids.filter(|id| self.marks(id).is_complete()).count()
    }

    /// Global percentage over the currently loaded lessons, clamped to 0..=100.
    ///
    /// An empty id set yields 0 (the divisor is `max(1, count)`).
    pub fn percent_among<'a>(&self, ids: impl Iterator<Item = &'a LessonId> + Clone) -> u8 {
        let total = ids.clone().count();
        let done = self.completed_among(ids);
        let percent = (done as f64 / total.max(1) as f64) * 100.0;
        percent.round().clamp(0.0, 100.0) as u8
    }

    fn recompute_total(&mut self) {
        let completed = self
            .lessons
            .values()
            .filter(|marks| marks.is_complete())
            .count();
        self.total_completed = u32::try_from(completed).unwrap_or(u32::MAX);
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> LessonId {
        LessonId::new(raw)
    }

    #[test]
    fn mark_creates_record_lazily() {
        let mut progress = Progress::new();
        assert!(progress.marks(&id("a")).is_untouched());

        progress.mark(&id("a"), ProgressField::Read, true);
        assert!(progress.marks(&id("a")).read_done);
        assert!(!progress.marks(&id("a")).is_complete());
    }

    #[test]
    fn full_completion_requires_all_three_flags() {
        let mut progress = Progress::new();
        progress.mark(&id("a"), ProgressField::Read, true);
        progress.mark(&id("a"), ProgressField::Code, true);
        assert_eq!(progress.total_completed(), 0);

        progress.mark(&id("a"), ProgressField::Quiz, true);
        assert_eq!(progress.total_completed(), 1);
        assert!(progress.marks(&id("a")).is_complete());
    }

    #[test]
    fn percent_over_loaded_lessons_only() {
        let ids = vec![id("a"), id("b")];
        let mut progress = Progress::new();
        for field in [ProgressField::Read, ProgressField::Code, ProgressField::Quiz] {
            progress.mark(&id("a"), field, true);
        }
        // A completed lesson that is no longer loaded does not count.
        for field in [ProgressField::Read, ProgressField::Code, ProgressField::Quiz] {
            progress.mark(&id("stale"), field, true);
        }

        assert_eq!(progress.percent_among(ids.iter()), 50);
    }

    #[test]
    fn percent_of_empty_catalog_is_zero() {
        let progress = Progress::new();
        assert_eq!(progress.percent_among([].iter()), 0);
    }

    #[test]
    fn percent_is_monotone_under_marking() {
        let ids = vec![id("a"), id("b"), id("c")];
        let mut progress = Progress::new();
        let mut last = progress.percent_among(ids.iter());

        for lesson in &ids {
            for field in [ProgressField::Read, ProgressField::Code, ProgressField::Quiz] {
                progress.mark(lesson, field, true);
                let now = progress.percent_among(ids.iter());
                assert!(now >= last);
                last = now;
            }
        }
        assert_eq!(last, 100);
    }

    #[test]
    fn persisted_shape_matches_original_record() {
        let mut progress = Progress::new();
        progress.mark(&id("a"), ProgressField::Read, true);

        let json = serde_json::to_value(&progress).unwrap();
        assert_eq!(json["lessons"]["a"]["readDone"], true);
        assert_eq!(json["lessons"]["a"]["quizDone"], false);
        assert_eq!(json["totalCompleted"], 0);

        let back: Progress = serde_json::from_value(json).unwrap();
        assert_eq!(back, progress);
    }
}
