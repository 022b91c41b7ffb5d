//! Read-only render model handed to the display layer.
//!
//! The engine exposes a fresh snapshot after every mutating operation; the
//! renderer paints it without reaching back into session state.

use std::fmt;

use lesson_core::model::LessonId;

use super::service::{LessonContent, Panel};

/// Per-lesson status marker for the lesson list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressMark {
    NotStarted,
    /// Some of the three flags are set.
    Partial(usize),
    Complete,
}

impl fmt::Display for ProgressMark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressMark::NotStarted => write!(f, "not started"),
            ProgressMark::Partial(done) => write!(f, "{done}/3"),
            ProgressMark::Complete => write!(f, "done"),
        }
    }
}

/// One row of the lesson list, with its category header when the category
/// changes from the previous row.
#[derive(Debug, Clone, PartialEq)]
pub struct LessonListItem {
    pub id: LessonId,
    pub title: String,
    pub header: Option<String>,
    pub mark: ProgressMark,
    pub is_active: bool,
    pub is_gated: bool,
}

/// Feedback shown after a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackView {
    pub correct: bool,
    pub explain: String,
}

/// Everything the renderer needs to paint the quiz panel.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizView {
    /// Question prompt, completion banner, or the no-quiz notice.
    pub title: String,
    /// Position label, `"2 / 5"` style (`"0 / 0"` for an empty quiz).
    pub progress_label: String,
    pub choices: Vec<String>,
    pub feedback: Option<FeedbackView>,
    pub can_submit: bool,
    pub can_advance: bool,
    pub finished: bool,
}

/// The active lesson as the renderer sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct LessonView {
    pub id: LessonId,
    pub title: String,
    pub subtitle: String,
    pub category: String,
    /// When locked, content and quiz are absent and only the unlock
    /// affordance should be shown.
    pub locked: bool,
    pub panel: Panel,
    pub content: Option<LessonContent>,
    pub quiz: Option<QuizView>,
}

/// Full read-only snapshot of the session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub items: Vec<LessonListItem>,
    /// Aggregate completion over the loaded catalog, `"42%"` style.
    pub percent_label: String,
    pub lesson: Option<LessonView>,
}
