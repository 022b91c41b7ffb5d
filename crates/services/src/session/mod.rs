//! The interactive lesson session: selection, gating, quiz flow, and the
//! read-only snapshot handed to the renderer.

pub mod quiz;
pub mod service;
pub mod view;

pub use quiz::{AnswerFeedback, AnswerRecord, QuizEngine, QuizState};
pub use service::{LessonContent, LessonSession, Panel};
pub use view::{
    FeedbackView, LessonListItem, LessonView, ProgressMark, QuizView, SessionView,
};
