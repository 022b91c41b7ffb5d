use chrono::{DateTime, Utc};

use lesson_core::model::Question;

use crate::error::QuizError;

//
// ─── QUIZ STATE ────────────────────────────────────────────────────────────────
//

/// Observable position of a quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizState {
    /// The lesson has no questions; the quiz is vacuously complete.
    Empty,
    Answering {
        index: usize,
        total: usize,
    },
    Finished {
        total: usize,
    },
}

/// Feedback produced by a successful submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerFeedback {
    pub question_index: usize,
    pub correct: bool,
    /// Rationale from the question, empty when the author gave none.
    pub explain: String,
    pub answered_at: DateTime<Utc>,
}

/// Transient record of an answered question, keyed `lessonId:questionIndex`
/// by the session controller. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerRecord {
    pub correct: bool,
    pub answered_at: DateTime<Utc>,
}

//
// ─── QUIZ ENGINE ───────────────────────────────────────────────────────────────
//

/// Per-lesson sequential single-choice quiz.
///
/// Steps through questions one at a time. Submitting locks the current
/// question until `advance` is called; re-entering a lesson always builds a
/// fresh engine at position 0 (only the completion flag persists).
#[derive(Debug, Clone)]
pub struct QuizEngine {
    questions: Vec<Question>,
    current: usize,
    awaiting_advance: bool,
}

impl QuizEngine {
    #[must_use]
    pub fn new(questions: Vec<Question>) -> Self {
        Self {
            questions,
            current: 0,
            awaiting_advance: false,
        }
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn state(&self) -> QuizState {
        if self.questions.is_empty() {
            QuizState::Empty
        } else if self.current >= self.questions.len() {
            QuizState::Finished {
                total: self.questions.len(),
            }
        } else {
            QuizState::Answering {
                index: self.current,
                total: self.questions.len(),
            }
        }
    }

    /// True once every question has been answered, including the vacuous
    /// empty-quiz case.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.current >= self.questions.len()
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current)
    }

    /// Whether the submit control should be enabled.
    #[must_use]
    pub fn can_submit(&self) -> bool {
        !self.is_finished() && !self.awaiting_advance
    }

    /// Whether the advance control should be enabled.
    #[must_use]
    pub fn can_advance(&self) -> bool {
        self.awaiting_advance
    }

    /// Submit a choice for the current question.
    ///
    /// # Errors
    ///
    /// `NoSelection` when `choice` is `None` (no state change),
    /// `AlreadyAnswered` when the question awaits `advance`, and `Finished`
    /// past the last question.
    pub fn submit(
        &mut self,
        choice: Option<usize>,
        answered_at: DateTime<Utc>,
    ) -> Result<AnswerFeedback, QuizError> {
        if self.is_finished() {
            return Err(QuizError::Finished);
        }
        if self.awaiting_advance {
            return Err(QuizError::AlreadyAnswered);
        }
        let choice = choice.ok_or(QuizError::NoSelection)?;

        let question = &self.questions[self.current];
        let correct = question.is_correct(choice);
        self.awaiting_advance = true;

        Ok(AnswerFeedback {
            question_index: self.current,
            correct,
            explain: question.explain.clone(),
            answered_at,
        })
    }

    /// Move to the next question, or to `Finished` after the last one.
    ///
    /// # Errors
    ///
    /// `AdvanceLocked` unless the current question has been answered,
    /// `Finished` when the quiz is already over.
    pub fn advance(&mut self) -> Result<QuizState, QuizError> {
        if self.is_finished() {
            return Err(QuizError::Finished);
        }
        if !self.awaiting_advance {
            return Err(QuizError::AdvanceLocked);
        }
        self.current += 1;
        self.awaiting_advance = false;
        Ok(self.state())
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
