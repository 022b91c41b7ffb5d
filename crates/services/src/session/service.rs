use std::collections::HashMap;

use lesson_core::Clock;
use lesson_core::codec;
use lesson_core::gate;
use lesson_core::model::{Catalog, Lesson, LessonId, Progress, ProgressField, UnlockState};

use crate::error::SessionError;
use crate::progress_service::ProgressService;
use crate::unlock_service::{UnlockOutcome, UnlockService};

use super::quiz::{AnswerFeedback, AnswerRecord, QuizEngine, QuizState};
use super::view::{FeedbackView, LessonListItem, LessonView, ProgressMark, QuizView, SessionView};

//
// ─── PANELS AND CONTENT ────────────────────────────────────────────────────────
//

/// The visible panel of the active lesson.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Panel {
    #[default]
    Concept,
    Code,
    Quiz,
}

/// Display-ready lesson text, with obfuscated fields already decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct LessonContent {
    pub concept: String,
    pub concept_extra: String,
    pub summary: Vec<String>,
    pub pine_code: String,
    pub python_code: String,
}

impl LessonContent {
    fn from_lesson(lesson: &Lesson, key: &str) -> Self {
        if lesson.is_encrypted {
            Self {
                concept: codec::decode_field(&lesson.concept, key),
                concept_extra: codec::decode_field(&lesson.concept_extra, key),
                summary: lesson.summary.clone(),
                pine_code: codec::decode_field(&lesson.pine_code, key),
                python_code: codec::decode_field(&lesson.python_code, key),
            }
        } else {
            Self {
                concept: lesson.concept.clone(),
                concept_extra: lesson.concept_extra.clone(),
                summary: lesson.summary.clone(),
                pine_code: lesson.pine_code.clone(),
                python_code: lesson.python_code.clone(),
            }
        }
    }
}

/// State of the currently selected lesson. Recreated on every selection.
#[derive(Debug, Clone)]
struct ActiveLesson {
    lesson_id: LessonId,
    panel: Panel,
    /// `None` when the gating policy blocked the lesson.
    content: Option<LessonContent>,
    quiz: Option<QuizEngine>,
    last_feedback: Option<AnswerFeedback>,
}

impl ActiveLesson {
    fn locked(lesson_id: LessonId) -> Self {
        Self {
            lesson_id,
            panel: Panel::Concept,
            content: None,
            quiz: None,
            last_feedback: None,
        }
    }

    fn is_locked(&self) -> bool {
        self.content.is_none()
    }
}

//
// ─── SESSION CONTROLLER ────────────────────────────────────────────────────────
//

/// Top-level state machine tying together lesson selection, gating,
/// content decoding, the quiz flow, and completion tracking.
///
/// Every mutating operation persists its progress effects before returning,
/// so callers can snapshot immediately afterwards.
pub struct LessonSession {
    catalog: Catalog,
    progress: Progress,
    unlock: UnlockState,
    active: Option<ActiveLesson>,
    /// Transient per-question answers keyed `lessonId:questionIndex`.
    /// Discarded with the session, never persisted.
    answers: HashMap<String, AnswerRecord>,
    clock: Clock,
    progress_service: ProgressService,
    unlock_service: UnlockService,
}

impl LessonSession {
    /// Open a session over a loaded catalog, restoring persisted progress
    /// and unlock state.
    pub async fn open(
        catalog: Catalog,
        progress_service: ProgressService,
        unlock_service: UnlockService,
        clock: Clock,
    ) -> Self {
        let progress = progress_service.load().await;
        let unlock = unlock_service.load().await;
        Self {
            catalog,
            progress,
            unlock,
            active: None,
            answers: HashMap::new(),
            clock,
            progress_service,
            unlock_service,
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    #[must_use]
    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    #[must_use]
    pub fn unlock_state(&self) -> &UnlockState {
        &self.unlock
    }

    #[must_use]
    pub fn active_lesson_id(&self) -> Option<&LessonId> {
        self.active.as_ref().map(|active| &active.lesson_id)
    }

    /// Aggregate completion percentage over the loaded catalog.
    #[must_use]
    pub fn percent(&self) -> u8 {
        self.progress.percent_among(self.catalog.ids())
    }

    /// Select a lesson, replacing any previous active state.
    ///
    /// Authorized lessons are decoded, marked `readDone`/`codeDone`
    /// immediately (opening the lesson satisfies both), and get a fresh quiz
    /// at position 0. Unauthorized lessons become a locked shell exposing
    /// only the unlock affordance, with no progress mutation.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::UnknownLesson` for an id not in the catalog
    /// and propagates persistence failures.
    pub async fn select_lesson(&mut self, id: &LessonId) -> Result<(), SessionError> {
        let lesson = self
            .catalog
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::UnknownLesson(id.clone()))?;

        if !gate::is_authorized(&lesson, &self.unlock) {
            tracing::debug!(lesson = %lesson.id, "lesson is gated, showing unlock affordance");
            self.active = Some(ActiveLesson::locked(lesson.id));
            return Ok(());
        }

        let key = self.unlock.token().unwrap_or("");
        let content = LessonContent::from_lesson(&lesson, key);

        self.progress_service
            .mark(&mut self.progress, &lesson.id, ProgressField::Read)
            .await?;
        self.progress_service
            .mark(&mut self.progress, &lesson.id, ProgressField::Code)
            .await?;

        let quiz = QuizEngine::new(lesson.quiz.clone());
        if quiz.is_finished() {
            // A lesson with no questions is vacuously quizzed.
            self.progress_service
                .mark(&mut self.progress, &lesson.id, ProgressField::Quiz)
                .await?;
        }

        self.active = Some(ActiveLesson {
            lesson_id: lesson.id,
            panel: Panel::Concept,
            content: Some(content),
            quiz: Some(quiz),
            last_feedback: None,
        });
        Ok(())
    }

    /// Switch the visible panel. Pure UI state, no progress effects.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoActiveLesson` when nothing is selected.
    pub fn switch_panel(&mut self, panel: Panel) -> Result<(), SessionError> {
        let active = self.active.as_mut().ok_or(SessionError::NoActiveLesson)?;
        active.panel = panel;
        Ok(())
    }

    /// Submit an answer for the active lesson's current question.
    ///
    /// # Errors
    ///
    /// `NoActiveLesson`/`ContentLocked` when there is no quiz to answer;
    /// `Quiz` variants for user-correctable interaction errors.
    pub async fn submit_answer(
        &mut self,
        choice: Option<usize>,
    ) -> Result<AnswerFeedback, SessionError> {
        let now = self.clock.now();
        let active = self.active.as_mut().ok_or(SessionError::NoActiveLesson)?;
        let quiz = active.quiz.as_mut().ok_or(SessionError::ContentLocked)?;

        let feedback = quiz.submit(choice, now)?;
        self.answers.insert(
            format!("{}:{}", active.lesson_id, feedback.question_index),
            AnswerRecord {
                correct: feedback.correct,
                answered_at: feedback.answered_at,
            },
        );
        active.last_feedback = Some(feedback.clone());
        Ok(feedback)
    }

    /// Advance past an answered question; entering `Finished` marks the
    /// lesson's quiz as done.
    ///
    /// # Errors
    ///
    /// `NoActiveLesson`/`ContentLocked` when there is no quiz, `Quiz`
    /// variants otherwise; persistence failures propagate.
    pub async fn advance_quiz(&mut self) -> Result<QuizState, SessionError> {
        let (state, lesson_id) = {
            let active = self.active.as_mut().ok_or(SessionError::NoActiveLesson)?;
            let quiz = active.quiz.as_mut().ok_or(SessionError::ContentLocked)?;
            let state = quiz.advance()?;
            active.last_feedback = None;
            (state, active.lesson_id.clone())
        };

        if matches!(state, QuizState::Finished { .. }) {
            self.progress_service
                .mark(&mut self.progress, &lesson_id, ProgressField::Quiz)
                .await?;
        }
        Ok(state)
    }

    /// Submit an unlock code. On acceptance the active lesson is re-selected
    /// so freshly authorized content is decoded and rendered.
    ///
    /// # Errors
    ///
    /// Propagates persistence failures; a rejected code is an
    /// `Ok(Rejected(..))`, not an error.
    pub async fn submit_code(&mut self, input: &str) -> Result<UnlockOutcome, SessionError> {
        let outcome = self.unlock_service.submit_code(input).await?;
        if let UnlockOutcome::Accepted(state) = &outcome {
            self.unlock = state.clone();
            if let Some(id) = self.active_lesson_id().cloned() {
                self.select_lesson(&id).await?;
            }
        }
        Ok(outcome)
    }

    /// Reset all progress and revoke paid-content access, then re-select the
    /// active lesson (a gated lesson re-locks).
    ///
    /// # Errors
    ///
    /// Propagates persistence failures.
    pub async fn reset(&mut self) -> Result<(), SessionError> {
        self.progress_service.reset(&mut self.progress).await?;
        self.unlock = UnlockState::Locked;
        self.answers.clear();
        if let Some(id) = self.active_lesson_id().cloned() {
            self.select_lesson(&id).await?;
        }
        Ok(())
    }

    /// Transient answer record for a question of a lesson, if answered this
    /// session.
    #[must_use]
    pub fn answer_record(&self, id: &LessonId, question_index: usize) -> Option<&AnswerRecord> {
        self.answers.get(&format!("{id}:{question_index}"))
    }

    //
    // ─── SNAPSHOT ──────────────────────────────────────────────────────────
    //

    /// Read-only snapshot sufficient for the renderer to paint.
    #[must_use]
    pub fn snapshot(&self) -> SessionView {
        let items = self
            .catalog
            .entries()
            .map(|entry| {
                let marks = self.progress.marks(&entry.lesson.id);
                let mark = if marks.is_complete() {
                    ProgressMark::Complete
                } else if marks.is_untouched() {
                    ProgressMark::NotStarted
                } else {
                    ProgressMark::Partial(marks.done_count())
                };
                LessonListItem {
                    id: entry.lesson.id.clone(),
                    title: entry.lesson.title.clone(),
                    header: entry.header.map(str::to_string),
                    mark,
                    is_active: self.active_lesson_id() == Some(&entry.lesson.id),
                    is_gated: gate::is_gated(entry.lesson),
                }
            })
            .collect();

        SessionView {
            items,
            percent_label: format!("{}%", self.percent()),
            lesson: self.active.as_ref().and_then(|active| {
                let lesson = self.catalog.get(&active.lesson_id)?;
                Some(LessonView {
                    id: lesson.id.clone(),
                    title: lesson.title.clone(),
                    subtitle: lesson.subtitle.clone(),
                    category: lesson.category.clone(),
                    locked: active.is_locked(),
                    panel: active.panel,
                    content: active.content.clone(),
                    quiz: active
                        .quiz
                        .as_ref()
                        .map(|quiz| build_quiz_view(quiz, active.last_feedback.as_ref())),
                })
            }),
        }
    }
}

fn build_quiz_view(quiz: &QuizEngine, last_feedback: Option<&AnswerFeedback>) -> QuizView {
    let (title, progress_label, choices, finished) = match quiz.state() {
        QuizState::Empty => (
            "No quiz for this lesson".to_string(),
            "0 / 0".to_string(),
            Vec::new(),
            true,
        ),
        QuizState::Answering { index, total } => {
            let question = quiz
                .current_question()
                .map(|q| q.q.clone())
                .unwrap_or_default();
            let choices = quiz
                .current_question()
                .map(|q| q.choices.iter().map(|c| c.text.clone()).collect())
                .unwrap_or_default();
            (question, format!("{} / {total}", index + 1), choices, false)
        }
        QuizState::Finished { total } => (
            "Quiz complete".to_string(),
            format!("{total} / {total}"),
            Vec::new(),
            true,
        ),
    };

    QuizView {
        title,
        progress_label,
        choices,
        feedback: last_feedback.map(|feedback| FeedbackView {
            correct: feedback.correct,
            explain: feedback.explain.clone(),
        }),
        can_submit: quiz.can_submit(),
        can_advance: quiz.can_advance(),
        finished,
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use lesson_core::model::{Choice, Question};
    use lesson_core::time::fixed_clock;
    use storage::repository::{InMemoryRepository, KeyValueRepository};

    use crate::error::QuizError;
    use crate::progress_service::PROGRESS_KEY;

    use super::*;

    fn free_lesson(id: &str, quiz: Vec<Question>) -> Lesson {
        Lesson {
            id: LessonId::new(id),
            title: format!("Lesson {id}"),
            subtitle: String::new(),
            category: "Basics".to_string(),
            is_locked: false,
            is_encrypted: false,
            concept: "plain concept".to_string(),
            concept_extra: String::new(),
            summary: vec!["takeaway".to_string()],
            pine_code: "plot(close)".to_string(),
            python_code: String::new(),
            quiz,
        }
    }

    fn paid_lesson(id: &str, key: &str) -> Lesson {
        Lesson {
            id: LessonId::new(id),
            title: format!("Lesson {id}"),
            subtitle: String::new(),
            category: "量化策略".to_string(),
            is_locked: true,
            is_encrypted: true,
            concept: codec::encode_field("secret concept", key).unwrap(),
            concept_extra: String::new(),
            summary: Vec::new(),
            pine_code: codec::encode_field("secret code", key).unwrap(),
            python_code: String::new(),
            quiz: Vec::new(),
        }
    }

    fn question() -> Question {
        Question {
            q: "what plots a series?".to_string(),
            choices: vec![
                Choice {
                    text: "plot".to_string(),
                    is_correct: true,
                },
                Choice {
                    text: "print".to_string(),
                    is_correct: false,
                },
            ],
            explain: "plot draws on the chart".to_string(),
        }
    }

    async fn session_over(lessons: Vec<Lesson>) -> (LessonSession, Arc<InMemoryRepository>) {
        let repo = Arc::new(InMemoryRepository::new());
        let kv: Arc<dyn KeyValueRepository> = repo.clone();
        let session = LessonSession::open(
            Catalog::new(lessons).unwrap(),
            ProgressService::new(kv.clone()),
            UnlockService::new(kv),
            fixed_clock(),
        )
        .await;
        (session, repo)
    }

    #[tokio::test]
    async fn selecting_a_lesson_marks_read_and_code() {
        let (mut session, repo) = session_over(vec![free_lesson("a", vec![question()])]).await;

        session.select_lesson(&LessonId::new("a")).await.unwrap();

        let marks = session.progress().marks(&LessonId::new("a"));
        assert!(marks.read_done);
        assert!(marks.code_done);
        assert!(!marks.quiz_done);
        assert!(repo.get(PROGRESS_KEY).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn unknown_lesson_is_an_error() {
        let (mut session, _) = session_over(vec![free_lesson("a", Vec::new())]).await;
        let err = session.select_lesson(&LessonId::new("nope")).await.unwrap_err();
        assert!(matches!(err, SessionError::UnknownLesson(_)));
        assert!(session.active_lesson_id().is_none());
    }

    #[tokio::test]
    async fn quizless_lesson_completes_on_open() {
        let (mut session, _) = session_over(vec![free_lesson("a", Vec::new())]).await;
        session.select_lesson(&LessonId::new("a")).await.unwrap();
        assert!(session.progress().marks(&LessonId::new("a")).is_complete());
        assert_eq!(session.percent(), 100);
    }

    #[tokio::test]
    async fn gated_lesson_stays_locked_and_untouched() {
        let (mut session, _) =
            session_over(vec![paid_lesson("p", "pinegood888")]).await;

        session.select_lesson(&LessonId::new("p")).await.unwrap();

        let view = session.snapshot();
        let lesson = view.lesson.unwrap();
        assert!(lesson.locked);
        assert!(lesson.content.is_none());
        assert!(lesson.quiz.is_none());
        assert!(session.progress().marks(&LessonId::new("p")).is_untouched());
    }

    #[tokio::test]
    async fn accepted_code_reopens_and_decodes_the_active_lesson() {
        let (mut session, _) =
            session_over(vec![paid_lesson("p", "pinegood888")]).await;
        session.select_lesson(&LessonId::new("p")).await.unwrap();

        let outcome = session.submit_code("pinegood888").await.unwrap();
        assert!(matches!(outcome, UnlockOutcome::Accepted(_)));

        let view = session.snapshot();
        let content = view.lesson.unwrap().content.unwrap();
        assert_eq!(content.concept, "secret concept");
        assert_eq!(content.pine_code, "secret code");
        assert!(session.progress().marks(&LessonId::new("p")).read_done);
    }

    #[tokio::test]
    async fn wrong_case_key_yields_the_unavailable_sentinel() {
        // Match is case-insensitive but the key is used as typed, so an
        // uppercase entry cannot decode content encoded with the lowercase
        // key. Multi-byte text makes the failed decode invalid UTF-8.
        let mut lesson = paid_lesson("p", "pinegood888");
        lesson.concept = codec::encode_field("多字节秘密内容", "pinegood888").unwrap();
        let (mut session, _) = session_over(vec![lesson]).await;
        session.select_lesson(&LessonId::new("p")).await.unwrap();
        session.submit_code("PINEGOOD888").await.unwrap();

        let view = session.snapshot();
        let content = view.lesson.unwrap().content.unwrap();
        assert_eq!(content.concept, codec::UNAVAILABLE_TEXT);
    }

    #[tokio::test]
    async fn full_quiz_flow_marks_quiz_done() {
        let (mut session, _) = session_over(vec![free_lesson("a", vec![question()])]).await;
        session.select_lesson(&LessonId::new("a")).await.unwrap();

        let feedback = session.submit_answer(Some(0)).await.unwrap();
        assert!(feedback.correct);
        assert_eq!(feedback.explain, "plot draws on the chart");

        let state = session.advance_quiz().await.unwrap();
        assert_eq!(state, QuizState::Finished { total: 1 });
        assert!(session.progress().marks(&LessonId::new("a")).quiz_done);
        assert_eq!(session.percent(), 100);
        assert!(
            session
                .answer_record(&LessonId::new("a"), 0)
                .is_some_and(|record| record.correct)
        );
    }

    #[tokio::test]
    async fn answer_without_selection_is_a_quiz_error() {
        let (mut session, _) = session_over(vec![free_lesson("a", vec![question()])]).await;
        session.select_lesson(&LessonId::new("a")).await.unwrap();

        let err = session.submit_answer(None).await.unwrap_err();
        assert!(matches!(err, SessionError::Quiz(QuizError::NoSelection)));
    }

    #[tokio::test]
    async fn panel_switch_requires_an_active_lesson() {
        let (mut session, _) = session_over(vec![free_lesson("a", Vec::new())]).await;
        assert!(matches!(
            session.switch_panel(Panel::Quiz),
            Err(SessionError::NoActiveLesson)
        ));

        session.select_lesson(&LessonId::new("a")).await.unwrap();
        session.switch_panel(Panel::Quiz).unwrap();
        assert_eq!(session.snapshot().lesson.unwrap().panel, Panel::Quiz);
    }

    #[tokio::test]
    async fn reselecting_a_lesson_restarts_its_quiz() {
        let (mut session, _) = session_over(vec![free_lesson("a", vec![question()])]).await;
        session.select_lesson(&LessonId::new("a")).await.unwrap();
        session.submit_answer(Some(0)).await.unwrap();
        session.advance_quiz().await.unwrap();

        session.select_lesson(&LessonId::new("a")).await.unwrap();
        let quiz = session.snapshot().lesson.unwrap().quiz.unwrap();
        assert!(!quiz.finished);
        assert_eq!(quiz.progress_label, "1 / 1");
        // Completion flags survive the restart.
        assert!(session.progress().marks(&LessonId::new("a")).quiz_done);
    }

    #[tokio::test]
    async fn reset_relocks_gated_content_and_zeroes_percent() {
        let lessons = vec![
            free_lesson("a", Vec::new()),
            paid_lesson("p", "pinegood888"),
        ];
        let (mut session, repo) = session_over(lessons).await;
        session.submit_code("pinegood888").await.unwrap();
        session.select_lesson(&LessonId::new("p")).await.unwrap();
        assert!(!session.snapshot().lesson.unwrap().locked);

        session.reset().await.unwrap();

        assert_eq!(session.percent(), 0);
        assert_eq!(session.unlock_state(), &UnlockState::Locked);
        assert!(session.snapshot().lesson.unwrap().locked);
        assert_eq!(repo.get(PROGRESS_KEY).await.unwrap(), None);
        assert!(session.answer_record(&LessonId::new("p"), 0).is_none());
    }

    #[tokio::test]
    async fn snapshot_lists_headers_marks_and_percent() {
        let lessons = vec![
            free_lesson("a", Vec::new()),
            paid_lesson("p", "pinegood888"),
        ];
        let (mut session, _) = session_over(lessons).await;
        session.select_lesson(&LessonId::new("a")).await.unwrap();

        let view = session.snapshot();
        assert_eq!(view.percent_label, "50%");
        assert_eq!(view.items.len(), 2);
        assert_eq!(view.items[0].header.as_deref(), Some("Basics"));
        assert_eq!(view.items[0].mark, ProgressMark::Complete);
        assert!(view.items[0].is_active);
        assert_eq!(view.items[1].header.as_deref(), Some("量化策略"));
        assert!(view.items[1].is_gated);
        assert_eq!(view.items[1].mark, ProgressMark::NotStarted);
    }
}
