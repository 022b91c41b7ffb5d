//! Shared error types for the services crate.

use thiserror::Error;

use lesson_core::model::{CatalogError, LessonId};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Why a catalog load attempt failed. Load failures are never fatal: the
/// catalog service degrades to an empty catalog and logs the cause.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogLoadError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("catalog request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Invalid(#[from] CatalogError),
}

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressServiceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `UnlockService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum UnlockServiceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// User-correctable quiz interaction errors. These never mutate quiz state.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizError {
    #[error("please select a choice first")]
    NoSelection,
    #[error("this question was already answered")]
    AlreadyAnswered,
    #[error("answer the current question before advancing")]
    AdvanceLocked,
    #[error("the quiz is already finished")]
    Finished,
}

/// Errors emitted by the lesson session controller.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("unknown lesson id: {0}")]
    UnknownLesson(LessonId),
    #[error("no lesson is selected")]
    NoActiveLesson,
    #[error("lesson content is locked")]
    ContentLocked,
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error(transparent)]
    Progress(#[from] ProgressServiceError),
    #[error(transparent)]
    Unlock(#[from] UnlockServiceError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
