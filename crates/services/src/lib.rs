//! Service layer for the lesson viewer: catalog loading, completion
//! tracking, unlock handling, and the interactive session controller.

#![forbid(unsafe_code)]

pub mod app_services;
pub mod catalog_service;
pub mod error;
pub mod progress_service;
pub mod session;
pub mod unlock_service;

pub use app_services::AppServices;
pub use catalog_service::CatalogService;
pub use error::{
    AppServicesError, CatalogLoadError, ProgressServiceError, QuizError, SessionError,
    UnlockServiceError,
};
pub use lesson_core::Clock;
pub use progress_service::{PROGRESS_KEY, ProgressService};
pub use session::{LessonSession, Panel, SessionView};
pub use unlock_service::{UNLOCK_KEY, UnlockOutcome, UnlockService};
