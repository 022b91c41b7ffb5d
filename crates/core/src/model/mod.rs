mod ids;
mod lesson;
mod progress;
mod quiz;
mod unlock;

pub use ids::{LessonId, ParseIdError};
pub use lesson::{Catalog, CatalogDocument, CatalogError, Lesson, LessonEntry};
pub use progress::{LessonMarks, Progress, ProgressField};
pub use quiz::{Choice, Question};
pub use unlock::UnlockState;
