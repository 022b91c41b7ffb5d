use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{LessonId, Question};

//
// ─── LESSON ────────────────────────────────────────────────────────────────────
//

/// A single lesson record as it appears in the catalog document.
///
/// Field names mirror the catalog JSON: `isLocked`/`isEncrypted` are
/// camelCase, everything else snake_case. All display fields default to
/// empty, since catalog authors omit them freely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: LessonId,
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    /// Grouping label; also inspected by the gating policy for paid groups.
    #[serde(default)]
    pub category: String,
    /// Explicit per-lesson gate flag, independent of category.
    #[serde(default, rename = "isLocked")]
    pub is_locked: bool,
    /// Whether gated text fields carry obfuscation-encoded payloads.
    #[serde(default, rename = "isEncrypted")]
    pub is_encrypted: bool,
    #[serde(default)]
    pub concept: String,
    #[serde(default)]
    pub concept_extra: String,
    #[serde(default)]
    pub summary: Vec<String>,
    #[serde(default)]
    pub pine_code: String,
    #[serde(default)]
    pub python_code: String,
    #[serde(default)]
    pub quiz: Vec<Question>,
}

//
// ─── CATALOG ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("duplicate lesson id: {0}")]
    DuplicateId(LessonId),

    #[error("lesson at position {0} has an empty id")]
    EmptyId(usize),
}

/// The full ordered list of lessons.
///
/// Catalog order is canonical display order and must already be grouped by
/// category for headers to render sensibly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    lessons: Vec<Lesson>,
}

impl Catalog {
    /// Build a catalog, validating that lesson ids are unique and non-empty.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::DuplicateId` or `CatalogError::EmptyId`.
    pub fn new(lessons: Vec<Lesson>) -> Result<Self, CatalogError> {
        let mut seen = std::collections::HashSet::new();
        for (index, lesson) in lessons.iter().enumerate() {
            if lesson.id.is_empty() {
                return Err(CatalogError::EmptyId(index));
            }
            if !seen.insert(lesson.id.clone()) {
                return Err(CatalogError::DuplicateId(lesson.id.clone()));
            }
        }
        Ok(Self { lessons })
    }

    /// An empty catalog, the degraded fallback when loading fails.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn lessons(&self) -> &[Lesson] {
        &self.lessons
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lessons.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lessons.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &LessonId) -> Option<&Lesson> {
        self.lessons.iter().find(|lesson| &lesson.id == id)
    }

    /// Ids of all lessons in catalog order. The iterator is `Clone` so
    /// aggregate helpers can take two passes over it.
    pub fn ids(&self) -> impl Iterator<Item = &LessonId> + Clone {
        self.lessons.iter().map(|lesson| &lesson.id)
    }

    /// Iterate lessons in display order, attaching a category header to each
    /// lesson whose category differs from the immediately preceding one.
    pub fn entries(&self) -> impl Iterator<Item = LessonEntry<'_>> {
        let mut last_category: Option<&str> = None;
        self.lessons.iter().map(move |lesson| {
            let header = if !lesson.category.is_empty() && last_category != Some(&lesson.category) {
                Some(lesson.category.as_str())
            } else {
                None
            };
            last_category = Some(&lesson.category);
            LessonEntry { header, lesson }
        })
    }
}

/// A lesson in display order, with the category header to show above it, if any.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LessonEntry<'a> {
    pub header: Option<&'a str>,
    pub lesson: &'a Lesson,
}

/// Wire shape of the content source: `{ "lessons": [...] }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogDocument {
    #[serde(default)]
    pub lessons: Vec<Lesson>,
}

impl CatalogDocument {
    /// Validate the document into a `Catalog`.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if lesson ids are missing or duplicated.
    pub fn into_catalog(self) -> Result<Catalog, CatalogError> {
        Catalog::new(self.lessons)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
