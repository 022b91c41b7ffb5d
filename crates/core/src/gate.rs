//! Content gating: decides whether a lesson's content may be shown, and
//! validates unlock codes.
//!
//! Authorization is entirely client-side: a fixed allow-list of codes and a
//! category keyword list. `validate_code` is the single seam a
//! server-verified entitlement check would replace.

use thiserror::Error;

use crate::model::{Lesson, UnlockState};

/// Category keywords that mark a lesson group as paid content.
pub const PAID_CATEGORY_KEYWORDS: &[&str] = &["内置指标", "量化策略"];

/// Accepted unlock codes, compared case-insensitively.
const VALID_CODES: &[&str] = &["PINEGOOD888"];

/// Whether a category label belongs to a paid group (substring match).
#[must_use]
pub fn is_paid_category(category: &str) -> bool {
    PAID_CATEGORY_KEYWORDS
        .iter()
        .any(|keyword| category.contains(keyword))
}

/// A lesson is gated when explicitly locked or in a paid category.
#[must_use]
pub fn is_gated(lesson: &Lesson) -> bool {
    lesson.is_locked || is_paid_category(&lesson.category)
}

/// Whether the viewer may see this lesson's content.
#[must_use]
pub fn is_authorized(lesson: &Lesson, unlock: &UnlockState) -> bool {
    !is_gated(lesson) || unlock.is_unlocked()
}

/// Why a submitted unlock code was not accepted.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CodeRejection {
    #[error("please enter an unlock code")]
    Empty,

    #[error("invalid unlock code, check it or contact the administrator")]
    Invalid,
}

/// Validate a submitted unlock code.
///
/// The input is trimmed and compared case-insensitively against the fixed
/// allow-list. The accepted token is returned verbatim (trimmed, original
/// case): it doubles as the obfuscation decoding key, so case must be
/// preserved exactly as typed.
///
/// # Errors
///
/// Returns `CodeRejection::Empty` for a blank input and
/// `CodeRejection::Invalid` for anything not on the allow-list.
pub fn validate_code(input: &str) -> Result<String, CodeRejection> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(CodeRejection::Empty);
    }
    let normalized = trimmed.to_uppercase();
    if VALID_CODES.contains(&normalized.as_str()) {
        Ok(trimmed.to_string())
    } else {
        Err(CodeRejection::Invalid)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
