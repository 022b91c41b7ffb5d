use serde::{Deserialize, Serialize};

/// One selectable answer for a quiz question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub text: String,
    #[serde(default, rename = "isCorrect")]
    pub is_correct: bool,
}

/// A single-choice quiz question with immediate-feedback rationale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Prompt text (`q` in the catalog document).
    pub q: String,
    pub choices: Vec<Choice>,
    /// Optional rationale shown after answering; empty when absent.
    #[serde(default)]
    pub explain: String,
}

impl Question {
    /// Whether the choice at `index` is the correct one.
    ///
    /// Only the exact selected index's flag is consulted: an out-of-range
    /// index or a question with no correct choice yields `false`. Multiple
    /// correct choices are a data-quality assumption, not validated.
    #[must_use]
    pub fn is_correct(&self, index: usize) -> bool {
        self.choices.get(index).is_some_and(|c| c.is_correct)
    }
}
