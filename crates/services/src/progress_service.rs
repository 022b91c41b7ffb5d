use std::sync::Arc;

use lesson_core::model::{LessonId, Progress, ProgressField};
use storage::repository::{KeyValueRepository, StorageError};

use crate::error::ProgressServiceError;
use crate::unlock_service::UNLOCK_KEY;

/// Store key for the serialized progress record.
pub const PROGRESS_KEY: &str = "ps_progress";

/// Persists per-lesson completion state.
///
/// Every mutation is written through immediately; there is no batching or
/// write-behind.
#[derive(Clone)]
pub struct ProgressService {
    kv: Arc<dyn KeyValueRepository>,
}

impl ProgressService {
    #[must_use]
    pub fn new(kv: Arc<dyn KeyValueRepository>) -> Self {
        Self { kv }
    }

    /// Load persisted progress.
    ///
    /// Never fails: an absent record means a fresh start, and an unreadable
    /// or unparsable record is treated as "no progress yet" with a logged
    /// diagnostic.
    pub async fn load(&self) -> Progress {
        let raw = match self.kv.get(PROGRESS_KEY).await {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(error = %err, "progress read failed, starting fresh");
                return Progress::new();
            }
        };
        let Some(raw) = raw else {
            return Progress::new();
        };
        serde_json::from_str(&raw).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "stored progress is corrupt, starting fresh");
            Progress::new()
        })
    }

    /// Serialize and write the whole progress record.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the write fails.
    pub async fn save(&self, progress: &Progress) -> Result<(), ProgressServiceError> {
        let raw = serde_json::to_string(progress)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        self.kv.set(PROGRESS_KEY, &raw).await?;
        Ok(())
    }

    /// Idempotently set a completion flag and persist immediately.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the write fails.
    pub async fn mark(
        &self,
        progress: &mut Progress,
        id: &LessonId,
        field: ProgressField,
    ) -> Result<(), ProgressServiceError> {
        progress.mark(id, field, true);
        self.save(progress).await
    }

    /// Clear all progress **and revoke paid-content access**.
    ///
    /// Resetting progress is defined to also remove the unlock state; the
    /// coupling is part of this contract, not two call sites kept in sync by
    /// convention.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if either delete fails.
    pub async fn reset(&self, progress: &mut Progress) -> Result<(), ProgressServiceError> {
        progress.clear();
        self.kv.remove(PROGRESS_KEY).await?;
        self.kv.remove(UNLOCK_KEY).await?;
        tracing::info!("progress and unlock state reset");
        Ok(())
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
