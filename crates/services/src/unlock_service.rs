use std::sync::Arc;

use lesson_core::gate::{self, CodeRejection};
use lesson_core::model::UnlockState;
use storage::repository::KeyValueRepository;

use crate::error::UnlockServiceError;

/// Store key for the unlock token.
pub const UNLOCK_KEY: &str = "ps_vip_user";

/// Result of submitting an unlock code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnlockOutcome {
    /// Code accepted; the new state has been persisted.
    Accepted(UnlockState),
    /// Code rejected; unlock state is unchanged.
    Rejected(CodeRejection),
}

/// Validates unlock codes and persists the resulting unlock state.
///
/// Acceptance is a one-way ratchet: only `ProgressService::reset` (or
/// `revoke`) clears it again.
#[derive(Clone)]
pub struct UnlockService {
    kv: Arc<dyn KeyValueRepository>,
}

impl UnlockService {
    #[must_use]
    pub fn new(kv: Arc<dyn KeyValueRepository>) -> Self {
        Self { kv }
    }

    /// Load persisted unlock state. Read failures degrade to `Locked`.
    pub async fn load(&self) -> UnlockState {
        match self.kv.get(UNLOCK_KEY).await {
            Ok(raw) => UnlockState::from_stored(raw),
            Err(err) => {
                tracing::warn!(error = %err, "unlock state read failed, treating as locked");
                UnlockState::Locked
            }
        }
    }

    /// Validate a submitted code and, on acceptance, persist the token.
    ///
    /// The token is stored verbatim as typed (trimmed): it doubles as the
    /// obfuscation decoding key.
    ///
    /// # Errors
    ///
    /// Returns `UnlockServiceError::Storage` if persisting an accepted
    /// token fails. A rejected code is an `Ok(Rejected(..))`, not an error.
    pub async fn submit_code(&self, input: &str) -> Result<UnlockOutcome, UnlockServiceError> {
        match gate::validate_code(input) {
            Ok(token) => {
                let state = UnlockState::unlocked(token);
                if let Some(raw) = state.to_stored() {
                    self.kv.set(UNLOCK_KEY, &raw).await?;
                }
                tracing::info!("unlock code accepted");
                Ok(UnlockOutcome::Accepted(state))
            }
            Err(rejection) => {
                tracing::debug!(reason = %rejection, "unlock code rejected");
                Ok(UnlockOutcome::Rejected(rejection))
            }
        }
    }

    /// Remove the persisted unlock state.
    ///
    /// # Errors
    ///
    /// Returns `UnlockServiceError::Storage` if the delete fails.
    pub async fn revoke(&self) -> Result<(), UnlockServiceError> {
        self.kv.remove(UNLOCK_KEY).await?;
        Ok(())
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use storage::repository::InMemoryRepository;

    fn service() -> (UnlockService, Arc<InMemoryRepository>) {
        let repo = Arc::new(InMemoryRepository::new());
        (UnlockService::new(repo.clone()), repo)
    }

    #[tokio::test]
    async fn lowercase_code_is_accepted_and_persisted_verbatim() {
        let (service, repo) = service();

        let outcome = service.submit_code("pinegood888").await.unwrap();
        assert_eq!(
            outcome,
            UnlockOutcome::Accepted(UnlockState::unlocked("pinegood888"))
        );

        let stored = repo.get(UNLOCK_KEY).await.unwrap().unwrap();
        assert_eq!(stored, "manual_code_pinegood888");
    }

    #[tokio::test]
    async fn wrong_code_leaves_state_absent() {
        let (service, repo) = service();

        let outcome = service.submit_code("wrong").await.unwrap();
        assert_eq!(outcome, UnlockOutcome::Rejected(CodeRejection::Invalid));
        assert_eq!(repo.get(UNLOCK_KEY).await.unwrap(), None);
        assert_eq!(service.load().await, UnlockState::Locked);
    }

    #[tokio::test]
    async fn empty_code_is_a_distinct_rejection() {
        let (service, _) = service();
        let outcome = service.submit_code("   ").await.unwrap();
        assert_eq!(outcome, UnlockOutcome::Rejected(CodeRejection::Empty));
    }

    #[tokio::test]
    async fn load_roundtrips_persisted_state() {
        let (service, _) = service();
        service.submit_code("PINEGOOD888").await.unwrap();
        assert_eq!(service.load().await, UnlockState::unlocked("PINEGOOD888"));
    }

    #[tokio::test]
    async fn revoke_clears_the_token() {
        let (service, _) = service();
        service.submit_code("pinegood888").await.unwrap();
        service.revoke().await.unwrap();
        assert_eq!(service.load().await, UnlockState::Locked);
    }
}
