/// Marker prefix the original store used for the persisted unlock value.
/// Kept so existing `ps_vip_user` entries remain readable.
const TOKEN_MARKER: &str = "manual_code_";

/// Paid-content unlock state, persisted process-wide.
///
/// Presence alone grants access to every gated lesson; there is no
/// per-lesson unlock. The token is the literal accepted code, which doubles
/// as the obfuscation decoding key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum UnlockState {
    #[default]
    Locked,
    Unlocked {
        token: String,
    },
}

impl UnlockState {
    #[must_use]
    pub fn unlocked(token: impl Into<String>) -> Self {
        Self::Unlocked {
            token: token.into(),
        }
    }

    #[must_use]
    pub fn is_unlocked(&self) -> bool {
        matches!(self, Self::Unlocked { .. })
    }

    /// The accepted unlock token, if any.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        match self {
            Self::Locked => None,
            Self::Unlocked { token } => Some(token),
        }
    }

    /// Rebuild the state from the raw stored value, stripping the marker
    /// prefix when present. `None` means locked.
    #[must_use]
    pub fn from_stored(raw: Option<String>) -> Self {
        match raw {
            None => Self::Locked,
            Some(value) => {
                let token = value
                    .strip_prefix(TOKEN_MARKER)
                    .unwrap_or(value.as_str())
                    .trim()
                    .to_string();
                Self::Unlocked { token }
            }
        }
    }

    /// Serialized form for the persistent store, `None` when locked.
    #[must_use]
    pub fn to_stored(&self) -> Option<String> {
        self.token().map(|token| format!("{TOKEN_MARKER}{token}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_value_is_locked() {
        assert_eq!(UnlockState::from_stored(None), UnlockState::Locked);
    }

    #[test]
    fn stored_marker_is_stripped_on_read() {
        let state = UnlockState::from_stored(Some("manual_code_pinegood888".to_string()));
        assert_eq!(state.token(), Some("pinegood888"));
    }

    #[test]
    fn legacy_value_without_marker_is_kept_verbatim() {
        let state = UnlockState::from_stored(Some("admin_whitelist_auto".to_string()));
        assert!(state.is_unlocked());
        assert_eq!(state.token(), Some("admin_whitelist_auto"));
    }

    #[test]
    fn stored_roundtrip_preserves_token() {
        let state = UnlockState::unlocked("PineGood888");
        let raw = state.to_stored().unwrap();
        assert_eq!(raw, "manual_code_PineGood888");
        assert_eq!(UnlockState::from_stored(Some(raw)), state);
    }

    #[test]
    fn locked_state_has_no_stored_form() {
        assert_eq!(UnlockState::Locked.to_stored(), None);
    }
}
