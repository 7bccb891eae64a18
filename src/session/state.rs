use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// What the client believes about its credentials.
///
/// The credentials themselves live in HTTP-only cookies; this only tracks
/// whether they are believed to be established.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub has_access_token: bool,
    pub has_refresh_token: bool,
    pub established_at: Option<Timestamp>,
}

impl SessionState {
    pub fn established(at: Timestamp) -> Self {
        Self {
            has_access_token: true,
            has_refresh_token: true,
            established_at: Some(at),
        }
    }

    pub fn cleared() -> Self {
        Self::default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.has_access_token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_cleared() {
        let state = SessionState::default();
        assert!(!state.has_access_token);
        assert!(!state.has_refresh_token);
        assert_eq!(state, SessionState::cleared());
    }

    #[test]
    fn snapshot_serializes_flags() {
        let state = SessionState::established(Timestamp::UNIX_EPOCH);
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["has_access_token"], true);
        assert_eq!(json["has_refresh_token"], true);
        assert!(json["established_at"].is_string());
    }
}
