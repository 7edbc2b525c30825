use std::fmt;

/// Lifecycle of a brokerage session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated { authorization: String },
    Expired,
}

/// Live authorization state for one brokerage session.
///
/// Passed explicitly to every authenticated API call; there is no
/// process-wide current session. A context starts unauthenticated,
/// becomes authenticated when a login succeeds (or a persisted record
/// is loaded), and is marked expired once the provider stops accepting
/// its token.
#[derive(Debug, Clone)]
pub struct SessionContext {
    state: SessionState,
}

impl SessionContext {
    pub fn unauthenticated() -> Self {
        Self {
            state: SessionState::Unauthenticated,
        }
    }

    /// Build an authenticated context from a token pair.
    pub fn authenticated(token_type: &str, access_token: &str) -> Self {
        Self {
            state: SessionState::Authenticated {
                authorization: format!("{} {}", token_type, access_token),
            },
        }
    }

    /// The `Authorization` header value, if authenticated.
    pub fn authorization(&self) -> Option<&str> {
        match self.state {
            SessionState::Authenticated { ref authorization } => Some(authorization),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, SessionState::Authenticated { .. })
    }

    /// Transition an authenticated context to expired. Called when a
    /// probe or an authenticated request comes back rejected.
    pub fn mark_expired(&mut self) {
        if self.is_authenticated() {
            self.state = SessionState::Expired;
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }
}

impl fmt::Display for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state {
            SessionState::Unauthenticated => write!(f, "unauthenticated"),
            SessionState::Authenticated { .. } => write!(f, "authenticated"),
            SessionState::Expired => write!(f, "expired"),
        }
    }
}
