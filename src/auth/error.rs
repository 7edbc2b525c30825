use thiserror::Error;

/// Errors surfaced by the login flow.
///
/// Cache-related failures (missing, unreadable, or malformed session
/// records, failed probe calls) are recovered internally by falling
/// back to a fresh login and never appear here. Only final provider
/// rejection and exhausted verification attempts reach the caller.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The provider rejected the login. Carries the provider's detail
    /// string; a bad password and an unreachable provider both arrive
    /// this way.
    #[error("login rejected: {0}")]
    Rejected(String),

    /// MFA or challenge verification did not succeed within the
    /// configured attempt budget (or the operator prompt timed out).
    #[error("verification failed after {attempts} attempt(s)")]
    ChallengeExhausted { attempts: u32 },
}
