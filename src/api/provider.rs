//! The auth-provider contract the login flow drives.
//!
//! The wire protocol itself belongs to the implementation; the login
//! flow only sees these payloads and the four operations below, which
//! keeps it testable against scripted providers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::auth::SessionContext;

use super::ApiError;

/// Password-grant login request body.
#[derive(Clone, Serialize)]
pub struct LoginPayload {
    pub client_id: String,
    pub expires_in: u64,
    pub grant_type: String,
    pub password: String,
    pub scope: String,
    pub username: String,
    pub challenge_type: String,
    pub device_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mfa_code: Option<String>,
}

/// Login response. The provider returns either token fields, an
/// `mfa_required` flag, a nested `challenge`, or a bare `detail`
/// explaining the rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginResponse {
    pub access_token: Option<String>,
    pub token_type: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
    pub backup_code: Option<String>,
    #[serde(default)]
    pub mfa_required: bool,
    pub challenge: Option<Challenge>,
    pub detail: Option<String>,
}

/// A provider-initiated secondary verification step.
#[derive(Debug, Clone, Deserialize)]
pub struct Challenge {
    pub id: String,
    #[serde(default)]
    pub remaining_attempts: u32,
    #[serde(default)]
    pub status: Option<String>,
}

/// Response to a challenge-code submission. A nested `challenge` means
/// the code was rejected and carries the remaining attempt count; its
/// absence means the code was accepted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChallengeResponse {
    pub challenge: Option<Challenge>,
}

/// Operations the login flow needs from an auth provider.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// A fresh device identifier for login payloads.
    fn generate_device_token(&self) -> String;

    /// Submit a login request. When `challenge_id` is present the
    /// implementation attaches the accepted challenge-response id to
    /// the request.
    async fn submit_login(
        &self,
        payload: &LoginPayload,
        challenge_id: Option<&str>,
    ) -> Result<LoginResponse, ApiError>;

    /// Submit an operator-supplied code for a pending challenge.
    async fn respond_to_challenge(
        &self,
        challenge_id: &str,
        code: &str,
    ) -> Result<ChallengeResponse, ApiError>;

    /// Lightweight authenticated request used solely to check whether
    /// a session's token is still accepted.
    async fn probe(&self, session: &SessionContext) -> Result<(), ApiError>;
}
