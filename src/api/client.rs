//! HTTP client for the brokerage REST API.
//!
//! This module provides the `BrokerClient` struct implementing the
//! `AuthProvider` contract: the OAuth password-grant login endpoint,
//! the device-challenge endpoint, and the portfolio-profile endpoint
//! used both as data and as the probe for cached sessions.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{header, Client};
use tracing::debug;
use uuid::Uuid;

use crate::auth::SessionContext;
use crate::models::PortfolioProfile;

use super::provider::{AuthProvider, ChallengeResponse, LoginPayload, LoginResponse};
use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Base URL for the brokerage REST API
const DEFAULT_BASE_URL: &str = "https://api.robinhood.com";

/// HTTP request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Header carrying an accepted challenge-response id on login replay
const CHALLENGE_RESPONSE_HEADER: &str = "X-ROBINHOOD-CHALLENGE-RESPONSE-ID";

/// API client for the brokerage account service.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct BrokerClient {
    client: Client,
    base_url: String,
}

impl BrokerClient {
    /// Create a new API client
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Point the client at a different base URL (test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn login_url(&self) -> String {
        format!("{}/oauth2/token/", self.base_url)
    }

    fn challenge_url(&self, challenge_id: &str) -> String {
        format!("{}/challenge/{}/respond/", self.base_url, challenge_id)
    }

    fn portfolios_url(&self) -> String {
        format!("{}/portfolios/", self.base_url)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Fetch the account's portfolio profile.
    pub async fn fetch_portfolio_profile(
        &self,
        session: &SessionContext,
    ) -> Result<PortfolioProfile, ApiError> {
        let authorization = session.authorization().ok_or(ApiError::Unauthorized)?;

        let response = self
            .client
            .get(self.portfolios_url())
            .header(header::AUTHORIZATION, authorization)
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        let text = response.text().await?;
        debug!("Portfolio profile response received");

        // The endpoint returns either a results wrapper or the profile
        // itself; every profile field is optional, so the wrapper has
        // to be tried first.
        #[derive(serde::Deserialize)]
        struct PortfoliosWrapper {
            #[serde(default)]
            results: Vec<PortfolioProfile>,
        }

        if let Ok(wrapper) = serde_json::from_str::<PortfoliosWrapper>(&text) {
            if let Some(profile) = wrapper.results.into_iter().next() {
                return Ok(profile);
            }
        }

        serde_json::from_str(&text).map_err(|err| ApiError::InvalidResponse(err.to_string()))
    }
}

#[async_trait]
impl AuthProvider for BrokerClient {
    fn generate_device_token(&self) -> String {
        Uuid::new_v4().to_string()
    }

    async fn submit_login(
        &self,
        payload: &LoginPayload,
        challenge_id: Option<&str>,
    ) -> Result<LoginResponse, ApiError> {
        let mut request = self.client.post(self.login_url()).json(payload);
        if let Some(id) = challenge_id {
            request = request.header(CHALLENGE_RESPONSE_HEADER, id);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        debug!(status = %status, "Login response received");

        // Provider rejections arrive as a JSON body with a `detail`
        // field and a non-success status; parse the body whenever it is
        // valid JSON and let the caller inspect it.
        match serde_json::from_str::<LoginResponse>(&text) {
            Ok(parsed) => Ok(parsed),
            Err(_) if !status.is_success() => Err(ApiError::from_status(status, &text)),
            Err(err) => Err(ApiError::InvalidResponse(err.to_string())),
        }
    }

    async fn respond_to_challenge(
        &self,
        challenge_id: &str,
        code: &str,
    ) -> Result<ChallengeResponse, ApiError> {
        let body = serde_json::json!({ "response": code });
        let response = self
            .client
            .post(self.challenge_url(challenge_id))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        debug!(status = %status, "Challenge response received");

        // A rejected code comes back as a nested `challenge` object
        // with the remaining attempt count; an accepted code comes back
        // as a flat validated challenge, which parses with no nesting.
        match serde_json::from_str::<ChallengeResponse>(&text) {
            Ok(parsed) => Ok(parsed),
            Err(_) if !status.is_success() => Err(ApiError::from_status(status, &text)),
            Err(err) => Err(ApiError::InvalidResponse(err.to_string())),
        }
    }

    async fn probe(&self, session: &SessionContext) -> Result<(), ApiError> {
        let authorization = session.authorization().ok_or(ApiError::Unauthorized)?;

        let response = self
            .client
            .get(self.portfolios_url())
            .header(header::AUTHORIZATION, authorization)
            .send()
            .await?;

        Self::check_response(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_login_response_with_tokens() {
        let json = r#"{"access_token": "at", "token_type": "Bearer", "refresh_token": "rt", "expires_in": 86400}"#;
        let parsed: LoginResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.access_token.as_deref(), Some("at"));
        assert_eq!(parsed.token_type.as_deref(), Some("Bearer"));
        assert!(!parsed.mfa_required);
        assert!(parsed.challenge.is_none());
    }

    #[test]
    fn parse_login_response_with_challenge() {
        let json = r#"{"challenge": {"id": "ch-1", "remaining_attempts": 3, "status": "issued"}}"#;
        let parsed: LoginResponse = serde_json::from_str(json).unwrap();
        let challenge = parsed.challenge.unwrap();
        assert_eq!(challenge.id, "ch-1");
        assert_eq!(challenge.remaining_attempts, 3);
    }

    #[test]
    fn parse_mfa_required_response() {
        let json = r#"{"mfa_required": true, "mfa_type": "app"}"#;
        let parsed: LoginResponse = serde_json::from_str(json).unwrap();
        assert!(parsed.mfa_required);
        assert!(parsed.access_token.is_none());
    }

    #[test]
    fn accepted_challenge_body_parses_with_no_nested_challenge() {
        // The respond endpoint returns the challenge flat once validated
        let json = r#"{"id": "ch-1", "status": "validated", "remaining_attempts": 2}"#;
        let parsed: ChallengeResponse = serde_json::from_str(json).unwrap();
        assert!(parsed.challenge.is_none());
    }

    #[test]
    fn rejected_challenge_body_parses_nested() {
        let json = r#"{"challenge": {"id": "ch-1", "remaining_attempts": 1}}"#;
        let parsed: ChallengeResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.challenge.unwrap().remaining_attempts, 1);
    }

    #[test]
    fn device_tokens_are_unique() {
        let client = BrokerClient::new().unwrap();
        let a = client.generate_device_token();
        let b = client.generate_device_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
    }
}
