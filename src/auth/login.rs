//! Brokerage login with cached-session reuse.
//!
//! `Authenticator::login` decides, for a given credential and caching
//! preference, whether to reuse a persisted session or drive a fresh
//! login against the provider, handling MFA and device-challenge steps
//! through an operator prompt. A reused session is validated with a
//! probe call first; any probe failure falls back to a full fresh
//! login (there is no refresh-token flow).

use std::fmt;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};

use crate::api::provider::{AuthProvider, Challenge, LoginPayload, LoginResponse};
use crate::api::BrokerClient;
use crate::config::Config;

use super::context::SessionContext;
use super::error::AuthError;
use super::prompt::{Prompter, StdinPrompter};
use super::session::{session_key, SessionRecord, SessionStore};

/// OAuth client id the brokerage issues to its first-party apps.
const CLIENT_ID: &str = "c82SH0WZOsabOXGP2sxqcj34FxkvfnWRZBKlBjFS";

/// Default requested session lifetime in seconds (24 hours).
const DEFAULT_SESSION_TTL_SECS: u64 = 86400;

/// Default cap on operator verification attempts per login.
const DEFAULT_MAX_CHALLENGE_ATTEMPTS: u32 = 3;

/// Default time to wait for one operator prompt.
const DEFAULT_PROMPT_TIMEOUT_SECS: u64 = 120;

/// Delivery channel for challenge codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeMode {
    Sms,
    Email,
}

impl ChallengeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeMode::Sms => "sms",
            ChallengeMode::Email => "email",
        }
    }
}

/// Options for one login call.
#[derive(Debug, Clone)]
pub struct LoginOptions {
    /// Requested session lifetime in seconds.
    pub session_ttl: u64,
    pub scope: String,
    pub challenge_mode: ChallengeMode,
    /// Reuse and persist session records. When false, any existing
    /// record for the session key is deleted and never read.
    pub use_cache: bool,
    /// Cap on MFA/challenge verification attempts.
    pub max_challenge_attempts: u32,
    /// Time to wait for each operator prompt before giving up.
    pub prompt_timeout: Duration,
}

impl Default for LoginOptions {
    fn default() -> Self {
        Self {
            session_ttl: DEFAULT_SESSION_TTL_SECS,
            scope: "internal".to_string(),
            challenge_mode: ChallengeMode::Sms,
            use_cache: true,
            max_challenge_attempts: DEFAULT_MAX_CHALLENGE_ATTEMPTS,
            prompt_timeout: Duration::from_secs(DEFAULT_PROMPT_TIMEOUT_SECS),
        }
    }
}

/// Where a login result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    Cache,
    Fresh,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::Cache => write!(f, "loaded from cache"),
            Provenance::Fresh => write!(f, "fresh login"),
        }
    }
}

/// Token data returned to the caller after a successful login.
#[derive(Debug, Clone)]
pub struct LoginResult {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub scope: String,
    pub detail: Provenance,
    pub backup_code: Option<String>,
    pub refresh_token: String,
}

/// A completed login: the token data plus the session context to pass
/// to subsequent API calls.
#[derive(Debug, Clone)]
pub struct LoginSession {
    pub result: LoginResult,
    pub context: SessionContext,
}

/// Drives logins against an auth provider, reusing persisted sessions
/// when the provider still accepts them.
pub struct Authenticator<P, U> {
    provider: P,
    prompter: U,
    store: SessionStore,
}

impl Authenticator<BrokerClient, StdinPrompter> {
    /// Wire up the default HTTP client, stdin prompter, and the session
    /// store from the configured session directory.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let provider = BrokerClient::new()?;
        let store = SessionStore::new(config.session_dir()?);
        Ok(Self::new(provider, StdinPrompter, store))
    }
}

impl<P: AuthProvider, U: Prompter> Authenticator<P, U> {
    pub fn new(provider: P, prompter: U, store: SessionStore) -> Self {
        Self {
            provider,
            prompter,
            store,
        }
    }

    /// Log in as `username`, reusing a persisted session when allowed.
    ///
    /// Fails with [`AuthError::Rejected`] when the provider ultimately
    /// rejects the credential, and [`AuthError::ChallengeExhausted`]
    /// when MFA/challenge verification runs out of attempts. All
    /// cache-related failures fall back to a fresh login instead of
    /// surfacing.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        opts: &LoginOptions,
    ) -> Result<LoginSession, AuthError> {
        let key = session_key(username);
        let mut payload = LoginPayload {
            client_id: CLIENT_ID.to_string(),
            expires_in: opts.session_ttl,
            grant_type: "password".to_string(),
            password: password.to_string(),
            scope: opts.scope.clone(),
            username: username.to_string(),
            challenge_type: opts.challenge_mode.as_str().to_string(),
            device_token: self.provider.generate_device_token(),
            mfa_code: None,
        };

        if !opts.use_cache {
            // Cache invalidation by removal; the record is never read.
            if let Err(err) = self.store.clear(key) {
                warn!(key, error = %err, "Failed to delete session record");
            }
        } else {
            match self.store.load(key) {
                Ok(Some(record)) => {
                    // Keep the device token the provider first saw.
                    payload.device_token = record.device_token.clone();
                    let mut context =
                        SessionContext::authenticated(&record.token_type, &record.access_token);
                    match self.provider.probe(&context).await {
                        Ok(()) => {
                            debug!(key, "cached session accepted by provider");
                            let result = LoginResult {
                                access_token: record.access_token,
                                token_type: record.token_type,
                                expires_in: opts.session_ttl,
                                scope: opts.scope.clone(),
                                detail: Provenance::Cache,
                                backup_code: None,
                                refresh_token: record.refresh_token,
                            };
                            return Ok(LoginSession { result, context });
                        }
                        Err(err) => {
                            warn!(key, error = %err, "Cached session rejected, logging in fresh");
                            context.mark_expired();
                        }
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(key, error = %err, "Unreadable session record, logging in fresh");
                }
            }
        }

        debug!(username, "requesting fresh login");
        let mut response = self
            .provider
            .submit_login(&payload, None)
            .await
            .map_err(|err| AuthError::Rejected(err.to_string()))?;

        if response.mfa_required {
            response = self.drive_mfa(&mut payload, opts).await?;
        } else if let Some(challenge) = response.challenge.take() {
            response = self.drive_challenge(&payload, &challenge, opts).await?;
        }

        let Some(access_token) = response.access_token else {
            let detail = response
                .detail
                .unwrap_or_else(|| "provider returned no access token".to_string());
            return Err(AuthError::Rejected(detail));
        };
        let token_type = response.token_type.unwrap_or_else(|| "Bearer".to_string());
        let refresh_token = response.refresh_token.unwrap_or_default();

        let context = SessionContext::authenticated(&token_type, &access_token);
        if opts.use_cache {
            let record = SessionRecord {
                token_type: token_type.clone(),
                access_token: access_token.clone(),
                refresh_token: refresh_token.clone(),
                device_token: payload.device_token.clone(),
                saved_at: Utc::now(),
            };
            // A persist failure must not undo a successful login.
            if let Err(err) = self.store.save(key, &record) {
                warn!(key, error = %err, "Failed to persist session record");
            }
        }

        let result = LoginResult {
            access_token,
            token_type,
            expires_in: response.expires_in.unwrap_or(opts.session_ttl),
            scope: opts.scope.clone(),
            detail: Provenance::Fresh,
            backup_code: response.backup_code,
            refresh_token,
        };
        Ok(LoginSession { result, context })
    }

    /// Prompt for MFA codes and resubmit the login until the provider
    /// returns a token or the attempt budget runs out.
    async fn drive_mfa(
        &self,
        payload: &mut LoginPayload,
        opts: &LoginOptions,
    ) -> Result<LoginResponse, AuthError> {
        for attempt in 1..=opts.max_challenge_attempts {
            let code = self
                .prompt_code("Enter the MFA code: ", attempt - 1, opts)
                .await?;
            payload.mfa_code = Some(code);
            let response = self
                .provider
                .submit_login(payload, None)
                .await
                .map_err(|err| AuthError::Rejected(err.to_string()))?;
            if response.access_token.is_some() {
                return Ok(response);
            }
            warn!(attempt, "MFA code rejected");
        }
        Err(AuthError::ChallengeExhausted {
            attempts: opts.max_challenge_attempts,
        })
    }

    /// Answer a device challenge, then replay the original login with
    /// the accepted challenge id attached.
    async fn drive_challenge(
        &self,
        payload: &LoginPayload,
        challenge: &Challenge,
        opts: &LoginOptions,
    ) -> Result<LoginResponse, AuthError> {
        let mut message = "Enter the verification code sent to your device: ";
        for attempt in 1..=opts.max_challenge_attempts {
            let code = self.prompt_code(message, attempt - 1, opts).await?;
            let res = self
                .provider
                .respond_to_challenge(&challenge.id, &code)
                .await
                .map_err(|err| AuthError::Rejected(err.to_string()))?;
            match res.challenge {
                None => {
                    return self
                        .provider
                        .submit_login(payload, Some(&challenge.id))
                        .await
                        .map_err(|err| AuthError::Rejected(err.to_string()));
                }
                Some(ref rejected) if rejected.remaining_attempts == 0 => {
                    return Err(AuthError::ChallengeExhausted { attempts: attempt });
                }
                Some(_) => {
                    warn!(attempt, "challenge code rejected");
                    message = "Code rejected. Enter the verification code: ";
                }
            }
        }
        Err(AuthError::ChallengeExhausted {
            attempts: opts.max_challenge_attempts,
        })
    }

    async fn prompt_code(
        &self,
        message: &str,
        attempts_so_far: u32,
        opts: &LoginOptions,
    ) -> Result<String, AuthError> {
        match tokio::time::timeout(opts.prompt_timeout, self.prompter.prompt(message)).await {
            Ok(Ok(code)) => Ok(code),
            Ok(Err(err)) => {
                warn!(error = %err, "Operator prompt failed");
                Err(AuthError::ChallengeExhausted {
                    attempts: attempts_so_far,
                })
            }
            Err(_) => {
                warn!("Operator prompt timed out");
                Err(AuthError::ChallengeExhausted {
                    attempts: attempts_so_far,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provenance_display() {
        assert_eq!(Provenance::Cache.to_string(), "loaded from cache");
        assert_eq!(Provenance::Fresh.to_string(), "fresh login");
    }

    #[test]
    fn challenge_mode_wire_values() {
        assert_eq!(ChallengeMode::Sms.as_str(), "sms");
        assert_eq!(ChallengeMode::Email.as_str(), "email");
    }

    #[test]
    fn default_options_enable_cache_and_bound_attempts() {
        let opts = LoginOptions::default();
        assert!(opts.use_cache);
        assert_eq!(opts.max_challenge_attempts, 3);
        assert_eq!(opts.session_ttl, 86400);
        assert_eq!(opts.scope, "internal");
    }
}
