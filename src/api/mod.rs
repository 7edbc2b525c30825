//! REST API client module for the brokerage account service.
//!
//! This module provides the `AuthProvider` contract the login flow
//! drives, and `BrokerClient`, the reqwest implementation of it. The
//! API uses OAuth password-grant authentication with optional MFA or
//! device-challenge verification; authenticated requests carry the
//! session's authorization header.

pub mod client;
pub mod error;
pub mod provider;

pub use client::BrokerClient;
pub use error::ApiError;
pub use provider::{AuthProvider, Challenge, ChallengeResponse, LoginPayload, LoginResponse};
