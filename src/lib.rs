//! findash core - brokerage session management for the findash report
//! generator.
//!
//! This library owns the login-cache decision for the brokerage account
//! API: reuse a previously persisted session when the provider still
//! accepts its token, otherwise drive a fresh login, handling the
//! provider's MFA and device-challenge steps along the way.
//!
//! The entry point is [`auth::Authenticator`]; the HTTP side of the
//! provider contract lives in [`api::BrokerClient`].

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiError, AuthProvider, BrokerClient};
pub use auth::{
    AuthError, Authenticator, LoginOptions, LoginResult, LoginSession, Provenance,
    SessionContext, SessionRecord, SessionStore, StdinPrompter,
};
pub use config::Config;
