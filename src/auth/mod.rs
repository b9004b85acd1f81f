//! Okta OAuth credential acquisition
//!
//! This module contains the authentication engine. Submodules:
//!
//! - [`pkce`] -- PKCE verifier/challenge generation (RFC 7636, `S256`).
//! - [`types`] -- wire and domain types for the Okta APIs.
//! - [`client`] -- the [`client::IdentityApi`] seam and its reqwest
//!   implementation [`client::IdentityClient`].
//! - [`poll`] -- the MFA verification poll loop.
//! - [`orchestrator`] -- the state machine tying it all together.
//! - [`fake`] -- an in-process scripted [`client::IdentityApi`] for tests.
//!
//! # Canonical Import Path
//!
//! ```no_run
//! use gimme_creds::auth::{authenticate, AuthSettings, IdentityClient};
//! ```

pub mod client;
pub mod fake;
pub mod orchestrator;
pub mod pkce;
pub mod poll;
pub mod types;

pub use client::{IdentityApi, IdentityClient};
pub use orchestrator::{authenticate, AuthSettings, Authenticator, Stage};
pub use poll::PollPolicy;
pub use types::Credentials;
