//! gimme-creds - Okta --> OAuth --> Snowflake --> Creds
//!
//! This library acquires temporary Snowflake OAuth credentials through Okta
//! and writes the client configuration that uses them.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `auth`: PKCE, Okta HTTP client, MFA poll loop and the authentication
//!   state machine
//! - `interact`: keyring, terminal prompts and status lines behind traits
//! - `generator`: ODBC, dbt and generic credential file writers
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use gimme_creds::{Cli, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cli = Cli::default();
//!     let config = Config::load(std::path::Path::new("gimme-creds.yaml"), &cli)?;
//!     config.validate()?;
//!
//!     gimme_creds::commands::run(config, false).await
//! }
//! ```

pub mod auth;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod generator;
pub mod interact;

// Re-export commonly used types
pub use auth::{authenticate, AuthSettings, Credentials};
pub use cli::Cli;
pub use config::Config;
pub use error::{AuthError, GimmeError, Result};
