//! Error types for gimme-creds
//!
//! Two layers live here. [`AuthError`] is the discriminated result of the
//! authentication engine: every fallible engine operation returns
//! [`AuthResult`] and the caller decides how to report it. [`GimmeError`]
//! covers everything around the engine (configuration, artifact writers,
//! keyring) and is carried through `anyhow` at the command level.

use std::time::Duration;

use thiserror::Error;

/// Failure of one authentication run.
///
/// Every variant is terminal; the engine never retries after producing one.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Transport-level failure (DNS, connection refused, timeout)
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// Primary authentication rejected with 401/403
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Factor verification rejected with 403
    #[error("Invalid MFA challenge")]
    InvalidChallenge,

    /// Factor push rejected with 429
    #[error("Rate limited by identity provider")]
    RateLimited,

    /// Token endpoint returned 400, usually a misconfigured application
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Any other non-success HTTP status
    #[error("Unexpected HTTP status {status} from {endpoint}")]
    UnexpectedResponse {
        /// Name of the call that failed
        endpoint: &'static str,
        /// Raw HTTP status code
        status: u16,
    },

    /// The organization requires enrolling an MFA factor first
    #[error("MFA enrollment required")]
    MfaEnrollmentRequired,

    /// The operator rejected the MFA challenge
    #[error("MFA challenge rejected")]
    MfaRejected,

    /// The identity provider reported the MFA challenge as timed out
    #[error("MFA challenge timed out")]
    MfaTimeout,

    /// Local upper bound on MFA polling was reached
    #[error("Gave up waiting for MFA approval after {}s", waited.as_secs())]
    PollTimeout {
        /// How long the poll loop waited
        waited: Duration,
    },

    /// A response body did not have the expected shape
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The authorize redirect echoed a different anti-CSRF state
    #[error("State mismatch in authorize redirect")]
    StateMismatch,

    /// The identity provider reported a status the engine does not handle
    #[error("Unexpected authentication status: {0}")]
    UnexpectedStatus(String),

    /// An operator prompt failed or was aborted
    #[error("Prompt failed: {0}")]
    Prompt(String),

    /// The run was interrupted by a signal
    #[error("Authentication cancelled")]
    Cancelled,
}

impl AuthError {
    /// Short, operator-facing line describing this failure class.
    pub fn status_line(&self) -> String {
        match self {
            Self::Network(_) => "Unknown error: is the network up?".to_string(),
            Self::InvalidCredentials => "Invalid password!".to_string(),
            Self::InvalidChallenge => "Invalid challenge!".to_string(),
            Self::RateLimited => "Slow down! Wait a few moments...".to_string(),
            Self::BadRequest(_) => "Bad request: maybe check Okta privileges?".to_string(),
            Self::UnexpectedResponse { endpoint, status } => {
                format!("{endpoint}: HTTP {status} is not OK")
            }
            Self::MfaEnrollmentRequired => {
                "Specified Okta organization requires MFA enrollment. \
                 Configure your MFA device in Okta and try again"
                    .to_string()
            }
            Self::MfaRejected => "MFA challenge rejected!".to_string(),
            Self::MfaTimeout => "MFA challenge timed out!".to_string(),
            Self::PollTimeout { .. } => "Gave up waiting for MFA approval!".to_string(),
            Self::MalformedResponse(_) => "Unexpected response from Okta".to_string(),
            Self::StateMismatch => "Authorization state mismatch, aborting".to_string(),
            Self::UnexpectedStatus(status) => format!("Unexpected Okta status: {status}"),
            Self::Prompt(_) => "Prompt failed".to_string(),
            Self::Cancelled => "Cancelled".to_string(),
        }
    }

    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Cancelled => 130,
            _ => 1,
        }
    }
}

/// Result type for the authentication engine
pub type AuthResult<T> = std::result::Result<T, AuthError>;

/// Errors raised around the engine: configuration, artifacts, storage.
#[derive(Error, Debug)]
pub enum GimmeError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Artifact generation errors
    #[error("Generator error: {0}")]
    Generator(String),

    /// Authentication engine errors
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// INI parsing errors
    #[error("INI error: {0}")]
    Ini(#[from] ini::Error),

    /// Keyring/credential storage errors
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),
}

/// Result type alias for command-level operations
///
/// Uses `anyhow::Error` so callers can attach context while still being
/// able to downcast to [`GimmeError`] or [`AuthError`].
pub type Result<T> = anyhow::Result<T>;
