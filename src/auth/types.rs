//! Wire and domain types for the Okta authentication flow
//!
//! Response bodies from the Okta Authentication API and the authorization
//! server are deserialized straight into these types. Status strings are
//! parsed leniently: anything the engine does not know about is kept as an
//! `Other` variant so the orchestrator can fail with the raw value.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};

// ---------------------------------------------------------------------------
// Status enums
// ---------------------------------------------------------------------------

/// Transaction status reported by `/api/v1/authn` and factor verification.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum AuthnStatus {
    /// `SUCCESS`
    Success,
    /// `MFA_REQUIRED`
    MfaRequired,
    /// `MFA_ENROLL`
    MfaEnroll,
    /// `MFA_CHALLENGE`
    MfaChallenge,
    /// Any other status string
    Other(String),
}

impl From<String> for AuthnStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "SUCCESS" => Self::Success,
            "MFA_REQUIRED" => Self::MfaRequired,
            "MFA_ENROLL" => Self::MfaEnroll,
            "MFA_CHALLENGE" => Self::MfaChallenge,
            _ => Self::Other(value),
        }
    }
}

impl Default for AuthnStatus {
    fn default() -> Self {
        Self::Other(String::new())
    }
}

impl fmt::Display for AuthnStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("SUCCESS"),
            Self::MfaRequired => f.write_str("MFA_REQUIRED"),
            Self::MfaEnroll => f.write_str("MFA_ENROLL"),
            Self::MfaChallenge => f.write_str("MFA_CHALLENGE"),
            Self::Other(s) => f.write_str(s),
        }
    }
}

/// Kind of an enrolled MFA factor (`factorType`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum FactorKind {
    /// Okta Verify push notification
    Push,
    /// SMS one-time code
    Sms,
    /// Software TOTP (`token:software:totp`)
    Totp,
    /// Anything else Okta may return
    Other(String),
}

impl FactorKind {
    /// Returns `true` when approval happens out of band and no pass-code is
    /// entered by the operator.
    pub fn is_implicit_approval(&self) -> bool {
        matches!(self, Self::Push)
    }

    /// Returns `true` when pushing the factor sends something to the
    /// operator (a notification or a text message).
    pub fn sends_challenge(&self) -> bool {
        matches!(self, Self::Push | Self::Sms)
    }
}

impl From<String> for FactorKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "push" => Self::Push,
            "sms" => Self::Sms,
            "token:software:totp" => Self::Totp,
            _ => Self::Other(value),
        }
    }
}

impl fmt::Display for FactorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Push => f.write_str("push"),
            Self::Sms => f.write_str("sms"),
            Self::Totp => f.write_str("token:software:totp"),
            Self::Other(s) => f.write_str(s),
        }
    }
}

/// Result of a factor verification attempt (`factorResult`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum FactorResult {
    /// Still waiting for the operator
    Waiting,
    /// Approved
    Success,
    /// Denied by the operator
    Rejected,
    /// Expired on the provider side
    Timeout,
    /// Any other value
    Other(String),
}

impl From<String> for FactorResult {
    fn from(value: String) -> Self {
        match value.as_str() {
            "WAITING" => Self::Waiting,
            "SUCCESS" => Self::Success,
            "REJECTED" => Self::Rejected,
            "TIMEOUT" => Self::Timeout,
            _ => Self::Other(value),
        }
    }
}

// ---------------------------------------------------------------------------
// Authentication API responses
// ---------------------------------------------------------------------------

/// One enrolled MFA factor from `_embedded.factors`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawFactor")]
pub struct Factor {
    /// Factor type (push, sms, totp, ...)
    pub factor_type: FactorKind,
    /// Provider name, e.g. `OKTA` or `GOOGLE`
    pub provider: String,
    /// Verification URL from `_links.verify.href`
    pub verify_url: String,
}

impl Factor {
    /// Creates a factor from its parts.
    pub fn new(
        factor_type: FactorKind,
        provider: impl Into<String>,
        verify_url: impl Into<String>,
    ) -> Self {
        Self {
            factor_type,
            provider: provider.into(),
            verify_url: verify_url.into(),
        }
    }

    /// Label shown to the operator when choosing a factor.
    pub fn label(&self) -> String {
        format!("{} ({})", self.factor_type, self.provider)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFactor {
    factor_type: FactorKind,
    #[serde(default)]
    provider: String,
    #[serde(rename = "_links", default)]
    links: RawFactorLinks,
}

#[derive(Deserialize, Default)]
struct RawFactorLinks {
    #[serde(default)]
    verify: Option<RawLink>,
}

#[derive(Deserialize)]
struct RawLink {
    href: String,
}

impl From<RawFactor> for Factor {
    fn from(raw: RawFactor) -> Self {
        Self {
            factor_type: raw.factor_type,
            provider: raw.provider,
            verify_url: raw.links.verify.map(|l| l.href).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Embedded {
    #[serde(default)]
    factors: Vec<Factor>,
}

/// Response of `/api/v1/authn`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthnState {
    /// Transaction status
    pub status: AuthnStatus,
    /// Token correlating the MFA steps of this transaction
    #[serde(default)]
    pub state_token: Option<String>,
    /// Session token, present once the transaction succeeds
    #[serde(default)]
    pub session_token: Option<String>,
    #[serde(rename = "_embedded", default)]
    embedded: Embedded,
}

impl AuthnState {
    /// Builds a state by hand; mostly useful for fakes.
    pub fn new(status: AuthnStatus, state_token: Option<String>, factors: Vec<Factor>) -> Self {
        Self {
            status,
            state_token,
            session_token: None,
            embedded: Embedded { factors },
        }
    }

    /// Enrolled factors offered for this transaction.
    pub fn factors(&self) -> &[Factor] {
        &self.embedded.factors
    }
}

/// Response of a factor verification call.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResult {
    /// Transaction status
    #[serde(default)]
    pub status: AuthnStatus,
    /// Factor result; absent once the transaction is complete
    #[serde(default)]
    pub factor_result: Option<FactorResult>,
    /// When the state token expires
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// Session token, present on `SUCCESS`
    #[serde(default)]
    pub session_token: Option<String>,
}

impl VerifyResult {
    /// Returns `true` while the operator has not acted on the challenge yet.
    pub fn is_waiting(&self) -> bool {
        self.factor_result == Some(FactorResult::Waiting)
    }
}

// ---------------------------------------------------------------------------
// OAuth artefacts
// ---------------------------------------------------------------------------

/// Values extracted from the authorize redirect.
#[derive(Debug, Clone)]
pub struct AuthorizationGrant {
    /// Anti-CSRF nonce echoed back by the authorization server
    pub state: String,
    /// Authorization code
    pub code: String,
    /// PKCE verifier matching the challenge sent on authorize
    pub code_verifier: String,
}

impl AuthorizationGrant {
    /// Fails with [`AuthError::StateMismatch`] unless the echoed state equals
    /// the one that was sent.
    pub fn verify_state(&self, expected: &str) -> AuthResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(AuthError::StateMismatch)
        }
    }
}

/// Response of the token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    /// Access token handed to Snowflake
    pub access_token: String,
    /// Lifetime in seconds
    #[serde(default)]
    pub expires_in: u64,
    /// Granted scope
    #[serde(default)]
    pub scope: Option<String>,
}

/// What the engine hands to the artifact writers.
///
/// The default value (empty token, zero expiry) is returned when OAuth is
/// disabled for the profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Credentials {
    /// Access token
    pub access_token: String,
    /// Lifetime in seconds
    pub expires_in: u64,
}

impl Credentials {
    /// Returns `true` when no token was acquired.
    pub fn is_empty(&self) -> bool {
        self.access_token.is_empty()
    }
}

impl From<TokenGrant> for Credentials {
    fn from(grant: TokenGrant) -> Self {
        Self {
            access_token: grant.access_token,
            expires_in: grant.expires_in,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authn_state_parses_mfa_required_with_factors() {
        let body = serde_json::json!({
            "stateToken": "007ucIX7PATyn94hsHfOLVaXAmOBkKHWnOOLG43bsb",
            "expiresAt": "2015-11-03T10:15:57.000Z",
            "status": "MFA_REQUIRED",
            "_embedded": {
                "factors": [
                    {
                        "id": "opfh52xcuft3J4uZc0g3",
                        "factorType": "push",
                        "provider": "OKTA",
                        "_links": {
                            "verify": {
                                "href": "https://example.okta.com/api/v1/authn/factors/opfh52xcuft3J4uZc0g3/verify"
                            }
                        }
                    },
                    {
                        "factorType": "token:software:totp",
                        "provider": "GOOGLE",
                        "_links": { "verify": { "href": "https://example.okta.com/totp" } }
                    }
                ]
            }
        });

        let state: AuthnState = serde_json::from_value(body).unwrap();
        assert_eq!(state.status, AuthnStatus::MfaRequired);
        assert_eq!(
            state.state_token.as_deref(),
            Some("007ucIX7PATyn94hsHfOLVaXAmOBkKHWnOOLG43bsb")
        );
        assert_eq!(state.factors().len(), 2);
        assert_eq!(state.factors()[0].factor_type, FactorKind::Push);
        assert!(state.factors()[0].verify_url.ends_with("/verify"));
        assert_eq!(state.factors()[1].factor_type, FactorKind::Totp);
        assert_eq!(state.factors()[1].label(), "token:software:totp (GOOGLE)");
    }

    #[test]
    fn test_authn_state_without_embedded_has_no_factors() {
        let state: AuthnState =
            serde_json::from_str(r#"{"status":"SUCCESS","sessionToken":"abc"}"#).unwrap();
        assert_eq!(state.status, AuthnStatus::Success);
        assert_eq!(state.session_token.as_deref(), Some("abc"));
        assert!(state.factors().is_empty());
    }

    #[test]
    fn test_unknown_status_is_preserved() {
        let state: AuthnState =
            serde_json::from_str(r#"{"status":"PASSWORD_EXPIRED"}"#).unwrap();
        assert_eq!(
            state.status,
            AuthnStatus::Other("PASSWORD_EXPIRED".to_string())
        );
        assert_eq!(state.status.to_string(), "PASSWORD_EXPIRED");
    }

    #[test]
    fn test_factor_without_links_has_empty_verify_url() {
        let factor: Factor =
            serde_json::from_str(r#"{"factorType":"sms","provider":"OKTA"}"#).unwrap();
        assert_eq!(factor.factor_type, FactorKind::Sms);
        assert!(factor.verify_url.is_empty());
    }

    #[test]
    fn test_factor_kind_challenge_semantics() {
        assert!(FactorKind::Push.is_implicit_approval());
        assert!(!FactorKind::Sms.is_implicit_approval());
        assert!(!FactorKind::Totp.is_implicit_approval());
        assert!(FactorKind::Push.sends_challenge());
        assert!(FactorKind::Sms.sends_challenge());
        assert!(!FactorKind::Totp.sends_challenge());
    }

    #[test]
    fn test_verify_result_waiting() {
        let result: VerifyResult = serde_json::from_str(
            r#"{"status":"MFA_CHALLENGE","factorResult":"WAITING","expiresAt":"2015-11-03T10:15:57.000Z"}"#,
        )
        .unwrap();
        assert!(result.is_waiting());
        assert_eq!(result.status, AuthnStatus::MfaChallenge);
        assert!(result.expires_at.is_some());
    }

    #[test]
    fn test_verify_result_success_without_factor_result() {
        let result: VerifyResult =
            serde_json::from_str(r#"{"status":"SUCCESS","sessionToken":"sess"}"#).unwrap();
        assert!(!result.is_waiting());
        assert_eq!(result.factor_result, None);
        assert_eq!(result.session_token.as_deref(), Some("sess"));
    }

    #[test]
    fn test_authorization_grant_state_check() {
        let grant = AuthorizationGrant {
            state: "sent".to_string(),
            code: "code".to_string(),
            code_verifier: "verifier".to_string(),
        };
        assert!(grant.verify_state("sent").is_ok());
        assert!(matches!(
            grant.verify_state("other"),
            Err(AuthError::StateMismatch)
        ));
    }

    #[test]
    fn test_token_grant_into_credentials() {
        let grant: TokenGrant = serde_json::from_str(
            r#"{"token_type":"Bearer","expires_in":600,"access_token":"tok","scope":"session:role-any"}"#,
        )
        .unwrap();
        let creds = Credentials::from(grant);
        assert_eq!(creds.access_token, "tok");
        assert_eq!(creds.expires_in, 600);
        assert!(!creds.is_empty());
    }

    #[test]
    fn test_default_credentials_are_empty() {
        let creds = Credentials::default();
        assert!(creds.is_empty());
        assert_eq!(creds.expires_in, 0);
    }
}
