//! Okta Authentication API and authorization server HTTP calls
//!
//! [`IdentityClient`] issues the five round trips the flow needs: primary
//! authentication, factor push, factor verification, authorize and token.
//! Each call has a fixed 10-second timeout and redirects are never followed,
//! so the authorize call can read the `Location` header of its 302.
//!
//! Status codes are mapped to [`AuthError`] here; the orchestrator only ever
//! sees typed results. The [`IdentityApi`] trait is the seam the orchestrator
//! and poll loop depend on.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE, LOCATION};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use url::Url;

use crate::auth::pkce::PkcePair;
use crate::auth::types::{AuthnState, AuthorizationGrant, TokenGrant, VerifyResult};
use crate::error::{AuthError, AuthResult};

/// Per-call timeout for every request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const JSON: &str = "application/json";
const FORM_UTF8: &str = "application/x-www-form-urlencoded;charset=UTF-8";

// ---------------------------------------------------------------------------
// Request parameter bundles
// ---------------------------------------------------------------------------

/// Parameters of the authorize call.
#[derive(Debug, Clone, Copy)]
pub struct AuthorizeRequest<'a> {
    /// Authorization server base URL
    pub issuer_url: &'a str,
    /// OAuth client ID
    pub client_id: &'a str,
    /// Registered redirect URI
    pub redirect_uri: &'a str,
    /// Requested scope
    pub scope: &'a str,
    /// Session token from the successful MFA verification
    pub session_token: &'a str,
    /// PKCE material for this run
    pub pkce: &'a PkcePair,
    /// Anti-CSRF nonce
    pub state: &'a str,
}

/// Grant-specific fields of the token call.
#[derive(Debug, Clone, Copy)]
pub enum TokenGrantRequest<'a> {
    /// `grant_type=authorization_code`, used after MFA
    AuthorizationCode(&'a AuthorizationGrant),
    /// `grant_type=password`, used when no MFA is required
    Password {
        /// Okta username
        username: &'a str,
        /// Okta password
        password: &'a str,
    },
}

/// Parameters of the token call.
#[derive(Debug, Clone, Copy)]
pub struct TokenRequest<'a> {
    /// Authorization server base URL
    pub issuer_url: &'a str,
    /// OAuth client ID
    pub client_id: &'a str,
    /// Registered redirect URI
    pub redirect_uri: &'a str,
    /// Requested scope
    pub scope: &'a str,
    /// Grant to exchange
    pub grant: TokenGrantRequest<'a>,
}

impl<'a> TokenRequest<'a> {
    /// Form fields sent to the token endpoint, in order.
    ///
    /// # Examples
    ///
    /// ```
    /// use gimme_creds::auth::client::{TokenGrantRequest, TokenRequest};
    ///
    /// let request = TokenRequest {
    ///     issuer_url: "https://example.okta.com/oauth2/default",
    ///     client_id: "client",
    ///     redirect_uri: "http://localhost/callback",
    ///     scope: "session:role-any",
    ///     grant: TokenGrantRequest::Password { username: "me@example.com", password: "pw" },
    /// };
    /// let fields = request.form_fields();
    /// assert!(fields.contains(&("grant_type", "password")));
    /// assert!(fields.iter().all(|(k, _)| *k != "code_verifier"));
    /// ```
    pub fn form_fields(&self) -> Vec<(&'static str, &'a str)> {
        let mut fields = vec![("client_id", self.client_id)];
        match self.grant {
            TokenGrantRequest::AuthorizationCode(grant) => {
                fields.push(("grant_type", "authorization_code"));
                fields.push(("code", grant.code.as_str()));
                fields.push(("code_verifier", grant.code_verifier.as_str()));
                fields.push(("redirect_uri", self.redirect_uri));
            }
            TokenGrantRequest::Password { username, password } => {
                fields.push(("grant_type", "password"));
                fields.push(("username", username));
                fields.push(("password", password));
            }
        }
        fields.push(("scope", self.scope));
        fields
    }

    /// URL-encoded form body.
    pub fn form_body(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.form_fields())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// IdentityApi
// ---------------------------------------------------------------------------

/// The identity-provider calls the authentication engine depends on.
#[async_trait]
pub trait IdentityApi: Send + Sync {
    /// `POST {org}/api/v1/authn`
    async fn primary_authenticate(
        &self,
        org: &str,
        username: &str,
        password: &str,
    ) -> AuthResult<AuthnState>;

    /// `POST <verify url>` with only the state token, which triggers the
    /// push notification or SMS.
    async fn push_factor(&self, verify_url: &str, state_token: &str) -> AuthResult<()>;

    /// `POST <verify url>` with the state token and pass-code.
    async fn verify_factor(
        &self,
        verify_url: &str,
        state_token: &str,
        pass_code: &str,
    ) -> AuthResult<VerifyResult>;

    /// `GET {issuer}/v1/authorize`, returning the grant from the redirect.
    async fn authorize(&self, request: &AuthorizeRequest<'_>) -> AuthResult<AuthorizationGrant>;

    /// `POST {issuer}/v1/token`
    async fn exchange_token(&self, request: &TokenRequest<'_>) -> AuthResult<TokenGrant>;
}

// ---------------------------------------------------------------------------
// IdentityClient
// ---------------------------------------------------------------------------

/// reqwest-backed [`IdentityApi`].
///
/// # Examples
///
/// ```no_run
/// use gimme_creds::auth::client::{IdentityApi, IdentityClient};
///
/// # async fn example() -> gimme_creds::error::AuthResult<()> {
/// let client = IdentityClient::new()?;
/// let state = client
///     .primary_authenticate("https://example.okta.com", "me@example.com", "secret")
///     .await?;
/// println!("status: {}", state.status);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct IdentityClient {
    http: reqwest::Client,
}

impl IdentityClient {
    /// Creates a client with the fixed timeout and redirects disabled.
    pub fn new() -> AuthResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(AuthError::Network)?;
        Ok(Self { http })
    }

    /// Wraps an existing reqwest client. The caller is responsible for
    /// disabling redirects on it.
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> AuthResult<reqwest::Response> {
        self.http
            .post(url)
            .header(ACCEPT, JSON)
            .header(CACHE_CONTROL, "no-cache")
            .header(CONTENT_TYPE, JSON)
            .body(body.to_string())
            .send()
            .await
            .map_err(AuthError::Network)
    }
}

#[async_trait]
impl IdentityApi for IdentityClient {
    async fn primary_authenticate(
        &self,
        org: &str,
        username: &str,
        password: &str,
    ) -> AuthResult<AuthnState> {
        let url = join_url(org, "api/v1/authn");
        let body = serde_json::json!({
            "username": username,
            "password": password,
            "options": {
                "multiOptionalFactorEnroll": true,
                "warnBeforePasswordExpired": false,
            },
        });

        let resp = self.post_json(&url, &body).await?;
        let status = resp.status();
        tracing::debug!(%url, status = status.as_u16(), "primary authentication response");

        match status {
            StatusCode::OK => decode(resp, "authn").await,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(AuthError::InvalidCredentials),
            other => Err(unexpected("authn", other)),
        }
    }

    async fn push_factor(&self, verify_url: &str, state_token: &str) -> AuthResult<()> {
        let body = serde_json::json!({ "stateToken": state_token });

        let resp = self.post_json(verify_url, &body).await?;
        let status = resp.status();
        tracing::debug!(url = verify_url, status = status.as_u16(), "factor push response");

        match status {
            StatusCode::OK => Ok(()),
            StatusCode::TOO_MANY_REQUESTS => Err(AuthError::RateLimited),
            other => Err(unexpected("push", other)),
        }
    }

    async fn verify_factor(
        &self,
        verify_url: &str,
        state_token: &str,
        pass_code: &str,
    ) -> AuthResult<VerifyResult> {
        let body = serde_json::json!({
            "stateToken": state_token,
            "passCode": pass_code,
        });

        let resp = self.post_json(verify_url, &body).await?;
        let status = resp.status();
        tracing::debug!(url = verify_url, status = status.as_u16(), "factor verify response");

        match status {
            StatusCode::OK => decode(resp, "verify").await,
            StatusCode::FORBIDDEN => Err(AuthError::InvalidChallenge),
            other => Err(unexpected("verify", other)),
        }
    }

    async fn authorize(&self, request: &AuthorizeRequest<'_>) -> AuthResult<AuthorizationGrant> {
        let url = join_url(request.issuer_url, "v1/authorize");

        let resp = self
            .http
            .get(&url)
            .header(ACCEPT, JSON)
            .header(CACHE_CONTROL, "no-cache")
            .query(&[
                ("client_id", request.client_id),
                ("response_type", "code"),
                ("scope", request.scope),
                ("redirect_uri", request.redirect_uri),
                ("state", request.state),
                ("sessionToken", request.session_token),
                ("code_challenge", request.pkce.challenge.as_str()),
                ("code_challenge_method", PkcePair::METHOD),
            ])
            .send()
            .await
            .map_err(AuthError::Network)?;
        let status = resp.status();
        tracing::debug!(%url, status = status.as_u16(), "authorize response");

        if status != StatusCode::FOUND {
            return Err(unexpected("authorize", status));
        }

        let location = resp
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AuthError::MalformedResponse("authorize redirect has no Location header".into())
            })?;
        let location = resp.url().join(location).map_err(|e| {
            AuthError::MalformedResponse(format!("authorize redirect Location is invalid: {e}"))
        })?;

        let (state, code) = redirect_params(&location);
        let code = code.ok_or_else(|| match redirect_error(&location) {
            Some(error) => {
                AuthError::MalformedResponse(format!("authorize redirect carries no code: {error}"))
            }
            None => AuthError::MalformedResponse("authorize redirect carries no code".into()),
        })?;

        Ok(AuthorizationGrant {
            state: state.unwrap_or_default(),
            code,
            code_verifier: request.pkce.verifier.clone(),
        })
    }

    async fn exchange_token(&self, request: &TokenRequest<'_>) -> AuthResult<TokenGrant> {
        let url = join_url(request.issuer_url, "v1/token");

        let resp = self
            .http
            .post(&url)
            .header(ACCEPT, JSON)
            .header(CACHE_CONTROL, "no-cache")
            .header(CONTENT_TYPE, FORM_UTF8)
            .body(request.form_body())
            .send()
            .await
            .map_err(AuthError::Network)?;
        let status = resp.status();
        tracing::debug!(%url, status = status.as_u16(), "token response");

        match status {
            StatusCode::OK => decode(resp, "token").await,
            StatusCode::BAD_REQUEST => {
                let body = resp.text().await.unwrap_or_default();
                tracing::debug!(body = %body, "token endpoint rejected the request");
                Err(AuthError::BadRequest(body))
            }
            other => Err(unexpected("token", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Joins a base URL and a path with exactly one `/`.
fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn unexpected(endpoint: &'static str, status: StatusCode) -> AuthError {
    AuthError::UnexpectedResponse {
        endpoint,
        status: status.as_u16(),
    }
}

async fn decode<T: DeserializeOwned>(
    resp: reqwest::Response,
    endpoint: &'static str,
) -> AuthResult<T> {
    let bytes = resp.bytes().await.map_err(AuthError::Network)?;
    serde_json::from_slice(&bytes)
        .map_err(|e| AuthError::MalformedResponse(format!("{endpoint} response: {e}")))
}

/// Pulls `state` and `code` out of a redirect location.
fn redirect_params(location: &Url) -> (Option<String>, Option<String>) {
    let mut state = None;
    let mut code = None;
    for (key, value) in location.query_pairs() {
        match key.as_ref() {
            "state" => state = Some(value.into_owned()),
            "code" => code = Some(value.into_owned()),
            _ => {}
        }
    }
    (state, code)
}

/// OAuth `error` and `error_description` of a failed redirect, if any.
fn redirect_error(location: &Url) -> Option<String> {
    let mut error = None;
    let mut description = None;
    for (key, value) in location.query_pairs() {
        match key.as_ref() {
            "error" => error = Some(value.into_owned()),
            "error_description" => description = Some(value.into_owned()),
            _ => {}
        }
    }
    let error = error?;
    Some(match description {
        Some(description) => format!("{error} ({description})"),
        None => error,
    })
}
