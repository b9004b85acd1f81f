//! Authentication orchestrator
//!
//! Drives one credential acquisition from start to finish:
//!
//! 1. resolve the operator's password (keyring first, then a prompt)
//! 2. primary authentication against the Okta org
//! 3. on `MFA_REQUIRED`: select a factor, push it, collect a pass-code when
//!    the factor needs one, and poll until the verification is terminal
//! 4. exchange either the password (no MFA) or an authorization code (after
//!    MFA, with PKCE and an anti-CSRF `state`) for an access token
//!
//! Every step short-circuits on the first error; nothing is retried across
//! stages. Prompts, HTTP calls and the poll sleep are raced against the
//! run's [`CancellationToken`].

use std::future::Future;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::auth::client::{AuthorizeRequest, IdentityApi, TokenGrantRequest, TokenRequest};
use crate::auth::pkce;
use crate::auth::poll::{poll_until_terminal, PollPolicy};
use crate::auth::types::{AuthnStatus, Credentials, Factor, FactorResult, VerifyResult};
use crate::error::{AuthError, AuthResult};
use crate::interact::{Prompter, SecretStore, StatusReporter};

/// Default OAuth scope requested from the authorization server.
pub const DEFAULT_SCOPE: &str = "session:role-any";

const SAVE_PASSWORD_PROMPT: &str = "Save this password in the keyring?";
const SELECT_FACTOR_PROMPT: &str = "Select MFA method";
const PASS_CODE_PROMPT: &str = "MFA code";

/// Which grant the final token exchange uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantKind {
    /// Resource-owner password grant, when no MFA was required
    Password,
    /// Authorization-code grant with PKCE, after MFA
    AuthorizationCode,
}

/// Stage of an authentication run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Nothing done yet
    Start,
    /// Primary authentication in flight
    PrimaryAuth,
    /// Operator is choosing an MFA factor
    SelectFactor,
    /// Factor push in flight
    PushFactor,
    /// Collecting the pass-code, if the factor needs one
    Challenge,
    /// Polling factor verification
    PollMfa,
    /// Requesting an authorization code
    AuthCode,
    /// Exchanging a grant for an access token
    TokenExchange(GrantKind),
    /// Credentials acquired
    Done,
    /// Run aborted
    Failed,
}

/// Where primary authentication leads, given the transaction status.
///
/// `Err` means the run ends in [`Stage::Failed`] with that error.
pub fn route_primary(status: &AuthnStatus) -> AuthResult<Stage> {
    match status {
        AuthnStatus::Success => Ok(Stage::TokenExchange(GrantKind::Password)),
        AuthnStatus::MfaRequired => Ok(Stage::SelectFactor),
        AuthnStatus::MfaEnroll => Err(AuthError::MfaEnrollmentRequired),
        other => Err(AuthError::UnexpectedStatus(other.to_string())),
    }
}

/// Where a verification result leads.
///
/// `Err` means the run ends in [`Stage::Failed`] with that error.
pub fn route_verify(result: &VerifyResult) -> AuthResult<Stage> {
    match &result.factor_result {
        Some(FactorResult::Waiting) => return Ok(Stage::PollMfa),
        Some(FactorResult::Rejected) => return Err(AuthError::MfaRejected),
        Some(FactorResult::Timeout) => return Err(AuthError::MfaTimeout),
        _ => {}
    }
    match &result.status {
        AuthnStatus::Success => Ok(Stage::AuthCode),
        status => {
            let detail = match &result.factor_result {
                Some(FactorResult::Other(value)) => format!("{status} ({value})"),
                _ => status.to_string(),
            };
            Err(AuthError::UnexpectedStatus(detail))
        }
    }
}

/// Everything one run needs to know about the operator's Okta setup.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    /// When `false` the run returns empty credentials without any I/O
    pub oauth_enabled: bool,
    /// Okta organization URL, e.g. `https://example.okta.com`
    pub okta_org: String,
    /// Authorization server URL, e.g. `https://example.okta.com/oauth2/default`
    pub issuer_url: String,
    /// OAuth client ID
    pub client_id: String,
    /// Registered redirect URI
    pub redirect_uri: String,
    /// Okta username
    pub username: String,
    /// Requested scope
    pub scope: String,
    /// MFA poll interval and bound
    pub poll: PollPolicy,
    /// Delete the stored password before resolving it
    pub forget_password: bool,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            oauth_enabled: true,
            okta_org: String::new(),
            issuer_url: String::new(),
            client_id: String::new(),
            redirect_uri: String::new(),
            username: String::new(),
            scope: DEFAULT_SCOPE.to_string(),
            poll: PollPolicy::default(),
            forget_password: false,
        }
    }
}

/// Runs the authentication state machine against its collaborators.
///
/// # Examples
///
/// ```
/// use gimme_creds::auth::fake::ScriptedIdentity;
/// use gimme_creds::auth::orchestrator::{AuthSettings, Authenticator};
/// use gimme_creds::interact::{MemorySecretStore, RecordingReporter, ScriptedPrompter};
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main]
/// # async fn main() {
/// let api = ScriptedIdentity::new();
/// let store = MemorySecretStore::new();
/// let prompter = ScriptedPrompter::new();
/// let reporter = RecordingReporter::new();
/// let auth = Authenticator::new(&api, &store, &prompter, &reporter, CancellationToken::new());
///
/// let settings = AuthSettings { oauth_enabled: false, ..AuthSettings::default() };
/// let creds = auth.authenticate(&settings).await.unwrap();
/// assert!(creds.is_empty());
/// assert!(api.calls().is_empty());
/// # }
/// ```
pub struct Authenticator<'a> {
    api: &'a dyn IdentityApi,
    store: &'a dyn SecretStore,
    prompter: &'a dyn Prompter,
    reporter: &'a dyn StatusReporter,
    cancel: CancellationToken,
}

impl<'a> Authenticator<'a> {
    /// Wires up the collaborators for one or more runs.
    pub fn new(
        api: &'a dyn IdentityApi,
        store: &'a dyn SecretStore,
        prompter: &'a dyn Prompter,
        reporter: &'a dyn StatusReporter,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            api,
            store,
            prompter,
            reporter,
            cancel,
        }
    }

    /// Reporter status lines go to.
    pub fn reporter(&self) -> &'a dyn StatusReporter {
        self.reporter
    }

    /// Returns `true` once the run has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Acquires credentials for `settings`.
    ///
    /// Returns empty [`Credentials`] when OAuth is disabled.
    ///
    /// # Errors
    ///
    /// The first [`AuthError`] produced by any stage. No stage is retried.
    pub async fn authenticate(&self, settings: &AuthSettings) -> AuthResult<Credentials> {
        let result = self.run(settings).await;
        if let Err(e) = &result {
            tracing::debug!(stage = ?Stage::Failed, error = %e, "Authentication failed");
        }
        result
    }

    async fn run(&self, settings: &AuthSettings) -> AuthResult<Credentials> {
        enter(Stage::Start);
        if !settings.oauth_enabled {
            enter(Stage::Done);
            return Ok(Credentials::default());
        }
        if self.cancel.is_cancelled() {
            return Err(AuthError::Cancelled);
        }

        let password = self.resolve_password(settings).await?;

        enter(Stage::PrimaryAuth);
        let authn = self
            .guarded(self.api.primary_authenticate(
                &settings.okta_org,
                &settings.username,
                &password,
            ))
            .await?;
        tracing::debug!(status = %authn.status, "Primary authentication answered");

        match route_primary(&authn.status)? {
            Stage::TokenExchange(GrantKind::Password) => {
                enter(Stage::TokenExchange(GrantKind::Password));
                let grant = TokenGrantRequest::Password {
                    username: &settings.username,
                    password: &password,
                };
                self.exchange(settings, grant).await
            }
            _ => {
                let state_token = authn
                    .state_token
                    .as_deref()
                    .filter(|t| !t.is_empty())
                    .ok_or_else(|| {
                        AuthError::MalformedResponse("MFA_REQUIRED without stateToken".to_string())
                    })?;
                self.multi_factor(settings, authn.factors(), state_token)
                    .await
            }
        }
    }

    async fn multi_factor(
        &self,
        settings: &AuthSettings,
        factors: &[Factor],
        state_token: &str,
    ) -> AuthResult<Credentials> {
        enter(Stage::SelectFactor);
        let factor = self.select_factor(factors).await?;
        if factor.verify_url.is_empty() {
            return Err(AuthError::MalformedResponse(format!(
                "factor {} has no verify link",
                factor.label()
            )));
        }

        enter(Stage::PushFactor);
        self.guarded(self.api.push_factor(&factor.verify_url, state_token))
            .await?;
        if factor.factor_type.sends_challenge() {
            self.reporter.success("MFA challenge sent!");
        }

        enter(Stage::Challenge);
        let pass_code = if factor.factor_type.is_implicit_approval() {
            String::new()
        } else {
            self.non_empty_secret(PASS_CODE_PROMPT).await?
        };

        enter(Stage::PollMfa);
        let verify = poll_until_terminal(
            self.api,
            factor,
            state_token,
            &pass_code,
            &settings.poll,
            &self.cancel,
        )
        .await?;
        route_verify(&verify)?;
        self.reporter.success("MFA verified!");

        let session_token = verify
            .session_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                AuthError::MalformedResponse("verification SUCCESS without sessionToken".to_string())
            })?;

        enter(Stage::AuthCode);
        let pkce = pkce::generate();
        let state = Uuid::new_v4().to_string();
        let request = AuthorizeRequest {
            issuer_url: &settings.issuer_url,
            client_id: &settings.client_id,
            redirect_uri: &settings.redirect_uri,
            scope: &settings.scope,
            session_token,
            pkce: &pkce,
            state: &state,
        };
        let grant = self.guarded(self.api.authorize(&request)).await?;
        grant.verify_state(&state)?;

        enter(Stage::TokenExchange(GrantKind::AuthorizationCode));
        self.exchange(settings, TokenGrantRequest::AuthorizationCode(&grant))
            .await
    }

    async fn exchange(
        &self,
        settings: &AuthSettings,
        grant: TokenGrantRequest<'_>,
    ) -> AuthResult<Credentials> {
        let request = TokenRequest {
            issuer_url: &settings.issuer_url,
            client_id: &settings.client_id,
            redirect_uri: &settings.redirect_uri,
            scope: &settings.scope,
            grant,
        };
        let token = self.guarded(self.api.exchange_token(&request)).await?;
        if token.access_token.is_empty() {
            return Err(AuthError::MalformedResponse(
                "token response without access_token".to_string(),
            ));
        }
        enter(Stage::Done);
        Ok(Credentials::from(token))
    }

    async fn select_factor<'f>(&self, factors: &'f [Factor]) -> AuthResult<&'f Factor> {
        if factors.is_empty() {
            return Err(AuthError::MalformedResponse(
                "MFA_REQUIRED without enrolled factors".to_string(),
            ));
        }
        let labels: Vec<String> = factors.iter().map(Factor::label).collect();
        let index = self
            .guarded(self.prompter.choice(SELECT_FACTOR_PROMPT, &labels))
            .await?;
        let factor = factors
            .get(index)
            .ok_or_else(|| AuthError::Prompt(format!("factor choice {index} out of range")))?;
        tracing::debug!(factor = %factor.label(), "MFA factor selected");
        Ok(factor)
    }

    async fn resolve_password(&self, settings: &AuthSettings) -> AuthResult<String> {
        let username = settings.username.as_str();

        if settings.forget_password {
            match self.store.delete(username) {
                Ok(()) => tracing::debug!("Stored password removed"),
                Err(e) => tracing::warn!(error = %e, "Unable to remove stored password"),
            }
        }

        match self.store.get(username) {
            Ok(Some(password)) => {
                tracing::debug!("Password present in keyring");
                return Ok(password);
            }
            Ok(None) => tracing::debug!("Password not present in keyring"),
            Err(e) => tracing::warn!(error = %e, "Unable to read keyring"),
        }

        let password = self
            .non_empty_secret(&format!("Okta password for {username}"))
            .await?;

        if self
            .guarded(self.prompter.confirm(SAVE_PASSWORD_PROMPT))
            .await?
        {
            match self.store.set(username, &password) {
                Ok(()) => self.reporter.success("Password saved to keyring"),
                Err(e) => tracing::warn!(error = %e, "Unable to save password to keyring"),
            }
        }

        Ok(password)
    }

    async fn non_empty_secret(&self, label: &str) -> AuthResult<String> {
        loop {
            let value = self.guarded(self.prompter.secret(label)).await?;
            if !value.is_empty() {
                return Ok(value);
            }
            self.reporter.failure("Input must not be empty");
        }
    }

    async fn guarded<T>(&self, fut: impl Future<Output = AuthResult<T>>) -> AuthResult<T> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AuthError::Cancelled),
            result = fut => result,
        }
    }
}

fn enter(stage: Stage) {
    tracing::debug!(?stage, "Entering stage");
}

/// Convenience wrapper around [`Authenticator::authenticate`].
pub async fn authenticate(
    settings: &AuthSettings,
    api: &dyn IdentityApi,
    store: &dyn SecretStore,
    prompter: &dyn Prompter,
    reporter: &dyn StatusReporter,
    cancel: CancellationToken,
) -> AuthResult<Credentials> {
    Authenticator::new(api, store, prompter, reporter, cancel)
        .authenticate(settings)
        .await
}
