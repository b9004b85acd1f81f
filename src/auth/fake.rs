//! In-process scripted identity provider for tests
//!
//! [`ScriptedIdentity`] implements [`IdentityApi`] from per-call reply
//! queues and records every call it receives, so tests can drive the poll
//! loop and the orchestrator without a network and then assert on the exact
//! call sequence.
//!
//! # Example
//!
//! ```
//! use gimme_creds::auth::fake::{Call, ScriptedIdentity};
//! use gimme_creds::auth::client::IdentityApi;
//! use gimme_creds::auth::types::{AuthnState, AuthnStatus};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let api = ScriptedIdentity::new()
//!     .on_authn(Ok(AuthnState::new(AuthnStatus::Success, None, vec![])));
//!
//! let state = api.primary_authenticate("https://org", "me", "pw").await.unwrap();
//! assert_eq!(state.status, AuthnStatus::Success);
//! assert_eq!(api.calls(), vec![Call::Authn]);
//! # }
//! ```

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::auth::client::{AuthorizeRequest, IdentityApi, TokenGrantRequest, TokenRequest};
use crate::auth::types::{
    AuthnState, AuthnStatus, AuthorizationGrant, FactorResult, TokenGrant, VerifyResult,
};
use crate::error::{AuthError, AuthResult};

/// One recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// Primary authentication
    Authn,
    /// Factor push
    Push,
    /// Factor verification with the pass-code that was sent
    Verify {
        /// Pass-code sent with the request
        pass_code: String,
    },
    /// Authorize with the state nonce that was sent
    Authorize {
        /// Nonce sent with the request
        state: String,
    },
    /// Token exchange with the grant type that was sent
    Token {
        /// `password` or `authorization_code`
        grant_type: String,
    },
}

/// Scripted outcome of an authorize call.
#[derive(Debug)]
pub enum AuthorizeReply {
    /// Redirect echoing the state that was sent
    Echo {
        /// Authorization code to return
        code: String,
    },
    /// Redirect carrying a different state
    State {
        /// State to return
        state: String,
        /// Authorization code to return
        code: String,
    },
    /// Fail the call
    Fail(AuthError),
}

#[derive(Default)]
struct Script {
    authn: VecDeque<AuthResult<AuthnState>>,
    push: VecDeque<AuthResult<()>>,
    verify: VecDeque<AuthResult<VerifyResult>>,
    authorize: VecDeque<AuthorizeReply>,
    token: VecDeque<AuthResult<TokenGrant>>,
    calls: Vec<Call>,
}

/// Scripted [`IdentityApi`]. Replies are consumed in FIFO order per call
/// kind; an exhausted queue fails the call.
#[derive(Default)]
pub struct ScriptedIdentity {
    script: Mutex<Script>,
}

impl ScriptedIdentity {
    /// Creates a fake with empty queues.
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queues a primary authentication reply.
    pub fn on_authn(self, reply: AuthResult<AuthnState>) -> Self {
        self.script().authn.push_back(reply);
        self
    }

    /// Queues a factor push reply.
    pub fn on_push(self, reply: AuthResult<()>) -> Self {
        self.script().push.push_back(reply);
        self
    }

    /// Queues a factor verification reply.
    pub fn on_verify(self, reply: AuthResult<VerifyResult>) -> Self {
        self.script().verify.push_back(reply);
        self
    }

    /// Queues an authorize reply.
    pub fn on_authorize(self, reply: AuthorizeReply) -> Self {
        self.script().authorize.push_back(reply);
        self
    }

    /// Queues a token reply.
    pub fn on_token(self, reply: AuthResult<TokenGrant>) -> Self {
        self.script().token.push_back(reply);
        self
    }

    /// Calls received so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.script().calls.clone()
    }

    /// Number of verify calls received so far.
    pub fn verify_calls(&self) -> usize {
        self.script()
            .calls
            .iter()
            .filter(|c| matches!(c, Call::Verify { .. }))
            .count()
    }
}

fn exhausted(call: &str) -> AuthError {
    AuthError::UnexpectedStatus(format!("no scripted reply for {call}"))
}

/// A verify reply with `factorResult: WAITING`.
pub fn waiting() -> VerifyResult {
    VerifyResult {
        status: AuthnStatus::MfaChallenge,
        factor_result: Some(FactorResult::Waiting),
        ..VerifyResult::default()
    }
}

/// A verify reply with `status: SUCCESS` and the given session token.
pub fn verified(session_token: &str) -> VerifyResult {
    VerifyResult {
        status: AuthnStatus::Success,
        factor_result: Some(FactorResult::Success),
        session_token: Some(session_token.to_string()),
        ..VerifyResult::default()
    }
}

/// A verify reply with the given terminal factor result.
pub fn factor_result(result: FactorResult) -> VerifyResult {
    VerifyResult {
        status: AuthnStatus::MfaChallenge,
        factor_result: Some(result),
        ..VerifyResult::default()
    }
}

/// A token reply.
pub fn token(access_token: &str, expires_in: u64) -> TokenGrant {
    TokenGrant {
        access_token: access_token.to_string(),
        expires_in,
        scope: Some("session:role-any".to_string()),
    }
}

#[async_trait]
impl IdentityApi for ScriptedIdentity {
    async fn primary_authenticate(
        &self,
        _org: &str,
        _username: &str,
        _password: &str,
    ) -> AuthResult<AuthnState> {
        let mut script = self.script();
        script.calls.push(Call::Authn);
        script.authn.pop_front().unwrap_or_else(|| Err(exhausted("authn")))
    }

    async fn push_factor(&self, _verify_url: &str, _state_token: &str) -> AuthResult<()> {
        let mut script = self.script();
        script.calls.push(Call::Push);
        script.push.pop_front().unwrap_or_else(|| Err(exhausted("push")))
    }

    async fn verify_factor(
        &self,
        _verify_url: &str,
        _state_token: &str,
        pass_code: &str,
    ) -> AuthResult<VerifyResult> {
        let mut script = self.script();
        script.calls.push(Call::Verify {
            pass_code: pass_code.to_string(),
        });
        script.verify.pop_front().unwrap_or_else(|| Err(exhausted("verify")))
    }

    async fn authorize(&self, request: &AuthorizeRequest<'_>) -> AuthResult<AuthorizationGrant> {
        let mut script = self.script();
        script.calls.push(Call::Authorize {
            state: request.state.to_string(),
        });
        let (state, code) = match script.authorize.pop_front() {
            Some(AuthorizeReply::Echo { code }) => (request.state.to_string(), code),
            Some(AuthorizeReply::State { state, code }) => (state, code),
            Some(AuthorizeReply::Fail(e)) => return Err(e),
            None => return Err(exhausted("authorize")),
        };
        Ok(AuthorizationGrant {
            state,
            code,
            code_verifier: request.pkce.verifier.clone(),
        })
    }

    async fn exchange_token(&self, request: &TokenRequest<'_>) -> AuthResult<TokenGrant> {
        let grant_type = match request.grant {
            TokenGrantRequest::AuthorizationCode(_) => "authorization_code",
            TokenGrantRequest::Password { .. } => "password",
        };
        let mut script = self.script();
        script.calls.push(Call::Token {
            grant_type: grant_type.to_string(),
        });
        script.token.pop_front().unwrap_or_else(|| Err(exhausted("token")))
    }
}
