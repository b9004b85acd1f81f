//! MFA verification poll loop
//!
//! Out-of-band factors (Okta Verify push) report `factorResult: WAITING`
//! until the operator acts. The loop re-verifies on a fixed interval until
//! the result is terminal, the optional upper bound is reached, or the run
//! is cancelled.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::auth::client::IdentityApi;
use crate::auth::types::{Factor, VerifyResult};
use crate::error::{AuthError, AuthResult};

/// Default delay between verification attempts.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default upper bound on the total wait.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(300);

/// Interval and bound for [`poll_until_terminal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between attempts
    pub interval: Duration,
    /// Give up with [`AuthError::PollTimeout`] after this long; `None` waits
    /// forever
    pub max_wait: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_wait: Some(DEFAULT_MAX_WAIT),
        }
    }
}

/// Verifies `factor` until the result is anything but `WAITING`.
///
/// The first call is made immediately, so a terminal first result returns
/// without sleeping.
///
/// # Errors
///
/// - Any error from [`IdentityApi::verify_factor`].
/// - [`AuthError::PollTimeout`] when the next sleep would pass
///   `policy.max_wait`.
/// - [`AuthError::Cancelled`] when `cancel` fires during a call or a sleep.
pub async fn poll_until_terminal(
    api: &dyn IdentityApi,
    factor: &Factor,
    state_token: &str,
    pass_code: &str,
    policy: &PollPolicy,
    cancel: &CancellationToken,
) -> AuthResult<VerifyResult> {
    let started = Instant::now();
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AuthError::Cancelled),
            r = api.verify_factor(&factor.verify_url, state_token, pass_code) => r?,
        };

        if !result.is_waiting() {
            tracing::debug!(attempt, status = %result.status, "MFA verification finished");
            return Ok(result);
        }

        if let Some(max_wait) = policy.max_wait {
            let waited = started.elapsed();
            if waited + policy.interval > max_wait {
                tracing::debug!(attempt, ?waited, "MFA poll bound reached");
                return Err(AuthError::PollTimeout { waited });
            }
        }

        tracing::debug!(attempt, "Checking MFA verification...");
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AuthError::Cancelled),
            _ = tokio::time::sleep(policy.interval) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::fake::{factor_result, verified, waiting, ScriptedIdentity};
    use crate::auth::types::{FactorKind, FactorResult};

    fn push_factor() -> Factor {
        Factor::new(FactorKind::Push, "OKTA", "https://example.okta.com/verify")
    }

    fn fast() -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(5),
            max_wait: None,
        }
    }

    #[tokio::test]
    async fn test_waiting_twice_then_success_makes_three_calls() {
        let api = ScriptedIdentity::new()
            .on_verify(Ok(waiting()))
            .on_verify(Ok(waiting()))
            .on_verify(Ok(verified("session")));

        let result = poll_until_terminal(
            &api,
            &push_factor(),
            "state",
            "",
            &fast(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(api.verify_calls(), 3);
        assert_eq!(result.session_token.as_deref(), Some("session"));
    }

    #[tokio::test]
    async fn test_rejected_first_returns_without_sleeping() {
        let api = ScriptedIdentity::new().on_verify(Ok(factor_result(FactorResult::Rejected)));
        let policy = PollPolicy {
            interval: Duration::from_secs(3600),
            max_wait: None,
        };

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            poll_until_terminal(
                &api,
                &push_factor(),
                "state",
                "",
                &policy,
                &CancellationToken::new(),
            ),
        )
        .await
        .expect("poll must not sleep after a terminal first result")
        .unwrap();

        assert_eq!(result.factor_result, Some(FactorResult::Rejected));
        assert_eq!(api.verify_calls(), 1);
    }

    #[tokio::test]
    async fn test_timeout_result_is_terminal() {
        let api = ScriptedIdentity::new()
            .on_verify(Ok(waiting()))
            .on_verify(Ok(factor_result(FactorResult::Timeout)));

        let result = poll_until_terminal(
            &api,
            &push_factor(),
            "state",
            "",
            &fast(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(result.factor_result, Some(FactorResult::Timeout));
        assert_eq!(api.verify_calls(), 2);
    }

    #[tokio::test]
    async fn test_bounded_wait_surfaces_poll_timeout() {
        let mut api = ScriptedIdentity::new();
        for _ in 0..100 {
            api = api.on_verify(Ok(waiting()));
        }
        let policy = PollPolicy {
            interval: Duration::from_millis(10),
            max_wait: Some(Duration::from_millis(35)),
        };

        let err = poll_until_terminal(
            &api,
            &push_factor(),
            "state",
            "",
            &policy,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AuthError::PollTimeout { .. }));
        assert!(api.verify_calls() < 100);
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_sleep() {
        let api = ScriptedIdentity::new().on_verify(Ok(waiting()));
        let policy = PollPolicy {
            interval: Duration::from_secs(3600),
            max_wait: None,
        };
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = tokio::time::timeout(
            Duration::from_secs(5),
            poll_until_terminal(&api, &push_factor(), "state", "", &policy, &cancel),
        )
        .await
        .expect("cancellation must end the loop")
        .unwrap_err();

        assert!(matches!(err, AuthError::Cancelled));
        assert_eq!(api.verify_calls(), 1);
    }

    #[tokio::test]
    async fn test_verify_error_propagates() {
        let api = ScriptedIdentity::new()
            .on_verify(Ok(waiting()))
            .on_verify(Err(AuthError::InvalidChallenge));

        let err = poll_until_terminal(
            &api,
            &push_factor(),
            "state",
            "123456",
            &fast(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AuthError::InvalidChallenge));
    }

    #[test]
    fn test_default_policy() {
        let policy = PollPolicy::default();
        assert_eq!(policy.interval, Duration::from_secs(1));
        assert_eq!(policy.max_wait, Some(Duration::from_secs(300)));
    }
}
