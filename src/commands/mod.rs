/*!
Command handler for the CLI

`gimme-creds` has a single action: acquire credentials for the selected
profile and write the client configuration files. [`run`] wires the real
collaborators (HTTP client, OS keyring, terminal) and signal handling;
[`acquire_and_write`] is the part that works against any collaborators.
*/

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::auth::{Authenticator, IdentityClient};
use crate::config::{self, Config};
use crate::error::{AuthError, GimmeError, Result};
use crate::generator::{self, Target};
use crate::interact::{KeyringSecretStore, TerminalPrompter, TerminalReporter};

/// How long runtime shutdown waits for blocking tasks.
const BLOCKING_SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

/// Runs `future` to completion on a new multi-threaded runtime.
///
/// A terminal read on a blocking thread cannot be interrupted once a signal
/// cancels the run, so shutdown gives blocking tasks only a short grace
/// period instead of waiting for them.
///
/// # Errors
///
/// Returns error if the runtime cannot be built
pub fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(GimmeError::from)?;
    let output = runtime.block_on(future);
    runtime.shutdown_timeout(BLOCKING_SHUTDOWN_GRACE);
    Ok(output)
}

/// Acquires credentials and writes every configured artifact.
///
/// # Arguments
///
/// * `config` - Loaded and validated configuration
/// * `forget` - Remove the stored password before authenticating
///
/// # Errors
///
/// Returns the authentication error, or the first writer error
pub async fn run(config: Config, forget: bool) -> Result<()> {
    let home = config::home_dir()?;
    let api = IdentityClient::new()?;
    let store = KeyringSecretStore::default();
    let prompter = TerminalPrompter::new();
    let reporter = TerminalReporter;

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    let auth = Authenticator::new(&api, &store, &prompter, &reporter, cancel);
    let written = acquire_and_write(&config, forget, &home, &auth).await?;
    tracing::debug!(files = written.len(), "Credentials written");
    Ok(())
}

/// Runs `auth` for the selected profile and writes the artifacts under
/// `home` (and the profile's ODBC directory).
///
/// Nothing is written when the run was cancelled.
pub async fn acquire_and_write(
    config: &Config,
    forget: bool,
    home: &Path,
    auth: &Authenticator<'_>,
) -> Result<Vec<PathBuf>> {
    let settings = config.auth_settings(forget)?;
    tracing::info!(profile = %config.profile_name(), oauth = settings.oauth_enabled, "Acquiring credentials");

    let credentials = auth.authenticate(&settings).await?;
    if auth.is_cancelled() {
        return Err(AuthError::Cancelled.into());
    }

    let target = Target::from_config(config, home)?;
    generator::write_all(&target, &credentials, auth.reporter())
}

/// Cancels `cancel` on SIGINT or SIGTERM.
fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        let terminate = async {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                }
                Err(e) => {
                    tracing::warn!("Unable to listen for SIGTERM: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    tracing::warn!("Unable to listen for Ctrl+C: {}", e);
                    return;
                }
            }
            _ = terminate => {}
        }
        tracing::debug!("Signal received, cancelling");
        cancel.cancel();
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::auth::fake::{verified, AuthorizeReply, Call, ScriptedIdentity};
    use crate::auth::types::{AuthnState, AuthnStatus, Factor, FactorKind};
    use crate::error::AuthResult;
    use crate::interact::{MemorySecretStore, Prompter, RecordingReporter, ScriptedPrompter};

    /// Secret reads block a thread until long after the test is over, like
    /// an operator who never answers.
    struct UnansweredPrompter;

    #[async_trait]
    impl Prompter for UnansweredPrompter {
        async fn secret(&self, _label: &str) -> AuthResult<String> {
            tokio::task::spawn_blocking(|| {
                std::thread::sleep(Duration::from_secs(3600));
                String::new()
            })
            .await
            .map_err(|e| AuthError::Prompt(e.to_string()))
        }

        async fn choice(&self, label: &str, _items: &[String]) -> AuthResult<usize> {
            Err(AuthError::Prompt(format!("unexpected choice {label}")))
        }

        async fn confirm(&self, _label: &str) -> AuthResult<bool> {
            Ok(false)
        }
    }

    const YAML: &str = r#"
default-profile: dev
odbc-driver-path: /opt/snowflake/libSnowflake.so
profiles:
  dev:
    account: xy12345
    database: DB
    warehouse: WH
    role: R
    okta-org: https://example.okta.com
    issuer-url: https://example.okta.com/oauth2/default
    client-id: client
    redirect-uri: http://localhost/callback
    username: me@example.com
    mfa-poll-interval-seconds: 1
"#;

    fn config(home: &Path, oauth: bool) -> Config {
        let mut config = Config::from_yaml(YAML).unwrap();
        config.select(None);
        let profile = config.profiles.get_mut("dev").unwrap();
        profile.odbc_path = home.join("ODBC").display().to_string();
        profile.oauth = oauth;
        config
    }

    #[tokio::test]
    async fn test_oauth_disabled_writes_externalbrowser_without_calls() {
        let home = tempfile::tempdir().unwrap();
        let config = config(home.path(), false);
        let api = ScriptedIdentity::new();
        let store = MemorySecretStore::new();
        let prompter = ScriptedPrompter::new();
        let reporter = RecordingReporter::new();
        let auth = Authenticator::new(&api, &store, &prompter, &reporter, CancellationToken::new());

        let written = acquire_and_write(&config, false, home.path(), &auth)
            .await
            .unwrap();

        assert_eq!(written.len(), 2);
        assert!(api.calls().is_empty());
        let odbc = std::fs::read_to_string(home.path().join("ODBC/odbc.ini")).unwrap();
        assert!(odbc.contains("authenticator=externalbrowser"));
    }

    #[tokio::test]
    async fn test_mfa_token_lands_in_artifacts() {
        let home = tempfile::tempdir().unwrap();
        let config = config(home.path(), true);
        let api = ScriptedIdentity::new()
            .on_authn(Ok(AuthnState::new(
                AuthnStatus::MfaRequired,
                Some("st".to_string()),
                vec![Factor::new(FactorKind::Push, "OKTA", "https://example.okta.com/v")],
            )))
            .on_push(Ok(()))
            .on_verify(Ok(verified("session")))
            .on_authorize(AuthorizeReply::Echo {
                code: "code".to_string(),
            })
            .on_token(Ok(crate::auth::fake::token("the-token", 600)));
        let store = MemorySecretStore::with_secret("me@example.com", "pw");
        let prompter = ScriptedPrompter::new().with_choice(0);
        let reporter = RecordingReporter::new();
        let auth = Authenticator::new(&api, &store, &prompter, &reporter, CancellationToken::new());

        acquire_and_write(&config, false, home.path(), &auth)
            .await
            .unwrap();

        assert_eq!(api.calls().len(), 5);
        assert_eq!(api.calls()[0], Call::Authn);
        let dbt = std::fs::read_to_string(home.path().join(".dbt/profiles.yml")).unwrap();
        assert!(dbt.contains("the-token"));
        let odbc = std::fs::read_to_string(home.path().join("ODBC/odbc.ini")).unwrap();
        assert!(odbc.contains("token=the-token"));
    }

    #[tokio::test]
    async fn test_cancelled_run_writes_nothing() {
        let home = tempfile::tempdir().unwrap();
        let config = config(home.path(), true);
        let api = ScriptedIdentity::new();
        let store = MemorySecretStore::with_secret("me@example.com", "pw");
        let prompter = ScriptedPrompter::new();
        let reporter = RecordingReporter::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let auth = Authenticator::new(&api, &store, &prompter, &reporter, cancel);

        let err = acquire_and_write(&config, false, home.path(), &auth)
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<AuthError>(),
            Some(AuthError::Cancelled)
        ));
        assert!(!home.path().join("ODBC").exists());
        assert!(!home.path().join(".dbt").exists());
    }

    #[test]
    fn test_cancel_during_blocking_secret_read_ends_run() {
        let home = tempfile::tempdir().unwrap();
        let config = config(home.path(), true);
        let api = ScriptedIdentity::new();
        let store = MemorySecretStore::new();
        let prompter = UnansweredPrompter;
        let reporter = RecordingReporter::new();
        let started = std::time::Instant::now();

        let result = block_on(async {
            let cancel = CancellationToken::new();
            let trigger = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                trigger.cancel();
            });
            let auth = Authenticator::new(&api, &store, &prompter, &reporter, cancel);
            acquire_and_write(&config, false, home.path(), &auth).await
        })
        .unwrap();

        let err = result.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AuthError>(),
            Some(AuthError::Cancelled)
        ));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(api.calls().is_empty());
        assert!(!home.path().join("ODBC").exists());
    }
}
