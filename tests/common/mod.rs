//! Shared helpers for integration tests

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use tempfile::TempDir;
use wiremock::{Request, Respond, ResponseTemplate};

use gimme_creds::auth::poll::PollPolicy;
use gimme_creds::auth::AuthSettings;

#[allow(dead_code)]
pub const USERNAME: &str = "me@example.com";

#[allow(dead_code)]
pub const REDIRECT_URI: &str = "http://localhost:8080/callback";

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("gimme-creds.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

/// Settings pointing both the org and the issuer at a mock server.
#[allow(dead_code)]
pub fn settings_for(base_url: &str) -> AuthSettings {
    AuthSettings {
        oauth_enabled: true,
        okta_org: base_url.to_string(),
        issuer_url: format!("{}/oauth2/default", base_url),
        client_id: "test-client-id".to_string(),
        redirect_uri: REDIRECT_URI.to_string(),
        username: USERNAME.to_string(),
        poll: PollPolicy {
            interval: Duration::from_millis(10),
            max_wait: Some(Duration::from_secs(5)),
        },
        ..AuthSettings::default()
    }
}

/// `MFA_REQUIRED` authn body offering one factor of `factor_type`.
#[allow(dead_code)]
pub fn mfa_required_body(factor_type: &str, verify_url: &str) -> serde_json::Value {
    serde_json::json!({
        "stateToken": "00state-token",
        "expiresAt": "2030-01-01T00:00:00.000Z",
        "status": "MFA_REQUIRED",
        "_embedded": {
            "factors": [{
                "id": "opf1",
                "factorType": factor_type,
                "provider": "OKTA",
                "_links": { "verify": { "href": verify_url } }
            }]
        }
    })
}

#[allow(dead_code)]
pub fn waiting_body() -> serde_json::Value {
    serde_json::json!({
        "status": "MFA_CHALLENGE",
        "factorResult": "WAITING",
        "expiresAt": "2030-01-01T00:00:00.000Z"
    })
}

#[allow(dead_code)]
pub fn verified_body() -> serde_json::Value {
    serde_json::json!({
        "status": "SUCCESS",
        "sessionToken": "00session-token",
        "expiresAt": "2030-01-01T00:00:00.000Z"
    })
}

#[allow(dead_code)]
pub fn token_body(access_token: &str) -> serde_json::Value {
    serde_json::json!({
        "token_type": "Bearer",
        "expires_in": 600,
        "access_token": access_token,
        "scope": "session:role-any"
    })
}

/// Answers an authorize request with a 302 echoing its `state`.
#[allow(dead_code)]
pub struct EchoStateRedirect {
    pub code: &'static str,
}

impl Respond for EchoStateRedirect {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let state = request
            .url
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .unwrap_or_default();
        let location = format!("{}?code={}&state={}", REDIRECT_URI, self.code, state);
        ResponseTemplate::new(302).insert_header("Location", location.as_str())
    }
}
