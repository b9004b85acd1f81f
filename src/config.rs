//! Configuration management for gimme-creds
//!
//! This module handles loading, parsing, and validating the YAML
//! configuration file, and merging `GSC_*` environment variables and
//! command-line flags on top of the selected profile.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::auth::orchestrator::{AuthSettings, DEFAULT_SCOPE};
use crate::auth::poll::PollPolicy;
use crate::cli::Cli;
use crate::error::{GimmeError, Result};

/// Configuration file name inside the home directory.
pub const CONFIG_FILE_NAME: &str = ".gimme-creds.yaml";

/// File names read by earlier releases, tried when [`CONFIG_FILE_NAME`] is
/// absent.
pub const LEGACY_CONFIG_FILE_NAMES: &[&str] = &[
    ".okta_snowflake_login_config",
    ".okta_snowflake_login_config.yaml",
    ".okta_snowflake_login_config.yml",
];

/// ODBC directory used when running inside a Docker container.
pub const DOCKER_ODBC_PATH: &str = "/root/Library/ODBC";

/// Profile used when neither the flags, the environment nor the file name one.
pub const FALLBACK_PROFILE: &str = "dev";

const EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Profile written as dbt's default target and selected when no
    /// `--profile` is given
    #[serde(default, alias = "default")]
    pub default_profile: String,

    /// Name of the ODBC driver alias in `odbcinst.ini`
    #[serde(default = "default_odbc_driver_name", alias = "driver-name")]
    pub odbc_driver_name: String,

    /// Path to the ODBC driver library
    #[serde(default, alias = "driver-path")]
    pub odbc_driver_path: String,

    /// Named profiles
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,

    /// Profile selected for this run
    #[serde(skip)]
    selected: String,

    /// Remaining top-level keys; older files keep profiles there
    #[serde(flatten)]
    top_level: BTreeMap<String, serde_yaml::Value>,
}

fn default_odbc_driver_name() -> String {
    "SnowflakeDSIIDriver".to_string()
}

/// One Snowflake + Okta profile
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Profile {
    /// Acquire an OAuth token through Okta; `false` writes externalbrowser
    /// configuration
    #[serde(default = "default_true")]
    pub oauth: bool,

    /// Also write `~/.gsc/<profile>/credentials`
    #[serde(default)]
    pub generic: bool,

    /// Snowflake account, like `xy12345.us-east-1`
    #[serde(default)]
    pub account: String,

    /// Snowflake database
    #[serde(default)]
    pub database: String,

    /// Snowflake warehouse
    #[serde(default)]
    pub warehouse: String,

    /// Snowflake schema
    #[serde(default = "default_schema")]
    pub schema: String,

    /// Snowflake role
    #[serde(default)]
    pub role: String,

    /// Directory holding `odbc.ini` and `odbcinst.ini`
    #[serde(default)]
    pub odbc_path: String,

    /// Okta organization URL
    #[serde(default)]
    pub okta_org: String,

    /// Okta authorization server URL
    #[serde(default)]
    pub issuer_url: String,

    /// OIDC client ID
    #[serde(default)]
    pub client_id: String,

    /// Registered redirect URI
    #[serde(default)]
    pub redirect_uri: String,

    /// Okta username (an e-mail address)
    #[serde(default)]
    pub username: String,

    /// dbt thread count
    #[serde(default = "default_threads")]
    pub threads: u32,

    /// dbt `client_session_keep_alive`
    #[serde(default, alias = "client_session_keep_alive")]
    pub client_session_keep_alive: bool,

    /// OAuth scope
    #[serde(default = "default_scope")]
    pub scope: String,

    /// Delay between MFA verification attempts
    #[serde(default = "default_mfa_poll_interval_seconds")]
    pub mfa_poll_interval_seconds: u64,

    /// Give up on MFA after this long; `0` waits forever
    #[serde(default = "default_mfa_max_wait_seconds")]
    pub mfa_max_wait_seconds: u64,
}

fn default_true() -> bool {
    true
}

fn default_schema() -> String {
    "PUBLIC".to_string()
}

fn default_threads() -> u32 {
    10
}

fn default_scope() -> String {
    DEFAULT_SCOPE.to_string()
}

fn default_mfa_poll_interval_seconds() -> u64 {
    1
}

fn default_mfa_max_wait_seconds() -> u64 {
    300
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            oauth: default_true(),
            generic: false,
            account: String::new(),
            database: String::new(),
            warehouse: String::new(),
            schema: default_schema(),
            role: String::new(),
            odbc_path: String::new(),
            okta_org: String::new(),
            issuer_url: String::new(),
            client_id: String::new(),
            redirect_uri: String::new(),
            username: String::new(),
            threads: default_threads(),
            client_session_keep_alive: false,
            scope: default_scope(),
            mfa_poll_interval_seconds: default_mfa_poll_interval_seconds(),
            mfa_max_wait_seconds: default_mfa_max_wait_seconds(),
        }
    }
}

impl Profile {
    /// Poll policy built from the MFA settings.
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_secs(self.mfa_poll_interval_seconds),
            max_wait: match self.mfa_max_wait_seconds {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        }
    }
}

/// Home directory of the current user.
///
/// # Errors
///
/// Returns error if no home directory can be determined
pub fn home_dir() -> Result<PathBuf> {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().to_path_buf())
        .ok_or_else(|| GimmeError::Config("Unable to determine home directory".to_string()).into())
}

/// Default configuration file location, `~/.gimme-creds.yaml`, or an
/// existing legacy file when that one is missing.
pub fn default_config_path() -> Result<PathBuf> {
    Ok(config_path_in(&home_dir()?))
}

fn config_path_in(home: &Path) -> PathBuf {
    let current = home.join(CONFIG_FILE_NAME);
    if current.exists() {
        return current;
    }
    LEGACY_CONFIG_FILE_NAMES
        .iter()
        .map(|name| home.join(name))
        .find(|path| path.exists())
        .unwrap_or(current)
}

/// Returns `true` when running inside a Docker container.
pub fn in_docker() -> bool {
    in_docker_at(Path::new("/.dockerenv"), Path::new("/proc/self/cgroup"))
}

fn in_docker_at(dockerenv: &Path, cgroup: &Path) -> bool {
    dockerenv.exists()
        || std::fs::read_to_string(cgroup)
            .map(|contents| contents.contains("docker"))
            .unwrap_or(false)
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Returns
    ///
    /// Returns the loaded and merged configuration with the run's profile
    /// selected
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path, cli: &Cli) -> Result<Self> {
        let mut config = if path.exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path.display());
            Self::default()
        };
        tracing::debug!(path = %path.display(), "Configuration loaded");

        config.select(
            cli.profile
                .clone()
                .or_else(|| std::env::var("GSC_PROFILE").ok()),
        );
        if in_docker() {
            tracing::debug!("Running in Docker!");
            config.default_odbc_path(DOCKER_ODBC_PATH);
        }
        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| GimmeError::Config(format!("Failed to read config file: {}", e)))?;
        Self::from_yaml(&contents)
    }

    /// Parses a configuration document.
    ///
    /// Mappings at the top level of the document are read as profiles too;
    /// a profile under `profiles` wins over a top-level one of the same name.
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let mut config: Self = serde_yaml::from_str(contents)
            .map_err(|e| GimmeError::Config(format!("Failed to parse config: {}", e)))?;

        for (name, value) in std::mem::take(&mut config.top_level) {
            if !value.is_mapping() {
                tracing::debug!(key = %name, "Ignoring unknown top-level key");
                continue;
            }
            let profile: Profile = serde_yaml::from_value(value).map_err(|e| {
                GimmeError::Config(format!("Failed to parse profile {}: {}", name, e))
            })?;
            config.profiles.entry(name).or_insert(profile);
        }

        Ok(config)
    }

    /// Selects the run's profile, creating an empty one if the file does
    /// not define it.
    pub fn select(&mut self, requested: Option<String>) {
        let name = requested
            .filter(|n| !n.is_empty())
            .or_else(|| Some(self.default_profile.clone()).filter(|n| !n.is_empty()))
            .unwrap_or_else(|| FALLBACK_PROFILE.to_string());
        if !self.profiles.contains_key(&name) {
            tracing::debug!(profile = %name, "Profile not in configuration file");
        }
        self.profiles.entry(name.clone()).or_default();
        self.selected = name;
    }

    /// Name of the selected profile.
    pub fn profile_name(&self) -> &str {
        &self.selected
    }

    /// The selected profile.
    ///
    /// # Errors
    ///
    /// Returns error if no profile has been selected
    pub fn profile(&self) -> Result<&Profile> {
        self.profiles.get(&self.selected).ok_or_else(|| {
            GimmeError::Config(format!("Profile '{}' is not defined", self.selected)).into()
        })
    }

    fn profile_mut(&mut self) -> &mut Profile {
        self.profiles.entry(self.selected.clone()).or_default()
    }

    fn default_odbc_path(&mut self, path: &str) {
        let profile = self.profile_mut();
        if profile.odbc_path.is_empty() {
            profile.odbc_path = path.to_string();
        }
    }

    fn apply_env_vars(&mut self) {
        self.apply_env(|key| std::env::var(key).ok());
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(name) = lookup("GSC_ODBC_DRIVER_NAME") {
            self.odbc_driver_name = name;
        }
        if let Some(path) = lookup("GSC_ODBC_DRIVER_PATH") {
            self.odbc_driver_path = path;
        }

        let profile = self.profile_mut();
        let strings: [(&str, &mut String); 11] = [
            ("GSC_ACCOUNT", &mut profile.account),
            ("GSC_DATABASE", &mut profile.database),
            ("GSC_WAREHOUSE", &mut profile.warehouse),
            ("GSC_SCHEMA", &mut profile.schema),
            ("GSC_ROLE", &mut profile.role),
            ("GSC_ODBC_PATH", &mut profile.odbc_path),
            ("GSC_OKTA_ORG", &mut profile.okta_org),
            ("GSC_ISSUER_URL", &mut profile.issuer_url),
            ("GSC_CLIENT_ID", &mut profile.client_id),
            ("GSC_REDIRECT_URI", &mut profile.redirect_uri),
            ("GSC_USERNAME", &mut profile.username),
        ];
        for (key, field) in strings {
            if let Some(value) = lookup(key) {
                *field = value;
            }
        }
        if let Some(scope) = lookup("GSC_SCOPE") {
            profile.scope = scope;
        }

        let flags: [(&str, &mut bool); 2] = [
            ("GSC_OAUTH", &mut profile.oauth),
            ("GSC_GENERIC", &mut profile.generic),
        ];
        for (key, field) in flags {
            if let Some(value) = lookup(key) {
                match value.to_ascii_lowercase().as_str() {
                    "1" | "true" | "yes" => *field = true,
                    "0" | "false" | "no" => *field = false,
                    _ => tracing::warn!("Invalid {}: {}", key, value),
                }
            }
        }

        let numbers: [(&str, &mut u64); 2] = [
            (
                "GSC_MFA_POLL_INTERVAL_SECONDS",
                &mut profile.mfa_poll_interval_seconds,
            ),
            ("GSC_MFA_MAX_WAIT_SECONDS", &mut profile.mfa_max_wait_seconds),
        ];
        for (key, field) in numbers {
            if let Some(value) = lookup(key) {
                if let Ok(parsed) = value.parse() {
                    *field = parsed;
                } else {
                    tracing::warn!("Invalid {}: {}", key, value);
                }
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &Cli) {
        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
        }
        if let Some(driver) = &cli.odbc_driver {
            self.odbc_driver_path = driver.clone();
        }

        let profile = self.profile_mut();
        let overrides = [
            (&cli.account, &mut profile.account),
            (&cli.database, &mut profile.database),
            (&cli.warehouse, &mut profile.warehouse),
            (&cli.schema, &mut profile.schema),
            (&cli.role, &mut profile.role),
            (&cli.odbc_path, &mut profile.odbc_path),
            (&cli.okta_org, &mut profile.okta_org),
            (&cli.issuer_url, &mut profile.issuer_url),
            (&cli.client_id, &mut profile.client_id),
            (&cli.redirect_uri, &mut profile.redirect_uri),
            (&cli.username, &mut profile.username),
        ];
        for (flag, field) in overrides {
            if let Some(value) = flag {
                *field = value.clone();
            }
        }
        if cli.no_oauth {
            profile.oauth = false;
        }
    }

    /// Validate the configuration
    ///
    /// Ensures every parameter the selected profile needs is set and well
    /// formed. OAuth parameters are only checked when OAuth is enabled.
    ///
    /// # Errors
    ///
    /// Returns error naming the first offending parameter
    pub fn validate(&self) -> Result<()> {
        let profile = self.profile()?;

        let required = [
            ("account", profile.account.as_str()),
            ("database", profile.database.as_str()),
            ("warehouse", profile.warehouse.as_str()),
            ("role", profile.role.as_str()),
            ("odbc-path", profile.odbc_path.as_str()),
            ("odbc-driver-name", self.odbc_driver_name.as_str()),
            ("odbc-driver-path", self.odbc_driver_path.as_str()),
            ("username", profile.username.as_str()),
        ];
        for (name, value) in required {
            require(name, value)?;
        }

        if profile.oauth {
            for (name, value) in [
                ("okta-org", profile.okta_org.as_str()),
                ("issuer-url", profile.issuer_url.as_str()),
                ("redirect-uri", profile.redirect_uri.as_str()),
            ] {
                require(name, value)?;
                Url::parse(value).map_err(|e| {
                    GimmeError::Config(format!("Parameter {} is not a valid URL: {}", name, e))
                })?;
            }
            require("client-id", &profile.client_id)?;

            let email = Regex::new(EMAIL_PATTERN)
                .map_err(|e| GimmeError::Config(format!("Invalid e-mail pattern: {}", e)))?;
            if !email.is_match(&profile.username) {
                return Err(GimmeError::Config(
                    "Parameter username must be an e-mail address".to_string(),
                )
                .into());
            }

            if profile.mfa_poll_interval_seconds == 0 {
                return Err(GimmeError::Config(
                    "mfa-poll-interval-seconds must be greater than 0".to_string(),
                )
                .into());
            }
        }

        Ok(())
    }

    /// Authentication inputs for the selected profile.
    pub fn auth_settings(&self, forget_password: bool) -> Result<AuthSettings> {
        let profile = self.profile()?;
        Ok(AuthSettings {
            oauth_enabled: profile.oauth,
            okta_org: profile.okta_org.clone(),
            issuer_url: profile.issuer_url.clone(),
            client_id: profile.client_id.clone(),
            redirect_uri: profile.redirect_uri.clone(),
            username: profile.username.clone(),
            scope: profile.scope.clone(),
            poll: profile.poll_policy(),
            forget_password,
        })
    }
}

fn require(name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(GimmeError::Config(format!("Parameter {} is required", name)).into());
    }
    Ok(())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: String::new(),
            odbc_driver_name: default_odbc_driver_name(),
            odbc_driver_path: String::new(),
            profiles: BTreeMap::new(),
            selected: String::new(),
            top_level: BTreeMap::new(),
        }
    }
}
