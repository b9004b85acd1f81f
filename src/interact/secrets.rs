//! Operator password storage
//!
//! The Okta password is kept in the operating system's native credential
//! store (Keychain on macOS, Secret Service on Linux, Windows Credential
//! Manager on Windows) under the service name `gimme-creds` with the Okta
//! username as the account. [`MemorySecretStore`] is the in-process variant
//! used in tests and by callers that must not touch the keyring.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{GimmeError, Result};

/// Keyring service name used for stored passwords.
pub const KEYRING_SERVICE: &str = "gimme-creds";

/// Get/set/delete access to stored operator secrets, keyed by username.
pub trait SecretStore: Send + Sync {
    /// Returns the stored secret, or `Ok(None)` when nothing is stored.
    fn get(&self, username: &str) -> Result<Option<String>>;

    /// Stores (or replaces) the secret.
    fn set(&self, username: &str, secret: &str) -> Result<()>;

    /// Removes the secret. Removing a missing secret is not an error.
    fn delete(&self, username: &str) -> Result<()>;
}

/// [`SecretStore`] backed by the OS keyring.
///
/// # Examples
///
/// ```no_run
/// use gimme_creds::interact::secrets::{KeyringSecretStore, SecretStore};
///
/// let store = KeyringSecretStore::default();
/// store.set("me@example.com", "hunter2").unwrap();
/// assert_eq!(store.get("me@example.com").unwrap().as_deref(), Some("hunter2"));
/// ```
#[derive(Debug, Clone)]
pub struct KeyringSecretStore {
    service: String,
}

impl KeyringSecretStore {
    /// Creates a store under a custom service name.
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    /// Service name entries are stored under.
    pub fn service(&self) -> &str {
        &self.service
    }

    fn entry(&self, username: &str) -> Result<keyring::Entry> {
        Ok(keyring::Entry::new(&self.service, username).map_err(GimmeError::Keyring)?)
    }
}

impl Default for KeyringSecretStore {
    fn default() -> Self {
        Self::new(KEYRING_SERVICE)
    }
}

impl SecretStore for KeyringSecretStore {
    fn get(&self, username: &str) -> Result<Option<String>> {
        match self.entry(username)?.get_password() {
            Ok(secret) if secret.is_empty() => Ok(None),
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(GimmeError::Keyring(e).into()),
        }
    }

    fn set(&self, username: &str, secret: &str) -> Result<()> {
        self.entry(username)?
            .set_password(secret)
            .map_err(GimmeError::Keyring)?;
        Ok(())
    }

    fn delete(&self, username: &str) -> Result<()> {
        match self.entry(username)?.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(GimmeError::Keyring(e).into()),
        }
    }
}

/// In-memory [`SecretStore`].
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    secrets: Mutex<HashMap<String, String>>,
}

impl MemorySecretStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding one secret.
    pub fn with_secret(username: &str, secret: &str) -> Self {
        let store = Self::new();
        store
            .secrets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(username.to_string(), secret.to_string());
        store
    }

    /// Returns `true` when a secret is stored for `username`.
    pub fn contains(&self, username: &str) -> bool {
        self.secrets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(username)
    }
}

impl SecretStore for MemorySecretStore {
    fn get(&self, username: &str) -> Result<Option<String>> {
        Ok(self
            .secrets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(username)
            .filter(|s| !s.is_empty())
            .cloned())
    }

    fn set(&self, username: &str, secret: &str) -> Result<()> {
        self.secrets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(username.to_string(), secret.to_string());
        Ok(())
    }

    fn delete(&self, username: &str) -> Result<()> {
        self.secrets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(username);
        Ok(())
    }
}
