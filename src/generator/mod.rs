//! Client configuration writers
//!
//! After a run, the acquired token (or the externalbrowser fallback when
//! OAuth is disabled) is written to the files Snowflake clients read:
//!
//! - [`odbc`] -- the profile DSN in `odbc.ini` and the driver alias in
//!   `odbcinst.ini`
//! - [`dbt`] -- the profile output in `~/.dbt/profiles.yml`
//! - [`generic`] -- `~/.gsc/<profile>/credentials`, when enabled
//!
//! Every file is replaced atomically so an interrupted run never leaves a
//! half-written configuration behind.

pub mod dbt;
pub mod generic;
pub mod odbc;

use std::path::{Path, PathBuf};

use crate::auth::types::Credentials;
use crate::config::{Config, Profile};
use crate::error::{GimmeError, Result};
use crate::interact::StatusReporter;

/// Everything the writers need about the selected profile.
#[derive(Debug, Clone, Copy)]
pub struct Target<'a> {
    /// Name of the profile being written
    pub profile_name: &'a str,
    /// dbt default target
    pub default_profile: &'a str,
    /// Profile settings
    pub profile: &'a Profile,
    /// ODBC driver alias
    pub odbc_driver_name: &'a str,
    /// ODBC driver library
    pub odbc_driver_path: &'a str,
    /// Home directory holding `.dbt` and `.gsc`
    pub home: &'a Path,
}

impl<'a> Target<'a> {
    /// Builds a target for the configuration's selected profile.
    pub fn from_config(config: &'a Config, home: &'a Path) -> Result<Self> {
        let profile_name = config.profile_name();
        let default_profile = if config.default_profile.is_empty() {
            profile_name
        } else {
            config.default_profile.as_str()
        };
        Ok(Self {
            profile_name,
            default_profile,
            profile: config.profile()?,
            odbc_driver_name: &config.odbc_driver_name,
            odbc_driver_path: &config.odbc_driver_path,
            home,
        })
    }

    /// Snowflake authenticator for this profile.
    pub fn authenticator(&self) -> &'static str {
        if self.profile.oauth {
            "oauth"
        } else {
            "externalbrowser"
        }
    }
}

/// Runs every enabled writer and reports each written file.
///
/// # Errors
///
/// Returns the first writer error; files written before it stay written.
pub fn write_all(
    target: &Target<'_>,
    credentials: &Credentials,
    reporter: &dyn StatusReporter,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();

    let path = odbc::write_odbc_config(target, credentials)?;
    reporter.success(&format!(
        "ODBC: Profile {} written to: {}",
        target.profile_name,
        path.display()
    ));
    written.push(path);

    let path = dbt::write_dbt_config(target, credentials)?;
    reporter.success(&format!(
        "DBT: Profile {} written to: {}",
        target.profile_name,
        path.display()
    ));
    written.push(path);

    if target.profile.generic {
        let path = generic::write_generic_credentials(target, credentials)?;
        reporter.success(&format!(
            "Generic: Profile {} written to: {}",
            target.profile_name,
            path.display()
        ));
        written.push(path);
    }

    Ok(written)
}

/// Replaces `path` with `bytes` through a temporary sibling file.
///
/// Parent directories are created as needed.
pub(crate) fn write_file_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            GimmeError::Generator(format!("failed to create dir {}: {e}", parent.display()))
        })?;
    }

    let file_name = path
        .file_name()
        .and_then(|v| v.to_str())
        .unwrap_or("file");
    let tmp_path = path.with_file_name(format!(".{file_name}.gsc-tmp"));

    std::fs::write(&tmp_path, bytes).map_err(|e| {
        GimmeError::Generator(format!(
            "failed to write temp file {}: {e}",
            tmp_path.display()
        ))
    })?;

    if let Err(e) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(
            GimmeError::Generator(format!("failed to finalize file {}: {e}", path.display()))
                .into(),
        );
    }

    tracing::debug!(path = %path.display(), "File written");
    Ok(())
}
