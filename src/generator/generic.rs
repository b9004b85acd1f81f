//! Generic `KEY=value` credentials file for tools without ODBC or dbt

use std::path::{Path, PathBuf};

use ini::Ini;

use crate::auth::types::Credentials;
use crate::error::{GimmeError, Result};
use crate::generator::{write_file_atomic, Target};

/// Writes `~/.gsc/<profile>/credentials` with `SNOWFLAKE_USER`,
/// `SNOWFLAKE_OAUTH_ACCESS_TOKEN` and `SNOWFLAKE_AUTH_URI`. Other keys
/// already in the file are kept.
pub fn write_generic_credentials(
    target: &Target<'_>,
    credentials: &Credentials,
) -> Result<PathBuf> {
    let path = target
        .home
        .join(".gsc")
        .join(target.profile_name)
        .join("credentials");

    let mut file = load_or_empty(&path)?;
    file.with_general_section()
        .set("SNOWFLAKE_USER", target.profile.username.as_str())
        .set(
            "SNOWFLAKE_OAUTH_ACCESS_TOKEN",
            credentials.access_token.as_str(),
        )
        .set(
            "SNOWFLAKE_AUTH_URI",
            format!("authenticator=oauth&token={}", credentials.access_token),
        );

    let mut bytes = Vec::new();
    file.write_to(&mut bytes).map_err(GimmeError::from)?;
    write_file_atomic(&path, &bytes)?;
    Ok(path)
}

fn load_or_empty(path: &Path) -> Result<Ini> {
    if path.exists() {
        Ok(Ini::load_from_file(path).map_err(GimmeError::from)?)
    } else {
        Ok(Ini::new())
    }
}
