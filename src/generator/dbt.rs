//! dbt profile output

use std::path::PathBuf;

use serde::Serialize;
use serde_yaml::{Mapping, Value};

use crate::auth::types::Credentials;
use crate::error::{GimmeError, Result};
use crate::generator::{write_file_atomic, Target};

#[derive(Debug, Serialize)]
struct SnowflakeOutput<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    account: &'a str,
    user: &'a str,
    authenticator: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<&'a str>,
    role: &'a str,
    database: &'a str,
    warehouse: &'a str,
    schema: &'a str,
    threads: u32,
    client_session_keep_alive: bool,
}

/// Merges the profile output into `~/.dbt/profiles.yml`.
///
/// Sets `default.target` and `default.outputs.<profile>`; every other key
/// in the file is preserved. Returns the path written.
pub fn write_dbt_config(target: &Target<'_>, credentials: &Credentials) -> Result<PathBuf> {
    let path = target.home.join(".dbt").join("profiles.yml");
    let profile = target.profile;

    let mut root = if path.exists() {
        let contents = std::fs::read_to_string(&path).map_err(GimmeError::from)?;
        match serde_yaml::from_str::<Value>(&contents).map_err(GimmeError::from)? {
            Value::Mapping(m) => m,
            Value::Null => Mapping::new(),
            _ => {
                return Err(GimmeError::Generator(format!(
                    "{} is not a YAML mapping",
                    path.display()
                ))
                .into())
            }
        }
    } else {
        tracing::debug!(path = %path.display(), "No existing dbt configuration, creating");
        Mapping::new()
    };

    let output = SnowflakeOutput {
        kind: "snowflake",
        account: &profile.account,
        user: &profile.username,
        authenticator: target.authenticator(),
        token: profile
            .oauth
            .then_some(credentials.access_token.as_str()),
        role: &profile.role,
        database: &profile.database,
        warehouse: &profile.warehouse,
        schema: &profile.schema,
        threads: profile.threads,
        client_session_keep_alive: profile.client_session_keep_alive,
    };

    let mut default = take_mapping(&mut root, "default");
    let mut outputs = take_mapping(&mut default, "outputs");
    outputs.insert(
        Value::from(target.profile_name),
        serde_yaml::to_value(&output).map_err(GimmeError::from)?,
    );
    default.insert(Value::from("target"), Value::from(target.default_profile));
    default.insert(Value::from("outputs"), Value::Mapping(outputs));
    root.insert(Value::from("default"), Value::Mapping(default));

    let yaml = serde_yaml::to_string(&root).map_err(GimmeError::from)?;
    write_file_atomic(&path, yaml.as_bytes())?;
    Ok(path)
}

fn take_mapping(map: &mut Mapping, key: &str) -> Mapping {
    match map.remove(&Value::from(key)) {
        Some(Value::Mapping(m)) => m,
        _ => Mapping::new(),
    }
}
