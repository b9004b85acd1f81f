//! ODBC DSN and driver alias

use std::path::{Path, PathBuf};

use ini::Ini;

use crate::auth::types::Credentials;
use crate::error::{GimmeError, Result};
use crate::generator::{write_file_atomic, Target};

/// Upserts the profile DSN in `<odbc-path>/odbc.ini` and the driver alias in
/// `<odbc-path>/odbcinst.ini`. Other sections are kept as they are.
///
/// Returns the path of `odbc.ini`.
pub fn write_odbc_config(target: &Target<'_>, credentials: &Credentials) -> Result<PathBuf> {
    let odbc_dir = Path::new(&target.profile.odbc_path);
    let odbc_path = odbc_dir.join("odbc.ini");
    let odbcinst_path = odbc_dir.join("odbcinst.ini");
    let profile = target.profile;

    let mut odbc = load_or_empty(&odbc_path)?;
    odbc.with_section(Some(target.profile_name))
        .set("Driver", target.odbc_driver_name)
        .set("server", format!("{}.snowflakecomputing.com", profile.account))
        .set("uid", profile.username.as_str())
        .set("role", profile.role.as_str())
        .set("database", profile.database.as_str())
        .set("schema", profile.schema.as_str())
        .set("warehouse", profile.warehouse.as_str())
        .set("authenticator", target.authenticator());
    if profile.oauth {
        odbc.with_section(Some(target.profile_name))
            .set("token", credentials.access_token.as_str());
    } else if let Some(dsn) = odbc.section_mut(Some(target.profile_name)) {
        dsn.remove("token");
    }
    save(&odbc, &odbc_path)?;

    let mut odbcinst = load_or_empty(&odbcinst_path)?;
    odbcinst
        .with_section(Some(target.odbc_driver_name))
        .set("Driver", target.odbc_driver_path);
    save(&odbcinst, &odbcinst_path)?;

    Ok(odbc_path)
}

fn load_or_empty(path: &Path) -> Result<Ini> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "No existing file, creating");
        return Ok(Ini::new());
    }
    Ok(Ini::load_from_file(path).map_err(GimmeError::from)?)
}

fn save(ini: &Ini, path: &Path) -> Result<()> {
    let mut bytes = Vec::new();
    ini.write_to(&mut bytes).map_err(GimmeError::from)?;
    write_file_atomic(path, &bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::tests::{credentials, profile, target};

    #[test]
    fn test_writes_oauth_dsn_and_driver_alias() {
        let home = tempfile::tempdir().unwrap();
        let odbc_dir = home.path().join("ODBC");
        let p = profile(true, false, &odbc_dir);

        let path = write_odbc_config(&target(&p, home.path()), &credentials()).unwrap();
        assert_eq!(path, odbc_dir.join("odbc.ini"));

        let odbc = Ini::load_from_file(&path).unwrap();
        let dsn = odbc.section(Some("dev")).unwrap();
        assert_eq!(dsn.get("Driver"), Some("SnowflakeDSIIDriver"));
        assert_eq!(dsn.get("server"), Some("xy12345.us-east-1.snowflakecomputing.com"));
        assert_eq!(dsn.get("uid"), Some("me@example.com"));
        assert_eq!(dsn.get("schema"), Some("PUBLIC"));
        assert_eq!(dsn.get("authenticator"), Some("oauth"));
        assert_eq!(dsn.get("token"), Some("tok.en-123"));

        let odbcinst = Ini::load_from_file(odbc_dir.join("odbcinst.ini")).unwrap();
        assert_eq!(
            odbcinst
                .section(Some("SnowflakeDSIIDriver"))
                .and_then(|s| s.get("Driver")),
            Some("/opt/snowflake/libSnowflake.so")
        );
    }

    #[test]
    fn test_preserves_other_sections_and_drops_stale_token() {
        let home = tempfile::tempdir().unwrap();
        let odbc_dir = home.path().join("ODBC");
        std::fs::create_dir_all(&odbc_dir).unwrap();
        std::fs::write(
            odbc_dir.join("odbc.ini"),
            "[other]\nDriver=Postgres\n\n[dev]\ntoken=old\nauthenticator=oauth\n",
        )
        .unwrap();

        let p = profile(false, false, &odbc_dir);
        write_odbc_config(&target(&p, home.path()), &Credentials::default()).unwrap();

        let odbc = Ini::load_from_file(odbc_dir.join("odbc.ini")).unwrap();
        assert_eq!(
            odbc.section(Some("other")).and_then(|s| s.get("Driver")),
            Some("Postgres")
        );
        let dsn = odbc.section(Some("dev")).unwrap();
        assert_eq!(dsn.get("authenticator"), Some("externalbrowser"));
        assert_eq!(dsn.get("token"), None);
    }

    #[test]
    fn test_unparsable_odbc_ini_is_ini_error() {
        let home = tempfile::tempdir().unwrap();
        let odbc_dir = home.path().join("ODBC");
        std::fs::create_dir_all(&odbc_dir).unwrap();
        std::fs::write(odbc_dir.join("odbc.ini"), "[dev\nDriver=x\n").unwrap();

        let p = profile(true, false, &odbc_dir);
        let err = write_odbc_config(&target(&p, home.path()), &credentials()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GimmeError>(),
            Some(GimmeError::Ini(_))
        ));
    }
}
