//! Command-line interface definition for gimme-creds
//!
//! Every profile field can be overridden from the command line; flags win
//! over `GSC_*` environment variables, which win over the configuration file.

use clap::Parser;

/// gimme-creds - Okta --> OAuth --> Snowflake --> Creds
///
/// Acquires a temporary Snowflake OAuth token through Okta (with MFA when
/// the organization requires it) and writes ODBC, dbt and generic
/// credential files for the selected profile.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "gimme-creds")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file [default: ~/.gimme-creds.yaml]
    #[arg(long)]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(long)]
    pub verbose: bool,

    /// Profile selection [default: the file's default-profile, else "dev"]
    #[arg(short, long)]
    pub profile: Option<String>,

    /// Snowflake account, like: xy12345.us-east-1
    #[arg(short, long)]
    pub account: Option<String>,

    /// Snowflake database
    #[arg(short, long)]
    pub database: Option<String>,

    /// Snowflake warehouse
    #[arg(short, long)]
    pub warehouse: Option<String>,

    /// Snowflake schema
    #[arg(short = 'x', long)]
    pub schema: Option<String>,

    /// Snowflake role
    #[arg(short = 's', long)]
    pub role: Option<String>,

    /// Okta organization, like: https://example.okta.com
    #[arg(short, long)]
    pub okta_org: Option<String>,

    /// Directory holding odbc.ini and odbcinst.ini
    #[arg(short = 'n', long)]
    pub odbc_path: Option<String>,

    /// Location of the ODBC driver library
    #[arg(short = 'v', long)]
    pub odbc_driver: Option<String>,

    /// OIDC client ID of the Okta application
    #[arg(short, long)]
    pub client_id: Option<String>,

    /// Issuer URL of the Okta authorization server
    #[arg(short, long)]
    pub issuer_url: Option<String>,

    /// Redirect URI of the Okta application
    #[arg(short, long)]
    pub redirect_uri: Option<String>,

    /// Username for Okta
    #[arg(short, long)]
    pub username: Option<String>,

    /// Remove the stored Okta password before authenticating
    #[arg(long)]
    pub forget: bool,

    /// Skip OAuth and write externalbrowser configuration instead
    #[arg(long)]
    pub no_oauth: bool,
}

impl Cli {
    /// Parse command-line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default() {
        let cli = Cli::default();
        assert!(cli.config.is_none());
        assert!(cli.profile.is_none());
        assert!(!cli.verbose);
        assert!(!cli.forget);
        assert!(!cli.no_oauth);
    }

    #[test]
    fn test_cli_parse_no_args() {
        let cli = Cli::try_parse_from(["gimme-creds"]).unwrap();
        assert!(cli.profile.is_none());
        assert!(cli.account.is_none());
    }

    #[test]
    fn test_cli_parse_short_flags() {
        let cli = Cli::try_parse_from([
            "gimme-creds",
            "-p",
            "prod",
            "-a",
            "xy12345.us-east-1",
            "-d",
            "ANALYTICS",
            "-w",
            "COMPUTE_WH",
            "-x",
            "RAW",
            "-s",
            "ANALYST",
            "-o",
            "https://example.okta.com",
            "-n",
            "/tmp/odbc",
            "-v",
            "/opt/driver.so",
            "-c",
            "client",
            "-i",
            "https://example.okta.com/oauth2/default",
            "-r",
            "http://localhost/callback",
            "-u",
            "me@example.com",
        ])
        .unwrap();

        assert_eq!(cli.profile.as_deref(), Some("prod"));
        assert_eq!(cli.account.as_deref(), Some("xy12345.us-east-1"));
        assert_eq!(cli.database.as_deref(), Some("ANALYTICS"));
        assert_eq!(cli.warehouse.as_deref(), Some("COMPUTE_WH"));
        assert_eq!(cli.schema.as_deref(), Some("RAW"));
        assert_eq!(cli.role.as_deref(), Some("ANALYST"));
        assert_eq!(cli.okta_org.as_deref(), Some("https://example.okta.com"));
        assert_eq!(cli.odbc_path.as_deref(), Some("/tmp/odbc"));
        assert_eq!(cli.odbc_driver.as_deref(), Some("/opt/driver.so"));
        assert_eq!(cli.client_id.as_deref(), Some("client"));
        assert_eq!(
            cli.issuer_url.as_deref(),
            Some("https://example.okta.com/oauth2/default")
        );
        assert_eq!(cli.redirect_uri.as_deref(), Some("http://localhost/callback"));
        assert_eq!(cli.username.as_deref(), Some("me@example.com"));
    }

    #[test]
    fn test_cli_parse_long_switches() {
        let cli = Cli::try_parse_from([
            "gimme-creds",
            "--config",
            "/tmp/gsc.yaml",
            "--verbose",
            "--forget",
            "--no-oauth",
        ])
        .unwrap();

        assert_eq!(cli.config.as_deref(), Some("/tmp/gsc.yaml"));
        assert!(cli.verbose);
        assert!(cli.forget);
        assert!(cli.no_oauth);
    }

    #[test]
    fn test_cli_rejects_positional_arguments() {
        assert!(Cli::try_parse_from(["gimme-creds", "extra"]).is_err());
    }
}
