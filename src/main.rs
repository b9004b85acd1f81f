//! gimme-creds - Okta --> OAuth --> Snowflake --> Creds
//!
#![doc = "Main entry point for the gimme-creds command-line tool."]

use std::process::ExitCode;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use gimme_creds::cli::Cli;
use gimme_creds::commands;
use gimme_creds::config::{self, Config};
use gimme_creds::error::{AuthError, GimmeError, Result};
use gimme_creds::interact::{StatusReporter, TerminalReporter};

fn main() -> ExitCode {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    init_tracing(cli.verbose);

    match commands::block_on(run(cli)).and_then(|result| result) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!("{:?}", e);
            let (line, code) = describe(&e);
            TerminalReporter.failure(&line);
            ExitCode::from(code)
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Load configuration
    let config_path = match &cli.config {
        Some(path) => path.into(),
        None => config::default_config_path()?,
    };
    let config = Config::load(&config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    commands::run(config, cli.forget).await
}

/// Short status line and exit code for a failed run.
fn describe(error: &anyhow::Error) -> (String, u8) {
    let auth = error.downcast_ref::<AuthError>().or_else(|| {
        error.downcast_ref::<GimmeError>().and_then(|e| match e {
            GimmeError::Auth(auth) => Some(auth),
            _ => None,
        })
    });
    match auth {
        Some(auth) => (
            auth.status_line(),
            u8::try_from(auth.exit_code()).unwrap_or(1),
        ),
        None => (error.to_string(), 1),
    }
}

/// Initialize tracing subscriber with environment filter
///
/// `RUST_LOG` wins, then `GSC_LOG` (a bare level such as `DEBUG`), then
/// `--verbose`.
fn init_tracing(verbose: bool) {
    tracing_subscriber::registry()
        .with(log_filter(verbose))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn log_filter(verbose: bool) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    if let Ok(level) = std::env::var("GSC_LOG") {
        if let Ok(filter) = EnvFilter::try_new(format!("gimme_creds={}", level.to_lowercase())) {
            return filter;
        }
    }
    EnvFilter::new(if verbose {
        "gimme_creds=debug"
    } else {
        "gimme_creds=warn"
    })
}
