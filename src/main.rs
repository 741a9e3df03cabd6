//! OpenShift build canceller
//!
//! Entry point for the "Cancel OpenShift Builds" action. Reads the action
//! settings from the command line, environment and an optional file, then
//! runs the canceller once and reports through the exit status.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use openshift_build_canceller::{
    adapters::KubeConnector,
    config::ActionConfig,
    reconcilers::{BuildCanceller, BuildOutcome, StdoutLog},
};

/// Cancel the active builds of an OpenShift build config
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// YAML file with the action settings; flags override it
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// API server URL (empty for the environment default)
    #[arg(long, env = "OPENSHIFT_API_URL")]
    api_url: Option<String>,

    /// Project holding the builds
    #[arg(long, short = 'n', env = "OPENSHIFT_NAMESPACE")]
    namespace: Option<String>,

    /// Bearer token
    #[arg(long, env = "OPENSHIFT_AUTH_TOKEN", hide_env_values = true)]
    auth_token: Option<String>,

    /// Build config whose active builds are cancelled
    #[arg(long, env = "BUILD_CONFIG")]
    build_config: Option<String>,

    /// Log per-build details
    #[arg(long, short = 'v', env = "VERBOSE")]
    verbose: bool,

    /// Accept any server certificate
    #[arg(long)]
    skip_tls_verify: bool,

    /// Result of the build that triggered the action (informational)
    #[arg(long)]
    build_result: Option<BuildOutcome>,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<(ActionConfig, Option<BuildOutcome>)> {
        let mut config = match &self.config {
            Some(path) => ActionConfig::from_file(path)?,
            None => ActionConfig::default(),
        };

        if let Some(api_url) = self.api_url {
            config.api_url = api_url;
        }
        if let Some(namespace) = self.namespace {
            config.namespace = namespace;
        }
        if let Some(auth_token) = self.auth_token {
            config.auth_token = auth_token;
        }
        if let Some(build_config) = self.build_config {
            config.build_config = build_config;
        }
        config.verbose |= self.verbose;
        config.skip_tls_verify |= self.skip_tls_verify;

        Ok((config, self.build_result))
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let (config, outcome) = match cli.into_config() {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("Failed to load configuration: {:#}", e);
            return ExitCode::from(2);
        }
    };

    init_tracing(config.verbose);

    match config.validate() {
        Ok(warnings) => {
            for warning in warnings {
                warn!("{}", warning);
            }
        }
        Err(e) => {
            error!(error = %e, "Invalid action configuration");
            eprintln!("{}", e);
            return ExitCode::from(2);
        }
    }

    let request = config.resolve(|key| std::env::var(key).ok());
    let connector = KubeConnector::new(request.skip_tls_verify);
    let canceller = BuildCanceller::new(request);

    let result = canceller.run(&connector, &mut StdoutLog, outcome).await;
    info!(
        succeeded = result.succeeded,
        cancelled = result.cancelled_count,
        "Action finished"
    );

    if result.succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Initialize tracing subscriber
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},kube=warn,hyper=warn", default_level)));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();
}
