//! vhdeploy - Valohai deployment from CI
//!
//! ## Commands
//!
//! - `deploy`: create a deployment version for a commit and point an alias at it
//! - `unused`: report (and optionally disable) idle deployment versions

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info, Level};

use vhdeploy_core::obs;
use vhdeploy_core::{
    find_unused_versions, run_deploy, skip_marker, AliasAction, DeployError, DeployOutcome,
    DeployRequest, EndpointSpec, ResourceLimits, Settings, UnusedOptions, ValohaiClient,
    VerifyOptions,
};

#[derive(Parser)]
#[command(name = "vhdeploy")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Deploy model endpoints to Valohai", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a deployment version for a commit and move an alias to it
    Deploy(DeployArgs),

    /// Report enabled versions whose endpoints have gone idle
    Unused(UnusedArgs),
}

#[derive(Args, Debug)]
struct DeployArgs {
    /// Branch the commit belongs to
    #[arg(short, long)]
    branch: String,

    /// Commit id to deploy
    #[arg(long)]
    commit_id: String,

    /// Endpoint replicas
    #[arg(short, long, default_value_t = 1)]
    replicas: u32,

    /// Memory limit in MB (0 = platform default)
    #[arg(long, default_value_t = 0)]
    memory_limit: u64,

    /// CPU request
    #[arg(long, default_value_t = 0.1)]
    cpu_request: f64,

    /// Alias to point at the new version
    #[arg(long, default_value = "staging")]
    alias: String,

    /// Commit message, checked for opt-out markers
    #[arg(long)]
    commit_message: Option<String>,

    /// Path to valohai.yaml
    #[arg(long, default_value = "valohai.yaml")]
    config: PathBuf,

    /// Endpoint to deploy (default: first endpoint in the config)
    #[arg(long)]
    endpoint: Option<String>,

    /// Directory holding probe payloads
    #[arg(long, default_value = "test_payloads")]
    payload_dir: PathBuf,

    /// Extra version environment variable (repeatable)
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
    env: Vec<(String, String)>,

    /// Do not probe the endpoint after deploying
    #[arg(long)]
    skip_verify: bool,

    /// Seconds to wait before probing, instead of the per-endpoint default
    #[arg(long)]
    probe_delay_secs: Option<u64>,
}

impl DeployArgs {
    fn to_request(&self) -> DeployRequest {
        let mut request = DeployRequest::new(&self.branch, &self.commit_id);
        request.limits = ResourceLimits {
            replicas: self.replicas,
            memory_limit: self.memory_limit,
            cpu_request: self.cpu_request,
        };
        request.alias_name = self.alias.clone();
        request.commit_message = self.commit_message.clone();
        request.environment = self.env.iter().cloned().collect::<BTreeMap<_, _>>();
        request.verify = (!self.skip_verify).then(|| VerifyOptions {
            payload_dir: self.payload_dir.clone(),
            delay_override: self.probe_delay_secs.map(Duration::from_secs),
        });
        request
    }
}

#[derive(Args, Debug)]
struct UnusedArgs {
    /// Repository marker in the commit URL (repeatable; replaces the defaults)
    #[arg(long = "repo-marker")]
    repo_markers: Vec<String>,

    /// Only report endpoints whose URL contains this
    #[arg(long, default_value = "dev")]
    environment: String,

    /// Hours of endpoint logs to inspect (1 to 720)
    #[arg(long, default_value_t = 12, value_parser = clap::value_parser!(i64).range(1..=720))]
    window_hours: i64,

    /// Disable versions idle for at least this many hours
    #[arg(long)]
    disable_after_hours: Option<f64>,

    /// Print the report as JSON
    #[arg(long)]
    json_output: bool,
}

impl UnusedArgs {
    fn to_options(&self) -> UnusedOptions {
        let mut options = UnusedOptions {
            environment_filter: self.environment.clone(),
            window: chrono::Duration::hours(self.window_hours),
            disable_after_hours: self.disable_after_hours,
            ..UnusedOptions::default()
        };
        if !self.repo_markers.is_empty() {
            options.repo_markers = self.repo_markers.clone();
        }
        options
    }
}

fn parse_env_pair(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    vhdeploy_core::init_tracing(cli.json, level);

    let result = match cli.command {
        Commands::Deploy(args) => cmd_deploy(&args).await,
        Commands::Unused(args) => cmd_unused(&args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %format!("{err:#}"), "vhdeploy failed");
            ExitCode::from(exit_code(&err))
        }
    }
}

/// Process exit code for a failed command.
fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<DeployError>()
        .map(|e| e.kind().exit_code())
        .unwrap_or(1)
}

async fn cmd_deploy(args: &DeployArgs) -> Result<()> {
    let request = args.to_request();

    // Opt-out is decided before any configuration is read.
    if let Some(marker) = skip_marker(request.commit_message.as_deref()) {
        obs::emit_deploy_skipped(marker);
        println!("Skipping deployment: commit message contains '{marker}'");
        return Ok(());
    }

    let settings = Settings::from_env()?;
    let spec = EndpointSpec::load(&args.config, args.endpoint.as_deref())?;
    let client = ValohaiClient::new(settings)?;

    info!(
        version = %request.version_name(),
        endpoint = %spec.endpoint_name,
        "deploying"
    );

    let outcome = run_deploy(&client, client.settings(), &spec, &request)
        .await
        .with_context(|| format!("deploy of {} failed", request.version_name()))?;

    match outcome {
        DeployOutcome::Skipped { marker } => {
            println!("Skipping deployment: commit message contains '{marker}'");
        }
        DeployOutcome::Deployed(report) => {
            println!(
                "Created version {} ({})",
                report.version.name, report.version.id
            );
            let action = match report.alias.action {
                AliasAction::Updated => "updated",
                AliasAction::Created => "created",
            };
            println!(
                "Alias {} {} -> {}",
                report.alias.name, action, report.alias.version_id
            );
            match report.probe {
                Some(kind) => println!("Endpoint verified ({} probe)", kind.as_str()),
                None => println!("Endpoint verification skipped"),
            }
        }
    }
    Ok(())
}

async fn cmd_unused(args: &UnusedArgs) -> Result<()> {
    let settings = Settings::from_env()?;
    let client = ValohaiClient::new(settings)?;

    let report = find_unused_versions(&client, &args.to_options(), chrono::Utc::now()).await?;

    if args.json_output {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if report.is_empty() {
        println!("No tracked versions found.");
    }
    for version in &report {
        let suffix = if version.disabled { " (disabled)" } else { "" };
        match version.idle_hours {
            Some(hours) => println!(
                "{}: {} unused {:.1} hours{}",
                version.name, version.endpoint_url, hours, suffix
            ),
            None => println!(
                "{}: {} usage unknown (logs unavailable)",
                version.name, version.endpoint_url
            ),
        }
    }
    Ok(())
}
