//! fleetpkg - Fleet package installer
//!
//! Usage:
//!   fleetpkg install                         # Install the package in the current tree
//!   fleetpkg install --zip build/pkg.zip     # Upload a built archive
//!   fleetpkg install -c kibana.version=8.9.2 # Only check conditions
//!   fleetpkg manifest                        # Show the resolved manifest

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fleetpkg_core::conditions::{ConditionReport, Strictness, parse_assertions};
use fleetpkg_core::config::{FleetConfig, load_strictness};
use fleetpkg_core::error::InstallError;
use fleetpkg_core::gateway::FleetClient;
use fleetpkg_core::install::{self, CheckReport, InstallMethod, InstallRequest, InstallResult};
use fleetpkg_core::manifest::Manifest;
use fleetpkg_core::source::InstallSource;

const DEFAULT_LOG_FILTER: &str = "fleetpkg=info,fleetpkg_core=info,warn";

#[derive(Parser)]
#[command(name = "fleetpkg")]
#[command(about = "Install integration packages into Kibana Fleet", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install a package, or only check its conditions with -c
    Install(Box<InstallArgs>),

    /// Show the manifest of the resolved package without contacting Kibana
    Manifest {
        #[command(flatten)]
        source: SourceArgs,

        /// Output format
        #[arg(short = 'o', long, default_value = "table")]
        format: OutputFormat,
    },
}

#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// Machine-readable JSON
    Json,
    /// Print nothing on success
    Quiet,
}

#[derive(Args, Clone)]
struct SourceArgs {
    /// Install a built package archive
    #[arg(long, value_name = "PATH")]
    zip: Option<PathBuf>,

    /// Package root directory (discovered upward from the working directory if omitted)
    #[arg(short = 'C', long, value_name = "DIR")]
    root: Option<PathBuf>,
}

#[derive(Args)]
struct InstallArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Ask Kibana to skip validating the package contents
    #[arg(long)]
    skip_validation: bool,

    /// Check a package condition (KEY=VALUE) instead of installing; repeatable
    #[arg(short = 'c', long = "check-condition", value_name = "KEY=VALUE")]
    check_conditions: Vec<String>,

    /// Treatment of conditions no -c covers (lenient, warn, strict)
    #[arg(long)]
    strictness: Option<Strictness>,

    /// Deadline for the install call in seconds (0 disables it)
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Configuration file (defaults to the user config directory)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short = 'o', long, default_value = "table")]
    format: OutputFormat,
}

fn main() -> Result<()> {
    // Logs go to stderr so stdout carries only results
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(run_cli(cli.command))
}

async fn run_cli(command: Commands) -> Result<()> {
    match command {
        Commands::Install(args) => run_install(*args).await?,
        Commands::Manifest { source, format } => run_manifest(source, format)?,
    }
    Ok(())
}

/// Attach the failing step to a core error.
fn step_error(err: InstallError) -> anyhow::Error {
    let step = err.step();
    anyhow::Error::new(err).context(format!("{step} step failed"))
}

fn base_request(source: &SourceArgs) -> Result<InstallRequest> {
    let working_dir = std::env::current_dir().context("Failed to determine working directory")?;
    let mut request = InstallRequest::new(working_dir);
    if let Some(zip) = &source.zip {
        request = request.with_archive(zip);
    }
    if let Some(root) = &source.root {
        request = request.with_directory(root);
    }
    Ok(request)
}

async fn run_install(args: InstallArgs) -> Result<()> {
    let assertions = parse_assertions(&args.check_conditions).map_err(step_error)?;

    // With -c only the check runs; connection settings are not read
    if !assertions.is_empty() {
        let strictness = match args.strictness {
            Some(strictness) => strictness,
            None => load_strictness(args.config.as_deref()).map_err(step_error)?,
        };
        let request = base_request(&args.source)?
            .with_assertions(assertions)
            .with_strictness(strictness);
        let report = install::check_conditions(&request).map_err(step_error)?;
        return print_check_report(&report, args.format);
    }

    let config = FleetConfig::load(args.config.as_deref()).map_err(step_error)?;
    let mut request = base_request(&args.source)?
        .with_strictness(args.strictness.unwrap_or(config.strictness))
        .with_skip_validation(args.skip_validation);

    let timeout = match args.timeout {
        Some(0) => None,
        Some(secs) => Some(Duration::from_secs(secs)),
        None => config.timeout,
    };
    if let Some(timeout) = timeout {
        request = request.with_timeout(timeout);
    }

    let client = FleetClient::new(&config).map_err(step_error)?;
    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling install");
            interrupt.cancel();
        }
    });

    if matches!(args.format, OutputFormat::Table) {
        println!("Install the package");
    }
    let result = install::install(&client, &request, &cancel)
        .await
        .map_err(step_error)?;

    print_install_result(&result, client.base_url().as_str(), args.format)
}

fn run_manifest(source: SourceArgs, format: OutputFormat) -> Result<()> {
    let request = base_request(&source)?;
    let (source, manifest) = install::load_manifest(&request).map_err(step_error)?;

    match format {
        OutputFormat::Table => print_manifest(&source, &manifest),
        OutputFormat::Json => {
            let output = serde_json::json!({
                "source": { "kind": source.kind(), "path": source.path().display().to_string() },
                "manifest": manifest,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Quiet => {}
    }
    Ok(())
}

fn print_check_report(report: &CheckReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            println!("Check conditions for package");
            println!("  {} ({})", report.manifest.identifier(), report.source);
            print_conditions(&report.conditions);
            println!("Requirements satisfied - the package can be installed.");
            println!("Done");
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        OutputFormat::Quiet => {}
    }
    Ok(())
}

fn print_install_result(result: &InstallResult, host: &str, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            let via = match result.method {
                InstallMethod::ArchiveUpload => "archive upload",
                InstallMethod::DirectoryArtifact => "built artifact",
            };
            println!(
                "✓ Installed {} {} ({}) into {}",
                result.installed.name(),
                result.installed.version(),
                via,
                host
            );
            if let Some(conditions) = &result.conditions {
                print_conditions(conditions);
            }
            println!("Done");
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(result)?);
        }
        OutputFormat::Quiet => {}
    }
    Ok(())
}

fn print_conditions(report: &ConditionReport) {
    for satisfied in &report.satisfied {
        println!(
            "  ✓ {} = {} (requires {})",
            satisfied.key, satisfied.value, satisfied.constraint
        );
    }
    for key in &report.unverified {
        println!("  • {} not checked", key);
    }
    for key in &report.ignored {
        println!("  ⚠ {} is not a condition of this package", key);
    }
}

fn print_manifest(source: &InstallSource, manifest: &Manifest) {
    println!("Package: {}", manifest.display_name());
    println!("  Name:    {}", manifest.name());
    println!("  Version: {}", manifest.version());
    if let Some(kind) = manifest.package_type() {
        println!("  Type:    {}", kind);
    }
    println!("  Source:  {}", source);
    if let Some(description) = manifest.description() {
        println!("  {}", description);
    }

    if manifest.conditions().is_empty() {
        println!("No conditions declared");
        return;
    }
    println!();
    println!("{:<30} CONSTRAINT", "CONDITION");
    println!("{}", "-".repeat(50));
    for (key, range) in manifest.conditions() {
        println!("{:<30} {}", key, range);
    }
}
