mod cli;

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::Colorize;
use regex::Regex;
use std::process::ExitCode;
use tracing::{info, warn};

use cli::{prompt_menu, Cli, Commands, ConfigCommands, Job};
use fleet_restore::core::{
    DumpTool, NameFilter, OrchestratorError, OrchestratorOptions, OutcomeStatus, ProcessRunner, RavenAdminClient,
    RestoreOrchestrator, RunReport,
};
use fleet_restore::utils::{init_logging, AppConfig, ADMIN_REQUEST_TIMEOUT};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenv::dotenv().ok();
    let mut cli = Cli::parse();

    // `config init` must work even when the current file does not parse
    let job = match cli.command.take() {
        Some(Commands::Config { command }) => {
            handle_config(command, &cli)?;
            return Ok(ExitCode::SUCCESS);
        }
        Some(Commands::Export { database, filter }) => Some(Job::export(database, filter)),
        Some(Commands::Import { database, filter }) => Some(Job::import(database, filter)),
        None => None,
    };

    let config = load_config(&cli)?;

    let errors = config.validate();
    if !errors.is_empty() {
        eprintln!("{}", "✗ Configuration errors:".red());
        for error in errors {
            eprintln!("  - {}", error);
        }
        bail!("Refusing to run with an invalid configuration");
    }

    let _log_guard = init_logging(config.log_dir.as_deref(), cli.verbose)?;
    if let Some(dir) = &config.log_dir {
        info!("Logging to {}", dir.display());
    }

    let job = match job {
        Some(job) => job,
        None => match prompt_menu()? {
            Some(job) => job,
            None => {
                println!("Incorrect");
                return Ok(ExitCode::SUCCESS);
            }
        },
    };

    // Dropping the run future kills the in-flight dump tool process
    let result = tokio::select! {
        result = run_job(&config, job) => result,
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl-C")?;
            warn!("Interrupted, current batch aborted");
            return Ok(ExitCode::from(130));
        }
    };

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            if let Some(partial) = e.downcast_ref::<OrchestratorError>().and_then(|e| e.partial_report()) {
                print_report(partial, cli.json)?;
            }
            return Err(e);
        }
    };

    print_report(&report, cli.json)?;

    if report.has_failures() {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// Config file, then `FLEET_*` environment, then command-line flags
fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    config.apply_env();

    if let Some(url) = &cli.server_url {
        config.server_url = url.clone();
    }
    if let Some(dir) = &cli.backup_dir {
        config.backup_dir = dir.clone();
    }
    if let Some(tool) = &cli.tool_path {
        config.tool_path = Some(tool.clone());
    }

    Ok(config)
}

fn regex_filter(re: &Regex) -> impl Fn(&str) -> bool + '_ {
    move |name: &str| re.is_match(name)
}

async fn run_job(config: &AppConfig, job: Job) -> Result<RunReport> {
    let admin = RavenAdminClient::new(&config.server_url, ADMIN_REQUEST_TIMEOUT)?;
    let tool_path = config.resolved_tool_path()?;
    info!("Using dump tool {}", tool_path.display());

    let tool = DumpTool::new(
        ProcessRunner::new(config.tool_timeout),
        tool_path,
        &config.server_url,
        &config.backup_dir,
    )
    .with_extension(&config.dump_extension)
    .with_retry(config.retry_policy())
    .with_cooldown(config.cooldown)
    .with_export_args(config.export_args.clone())
    .with_import_args(config.import_args.clone());

    let orchestrator = RestoreOrchestrator::new(admin, tool, config.bundle_rules()?).with_options(OrchestratorOptions {
        page_size: config.page_size,
        default_bundles: config.default_bundles.clone(),
        data_dir_prefix: config.data_dir_prefix.clone(),
    });

    let report = match &job {
        Job::ExportAll(filter) => {
            let filter = filter.as_ref().map(regex_filter);
            orchestrator
                .export_all(filter.as_ref().map(|f| f as NameFilter<'_>))
                .await?
        }
        Job::ImportAll(filter) => {
            let filter = filter.as_ref().map(regex_filter);
            orchestrator
                .import_all(filter.as_ref().map(|f| f as NameFilter<'_>))
                .await?
        }
        Job::ExportOne(name) => orchestrator.export_one(name).await?,
        Job::ImportOne(name) => orchestrator.import_one(name).await?,
    };

    Ok(report)
}

fn print_report(report: &RunReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print_summary(report);
    }
    Ok(())
}

fn print_summary(report: &RunReport) {
    println!("\n{:<40} {:<10} {:<9} {}", "Database", "Status", "Attempts", "Details");
    println!("{}", "-".repeat(80));

    for outcome in &report.outcomes {
        let (status, details) = match &outcome.status {
            OutcomeStatus::Succeeded => (
                format!("{:<10}", "ok").green(),
                outcome
                    .finalize
                    .as_ref()
                    .map(|f| f.problems())
                    .unwrap_or_default(),
            ),
            OutcomeStatus::Skipped { reason } => (format!("{:<10}", "skipped").yellow(), reason.clone()),
            OutcomeStatus::Failed { reason } => (format!("{:<10}", "FAILED").red(), reason.clone()),
        };

        println!("{:<40} {} {:<9} {}", outcome.database, status, outcome.attempts, details);
    }

    println!(
        "\n{} succeeded, {} failed, {} skipped",
        report.succeeded(),
        report.failed(),
        report.skipped()
    );
}

fn handle_config(command: ConfigCommands, cli: &Cli) -> Result<()> {
    match command {
        ConfigCommands::View => {
            let config = load_config(cli)?;
            println!("Configuration:\n");
            print!("{}", config.to_toml()?);
        }
        ConfigCommands::Validate => {
            let errors = load_config(cli)?.validate();

            if errors.is_empty() {
                println!("✓ Configuration is valid");
            } else {
                println!("✗ Configuration errors:");
                for error in errors {
                    println!("  - {}", error);
                }
            }
        }
        ConfigCommands::Init { force } => {
            let path = match &cli.config {
                Some(path) => path.clone(),
                None => AppConfig::config_path()?,
            };

            AppConfig::init_file(&path, force)?;
            println!("✓ Wrote {}", path.display());
        }
    }

    Ok(())
}
