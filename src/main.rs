//! sciplan binary
//!
//! Reads plan documents, drives them through the plan workflow and writes
//! them back with the references the backends assigned.

mod cli;

use clap::Parser;
use tracing::{debug, info};

use sciplan::config::{self, ClientConfig};
use sciplan::error::{Error, Result};
use sciplan::logging;
use sciplan::version::{self, BuildInfo};
use sciplan::{Context, Plan, WaitOutcome};

use crate::cli::{Cli, Commands, ConfigSubcommand};

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprint!("{}", e.format_for_terminal());
        std::process::exit(e.exit_code());
    }
}

fn run(cli: Cli) -> Result<()> {
    // Commands that don't need a session
    match cli.command {
        Commands::Version => {
            version::print_version();
            return Ok(());
        }
        Commands::Config { ref subcommand } => {
            logging::init_simple(tracing::Level::WARN)?;
            return handle_config_command(subcommand.clone(), cli.config.as_deref());
        }
        _ => {}
    }

    let config = ClientConfig::load(cli.config.as_deref())?;

    // Must stay alive until exit so buffered file logs are flushed
    let _log_guards = logging::init_logging(&config.logging, cli.verbose, cli.quiet)?;

    let build = BuildInfo::current();
    debug!(version = %build.version, commit = %build.commit, "Starting sciplan");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::Internal(format!("Failed to create runtime: {}", e)))?;

    runtime.block_on(async {
        let ctx = Context::from_config(&config)?;
        run_command(cli.command, &ctx, &config).await
    })
}

async fn run_command(command: Commands, ctx: &Context, config: &ClientConfig) -> Result<()> {
    match command {
        Commands::Launch { plan: path, yes, force } => {
            let mut plan = Plan::read_from(&path)?;
            let report = plan.launch_with(ctx, yes, force).await;
            plan.write_to(&path)?;

            for name in &report.launched {
                println!("launched  {}", name);
            }
            if let Some(failure) = report.failure {
                eprintln!("Plan launch stopped at the {} stage", failure.stage);
                if let Some(task) = failure.task {
                    eprintln!("  task: {}", task);
                }
                return Err(failure.error);
            }
            if let Some(id) = plan.id() {
                println!("plan id   {}", id);
            }
        }

        Commands::Status { plan: path } => {
            let plan = Plan::read_from(&path)?;
            print_statuses(&plan, &plan.poll_statuses(ctx).await?);
        }

        Commands::Wait { plan: path, interval } => {
            let plan = Plan::read_from(&path)?;
            let interval = match interval {
                Some(minutes) => config::minutes_to_interval("--interval", minutes)?,
                None => config.plan.poll_interval()?,
            };

            let interrupted = async {
                if tokio::signal::ctrl_c().await.is_err() {
                    std::future::pending::<()>().await;
                }
            };
            match plan.wait_for_completion(ctx, interval, interrupted).await? {
                WaitOutcome::Completed { statuses, .. } => print_statuses(&plan, &statuses),
                WaitOutcome::Interrupted { rounds } => {
                    info!(rounds, "Interrupted; remote tasks keep running");
                    eprintln!("Stopped waiting. Remote tasks are still running.");
                }
            }
        }

        Commands::Stop { plan: path } => {
            let mut plan = Plan::read_from(&path)?;
            let result = plan.stop(ctx).await;
            plan.write_to(&path)?;
            result?;
            println!("stop requested for {} task(s)", plan.tasks().len());
        }

        Commands::Fetch { plan: path, dir } => {
            let plan = Plan::read_from(&path)?;
            let fetched = plan.fetch(ctx, &dir).await?;
            for (task, files) in &fetched {
                println!("{:<20} {} file(s)", task, files.len());
            }
            println!("snapshot  {}", dir.join(sciplan::plan::SNAPSHOT_FILE).display());
        }

        Commands::Plans => {
            for plan in Plan::query(ctx).await? {
                let names: Vec<&str> = plan.tasks().iter().map(|t| t.name()).collect();
                println!("{:<38} {}", plan.id().unwrap_or("-"), names.join(", "));
            }
        }

        Commands::Show { id } => {
            let plan = Plan::load(ctx, &id).await?;
            println!("{}", plan.to_json()?);
        }

        Commands::Version | Commands::Config { .. } => {
            return Err(Error::Internal("command handled before session setup".into()));
        }
    }

    Ok(())
}

fn print_statuses(plan: &Plan, statuses: &[(String, sciplan::ExperimentState)]) {
    for (task, (remote_ref, state)) in plan.tasks().iter().zip(statuses) {
        println!("{:<20} {:<40} {}", task.name(), remote_ref, state);
    }
}

fn handle_config_command(subcommand: ConfigSubcommand, config_path: Option<&str>) -> Result<()> {
    match subcommand {
        ConfigSubcommand::Show => {
            let cfg = ClientConfig::load(config_path)?;
            println!("{}", toml::to_string_pretty(&redacted(cfg))?);
        }
        ConfigSubcommand::Init { path, force } => {
            let written = config::init_config(path.as_deref(), force)?;
            println!("Configuration written to {}", written.display());
        }
        ConfigSubcommand::Validate => {
            ClientConfig::load(config_path)?;
            println!("Configuration is valid.");
        }
    }

    Ok(())
}

/// Configuration safe to print
fn redacted(mut config: ClientConfig) -> ClientConfig {
    if config.gateway.access_token.is_some() {
        config.gateway.access_token = Some("********".to_string());
    }
    config
}

