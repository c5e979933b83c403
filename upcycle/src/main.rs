//! upcycle - Entry Point
//!
//! Safely replaces the running service images of the paper-review stack
//! with freshly built ones, verifies health, and reverts on failure.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tokio::sync::broadcast;
use tracing::warn;

use upcycle::backup::manager::BackupManager;
use upcycle::backup::sweeper::RetentionSweeper;
use upcycle::build::compose::ComposeBuilder;
use upcycle::errors::UpdateError;
use upcycle::health::http::HttpProbe;
use upcycle::logs::{init_logging, LogOptions};
use upcycle::models::artifact::ArtifactRef;
use upcycle::registry::docker::DockerRegistry;
use upcycle::registry::ArtifactRegistry;
use upcycle::runtime::compose::{ComposeBin, ComposeRuntime};
use upcycle::source::git::GitSource;
use upcycle::storage::layout::StateLayout;
use upcycle::storage::settings::Settings;
use upcycle::update::gate::ConsoleGate;
use upcycle::update::orchestrator::UpdateOrchestrator;
use upcycle::update::plan::{UpdateOutcome, UpdatePlan};
use upcycle::utils::{short_image_id, version_info};
use upcycle::verify::shell::ShellVerifier;
use upcycle::verify::Verifier;

#[derive(Parser)]
#[command(
    name = "upcycle",
    about = "Update/rollback orchestrator for the paper-review service stack",
    version
)]
struct Cli {
    /// Settings file (default: upcycle.json in the working directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one update transaction
    Update {
        /// Scope: all, full-test, or <component>-only (e.g. bot-only)
        #[arg(default_value = "all")]
        scope: String,

        /// Answer the dirty-source gate without prompting
        #[arg(long)]
        yes: bool,

        /// Print the structured result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove backups past the retention window
    Sweep {
        /// Age threshold in days (default: retention_days from settings)
        #[arg(long)]
        max_age_days: Option<i64>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show deployed artifacts and the backups referencing them
    Status {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print version information
    Version,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if matches!(cli.command, Commands::Version) {
        return match serde_json::to_string_pretty(&version_info()) {
            Ok(json) => {
                println!("{}", json);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("error: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    let settings = match Settings::load(cli.config.as_deref()).await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("failed to load settings: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        json_format: cli.log_json,
    };
    if let Err(e) = init_logging(log_options) {
        eprintln!("failed to initialize logging: {}", e);
    }

    let result = match cli.command {
        Commands::Update { scope, yes, json } => cmd_update(&settings, &scope, yes, json).await,
        Commands::Sweep { max_age_days, json } => cmd_sweep(&settings, max_age_days, json).await,
        Commands::Status { json } => cmd_status(&settings, json).await,
        Commands::Version => Ok(ExitCode::SUCCESS),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", format!("error: {}", e).red());
            ExitCode::FAILURE
        }
    }
}

async fn cmd_update(
    settings: &Settings,
    scope: &str,
    yes: bool,
    json: bool,
) -> Result<ExitCode, UpdateError> {
    let plan = UpdatePlan::parse(scope)?;
    let compose = ComposeBin::detect().await?;

    let registry: Arc<dyn ArtifactRegistry> = Arc::new(DockerRegistry::new());
    let layout = StateLayout::new(&settings.state_dir);
    let backups = BackupManager::new(registry.clone(), &layout);

    // Operator interrupt fans out through a broadcast channel; the
    // orchestrator observes it at phase boundaries and inside health polls
    let (shutdown_tx, _) = broadcast::channel(1);
    let interrupt_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing the current step then unwinding...");
            let _ = interrupt_tx.send(());
        }
    });

    let verifier = settings
        .verify_command
        .as_deref()
        .map(|cmd| Arc::new(ShellVerifier::new(&settings.project_dir, cmd)) as Arc<dyn Verifier>);

    let orchestrator = UpdateOrchestrator {
        components: settings.components.clone(),
        registry: registry.clone(),
        runtime: Arc::new(ComposeRuntime::new(
            &settings.project_dir,
            &settings.compose_file,
            compose,
        )),
        builder: Arc::new(ComposeBuilder::new(
            &settings.project_dir,
            &settings.compose_file,
            compose,
        )),
        source: Arc::new(GitSource::new(
            &settings.project_dir,
            &settings.source.remote,
            &settings.source.branch,
        )),
        probe: Arc::new(HttpProbe::new(Duration::from_secs(5))?),
        verifier,
        gate: Arc::new(ConsoleGate::new(yes)),
        backups,
        layout,
        probe_options: settings.health.probe_options(),
        required_env: settings.required_env.clone(),
        shutdown: shutdown_tx,
    };

    match orchestrator.run_update(&plan).await {
        Ok(result) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            }
            match result.outcome {
                UpdateOutcome::Committed => {
                    println!("{}", "update committed".green().bold());
                    Ok(ExitCode::SUCCESS)
                }
                UpdateOutcome::RolledBack => {
                    let backup = result.backup.as_deref().unwrap_or("-");
                    println!(
                        "{}",
                        format!("update rolled back to backup '{}'", backup)
                            .yellow()
                            .bold()
                    );
                    if let Some(reason) = &result.rollback_reason {
                        println!("reason: {}", reason);
                    }
                    Ok(ExitCode::from(1))
                }
            }
        }
        Err(e @ UpdateError::RollbackFailed { .. }) => {
            // Terminal: surface loudly with the backup id for manual recovery
            eprintln!("{}", e.to_string().red().bold());
            Ok(ExitCode::from(2))
        }
        Err(e) => Err(e),
    }
}

async fn cmd_sweep(
    settings: &Settings,
    max_age_days: Option<i64>,
    json: bool,
) -> Result<ExitCode, UpdateError> {
    let days = max_age_days.unwrap_or(settings.retention_days);

    let registry: Arc<dyn ArtifactRegistry> = Arc::new(DockerRegistry::new());
    let layout = StateLayout::new(&settings.state_dir);
    let sweeper = RetentionSweeper::new(BackupManager::new(registry, &layout));

    let removed = sweeper
        .sweep(chrono::Duration::days(days), chrono::Utc::now())
        .await?;

    if json {
        println!("{}", serde_json::json!({ "removed": removed }));
    } else {
        println!("removed {} backup(s) older than {} day(s)", removed, days);
    }
    Ok(ExitCode::SUCCESS)
}

#[derive(serde::Serialize)]
struct ComponentStatus {
    component: String,
    image: String,
    latest: Option<String>,
    backups: Vec<String>,
    registry_backup_tags: Vec<String>,
}

async fn cmd_status(settings: &Settings, json: bool) -> Result<ExitCode, UpdateError> {
    let registry: Arc<dyn ArtifactRegistry> = Arc::new(DockerRegistry::new());
    let layout = StateLayout::new(&settings.state_dir);
    let manager = BackupManager::new(registry.clone(), &layout);

    let backups = manager.list().await?;
    let mut report = Vec::with_capacity(settings.components.len());

    for component in &settings.components {
        let latest = registry
            .image_id(&ArtifactRef::latest(&component.image))
            .await?;
        let referenced: Vec<String> = backups
            .iter()
            .filter(|b| b.entry(&component.name).is_some())
            .map(|b| b.id())
            .collect();
        let registry_backup_tags: Vec<String> = registry
            .list_tags(&component.image)
            .await?
            .into_iter()
            .filter(|t| t.starts_with("backup-"))
            .collect();
        report.push(ComponentStatus {
            component: component.name.clone(),
            image: component.image.clone(),
            latest: latest.map(|id| id.0),
            backups: referenced,
            registry_backup_tags,
        });
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for entry in &report {
            println!("{}", entry.component.bold());
            println!("  image:   {}", entry.image);
            match &entry.latest {
                Some(id) => println!("  latest:  {}", short_image_id(id)),
                None => println!("  latest:  {}", "absent".dimmed()),
            }
            if entry.backups.is_empty() {
                println!("  backups: {}", "none".dimmed());
            } else {
                println!("  backups: {}", entry.backups.join(", "));
            }
            // Tags present in the registry but unknown to any manifest point
            // at foreign/manual backups
            let unmanaged: Vec<&str> = entry
                .registry_backup_tags
                .iter()
                .map(|t| t.as_str())
                .filter(|t| {
                    !entry
                        .backups
                        .iter()
                        .any(|id| t.ends_with(id.as_str()))
                })
                .collect();
            if !unmanaged.is_empty() {
                println!("  unmanaged tags: {}", unmanaged.join(", ").dimmed());
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}
