//! Job subcommand handlers for cronwatch.

use std::sync::Arc;

use anyhow::{Context, bail};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::json;
use tracing::{info, warn};

use cronwatch_config::{Config, ConfigValidator};
use cronwatch_protocols::{CronJob, CronJobCreate, Schedule};
use cronwatch_scheduler::{CronService, FileJobStore, RunMode, RunReport};

use crate::adapters::{LogEventSink, LogHeartbeat, ShellJobRunner, service_config};
use crate::cli::Commands;

/// Validate the config and build a service over the configured job file.
///
/// Fails while another process (usually `cronwatch run`) holds the store.
pub(crate) async fn build_service(config: &Config) -> anyhow::Result<CronService> {
    let warnings = ConfigValidator::validate(config).into_result()?;
    for warning in warnings {
        warn!(path = %warning.path, "{}", warning.message);
    }

    let store_path = config.scheduler.resolved_store_path();
    let service = CronService::builder(
        Arc::new(FileJobStore::new(&store_path)),
        Arc::new(ShellJobRunner::from_config(config)),
    )
    .event_sink(Arc::new(LogEventSink))
    .heartbeat(Arc::new(LogHeartbeat))
    .config(service_config(config))
    .build()
    .await
    .with_context(|| format!("Failed to open job store {}", store_path.display()))?;

    Ok(service)
}

/// Dispatch a parsed command.
pub(crate) async fn handle_command(command: Commands, config: &Config) -> anyhow::Result<()> {
    let service = build_service(config).await?;

    match command {
        Commands::Run => run_foreground(&service, config).await,
        Commands::Add {
            name,
            every,
            at,
            cron,
            command,
            cwd,
            description,
            disabled,
            delete_after_run,
        } => {
            let schedule = schedule_from_args(every, at.as_deref(), cron)?;
            let mut payload = json!({ "command": command });
            if let Some(cwd) = cwd {
                payload["cwd"] = json!(cwd);
            }
            let mut draft = CronJobCreate::new(name, schedule)
                .with_payload(payload)
                .with_enabled(!disabled)
                .with_delete_after_run(delete_after_run);
            if let Some(description) = description {
                draft = draft.with_description(description);
            }

            let job = service.add(draft).await?;
            println!(
                "Added job {} ({}), next run: {}",
                job.id,
                job.name,
                format_ms(job.state.next_run_at_ms)
            );
            Ok(())
        }
        Commands::List { all, json } => {
            let jobs = service.list(all).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&jobs)?);
            } else {
                print_table(&jobs);
            }
            Ok(())
        }
        Commands::Remove { job_id } => {
            let job = service.remove(&job_id).await?;
            println!("Removed job {} ({})", job.id, job.name);
            Ok(())
        }
        Commands::Trigger { job_id, due } => {
            let mode = if due { RunMode::Scheduled } else { RunMode::Force };
            let report = service.run(&job_id, mode).await?;
            match &report {
                RunReport::NotDue { next_run_at_ms } => {
                    println!("Job {} is not due, next run: {}", job_id, format_ms(*next_run_at_ms));
                }
                RunReport::Ran { .. } => {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
            }
            Ok(())
        }
        Commands::Status => {
            let status = service.status().await;
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(())
        }
    }
}

async fn run_foreground(service: &CronService, config: &Config) -> anyhow::Result<()> {
    info!("Starting cronwatch v{}", env!("CARGO_PKG_VERSION"));
    info!(
        store = %config.scheduler.resolved_store_path().display(),
        "Job store"
    );

    if config.scheduler.enabled {
        service.start().await;
    } else {
        warn!("scheduler.enabled is false, timer loop not started");
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Shutdown signal received");

    service.stop().await;
    Ok(())
}

/// Turn the mutually exclusive schedule flags into a [`Schedule`].
pub(crate) fn schedule_from_args(
    every: Option<u64>,
    at: Option<&str>,
    cron: Option<String>,
) -> anyhow::Result<Schedule> {
    match (every, at, cron) {
        (Some(every_ms), None, None) => Ok(Schedule::Every { every_ms }),
        (None, Some(at), None) => {
            let at = DateTime::parse_from_rfc3339(at)
                .with_context(|| format!("Invalid --at timestamp '{}'", at))?;
            Ok(Schedule::At {
                at_ms: at.timestamp_millis(),
            })
        }
        (None, None, Some(expr)) => Ok(Schedule::Cron { expr }),
        _ => bail!("Exactly one of --every, --at or --cron is required"),
    }
}

fn format_ms(ms: Option<i64>) -> String {
    ms.and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| "-".to_string())
}

fn print_table(jobs: &[CronJob]) {
    if jobs.is_empty() {
        println!("No jobs found.");
        return;
    }

    println!(
        "{:<36} {:<20} {:<22} {:<8} {:<6} {}",
        "ID", "NAME", "SCHEDULE", "ENABLED", "FAILS", "NEXT RUN"
    );
    println!("{}", "-".repeat(120));
    for job in jobs {
        println!(
            "{:<36} {:<20} {:<22} {:<8} {:<6} {}",
            job.id,
            job.name,
            job.schedule.describe(),
            job.enabled,
            job.state.consecutive_failures,
            format_ms(job.state.next_run_at_ms)
        );
    }
}
