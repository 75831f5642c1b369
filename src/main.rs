use anyhow::{Context, Result};
use buildtime_core::config::CONFIG_FILE_NAME;
use buildtime_core::job::records_to_json;
use buildtime_core::{
    BuildJob, Cli, Commands, Config, HistoryCommands, JobHistory, LogLevel, Logger, StageSink,
};
use chrono::{DateTime, Utc};
use clap::Parser;
use std::path::PathBuf;

fn logger_for(config: &Config) -> Logger {
    Logger::new()
        .with_colors(config.display.colors)
        .with_timestamps(config.display.show_timestamps)
}

async fn parse_logs(
    config: &Config,
    logs: Vec<PathBuf>,
    started_at: Option<DateTime<Utc>>,
    job_id: Option<String>,
    json: bool,
    save: bool,
) -> Result<()> {
    if job_id.is_some() && logs.len() > 1 {
        anyhow::bail!("--job-id can only be used with a single log file");
    }

    let handles: Vec<_> = logs
        .into_iter()
        .map(|path| {
            let mut job = BuildJob::new(config.commands.clone());
            if let Some(started_at) = started_at {
                job = job.with_started_at(started_at);
            }
            if let Some(id) = &job_id {
                job = job.with_job_id(id.clone());
            }

            tokio::task::spawn_blocking(move || {
                let result = job.process_file(&path);
                (path, job, result)
            })
        })
        .collect();

    let logger = logger_for(config);
    let mut jobs = Vec::with_capacity(handles.len());

    for handle in handles {
        let (path, job, result) = handle.await?;
        if let Err(e) = result {
            logger.log(
                LogLevel::Error,
                &format!("{}: {} (keeping {} stages read so far)", path.display(), e, job.timeline().len()),
            );
        }
        jobs.push((path, job));
    }

    if json {
        let records: Vec<_> = jobs.iter().map(|(_, job)| job.to_record()).collect();
        println!("{}", records_to_json(&records)?);
    } else {
        for (path, job) in &jobs {
            logger.log_job(&path.display().to_string(), job);
        }
    }

    if save {
        let mut history = JobHistory::new(config.storage_path(), config.history.max_jobs)
            .context("Failed to load job history")?;
        for (_, job) in &jobs {
            history.store(job.to_record())?;
        }
        if !json {
            logger.log(
                LogLevel::Info,
                &format!("Saved {} job(s) to {}", jobs.len(), config.storage_path().display()),
            );
        }
    }

    Ok(())
}

fn show_history(config: &Config, count: Option<usize>) -> Result<()> {
    let logger = logger_for(config);
    let history = JobHistory::new(config.storage_path(), config.history.max_jobs)
        .context("Failed to load job history")?;

    let entries = history.entries();
    let count = count.unwrap_or(10).min(entries.len());

    if entries.is_empty() {
        logger.log(LogLevel::Info, "No jobs stored.");
        return Ok(());
    }

    logger.log(LogLevel::Info, &format!("Job history (last {} entries):", count));
    logger.log(LogLevel::Info, "");

    for entry in entries.iter().rev().take(count) {
        logger.log(
            LogLevel::Info,
            &format!(
                "{} | {} | {:.1}s | {} stages{}",
                entry.recorded_at.format("%Y-%m-%d %H:%M:%S"),
                entry.job_id.as_deref().unwrap_or("-"),
                entry.duration,
                entry.stages.len(),
                entry
                    .worker
                    .as_ref()
                    .map(|w| format!(" | {}", w.hostname))
                    .unwrap_or_default()
            ),
        );
    }

    Ok(())
}

fn clear_history(config: &Config) -> Result<()> {
    let mut history = JobHistory::new(config.storage_path(), config.history.max_jobs)
        .context("Failed to load job history")?;
    history.clear()?;
    println!("Job history cleared.");
    Ok(())
}

fn init_config(cli: &Cli, force: bool) -> Result<()> {
    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => cli.source_directory()?.join(CONFIG_FILE_NAME),
    };

    if config_path.exists() && !force {
        anyhow::bail!(
            "{} already exists. Use --force to overwrite it.",
            config_path.display()
        );
    }

    Config::template()
        .save_to_file(&config_path)
        .context("Failed to save buildtime.toml")?;

    println!("Created {}", config_path.display());

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    if let Commands::Init { force } = &cli.command {
        return init_config(&cli, *force);
    }

    let source_dir = cli.source_directory()?;
    let config = Config::load(&source_dir, cli.config.as_deref())?;

    match cli.command {
        Commands::Parse {
            logs,
            started_at,
            job_id,
            json,
            save,
        } => parse_logs(&config, logs, started_at, job_id, json, save).await?,
        Commands::History { command } => match command {
            HistoryCommands::Show { count } => show_history(&config, count)?,
            HistoryCommands::Clear => clear_history(&config)?,
        },
        Commands::Init { .. } => {}
    }

    Ok(())
}
