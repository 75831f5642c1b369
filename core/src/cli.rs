use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "buildtime")]
#[command(author, version, about = "Stage timings from CI build logs", long_about = None)]
pub struct Cli {
    #[arg(
        short = 'C',
        long = "directory",
        value_name = "DIR",
        help = "Directory to look for buildtime.toml in"
    )]
    pub source_dir: Option<PathBuf>,

    #[arg(long, global = true, help = "Configuration file path")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum HistoryCommands {
    #[command(about = "Show stored jobs")]
    Show {
        #[arg(short, long, help = "Number of entries to show")]
        count: Option<usize>,
    },

    #[command(about = "Clear stored jobs")]
    Clear,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Parse build logs into stage timings")]
    Parse {
        #[arg(required = true, value_name = "LOG", help = "Build job log files")]
        logs: Vec<PathBuf>,

        #[arg(
            long,
            value_name = "RFC3339",
            value_parser = parse_started_at,
            help = "Start time of the job(s); timing tags are ignored before 2014-08-07"
        )]
        started_at: Option<DateTime<Utc>>,

        #[arg(long, value_name = "ID", help = "Job id, only valid with a single log")]
        job_id: Option<String>,

        #[arg(long, help = "Print job records as JSON")]
        json: bool,

        #[arg(long, help = "Store job records in the history file")]
        save: bool,
    },

    #[command(about = "Manage stored jobs")]
    History {
        #[command(subcommand)]
        command: HistoryCommands,
    },

    #[command(about = "Initialize a new buildtime.toml configuration")]
    Init {
        #[arg(long, help = "Overwrite an existing file")]
        force: bool,
    },
}

fn parse_started_at(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("invalid timestamp '{}': {}", value, e))
}

impl Cli {
    pub fn source_directory(&self) -> anyhow::Result<PathBuf> {
        match &self.source_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(std::env::current_dir()?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command() {
        let cli = Cli::try_parse_from([
            "buildtime",
            "parse",
            "job.log",
            "--started-at",
            "2014-08-17T13:40:14Z",
            "--json",
        ])
        .unwrap();

        match cli.command {
            Commands::Parse {
                logs,
                started_at,
                json,
                save,
                job_id,
            } => {
                assert_eq!(logs, vec![PathBuf::from("job.log")]);
                assert_eq!(started_at.unwrap().timestamp(), 1408282814);
                assert!(json);
                assert!(!save);
                assert!(job_id.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_requires_a_log() {
        assert!(Cli::try_parse_from(["buildtime", "parse"]).is_err());
    }

    #[test]
    fn test_invalid_started_at() {
        let result = Cli::try_parse_from(["buildtime", "parse", "job.log", "--started-at", "today"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_history_show() {
        let cli = Cli::try_parse_from(["buildtime", "history", "show", "-c", "3"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::History {
                command: HistoryCommands::Show { count: Some(3) }
            }
        ));
    }
}
