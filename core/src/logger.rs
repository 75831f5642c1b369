use std::io::Write;

use crate::job::BuildJob;
use crate::stage::Stage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn to_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        }
    }

    fn color(&self) -> &'static str {
        match self {
            LogLevel::Debug => "\x1b[90m",
            LogLevel::Info => "\x1b[37m",
            LogLevel::Warning => "\x1b[33m",
            LogLevel::Error => "\x1b[31m",
        }
    }
}

pub struct Logger {
    use_colors: bool,
    show_timestamps: bool,
}

impl Logger {
    pub fn new() -> Self {
        Self {
            use_colors: atty::is(atty::Stream::Stdout),
            show_timestamps: true,
        }
    }

    pub fn with_colors(mut self, enabled: bool) -> Self {
        self.use_colors = self.use_colors && enabled;
        self
    }

    pub fn with_timestamps(mut self, enabled: bool) -> Self {
        self.show_timestamps = enabled;
        self
    }

    pub fn log(&self, level: LogLevel, message: &str) {
        if self.use_colors {
            println!("{}{}\x1b[0m", level.color(), message);
        } else {
            println!("{}", message);
        }
    }

    pub fn log_job(&self, source: &str, job: &BuildJob) {
        let header = match job.job_id() {
            Some(id) => format!("Job {} ({})", id, source),
            None => format!("Job {}", source),
        };
        self.log(LogLevel::Info, &header);

        if let Some(worker) = job.worker() {
            self.log(
                LogLevel::Debug,
                &format!("  worker: {} ({})", worker.hostname, worker.os),
            );
        }

        let timeline = job.timeline();
        if timeline.is_empty() {
            self.log(LogLevel::Warning, "  no stages found");
            return;
        }

        for stage in timeline {
            self.log_stage(stage);
        }

        let mut summary = format!(
            "  {} stages, {:.3}s total",
            timeline.len(),
            timeline.total_duration()
        );
        if let (Some(started), Some(finished)) = (timeline.started_at(), timeline.finished_at()) {
            summary.push_str(&format!(
                ", {} -> {}",
                started.isotimestamp, finished.isotimestamp
            ));
        }
        self.log(LogLevel::Info, &summary);
    }

    pub fn log_stage(&self, stage: &Stage) {
        let name = if stage.name.is_empty() { "-" } else { &stage.name };
        let command = stage.command.as_deref().unwrap_or("");
        let started = match (&stage.started_at, self.show_timestamps) {
            (Some(ts), true) => format!("{:02}:{:02}:{:02} ", ts.hour_24, ts.minute, ts.second),
            _ => String::new(),
        };

        if self.use_colors {
            println!(
                "  \x1b[90m{}\x1b[0m\x1b[36m{:<24}\x1b[0m {:>10.3}s  \x1b[37m{}\x1b[0m",
                started, name, stage.duration, command
            );
        } else {
            println!("  {}{:<24} {:>10.3}s  {}", started, name, stage.duration, command);
        }

        let _ = std::io::stdout().flush();
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}
