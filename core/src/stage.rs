use std::fmt;

use serde::{Deserialize, Serialize};

use crate::timestamp::SplitTimestamp;

const NANOS_PER_SECOND: f64 = 1_000_000_000.0;

/// A timed unit of a build job, as reconstructed from the job log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default)]
    pub duration: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<SplitTimestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<SplitTimestamp>,
}

impl Stage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn set_command(&mut self, command: impl Into<String>) {
        self.command = Some(command.into());
    }

    /// Duration in seconds. Negative or non-finite values are refused.
    pub fn set_duration(&mut self, duration: f64) -> bool {
        if !duration.is_finite() || duration < 0.0 {
            return false;
        }
        self.duration = duration;
        true
    }

    pub fn set_duration_nano(&mut self, nanos: &str) -> bool {
        match parse_nanos(nanos) {
            Some(n) if n >= 0 => self.set_duration(n as f64 / NANOS_PER_SECOND),
            _ => false,
        }
    }

    pub fn set_started_at(&mut self, isotimestamp: &str) -> bool {
        set_iso(&mut self.started_at, isotimestamp)
    }

    pub fn set_started_at_nano(&mut self, nanos: &str) -> bool {
        set_nanos(&mut self.started_at, nanos)
    }

    pub fn set_finished_at(&mut self, isotimestamp: &str) -> bool {
        set_iso(&mut self.finished_at, isotimestamp)
    }

    pub fn set_finished_at_nano(&mut self, nanos: &str) -> bool {
        set_nanos(&mut self.finished_at, nanos)
    }

    pub fn has_started_at(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn has_finished_at(&self) -> bool {
        self.finished_at.is_some()
    }
}

fn parse_nanos(value: &str) -> Option<i64> {
    value.trim().parse::<i64>().ok()
}

fn set_nanos(slot: &mut Option<SplitTimestamp>, nanos: &str) -> bool {
    match parse_nanos(nanos) {
        Some(n) => {
            *slot = Some(SplitTimestamp::from_nanos(n));
            true
        }
        None => false,
    }
}

fn set_iso(slot: &mut Option<SplitTimestamp>, isotimestamp: &str) -> bool {
    match SplitTimestamp::parse_iso(isotimestamp) {
        Ok(ts) => {
            *slot = Some(ts);
            true
        }
        Err(_) => false,
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = if self.name.is_empty() { "-" } else { &self.name };
        write!(f, "{} ({:.3}s)", name, self.duration)?;
        if let Some(command) = &self.command {
            write!(f, " $ {}", command)?;
        }
        Ok(())
    }
}
