use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static WORKER_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Using worker:\s*(?P<hostname>[^:\r\n]+):(?P<os>[^\r\n]+)").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerInfo {
    pub hostname: String,
    pub os: String,
}

impl WorkerInfo {
    pub fn parse_line(line: &str) -> Option<Self> {
        let caps = WORKER_TAG.captures(line)?;
        let hostname = caps.name("hostname")?.as_str().trim();
        let os = caps.name("os")?.as_str().trim();

        if hostname.is_empty() || os.is_empty() {
            return None;
        }

        Some(Self {
            hostname: hostname.to_string(),
            os: os.to_string(),
        })
    }
}
