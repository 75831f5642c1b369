use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::resolver::BuildConfig;

pub const CONFIG_FILE_NAME: &str = "buildtime.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub commands: BuildConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_max_jobs")]
    pub max_jobs: usize,
    #[serde(default = "default_storage_path")]
    pub storage_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_true")]
    pub show_timestamps: bool,
    #[serde(default = "default_true")]
    pub colors: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_jobs: default_max_jobs(),
            storage_path: default_storage_path(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            show_timestamps: true,
            colors: true,
        }
    }
}

fn default_max_jobs() -> usize {
    50
}

fn default_storage_path() -> String {
    "~/.local/share/buildtime/jobs.json".to_string()
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Project config (explicit path, or `buildtime.toml` in `source_dir`)
    /// layered over the global one.
    pub fn load(source_dir: &Path, explicit: Option<&Path>) -> anyhow::Result<Self> {
        let project_path = match explicit {
            Some(path) => path.to_path_buf(),
            None => source_dir.join(CONFIG_FILE_NAME),
        };

        if explicit.is_some() && !Self::expand_path(&project_path.to_string_lossy()).exists() {
            anyhow::bail!("Config file not found: {}", project_path.display());
        }

        Config::load_layered(&Config::global_path(), &project_path)
    }

    /// Scalar sections come from the last file that exists; stage commands
    /// are merged stage by stage.
    pub fn load_layered(global_path: &Path, project_path: &Path) -> anyhow::Result<Self> {
        let global = Config::load_optional(global_path)?;
        let project = Config::load_optional(project_path)?;

        Ok(match (global, project) {
            (Some(global), Some(project)) => global.merge_with(project),
            (Some(config), None) | (None, Some(config)) => config,
            (None, None) => Config::default(),
        })
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        Ok(Self::load_optional(path)?.unwrap_or_default())
    }

    /// `None` when the file does not exist.
    pub fn load_optional<P: AsRef<Path>>(path: P) -> anyhow::Result<Option<Self>> {
        let path = Self::expand_path(&path.as_ref().to_string_lossy());

        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(Some(config))
    }

    /// `other` wins for scalar settings; its stage commands replace ours
    /// stage by stage.
    pub fn merge_with(mut self, other: Config) -> Self {
        self.history = other.history;
        self.display = other.display;
        self.commands = self.commands.merge_with(other.commands);
        self
    }

    pub fn global_path() -> PathBuf {
        Self::expand_path("~/.config/buildtime/buildtime.toml")
    }

    pub fn expand_path(path: &str) -> PathBuf {
        let expanded = shellexpand::tilde(path);
        PathBuf::from(expanded.as_ref())
    }

    pub fn storage_path(&self) -> PathBuf {
        Self::expand_path(&self.history.storage_path)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    pub fn template() -> Self {
        Self {
            commands: BuildConfig::new()
                .with_stage("install", vec!["pip install -r requirements.txt"])
                .with_stage("script", vec!["pytest"]),
            ..Self::default()
        }
    }
}
