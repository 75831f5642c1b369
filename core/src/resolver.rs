use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Stage name to the ordered shell commands configured for it.
///
/// Entries keep the order they were inserted (or written in the config
/// file), which is the order [`resolve_name`] scans them in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildConfig {
    stages: Vec<(String, Vec<String>)>,
}

impl BuildConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stage<S: Into<String>>(mut self, name: &str, commands: Vec<S>) -> Self {
        self.insert(name, commands.into_iter().map(Into::into).collect());
        self
    }

    /// Replaces the commands of an existing stage in place, or appends a new one.
    pub fn insert(&mut self, name: &str, commands: Vec<String>) {
        match self.stages.iter_mut().find(|(stage, _)| stage == name) {
            Some((_, existing)) => *existing = commands,
            None => self.stages.push((name.to_string(), commands)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.stages
            .iter()
            .find(|(stage, _)| stage == name)
            .map(|(_, commands)| commands.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.stages
            .iter()
            .map(|(stage, commands)| (stage.as_str(), commands.as_slice()))
    }

    pub fn merge_with(mut self, other: BuildConfig) -> Self {
        for (name, commands) in other.stages {
            self.insert(&name, commands);
        }
        self
    }
}

/// Maps a bare shell command back to `<stage>.<n>`, where `n` is the 1-based
/// position of the command in that stage's list. The first stage listing the
/// command wins. Returns an empty string when nothing matches.
pub fn resolve_name(command: &str, build_config: &BuildConfig) -> String {
    if command.is_empty() || build_config.is_empty() {
        return String::new();
    }

    build_config
        .iter()
        .find_map(|(stage, commands)| {
            commands
                .iter()
                .position(|configured| configured == command)
                .map(|index| format!("{}.{}", stage, index + 1))
        })
        .unwrap_or_default()
}

impl Serialize for BuildConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.stages.len()))?;
        for (stage, commands) in &self.stages {
            map.serialize_entry(stage, commands)?;
        }
        map.end()
    }
}

struct BuildConfigVisitor;

impl<'de> Visitor<'de> for BuildConfigVisitor {
    type Value = BuildConfig;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a table of stage names to command lists")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut config = BuildConfig::new();
        while let Some((stage, commands)) = access.next_entry::<String, Vec<String>>()? {
            config.insert(&stage, commands);
        }
        Ok(config)
    }
}

impl<'de> Deserialize<'de> for BuildConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(BuildConfigVisitor)
    }
}
