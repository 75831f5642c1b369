use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;

pub const END_HASH: &str = "end_hash";
pub const START_TIMESTAMP: &str = "start_timestamp";
pub const FINISH_TIMESTAMP: &str = "finish_timestamp";
pub const DURATION: &str = "duration";
pub const END_STAGE: &str = "end_stage";
pub const END_SUBSTAGE: &str = "end_substage";
pub const START_STAGE: &str = "start_stage";
pub const START_SUBSTAGE: &str = "start_substage";
pub const START_HASH: &str = "start_hash";
pub const COMMAND: &str = "command";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    TimingEnd,
    FoldEnd,
    FoldStart,
    TimingStart,
    Command,
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            TagKind::TimingEnd => "timing-end",
            TagKind::FoldEnd => "fold-end",
            TagKind::FoldStart => "fold-start",
            TagKind::TimingStart => "timing-start",
            TagKind::Command => "command",
        };

        write!(f, "{value}")
    }
}

/// Named fields extracted from one tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFields {
    fields: BTreeMap<String, String>,
}

impl TagFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.fields.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn contains_all(&self, keys: &[&str]) -> bool {
        keys.iter().all(|key| self.contains(key))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

pub struct TagPattern {
    pub kind: TagKind,
    regex: Regex,
    fields: &'static [&'static str],
}

impl TagPattern {
    fn new(kind: TagKind, pattern: &str, fields: &'static [&'static str]) -> Self {
        Self {
            kind,
            regex: Regex::new(pattern).unwrap(),
            fields,
        }
    }

    pub fn captures(&self, line: &str) -> Option<TagFields> {
        let caps = self.regex.captures(line)?;
        let mut tags = TagFields::new();

        for field in self.fields {
            if let Some(value) = caps.name(field) {
                tags.insert(field, value.as_str());
            }
        }

        Some(tags)
    }
}

/// Tag patterns in priority order.
pub static TAG_PATTERNS: Lazy<Vec<TagPattern>> = Lazy::new(|| {
    vec![
        TagPattern::new(
            TagKind::TimingEnd,
            r"travis_time:end:(?P<end_hash>\w+):start=(?P<start_timestamp>\d+),finish=(?P<finish_timestamp>\d+),duration=(?P<duration>\d+)\r\x1b",
            &[END_HASH, START_TIMESTAMP, FINISH_TIMESTAMP, DURATION],
        ),
        TagPattern::new(
            TagKind::FoldEnd,
            r"travis_fold:end:(?P<end_stage>\w+)\.(?P<end_substage>\d+)\r\x1b",
            &[END_STAGE, END_SUBSTAGE],
        ),
        TagPattern::new(
            TagKind::FoldStart,
            r"travis_fold:start:(?P<start_stage>\w+)\.(?P<start_substage>\d+)",
            &[START_STAGE, START_SUBSTAGE],
        ),
        TagPattern::new(
            TagKind::TimingStart,
            r"travis_time:start:(?P<start_hash>\w+)",
            &[START_HASH],
        ),
        // the prompt echo may directly follow an erase-line escape
        TagPattern::new(
            TagKind::Command,
            r"(?:^|\x1b\[0K)\$ (?P<command>[^\r\n]*)",
            &[COMMAND],
        ),
    ]
});

/// First matching tag on the line, if any.
pub fn match_line(line: &str) -> Option<(TagKind, TagFields)> {
    TAG_PATTERNS
        .iter()
        .find_map(|pattern| pattern.captures(line).map(|tags| (pattern.kind, tags)))
}

/// Every tag found on the line, in priority order.
pub fn match_all(line: &str) -> Vec<(TagKind, TagFields)> {
    TAG_PATTERNS
        .iter()
        .filter_map(|pattern| pattern.captures(line).map(|tags| (pattern.kind, tags)))
        .collect()
}
