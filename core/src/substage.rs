use tracing::{debug, warn};

use crate::parser::tags::{
    TagFields, COMMAND, DURATION, END_HASH, END_STAGE, END_SUBSTAGE, FINISH_TIMESTAMP,
    START_HASH, START_STAGE, START_SUBSTAGE, START_TIMESTAMP,
};
use crate::stage::Stage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubstageState {
    Empty,
    Started,
    Finished,
    FinishedIncomplete,
}

impl SubstageState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SubstageState::Finished | SubstageState::FinishedIncomplete)
    }
}

/// One in-flight unit of a job log. Absorbs tag fields in any order until a
/// terminating tag closes it. Each field category can only be written once.
#[derive(Debug, Clone)]
pub struct Substage {
    stage: Stage,
    timing_hash: String,
    state: SubstageState,
}

impl Default for Substage {
    fn default() -> Self {
        Self::new()
    }
}

impl Substage {
    pub fn new() -> Self {
        Self {
            stage: Stage::new(),
            timing_hash: String::new(),
            state: SubstageState::Empty,
        }
    }

    pub fn state(&self) -> SubstageState {
        self.state
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn timing_hash(&self) -> &str {
        &self.timing_hash
    }

    /// Routes the fields of one tag to the matching handler.
    pub fn process_parsed_tags(&mut self, tags: &TagFields) -> bool {
        if tags.contains(START_STAGE) {
            self.process_start_stage(tags)
        } else if tags.contains(START_HASH) {
            self.process_start_time(tags)
        } else if tags.contains(COMMAND) {
            self.process_command(tags)
        } else if tags.contains(END_HASH) {
            self.process_end_time(tags)
        } else if tags.contains(END_STAGE) {
            self.process_end_stage(tags)
        } else {
            false
        }
    }

    pub fn process_start_stage(&mut self, tags: &TagFields) -> bool {
        if self.state.is_terminal() || self.has_name() {
            return false;
        }

        let (Some(stage), Some(substage)) = (tags.get(START_STAGE), tags.get(START_SUBSTAGE))
        else {
            return false;
        };

        self.stage.set_name(format!("{stage}.{substage}"));
        self.state = SubstageState::Started;
        debug!(name = %self.stage.name, "substage started");
        true
    }

    pub fn process_start_time(&mut self, tags: &TagFields) -> bool {
        if self.state.is_terminal() || self.has_timing_hash() {
            return false;
        }

        let Some(hash) = tags.get(START_HASH).filter(|hash| !hash.is_empty()) else {
            return false;
        };

        self.timing_hash = hash.to_string();
        self.state = SubstageState::Started;
        debug!(hash = %self.timing_hash, "substage timing started");
        true
    }

    pub fn process_command(&mut self, tags: &TagFields) -> bool {
        if self.state.is_terminal() || self.has_command() {
            return false;
        }

        let Some(command) = tags.get(COMMAND).filter(|command| !command.is_empty()) else {
            return false;
        };

        self.stage.set_command(command);

        // A bare command outside any fold or timing pair can never receive
        // a terminator, so it is closed as soon as it is seen.
        self.state = if !self.has_name() && !self.has_timing_hash() {
            SubstageState::Finished
        } else {
            SubstageState::Started
        };
        true
    }

    pub fn process_end_time(&mut self, tags: &TagFields) -> bool {
        if self.state.is_terminal() {
            return false;
        }

        if !tags.contains_all(&[END_HASH, START_TIMESTAMP, FINISH_TIMESTAMP, DURATION]) {
            return false;
        }

        let end_hash = tags.get(END_HASH).unwrap_or_default();
        if !self.has_timing_hash() || self.timing_hash != end_hash {
            warn!(
                expected = %self.timing_hash,
                found = %end_hash,
                "timing tag does not match its start, dropping substage"
            );
            self.state = SubstageState::FinishedIncomplete;
            return false;
        }

        self.stage
            .set_started_at_nano(tags.get(START_TIMESTAMP).unwrap_or_default());
        self.stage
            .set_finished_at_nano(tags.get(FINISH_TIMESTAMP).unwrap_or_default());
        self.stage
            .set_duration_nano(tags.get(DURATION).unwrap_or_default());

        // an unnamed unit closes only once its finish time is known
        if !self.has_name() && self.stage.has_finished_at() {
            self.state = SubstageState::Finished;
        }
        debug!(hash = %self.timing_hash, duration = self.stage.duration, "substage timed");
        true
    }

    pub fn process_end_stage(&mut self, tags: &TagFields) -> bool {
        if self.state.is_terminal() {
            return false;
        }

        let (Some(stage), Some(substage)) = (tags.get(END_STAGE), tags.get(END_SUBSTAGE)) else {
            return false;
        };

        let end_name = format!("{stage}.{substage}");
        if !self.has_name() || self.stage.name != end_name {
            warn!(
                expected = %self.stage.name,
                found = %end_name,
                "fold end does not match its start, dropping substage"
            );
            self.state = SubstageState::FinishedIncomplete;
            return false;
        }

        self.state = SubstageState::Finished;
        debug!(name = %self.stage.name, "substage finished");
        true
    }

    /// Fills in a name resolved elsewhere, for units that never had a fold tag.
    pub fn set_name(&mut self, name: impl Into<String>) -> bool {
        if self.has_name() {
            return false;
        }
        self.stage.set_name(name);
        true
    }

    pub fn has_name(&self) -> bool {
        !self.stage.name.is_empty()
    }

    pub fn has_timing_hash(&self) -> bool {
        !self.timing_hash.is_empty()
    }

    pub fn has_command(&self) -> bool {
        self.stage.command.as_deref().is_some_and(|c| !c.is_empty())
    }

    pub fn has_started(&self) -> bool {
        self.has_name() || self.has_timing_hash() || self.has_command()
    }

    pub fn has_finished(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn finished_incomplete(&self) -> bool {
        self.state == SubstageState::FinishedIncomplete
    }

    pub fn into_stage(self) -> Stage {
        self.stage
    }
}
