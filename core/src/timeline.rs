use serde::{Deserialize, Serialize};

use crate::stage::Stage;
use crate::timestamp::SplitTimestamp;

/// Finished stages of one job in the order they were detected, with the
/// earliest start and latest finish seen so far.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    stages: Vec<Stage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    started_at: Option<SplitTimestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    finished_at: Option<SplitTimestamp>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_stage(&mut self, stage: Stage) {
        if let Some(started_at) = &stage.started_at {
            if self
                .started_at
                .as_ref()
                .map_or(true, |current| started_at.is_before(current))
            {
                self.started_at = Some(started_at.clone());
            }
        }

        if let Some(finished_at) = &stage.finished_at {
            if self
                .finished_at
                .as_ref()
                .map_or(true, |current| finished_at.is_after(current))
            {
                self.finished_at = Some(finished_at.clone());
            }
        }

        self.stages.push(stage);
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn started_at(&self) -> Option<&SplitTimestamp> {
        self.started_at.as_ref()
    }

    pub fn finished_at(&self) -> Option<&SplitTimestamp> {
        self.finished_at.as_ref()
    }

    pub fn total_duration(&self) -> f64 {
        self.stages.iter().map(|stage| stage.duration).sum()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Stage> {
        self.stages.iter()
    }
}

impl<'a> IntoIterator for &'a Timeline {
    type Item = &'a Stage;
    type IntoIter = std::slice::Iter<'a, Stage>;

    fn into_iter(self) -> Self::IntoIter {
        self.stages.iter()
    }
}
