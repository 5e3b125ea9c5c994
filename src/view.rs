//! The three text fields of the status page and how engine events change them.

use crate::model::{SimEvent, STATUS_COMPLETE, STATUS_IN_PROGRESS, STATUS_WAITING};

/// Message shown when the population input is not a non-negative integer.
pub const INVALID_POPULATION: &str = "Population size must be a non-negative integer.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    pub status: String,
    pub building: String,
    pub error: String,
    pub polls: u64,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            status: STATUS_WAITING.to_string(),
            building: String::new(),
            error: String::new(),
            polls: 0,
        }
    }
}

impl ViewState {
    pub fn apply(&mut self, ev: &SimEvent) {
        match ev {
            SimEvent::LaunchStarted { .. } => {
                self.status = STATUS_IN_PROGRESS.to_string();
                self.error.clear();
                self.polls = 0;
            }
            SimEvent::Launched { .. } => {}
            SimEvent::LaunchFailed { message } => {
                self.error = message.clone();
                self.status = STATUS_WAITING.to_string();
            }
            SimEvent::Building {
                building_text,
                complete,
            } => {
                self.polls += 1;
                self.building = building_text.clone();
                if *complete {
                    self.status = STATUS_COMPLETE.to_string();
                }
            }
            // Poll failures leave the fields as they were.
            SimEvent::PollFailed { .. } | SimEvent::Info(_) => {}
        }
    }

    /// Local rejection of a population value that could not be parsed. A run that is
    /// still in progress keeps its status.
    pub fn reject_input(&mut self) {
        self.error = INVALID_POPULATION.to_string();
        if !self.is_in_progress() {
            self.status = STATUS_WAITING.to_string();
        }
    }

    pub fn is_in_progress(&self) -> bool {
        self.status == STATUS_IN_PROGRESS
    }

    pub fn is_complete(&self) -> bool {
        self.status == STATUS_COMPLETE
    }
}

/// Parse the population field. Surrounding whitespace is ignored.
pub fn parse_population(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok()
}
