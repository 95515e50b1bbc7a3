//! Journey state machine.
//!
//! ```text
//!            start
//!              │
//!              ▼
//!   ┌──────► active ◄──────┐
//!   │          │  pause    │ resume
//!   │          └────► paused
//!   │
//!   └─ 7th distinct step marked done ──► completed (absorbing)
//! ```

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::DomainError;
use super::steps::Step;
use super::value_objects::{JourneyNumber, STEP_COUNT, StepNumber};

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum JourneyStatus {
    Active,
    Paused,
    Completed,
}

/// What a step update did to the journey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepOutcome {
    /// The step was not in the completed set before this call.
    pub newly_marked: bool,
    /// `current_step` moved forward automatically.
    pub advanced: bool,
    /// This call moved the journey into `completed`.
    pub journey_completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Journey {
    number: JourneyNumber,
    resentment_description: String,
    current_step: StepNumber,
    completed_steps: BTreeSet<StepNumber>,
    status: JourneyStatus,
    start_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    completed_date: Option<DateTime<Utc>>,
}

impl Journey {
    pub(crate) fn start(
        number: JourneyNumber,
        resentment_description: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            number,
            resentment_description,
            current_step: StepNumber::FIRST,
            completed_steps: BTreeSet::new(),
            status: JourneyStatus::Active,
            start_date: now,
            completed_date: None,
        }
    }

    pub fn number(&self) -> JourneyNumber {
        self.number
    }

    pub fn resentment_description(&self) -> &str {
        &self.resentment_description
    }

    pub fn current_step(&self) -> StepNumber {
        self.current_step
    }

    pub fn current_step_kind(&self) -> Step {
        Step::from_number(self.current_step)
    }

    /// Completed steps in ascending order.
    pub fn completed_steps(&self) -> &BTreeSet<StepNumber> {
        &self.completed_steps
    }

    pub fn status(&self) -> JourneyStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == JourneyStatus::Active
    }

    pub fn is_completed(&self) -> bool {
        self.status == JourneyStatus::Completed
    }

    pub fn start_date(&self) -> DateTime<Utc> {
        self.start_date
    }

    pub fn completed_date(&self) -> Option<DateTime<Utc>> {
        self.completed_date
    }

    /// Applies a step update.
    ///
    /// With `completed == false` this is free navigation: any step may be selected,
    /// including on a completed journey. With `completed == true` the step is added to
    /// the completed set (idempotent), the journey auto-advances when the marked step is
    /// the current one, and the seventh distinct step completes the journey exactly once.
    pub(crate) fn apply_step(
        &mut self,
        step: StepNumber,
        completed: bool,
        now: DateTime<Utc>,
    ) -> StepOutcome {
        if !completed {
            self.current_step = step;
            return StepOutcome::default();
        }

        let mut outcome = StepOutcome {
            newly_marked: self.completed_steps.insert(step),
            ..StepOutcome::default()
        };

        if step == self.current_step {
            if let Some(next) = step.next() {
                self.current_step = next;
                outcome.advanced = true;
            }
        }

        if self.completed_steps.len() == STEP_COUNT as usize && !self.is_completed() {
            self.status = JourneyStatus::Completed;
            self.completed_date = Some(now);
            outcome.journey_completed = true;
        }

        outcome
    }

    pub(crate) fn pause(&mut self) -> Result<(), DomainError> {
        match self.status {
            JourneyStatus::Completed => Err(self.invalid_transition("pause")),
            _ => {
                self.status = JourneyStatus::Paused;
                Ok(())
            }
        }
    }

    pub(crate) fn resume(&mut self) -> Result<(), DomainError> {
        match self.status {
            JourneyStatus::Completed => Err(self.invalid_transition("resume")),
            _ => {
                self.status = JourneyStatus::Active;
                Ok(())
            }
        }
    }

    /// Share of the method completed, rounded to a whole percent.
    pub fn progress_percent(&self) -> u8 {
        let ratio = self.completed_steps.len() as f64 / STEP_COUNT as f64;
        (ratio * 100.0).round() as u8
    }

    /// Whole days from start until completion, or until `now` while still open.
    pub fn days_active(&self, now: DateTime<Utc>) -> i64 {
        ceil_days(self.start_date, self.completed_date.unwrap_or(now))
    }

    fn invalid_transition(&self, action: &'static str) -> DomainError {
        DomainError::InvalidTransition {
            journey: self.number,
            status: self.status,
            action,
        }
    }
}

/// Elapsed time rounded up to whole days. Non-positive spans count as zero.
pub fn ceil_days(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    let millis = (to - from).num_milliseconds();
    if millis <= 0 {
        return 0;
    }
    (millis + MILLIS_PER_DAY - 1) / MILLIS_PER_DAY
}
