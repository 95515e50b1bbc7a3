//! The fixed seven-step RELEASE method.
//!
//! Pure constant data: names, acronym letters, one-line focus descriptions and
//! the longer guidance text shown for a step.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoEnumIterator};

use super::value_objects::StepNumber;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Step {
    Recognize = 1,
    Examine,
    Learn,
    Embrace,
    Affirm,
    Sustain,
    Evolve,
}

impl Step {
    /// Step at a 1-based position.
    pub fn from_number(number: StepNumber) -> Step {
        match number.value() {
            1 => Step::Recognize,
            2 => Step::Examine,
            3 => Step::Learn,
            4 => Step::Embrace,
            5 => Step::Affirm,
            6 => Step::Sustain,
            _ => Step::Evolve,
        }
    }

    pub fn number(self) -> StepNumber {
        StepNumber::from_raw(self as u8)
    }

    /// Human-readable name, e.g. "Recognize".
    pub fn name(self) -> &'static str {
        match self {
            Step::Recognize => "Recognize",
            Step::Examine => "Examine",
            Step::Learn => "Learn",
            Step::Embrace => "Embrace",
            Step::Affirm => "Affirm",
            Step::Sustain => "Sustain",
            Step::Evolve => "Evolve",
        }
    }

    /// Letter this step contributes to the RELEASE acronym.
    pub fn letter(self) -> char {
        match self {
            Step::Recognize => 'R',
            Step::Examine | Step::Embrace | Step::Evolve => 'E',
            Step::Learn => 'L',
            Step::Affirm => 'A',
            Step::Sustain => 'S',
        }
    }

    pub fn focus(self) -> &'static str {
        match self {
            Step::Recognize => "Identify and acknowledge resentments",
            Step::Examine => "Explore roots and patterns",
            Step::Learn => "Practice cognitive reframing techniques",
            Step::Embrace => "Shift perspective and find understanding",
            Step::Affirm => "Create personal affirmations",
            Step::Sustain => "Develop maintenance practices",
            Step::Evolve => "Integrate growth and wisdom",
        }
    }

    pub fn guidance(self) -> &'static str {
        match self {
            Step::Recognize => {
                "In the Recognize step, acknowledge your resentment without judgment. Name it, identify who it's toward, and how it affects you physically and emotionally."
            }
            Step::Examine => {
                "In the Examine step, explore the roots of your resentment. When did it start? What patterns do you notice? What unmet needs or values are involved?"
            }
            Step::Learn => {
                "In the Learn step, practice cognitive reframing. Challenge thoughts like 'always' and 'never'. Look for alternative perspectives and more balanced views."
            }
            Step::Embrace => {
                "In the Embrace step, work on shifting your perspective. Try to understand the other person's viewpoint, their struggles, and their humanity."
            }
            Step::Affirm => {
                "In the Affirm step, create personal affirmations that support your healing. Replace old narratives with empowering truths about yourself and forgiveness."
            }
            Step::Sustain => {
                "In the Sustain step, develop practices to maintain your progress. Create daily rituals, identify triggers, and build a support system."
            }
            Step::Evolve => {
                "In the Evolve step, integrate what you've learned. Recognize your growth, share your wisdom, and celebrate your transformation."
            }
        }
    }

    pub fn all() -> impl Iterator<Item = Step> {
        Step::iter()
    }
}
