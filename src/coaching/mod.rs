//! Pure helpers used inline on the chat path: context projection, instruction
//! rendering and crisis screening.

pub mod context;
pub mod crisis;

pub use context::{
    CoachingContext, JourneyContext, ProfileContext, build_context, render_instructions,
};
pub use crisis::{
    CRISIS_TEXT_LINE, CrisisDetector, CrisisResources, EMERGENCY_MESSAGE,
    SUICIDE_PREVENTION_LIFELINE,
};
