//! Projection of a user into the coaching context, and rendering of the
//! system instructions handed to the completion provider.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use super::crisis::{CRISIS_TEXT_LINE, SUICIDE_PREVENTION_LIFELINE};
use crate::domain::{Journey, JourneyNumber, Step, StepNumber, SubscriptionTier, User};

/// User-level facts every context carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileContext {
    pub screen_name: String,
    pub subscription_tier: SubscriptionTier,
    pub total_journeys: u32,
    pub completed_journeys: u32,
    pub completed_resources: u32,
    pub current_streak: u32,
}

/// Facts about the journey the user is currently working on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JourneyContext {
    pub journey_number: JourneyNumber,
    pub current_step: StepNumber,
    pub completed_steps: Vec<StepNumber>,
    pub resentment_description: String,
}

impl JourneyContext {
    pub fn current_step_kind(&self) -> Step {
        Step::from_number(self.current_step)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CoachingContext {
    Bare {
        profile: ProfileContext,
    },
    WithJourney {
        profile: ProfileContext,
        journey: JourneyContext,
    },
}

impl CoachingContext {
    pub fn profile(&self) -> &ProfileContext {
        match self {
            CoachingContext::Bare { profile } | CoachingContext::WithJourney { profile, .. } => {
                profile
            }
        }
    }

    pub fn journey(&self) -> Option<&JourneyContext> {
        match self {
            CoachingContext::Bare { .. } => None,
            CoachingContext::WithJourney { journey, .. } => Some(journey),
        }
    }
}

pub fn build_context(user: &User, active_journey: Option<&Journey>) -> CoachingContext {
    let stats = user.stats();
    let profile = ProfileContext {
        screen_name: user.screen_name().to_string(),
        subscription_tier: user.subscription_tier(),
        total_journeys: stats.total_journeys_started,
        completed_journeys: stats.total_journeys_completed,
        completed_resources: stats.total_resources_completed,
        current_streak: stats.current_streak,
    };

    match active_journey {
        None => CoachingContext::Bare { profile },
        Some(journey) => CoachingContext::WithJourney {
            profile,
            journey: JourneyContext {
                journey_number: journey.number(),
                current_step: journey.current_step(),
                completed_steps: journey.completed_steps().iter().copied().collect(),
                resentment_description: journey.resentment_description().to_string(),
            },
        },
    }
}

const GUIDELINES: &[&str] = &[
    "Be empathetic, warm, and non-judgmental",
    "Use \"I understand\" not \"I know\"",
    "Offer choices, not commands",
    "Validate emotions first, then guide",
    "Keep responses concise (2-3 paragraphs max)",
    "End with a question or gentle action suggestion",
    "Focus on the user's current step in their journey",
    "Remind them that forgiveness is for their freedom, not about the other person",
    "Never diagnose mental health conditions",
    "If detecting crisis language, immediately provide crisis resources",
];

/// Renders the system instructions for a context. Output depends only on `context`.
pub fn render_instructions(context: &CoachingContext) -> String {
    let profile = context.profile();
    let mut out = String::with_capacity(2048);

    out.push_str(
        "You are a compassionate forgiveness coach for the RELEASE Resentments app. \
         You help users work through resentments using the 7-step RELEASE method:\n\n",
    );
    for step in Step::all() {
        let _ = writeln!(out, "{} - {}: {}", step.letter(), step.name(), step.focus());
    }

    out.push_str("\nCurrent User Context:\n");
    let _ = writeln!(out, "- Screen Name: {}", profile.screen_name);
    let _ = writeln!(out, "- Subscription: {}", profile.subscription_tier);
    let _ = writeln!(out, "- Total Journeys Started: {}", profile.total_journeys);
    let _ = writeln!(out, "- Completed Journeys: {}", profile.completed_journeys);

    if let Some(journey) = context.journey() {
        let completed = if journey.completed_steps.is_empty() {
            "none yet".to_string()
        } else {
            journey
                .completed_steps
                .iter()
                .map(|step| step.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };
        let _ = writeln!(out, "- Current Journey: #{}", journey.journey_number);
        let _ = writeln!(
            out,
            "- Current Step: {} ({})",
            journey.current_step,
            journey.current_step_kind().name()
        );
        let _ = writeln!(out, "- Working on: {}", journey.resentment_description);
        let _ = writeln!(out, "- Completed Steps: {}", completed);
    }

    out.push_str("\nGuidelines:\n");
    for guideline in GUIDELINES {
        let _ = writeln!(out, "- {}", guideline);
    }

    out.push_str(
        "\nCRITICAL: If you detect self-harm, suicide ideation, or harm to others, immediately provide:\n",
    );
    let _ = writeln!(
        out,
        "National Suicide Prevention Lifeline: {}",
        SUICIDE_PREVENTION_LIFELINE
    );
    let _ = writeln!(out, "Crisis Text Line: {}", CRISIS_TEXT_LINE);
    out.push_str("And encourage them to seek immediate professional help.\n\n");
    out.push_str(
        "Maintain a therapeutic but accessible tone - you're a supportive coach, not a replacement for therapy.",
    );

    out
}
