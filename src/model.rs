//! Serializable request and response views.
//!
//! Field names are camelCase on the wire. Views hold plain values so that they
//! can be rendered by any outer surface without reaching into the aggregate.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::coaching::{CoachingContext, CrisisResources};
use crate::domain::{
    CompletedResource, ConversationSummary, ConversationThread, Journey, JourneyStatus, Message,
    StatsSummary, Step, StepNumber, User,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub user_id: String,
    pub screen_name: String,
    pub subscription_tier: String,
    pub subscription_status: String,
    pub billing_customer_ref: Option<String>,
    pub journey_count: usize,
    pub conversation_count: usize,
    pub version: u64,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id().as_str().to_string(),
            screen_name: user.screen_name().to_string(),
            subscription_tier: user.subscription_tier().to_string(),
            subscription_status: user.subscription_status().to_string(),
            billing_customer_ref: user.billing_customer_ref().map(str::to_string),
            journey_count: user.journeys().len(),
            conversation_count: user.conversations().len(),
            version: user.version(),
        }
    }
}

/// Status filter for journey listings.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Paused,
    Completed,
}

impl StatusFilter {
    pub fn matches(self, status: JourneyStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Active => status == JourneyStatus::Active,
            StatusFilter::Paused => status == JourneyStatus::Paused,
            StatusFilter::Completed => status == JourneyStatus::Completed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StepRef {
    pub number: u8,
    pub name: String,
}

impl From<StepNumber> for StepRef {
    fn from(number: StepNumber) -> Self {
        Self {
            number: number.value(),
            name: Step::from_number(number).name().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct JourneyView {
    pub journey_number: u32,
    pub resentment_description: String,
    pub current_step: u8,
    pub completed_steps: Vec<u8>,
    pub status: String,
    pub start_date: DateTime<Utc>,
    pub completed_date: Option<DateTime<Utc>>,
    pub progress: u8,
}

impl From<&Journey> for JourneyView {
    fn from(journey: &Journey) -> Self {
        Self {
            journey_number: journey.number().value(),
            resentment_description: journey.resentment_description().to_string(),
            current_step: journey.current_step().value(),
            completed_steps: journey.completed_steps().iter().map(|s| s.value()).collect(),
            status: journey.status().to_string(),
            start_date: journey.start_date(),
            completed_date: journey.completed_date(),
            progress: journey.progress_percent(),
        }
    }
}

/// Result of a step update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StepUpdateView {
    pub journey_number: u32,
    pub current_step: u8,
    pub completed_steps: Vec<u8>,
    pub status: String,
    pub is_complete: bool,
}

impl From<&Journey> for StepUpdateView {
    fn from(journey: &Journey) -> Self {
        Self {
            journey_number: journey.number().value(),
            current_step: journey.current_step().value(),
            completed_steps: journey.completed_steps().iter().map(|s| s.value()).collect(),
            status: journey.status().to_string(),
            is_complete: journey.is_completed(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct JourneyCounts {
    pub total: usize,
    pub active: usize,
    pub completed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct JourneyList {
    pub journeys: Vec<JourneyView>,
    /// Counts over all of the user's journeys, not just the filtered ones.
    pub stats: JourneyCounts,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct JourneyDetail {
    pub journey_number: u32,
    pub resentment_description: String,
    pub current_step: StepRef,
    pub completed_steps: Vec<StepRef>,
    pub status: String,
    pub start_date: DateTime<Utc>,
    pub completed_date: Option<DateTime<Utc>>,
    pub progress: u8,
    pub days_active: i64,
}

impl JourneyDetail {
    pub fn new(journey: &Journey, now: DateTime<Utc>) -> Self {
        Self {
            journey_number: journey.number().value(),
            resentment_description: journey.resentment_description().to_string(),
            current_step: journey.current_step().into(),
            completed_steps: journey.completed_steps().iter().map(|&s| s.into()).collect(),
            status: journey.status().to_string(),
            start_date: journey.start_date(),
            completed_date: journey.completed_date(),
            progress: journey.progress_percent(),
            days_active: journey.days_active(now),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceCompletionView {
    pub resource_id: String,
    pub resource_name: String,
    pub times_completed: u32,
    pub completed_at: DateTime<Utc>,
    /// Distinct resources the user has completed.
    pub total_completed: u32,
}

impl ResourceCompletionView {
    pub fn new(resource: &CompletedResource, total_completed: u32) -> Self {
        Self {
            resource_id: resource.resource_id.as_str().to_string(),
            resource_name: resource.resource_name.clone(),
            times_completed: resource.times_completed,
            completed_at: resource.completed_at,
            total_completed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatsView {
    pub total_journeys: u32,
    pub active_journeys: usize,
    pub paused_journeys: usize,
    pub completed_journeys: usize,
    pub completed_resources: u32,
    pub average_completion_days: i64,
    pub current_streak: u32,
    pub total_ai_conversations: u32,
    pub last_active_date: Option<DateTime<Utc>>,
}

impl From<StatsSummary> for StatsView {
    fn from(summary: StatsSummary) -> Self {
        Self {
            total_journeys: summary.total_journeys,
            active_journeys: summary.active_journeys,
            paused_journeys: summary.paused_journeys,
            completed_journeys: summary.completed_journeys,
            completed_resources: summary.completed_resources,
            average_completion_days: summary.average_completion_days,
            current_streak: summary.current_streak,
            total_ai_conversations: summary.total_ai_conversations,
            last_active_date: summary.last_active_date,
        }
    }
}

// =============================================================================
// CHAT
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub user_id: String,
    pub message: String,
    /// Omitted to open a new session.
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CrisisResourcesView {
    pub suicide_prevention_lifeline: String,
    pub crisis_text_line: String,
    pub message: String,
}

impl From<CrisisResources> for CrisisResourcesView {
    fn from(resources: CrisisResources) -> Self {
        Self {
            suicide_prevention_lifeline: resources.suicide_prevention_lifeline,
            crisis_text_line: resources.crisis_text_line,
            message: resources.message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub message: String,
    pub session_id: String,
    pub is_crisis: bool,
    pub crisis_resources: Option<CrisisResourcesView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatUserContext {
    pub current_step: Option<u8>,
    pub step_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatMetadata {
    pub conversation_id: String,
    pub message_count: usize,
    pub user_context: ChatUserContext,
}

/// Present when the completion provider failed and the fixed reply was used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatFallback {
    pub support_email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub response: ChatResponse,
    /// Absent in fallback mode, where nothing is persisted.
    pub metadata: Option<ChatMetadata>,
    pub fallback: Option<ChatFallback>,
}

// =============================================================================
// CONVERSATIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummaryView {
    pub conversation_id: String,
    pub session_id: String,
    pub message_count: usize,
    pub started_at: DateTime<Utc>,
    pub last_message_at: DateTime<Utc>,
    pub preview: Option<String>,
}

impl From<ConversationSummary> for ConversationSummaryView {
    fn from(summary: ConversationSummary) -> Self {
        Self {
            conversation_id: summary.conversation_id.as_str().to_string(),
            session_id: summary.session_id.as_str().to_string(),
            message_count: summary.message_count,
            started_at: summary.started_at,
            last_message_at: summary.last_message_at,
            preview: summary.preview,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl From<&Message> for MessageView {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role.to_string(),
            content: message.content.clone(),
            timestamp: message.timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationView {
    pub conversation_id: String,
    pub session_id: String,
    pub messages: Vec<MessageView>,
    /// Snapshot taken when the conversation was opened.
    pub context: CoachingContext,
    pub started_at: DateTime<Utc>,
    pub last_message_at: DateTime<Utc>,
}

impl From<&ConversationThread> for ConversationView {
    fn from(thread: &ConversationThread) -> Self {
        Self {
            conversation_id: thread.conversation_id().as_str().to_string(),
            session_id: thread.session_id().as_str().to_string(),
            messages: thread.messages().iter().map(MessageView::from).collect(),
            context: thread.context().clone(),
            started_at: thread.started_at(),
            last_message_at: thread.last_message_at(),
        }
    }
}

// =============================================================================
// GUIDANCE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StepGuidanceView {
    pub step: u8,
    pub step_name: String,
    pub letter: String,
    pub description: String,
}

impl From<Step> for StepGuidanceView {
    fn from(step: Step) -> Self {
        Self {
            step: step.number().value(),
            step_name: step.name().to_string(),
            letter: step.letter().to_string(),
            description: step.guidance().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SupportJourneyView {
    pub number: u32,
    pub resentment: String,
    pub completed_steps: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct JourneySupportView {
    #[serde(flatten)]
    pub guidance: StepGuidanceView,
    pub journey: SupportJourneyView,
}
