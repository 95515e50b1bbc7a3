//! Journey domain model
//!
//! ```text
//! +--------------------------- User (aggregate root) ---------------------------+
//! |  stats            journeys[]            completed_resources[]               |
//! |                   Journey (state        CompletedResource                   |
//! |                   machine)              (upsert by id)                      |
//! |                                                                              |
//! |  conversations: ConversationThread[] (append-only messages, frozen context) |
//! +------------------------------------------------------------------------------+
//! ```
//!
//! All mutation goes through [`User`]; nothing here performs I/O. Callers pass the
//! current time explicitly.

pub mod conversation;
pub mod journey;
pub mod stats;
pub mod steps;
pub mod user;
pub mod value_objects;

pub use conversation::{
    ConversationFilter, ConversationSummary, ConversationThread, Conversations, Message, Role,
};
pub use journey::{Journey, JourneyStatus, StepOutcome};
pub use stats::{StatsSummary, average_completion_days, compute_stats};
pub use steps::Step;
pub use user::{
    CompletedResource, Entitlement, ExchangeOutcome, SubscriptionStatus, SubscriptionTier, User,
    UserStats,
};
pub use value_objects::{
    ConversationId, JourneyNumber, ResourceId, STEP_COUNT, SessionId, StepNumber, UserId,
    ValidationError,
};

/// Rule violations raised by the aggregate before any state is changed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    #[error("journey #{0} not found")]
    JourneyNotFound(JourneyNumber),

    #[error("free tier allows a single active journey ({active} already active)")]
    ActiveJourneyLimit { active: usize },

    #[error("cannot {action} journey #{journey} while it is {status}")]
    InvalidTransition {
        journey: JourneyNumber,
        status: JourneyStatus,
        action: &'static str,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}
