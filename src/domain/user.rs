//! The user aggregate root.
//!
//! A [`User`] exclusively owns its journeys, completed-resource ledger and
//! conversation threads. Every mutation goes through the aggregate so that
//! cross-entity invariants hold:
//!
//! - `stats.total_journeys_started` equals the number of journeys ever created
//!   and is the source of the next journey number
//! - a free-tier user has at most one `active` journey when starting another
//! - a resource appears at most once in the ledger
//!
//! `version` is the optimistic-concurrency stamp maintained by the user store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::DomainError;
use super::conversation::Conversations;
use super::journey::{Journey, JourneyStatus, StepOutcome};
use super::value_objects::{
    ConversationId, JourneyNumber, ResourceId, SessionId, StepNumber, UserId, ValidationError,
};
use crate::coaching::CoachingContext;

const MAX_DESCRIPTION_LENGTH: usize = 2000;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SubscriptionTier {
    #[default]
    Free,
    Premium,
}

/// Billing-side subscription state. Opaque to the engine; only the billing
/// provider interprets it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SubscriptionStatus {
    #[default]
    None,
    Active,
    Trialing,
    PastDue,
    Canceled,
}

/// Result of the billing provider's premium check, as the aggregate sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entitlement {
    Free,
    Premium,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    pub total_journeys_started: u32,
    pub total_journeys_completed: u32,
    pub total_resources_completed: u32,
    pub total_ai_conversations: u32,
    pub current_streak: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_active_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedResource {
    pub resource_id: ResourceId,
    pub resource_name: String,
    pub times_completed: u32,
    pub completed_at: DateTime<Utc>,
}

/// What a persisted chat exchange did to the user's conversation log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeOutcome {
    pub conversation_id: ConversationId,
    pub message_count: usize,
    /// The exchange opened a new thread.
    pub opened: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    id: UserId,
    screen_name: String,
    #[serde(default)]
    subscription_tier: SubscriptionTier,
    #[serde(default)]
    subscription_status: SubscriptionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    billing_customer_ref: Option<String>,
    #[serde(default)]
    stats: UserStats,
    #[serde(default)]
    journeys: Vec<Journey>,
    #[serde(default)]
    completed_resources: Vec<CompletedResource>,
    #[serde(default)]
    conversations: Conversations,
    #[serde(default)]
    version: u64,
}

impl User {
    pub fn new(id: UserId, screen_name: impl Into<String>) -> Self {
        Self {
            id,
            screen_name: screen_name.into(),
            subscription_tier: SubscriptionTier::Free,
            subscription_status: SubscriptionStatus::None,
            billing_customer_ref: None,
            stats: UserStats::default(),
            journeys: Vec::new(),
            completed_resources: Vec::new(),
            conversations: Conversations::default(),
            version: 0,
        }
    }

    pub fn with_subscription(mut self, tier: SubscriptionTier, status: SubscriptionStatus) -> Self {
        self.set_subscription(tier, status);
        self
    }

    pub fn with_billing_customer_ref(mut self, reference: impl Into<String>) -> Self {
        self.billing_customer_ref = Some(reference.into());
        self
    }

    pub fn id(&self) -> &UserId {
        &self.id
    }

    pub fn screen_name(&self) -> &str {
        &self.screen_name
    }

    pub fn subscription_tier(&self) -> SubscriptionTier {
        self.subscription_tier
    }

    pub fn subscription_status(&self) -> SubscriptionStatus {
        self.subscription_status
    }

    pub fn set_subscription(&mut self, tier: SubscriptionTier, status: SubscriptionStatus) {
        self.subscription_tier = tier;
        self.subscription_status = status;
    }

    pub fn billing_customer_ref(&self) -> Option<&str> {
        self.billing_customer_ref.as_deref()
    }

    pub fn stats(&self) -> &UserStats {
        &self.stats
    }

    pub fn journeys(&self) -> &[Journey] {
        &self.journeys
    }

    pub fn completed_resources(&self) -> &[CompletedResource] {
        &self.completed_resources
    }

    pub fn conversations(&self) -> &Conversations {
        &self.conversations
    }

    /// Removes a whole thread. Returns whether one was removed.
    pub fn delete_conversation(&mut self, conversation_id: &ConversationId) -> bool {
        self.conversations.remove(conversation_id)
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Stores stamp the version they persisted.
    pub(crate) fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    pub fn count_journeys(&self, status: JourneyStatus) -> usize {
        self.journeys.iter().filter(|j| j.status() == status).count()
    }

    /// First journey in `active` status, in creation order.
    pub fn find_active_journey(&self) -> Option<&Journey> {
        self.journeys.iter().find(|j| j.is_active())
    }

    pub fn journey(&self, number: JourneyNumber) -> Result<&Journey, DomainError> {
        self.journeys
            .iter()
            .find(|j| j.number() == number)
            .ok_or(DomainError::JourneyNotFound(number))
    }

    fn journey_mut(&mut self, number: JourneyNumber) -> Result<&mut Journey, DomainError> {
        self.journeys
            .iter_mut()
            .find(|j| j.number() == number)
            .ok_or(DomainError::JourneyNotFound(number))
    }

    /// Starts a new journey.
    ///
    /// # Errors
    /// - `Validation` when the description is blank or too long
    /// - `ActiveJourneyLimit` when a free-tier user already has an active journey
    pub fn start_journey(
        &mut self,
        resentment_description: &str,
        entitlement: Entitlement,
        now: DateTime<Utc>,
    ) -> Result<&Journey, DomainError> {
        let description = resentment_description.trim();
        if description.is_empty() {
            return Err(ValidationError::Empty("resentmentDescription").into());
        }
        if description.chars().count() > MAX_DESCRIPTION_LENGTH {
            return Err(ValidationError::TooLong {
                field: "resentmentDescription",
                max: MAX_DESCRIPTION_LENGTH,
                actual: description.chars().count(),
            }
            .into());
        }

        let active = self.count_journeys(JourneyStatus::Active);
        if entitlement == Entitlement::Free && active >= 1 {
            return Err(DomainError::ActiveJourneyLimit { active });
        }

        let number = JourneyNumber::new(self.stats.total_journeys_started + 1)?;
        self.journeys
            .push(Journey::start(number, description.to_string(), now));
        self.stats.total_journeys_started += 1;
        self.record_activity(now);

        let last = self.journeys.len() - 1;
        Ok(&self.journeys[last])
    }

    /// Applies a step update and rolls a completion into the stats.
    pub fn update_journey_step(
        &mut self,
        number: JourneyNumber,
        step: StepNumber,
        completed: bool,
        now: DateTime<Utc>,
    ) -> Result<StepOutcome, DomainError> {
        let outcome = self.journey_mut(number)?.apply_step(step, completed, now);
        if outcome.journey_completed {
            self.stats.total_journeys_completed += 1;
        }
        self.record_activity(now);
        Ok(outcome)
    }

    pub fn pause_journey(&mut self, number: JourneyNumber) -> Result<&Journey, DomainError> {
        let journey = self.journey_mut(number)?;
        journey.pause()?;
        Ok(&*journey)
    }

    pub fn resume_journey(
        &mut self,
        number: JourneyNumber,
        now: DateTime<Utc>,
    ) -> Result<&Journey, DomainError> {
        self.journey_mut(number)?.resume()?;
        self.record_activity(now);
        self.journey(number)
    }

    pub fn completed_resource(&self, resource_id: &ResourceId) -> Option<&CompletedResource> {
        self.completed_resources
            .iter()
            .find(|r| &r.resource_id == resource_id)
    }

    /// Upserts the ledger entry for `resource_id`.
    pub fn complete_resource(
        &mut self,
        resource_id: ResourceId,
        resource_name: &str,
        now: DateTime<Utc>,
    ) -> &CompletedResource {
        self.record_activity(now);

        if let Some(index) = self
            .completed_resources
            .iter()
            .position(|r| r.resource_id == resource_id)
        {
            let existing = &mut self.completed_resources[index];
            existing.times_completed += 1;
            existing.completed_at = now;
            return existing;
        }

        let resource_name = match resource_name.trim() {
            "" => resource_id.as_str().to_string(),
            name => name.to_string(),
        };
        self.completed_resources.push(CompletedResource {
            resource_id,
            resource_name,
            times_completed: 1,
            completed_at: now,
        });
        self.stats.total_resources_completed += 1;

        let last = self.completed_resources.len() - 1;
        &self.completed_resources[last]
    }

    fn record_conversation_started(&mut self) {
        self.stats.total_ai_conversations += 1;
    }

    /// Records one chat exchange for `session_id`.
    ///
    /// A newly opened thread counts as one AI conversation started.
    pub fn record_exchange(
        &mut self,
        session_id: &SessionId,
        context: CoachingContext,
        user_turn: (String, DateTime<Utc>),
        assistant_turn: (String, DateTime<Utc>),
    ) -> ExchangeOutcome {
        let now = assistant_turn.1;
        let (thread, opened) =
            self.conversations
                .record_exchange(session_id, context, user_turn, assistant_turn);
        let outcome = ExchangeOutcome {
            conversation_id: thread.conversation_id().clone(),
            message_count: thread.messages().len(),
            opened,
        };
        if opened {
            self.record_conversation_started();
        }
        self.record_activity(now);
        outcome
    }

    /// Refreshes `last_active_date` and the daily streak.
    ///
    /// Activity on the day after the previous active day extends the streak; activity on
    /// the same day leaves it; any gap resets it to 1.
    pub fn record_activity(&mut self, now: DateTime<Utc>) {
        let today = now.date_naive();
        self.stats.current_streak = match self.stats.last_active_date.map(|d| d.date_naive()) {
            Some(last) if last == today => self.stats.current_streak.max(1),
            Some(last) if last.succ_opt() == Some(today) => self.stats.current_streak + 1,
            _ => 1,
        };
        self.stats.last_active_date = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 2, 8, 30, 0).unwrap()
    }

    fn user() -> User {
        User::new(UserId::new("u1").unwrap(), "river")
    }

    fn step(n: u8) -> StepNumber {
        StepNumber::new(n).unwrap()
    }

    #[test]
    fn test_start_allocates_sequential_numbers() {
        let mut u = user();
        let first = u.start_journey("my brother", Entitlement::Premium, t0()).unwrap();
        assert_eq!(first.number().value(), 1);
        let second = u.start_journey("my boss", Entitlement::Premium, t0()).unwrap();
        assert_eq!(second.number().value(), 2);
        assert_eq!(u.stats().total_journeys_started, 2);
        assert_eq!(u.stats().last_active_date, Some(t0()));
    }

    #[test]
    fn test_free_tier_limited_to_one_active_journey() {
        let mut u = user();
        u.start_journey("first", Entitlement::Free, t0()).unwrap();
        let err = u.start_journey("second", Entitlement::Free, t0()).unwrap_err();
        assert_matches!(err, DomainError::ActiveJourneyLimit { active: 1 });
        assert_eq!(u.journeys().len(), 1);
        assert_eq!(u.stats().total_journeys_started, 1);
    }

    #[test]
    fn test_free_tier_may_start_after_pausing() {
        let mut u = user();
        u.start_journey("first", Entitlement::Free, t0()).unwrap();
        u.pause_journey(JourneyNumber::new(1).unwrap()).unwrap();
        assert!(u.start_journey("second", Entitlement::Free, t0()).is_ok());
    }

    #[test]
    fn test_blank_description_rejected_without_mutation() {
        let mut u = user();
        assert_matches!(
            u.start_journey("   ", Entitlement::Premium, t0()),
            Err(DomainError::Validation(ValidationError::Empty(_)))
        );
        assert!(u.journeys().is_empty());
        assert_eq!(u.stats(), &UserStats::default());
    }

    #[test]
    fn test_completion_increments_stat_once() {
        let mut u = user();
        u.start_journey("my brother", Entitlement::Free, t0()).unwrap();
        let number = JourneyNumber::new(1).unwrap();
        for n in 1..=7 {
            u.update_journey_step(number, step(n), true, t0()).unwrap();
        }
        u.update_journey_step(number, step(7), true, t0()).unwrap();
        assert_eq!(u.stats().total_journeys_completed, 1);
        assert!(u.find_active_journey().is_none());
    }

    #[test]
    fn test_unknown_journey_is_not_found() {
        let mut u = user();
        let missing = JourneyNumber::new(9).unwrap();
        assert_matches!(
            u.update_journey_step(missing, step(1), true, t0()),
            Err(DomainError::JourneyNotFound(n)) if n == missing
        );
        assert_matches!(u.pause_journey(missing), Err(DomainError::JourneyNotFound(_)));
        assert_matches!(u.resume_journey(missing, t0()), Err(DomainError::JourneyNotFound(_)));
    }

    #[test]
    fn test_find_active_returns_first_active() {
        let mut u = user();
        u.start_journey("a", Entitlement::Premium, t0()).unwrap();
        u.start_journey("b", Entitlement::Premium, t0()).unwrap();
        u.pause_journey(JourneyNumber::new(1).unwrap()).unwrap();
        assert_eq!(u.find_active_journey().unwrap().number().value(), 2);
    }

    #[test]
    fn test_complete_resource_upserts() {
        let mut u = user();
        let id = ResourceId::new("worksheet-1").unwrap();
        assert_eq!(u.complete_resource(id.clone(), "Worksheet", t0()).times_completed, 1);
        let later = t0() + Duration::hours(2);
        let again = u.complete_resource(id.clone(), "Worksheet", later);
        assert_eq!(again.times_completed, 2);
        assert_eq!(again.completed_at, later);
        assert_eq!(u.completed_resources().len(), 1);
        assert_eq!(u.stats().total_resources_completed, 1);
    }

    #[test]
    fn test_streak_tracks_consecutive_days() {
        let mut u = user();
        u.record_activity(t0());
        assert_eq!(u.stats().current_streak, 1);
        u.record_activity(t0() + Duration::hours(3));
        assert_eq!(u.stats().current_streak, 1);
        u.record_activity(t0() + Duration::days(1));
        assert_eq!(u.stats().current_streak, 2);
        u.record_activity(t0() + Duration::days(2));
        assert_eq!(u.stats().current_streak, 3);
        u.record_activity(t0() + Duration::days(5));
        assert_eq!(u.stats().current_streak, 1);
    }

    #[test]
    fn test_exchange_counts_new_threads_only() {
        let mut u = user();
        let context = crate::coaching::build_context(&u, None);
        let session = SessionId::new("s1").unwrap();
        let first = u.record_exchange(
            &session,
            context.clone(),
            ("hi".into(), t0()),
            ("hello".into(), t0()),
        );
        assert!(first.opened);
        assert_eq!(first.message_count, 2);
        let second = u.record_exchange(
            &session,
            context,
            ("more".into(), t0()),
            ("ok".into(), t0()),
        );
        assert!(!second.opened);
        assert_eq!(second.message_count, 4);
        assert_eq!(second.conversation_id, first.conversation_id);
        assert_eq!(u.stats().total_ai_conversations, 1);
        assert_eq!(u.stats().last_active_date, Some(t0()));
    }

    #[test]
    fn test_document_round_trip_keeps_version() {
        let mut u = user().with_subscription(SubscriptionTier::Premium, SubscriptionStatus::Active);
        u.start_journey("x", Entitlement::Premium, t0()).unwrap();
        u.set_version(4);
        let json = serde_json::to_string(&u).unwrap();
        let back: User = serde_json::from_str(&json).unwrap();
        assert_eq!(back, u);
        assert_eq!(back.version(), 4);
    }
}
