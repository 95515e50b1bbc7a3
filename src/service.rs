//! Request-scoped operations over the user aggregate.
//!
//! Every operation loads the user, applies one or more aggregate transitions, and
//! saves the user back as a single versioned write:
//!
//! ```text
//! load_by_id ──► gate check ──► aggregate mutation ──► save(version n) ──► view
//!                    │                 │                    │
//!                    └── EntitlementRequired               └── Conflict (no retry)
//!                                      └── Validation / NotFound / InvalidTransition
//! ```
//!
//! A rejected operation never reaches `save`. The coaching chat is the only
//! operation with a degraded mode: a completion failure yields the fallback reply
//! and nothing is persisted.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::Instrument;

use crate::coaching::{
    CoachingContext, CrisisDetector, CrisisResources, build_context, render_instructions,
};
use crate::completion::{ChatTurn, CompletionProvider, provider_from_config};
use crate::config::EngineConfig;
use crate::domain::{
    ConversationFilter, ConversationId, JourneyNumber, JourneyStatus, ResourceId, Role,
    SessionId, Step, StepNumber, SubscriptionStatus, SubscriptionTier, User, UserId,
    ValidationError, compute_stats,
};
use crate::entitlement::{EntitlementGate, PremiumFeature};
use crate::error::EngineError;
use crate::logging::{conversation_span, operation_span};
use crate::metrics::{METRICS, OperationMetrics};
use crate::model::{
    ChatFallback, ChatMetadata, ChatReply, ChatRequest, ChatResponse, ChatUserContext,
    ConversationSummaryView, ConversationView, CrisisResourcesView, JourneyCounts,
    JourneyDetail, JourneyList, JourneySupportView, JourneyView, ResourceCompletionView,
    StatsView, StatusFilter, StepGuidanceView, StepUpdateView, SupportJourneyView, UserView,
};
use crate::store::{FileUserStore, UserStore};

/// Source of "now" for every timestamp the service writes.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Placeholder span id for operations that are not scoped to a user.
const NO_USER: &str = "-";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSettings {
    /// Contact surfaced with the fallback reply
    pub support_email: String,
    /// Maximum conversation summaries returned by a listing
    pub conversation_list_limit: usize,
    /// Characters of the last message kept in a summary preview
    pub preview_chars: usize,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        EngineConfig::default().service_settings()
    }
}

fn fallback_message(support_email: &str) -> String {
    format!(
        "I'm having trouble connecting right now. In the meantime, try reviewing your current step's resources, or join our next live group session for support. You can also email {support_email} for assistance."
    )
}

pub struct JourneyService {
    store: Arc<dyn UserStore>,
    gate: EntitlementGate,
    completion: Arc<dyn CompletionProvider>,
    crisis: CrisisDetector,
    settings: ServiceSettings,
    clock: Clock,
}

impl std::fmt::Debug for JourneyService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JourneyService")
            .field("store", &self.store.name())
            .field("gate", &self.gate)
            .field("completion", &self.completion.id())
            .field("settings", &self.settings)
            .finish()
    }
}

impl JourneyService {
    pub fn new(
        store: Arc<dyn UserStore>,
        gate: EntitlementGate,
        completion: Arc<dyn CompletionProvider>,
    ) -> Self {
        Self {
            store,
            gate,
            completion,
            crisis: CrisisDetector::default(),
            settings: ServiceSettings::default(),
            clock: Arc::new(Utc::now),
        }
    }

    /// Wires the file store, billing gate and completion provider named by `config`.
    pub fn from_config(config: &EngineConfig) -> anyhow::Result<Self> {
        let store = FileUserStore::open(config.data_dir.clone())?;
        let gate = EntitlementGate::from_config(&config.entitlement_provider.to_string())?;
        let completion = provider_from_config(&config.completion())?;

        tracing::info!(
            data_dir = %config.data_dir.display(),
            entitlement = gate.provider_name(),
            completion = completion.id(),
            "journey service configured"
        );

        Ok(Self::new(Arc::new(store), gate, completion)
            .with_crisis_detector(CrisisDetector::extended(&config.extra_crisis_phrases))
            .with_settings(config.service_settings()))
    }

    pub fn with_crisis_detector(mut self, crisis: CrisisDetector) -> Self {
        self.crisis = crisis;
        self
    }

    pub fn with_settings(mut self, settings: ServiceSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Runs one operation inside its span and records its outcome.
    async fn run<T, F>(
        &self,
        operation: &'static str,
        user_id: &str,
        work: F,
    ) -> Result<T, EngineError>
    where
        F: Future<Output = Result<T, EngineError>>,
    {
        let metrics = OperationMetrics::new(operation);
        let result = work.instrument(operation_span(operation, user_id)).await;
        match &result {
            Ok(_) => metrics.success(),
            Err(e) => {
                e.track(operation);
                if matches!(e, EngineError::Conflict { .. }) {
                    METRICS.store_conflicts_total.inc();
                }
                tracing::warn!(
                    operation,
                    user_id,
                    code = %e.code(),
                    error = %e,
                    "operation rejected"
                );
                metrics.error(e.code().category());
            }
        }
        result
    }

    async fn load(&self, user_id: &UserId) -> Result<User, EngineError> {
        self.store
            .load_by_id(user_id)
            .await?
            .ok_or_else(|| EngineError::UserNotFound(user_id.clone()))
    }

    /// Saves `user` and adopts the version the store assigned.
    async fn persist(&self, user: &mut User) -> Result<(), EngineError> {
        let version = self.store.save(user).await?;
        user.set_version(version);
        Ok(())
    }

    // =========================================================================
    // USERS
    // =========================================================================

    pub async fn register_user(
        &self,
        user_id: &UserId,
        screen_name: &str,
        billing_customer_ref: Option<&str>,
    ) -> Result<UserView, EngineError> {
        self.run("register_user", user_id.as_str(), async {
            let screen_name = screen_name.trim();
            if screen_name.is_empty() {
                return Err(EngineError::from(ValidationError::Empty("screenName")));
            }

            let mut user = User::new(user_id.clone(), screen_name);
            if let Some(reference) = billing_customer_ref
                .map(str::trim)
                .filter(|r| !r.is_empty())
            {
                user = user.with_billing_customer_ref(reference);
            }
            let version = self.store.insert(&user).await?;
            user.set_version(version);

            tracing::info!(user_id = %user_id, "user registered");
            Ok(UserView::from(&user))
        })
        .await
    }

    /// Applies a subscription change reported by billing.
    pub async fn set_subscription(
        &self,
        user_id: &UserId,
        tier: SubscriptionTier,
        status: SubscriptionStatus,
    ) -> Result<UserView, EngineError> {
        self.run("set_subscription", user_id.as_str(), async {
            let mut user = self.load(user_id).await?;
            user.set_subscription(tier, status);
            self.persist(&mut user).await?;

            tracing::info!(user_id = %user_id, tier = %tier, status = %status, "subscription updated");
            Ok(UserView::from(&user))
        })
        .await
    }

    pub async fn user_profile(&self, user_id: &UserId) -> Result<UserView, EngineError> {
        self.run("user_profile", user_id.as_str(), async {
            let user = self.load(user_id).await?;
            Ok(UserView::from(&user))
        })
        .await
    }

    /// Looks a user up by billing customer reference.
    pub async fn user_by_billing_ref(&self, reference: &str) -> Result<Option<UserView>, EngineError> {
        self.run("user_by_billing_ref", NO_USER, async {
            let reference = reference.trim();
            if reference.is_empty() {
                return Err(EngineError::from(ValidationError::Empty("billingCustomerRef")));
            }
            let user = self.store.load_by_external_ref(reference).await?;
            Ok(user.as_ref().map(UserView::from))
        })
        .await
    }

    // =========================================================================
    // JOURNEYS
    // =========================================================================

    pub async fn start_journey(
        &self,
        user_id: &UserId,
        resentment_description: &str,
    ) -> Result<JourneyView, EngineError> {
        self.run("start_journey", user_id.as_str(), async {
            let mut user = self.load(user_id).await?;
            let entitlement = self.gate.entitlement_for(&user).await;
            let view = JourneyView::from(user.start_journey(
                resentment_description,
                entitlement,
                self.now(),
            )?);
            self.persist(&mut user).await?;

            METRICS.journeys_started_total.inc();
            tracing::info!(user_id = %user_id, journey = view.journey_number, "journey started");
            Ok(view)
        })
        .await
    }

    /// Marks or navigates to `step`. Any step 1-7 may be navigated to.
    pub async fn update_step(
        &self,
        user_id: &UserId,
        journey: JourneyNumber,
        step: StepNumber,
        completed: bool,
    ) -> Result<StepUpdateView, EngineError> {
        self.run("update_step", user_id.as_str(), async {
            let mut user = self.load(user_id).await?;
            let outcome = user.update_journey_step(journey, step, completed, self.now())?;
            let view = StepUpdateView::from(user.journey(journey)?);
            self.persist(&mut user).await?;

            if outcome.journey_completed {
                METRICS.journeys_completed_total.inc();
                tracing::info!(user_id = %user_id, journey = %journey, "journey completed");
            }
            tracing::debug!(
                user_id = %user_id,
                journey = %journey,
                step = %step,
                newly_marked = outcome.newly_marked,
                advanced = outcome.advanced,
                "step updated"
            );
            Ok(view)
        })
        .await
    }

    pub async fn pause_journey(
        &self,
        user_id: &UserId,
        journey: JourneyNumber,
    ) -> Result<JourneyView, EngineError> {
        self.run("pause_journey", user_id.as_str(), async {
            let mut user = self.load(user_id).await?;
            let view = JourneyView::from(user.pause_journey(journey)?);
            self.persist(&mut user).await?;
            Ok(view)
        })
        .await
    }

    pub async fn resume_journey(
        &self,
        user_id: &UserId,
        journey: JourneyNumber,
    ) -> Result<JourneyView, EngineError> {
        self.run("resume_journey", user_id.as_str(), async {
            let mut user = self.load(user_id).await?;
            let view = JourneyView::from(user.resume_journey(journey, self.now())?);
            self.persist(&mut user).await?;
            Ok(view)
        })
        .await
    }

    /// Journeys matching `filter`, most recently started first. Counts cover all journeys.
    pub async fn list_journeys(
        &self,
        user_id: &UserId,
        filter: StatusFilter,
    ) -> Result<JourneyList, EngineError> {
        self.run("list_journeys", user_id.as_str(), async {
            let user = self.load(user_id).await?;

            let mut journeys: Vec<_> = user
                .journeys()
                .iter()
                .filter(|journey| filter.matches(journey.status()))
                .collect();
            journeys.sort_by(|a, b| {
                b.start_date()
                    .cmp(&a.start_date())
                    .then_with(|| b.number().cmp(&a.number()))
            });

            Ok(JourneyList {
                journeys: journeys.into_iter().map(JourneyView::from).collect(),
                stats: JourneyCounts {
                    total: user.journeys().len(),
                    active: user.count_journeys(JourneyStatus::Active),
                    completed: user.count_journeys(JourneyStatus::Completed),
                },
            })
        })
        .await
    }

    pub async fn get_journey(
        &self,
        user_id: &UserId,
        journey: JourneyNumber,
    ) -> Result<JourneyDetail, EngineError> {
        self.run("get_journey", user_id.as_str(), async {
            let user = self.load(user_id).await?;
            Ok(JourneyDetail::new(user.journey(journey)?, self.now()))
        })
        .await
    }

    // =========================================================================
    // RESOURCES & STATS
    // =========================================================================

    pub async fn complete_resource(
        &self,
        user_id: &UserId,
        resource_id: ResourceId,
        resource_name: &str,
    ) -> Result<ResourceCompletionView, EngineError> {
        self.run("complete_resource", user_id.as_str(), async {
            let mut user = self.load(user_id).await?;
            let resource = user
                .complete_resource(resource_id, resource_name, self.now())
                .clone();
            let view =
                ResourceCompletionView::new(&resource, user.stats().total_resources_completed);
            self.persist(&mut user).await?;

            METRICS.resources_completed_total.inc();
            Ok(view)
        })
        .await
    }

    pub async fn stats(&self, user_id: &UserId) -> Result<StatsView, EngineError> {
        self.run("stats", user_id.as_str(), async {
            let user = self.load(user_id).await?;
            Ok(StatsView::from(compute_stats(&user)))
        })
        .await
    }

    // =========================================================================
    // COACHING CHAT
    // =========================================================================

    /// Sends one message to the coach.
    ///
    /// The reply always carries the crisis flag. When the completion provider
    /// fails the fallback reply is returned and the exchange is not saved.
    pub async fn send_chat(&self, request: &ChatRequest) -> Result<ChatReply, EngineError> {
        self.run("send_chat", request.user_id.as_str(), async {
            let message = request.message.trim();
            if message.is_empty() {
                return Err(EngineError::from(ValidationError::Empty("message")));
            }
            let user_id = UserId::new(request.user_id.as_str())?;
            let session_id = match request.session_id.as_deref() {
                Some(raw) => SessionId::new(raw)?,
                None => SessionId::generate(),
            };
            let received_at = self.now();

            let mut user = self.load(&user_id).await?;
            self.gate.require_premium(&user, PremiumFeature::AiCoach).await?;

            let is_crisis = self.crisis.detect(message);
            if is_crisis {
                METRICS.crisis_detections_total.inc();
                tracing::warn!(user_id = %user_id, "crisis language detected");
            }
            let crisis_resources =
                is_crisis.then(|| CrisisResourcesView::from(CrisisResources::standard()));

            let context = build_context(&user, user.find_active_journey());
            let user_context = chat_user_context(&context);

            let mut turns: Vec<ChatTurn> = user
                .conversations()
                .find_by_session(&session_id)
                .map(|thread| thread.messages().iter().map(ChatTurn::from).collect())
                .unwrap_or_default();
            turns.push(ChatTurn {
                role: Role::User,
                content: message.to_string(),
            });
            let instructions = render_instructions(&context);

            METRICS.chat_turns_total.inc();
            let generated = self
                .completion
                .generate(&instructions, &turns)
                .instrument(conversation_span(user_id.as_str(), session_id.as_str()))
                .await;

            let reply = match generated {
                Ok(reply) => reply,
                Err(e) => {
                    let error = EngineError::from(e);
                    error.track("send_chat");
                    METRICS.completion_fallbacks_total.inc();
                    tracing::warn!(
                        user_id = %user_id,
                        provider = self.completion.id(),
                        error = %error,
                        "completion failed, serving fallback reply"
                    );
                    return Ok(ChatReply {
                        response: ChatResponse {
                            message: fallback_message(&self.settings.support_email),
                            session_id: session_id.as_str().to_string(),
                            is_crisis,
                            crisis_resources,
                        },
                        metadata: None,
                        fallback: Some(ChatFallback {
                            support_email: self.settings.support_email.clone(),
                        }),
                    });
                }
            };

            let outcome = user.record_exchange(
                &session_id,
                context,
                (message.to_string(), received_at),
                (reply.clone(), self.now()),
            );
            self.persist(&mut user).await?;

            if outcome.opened {
                tracing::info!(
                    user_id = %user_id,
                    conversation_id = %outcome.conversation_id,
                    "conversation opened"
                );
            }

            Ok(ChatReply {
                response: ChatResponse {
                    message: reply,
                    session_id: session_id.as_str().to_string(),
                    is_crisis,
                    crisis_resources,
                },
                metadata: Some(ChatMetadata {
                    conversation_id: outcome.conversation_id.as_str().to_string(),
                    message_count: outcome.message_count,
                    user_context,
                }),
                fallback: None,
            })
        })
        .await
    }

    // =========================================================================
    // CONVERSATIONS
    // =========================================================================

    /// Most recent first, capped at the configured limit.
    pub async fn list_conversations(
        &self,
        user_id: &UserId,
        session_id: Option<SessionId>,
    ) -> Result<Vec<ConversationSummaryView>, EngineError> {
        self.run("list_conversations", user_id.as_str(), async {
            let user = self.load(user_id).await?;
            self.gate
                .require_premium(&user, PremiumFeature::ConversationHistory)
                .await?;

            let filter = ConversationFilter { session_id };
            Ok(user
                .conversations()
                .list(
                    &filter,
                    self.settings.conversation_list_limit,
                    self.settings.preview_chars,
                )
                .into_iter()
                .map(ConversationSummaryView::from)
                .collect())
        })
        .await
    }

    pub async fn get_conversation(
        &self,
        user_id: &UserId,
        conversation_id: &ConversationId,
    ) -> Result<ConversationView, EngineError> {
        self.run("get_conversation", user_id.as_str(), async {
            let user = self.load(user_id).await?;
            user.conversations()
                .get(conversation_id)
                .map(ConversationView::from)
                .ok_or_else(|| EngineError::ConversationNotFound(conversation_id.clone()))
        })
        .await
    }

    /// Deletes a thread. Returns whether one existed; a missing id is not an error.
    pub async fn delete_conversation(
        &self,
        user_id: &UserId,
        conversation_id: &ConversationId,
    ) -> Result<bool, EngineError> {
        self.run("delete_conversation", user_id.as_str(), async {
            let mut user = self.load(user_id).await?;
            let removed = user.delete_conversation(conversation_id);
            if removed {
                self.persist(&mut user).await?;
            }
            Ok(removed)
        })
        .await
    }

    // =========================================================================
    // GUIDANCE
    // =========================================================================

    /// Static guidance for a step number in 1..=7.
    pub async fn step_guidance(&self, step: u8) -> Result<StepGuidanceView, EngineError> {
        self.run("step_guidance", NO_USER, async {
            let step = StepNumber::new(step)?;
            Ok(StepGuidanceView::from(Step::from_number(step)))
        })
        .await
    }

    /// Guidance for `step` alongside the journey it applies to.
    pub async fn journey_support(
        &self,
        user_id: &UserId,
        journey: JourneyNumber,
        step: StepNumber,
    ) -> Result<JourneySupportView, EngineError> {
        self.run("journey_support", user_id.as_str(), async {
            let user = self.load(user_id).await?;
            self.gate
                .require_premium(&user, PremiumFeature::JourneySupport)
                .await?;
            let journey = user.journey(journey)?;

            Ok(JourneySupportView {
                guidance: StepGuidanceView::from(Step::from_number(step)),
                journey: SupportJourneyView {
                    number: journey.number().value(),
                    resentment: journey.resentment_description().to_string(),
                    completed_steps: journey.completed_steps().iter().map(|s| s.value()).collect(),
                },
            })
        })
        .await
    }
}

fn chat_user_context(context: &CoachingContext) -> ChatUserContext {
    match context.journey() {
        Some(journey) => ChatUserContext {
            current_step: Some(journey.current_step.value()),
            step_name: Some(journey.current_step_kind().name().to_string()),
        },
        None => ChatUserContext {
            current_step: None,
            step_name: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::{MockCompletionProvider, UnavailableProvider};
    use crate::store::InMemoryUserStore;
    use assert_matches::assert_matches;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    fn fixed_clock() -> Clock {
        Arc::new(t0)
    }

    fn uid() -> UserId {
        UserId::new("user-1").unwrap()
    }

    fn service_with(completion: Arc<dyn CompletionProvider>) -> JourneyService {
        JourneyService::new(
            Arc::new(InMemoryUserStore::new()),
            EntitlementGate::from_config("subscription").unwrap(),
            completion,
        )
        .with_clock(fixed_clock())
    }

    async fn premium_user(service: &JourneyService) {
        service.register_user(&uid(), "river", None).await.unwrap();
        service
            .set_subscription(&uid(), SubscriptionTier::Premium, SubscriptionStatus::Active)
            .await
            .unwrap();
    }

    fn chat(message: &str, session: Option<&str>) -> ChatRequest {
        ChatRequest {
            user_id: "user-1".into(),
            message: message.into(),
            session_id: session.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_register_rejects_blank_name_and_duplicates() {
        let service = service_with(Arc::new(MockCompletionProvider::default()));
        assert_matches!(
            service.register_user(&uid(), "  ", None).await,
            Err(EngineError::Validation(_))
        );

        let view = service.register_user(&uid(), "river", Some("cus_1")).await.unwrap();
        assert_eq!(view.version, 1);
        assert_eq!(view.subscription_tier, "free");
        assert_matches!(
            service.register_user(&uid(), "river", None).await,
            Err(EngineError::UserAlreadyExists(_))
        );

        let found = service.user_by_billing_ref("cus_1").await.unwrap();
        assert_eq!(found.map(|u| u.user_id), Some("user-1".to_string()));
    }

    #[tokio::test]
    async fn test_unknown_user_is_not_found() {
        let service = service_with(Arc::new(MockCompletionProvider::default()));
        assert_matches!(service.stats(&uid()).await, Err(EngineError::UserNotFound(_)));
    }

    #[tokio::test]
    async fn test_versions_advance_with_each_save() {
        let service = service_with(Arc::new(MockCompletionProvider::default()));
        service.register_user(&uid(), "river", None).await.unwrap();
        service.start_journey(&uid(), "my brother").await.unwrap();
        service
            .update_step(&uid(), JourneyNumber::new(1).unwrap(), StepNumber::FIRST, true)
            .await
            .unwrap();
        assert_eq!(service.user_profile(&uid()).await.unwrap().version, 3);
    }

    #[tokio::test]
    async fn test_chat_requires_premium() {
        let mock = Arc::new(MockCompletionProvider::default());
        let service = service_with(mock.clone());
        service.register_user(&uid(), "river", None).await.unwrap();

        let err = service.send_chat(&chat("hello", None)).await.unwrap_err();
        assert_matches!(
            err,
            EngineError::EntitlementRequired {
                feature: PremiumFeature::AiCoach,
                ..
            }
        );
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_chat_rejects_blank_message_before_loading() {
        let service = service_with(Arc::new(MockCompletionProvider::default()));
        assert_matches!(
            service.send_chat(&chat("   ", None)).await,
            Err(EngineError::Validation(ValidationError::Empty("message")))
        );
    }

    #[tokio::test]
    async fn test_chat_appends_to_same_session() {
        let mock = Arc::new(MockCompletionProvider::default().with_response("I hear you."));
        let service = service_with(mock.clone());
        premium_user(&service).await;
        service.start_journey(&uid(), "my brother").await.unwrap();

        let first = service.send_chat(&chat("hi", Some("s-1"))).await.unwrap();
        let metadata = first.metadata.unwrap();
        assert_eq!(metadata.message_count, 2);
        assert_eq!(metadata.user_context.current_step, Some(1));
        assert_eq!(metadata.user_context.step_name.as_deref(), Some("Recognize"));
        assert_eq!(first.response.message, "I hear you.");
        assert!(!first.response.is_crisis);
        assert!(first.fallback.is_none());

        let second = service.send_chat(&chat("more", Some("s-1"))).await.unwrap();
        let second_meta = second.metadata.unwrap();
        assert_eq!(second_meta.conversation_id, metadata.conversation_id);
        assert_eq!(second_meta.message_count, 4);

        let (instructions, turns) = mock.last_request().unwrap();
        assert!(instructions.contains("Current Step: 1 (Recognize)"));
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[2].content, "more");

        assert_eq!(service.stats(&uid()).await.unwrap().total_ai_conversations, 1);
    }

    #[tokio::test]
    async fn test_chat_fallback_saves_nothing() {
        let service = service_with(Arc::new(UnavailableProvider));
        premium_user(&service).await;
        let before = service.user_profile(&uid()).await.unwrap().version;

        let reply = service
            .send_chat(&chat("I want to kill myself", None))
            .await
            .unwrap();
        assert!(reply.response.is_crisis);
        assert!(reply.response.crisis_resources.is_some());
        assert!(reply.metadata.is_none());
        assert_eq!(
            reply.fallback.map(|f| f.support_email),
            Some("support@resentmentrelease.com".to_string())
        );
        assert!(reply.response.message.contains("support@resentmentrelease.com"));

        let after = service.user_profile(&uid()).await.unwrap();
        assert_eq!(after.version, before);
        assert_eq!(after.conversation_count, 0);
    }

    #[tokio::test]
    async fn test_chat_fallback_on_provider_error() {
        let mock = Arc::new(MockCompletionProvider::default());
        mock.set_available(false);
        let service = service_with(mock);
        premium_user(&service).await;

        let reply = service.send_chat(&chat("hello", None)).await.unwrap();
        assert!(reply.fallback.is_some());
        assert!(reply.response.session_id.starts_with("session_"));
    }

    #[tokio::test]
    async fn test_conversation_history_is_gated_but_fetch_is_not() {
        let service = service_with(Arc::new(MockCompletionProvider::default()));
        premium_user(&service).await;
        let reply = service.send_chat(&chat("hi", Some("s-9"))).await.unwrap();
        let conversation_id =
            ConversationId::parse(reply.metadata.unwrap().conversation_id).unwrap();

        let listed = service.list_conversations(&uid(), None).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].session_id, "s-9");

        service
            .set_subscription(&uid(), SubscriptionTier::Free, SubscriptionStatus::Canceled)
            .await
            .unwrap();
        assert_matches!(
            service.list_conversations(&uid(), None).await,
            Err(EngineError::EntitlementRequired { .. })
        );

        let fetched = service.get_conversation(&uid(), &conversation_id).await.unwrap();
        assert_eq!(fetched.messages.len(), 2);

        assert!(service.delete_conversation(&uid(), &conversation_id).await.unwrap());
        assert!(!service.delete_conversation(&uid(), &conversation_id).await.unwrap());
        assert_matches!(
            service.get_conversation(&uid(), &conversation_id).await,
            Err(EngineError::ConversationNotFound(_))
        );
    }

    #[tokio::test]
    async fn test_step_guidance_bounds() {
        let service = service_with(Arc::new(MockCompletionProvider::default()));
        let guidance = service.step_guidance(5).await.unwrap();
        assert_eq!(guidance.step_name, "Affirm");
        assert_matches!(service.step_guidance(0).await, Err(EngineError::Validation(_)));
        assert_matches!(service.step_guidance(8).await, Err(EngineError::Validation(_)));
    }

    #[tokio::test]
    async fn test_journey_support_checks_journey() {
        let service = service_with(Arc::new(MockCompletionProvider::default()));
        premium_user(&service).await;
        service.start_journey(&uid(), "my brother").await.unwrap();

        let support = service
            .journey_support(&uid(), JourneyNumber::new(1).unwrap(), StepNumber::new(3).unwrap())
            .await
            .unwrap();
        assert_eq!(support.guidance.step_name, "Learn");
        assert_eq!(support.journey.resentment, "my brother");

        assert_matches!(
            service
                .journey_support(&uid(), JourneyNumber::new(4).unwrap(), StepNumber::FIRST)
                .await,
            Err(EngineError::JourneyNotFound(_))
        );
    }
}
