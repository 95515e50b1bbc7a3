//! Premium entitlement gate
//!
//! The engine never interprets subscription fields itself. A [`BillingProvider`]
//! derives a single "has premium access" flag from the user, and the
//! [`EntitlementGate`] turns that flag into either an [`Entitlement`] for the
//! aggregate or an `EntitlementRequired` rejection for a premium feature.
//!
//! Usage:
//! ```rust,ignore
//! gate.require_premium(&user, PremiumFeature::AiCoach).await?;
//! let entitlement = gate.entitlement_for(&user).await;
//! user.start_journey(description, entitlement, now)?;
//! ```

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::domain::{Entitlement, User};
use crate::error::EngineError;

pub mod providers;

pub use providers::{DisabledProvider, SubscriptionBillingProvider};

// =============================================================================
// PREMIUM FEATURES
// =============================================================================

/// Features reserved for premium users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PremiumFeature {
    /// More than one active journey at a time
    MultipleJourneys,
    /// Chat with the AI coach
    AiCoach,
    /// Listing past coaching conversations
    ConversationHistory,
    /// Step support for a specific journey
    JourneySupport,
}

impl PremiumFeature {
    /// Message shown to the user alongside the rejection.
    pub fn upgrade_prompt(&self) -> &'static str {
        match self {
            PremiumFeature::MultipleJourneys => {
                "Free users can have one active journey at a time. Upgrade to Premium for unlimited journeys."
            }
            PremiumFeature::AiCoach => {
                "AI coach is a premium feature. Upgrade to Premium to chat with your forgiveness coach."
            }
            PremiumFeature::ConversationHistory => {
                "Conversation history is a premium feature. Upgrade to Premium to revisit past sessions."
            }
            PremiumFeature::JourneySupport => {
                "Journey support is a premium feature. Upgrade to Premium for step-by-step coaching."
            }
        }
    }
}

impl fmt::Display for PremiumFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PremiumFeature::MultipleJourneys => write!(f, "multiple_journeys"),
            PremiumFeature::AiCoach => write!(f, "ai_coach"),
            PremiumFeature::ConversationHistory => write!(f, "conversation_history"),
            PremiumFeature::JourneySupport => write!(f, "journey_support"),
        }
    }
}

// =============================================================================
// BILLING PROVIDER TRAIT
// =============================================================================

#[async_trait]
pub trait BillingProvider: Send + Sync {
    /// Whether `user` currently has premium access.
    async fn has_premium_access(&self, user: &User) -> Result<bool>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

// =============================================================================
// ENTITLEMENT GATE
// =============================================================================

#[derive(Clone)]
pub struct EntitlementGate {
    provider: Arc<dyn BillingProvider>,
}

impl fmt::Debug for EntitlementGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntitlementGate")
            .field("provider", &self.provider.name())
            .finish()
    }
}

impl EntitlementGate {
    pub fn new(provider: Arc<dyn BillingProvider>) -> Self {
        Self { provider }
    }

    /// Create from the configured provider name: "subscription" or "disabled".
    pub fn from_config(provider_type: &str) -> Result<Self> {
        let provider: Arc<dyn BillingProvider> = match provider_type {
            "subscription" => Arc::new(SubscriptionBillingProvider),
            "disabled" => Arc::new(DisabledProvider),
            other => return Err(anyhow!("Unknown entitlement provider: {}", other)),
        };
        Ok(Self { provider })
    }

    /// Create disabled gate (every user is premium)
    pub fn disabled() -> Self {
        Self::new(Arc::new(DisabledProvider))
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Provider failures are treated as "not premium".
    pub async fn has_premium(&self, user: &User) -> bool {
        match self.provider.has_premium_access(user).await {
            Ok(premium) => premium,
            Err(e) => {
                tracing::warn!(
                    user_id = %user.id(),
                    provider = self.provider.name(),
                    error = %e,
                    "billing provider failed, treating user as free tier"
                );
                false
            }
        }
    }

    pub async fn entitlement_for(&self, user: &User) -> Entitlement {
        if self.has_premium(user).await {
            Entitlement::Premium
        } else {
            Entitlement::Free
        }
    }

    pub async fn require_premium(
        &self,
        user: &User,
        feature: PremiumFeature,
    ) -> Result<(), EngineError> {
        if self.has_premium(user).await {
            return Ok(());
        }
        tracing::info!(user_id = %user.id(), feature = %feature, "premium feature denied");
        Err(EngineError::entitlement_required(feature))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SubscriptionStatus, SubscriptionTier, UserId};
    use assert_matches::assert_matches;

    struct FailingProvider;

    #[async_trait]
    impl BillingProvider for FailingProvider {
        async fn has_premium_access(&self, _user: &User) -> Result<bool> {
            Err(anyhow!("billing backend down"))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn user(tier: SubscriptionTier, status: SubscriptionStatus) -> User {
        User::new(UserId::new("u").unwrap(), "river").with_subscription(tier, status)
    }

    #[test]
    fn test_feature_display() {
        assert_eq!(PremiumFeature::AiCoach.to_string(), "ai_coach");
        assert_eq!(
            PremiumFeature::MultipleJourneys.to_string(),
            "multiple_journeys"
        );
        assert!(PremiumFeature::AiCoach.upgrade_prompt().contains("premium feature"));
    }

    #[tokio::test]
    async fn test_subscription_provider_requires_active_status() {
        let gate = EntitlementGate::from_config("subscription").unwrap();
        assert!(
            gate.has_premium(&user(SubscriptionTier::Premium, SubscriptionStatus::Active))
                .await
        );
        assert!(
            gate.has_premium(&user(SubscriptionTier::Premium, SubscriptionStatus::Trialing))
                .await
        );
        assert!(
            !gate
                .has_premium(&user(SubscriptionTier::Premium, SubscriptionStatus::PastDue))
                .await
        );
        assert!(
            !gate
                .has_premium(&user(SubscriptionTier::Free, SubscriptionStatus::Active))
                .await
        );
    }

    #[tokio::test]
    async fn test_disabled_gate() {
        let gate = EntitlementGate::disabled();
        let free = user(SubscriptionTier::Free, SubscriptionStatus::None);
        assert_eq!(gate.entitlement_for(&free).await, Entitlement::Premium);
        assert!(gate.require_premium(&free, PremiumFeature::AiCoach).await.is_ok());
        assert_eq!(gate.provider_name(), "disabled");
    }

    #[tokio::test]
    async fn test_require_premium_rejects_free_user() {
        let gate = EntitlementGate::from_config("subscription").unwrap();
        let free = user(SubscriptionTier::Free, SubscriptionStatus::None);
        assert_matches!(
            gate.require_premium(&free, PremiumFeature::ConversationHistory).await,
            Err(EngineError::EntitlementRequired {
                feature: PremiumFeature::ConversationHistory,
                ..
            })
        );
    }

    #[tokio::test]
    async fn test_provider_failure_is_not_premium() {
        let gate = EntitlementGate::new(Arc::new(FailingProvider));
        let premium = user(SubscriptionTier::Premium, SubscriptionStatus::Active);
        assert_eq!(gate.entitlement_for(&premium).await, Entitlement::Free);
    }

    #[test]
    fn test_unknown_provider() {
        assert!(EntitlementGate::from_config("gcp").is_err());
    }
}
