//! Subscription provider - reads the tier and status mirrored from billing

use crate::domain::{SubscriptionStatus, SubscriptionTier, User};
use crate::entitlement::BillingProvider;
use anyhow::Result;
use async_trait::async_trait;

/// Grants premium iff the tier is premium and the subscription is active or trialing.
#[derive(Debug, Default, Clone, Copy)]
pub struct SubscriptionBillingProvider;

#[async_trait]
impl BillingProvider for SubscriptionBillingProvider {
    async fn has_premium_access(&self, user: &User) -> Result<bool> {
        Ok(user.subscription_tier() == SubscriptionTier::Premium
            && matches!(
                user.subscription_status(),
                SubscriptionStatus::Active | SubscriptionStatus::Trialing
            ))
    }

    fn name(&self) -> &str {
        "subscription"
    }
}
