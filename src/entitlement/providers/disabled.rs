//! Disabled provider - every user is premium

use crate::domain::User;
use crate::entitlement::BillingProvider;
use anyhow::Result;
use async_trait::async_trait;

/// Provider that grants premium to everyone (no billing checks).
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledProvider;

#[async_trait]
impl BillingProvider for DisabledProvider {
    async fn has_premium_access(&self, _user: &User) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "disabled"
    }
}
