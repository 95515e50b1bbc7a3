//! Billing provider implementations

mod disabled;
mod subscription;

pub use disabled::DisabledProvider;
pub use subscription::SubscriptionBillingProvider;
