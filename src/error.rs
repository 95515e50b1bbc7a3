//! Error handling for the journey engine
//!
//! This module provides:
//! - `EngineError`, the single error type returned by every service operation
//! - Stable error codes in the JSON-RPC style with categories and retry hints
//! - Process-wide error telemetry (`ERROR_METRICS`)
//! - A serializable error body for the CLI and other outer surfaces

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

use crate::completion::CompletionError;
use crate::domain::{
    ConversationId, DomainError, JourneyNumber, JourneyStatus, UserId, ValidationError,
};
use crate::entitlement::PremiumFeature;
use crate::store::StoreError;

// =============================================================================
// ERROR CODES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum ErrorCode {
    /// Unexpected failure inside the engine
    InternalError = -32603,
    /// User not found
    UserNotFound = -32001,
    /// Journey not found for the user
    JourneyNotFound = -32002,
    /// Conversation not found for the user
    ConversationNotFound = -32003,
    /// Input validation failed
    ValidationError = -32004,
    /// Completion provider failed
    UpstreamUnavailable = -32005,
    /// Operation not allowed in the journey's current status
    InvalidTransition = -32006,
    /// User document changed since it was loaded
    Conflict = -32007,
    /// A user with the same id is already registered
    UserAlreadyExists = -32008,
    /// Storage I/O or document decoding failed
    StoreError = -32012,
    /// Premium entitlement required
    EntitlementRequired = -32020,
}

impl ErrorCode {
    /// Get the integer code
    pub fn code(&self) -> i32 {
        *self as i32
    }

    /// Whether the caller may retry the same operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCode::Conflict | ErrorCode::StoreError)
    }

    /// Get the error category for metrics
    pub fn category(&self) -> &'static str {
        match self {
            ErrorCode::UserNotFound
            | ErrorCode::JourneyNotFound
            | ErrorCode::ConversationNotFound => "not_found",
            ErrorCode::ValidationError
            | ErrorCode::InvalidTransition
            | ErrorCode::UserAlreadyExists => "validation_error",
            ErrorCode::EntitlementRequired => "entitlement_error",
            ErrorCode::UpstreamUnavailable => "upstream_error",
            ErrorCode::Conflict => "concurrency_error",
            ErrorCode::StoreError => "io_error",
            ErrorCode::InternalError => "server_error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.code())
    }
}

// =============================================================================
// ENGINE ERROR
// =============================================================================

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("user {0} not found")]
    UserNotFound(UserId),

    #[error("user {0} already exists")]
    UserAlreadyExists(UserId),

    #[error("journey #{0} not found")]
    JourneyNotFound(JourneyNumber),

    #[error("conversation {0} not found")]
    ConversationNotFound(ConversationId),

    #[error("{upgrade_prompt}")]
    EntitlementRequired {
        feature: PremiumFeature,
        upgrade_prompt: String,
    },

    #[error("completion provider unavailable: {0}")]
    UpstreamUnavailable(#[from] CompletionError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("cannot {action} journey #{journey} while it is {status}")]
    InvalidTransition {
        journey: JourneyNumber,
        status: JourneyStatus,
        action: &'static str,
    },

    #[error("user was modified concurrently (expected version {expected}, found {found})")]
    Conflict { expected: u64, found: u64 },

    #[error("storage failure: {0}")]
    Store(String),
}

impl EngineError {
    pub fn entitlement_required(feature: PremiumFeature) -> Self {
        EngineError::EntitlementRequired {
            feature,
            upgrade_prompt: feature.upgrade_prompt().to_string(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::UserNotFound(_) => ErrorCode::UserNotFound,
            EngineError::UserAlreadyExists(_) => ErrorCode::UserAlreadyExists,
            EngineError::JourneyNotFound(_) => ErrorCode::JourneyNotFound,
            EngineError::ConversationNotFound(_) => ErrorCode::ConversationNotFound,
            EngineError::EntitlementRequired { .. } => ErrorCode::EntitlementRequired,
            EngineError::UpstreamUnavailable(_) => ErrorCode::UpstreamUnavailable,
            EngineError::Validation(_) => ErrorCode::ValidationError,
            EngineError::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            EngineError::Conflict { .. } => ErrorCode::Conflict,
            EngineError::Store(_) => ErrorCode::StoreError,
        }
    }

    /// Record in [`ERROR_METRICS`] under `operation`.
    pub fn track(&self, operation: &str) {
        ERROR_METRICS.record_error(&self.code(), Some(operation));
    }

    pub fn to_response(&self) -> ErrorResponse {
        let code = self.code();
        ErrorResponse {
            code: code.code(),
            category: code.category().to_string(),
            message: self.to_string(),
            retryable: code.is_retryable(),
            upgrade_prompt: match self {
                EngineError::EntitlementRequired { upgrade_prompt, .. } => {
                    Some(upgrade_prompt.clone())
                }
                _ => None,
            },
        }
    }
}

impl From<DomainError> for EngineError {
    fn from(error: DomainError) -> Self {
        match error {
            DomainError::JourneyNotFound(number) => EngineError::JourneyNotFound(number),
            DomainError::ActiveJourneyLimit { .. } => {
                EngineError::entitlement_required(PremiumFeature::MultipleJourneys)
            }
            DomainError::InvalidTransition {
                journey,
                status,
                action,
            } => EngineError::InvalidTransition {
                journey,
                status,
                action,
            },
            DomainError::Validation(e) => EngineError::Validation(e),
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound(id) => EngineError::UserNotFound(id),
            StoreError::AlreadyExists(id) => EngineError::UserAlreadyExists(id),
            StoreError::Conflict { expected, found } => EngineError::Conflict { expected, found },
            other => EngineError::Store(other.to_string()),
        }
    }
}

/// Serializable error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: i32,
    pub category: String,
    pub message: String,
    pub retryable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upgrade_prompt: Option<String>,
}

// =============================================================================
// ERROR TELEMETRY
// =============================================================================

/// Error metrics for telemetry
#[derive(Debug, Default)]
pub struct ErrorMetrics {
    /// Total error count by error code
    error_counts: RwLock<HashMap<ErrorCode, AtomicU64>>,
    /// Error count by service operation
    operation_errors: RwLock<HashMap<String, AtomicU64>>,
    /// Error count by category
    category_counts: RwLock<HashMap<String, AtomicU64>>,
}

fn increment<K>(map: &RwLock<HashMap<K, AtomicU64>>, key: &K)
where
    K: std::hash::Hash + Eq + Clone,
{
    if let Some(counter) = map.read().get(key) {
        counter.fetch_add(1, Ordering::Relaxed);
        return;
    }
    map.write()
        .entry(key.clone())
        .or_insert_with(|| AtomicU64::new(0))
        .fetch_add(1, Ordering::Relaxed);
}

fn load<K, Q>(map: &RwLock<HashMap<K, AtomicU64>>, key: &Q) -> u64
where
    K: std::hash::Hash + Eq + std::borrow::Borrow<Q>,
    Q: std::hash::Hash + Eq + ?Sized,
{
    map.read()
        .get(key)
        .map(|c| c.load(Ordering::Relaxed))
        .unwrap_or(0)
}

impl ErrorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error occurrence
    pub fn record_error(&self, code: &ErrorCode, operation: Option<&str>) {
        increment(&self.error_counts, code);
        if let Some(operation) = operation {
            increment(&self.operation_errors, &operation.to_string());
        }
        let category = code.category();
        increment(&self.category_counts, &category.to_string());

        tracing::debug!(
            error_code = %code,
            operation = operation,
            category = category,
            "error recorded"
        );
    }

    pub fn get_error_count(&self, code: &ErrorCode) -> u64 {
        load(&self.error_counts, code)
    }

    pub fn get_operation_error_count(&self, operation: &str) -> u64 {
        load(&self.operation_errors, operation)
    }

    pub fn get_category_count(&self, category: &str) -> u64 {
        load(&self.category_counts, category)
    }

    /// Get all error statistics
    pub fn get_stats(&self) -> ErrorStats {
        fn snapshot<K: Clone + std::hash::Hash + Eq>(
            map: &RwLock<HashMap<K, AtomicU64>>,
        ) -> HashMap<K, u64> {
            map.read()
                .iter()
                .map(|(k, c)| (k.clone(), c.load(Ordering::Relaxed)))
                .collect()
        }

        ErrorStats {
            error_counts: snapshot(&self.error_counts),
            operation_errors: snapshot(&self.operation_errors),
            category_counts: snapshot(&self.category_counts),
        }
    }

    /// Reset all metrics
    pub fn reset(&self) {
        self.error_counts.write().clear();
        self.operation_errors.write().clear();
        self.category_counts.write().clear();
    }
}

/// Error statistics snapshot
#[derive(Debug, Clone, Serialize)]
pub struct ErrorStats {
    pub error_counts: HashMap<ErrorCode, u64>,
    pub operation_errors: HashMap<String, u64>,
    pub category_counts: HashMap<String, u64>,
}

/// Global error metrics instance
pub static ERROR_METRICS: once_cell::sync::Lazy<ErrorMetrics> =
    once_cell::sync::Lazy::new(ErrorMetrics::new);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StepNumber;

    #[test]
    fn test_error_code_values() {
        assert_eq!(ErrorCode::EntitlementRequired.code(), -32020);
        assert_eq!(ErrorCode::JourneyNotFound.code(), -32002);
        assert_eq!(ErrorCode::InternalError.code(), -32603);
    }

    #[test]
    fn test_retryable_errors() {
        assert!(ErrorCode::Conflict.is_retryable());
        assert!(ErrorCode::StoreError.is_retryable());
        assert!(!ErrorCode::EntitlementRequired.is_retryable());
        assert!(!ErrorCode::ValidationError.is_retryable());
    }

    #[test]
    fn test_active_limit_maps_to_entitlement_required() {
        let err = EngineError::from(DomainError::ActiveJourneyLimit { active: 1 });
        assert_eq!(err.code(), ErrorCode::EntitlementRequired);
        let body = err.to_response();
        assert_eq!(body.category, "entitlement_error");
        assert!(body.upgrade_prompt.unwrap().contains("one active journey"));
    }

    #[test]
    fn test_store_errors_map() {
        let conflict = EngineError::from(StoreError::Conflict {
            expected: 3,
            found: 4,
        });
        assert!(matches!(
            conflict,
            EngineError::Conflict {
                expected: 3,
                found: 4
            }
        ));
        assert!(conflict.to_response().retryable);

        let missing = EngineError::from(StoreError::NotFound(UserId::new("u").unwrap()));
        assert_eq!(missing.code(), ErrorCode::UserNotFound);
    }

    #[test]
    fn test_validation_display() {
        let err = EngineError::from(StepNumber::new(9).unwrap_err());
        assert_eq!(err.code(), ErrorCode::ValidationError);
        assert!(err.to_string().contains("StepNumber"));
    }

    #[test]
    fn test_error_metrics() {
        let metrics = ErrorMetrics::new();
        metrics.record_error(&ErrorCode::JourneyNotFound, Some("pause_journey"));
        metrics.record_error(&ErrorCode::JourneyNotFound, Some("pause_journey"));
        metrics.record_error(&ErrorCode::Conflict, None);

        assert_eq!(metrics.get_error_count(&ErrorCode::JourneyNotFound), 2);
        assert_eq!(metrics.get_operation_error_count("pause_journey"), 2);
        assert_eq!(metrics.get_category_count("not_found"), 2);
        assert_eq!(metrics.get_category_count("concurrency_error"), 1);

        let stats = metrics.get_stats();
        assert_eq!(stats.error_counts.len(), 2);

        metrics.reset();
        assert_eq!(metrics.get_error_count(&ErrorCode::Conflict), 0);
    }
}
