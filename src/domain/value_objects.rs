//! Domain Value Objects with NewType pattern for type safety
//!
//! Identifiers and bounded integers used across the journey engine are wrapped
//! in distinct types so that a `SessionId` can never be passed where a
//! `ConversationId` is expected, and a `StepNumber` can never hold 0 or 8.
//!
//! ```rust,ignore
//! let step = StepNumber::new(3)?;
//! let journey = JourneyNumber::new(1)?;
//! // user.update_step(step, journey)  ✗ Compile error!
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Number of steps in the method.
pub const STEP_COUNT: u8 = 7;

// ============================================================================
// UserId - Identity of the owning user
// ============================================================================

/// Identity of a user aggregate.
///
/// # Validation
/// - Must not be empty or whitespace only
/// - Maximum length: 128 characters
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    const MAX_LENGTH: usize = 128;

    /// Creates a new UserId with validation.
    ///
    /// # Errors
    /// Returns `Err` if the ID is empty or exceeds maximum length.
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ValidationError::Empty("UserId"));
        }
        if id.len() > Self::MAX_LENGTH {
            return Err(ValidationError::TooLong {
                field: "UserId",
                max: Self::MAX_LENGTH,
                actual: id.len(),
            });
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> String {
        id.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// SessionId - Caller-facing chat session key
// ============================================================================

/// Key a caller uses to continue a chat session.
///
/// Supplied by the caller or synthesized with [`SessionId::generate`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    const MAX_LENGTH: usize = 256;

    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ValidationError::Empty("SessionId"));
        }
        if id.len() > Self::MAX_LENGTH {
            return Err(ValidationError::TooLong {
                field: "SessionId",
                max: Self::MAX_LENGTH,
                actual: id.len(),
            });
        }
        Ok(Self(id))
    }

    /// Synthesizes a fresh session key.
    pub fn generate() -> Self {
        Self(format!("session_{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SessionId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> String {
        id.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// ConversationId - Engine-generated thread identity
// ============================================================================

/// Identity of a conversation thread, always generated by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConversationId(String);

impl ConversationId {
    pub fn generate() -> Self {
        Self(format!("conv_{}", Uuid::new_v4().simple()))
    }

    /// Wraps a caller-provided id for lookups. Lookups of unknown ids simply miss.
    pub fn parse(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ValidationError::Empty("ConversationId"));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ConversationId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<ConversationId> for String {
    fn from(id: ConversationId) -> String {
        id.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// ResourceId - Identifier of a library resource (worksheet, meditation, ...)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceId(String);

impl ResourceId {
    const MAX_LENGTH: usize = 256;

    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ValidationError::Empty("ResourceId"));
        }
        if id.len() > Self::MAX_LENGTH {
            return Err(ValidationError::TooLong {
                field: "ResourceId",
                max: Self::MAX_LENGTH,
                actual: id.len(),
            });
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ResourceId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ResourceId> for String {
    fn from(id: ResourceId) -> String {
        id.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// JourneyNumber - 1-based, per-user journey sequence number
// ============================================================================

/// Per-user journey sequence number.
///
/// # Validation
/// - Must be >= 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct JourneyNumber(u32);

impl JourneyNumber {
    pub fn new(value: u32) -> Result<Self, ValidationError> {
        if value == 0 {
            return Err(ValidationError::OutOfRange {
                field: "JourneyNumber",
                min: 1,
                max: u32::MAX as i64,
                actual: 0,
            });
        }
        Ok(Self(value))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for JourneyNumber {
    type Error = ValidationError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<JourneyNumber> for u32 {
    fn from(number: JourneyNumber) -> u32 {
        number.0
    }
}

impl fmt::Display for JourneyNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// StepNumber - 1..=7 position in the method
// ============================================================================

/// Position of a step in the seven-step method.
///
/// # Validation
/// - Must be within 1..=7
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct StepNumber(u8);

impl StepNumber {
    pub const FIRST: StepNumber = StepNumber(1);
    pub const LAST: StepNumber = StepNumber(STEP_COUNT);

    pub fn new(value: u8) -> Result<Self, ValidationError> {
        if !(1..=STEP_COUNT).contains(&value) {
            return Err(ValidationError::OutOfRange {
                field: "StepNumber",
                min: 1,
                max: STEP_COUNT as i64,
                actual: value as i64,
            });
        }
        Ok(Self(value))
    }

    /// Callers must pass a value within 1..=7.
    pub(crate) const fn from_raw(value: u8) -> Self {
        Self(value)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Following step, or `None` on the last one.
    pub fn next(self) -> Option<StepNumber> {
        if self.0 < STEP_COUNT {
            Some(StepNumber(self.0 + 1))
        } else {
            None
        }
    }

    pub fn all() -> impl Iterator<Item = StepNumber> {
        (1..=STEP_COUNT).map(StepNumber)
    }
}

impl TryFrom<u8> for StepNumber {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<StepNumber> for u8 {
    fn from(step: StepNumber) -> u8 {
        step.0
    }
}

impl fmt::Display for StepNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Validation Errors
// ============================================================================

/// Validation errors for value objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Field is empty when it must have a value
    Empty(&'static str),
    /// Field exceeds maximum length
    TooLong {
        field: &'static str,
        max: usize,
        actual: usize,
    },
    /// Value is outside the allowed range
    OutOfRange {
        field: &'static str,
        min: i64,
        max: i64,
        actual: i64,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Empty(field) => write!(f, "{} cannot be empty", field),
            ValidationError::TooLong { field, max, actual } => write!(
                f,
                "{} exceeds maximum length (max: {}, actual: {})",
                field, max, actual
            ),
            ValidationError::OutOfRange {
                field,
                min,
                max,
                actual,
            } => write!(
                f,
                "{} out of range (min: {}, max: {}, actual: {})",
                field, min, max, actual
            ),
        }
    }
}

impl std::error::Error for ValidationError {}
