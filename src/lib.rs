//! Journey progression and coaching context engine for the seven-step RELEASE
//! forgiveness method.
//!
//! The crate is organised around one aggregate, [`domain::User`], which owns a
//! user's journeys, completed resources and coaching conversations. The
//! [`service::JourneyService`] loads it from a [`store::UserStore`], applies the
//! requested transition and saves it back under optimistic concurrency.

pub mod cli;
pub mod coaching;
pub mod completion;
pub mod config;
pub mod domain;
pub mod entitlement;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod service;
pub mod store;

pub use cli::{Cli, Command};
pub use config::{CompletionProviderKind, ConfigArgs, EngineConfig, EntitlementProviderKind};
pub use error::{ERROR_METRICS, EngineError, ErrorCode, ErrorMetrics, ErrorResponse};
pub use logging::{LoggingConfig, init_logging, shutdown_telemetry};
pub use metrics::METRICS;
pub use service::{Clock, JourneyService, ServiceSettings};
