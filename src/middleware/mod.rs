//! HTTP middleware for Routing Core
//!
//! - Principal extraction (`AuthUser`, `OptionalAuth`)
//! - Request ID propagation and HTTP metrics
//! - Sanitized request spans

pub mod auth;
pub mod metrics;
pub mod trace;

pub use auth::{AuthUser, OptionalAuth};
pub use metrics::ObservabilityLayer;
pub use trace::SanitizedMakeSpan;
