//! Routing Core - domain routing and application resolution engine
//!
//! Maps `(domain, path)` requests to content entities, lets administrators
//! delegate path subtrees to users, and resolves which installed app (and
//! which version of it) serves a capability for a given user.

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod middleware;
pub mod migration;
pub mod openapi;
pub mod policy;
pub mod repository;
pub mod resolver;
pub mod server;
pub mod service;
pub mod state;
pub mod telemetry;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, Result};
