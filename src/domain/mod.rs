//! Domain models for Routing Core

pub mod app;
pub mod common;
pub mod delegation;
pub mod host;
pub mod route;
pub mod routing_override;
pub mod user;

pub use app::*;
pub use common::*;
pub use delegation::*;
pub use host::*;
pub use route::*;
pub use routing_override::*;
pub use user::*;
