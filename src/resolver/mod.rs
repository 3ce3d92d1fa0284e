//! Pure resolution over already-loaded configuration.
//!
//! Nothing in here touches the store; services load the relevant records
//! and hand them to these functions, so every resolution sees one
//! consistent snapshot.

pub mod cascade;
pub mod route;
pub mod routing_override;
pub mod version;

pub use cascade::{Cascade, Resolved};
pub use route::{resolve_route, RouteResolution};
pub use routing_override::{resolve_override, OverrideResolution, OverrideSource};
pub use version::{
    compare_versions, highest_version, resolve_version, sort_versions, unused_versions,
    VersionResolution, VersionSource,
};
