//! Application state trait for dependency injection
//!
//! Handlers are generic over [`HasServices`], so the same handler code runs
//! against the MySQL-backed production state and the in-memory state used
//! by tests.

use crate::config::Config;
use crate::repository::{ConfigStore, UserDirectory};
use crate::service::{AppService, CleanupCoordinator, DomainService};
use metrics_exporter_prometheus::PrometheusHandle;

pub trait HasServices: Clone + Send + Sync + 'static {
    /// The config store backing every service
    type Store: ConfigStore;
    /// The user directory consulted for delegations and search
    type Directory: UserDirectory;

    fn config(&self) -> &Config;

    /// Domains, routes, delegations and user search
    fn domain_service(&self) -> &DomainService<Self::Store, Self::Directory>;

    /// Apps, tracks, version preferences and overrides
    fn app_service(&self) -> &AppService<Self::Store>;

    fn cleanup_coordinator(&self) -> &CleanupCoordinator<Self::Store>;

    fn store(&self) -> &Self::Store;

    /// Present when metrics are enabled
    fn prometheus_handle(&self) -> Option<&PrometheusHandle>;
}
