//! Server initialization and routing

use crate::api;
use crate::config::{Config, StoreBackend};
use crate::middleware::{ObservabilityLayer, SanitizedMakeSpan};
use crate::migration;
use crate::openapi::ApiDoc;
use crate::repository::{
    ConfigStore, InMemoryUserDirectory, MemoryConfigStore, MySqlConfigStore, MySqlUserDirectory,
    UserDirectory,
};
use crate::service::{AppService, CleanupCoordinator, DomainService};
use crate::state::HasServices;
use anyhow::{Context, Result};
use axum::{
    routing::{get, post, put},
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::mysql::MySqlPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

/// Application state shared across handlers
pub struct AppState<S: ConfigStore, D: UserDirectory> {
    pub config: Arc<Config>,
    pub store: Arc<S>,
    pub domain_service: Arc<DomainService<S, D>>,
    pub app_service: Arc<AppService<S>>,
    pub cleanup_coordinator: Arc<CleanupCoordinator<S>>,
    pub prometheus_handle: Option<PrometheusHandle>,
}

// Manual impl: a derive would require `S: Clone` and `D: Clone`.
impl<S: ConfigStore, D: UserDirectory> Clone for AppState<S, D> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            store: self.store.clone(),
            domain_service: self.domain_service.clone(),
            app_service: self.app_service.clone(),
            cleanup_coordinator: self.cleanup_coordinator.clone(),
            prometheus_handle: self.prometheus_handle.clone(),
        }
    }
}

impl<S: ConfigStore, D: UserDirectory> AppState<S, D> {
    /// Wire the services over one store and directory
    pub fn new(
        config: Config,
        store: Arc<S>,
        directory: Arc<D>,
        prometheus_handle: Option<PrometheusHandle>,
    ) -> Self {
        let attempts = config.routing.conflict_retry_attempts;
        let domain_service = DomainService::new(store.clone(), directory)
            .with_retry_attempts(attempts)
            .with_search_limit(config.routing.user_search_limit);
        let app_service = AppService::new(store.clone()).with_retry_attempts(attempts);
        let cleanup_coordinator =
            CleanupCoordinator::new(store.clone()).with_retry_attempts(attempts);

        Self {
            config: Arc::new(config),
            store,
            domain_service: Arc::new(domain_service),
            app_service: Arc::new(app_service),
            cleanup_coordinator: Arc::new(cleanup_coordinator),
            prometheus_handle,
        }
    }
}

impl<S: ConfigStore, D: UserDirectory> HasServices for AppState<S, D> {
    type Store = S;
    type Directory = D;

    fn config(&self) -> &Config {
        &self.config
    }

    fn domain_service(&self) -> &DomainService<S, D> {
        &self.domain_service
    }

    fn app_service(&self) -> &AppService<S> {
        &self.app_service
    }

    fn cleanup_coordinator(&self) -> &CleanupCoordinator<S> {
        &self.cleanup_coordinator
    }

    fn store(&self) -> &S {
        &self.store
    }

    fn prometheus_handle(&self) -> Option<&PrometheusHandle> {
        self.prometheus_handle.as_ref()
    }
}

/// Run the server on the configured backend
pub async fn run(config: Config, prometheus_handle: Option<PrometheusHandle>) -> Result<()> {
    match config.store {
        StoreBackend::Memory => {
            let directory = match &config.routing.user_directory_seed {
                Some(seed) => InMemoryUserDirectory::from_seed(seed)
                    .context("Invalid USER_DIRECTORY_SEED")?,
                None => InMemoryUserDirectory::default(),
            };
            info!("Using in-memory config store");
            let state = AppState::new(
                config,
                Arc::new(MemoryConfigStore::new()),
                Arc::new(directory),
                prometheus_handle,
            );
            serve(state).await
        }
        StoreBackend::MySql => {
            let db = config
                .database
                .clone()
                .context("DATABASE_URL is required for the mysql backend")?;
            if db.run_migrations {
                migration::run_migrations(&db).await?;
            }

            let pool = MySqlPoolOptions::new()
                .max_connections(db.max_connections)
                .min_connections(db.min_connections)
                .connect(&db.url)
                .await
                .context("Failed to connect to database")?;
            info!("Connected to database");

            if let Some(seed) = &config.routing.user_directory_seed {
                migration::seed_users(&pool, seed).await?;
            }

            let state = AppState::new(
                config,
                Arc::new(MySqlConfigStore::new(pool.clone())),
                Arc::new(MySqlUserDirectory::new(pool)),
                prometheus_handle,
            );
            serve(state).await
        }
    }
}

async fn serve<S: ConfigStore, D: UserDirectory>(state: AppState<S, D>) -> Result<()> {
    let cleanup_task = state
        .config
        .routing
        .cleanup_interval_secs
        .map(|secs| spawn_cleanup_task(state.cleanup_coordinator.clone(), Duration::from_secs(secs)));

    let http_addr = state.config.http_addr();
    let app = build_router(state);

    let listener = TcpListener::bind(&http_addr).await?;
    info!("HTTP server started on {}", http_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(task) = cleanup_task {
        task.abort();
    }
    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Run [`CleanupCoordinator::cleanup_all`] every `period`. Failures are
/// logged and retried on the next tick.
pub fn spawn_cleanup_task<S: ConfigStore>(
    coordinator: Arc<CleanupCoordinator<S>>,
    period: Duration,
) -> JoinHandle<()> {
    info!(period_secs = period.as_secs(), "Periodic version cleanup enabled");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match coordinator.cleanup_all().await {
                Ok(reports) => {
                    let removed: usize = reports.iter().map(|r| r.removed_count()).sum();
                    info!(apps = reports.len(), removed, "Periodic cleanup finished");
                }
                Err(e) => warn!("Periodic cleanup failed: {}", e),
            }
        }
    })
}

/// Build the HTTP router with generic state type
///
/// Generic over the state so tests can drive the same routes over the
/// in-memory store.
pub fn build_router<S: HasServices>(state: S) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // System
        .route("/health", get(api::health::health))
        .route("/ready", get(api::health::ready::<S>))
        .route("/metrics", get(api::health::metrics::<S>))
        .route(
            "/api-docs/openapi.json",
            get(|| async { Json(ApiDoc::build()) }),
        )
        // Domains
        .route(
            "/api/v1/domains",
            get(api::domain::list_domains::<S>).post(api::domain::create_domain::<S>),
        )
        .route(
            "/api/v1/domains/{domain}",
            get(api::domain::get_domain::<S>)
                .patch(api::domain::update_domain::<S>)
                .delete(api::domain::delete_domain::<S>),
        )
        .route(
            "/api/v1/domains/{domain}/routes",
            get(api::domain::list_routes::<S>)
                .put(api::domain::set_route::<S>)
                .delete(api::domain::delete_route::<S>),
        )
        .route(
            "/api/v1/domains/{domain}/delegations",
            get(api::domain::list_delegations::<S>)
                .post(api::domain::create_delegation::<S>)
                .delete(api::domain::delete_delegation::<S>),
        )
        // Users
        .route("/api/v1/users/search", get(api::user::search_users::<S>))
        .route("/api/v1/me/access", get(api::user::access_summary::<S>))
        .route("/api/v1/user/apps", get(api::user::user_apps::<S>))
        .route(
            "/api/v1/user/apps/reset",
            post(api::user::reset_user_apps::<S>),
        )
        // Apps
        .route(
            "/api/v1/apps",
            get(api::app::list_apps::<S>).post(api::app::register_app::<S>),
        )
        .route("/api/v1/apps/cleanup", post(api::app::cleanup_all::<S>))
        .route("/api/v1/apps/{app}", get(api::app::get_app::<S>))
        .route(
            "/api/v1/apps/{app}/tracks/{track}",
            put(api::app::set_track::<S>).delete(api::app::delete_track::<S>),
        )
        .route(
            "/api/v1/apps/{app}/cleanup",
            post(api::app::cleanup_app::<S>),
        )
        // Version preferences
        .route(
            "/api/v1/system/apps/{app}/preference",
            put(api::app::set_system_preference::<S>)
                .delete(api::app::clear_system_preference::<S>),
        )
        .route(
            "/api/v1/user/apps/{app}/preference",
            put(api::app::set_user_preference::<S>).delete(api::app::clear_user_preference::<S>),
        )
        // Overrides
        .route(
            "/api/v1/system/overrides",
            get(api::app::system_routing_table::<S>)
                .put(api::app::set_system_override::<S>)
                .delete(api::app::delete_system_override::<S>),
        )
        .route(
            "/api/v1/user/overrides",
            put(api::app::set_user_override::<S>).delete(api::app::delete_user_override::<S>),
        )
        // Resolution
        .route("/api/v1/resolve/route", get(api::resolve::resolve_route::<S>))
        .route(
            "/api/v1/resolve/version",
            get(api::resolve::resolve_version::<S>),
        )
        .route(
            "/api/v1/resolve/override",
            get(api::resolve::resolve_override::<S>),
        )
        .layer(ObservabilityLayer)
        .layer(TraceLayer::new_for_http().make_span_with(SanitizedMakeSpan))
        .layer(cors)
        .with_state(state)
}
