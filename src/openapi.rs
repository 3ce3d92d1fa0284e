//! OpenAPI 3.0 documentation assembly
//!
//! Aggregates the handler path annotations and domain schemas into a single
//! document served at `/api-docs/openapi.json`.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Routing Core API",
        description = "Domain routing and application resolution",
        license(name = "Proprietary"),
        contact(name = "Routing Core Team")
    ),
    tags(
        (name = "System", description = "Health checks and system status"),
        (name = "Domains", description = "Domains, routes and path delegations"),
        (name = "Users", description = "Directory search, navigation and per-user settings"),
        (name = "Apps", description = "Installed apps, tracks and version cleanup"),
        (name = "Preferences", description = "System and user version preferences"),
        (name = "Overrides", description = "System and user capability overrides"),
        (name = "Resolution", description = "Route, version and override resolution"),
    ),
    security(
        ("principal" = [])
    ),
    components(
        schemas(
            crate::api::MessageResponse,
            crate::api::health::HealthResponse,
            crate::api::user::ResetResponse,

            // ── Domains ────────────────────────────────────────────────
            crate::domain::Domain,
            crate::domain::CreateDomainInput,
            crate::domain::UpdateDomainInput,
            crate::domain::Route,
            crate::domain::SetRouteInput,
            crate::domain::Delegation,
            crate::domain::CreateDelegationInput,
            crate::domain::AccessSummary,
            crate::domain::DelegatedDomain,
            crate::domain::UserSummary,
            crate::domain::Role,
            crate::repository::CascadeSummary,

            // ── Apps ───────────────────────────────────────────────────
            crate::domain::App,
            crate::domain::AppSummary,
            crate::domain::AppDetail,
            crate::domain::UserApps,
            crate::domain::Track,
            crate::domain::SetTrackInput,
            crate::domain::RegisterAppInput,
            crate::domain::VersionChoice,
            crate::domain::VersionPreference,
            crate::domain::SetVersionPreferenceInput,
            crate::domain::OverrideKind,
            crate::domain::RoutingOverride,
            crate::domain::SetOverrideInput,
            crate::domain::RoutingTable,
            crate::service::CleanupReport,

            // ── Resolution ─────────────────────────────────────────────
            crate::resolver::RouteResolution,
            crate::resolver::VersionResolution,
            crate::resolver::VersionSource,
            crate::resolver::OverrideResolution,
            crate::resolver::OverrideSource,
        )
    ),
    paths(
        crate::api::health::health,
        crate::api::health::ready,

        crate::api::domain::list_domains,
        crate::api::domain::create_domain,
        crate::api::domain::get_domain,
        crate::api::domain::update_domain,
        crate::api::domain::delete_domain,
        crate::api::domain::list_routes,
        crate::api::domain::set_route,
        crate::api::domain::delete_route,
        crate::api::domain::list_delegations,
        crate::api::domain::create_delegation,
        crate::api::domain::delete_delegation,

        crate::api::user::search_users,
        crate::api::user::access_summary,
        crate::api::user::user_apps,
        crate::api::user::reset_user_apps,

        crate::api::app::list_apps,
        crate::api::app::register_app,
        crate::api::app::get_app,
        crate::api::app::set_track,
        crate::api::app::delete_track,
        crate::api::app::set_system_preference,
        crate::api::app::clear_system_preference,
        crate::api::app::set_user_preference,
        crate::api::app::clear_user_preference,
        crate::api::app::system_routing_table,
        crate::api::app::set_system_override,
        crate::api::app::delete_system_override,
        crate::api::app::set_user_override,
        crate::api::app::delete_user_override,
        crate::api::app::cleanup_app,
        crate::api::app::cleanup_all,

        crate::api::resolve::resolve_route,
        crate::api::resolve::resolve_version,
        crate::api::resolve::resolve_override,
    )
)]
pub struct ApiDoc;

impl ApiDoc {
    pub fn build() -> utoipa::openapi::OpenApi {
        let mut doc = Self::openapi();
        // Principal identity arrives in gateway-set headers
        if let Some(c) = doc.components.as_mut() {
            c.security_schemes.insert(
                "principal".to_string(),
                utoipa::openapi::security::SecurityScheme::ApiKey(
                    utoipa::openapi::security::ApiKey::Header(
                        utoipa::openapi::security::ApiKeyValue::new(
                            crate::middleware::auth::PRINCIPAL_ID_HEADER,
                        ),
                    ),
                ),
            );
        }
        doc
    }
}
