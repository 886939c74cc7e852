use axum::{
    Router,
    extract::{FromRef, Request, State},
    http::HeaderName,
    middleware::{self, Next},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod navigation;
pub mod repository;

// Routers grouped by the guard protecting them (public, authenticated, management, admin).
pub mod routes;
use auth::{
    Access, GuardRejection, JwtSessionResolver, RequestContext, Requirement, SessionState,
    SupabaseAuthClient, SupabaseSessionResolver,
};
use routes::{admin, authenticated, management, public};

// --- Public Re-exports ---

pub use config::{AppConfig, AuthMode};
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};

/// ApiDoc
///
/// OpenAPI document for every page endpoint, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::root, handlers::login, handlers::auth_callback, handlers::logout,
        handlers::dashboard, handlers::parking, handlers::parking_spot,
        handlers::create_reservation, handlers::cancel_reservation,
        handlers::visitors, handlers::register_visitor, handlers::remove_visitor,
        handlers::admin_overview, handlers::admin_list_spots, handlers::admin_create_spot,
        handlers::admin_update_spot, handlers::admin_delete_spot, handlers::admin_list_users,
        handlers::admin_user_detail, handlers::admin_set_role
    ),
    components(
        schemas(
            models::Role, models::Profile, models::Identity, models::ParkingSpot,
            models::Reservation, models::Visitor, models::CreateReservationRequest,
            models::CreateVisitorRequest, models::CreateSpotRequest, models::UpdateSpotRequest,
            models::UpdateRoleRequest, models::LoginView, models::DashboardView,
            models::SpotAvailability, models::ParkingView, models::SpotDetailView,
            models::AdminOverview,
        )
    ),
    tags(
        (name = "parking-portal", description = "Corporate parking reservations")
    )
)]
struct ApiDoc;

/// AppState
///
/// Immutable container for the shared services, cloned into every request.
#[derive(Clone)]
pub struct AppState {
    /// Persistence layer (Postgres in production, in-memory in tests).
    pub repo: RepositoryState,
    /// Session resolution against Supabase Auth.
    pub sessions: SessionState,
    /// Supabase Auth endpoints used by the sign-in flow.
    pub auth: SupabaseAuthClient,
    /// The loaded environment configuration.
    pub config: AppConfig,
}

impl AppState {
    /// Wires the session resolver selected by `config.auth_mode` onto `repo`.
    ///
    /// # Panics
    /// Panics if the HTTP client for Supabase Auth cannot be built (no TLS backend).
    pub fn new(repo: RepositoryState, config: AppConfig) -> Self {
        let auth = SupabaseAuthClient::new(
            &config.supabase_url,
            &config.supabase_anon_key,
            config.provider_timeout,
        )
        .expect("FATAL: Failed to build the Supabase Auth HTTP client.");

        let sessions: SessionState = match config.auth_mode {
            AuthMode::Jwt => Arc::new(JwtSessionResolver::new(repo.clone(), &config.jwt_secret)),
            AuthMode::Remote => Arc::new(SupabaseSessionResolver::new(repo.clone(), auth.clone())),
        };
        Self {
            repo,
            sessions,
            auth,
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for SessionState {
    fn from_ref(app_state: &AppState) -> SessionState {
        app_state.sessions.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// guarded_layout
///
/// Runs one guard in front of a whole router. On success the resolved
/// `Identity` is stored in the request extensions, where the handler
/// extractors pick it up instead of resolving the session again. On denial
/// the redirect is returned and the handler never runs.
async fn guarded_layout(
    state: AppState,
    requirement: Requirement,
    mut request: Request,
    next: Next,
) -> Response {
    let ctx = RequestContext::from_headers(request.headers(), &state.config);
    match auth::require(state.sessions.as_ref(), &ctx, requirement).await {
        Ok(Access::Allowed(identity)) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Ok(Access::Denied(intent)) => {
            tracing::debug!(
                path = %request.uri().path(),
                redirect = %intent,
                ?requirement,
                "guarded layout denied access"
            );
            GuardRejection::Redirect(intent).into_response()
        }
        Err(err) => GuardRejection::Failed(err).into_response(),
    }
}

async fn session_layout(State(state): State<AppState>, request: Request, next: Next) -> Response {
    guarded_layout(state, Requirement::Session, request, next).await
}

async fn management_layout(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    guarded_layout(state, Requirement::Management, request, next).await
}

async fn admin_layout(State(state): State<AppState>, request: Request, next: Next) -> Response {
    guarded_layout(state, Requirement::Admin, request, next).await
}

/// create_router
///
/// Assembles the routing structure, applies the guarded layouts and the global
/// observability layers, and registers the application state.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                session_layout,
            )),
        )
        .merge(
            management::management_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                management_layout,
            )),
        )
        .merge(admin::admin_routes().route_layer(middleware::from_fn_with_state(
            state.clone(),
            admin_layout,
        )))
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for every request, tagged with the `x-request-id` so all log lines of
/// one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
