use crate::{AppState, handlers, navigation::{DEPRECATED_PARKING_PATHS, RouteIntent}};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints that run without a guard. The handlers here decide on their own
/// where an anonymous or signed-in visitor should go.
pub fn public_routes() -> Router<AppState> {
    let router = Router::new()
        // GET /health
        // Liveness check for the load balancer.
        .route("/health", get(|| async { "ok" }))
        // GET /
        // Root redirector: login without a session, otherwise the role's home.
        .route(RouteIntent::Root.path(), get(handlers::root))
        // GET /login
        .route(RouteIntent::Login.path(), get(handlers::login))
        // GET /auth/callback
        // Return leg of the Microsoft sign-in brokered by Supabase.
        .route(RouteIntent::Callback.path(), get(handlers::auth_callback))
        // POST /auth/logout
        .route(RouteIntent::Logout.path(), post(handlers::logout));

    // Bookmarks to the retired calendar pages keep working.
    DEPRECATED_PARKING_PATHS.into_iter().fold(router, |router, path| {
        router.route(path, get(handlers::deprecated_parking_redirect))
    })
}
