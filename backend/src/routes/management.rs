use crate::{AppState, handlers, navigation::RouteIntent};
use axum::{
    Router,
    routing::{delete, get},
};

/// Management Router Module
///
/// Visitor registration. Guarded for management and admin roles; employees are
/// sent back to the dashboard home.
pub fn management_routes() -> Router<AppState> {
    Router::new()
        // GET|POST /dashboard/visitors
        .route(
            RouteIntent::Visitors.path(),
            get(handlers::visitors).post(handlers::register_visitor),
        )
        // DELETE /dashboard/visitors/{id}
        .route("/dashboard/visitors/{id}", delete(handlers::remove_visitor))
}
