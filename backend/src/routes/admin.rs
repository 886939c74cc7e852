use crate::{AppState, handlers, navigation::RouteIntent};
use axum::{
    Router,
    routing::{get, put},
};

/// Admin Router Module
///
/// Spot, user and role management. The whole router sits behind the admin
/// guard, and each handler additionally takes an `AdminUser`, so a route moved
/// here by mistake without the layer is still protected.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /dashboard/admin
        .route(RouteIntent::Admin.path(), get(handlers::admin_overview))
        // GET|POST /dashboard/admin/spots
        .route(
            RouteIntent::AdminSpots.path(),
            get(handlers::admin_list_spots).post(handlers::admin_create_spot),
        )
        // PUT|DELETE /dashboard/admin/spots/{id}
        .route(
            "/dashboard/admin/spots/{id}",
            put(handlers::admin_update_spot).delete(handlers::admin_delete_spot),
        )
        // GET /dashboard/admin/users
        .route(RouteIntent::AdminUsers.path(), get(handlers::admin_list_users))
        // GET /dashboard/admin/users/{id}
        .route(
            "/dashboard/admin/users/{id}",
            get(handlers::admin_user_detail),
        )
        // PUT /dashboard/admin/users/{id}/role
        .route(
            "/dashboard/admin/users/{id}/role",
            put(handlers::admin_set_role),
        )
}
