use crate::{AppState, handlers, navigation::RouteIntent};
use axum::{
    Router,
    routing::{delete, get, post},
};

/// Authenticated Router Module
///
/// Pages for every signed-in user. `create_router` wraps this router in the
/// session guard; anonymous visitors are redirected to `/login` before any
/// handler runs.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /dashboard
        .route(RouteIntent::Dashboard.path(), get(handlers::dashboard))
        // GET /dashboard/parking?date=
        // The calendar: availability of every active spot on one day.
        .route(RouteIntent::Parking.path(), get(handlers::parking))
        // GET /dashboard/parking/spots/{id}
        .route("/dashboard/parking/spots/{id}", get(handlers::parking_spot))
        // POST /dashboard/parking/reservations
        .route(
            "/dashboard/parking/reservations",
            post(handlers::create_reservation),
        )
        // DELETE /dashboard/parking/reservations/{id}
        // Owner-only, with an admin override inside the handler.
        .route(
            "/dashboard/parking/reservations/{id}",
            delete(handlers::cancel_reservation),
        )
}
