use crate::{
    AppState,
    auth::{
        AdminUser, CurrentUser, ManagementUser, PkceChallenge, RequestContext, classify,
        home_route_for_role, landing_for, root_destination, session::parse_cookie,
    },
    config::{AppConfig, CODE_VERIFIER_COOKIE, Env},
    error::{AppError, AppResult},
    models::{
        AdminOverview, CreateReservationRequest, CreateSpotRequest, CreateVisitorRequest,
        DashboardView, LoginView, ParkingSpot, ParkingView, Profile, Reservation, Role,
        SpotAvailability, SpotDetailView, UpdateRoleRequest, UpdateSpotRequest, Visitor,
    },
    navigation::RouteIntent,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Redirect, Response},
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;

// --- Query Structs ---

/// DateQuery
///
/// `?date=YYYY-MM-DD` for the parking calendar. Defaults to today.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct DateQuery {
    pub date: Option<NaiveDate>,
}

/// FromQuery
///
/// `?from=YYYY-MM-DD` for listings that start at a date. Defaults to today.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct FromQuery {
    pub from: Option<NaiveDate>,
}

/// CallbackParams
///
/// What Supabase hands back after the Entra ID sign-in: a PKCE `code` on
/// success, `error` and `error_description` otherwise.
#[derive(Deserialize, utoipa::IntoParams, Default)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn redirect(intent: RouteIntent) -> Response {
    Redirect::to(intent.path()).into_response()
}

fn cookie(config: &AppConfig, attributes: String) -> Option<HeaderValue> {
    let secure = if config.env == Env::Production { "; Secure" } else { "" };
    HeaderValue::from_str(&format!("{attributes}; HttpOnly; SameSite=Lax{secure}")).ok()
}

fn session_cookie(config: &AppConfig, token: &str) -> Option<HeaderValue> {
    cookie(config, format!("{}={}; Path=/", config.session_cookie, token))
}

fn cleared_session_cookie(config: &AppConfig) -> Option<HeaderValue> {
    cookie(
        config,
        format!("{}=deleted; Path=/; Max-Age=0", config.session_cookie),
    )
}

/// The verifier only has to survive the round-trip to Microsoft, and only the
/// callback (under `/auth`) reads it.
fn code_verifier_cookie(config: &AppConfig, verifier: &str) -> Option<HeaderValue> {
    cookie(
        config,
        format!("{CODE_VERIFIER_COOKIE}={verifier}; Path=/auth; Max-Age=600"),
    )
}

fn cleared_code_verifier_cookie(config: &AppConfig) -> Option<HeaderValue> {
    cookie(
        config,
        format!("{CODE_VERIFIER_COOKIE}=deleted; Path=/auth; Max-Age=0"),
    )
}

fn with_cookies(
    cookies: impl IntoIterator<Item = Option<HeaderValue>>,
    intent: RouteIntent,
) -> Response {
    let mut headers = HeaderMap::new();
    for cookie in cookies.into_iter().flatten() {
        headers.append(header::SET_COOKIE, cookie);
    }
    (headers, Redirect::to(intent.path())).into_response()
}

// --- Entry & Session Handlers ---

/// root
///
/// [Public Route] Sends the visitor where they belong: the login page without a
/// session, otherwise the landing page of their role.
#[utoipa::path(
    get,
    path = "/",
    responses((status = 303, description = "Redirect to login or the role's home"))
)]
pub async fn root(State(state): State<AppState>, ctx: RequestContext) -> AppResult<Redirect> {
    let destination = root_destination(state.sessions.as_ref(), &ctx).await?;
    Ok(Redirect::to(destination.path()))
}

/// login
///
/// [Public Route] Returns the Supabase authorize URL for the Microsoft sign-in
/// and stores a fresh PKCE verifier for the callback. A visitor who is already
/// signed in is sent home instead.
#[utoipa::path(
    get,
    path = "/login",
    responses(
        (status = 200, description = "Login page", body = LoginView),
        (status = 303, description = "Already signed in")
    )
)]
pub async fn login(State(state): State<AppState>, ctx: RequestContext) -> AppResult<Response> {
    if let Some(identity) = state.sessions.current_user(&ctx).await? {
        return Ok(redirect(landing_for(Some(&identity))));
    }

    let pkce = PkceChallenge::generate();
    let mut headers = HeaderMap::new();
    if let Some(cookie) = code_verifier_cookie(&state.config, &pkce.verifier) {
        headers.insert(header::SET_COOKIE, cookie);
    }

    Ok((
        headers,
        Json(LoginView {
            provider: "azure".to_string(),
            authorize_url: state
                .config
                .authorize_url(RouteIntent::Callback.path(), &pkce.challenge),
        }),
    )
        .into_response())
}

/// auth_callback
///
/// [Public Route] Landing point after sign-in. Exchanges the PKCE `code` for an
/// access token, stores it in the session cookie and hands over to the root
/// redirector. A refused code or a missing verifier goes back to the login page.
#[utoipa::path(
    get,
    path = "/auth/callback",
    params(CallbackParams),
    responses(
        (status = 303, description = "Redirect to / on success, /login on failure"),
        (status = 502, description = "Supabase Auth unreachable")
    )
)]
pub async fn auth_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> AppResult<Response> {
    let config = &state.config;

    if let Some(error) = params.error {
        tracing::warn!(
            %error,
            description = params.error_description.as_deref().unwrap_or(""),
            "sign-in failed at the identity provider"
        );
        return Ok(with_cookies(
            [cleared_code_verifier_cookie(config)],
            RouteIntent::Login,
        ));
    }

    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        return Ok(redirect(RouteIntent::Root));
    };
    let Some(verifier) = parse_cookie(&headers, CODE_VERIFIER_COOKIE) else {
        tracing::warn!("sign-in callback without a code verifier cookie");
        return Ok(redirect(RouteIntent::Login));
    };

    let Some(token) = state.auth.exchange_code(&code, &verifier).await? else {
        return Ok(with_cookies(
            [cleared_code_verifier_cookie(config)],
            RouteIntent::Login,
        ));
    };

    match session_cookie(config, &token) {
        Some(cookie) => Ok(with_cookies(
            [Some(cookie), cleared_code_verifier_cookie(config)],
            RouteIntent::Root,
        )),
        None => {
            tracing::warn!("access token is not a valid cookie value");
            Ok(redirect(RouteIntent::Login))
        }
    }
}

/// logout
///
/// [Public Route] Drops the session cookie and returns to the login page.
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 303, description = "Redirect to /login"))
)]
pub async fn logout(State(state): State<AppState>) -> Response {
    with_cookies([cleared_session_cookie(&state.config)], RouteIntent::Login)
}

/// deprecated_parking_redirect
///
/// [Public Route] Old calendar and reservation URLs all land on the parking page.
pub async fn deprecated_parking_redirect() -> Redirect {
    Redirect::to(RouteIntent::Parking.path())
}

// --- Authenticated Pages ---

/// dashboard
///
/// [Authenticated Route] Greeting, role, and the caller's upcoming reservations.
#[utoipa::path(
    get,
    path = "/dashboard",
    responses(
        (status = 200, description = "Dashboard", body = DashboardView),
        (status = 303, description = "No session")
    )
)]
pub async fn dashboard(
    CurrentUser(identity): CurrentUser,
    State(state): State<AppState>,
) -> AppResult<Json<DashboardView>> {
    let upcoming = state
        .repo
        .reservations_for_user(identity.id, today())
        .await?;

    Ok(Json(DashboardView {
        user_id: identity.id,
        display_name: identity.display_name(),
        role: classify(identity.profile_role()),
        home: home_route_for_role(identity.profile_role()).path().to_string(),
        upcoming,
    }))
}

/// parking
///
/// [Authenticated Route] The parking calendar: every active spot and whether it
/// is free on the requested day.
#[utoipa::path(
    get,
    path = "/dashboard/parking",
    params(DateQuery),
    responses((status = 200, description = "Availability", body = ParkingView))
)]
pub async fn parking(
    CurrentUser(identity): CurrentUser,
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> AppResult<Json<ParkingView>> {
    let date = query.date.unwrap_or_else(today);
    let spots = state.repo.list_spots(false).await?;
    let reservations = state.repo.reservations_on(date).await?;
    let visitors = state.repo.visitors_on(date).await?;

    let spots = spots
        .into_iter()
        .map(|spot| {
            let reservation = reservations.iter().find(|r| r.spot_id == spot.id);
            let visitor_assigned = visitors.iter().any(|v| v.spot_id == Some(spot.id));
            SpotAvailability {
                available: reservation.is_none() && !visitor_assigned,
                reserved_by_me: reservation.is_some_and(|r| r.user_id == identity.id),
                spot,
            }
        })
        .collect();

    Ok(Json(ParkingView { date, spots }))
}

/// parking_spot
///
/// [Authenticated Route] One spot and its upcoming reservations. A spot that no
/// longer exists (or was deactivated) sends the user back to the calendar.
#[utoipa::path(
    get,
    path = "/dashboard/parking/spots/{id}",
    params(("id" = Uuid, Path, description = "Spot ID")),
    responses(
        (status = 200, description = "Spot", body = SpotDetailView),
        (status = 303, description = "Unknown spot, back to /dashboard/parking")
    )
)]
pub async fn parking_spot(
    CurrentUser(_identity): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    let spot = match state.repo.get_spot(id).await? {
        Some(spot) if spot.is_active => spot,
        _ => return Ok(redirect(RouteIntent::Parking)),
    };
    let reservations = state.repo.reservations_for_spot(id, today()).await?;
    Ok(Json(SpotDetailView { spot, reservations }).into_response())
}

/// create_reservation
///
/// [Authenticated Route] Books a spot for the caller on one day.
///
/// *Rules*: no past dates, only active spots, one booking per spot per day and one
/// reservation per user per day (the last two answer 409).
#[utoipa::path(
    post,
    path = "/dashboard/parking/reservations",
    request_body = CreateReservationRequest,
    responses(
        (status = 201, description = "Reserved", body = Reservation),
        (status = 400, description = "Past date or unknown spot"),
        (status = 409, description = "Already booked")
    )
)]
pub async fn create_reservation(
    CurrentUser(identity): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateReservationRequest>,
) -> AppResult<(StatusCode, Json<Reservation>)> {
    if payload.date < today() {
        return Err(AppError::BadRequest(
            "cannot reserve a date in the past".to_string(),
        ));
    }
    match state.repo.get_spot(payload.spot_id).await? {
        Some(spot) if spot.is_active => {}
        _ => return Err(AppError::BadRequest("spot is not bookable".to_string())),
    }

    let reservation = state
        .repo
        .create_reservation(payload.spot_id, identity.id, payload.date)
        .await?;
    tracing::info!(
        reservation_id = %reservation.id,
        user_id = %identity.id,
        date = %reservation.reserved_for,
        "reservation created"
    );
    Ok((StatusCode::CREATED, Json(reservation)))
}

/// cancel_reservation
///
/// [Authenticated Route] Owners cancel their own reservations; admins may cancel any.
#[utoipa::path(
    delete,
    path = "/dashboard/parking/reservations/{id}",
    params(("id" = Uuid, Path, description = "Reservation ID")),
    responses(
        (status = 204, description = "Cancelled"),
        (status = 404, description = "Not found or not yours")
    )
)]
pub async fn cancel_reservation(
    CurrentUser(identity): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let cancelled = if classify(identity.profile_role()) == Role::Admin {
        state.repo.cancel_reservation_admin(id).await?
    } else {
        state.repo.cancel_reservation(id, identity.id).await?
    };

    if cancelled {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("reservation".to_string()))
    }
}

// --- Management Pages ---

/// visitors
///
/// [Management Route] Registered visitors from a date onwards.
#[utoipa::path(
    get,
    path = "/dashboard/visitors",
    params(FromQuery),
    responses((status = 200, description = "Visitors", body = [Visitor]))
)]
pub async fn visitors(
    ManagementUser(_identity): ManagementUser,
    State(state): State<AppState>,
    Query(query): Query<FromQuery>,
) -> AppResult<Json<Vec<Visitor>>> {
    let from = query.from.unwrap_or_else(today);
    Ok(Json(state.repo.visitors_from(from).await?))
}

/// register_visitor
///
/// [Management Route] Registers an external guest with the caller as host,
/// optionally holding a spot for the visit day.
#[utoipa::path(
    post,
    path = "/dashboard/visitors",
    request_body = CreateVisitorRequest,
    responses(
        (status = 201, description = "Registered", body = Visitor),
        (status = 400, description = "Invalid visitor"),
        (status = 409, description = "Spot already booked")
    )
)]
pub async fn register_visitor(
    ManagementUser(identity): ManagementUser,
    State(state): State<AppState>,
    Json(mut payload): Json<CreateVisitorRequest>,
) -> AppResult<(StatusCode, Json<Visitor>)> {
    payload.full_name = payload.full_name.trim().to_string();
    if payload.full_name.is_empty() {
        return Err(AppError::BadRequest("visitor name is required".to_string()));
    }
    if payload.visit_date < today() {
        return Err(AppError::BadRequest(
            "cannot register a visit in the past".to_string(),
        ));
    }
    if let Some(spot_id) = payload.spot_id {
        match state.repo.get_spot(spot_id).await? {
            Some(spot) if spot.is_active => {}
            _ => return Err(AppError::BadRequest("spot is not bookable".to_string())),
        }
    }

    let visitor = state.repo.create_visitor(identity.id, payload).await?;
    tracing::info!(visitor_id = %visitor.id, host_id = %identity.id, "visitor registered");
    Ok((StatusCode::CREATED, Json(visitor)))
}

/// remove_visitor
#[utoipa::path(
    delete,
    path = "/dashboard/visitors/{id}",
    params(("id" = Uuid, Path, description = "Visitor ID")),
    responses(
        (status = 204, description = "Removed"),
        (status = 404, description = "Not found")
    )
)]
pub async fn remove_visitor(
    ManagementUser(_identity): ManagementUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    if state.repo.delete_visitor(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("visitor".to_string()))
    }
}

// --- Admin Pages ---

/// admin_overview
///
/// [Admin Route] Counters for the administration landing page.
#[utoipa::path(
    get,
    path = "/dashboard/admin",
    responses((status = 200, description = "Overview", body = AdminOverview))
)]
pub async fn admin_overview(
    AdminUser(_identity): AdminUser,
    State(state): State<AppState>,
) -> AppResult<Json<AdminOverview>> {
    Ok(Json(state.repo.get_overview(today()).await?))
}

/// admin_list_spots
///
/// [Admin Route] All spots, including deactivated ones.
#[utoipa::path(
    get,
    path = "/dashboard/admin/spots",
    responses((status = 200, description = "Spots", body = [ParkingSpot]))
)]
pub async fn admin_list_spots(
    AdminUser(_identity): AdminUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<ParkingSpot>>> {
    Ok(Json(state.repo.list_spots(true).await?))
}

/// admin_create_spot
#[utoipa::path(
    post,
    path = "/dashboard/admin/spots",
    request_body = CreateSpotRequest,
    responses(
        (status = 201, description = "Created", body = ParkingSpot),
        (status = 409, description = "Duplicate label")
    )
)]
pub async fn admin_create_spot(
    AdminUser(_identity): AdminUser,
    State(state): State<AppState>,
    Json(mut payload): Json<CreateSpotRequest>,
) -> AppResult<(StatusCode, Json<ParkingSpot>)> {
    payload.label = payload.label.trim().to_string();
    if payload.label.is_empty() {
        return Err(AppError::BadRequest("spot label is required".to_string()));
    }
    let spot = state.repo.create_spot(payload).await?;
    tracing::info!(spot_id = %spot.id, label = %spot.label, "spot created");
    Ok((StatusCode::CREATED, Json(spot)))
}

/// admin_update_spot
///
/// [Admin Route] Partial update; deactivating a spot hides it from the calendar.
#[utoipa::path(
    put,
    path = "/dashboard/admin/spots/{id}",
    params(("id" = Uuid, Path, description = "Spot ID")),
    request_body = UpdateSpotRequest,
    responses(
        (status = 200, description = "Updated", body = ParkingSpot),
        (status = 404, description = "Not found")
    )
)]
pub async fn admin_update_spot(
    AdminUser(_identity): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(mut payload): Json<UpdateSpotRequest>,
) -> AppResult<Json<ParkingSpot>> {
    if let Some(label) = payload.label.as_mut() {
        *label = label.trim().to_string();
        if label.is_empty() {
            return Err(AppError::BadRequest("spot label cannot be empty".to_string()));
        }
    }
    match state.repo.update_spot(id, payload).await? {
        Some(spot) => Ok(Json(spot)),
        None => Err(AppError::NotFound("spot".to_string())),
    }
}

/// admin_delete_spot
#[utoipa::path(
    delete,
    path = "/dashboard/admin/spots/{id}",
    params(("id" = Uuid, Path, description = "Spot ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found")
    )
)]
pub async fn admin_delete_spot(
    AdminUser(_identity): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    if state.repo.delete_spot(id).await? {
        tracing::info!(spot_id = %id, "spot deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("spot".to_string()))
    }
}

/// admin_list_users
#[utoipa::path(
    get,
    path = "/dashboard/admin/users",
    responses((status = 200, description = "Profiles", body = [Profile]))
)]
pub async fn admin_list_users(
    AdminUser(_identity): AdminUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<Profile>>> {
    Ok(Json(state.repo.list_profiles().await?))
}

/// admin_user_detail
///
/// [Admin Route] A single profile. Unknown ids fall back to the user list.
#[utoipa::path(
    get,
    path = "/dashboard/admin/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Profile", body = Profile),
        (status = 303, description = "Unknown user, back to /dashboard/admin/users")
    )
)]
pub async fn admin_user_detail(
    AdminUser(_identity): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    match state.repo.get_profile(id).await? {
        Some(profile) => Ok(Json(profile).into_response()),
        None => Ok(redirect(RouteIntent::AdminUsers)),
    }
}

/// admin_set_role
///
/// [Admin Route] Assigns a role. Takes effect on the user's next request, since
/// roles are read fresh on every resolution.
#[utoipa::path(
    put,
    path = "/dashboard/admin/users/{id}/role",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Updated", body = Profile),
        (status = 404, description = "Not found")
    )
)]
pub async fn admin_set_role(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRoleRequest>,
) -> AppResult<Json<Profile>> {
    match state.repo.set_role(id, payload.role).await? {
        Some(profile) => {
            tracing::info!(user_id = %id, role = %payload.role, by = %admin.id, "role changed");
            Ok(Json(profile))
        }
        None => Err(AppError::NotFound("user".to_string())),
    }
}
