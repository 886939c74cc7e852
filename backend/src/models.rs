use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Identity & Roles ---

/// Role
///
/// The RBAC level stored on `public.profiles.role`. Variants are declared in
/// ascending privilege so the derived `Ord` is the privilege order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    Employee,
    Management,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Employee, Role::Management, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Employee => "employee",
            Role::Management => "management",
            Role::Admin => "admin",
        }
    }

    /// Parses the database representation. Unknown values yield `None` and are
    /// then treated like an unset role.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "employee" => Some(Role::Employee),
            "management" => Some(Role::Management),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    /// True if this role passes a guard that demands `required`.
    pub fn satisfies(self, required: Role) -> bool {
        self >= required
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Profile
///
/// Domain record from `public.profiles`, one-to-one with the Supabase auth user.
/// `role` stays optional: rows created by the signup trigger may not have one yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Profile {
    pub user_id: Uuid,
    pub full_name: String,
    pub role: Option<Role>,
}

/// Identity
///
/// The authenticated subject of a request, as resolved by a `SessionResolver`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Identity {
    pub id: Uuid,
    pub email: Option<String>,
    pub profile: Option<Profile>,
}

impl Identity {
    /// The role stored on the profile, if both exist.
    pub fn profile_role(&self) -> Option<Role> {
        self.profile.as_ref().and_then(|p| p.role)
    }

    pub fn display_name(&self) -> String {
        match (&self.profile, &self.email) {
            (Some(profile), _) if !profile.full_name.is_empty() => profile.full_name.clone(),
            (_, Some(email)) => email.clone(),
            _ => self.id.to_string(),
        }
    }
}

// --- Parking Schemas (Mapped to Database) ---

/// ParkingSpot
///
/// A bookable spot from `public.parking_spots`. Inactive spots stay in the table
/// so historic reservations keep their foreign key, but cannot be booked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct ParkingSpot {
    pub id: Uuid,
    pub label: String,
    pub location: Option<String>,
    pub is_active: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Reservation
///
/// One employee holding one spot for one calendar day (`public.reservations`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Reservation {
    pub id: Uuid,
    pub spot_id: Uuid,
    pub user_id: Uuid,
    #[ts(type = "string")]
    pub reserved_for: NaiveDate,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Visitor
///
/// An external guest registered by a host (`public.visitors`). A visitor may be
/// assigned a spot for the visit day, which then counts as booked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Visitor {
    pub id: Uuid,
    pub host_id: Uuid,
    pub full_name: String,
    pub company: Option<String>,
    pub license_plate: Option<String>,
    #[ts(type = "string")]
    pub visit_date: NaiveDate,
    pub spot_id: Option<Uuid>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

// --- Request Payloads (Input Schemas) ---

/// CreateReservationRequest
///
/// Input for `POST /dashboard/parking/reservations`. The user is taken from the session.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateReservationRequest {
    pub spot_id: Uuid,
    #[ts(type = "string")]
    pub date: NaiveDate,
}

/// CreateVisitorRequest
///
/// Input for `POST /dashboard/visitors`. The host is taken from the session.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateVisitorRequest {
    pub full_name: String,
    pub company: Option<String>,
    pub license_plate: Option<String>,
    #[ts(type = "string")]
    pub visit_date: NaiveDate,
    pub spot_id: Option<Uuid>,
}

/// CreateSpotRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateSpotRequest {
    pub label: String,
    pub location: Option<String>,
}

/// UpdateSpotRequest
///
/// Partial update; only `Some` fields are written.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateSpotRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

/// UpdateRoleRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdateRoleRequest {
    pub role: Role,
}

// --- Page Schemas (Output) ---

/// LoginView
///
/// What the login page needs to render its single "Sign in with Microsoft" button.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginView {
    pub provider: String,
    pub authorize_url: String,
}

/// DashboardView
///
/// The landing page for every authenticated user.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct DashboardView {
    pub user_id: Uuid,
    pub display_name: String,
    pub role: Role,
    /// Path of the role's landing page, for the navigation bar.
    pub home: String,
    pub upcoming: Vec<Reservation>,
}

/// SpotAvailability
///
/// A spot and its state on the day being viewed.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SpotAvailability {
    pub spot: ParkingSpot,
    pub available: bool,
    pub reserved_by_me: bool,
}

/// ParkingView
///
/// The calendar page: all active spots for one date.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ParkingView {
    #[ts(type = "string")]
    pub date: NaiveDate,
    pub spots: Vec<SpotAvailability>,
}

/// SpotDetailView
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SpotDetailView {
    pub spot: ParkingSpot,
    pub reservations: Vec<Reservation>,
}

/// AdminOverview
///
/// Counters for the administration landing page (`GET /dashboard/admin`).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct AdminOverview {
    pub total_spots: i64,
    pub active_spots: i64,
    pub total_users: i64,
    pub reservations_today: i64,
    pub visitors_today: i64,
}
