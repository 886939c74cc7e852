use crate::{
    error::RepoError,
    models::{
        AdminOverview, CreateSpotRequest, CreateVisitorRequest, ParkingSpot, Profile,
        Reservation, Role, UpdateSpotRequest, Visitor,
    },
};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::{FromRow, PgConnection, PgPool};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository Trait
///
/// The persistence contract. Handlers and session resolvers only ever see this
/// trait, so Postgres can be swapped for the in-memory store in tests.
///
/// Failures are returned, never swallowed.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Profiles ---
    async fn get_profile(&self, user_id: Uuid) -> RepoResult<Option<Profile>>;
    async fn list_profiles(&self) -> RepoResult<Vec<Profile>>;
    async fn set_role(&self, user_id: Uuid, role: Role) -> RepoResult<Option<Profile>>;

    // --- Spots ---
    async fn list_spots(&self, include_inactive: bool) -> RepoResult<Vec<ParkingSpot>>;
    async fn get_spot(&self, id: Uuid) -> RepoResult<Option<ParkingSpot>>;
    // Conflict when the label is already taken.
    async fn create_spot(&self, req: CreateSpotRequest) -> RepoResult<ParkingSpot>;
    async fn update_spot(&self, id: Uuid, req: UpdateSpotRequest)
    -> RepoResult<Option<ParkingSpot>>;
    async fn delete_spot(&self, id: Uuid) -> RepoResult<bool>;

    // --- Reservations ---
    async fn reservations_on(&self, date: NaiveDate) -> RepoResult<Vec<Reservation>>;
    async fn reservations_for_user(
        &self,
        user_id: Uuid,
        from: NaiveDate,
    ) -> RepoResult<Vec<Reservation>>;
    async fn reservations_for_spot(
        &self,
        spot_id: Uuid,
        from: NaiveDate,
    ) -> RepoResult<Vec<Reservation>>;
    // Conflict when the spot is booked that day (by a reservation or a visitor) or
    // the user already holds a reservation. Atomic with respect to `create_visitor`.
    async fn create_reservation(
        &self,
        spot_id: Uuid,
        user_id: Uuid,
        date: NaiveDate,
    ) -> RepoResult<Reservation>;
    // Owner-Only: cancels only if `user_id` holds the reservation.
    async fn cancel_reservation(&self, id: Uuid, user_id: Uuid) -> RepoResult<bool>;
    /// Admin Override: cancels any reservation.
    async fn cancel_reservation_admin(&self, id: Uuid) -> RepoResult<bool>;

    // --- Visitors ---
    async fn visitors_from(&self, from: NaiveDate) -> RepoResult<Vec<Visitor>>;
    async fn visitors_on(&self, date: NaiveDate) -> RepoResult<Vec<Visitor>>;
    // Conflict when the requested spot is already booked on the visit day.
    async fn create_visitor(&self, host_id: Uuid, req: CreateVisitorRequest)
    -> RepoResult<Visitor>;
    async fn delete_visitor(&self, id: Uuid) -> RepoResult<bool>;

    // --- Administration ---
    async fn get_overview(&self, today: NaiveDate) -> RepoResult<AdminOverview>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

const SPOT_TAKEN: &str = "spot is already booked for that day";
const USER_ALREADY_BOOKED: &str = "you already hold a reservation for that day";
const LABEL_TAKEN: &str = "a spot with that label already exists";

// Unique constraint names from migrations/0001_parking.sql.
const RESERVATION_USER_DAY_KEY: &str = "reservations_user_day_key";

/// Conflict message for a unique violation raised while booking a spot.
fn booking_conflict_message(constraint: Option<&str>) -> &'static str {
    match constraint {
        Some(RESERVATION_USER_DAY_KEY) => USER_ALREADY_BOOKED,
        _ => SPOT_TAKEN,
    }
}

fn booking_conflict(err: sqlx::Error) -> RepoError {
    let constraint = match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            Some(db.constraint().map(str::to_string))
        }
        _ => None,
    };
    match constraint {
        Some(name) => RepoError::Conflict(booking_conflict_message(name.as_deref()).to_string()),
        None => RepoError::Database(err),
    }
}

/// Raw `public.profiles` row; the role column is free text in the database.
#[derive(FromRow)]
struct ProfileRow {
    user_id: Uuid,
    full_name: String,
    role: Option<String>,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        Profile {
            user_id: row.user_id,
            full_name: row.full_name,
            role: row.role.as_deref().and_then(Role::parse),
        }
    }
}

/// PostgresRepository
///
/// `Repository` backed by the Supabase Postgres database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Takes the row lock on the spot for the rest of the transaction. Every booking
/// of a spot, reservation or visitor, goes through this lock, so the check in
/// `spot_booked` and the following insert cannot interleave with another booking.
async fn lock_spot(conn: &mut PgConnection, spot_id: Uuid) -> RepoResult<()> {
    sqlx::query("SELECT 1 FROM parking_spots WHERE id = $1 FOR UPDATE")
        .bind(spot_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(())
}

/// True if the spot already has a reservation or an assigned visitor on `date`.
async fn spot_booked(conn: &mut PgConnection, spot_id: Uuid, date: NaiveDate) -> RepoResult<bool> {
    let booked: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (SELECT 1 FROM reservations WHERE spot_id = $1 AND reserved_for = $2)
            OR EXISTS (SELECT 1 FROM visitors WHERE spot_id = $1 AND visit_date = $2)
        "#,
    )
    .bind(spot_id)
    .bind(date)
    .fetch_one(&mut *conn)
    .await?;
    Ok(booked)
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_profile(&self, user_id: Uuid) -> RepoResult<Option<Profile>> {
        let row = sqlx::query_as::<_, ProfileRow>(
            "SELECT user_id, full_name, role FROM profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Profile::from))
    }

    async fn list_profiles(&self) -> RepoResult<Vec<Profile>> {
        let rows = sqlx::query_as::<_, ProfileRow>(
            "SELECT user_id, full_name, role FROM profiles ORDER BY full_name ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Profile::from).collect())
    }

    async fn set_role(&self, user_id: Uuid, role: Role) -> RepoResult<Option<Profile>> {
        let row = sqlx::query_as::<_, ProfileRow>(
            "UPDATE profiles SET role = $2 WHERE user_id = $1 RETURNING user_id, full_name, role",
        )
        .bind(user_id)
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Profile::from))
    }

    async fn list_spots(&self, include_inactive: bool) -> RepoResult<Vec<ParkingSpot>> {
        let spots = sqlx::query_as::<_, ParkingSpot>(
            r#"
            SELECT id, label, location, is_active, created_at
            FROM parking_spots
            WHERE is_active = true OR $1
            ORDER BY label ASC
            "#,
        )
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await?;
        Ok(spots)
    }

    async fn get_spot(&self, id: Uuid) -> RepoResult<Option<ParkingSpot>> {
        let spot = sqlx::query_as::<_, ParkingSpot>(
            "SELECT id, label, location, is_active, created_at FROM parking_spots WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(spot)
    }

    async fn create_spot(&self, req: CreateSpotRequest) -> RepoResult<ParkingSpot> {
        sqlx::query_as::<_, ParkingSpot>(
            r#"
            INSERT INTO parking_spots (id, label, location, is_active, created_at)
            VALUES ($1, $2, $3, true, NOW())
            RETURNING id, label, location, is_active, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(req.label)
        .bind(req.location)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepoError::from_sqlx(e, LABEL_TAKEN))
    }

    /// COALESCE keeps the stored value for every `None` field.
    async fn update_spot(
        &self,
        id: Uuid,
        req: UpdateSpotRequest,
    ) -> RepoResult<Option<ParkingSpot>> {
        sqlx::query_as::<_, ParkingSpot>(
            r#"
            UPDATE parking_spots
            SET label = COALESCE($2, label),
                location = COALESCE($3, location),
                is_active = COALESCE($4, is_active)
            WHERE id = $1
            RETURNING id, label, location, is_active, created_at
            "#,
        )
        .bind(id)
        .bind(req.label)
        .bind(req.location)
        .bind(req.is_active)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::from_sqlx(e, LABEL_TAKEN))
    }

    async fn delete_spot(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM parking_spots WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn reservations_on(&self, date: NaiveDate) -> RepoResult<Vec<Reservation>> {
        let rows = sqlx::query_as::<_, Reservation>(
            r#"
            SELECT id, spot_id, user_id, reserved_for, created_at
            FROM reservations WHERE reserved_for = $1
            "#,
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn reservations_for_user(
        &self,
        user_id: Uuid,
        from: NaiveDate,
    ) -> RepoResult<Vec<Reservation>> {
        let rows = sqlx::query_as::<_, Reservation>(
            r#"
            SELECT id, spot_id, user_id, reserved_for, created_at
            FROM reservations
            WHERE user_id = $1 AND reserved_for >= $2
            ORDER BY reserved_for ASC
            "#,
        )
        .bind(user_id)
        .bind(from)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn reservations_for_spot(
        &self,
        spot_id: Uuid,
        from: NaiveDate,
    ) -> RepoResult<Vec<Reservation>> {
        let rows = sqlx::query_as::<_, Reservation>(
            r#"
            SELECT id, spot_id, user_id, reserved_for, created_at
            FROM reservations
            WHERE spot_id = $1 AND reserved_for >= $2
            ORDER BY reserved_for ASC
            "#,
        )
        .bind(spot_id)
        .bind(from)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Check and insert run in one transaction under the spot's row lock. The
    /// unique constraints remain the last line for same-table races.
    async fn create_reservation(
        &self,
        spot_id: Uuid,
        user_id: Uuid,
        date: NaiveDate,
    ) -> RepoResult<Reservation> {
        let mut tx = self.pool.begin().await?;
        lock_spot(&mut tx, spot_id).await?;
        if spot_booked(&mut tx, spot_id, date).await? {
            return Err(RepoError::Conflict(SPOT_TAKEN.to_string()));
        }

        let reservation = sqlx::query_as::<_, Reservation>(
            r#"
            INSERT INTO reservations (id, spot_id, user_id, reserved_for, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            RETURNING id, spot_id, user_id, reserved_for, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(spot_id)
        .bind(user_id)
        .bind(date)
        .fetch_one(&mut *tx)
        .await
        .map_err(booking_conflict)?;

        tx.commit().await?;
        Ok(reservation)
    }

    async fn cancel_reservation(&self, id: Uuid, user_id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM reservations WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn cancel_reservation_admin(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM reservations WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn visitors_from(&self, from: NaiveDate) -> RepoResult<Vec<Visitor>> {
        let rows = sqlx::query_as::<_, Visitor>(
            r#"
            SELECT id, host_id, full_name, company, license_plate, visit_date, spot_id, created_at
            FROM visitors
            WHERE visit_date >= $1
            ORDER BY visit_date ASC, full_name ASC
            "#,
        )
        .bind(from)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn visitors_on(&self, date: NaiveDate) -> RepoResult<Vec<Visitor>> {
        let rows = sqlx::query_as::<_, Visitor>(
            r#"
            SELECT id, host_id, full_name, company, license_plate, visit_date, spot_id, created_at
            FROM visitors
            WHERE visit_date = $1
            ORDER BY full_name ASC
            "#,
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Same locking as `create_reservation` when a spot is requested.
    async fn create_visitor(
        &self,
        host_id: Uuid,
        req: CreateVisitorRequest,
    ) -> RepoResult<Visitor> {
        let mut tx = self.pool.begin().await?;
        if let Some(spot_id) = req.spot_id {
            lock_spot(&mut tx, spot_id).await?;
            if spot_booked(&mut tx, spot_id, req.visit_date).await? {
                return Err(RepoError::Conflict(SPOT_TAKEN.to_string()));
            }
        }

        let visitor = sqlx::query_as::<_, Visitor>(
            r#"
            INSERT INTO visitors
                (id, host_id, full_name, company, license_plate, visit_date, spot_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
            RETURNING id, host_id, full_name, company, license_plate, visit_date, spot_id, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(host_id)
        .bind(req.full_name)
        .bind(req.company)
        .bind(req.license_plate)
        .bind(req.visit_date)
        .bind(req.spot_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(booking_conflict)?;

        tx.commit().await?;
        Ok(visitor)
    }

    async fn delete_visitor(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM visitors WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// All counters in one round-trip.
    async fn get_overview(&self, today: NaiveDate) -> RepoResult<AdminOverview> {
        let (total_spots, active_spots, total_users, reservations_today, visitors_today): (
            i64,
            i64,
            i64,
            i64,
            i64,
        ) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM parking_spots),
                (SELECT COUNT(*) FROM parking_spots WHERE is_active = true),
                (SELECT COUNT(*) FROM profiles),
                (SELECT COUNT(*) FROM reservations WHERE reserved_for = $1),
                (SELECT COUNT(*) FROM visitors WHERE visit_date = $1)
            "#,
        )
        .bind(today)
        .fetch_one(&self.pool)
        .await?;

        Ok(AdminOverview {
            total_spots,
            active_spots,
            total_users,
            reservations_today,
            visitors_today,
        })
    }
}

// --- In-Memory Implementation ---

#[derive(Default)]
struct MemoryTables {
    profiles: Vec<Profile>,
    spots: Vec<ParkingSpot>,
    reservations: Vec<Reservation>,
    visitors: Vec<Visitor>,
}

impl MemoryTables {
    fn spot_booked(&self, spot_id: Uuid, date: NaiveDate) -> bool {
        self.reservations
            .iter()
            .any(|r| r.spot_id == spot_id && r.reserved_for == date)
            || self
                .visitors
                .iter()
                .any(|v| v.spot_id == Some(spot_id) && v.visit_date == date)
    }
}

/// InMemoryRepository
///
/// A `Repository` kept entirely in process memory. Used by the test suites and
/// for running the server without a database. Enforces the same uniqueness
/// rules as the Postgres schema.
#[derive(Default)]
pub struct InMemoryRepository {
    tables: RwLock<MemoryTables>,
    /// When true, every call fails as if the database were unreachable.
    pub should_fail: bool,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.tables.get_mut().profiles.push(profile);
        self
    }

    pub fn with_spot(mut self, spot: ParkingSpot) -> Self {
        self.tables.get_mut().spots.push(spot);
        self
    }

    pub fn with_reservation(mut self, reservation: Reservation) -> Self {
        self.tables.get_mut().reservations.push(reservation);
        self
    }

    fn check(&self) -> RepoResult<()> {
        if self.should_fail {
            return Err(RepoError::Unavailable(
                "in-memory store configured to fail".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_profile(&self, user_id: Uuid) -> RepoResult<Option<Profile>> {
        self.check()?;
        let tables = self.tables.read().await;
        Ok(tables.profiles.iter().find(|p| p.user_id == user_id).cloned())
    }

    async fn list_profiles(&self) -> RepoResult<Vec<Profile>> {
        self.check()?;
        let mut profiles = self.tables.read().await.profiles.clone();
        profiles.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        Ok(profiles)
    }

    async fn set_role(&self, user_id: Uuid, role: Role) -> RepoResult<Option<Profile>> {
        self.check()?;
        let mut tables = self.tables.write().await;
        Ok(tables
            .profiles
            .iter_mut()
            .find(|p| p.user_id == user_id)
            .map(|p| {
                p.role = Some(role);
                p.clone()
            }))
    }

    async fn list_spots(&self, include_inactive: bool) -> RepoResult<Vec<ParkingSpot>> {
        self.check()?;
        let mut spots: Vec<ParkingSpot> = self
            .tables
            .read()
            .await
            .spots
            .iter()
            .filter(|s| include_inactive || s.is_active)
            .cloned()
            .collect();
        spots.sort_by(|a, b| a.label.cmp(&b.label));
        Ok(spots)
    }

    async fn get_spot(&self, id: Uuid) -> RepoResult<Option<ParkingSpot>> {
        self.check()?;
        Ok(self.tables.read().await.spots.iter().find(|s| s.id == id).cloned())
    }

    async fn create_spot(&self, req: CreateSpotRequest) -> RepoResult<ParkingSpot> {
        self.check()?;
        let mut tables = self.tables.write().await;
        if tables.spots.iter().any(|s| s.label == req.label) {
            return Err(RepoError::Conflict(LABEL_TAKEN.to_string()));
        }
        let spot = ParkingSpot {
            id: Uuid::new_v4(),
            label: req.label,
            location: req.location,
            is_active: true,
            created_at: Utc::now(),
        };
        tables.spots.push(spot.clone());
        Ok(spot)
    }

    async fn update_spot(
        &self,
        id: Uuid,
        req: UpdateSpotRequest,
    ) -> RepoResult<Option<ParkingSpot>> {
        self.check()?;
        let mut tables = self.tables.write().await;
        if let Some(label) = &req.label {
            if tables.spots.iter().any(|s| s.id != id && &s.label == label) {
                return Err(RepoError::Conflict(LABEL_TAKEN.to_string()));
            }
        }
        Ok(tables.spots.iter_mut().find(|s| s.id == id).map(|spot| {
            if let Some(label) = req.label {
                spot.label = label;
            }
            if let Some(location) = req.location {
                spot.location = Some(location);
            }
            if let Some(is_active) = req.is_active {
                spot.is_active = is_active;
            }
            spot.clone()
        }))
    }

    async fn delete_spot(&self, id: Uuid) -> RepoResult<bool> {
        self.check()?;
        let mut tables = self.tables.write().await;
        let before = tables.spots.len();
        tables.spots.retain(|s| s.id != id);
        let removed = tables.spots.len() != before;
        if removed {
            // Mirrors ON DELETE CASCADE / SET NULL in the schema.
            tables.reservations.retain(|r| r.spot_id != id);
            for visitor in tables.visitors.iter_mut().filter(|v| v.spot_id == Some(id)) {
                visitor.spot_id = None;
            }
        }
        Ok(removed)
    }

    async fn reservations_on(&self, date: NaiveDate) -> RepoResult<Vec<Reservation>> {
        self.check()?;
        Ok(self
            .tables
            .read()
            .await
            .reservations
            .iter()
            .filter(|r| r.reserved_for == date)
            .cloned()
            .collect())
    }

    async fn reservations_for_user(
        &self,
        user_id: Uuid,
        from: NaiveDate,
    ) -> RepoResult<Vec<Reservation>> {
        self.check()?;
        let mut rows: Vec<Reservation> = self
            .tables
            .read()
            .await
            .reservations
            .iter()
            .filter(|r| r.user_id == user_id && r.reserved_for >= from)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.reserved_for);
        Ok(rows)
    }

    async fn reservations_for_spot(
        &self,
        spot_id: Uuid,
        from: NaiveDate,
    ) -> RepoResult<Vec<Reservation>> {
        self.check()?;
        let mut rows: Vec<Reservation> = self
            .tables
            .read()
            .await
            .reservations
            .iter()
            .filter(|r| r.spot_id == spot_id && r.reserved_for >= from)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.reserved_for);
        Ok(rows)
    }

    async fn create_reservation(
        &self,
        spot_id: Uuid,
        user_id: Uuid,
        date: NaiveDate,
    ) -> RepoResult<Reservation> {
        self.check()?;
        let mut tables = self.tables.write().await;
        if tables.spot_booked(spot_id, date) {
            return Err(RepoError::Conflict(SPOT_TAKEN.to_string()));
        }
        if tables
            .reservations
            .iter()
            .any(|r| r.user_id == user_id && r.reserved_for == date)
        {
            return Err(RepoError::Conflict(USER_ALREADY_BOOKED.to_string()));
        }
        let reservation = Reservation {
            id: Uuid::new_v4(),
            spot_id,
            user_id,
            reserved_for: date,
            created_at: Utc::now(),
        };
        tables.reservations.push(reservation.clone());
        Ok(reservation)
    }

    async fn cancel_reservation(&self, id: Uuid, user_id: Uuid) -> RepoResult<bool> {
        self.check()?;
        let mut tables = self.tables.write().await;
        let before = tables.reservations.len();
        tables
            .reservations
            .retain(|r| !(r.id == id && r.user_id == user_id));
        Ok(tables.reservations.len() != before)
    }

    async fn cancel_reservation_admin(&self, id: Uuid) -> RepoResult<bool> {
        self.check()?;
        let mut tables = self.tables.write().await;
        let before = tables.reservations.len();
        tables.reservations.retain(|r| r.id != id);
        Ok(tables.reservations.len() != before)
    }

    async fn visitors_from(&self, from: NaiveDate) -> RepoResult<Vec<Visitor>> {
        self.check()?;
        let mut rows: Vec<Visitor> = self
            .tables
            .read()
            .await
            .visitors
            .iter()
            .filter(|v| v.visit_date >= from)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            a.visit_date
                .cmp(&b.visit_date)
                .then_with(|| a.full_name.cmp(&b.full_name))
        });
        Ok(rows)
    }

    async fn visitors_on(&self, date: NaiveDate) -> RepoResult<Vec<Visitor>> {
        self.check()?;
        let mut rows: Vec<Visitor> = self
            .tables
            .read()
            .await
            .visitors
            .iter()
            .filter(|v| v.visit_date == date)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        Ok(rows)
    }

    async fn create_visitor(
        &self,
        host_id: Uuid,
        req: CreateVisitorRequest,
    ) -> RepoResult<Visitor> {
        self.check()?;
        let mut tables = self.tables.write().await;
        if let Some(spot_id) = req.spot_id {
            if tables.spot_booked(spot_id, req.visit_date) {
                return Err(RepoError::Conflict(SPOT_TAKEN.to_string()));
            }
        }
        let visitor = Visitor {
            id: Uuid::new_v4(),
            host_id,
            full_name: req.full_name,
            company: req.company,
            license_plate: req.license_plate,
            visit_date: req.visit_date,
            spot_id: req.spot_id,
            created_at: Utc::now(),
        };
        tables.visitors.push(visitor.clone());
        Ok(visitor)
    }

    async fn delete_visitor(&self, id: Uuid) -> RepoResult<bool> {
        self.check()?;
        let mut tables = self.tables.write().await;
        let before = tables.visitors.len();
        tables.visitors.retain(|v| v.id != id);
        Ok(tables.visitors.len() != before)
    }

    async fn get_overview(&self, today: NaiveDate) -> RepoResult<AdminOverview> {
        self.check()?;
        let tables = self.tables.read().await;
        Ok(AdminOverview {
            total_spots: tables.spots.len() as i64,
            active_spots: tables.spots.iter().filter(|s| s.is_active).count() as i64,
            total_users: tables.profiles.len() as i64,
            reservations_today: tables
                .reservations
                .iter()
                .filter(|r| r.reserved_for == today)
                .count() as i64,
            visitors_today: tables
                .visitors
                .iter()
                .filter(|v| v.visit_date == today)
                .count() as i64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_day_violation_reports_existing_reservation() {
        assert_eq!(
            booking_conflict_message(Some("reservations_user_day_key")),
            USER_ALREADY_BOOKED
        );
    }

    #[test]
    fn spot_day_violations_report_spot_taken() {
        for constraint in [
            Some("reservations_spot_day_key"),
            Some("visitors_spot_day_key"),
            None,
        ] {
            assert_eq!(booking_conflict_message(constraint), SPOT_TAKEN);
        }
    }
}
