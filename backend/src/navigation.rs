//! Route Table
//!
//! Symbolic destinations and the canonical path each one is bound to. Guards,
//! the root redirector and page handlers refer to `RouteIntent`s, never to
//! literal strings, so a path changes in exactly one place.

use serde::Serialize;
use std::fmt;

/// RouteIntent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RouteIntent {
    Root,
    Login,
    Callback,
    Logout,
    Dashboard,
    Parking,
    Visitors,
    Admin,
    AdminSpots,
    AdminUsers,
}

impl RouteIntent {
    pub const ALL: [RouteIntent; 10] = [
        RouteIntent::Root,
        RouteIntent::Login,
        RouteIntent::Callback,
        RouteIntent::Logout,
        RouteIntent::Dashboard,
        RouteIntent::Parking,
        RouteIntent::Visitors,
        RouteIntent::Admin,
        RouteIntent::AdminSpots,
        RouteIntent::AdminUsers,
    ];

    pub const fn path(self) -> &'static str {
        match self {
            RouteIntent::Root => "/",
            RouteIntent::Login => "/login",
            RouteIntent::Callback => "/auth/callback",
            RouteIntent::Logout => "/auth/logout",
            RouteIntent::Dashboard => "/dashboard",
            RouteIntent::Parking => "/dashboard/parking",
            RouteIntent::Visitors => "/dashboard/visitors",
            RouteIntent::Admin => "/dashboard/admin",
            RouteIntent::AdminSpots => "/dashboard/admin/spots",
            RouteIntent::AdminUsers => "/dashboard/admin/users",
        }
    }
}

impl fmt::Display for RouteIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Paths from the old calendar/reservation pages. They all land on `Parking`.
pub const DEPRECATED_PARKING_PATHS: [&str; 3] = [
    "/dashboard/calendar",
    "/dashboard/reservations",
    "/dashboard/book",
];
