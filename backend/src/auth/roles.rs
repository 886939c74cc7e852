use crate::{models::Role, navigation::RouteIntent};

/// Maps a stored role to the role used for every access decision.
/// A missing role classifies as `Employee`, the least privileged level.
pub fn classify(role: Option<Role>) -> Role {
    role.unwrap_or(Role::Employee)
}

/// Landing page for a role. Pure and total, including the unset case.
pub fn home_route_for_role(role: Option<Role>) -> RouteIntent {
    match classify(role) {
        Role::Employee | Role::Management => RouteIntent::Dashboard,
        Role::Admin => RouteIntent::Admin,
    }
}
