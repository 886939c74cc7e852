/// Router Module Index
///
/// Routes are grouped by the guard that protects them. `create_router` wraps
/// each group in exactly one guarded layout, so a request resolves its session
/// once no matter which group it hits.

/// Routes reachable without a session: entry, sign-in flow, health, legacy redirects.
pub mod public;

/// Pages for any signed-in user (dashboard, parking calendar, reservations).
pub mod authenticated;

/// Pages for management and admins (visitor registration).
pub mod management;

/// Pages for admins only (spots, users, roles).
pub mod admin;
