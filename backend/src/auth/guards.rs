use super::{
    roles::classify,
    session::{RequestContext, SessionResolver},
};
use crate::{
    error::AuthError,
    models::{Identity, Role},
    navigation::RouteIntent,
};

/// Access
///
/// Outcome of a guard. `Denied` carries the route the caller must redirect to.
/// On a denial nothing else may run for the current request.
#[derive(Debug, Clone, PartialEq)]
pub enum Access<T> {
    Allowed(T),
    Denied(RouteIntent),
}

/// Requirement
///
/// What a page subtree demands of its visitors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Session,
    Management,
    Admin,
}

impl Requirement {
    /// Role check against an identity whose session is already established.
    pub fn check(self, identity: Identity) -> Access<Identity> {
        match self {
            Requirement::Session => Access::Allowed(identity),
            Requirement::Management => check_role(identity, Role::Management),
            Requirement::Admin => check_role(identity, Role::Admin),
        }
    }
}

/// Denies to the dashboard home unless the classified role reaches `minimum`.
pub fn check_role(identity: Identity, minimum: Role) -> Access<Identity> {
    let role = classify(identity.profile_role());
    if role.satisfies(minimum) {
        Access::Allowed(identity)
    } else {
        tracing::debug!(user_id = %identity.id, %role, required = %minimum, "role too low");
        Access::Denied(RouteIntent::Dashboard)
    }
}

/// Any authenticated session. Denied to `Login` otherwise.
pub async fn require_auth(
    sessions: &dyn SessionResolver,
    ctx: &RequestContext,
) -> Result<Access<Identity>, AuthError> {
    Ok(match sessions.current_user(ctx).await? {
        Some(identity) => Access::Allowed(identity),
        None => Access::Denied(RouteIntent::Login),
    })
}

async fn require_role(
    sessions: &dyn SessionResolver,
    ctx: &RequestContext,
    minimum: Role,
) -> Result<Access<Identity>, AuthError> {
    match require_auth(sessions, ctx).await? {
        Access::Allowed(identity) => Ok(check_role(identity, minimum)),
        denied => Ok(denied),
    }
}

/// Management or admin.
pub async fn require_management(
    sessions: &dyn SessionResolver,
    ctx: &RequestContext,
) -> Result<Access<Identity>, AuthError> {
    require_role(sessions, ctx, Role::Management).await
}

/// Admin only.
pub async fn require_admin(
    sessions: &dyn SessionResolver,
    ctx: &RequestContext,
) -> Result<Access<Identity>, AuthError> {
    require_role(sessions, ctx, Role::Admin).await
}

pub async fn require(
    sessions: &dyn SessionResolver,
    ctx: &RequestContext,
    requirement: Requirement,
) -> Result<Access<Identity>, AuthError> {
    match requirement {
        Requirement::Session => require_auth(sessions, ctx).await,
        Requirement::Management => require_management(sessions, ctx).await,
        Requirement::Admin => require_admin(sessions, ctx).await,
    }
}
