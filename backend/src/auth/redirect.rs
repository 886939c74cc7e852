use super::{
    roles::home_route_for_role,
    session::{RequestContext, SessionResolver},
};
use crate::{error::AuthError, models::Identity, navigation::RouteIntent};

/// Where a visitor of `/` belongs: login without a session, else the role's home.
pub fn landing_for(identity: Option<&Identity>) -> RouteIntent {
    match identity {
        None => RouteIntent::Login,
        Some(identity) => home_route_for_role(identity.profile_role()),
    }
}

/// Root Redirector: resolve the session, then pick the landing route.
pub async fn root_destination(
    sessions: &dyn SessionResolver,
    ctx: &RequestContext,
) -> Result<RouteIntent, AuthError> {
    let identity = sessions.current_user(ctx).await?;
    Ok(landing_for(identity.as_ref()))
}
