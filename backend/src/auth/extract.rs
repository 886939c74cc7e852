use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};
use std::convert::Infallible;

use super::{
    guards::{Access, Requirement, require},
    session::{RequestContext, SessionState},
};
use crate::{
    config::AppConfig,
    error::{AppError, AuthError},
    models::Identity,
    navigation::RouteIntent,
};

/// GuardRejection
///
/// How a failed guard ends the request: a `303 See Other` to the denial route,
/// or an error response when the session could not be resolved at all.
#[derive(Debug)]
pub enum GuardRejection {
    Redirect(RouteIntent),
    Failed(AuthError),
}

impl IntoResponse for GuardRejection {
    fn into_response(self) -> Response {
        match self {
            GuardRejection::Redirect(intent) => Redirect::to(intent.path()).into_response(),
            GuardRejection::Failed(err) => AppError::from(err).into_response(),
        }
    }
}

impl From<AuthError> for GuardRejection {
    fn from(err: AuthError) -> Self {
        GuardRejection::Failed(err)
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
    AppConfig: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AppConfig::from_ref(state);
        Ok(RequestContext::from_headers(&parts.headers, &config))
    }
}

/// Runs `requirement` for an extractor.
///
/// When a guarded layout already resolved the session it left the `Identity` in
/// the request extensions; only the role check is repeated then, so a request
/// costs one resolver call no matter how many guards it passes.
async fn guarded<S>(
    parts: &mut Parts,
    state: &S,
    requirement: Requirement,
) -> Result<Identity, GuardRejection>
where
    S: Send + Sync,
    SessionState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    let access = match parts.extensions.get::<Identity>().cloned() {
        Some(identity) => requirement.check(identity),
        None => {
            let sessions = SessionState::from_ref(state);
            let config = AppConfig::from_ref(state);
            let ctx = RequestContext::from_headers(&parts.headers, &config);
            require(sessions.as_ref(), &ctx, requirement).await?
        }
    };

    match access {
        Access::Allowed(identity) => Ok(identity),
        Access::Denied(intent) => {
            tracing::debug!(path = %parts.uri.path(), redirect = %intent, "access denied");
            Err(GuardRejection::Redirect(intent))
        }
    }
}

/// CurrentUser
///
/// Any signed-in user. Handlers taking this argument never run for anonymous
/// visitors; those are redirected to the login page.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Identity);

/// ManagementUser
///
/// A user whose role is management or admin. Others go to the dashboard home.
#[derive(Debug, Clone)]
pub struct ManagementUser(pub Identity);

/// AdminUser
///
/// An administrator. Others go to the dashboard home.
#[derive(Debug, Clone)]
pub struct AdminUser(pub Identity);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    SessionState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = GuardRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        guarded(parts, state, Requirement::Session).await.map(CurrentUser)
    }
}

impl<S> FromRequestParts<S> for ManagementUser
where
    S: Send + Sync,
    SessionState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = GuardRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        guarded(parts, state, Requirement::Management)
            .await
            .map(ManagementUser)
    }
}

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    SessionState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = GuardRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        guarded(parts, state, Requirement::Admin).await.map(AdminUser)
    }
}
