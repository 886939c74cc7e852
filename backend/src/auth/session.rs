use async_trait::async_trait;
use axum::http::{HeaderMap, header};
use jsonwebtoken::{DecodingKey, Validation, decode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::provider::SupabaseAuthClient;
use crate::{
    config::{AppConfig, Env},
    error::AuthError,
    models::Identity,
    repository::{Repository, RepositoryState},
};

/// Claims
///
/// The subset of the Supabase access-token payload this service relies on.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the `auth.users.id`, also the primary key of `public.profiles`.
    pub sub: Uuid,
    /// Expiration Time (exp). Always validated.
    pub exp: usize,
    /// Issued At (iat).
    pub iat: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// RequestContext
///
/// Everything a resolver may look at, lifted out of the request up front.
/// Resolvers never touch the request itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestContext {
    /// Supabase access token from `Authorization: Bearer` or the session cookie.
    pub access_token: Option<String>,
    /// Development bypass (`x-user-id`). Only ever populated in `Env::Local`.
    pub dev_user_id: Option<Uuid>,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            access_token: Some(token.into()),
            dev_user_id: None,
        }
    }

    /// Builds the context from request headers. The bearer header wins over the cookie.
    pub fn from_headers(headers: &HeaderMap, config: &AppConfig) -> Self {
        let access_token = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
            .or_else(|| parse_cookie(headers, &config.session_cookie));

        let dev_user_id = if config.env == Env::Local {
            headers
                .get("x-user-id")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| Uuid::parse_str(value).ok())
        } else {
            None
        };

        Self {
            access_token,
            dev_user_id,
        }
    }
}

/// Reads a single cookie value out of the `Cookie` header.
pub fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie = headers.get(header::COOKIE)?.to_str().ok()?;
    cookie.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name && !value.is_empty()).then(|| value.to_string())
    })
}

/// SessionResolver
///
/// Answers "who is making this request?". `Ok(None)` means there is no valid
/// session, which is an ordinary outcome. `Err` is reserved for collaborator
/// failures (auth provider or profile storage unreachable).
#[async_trait]
pub trait SessionResolver: Send + Sync {
    async fn current_user(&self, ctx: &RequestContext) -> Result<Option<Identity>, AuthError>;
}

pub type SessionState = Arc<dyn SessionResolver>;

/// Attaches the profile (if any) to an authenticated user id.
async fn load_identity(
    repo: &dyn Repository,
    id: Uuid,
    email: Option<String>,
) -> Result<Identity, AuthError> {
    let profile = repo.get_profile(id).await?;
    if profile.is_none() {
        tracing::warn!(user_id = %id, "authenticated user has no profile row");
    }
    Ok(Identity { id, email, profile })
}

/// Local bypass: only honoured when the id maps to an existing profile, so roles
/// are loaded exactly as in production.
async fn dev_identity(repo: &dyn Repository, id: Uuid) -> Result<Option<Identity>, AuthError> {
    Ok(repo.get_profile(id).await?.map(|profile| Identity {
        id,
        email: None,
        profile: Some(profile),
    }))
}

/// JwtSessionResolver
///
/// Verifies the Supabase access token locally with the project's JWT secret and
/// then loads the profile. The only I/O is the profile lookup.
pub struct JwtSessionResolver {
    repo: RepositoryState,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtSessionResolver {
    pub fn new(repo: RepositoryState, jwt_secret: &str) -> Self {
        let mut validation = Validation::default();
        validation.validate_exp = true;
        // Supabase sets `aud = "authenticated"`; the signature is what we trust.
        validation.validate_aud = false;

        Self {
            repo,
            decoding_key: DecodingKey::from_secret(jwt_secret.as_bytes()),
            validation,
        }
    }
}

#[async_trait]
impl SessionResolver for JwtSessionResolver {
    async fn current_user(&self, ctx: &RequestContext) -> Result<Option<Identity>, AuthError> {
        if let Some(id) = ctx.dev_user_id {
            if let Some(identity) = dev_identity(self.repo.as_ref(), id).await? {
                return Ok(Some(identity));
            }
        }

        let Some(token) = ctx.access_token.as_deref() else {
            return Ok(None);
        };

        let claims = match decode::<Claims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => data.claims,
            Err(e) => {
                match e.kind() {
                    ErrorKind::ExpiredSignature => tracing::debug!("session token expired"),
                    kind => tracing::debug!(?kind, "session token rejected"),
                }
                return Ok(None);
            }
        };

        load_identity(self.repo.as_ref(), claims.sub, claims.email)
            .await
            .map(Some)
    }
}

/// SupabaseSessionResolver
///
/// Asks Supabase Auth whether the token is still valid on every request. This
/// picks up server-side sign-outs that a locally verified JWT would miss, at the
/// cost of one HTTP round-trip.
pub struct SupabaseSessionResolver {
    repo: RepositoryState,
    auth: SupabaseAuthClient,
}

impl SupabaseSessionResolver {
    pub fn new(repo: RepositoryState, auth: SupabaseAuthClient) -> Self {
        Self { repo, auth }
    }
}

#[async_trait]
impl SessionResolver for SupabaseSessionResolver {
    async fn current_user(&self, ctx: &RequestContext) -> Result<Option<Identity>, AuthError> {
        if let Some(id) = ctx.dev_user_id {
            if let Some(identity) = dev_identity(self.repo.as_ref(), id).await? {
                return Ok(Some(identity));
            }
        }

        let Some(token) = ctx.access_token.as_deref() else {
            return Ok(None);
        };

        match self.auth.get_user(token).await? {
            Some(user) => load_identity(self.repo.as_ref(), user.id, user.email)
                .await
                .map(Some),
            None => Ok(None),
        }
    }
}
