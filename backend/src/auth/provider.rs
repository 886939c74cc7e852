use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;
use uuid::Uuid;

use crate::error::AuthError;

/// PkceChallenge
///
/// One sign-in attempt's verifier and its S256 challenge. The verifier stays
/// with the browser (HttpOnly cookie); only the challenge goes to Supabase.
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    pub verifier: String,
    pub challenge: String,
}

impl PkceChallenge {
    /// Fresh verifier: 64 hex characters from two v4 UUIDs, inside the 43..=128
    /// unreserved-character range PKCE demands.
    pub fn generate() -> Self {
        let verifier = format!(
            "{}{}",
            Uuid::new_v4().simple(),
            Uuid::new_v4().simple()
        );
        Self::from_verifier(verifier)
    }

    pub fn from_verifier(verifier: impl Into<String>) -> Self {
        let verifier = verifier.into();
        let digest = Sha256::digest(verifier.as_bytes());
        let challenge = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest);
        Self {
            verifier,
            challenge,
        }
    }
}

/// The user as reported by `GET /auth/v1/user`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderUser {
    pub id: Uuid,
    pub email: Option<String>,
}

#[derive(Serialize)]
struct PkceGrant<'a> {
    auth_code: &'a str,
    code_verifier: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// SupabaseAuthClient
///
/// Thin client for the two Supabase Auth endpoints the portal calls. Every
/// request carries the anon key and is bounded by the configured timeout; a
/// timeout or transport failure surfaces as `AuthError::Provider`.
#[derive(Clone)]
pub struct SupabaseAuthClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseAuthClient {
    pub fn new(supabase_url: &str, anon_key: &str, timeout: Duration) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: supabase_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        })
    }

    /// Who owns `access_token`. `Ok(None)` when Supabase rejects the token (401/403).
    pub async fn get_user(&self, access_token: &str) -> Result<Option<ProviderUser>, AuthError> {
        let endpoint = format!("{}/auth/v1/user", self.base_url);
        let response = self
            .http
            .get(&endpoint)
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(AuthError::Provider(format!("GET {endpoint} returned {status}")));
        }

        Ok(Some(response.json::<ProviderUser>().await?))
    }

    /// Trades the callback's `code` for an access token
    /// (`POST /auth/v1/token?grant_type=pkce`). `Ok(None)` when Supabase refuses the
    /// code or verifier (any 4xx): expired, already used, or from another attempt.
    pub async fn exchange_code(
        &self,
        auth_code: &str,
        code_verifier: &str,
    ) -> Result<Option<String>, AuthError> {
        let endpoint = format!("{}/auth/v1/token?grant_type=pkce", self.base_url);
        let response = self
            .http
            .post(&endpoint)
            .header("apikey", &self.anon_key)
            .json(&PkceGrant {
                auth_code,
                code_verifier,
            })
            .send()
            .await?;

        let status = response.status();
        if status.is_client_error() {
            tracing::warn!(%status, "authorization code rejected by Supabase");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(AuthError::Provider(format!("POST {endpoint} returned {status}")));
        }

        let token = response.json::<TokenResponse>().await?;
        Ok(Some(token.access_token))
    }
}
