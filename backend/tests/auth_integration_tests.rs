use axum::{
    Json, Router,
    extract::{FromRequestParts, Query, State},
    http::{HeaderMap, HeaderValue, Request, StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use parking_portal::{
    AppConfig, AppState, InMemoryRepository,
    auth::{
        AdminUser, Claims, CurrentUser, GuardRejection, JwtSessionResolver, ManagementUser,
        PkceChallenge, RequestContext, SessionResolver, SupabaseAuthClient,
        SupabaseSessionResolver, session::parse_cookie,
    },
    config::Env,
    error::{AppError, AuthError, RepoError},
    handlers::{self, CallbackParams},
    models::{Profile, Role},
    navigation::RouteIntent,
    repository::RepositoryState,
};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde::Deserialize;
use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};
use tokio::net::TcpListener;
use uuid::Uuid;

// --- Helpers ---

fn now_secs() -> usize {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs() as usize
}

fn sign(sub: Uuid, exp: usize, secret: &str) -> String {
    let claims = Claims {
        sub,
        exp,
        iat: now_secs(),
        email: Some("driver@corp.example".to_string()),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

fn valid_token(sub: Uuid) -> String {
    sign(sub, now_secs() + 3600, &AppConfig::default().jwt_secret)
}

fn profile(user_id: Uuid, role: Option<Role>) -> Profile {
    Profile {
        user_id,
        full_name: "Pat Driver".to_string(),
        role,
    }
}

fn resolver(repo: InMemoryRepository) -> JwtSessionResolver {
    JwtSessionResolver::new(
        Arc::new(repo) as RepositoryState,
        &AppConfig::default().jwt_secret,
    )
}

fn parts_with(headers: &[(&str, &str)]) -> Parts {
    let mut builder = Request::builder().uri("/dashboard");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(()).unwrap().into_parts().0
}

fn app_state(repo: InMemoryRepository, config: AppConfig) -> AppState {
    AppState::new(Arc::new(repo) as RepositoryState, config)
}

// --- JwtSessionResolver ---

#[tokio::test]
async fn test_valid_token_resolves_identity_with_profile() {
    let user_id = Uuid::new_v4();
    let sessions = resolver(
        InMemoryRepository::new().with_profile(profile(user_id, Some(Role::Management))),
    );

    let identity = sessions
        .current_user(&RequestContext::with_token(valid_token(user_id)))
        .await
        .unwrap()
        .expect("identity");

    assert_eq!(identity.id, user_id);
    assert_eq!(identity.email.as_deref(), Some("driver@corp.example"));
    assert_eq!(identity.profile_role(), Some(Role::Management));
}

#[tokio::test]
async fn test_valid_token_without_profile_row_is_still_a_session() {
    let user_id = Uuid::new_v4();
    let sessions = resolver(InMemoryRepository::new());

    let identity = sessions
        .current_user(&RequestContext::with_token(valid_token(user_id)))
        .await
        .unwrap()
        .expect("identity");

    assert!(identity.profile.is_none());
}

#[tokio::test]
async fn test_missing_token_is_no_session() {
    let sessions = resolver(InMemoryRepository::new());

    let result = sessions.current_user(&RequestContext::anonymous()).await;

    assert!(matches!(result, Ok(None)));
}

#[tokio::test]
async fn test_expired_token_is_no_session() {
    let user_id = Uuid::new_v4();
    let sessions = resolver(InMemoryRepository::new().with_profile(profile(user_id, None)));
    let expired = sign(user_id, now_secs() - 3600, &AppConfig::default().jwt_secret);

    let result = sessions
        .current_user(&RequestContext::with_token(expired))
        .await;

    assert!(matches!(result, Ok(None)));
}

#[tokio::test]
async fn test_token_signed_with_wrong_secret_is_no_session() {
    let user_id = Uuid::new_v4();
    let sessions = resolver(InMemoryRepository::new().with_profile(profile(user_id, None)));
    let forged = sign(user_id, now_secs() + 3600, "not-the-project-secret");

    let result = sessions.current_user(&RequestContext::with_token(forged)).await;

    assert!(matches!(result, Ok(None)));
}

#[tokio::test]
async fn test_garbage_token_is_no_session() {
    let sessions = resolver(InMemoryRepository::new());

    let result = sessions
        .current_user(&RequestContext::with_token("definitely-not-a-jwt"))
        .await;

    assert!(matches!(result, Ok(None)));
}

#[tokio::test]
async fn test_profile_storage_failure_is_an_error() {
    let sessions = resolver(InMemoryRepository::new_failing());

    let result = sessions
        .current_user(&RequestContext::with_token(valid_token(Uuid::new_v4())))
        .await;

    assert!(matches!(
        result,
        Err(AuthError::Storage(RepoError::Unavailable(_)))
    ));
}

#[tokio::test]
async fn test_dev_bypass_needs_existing_profile() {
    let known = Uuid::new_v4();
    let sessions = resolver(InMemoryRepository::new().with_profile(profile(known, Some(Role::Admin))));

    let found = sessions
        .current_user(&RequestContext {
            access_token: None,
            dev_user_id: Some(known),
        })
        .await
        .unwrap();
    let unknown = sessions
        .current_user(&RequestContext {
            access_token: None,
            dev_user_id: Some(Uuid::new_v4()),
        })
        .await
        .unwrap();

    assert_eq!(found.map(|i| i.profile_role()), Some(Some(Role::Admin)));
    assert!(unknown.is_none());
}

// --- RequestContext ---

#[test]
fn test_bearer_header_wins_over_cookie() {
    let parts = parts_with(&[
        ("authorization", "Bearer from-header"),
        ("cookie", "theme=dark; sb-access-token=from-cookie"),
    ]);

    let ctx = RequestContext::from_headers(&parts.headers, &AppConfig::default());

    assert_eq!(ctx.access_token.as_deref(), Some("from-header"));
}

#[test]
fn test_cookie_token_is_read_when_no_bearer() {
    let parts = parts_with(&[("cookie", "theme=dark; sb-access-token=from-cookie")]);

    let ctx = RequestContext::from_headers(&parts.headers, &AppConfig::default());

    assert_eq!(ctx.access_token.as_deref(), Some("from-cookie"));
    assert_eq!(
        parse_cookie(&parts.headers, "theme").as_deref(),
        Some("dark")
    );
    assert_eq!(parse_cookie(&parts.headers, "missing"), None);
}

#[test]
fn test_dev_header_ignored_in_production() {
    let user_id = Uuid::new_v4().to_string();
    let parts = parts_with(&[("x-user-id", user_id.as_str())]);
    let production = AppConfig {
        env: Env::Production,
        ..AppConfig::default()
    };

    let local_ctx = RequestContext::from_headers(&parts.headers, &AppConfig::default());
    let prod_ctx = RequestContext::from_headers(&parts.headers, &production);

    assert!(local_ctx.dev_user_id.is_some());
    assert_eq!(prod_ctx, RequestContext::anonymous());
}

// --- Extractors ---

#[tokio::test]
async fn test_current_user_extractor_accepts_bearer_token() {
    let user_id = Uuid::new_v4();
    let state = app_state(
        InMemoryRepository::new().with_profile(profile(user_id, None)),
        AppConfig::default(),
    );
    let bearer = format!("Bearer {}", valid_token(user_id));
    let mut parts = parts_with(&[("authorization", bearer.as_str())]);

    let CurrentUser(identity) = CurrentUser::from_request_parts(&mut parts, &state)
        .await
        .unwrap();

    assert_eq!(identity.id, user_id);
}

#[tokio::test]
async fn test_current_user_extractor_redirects_anonymous_to_login() {
    let state = app_state(InMemoryRepository::new(), AppConfig::default());
    let mut parts = parts_with(&[]);

    let rejection = CurrentUser::from_request_parts(&mut parts, &state)
        .await
        .unwrap_err();

    assert!(matches!(
        rejection,
        GuardRejection::Redirect(RouteIntent::Login)
    ));
    let response = rejection.into_response();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/login");
}

#[tokio::test]
async fn test_management_extractor_redirects_employee_to_dashboard() {
    let user_id = Uuid::new_v4();
    let state = app_state(
        InMemoryRepository::new().with_profile(profile(user_id, Some(Role::Employee))),
        AppConfig::default(),
    );
    let bearer = format!("Bearer {}", valid_token(user_id));
    let mut parts = parts_with(&[("authorization", bearer.as_str())]);

    let rejection = ManagementUser::from_request_parts(&mut parts, &state)
        .await
        .unwrap_err();

    assert!(matches!(
        rejection,
        GuardRejection::Redirect(RouteIntent::Dashboard)
    ));
}

#[tokio::test]
async fn test_admin_extractor_reuses_identity_from_extensions() {
    let user_id = Uuid::new_v4();
    // The failing repository proves no second resolution happens.
    let state = app_state(InMemoryRepository::new_failing(), AppConfig::default());
    let mut parts = parts_with(&[]);
    parts.extensions.insert(parking_portal::models::Identity {
        id: user_id,
        email: None,
        profile: Some(profile(user_id, Some(Role::Admin))),
    });

    let AdminUser(identity) = AdminUser::from_request_parts(&mut parts, &state)
        .await
        .unwrap();

    assert_eq!(identity.id, user_id);
}

#[tokio::test]
async fn test_extractor_storage_failure_is_server_error() {
    let state = app_state(InMemoryRepository::new_failing(), AppConfig::default());
    let bearer = format!("Bearer {}", valid_token(Uuid::new_v4()));
    let mut parts = parts_with(&[("authorization", bearer.as_str())]);

    let rejection = CurrentUser::from_request_parts(&mut parts, &state)
        .await
        .unwrap_err();

    assert!(matches!(rejection, GuardRejection::Failed(_)));
    assert_eq!(
        rejection.into_response().status(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

// --- Stub Supabase Auth ---

const ANON_KEY: &str = "stub-anon-key";
const STUB_USER: Uuid = Uuid::from_u128(0x5eed_0000_0000_4000_8000_0000_0000_0001);
const STUB_VERIFIER: &str = "a2c4e6f8a2c4e6f8a2c4e6f8a2c4e6f8a2c4e6f8a2c4e6f8a2c4e6f8a2c4e6f8";

/// Answers `/auth/v1/user` by bearer token.
async fn stub_user(headers: HeaderMap) -> Response {
    if headers.get("apikey").and_then(|v| v.to_str().ok()) != Some(ANON_KEY) {
        return StatusCode::BAD_REQUEST.into_response();
    }
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or_default();

    match token {
        "valid" => Json(serde_json::json!({
            "id": STUB_USER,
            "email": "driver@corp.example",
            "aud": "authenticated",
        }))
        .into_response(),
        "forbidden" => StatusCode::FORBIDDEN.into_response(),
        "boom" => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        "garbage" => (StatusCode::OK, "<html>maintenance</html>").into_response(),
        "slow" => {
            tokio::time::sleep(Duration::from_secs(2)).await;
            StatusCode::UNAUTHORIZED.into_response()
        }
        _ => StatusCode::UNAUTHORIZED.into_response(),
    }
}

#[derive(Deserialize)]
struct GrantQuery {
    grant_type: String,
}

#[derive(Deserialize)]
struct PkceGrantBody {
    auth_code: String,
    code_verifier: String,
}

/// Answers `/auth/v1/token?grant_type=pkce`. `good-code` paired with
/// `STUB_VERIFIER` is the only accepted grant; `boom` fails server-side.
async fn stub_token(
    State(verifier): State<&'static str>,
    Query(query): Query<GrantQuery>,
    Json(body): Json<PkceGrantBody>,
) -> Response {
    if query.grant_type != "pkce" {
        return StatusCode::BAD_REQUEST.into_response();
    }
    match body.auth_code.as_str() {
        "boom" => StatusCode::SERVICE_UNAVAILABLE.into_response(),
        "good-code" if body.code_verifier == verifier => Json(serde_json::json!({
            "access_token": "issued-access-token",
            "token_type": "bearer",
            "expires_in": 3600,
        }))
        .into_response(),
        _ => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "invalid_grant" })),
        )
            .into_response(),
    }
}

async fn spawn_supabase() -> String {
    let router = Router::new()
        .route("/auth/v1/user", get(stub_user))
        .route("/auth/v1/token", post(stub_token))
        .with_state(STUB_VERIFIER);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    format!("http://127.0.0.1:{}", port)
}

/// An address nothing listens on.
async fn closed_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}

fn remote_resolver(
    repo: InMemoryRepository,
    supabase_url: &str,
    timeout: Duration,
) -> SupabaseSessionResolver {
    let auth = SupabaseAuthClient::new(supabase_url, ANON_KEY, timeout).unwrap();
    SupabaseSessionResolver::new(Arc::new(repo) as RepositoryState, auth)
}

fn stub_config(supabase_url: &str) -> AppConfig {
    AppConfig {
        supabase_url: supabase_url.to_string(),
        supabase_anon_key: ANON_KEY.to_string(),
        ..AppConfig::default()
    }
}

fn set_cookies(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .map(str::to_string)
        .collect()
}

// --- SupabaseSessionResolver ---

#[tokio::test]
async fn test_remote_valid_token_loads_profile() {
    let supabase = spawn_supabase().await;
    let resolver = remote_resolver(
        InMemoryRepository::new().with_profile(profile(STUB_USER, Some(Role::Management))),
        &supabase,
        Duration::from_secs(5),
    );

    let identity = resolver
        .current_user(&RequestContext::with_token("valid"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(identity.id, STUB_USER);
    assert_eq!(identity.email.as_deref(), Some("driver@corp.example"));
    assert_eq!(identity.profile_role(), Some(Role::Management));
}

#[tokio::test]
async fn test_remote_rejected_token_is_no_session() {
    let supabase = spawn_supabase().await;
    let resolver = remote_resolver(InMemoryRepository::new(), &supabase, Duration::from_secs(5));

    for token in ["revoked", "forbidden"] {
        let result = resolver
            .current_user(&RequestContext::with_token(token))
            .await;
        assert!(matches!(result, Ok(None)), "{token}");
    }
}

#[tokio::test]
async fn test_remote_server_error_is_a_bad_gateway() {
    let supabase = spawn_supabase().await;
    let resolver = remote_resolver(InMemoryRepository::new(), &supabase, Duration::from_secs(5));

    let err = resolver
        .current_user(&RequestContext::with_token("boom"))
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::Provider(_)));
    assert_eq!(AppError::from(err).status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_remote_unparseable_user_is_an_error() {
    let supabase = spawn_supabase().await;
    let resolver = remote_resolver(InMemoryRepository::new(), &supabase, Duration::from_secs(5));

    let result = resolver
        .current_user(&RequestContext::with_token("garbage"))
        .await;

    assert!(matches!(result, Err(AuthError::Provider(_))));
}

#[tokio::test]
async fn test_remote_unreachable_provider_is_an_error() {
    let resolver = remote_resolver(
        InMemoryRepository::new(),
        &closed_address().await,
        Duration::from_secs(5),
    );

    let result = resolver
        .current_user(&RequestContext::with_token("valid"))
        .await;

    assert!(matches!(result, Err(AuthError::Provider(_))));
}

#[tokio::test]
async fn test_remote_slow_provider_times_out() {
    let supabase = spawn_supabase().await;
    let resolver = remote_resolver(
        InMemoryRepository::new(),
        &supabase,
        Duration::from_millis(200),
    );

    let result = resolver
        .current_user(&RequestContext::with_token("slow"))
        .await;

    assert!(matches!(result, Err(AuthError::Provider(_))));
}

#[tokio::test]
async fn test_remote_resolver_without_token_skips_the_provider() {
    let resolver = remote_resolver(
        InMemoryRepository::new(),
        &closed_address().await,
        Duration::from_secs(5),
    );

    let result = resolver.current_user(&RequestContext::anonymous()).await;

    assert!(matches!(result, Ok(None)));
}

// --- PKCE Sign-In ---

#[test]
fn test_pkce_challenge_is_s256_of_verifier() {
    let pkce = PkceChallenge::from_verifier("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk");

    assert_eq!(pkce.challenge, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
}

#[test]
fn test_generated_verifiers_are_fresh_and_well_formed() {
    let first = PkceChallenge::generate();
    let second = PkceChallenge::generate();

    assert_ne!(first.verifier, second.verifier);
    assert!((43..=128).contains(&first.verifier.len()));
    assert!(first.verifier.chars().all(|c| c.is_ascii_alphanumeric()));
    assert_eq!(first.challenge.len(), 43);
}

fn callback_request(code: &str, verifier: &str) -> (HeaderMap, CallbackParams) {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::COOKIE,
        HeaderValue::from_str(&format!("sb-code-verifier={verifier}")).unwrap(),
    );
    let params = CallbackParams {
        code: Some(code.to_string()),
        ..Default::default()
    };
    (headers, params)
}

#[tokio::test]
async fn test_callback_exchanges_code_and_hands_over_to_root() {
    let supabase = spawn_supabase().await;
    let state = app_state(InMemoryRepository::new(), stub_config(&supabase));
    let (headers, params) = callback_request("good-code", STUB_VERIFIER);

    let response = handlers::auth_callback(State(state), headers, Query(params))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/");
    let cookies = set_cookies(&response);
    let session = cookies
        .iter()
        .find(|c| c.starts_with("sb-access-token="))
        .expect("session cookie set");
    assert!(session.starts_with("sb-access-token=issued-access-token;"));
    assert!(session.contains("HttpOnly"));
    assert!(
        cookies
            .iter()
            .any(|c| c.starts_with("sb-code-verifier=") && c.contains("Max-Age=0"))
    );
}

#[tokio::test]
async fn test_callback_with_rejected_code_returns_to_login() {
    let supabase = spawn_supabase().await;
    let state = app_state(InMemoryRepository::new(), stub_config(&supabase));

    for (code, verifier) in [("good-code", "someone-elses-verifier"), ("used-code", STUB_VERIFIER)] {
        let (headers, params) = callback_request(code, verifier);

        let response = handlers::auth_callback(State(state.clone()), headers, Query(params))
            .await
            .unwrap();

        assert_eq!(response.headers()[header::LOCATION], "/login", "{code}");
        assert!(
            set_cookies(&response)
                .iter()
                .all(|c| !c.starts_with("sb-access-token="))
        );
    }
}

#[tokio::test]
async fn test_callback_provider_outage_is_a_bad_gateway() {
    let supabase = spawn_supabase().await;
    let state = app_state(InMemoryRepository::new(), stub_config(&supabase));
    let (headers, params) = callback_request("boom", STUB_VERIFIER);

    let err = handlers::auth_callback(State(state), headers, Query(params))
        .await
        .unwrap_err();

    assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_callback_unreachable_provider_is_a_bad_gateway() {
    let state = app_state(InMemoryRepository::new(), stub_config(&closed_address().await));
    let (headers, params) = callback_request("good-code", STUB_VERIFIER);

    let err = handlers::auth_callback(State(state), headers, Query(params))
        .await
        .unwrap_err();

    assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
}
