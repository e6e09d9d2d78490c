/*
 * Responsibility
 * - the OIDC provider-side endpoints: /authorize, /authorize-login,
 *   /simulate-auth-failure, /token, /jwks.json, /health
 * - form POSTs answer with 303 See Other so the user agent performs a GET on
 *   the follow-up request
 */
use std::time::{Duration, Instant};

use axum::{
    Json,
    extract::{Form, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::codes::AuthCodeData;
use crate::error::TokenError;
use crate::keys::IdTokenClaims;
use crate::state::AppState;

const ID_TOKEN_TTL_SECONDS: i64 = 7200;

#[derive(Debug, Deserialize)]
pub struct AuthorizeParams {
    pub response_type: Option<String>,
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub state: Option<String>,
    pub nonce: Option<String>,
}

/// Authorization endpoint: validates the request and renders the login form
/// with every received OIDC parameter embedded as a hidden field.
pub async fn authorize(Query(params): Query<AuthorizeParams>) -> Response {
    let (Some(response_type), Some(client_id), Some(redirect_uri), Some(state)) = (
        params.response_type.as_deref(),
        params.client_id.as_deref(),
        params.redirect_uri.as_deref(),
        params.state.as_deref(),
    ) else {
        return (
            StatusCode::BAD_REQUEST,
            "Missing required OIDC parameters (response_type, client_id, redirect_uri, state)",
        )
            .into_response();
    };

    tracing::debug!(client_id, state, "authorization request");

    let mut hidden = vec![
        ("response_type", response_type),
        ("client_id", client_id),
        ("redirect_uri", redirect_uri),
        ("state", state),
    ];
    if let Some(nonce) = params.nonce.as_deref() {
        hidden.push(("nonce", nonce));
    }

    Html(login_form(None, &hidden)).into_response()
}

#[derive(Debug, Deserialize)]
pub struct LoginViewParams {
    pub error: Option<String>,
}

/// Login-error view. Failed form submissions and the simulated failure path
/// redirect here; rendering the bare form keeps the provider self-contained.
pub async fn login_view(Query(params): Query<LoginViewParams>) -> Html<String> {
    Html(login_form(params.error.as_deref(), &[]))
}

#[derive(Debug, Deserialize)]
pub struct LoginSubmission {
    pub username: Option<String>,
    pub password: Option<String>,
    pub response_type: Option<String>,
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub state: Option<String>,
    pub nonce: Option<String>,
}

/// Login form POST: mints a single-use authorization code and sends the
/// browser back to the relying party's callback.
pub async fn authorize_login(
    State(state): State<AppState>,
    Form(form): Form<LoginSubmission>,
) -> Response {
    let oauth_state = form.state.clone().unwrap_or_default();

    let (Some(username), Some(password)) = (form.username.as_deref(), form.password.as_deref())
    else {
        return login_error_redirect("Username and password are required.", &oauth_state);
    };
    if username.is_empty() || password.is_empty() {
        return login_error_redirect("Username and password are required.", &oauth_state);
    }

    let (Some(client_id), Some(redirect_uri)) = (form.client_id, form.redirect_uri) else {
        return (
            StatusCode::BAD_REQUEST,
            "Missing client_id or redirect_uri",
        )
            .into_response();
    };

    // Any username/password pair authenticates against the dummy provider;
    // the username becomes the OIDC subject.
    let code = Uuid::new_v4().to_string();
    let data = AuthCodeData {
        client_id,
        redirect_uri: redirect_uri.clone(),
        state: oauth_state.clone(),
        nonce: form.nonce,
        subject: username.to_string(),
        issued_at: Instant::now(),
    };
    state.codes.insert(code.clone(), data).await;
    tracing::info!(code, subject = username, "authorization code issued");

    // Delayed cleanup with a 1s grace period; redemption checks expiry anyway.
    let codes = state.codes.clone();
    let cleanup_code = code.clone();
    let cleanup_after = state.code_ttl + Duration::from_secs(1);
    tokio::spawn(async move {
        tokio::time::sleep(cleanup_after).await;
        codes.remove_if_expired(&cleanup_code).await;
    });

    let target = format!(
        "{}?{}",
        redirect_uri,
        encode_query(&[("code", &code), ("state", &oauth_state)])
    );
    Redirect::to(&target).into_response()
}

#[derive(Debug, Deserialize)]
pub struct FailureForm {
    pub state: Option<String>,
}

/// Deterministic failure path for tests exercising the relying party's
/// error handling.
pub async fn simulate_auth_failure(Form(form): Form<FailureForm>) -> Response {
    tracing::info!("simulating authentication failure");
    login_error_redirect(
        "Simulated authentication failure.",
        form.state.as_deref().unwrap_or(""),
    )
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub grant_type: Option<String>,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub client_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub id_token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
}

/// Token endpoint: redeems an authorization code (single use) for a signed
/// ID token.
pub async fn token(
    State(state): State<AppState>,
    Form(req): Form<TokenRequest>,
) -> Result<Json<TokenResponse>, TokenError> {
    if req.grant_type.as_deref() != Some("authorization_code") {
        return Err(TokenError::UnsupportedGrantType);
    }

    let code = req.code.unwrap_or_default();

    // Atomic take: a second redemption of the same code (or an expired one)
    // sees nothing.
    let data = state
        .codes
        .take(&code)
        .await
        .ok_or(TokenError::InvalidGrant("Authorization code is invalid or expired."))?;

    if Some(data.client_id.as_str()) != req.client_id.as_deref()
        || Some(data.redirect_uri.as_str()) != req.redirect_uri.as_deref()
    {
        tracing::warn!(code, "client_id or redirect_uri mismatch at redemption");
        return Err(TokenError::InvalidGrant("Client ID or Redirect URI mismatch."));
    }

    let now = chrono::Utc::now().timestamp();
    let claims = IdTokenClaims {
        sub: data.subject.clone(),
        aud: data.client_id,
        nonce: data.nonce,
        name: data.subject.clone(),
        email: data.subject.clone(),
        iss: state.issuer.clone(),
        iat: now,
        exp: now + ID_TOKEN_TTL_SECONDS,
    };

    let id_token = state.keys.sign_id_token(&claims).map_err(|e| {
        tracing::error!(error = %e, "ID token signing failed");
        TokenError::Signing
    })?;

    tracing::info!(subject = %data.subject, "tokens issued");

    Ok(Json(TokenResponse {
        access_token: Uuid::new_v4().to_string(),
        id_token,
        token_type: "Bearer",
        expires_in: ID_TOKEN_TTL_SECONDS as u64,
    }))
}

pub async fn jwks(State(state): State<AppState>) -> Json<crate::keys::JwkSet> {
    Json(state.keys.jwks().clone())
}

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "Dummy auth server is running",
        "issuer": state.issuer,
        "endpoints": {
            "authorize": format!("{}/authorize", state.issuer),
            "token": format!("{}/token", state.issuer),
            "jwks": format!("{}/jwks.json", state.issuer),
        },
    }))
}

fn login_error_redirect(message: &str, state: &str) -> Response {
    let query = if state.is_empty() {
        encode_query(&[("error", message)])
    } else {
        encode_query(&[("error", message), ("state", state)])
    };
    Redirect::to(&format!("/login?{}", query)).into_response()
}

fn encode_query(pairs: &[(&str, &str)]) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in pairs {
        serializer.append_pair(key, value);
    }
    serializer.finish()
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn login_form(error: Option<&str>, hidden: &[(&str, &str)]) -> String {
    let error_banner = error
        .map(|msg| format!(r#"<p class="error-message">{}</p>"#, escape_html(msg)))
        .unwrap_or_default();

    let hidden_inputs: String = hidden
        .iter()
        .map(|(name, value)| {
            format!(
                r#"<input type="hidden" name="{}" value="{}">"#,
                escape_html(name),
                escape_html(value)
            )
        })
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Dummy Auth Login</title>
    <style>
        body {{ font-family: sans-serif; display: flex; justify-content: center; align-items: center; min-height: 80vh; background-color: #eef2f6; margin: 0; }}
        .container {{ background-color: #ffffff; padding: 40px; border-radius: 10px; box-shadow: 0 4px 20px rgba(0,0,0,0.1); width: 350px; text-align: center; }}
        .form-group {{ margin-bottom: 20px; text-align: left; }}
        label {{ display: block; margin-bottom: 8px; font-weight: 600; color: #555; }}
        input[type="text"], input[type="password"] {{ width: 100%; padding: 12px; border: 1px solid #ccc; border-radius: 6px; box-sizing: border-box; }}
        .button-group {{ display: flex; gap: 10px; margin-top: 20px; }}
        button {{ flex: 1; padding: 14px; border: none; border-radius: 6px; cursor: pointer; }}
        button.login {{ background-color: #007bff; color: white; }}
        button.fail {{ background-color: #dc3545; color: white; }}
        .error-message {{ color: #dc3545; margin-bottom: 20px; padding: 10px; background-color: #f8d7da; border: 1px solid #f5c6cb; border-radius: 4px; }}
    </style>
</head>
<body>
    <div class="container">
        <h2>Dummy Authentication</h2>
        {error_banner}
        <form method="post" action="/authorize-login">
            {hidden_inputs}
            <div class="form-group">
                <label for="username">Username:</label>
                <input type="text" id="username" name="username" required>
            </div>
            <div class="form-group">
                <label for="password">Password:</label>
                <input type="password" id="password" name="password" required>
            </div>
            <div class="button-group">
                <button type="submit" formaction="/authorize-login" formmethod="post" class="login">Login</button>
                <button type="submit" formaction="/simulate-auth-failure" formmethod="post" class="fail">Simulate Auth Failure</button>
            </div>
        </form>
    </div>
</body>
</html>
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::build_router;
    use crate::codes::MemoryCodeStore;
    use crate::keys::SigningKeys;
    use axum::Router;
    use axum::body::Body;
    use axum::http::{Request, header};
    use jsonwebtoken::{Algorithm, DecodingKey, Validation};
    use std::sync::{Arc, OnceLock};
    use tower::ServiceExt;

    const ISSUER: &str = "http://localhost:3001";
    const CLIENT_ID: &str = "my-dummy-client-id";
    const REDIRECT_URI: &str = "http://localhost:3000/auth/openid/callback";

    fn shared_keys() -> Arc<SigningKeys> {
        static KEYS: OnceLock<Arc<SigningKeys>> = OnceLock::new();
        KEYS.get_or_init(|| Arc::new(SigningKeys::generate().expect("keygen")))
            .clone()
    }

    fn test_router() -> Router {
        test_router_with_ttl(Duration::from_secs(300))
    }

    fn test_router_with_ttl(ttl: Duration) -> Router {
        let state = AppState::new(
            ISSUER.to_string(),
            shared_keys(),
            Arc::new(MemoryCodeStore::new(ttl)),
            ttl,
        );
        build_router(state)
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        String::from_utf8(bytes.to_vec()).expect("utf8")
    }

    fn form_request(uri: &str, body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .expect("request")
    }

    fn login_body(username: &str, password: &str, state: &str) -> String {
        encode_query(&[
            ("username", username),
            ("password", password),
            ("response_type", "code"),
            ("client_id", CLIENT_ID),
            ("redirect_uri", REDIRECT_URI),
            ("state", state),
            ("nonce", "nonce-abc"),
        ])
    }

    async fn obtain_code(app: &Router, state: &str) -> String {
        let response = app
            .clone()
            .oneshot(form_request("/authorize-login", login_body("alice", "pw", state)))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let location = response
            .headers()
            .get(header::LOCATION)
            .expect("location")
            .to_str()
            .expect("utf8");
        let url = url::Url::parse(location).expect("redirect url");
        url.query_pairs()
            .find(|(k, _)| k == "code")
            .map(|(_, v)| v.into_owned())
            .expect("code param")
    }

    fn token_body(code: &str) -> String {
        encode_query(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", REDIRECT_URI),
            ("client_id", CLIENT_ID),
        ])
    }

    #[tokio::test]
    async fn authorize_requires_oidc_parameters() {
        let app = test_router();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/authorize?response_type=code&client_id=x")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn authorize_renders_form_with_hidden_fields() {
        let app = test_router();
        let uri = format!(
            "/authorize?{}",
            encode_query(&[
                ("response_type", "code"),
                ("client_id", CLIENT_ID),
                ("redirect_uri", REDIRECT_URI),
                ("state", "st-1"),
                ("nonce", "n-1"),
            ])
        );
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_string(response).await;
        assert!(body.contains(r#"name="state" value="st-1""#));
        assert!(body.contains(r#"name="nonce" value="n-1""#));
        assert!(body.contains(r#"action="/authorize-login""#));
    }

    #[tokio::test]
    async fn login_without_credentials_redirects_to_error_view() {
        let app = test_router();
        let body = encode_query(&[
            ("response_type", "code"),
            ("client_id", CLIENT_ID),
            ("redirect_uri", REDIRECT_URI),
            ("state", "st-2"),
        ]);
        let response = app
            .oneshot(form_request("/authorize-login", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let location = response.headers()[header::LOCATION].to_str().unwrap();
        assert!(location.starts_with("/login?error="));
        assert!(location.contains("state=st-2"));
    }

    #[tokio::test]
    async fn successful_login_redirects_with_code_and_state() {
        let app = test_router();
        let response = app
            .clone()
            .oneshot(form_request("/authorize-login", login_body("alice", "pw", "st-3")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let location = response.headers()[header::LOCATION].to_str().unwrap();
        assert!(location.starts_with(REDIRECT_URI));
        assert!(location.contains("code="));
        assert!(location.contains("state=st-3"));
    }

    #[tokio::test]
    async fn simulate_auth_failure_redirects_with_error() {
        let app = test_router();
        let response = app
            .oneshot(form_request(
                "/simulate-auth-failure",
                encode_query(&[("state", "st-4")]),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let location = response.headers()[header::LOCATION].to_str().unwrap();
        assert!(location.starts_with("/login?error="));
        assert!(location.contains("state=st-4"));
    }

    #[tokio::test]
    async fn token_exchange_returns_verifiable_id_token() {
        let app = test_router();
        let code = obtain_code(&app, "st-5").await;

        let response = app
            .clone()
            .oneshot(form_request("/token", token_body(&code)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: serde_json::Value =
            serde_json::from_str(&body_string(response).await).expect("json");
        assert_eq!(body["token_type"], "Bearer");
        assert_eq!(body["expires_in"], 7200);

        // verify the ID token against the published JWKS, like a real client
        let jwks_response = app
            .oneshot(Request::builder().uri("/jwks.json").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let jwks: crate::keys::JwkSet =
            serde_json::from_str(&body_string(jwks_response).await).expect("jwks");
        let jwk = &jwks.keys[0];

        let decoding_key = DecodingKey::from_rsa_components(&jwk.n, &jwk.e).expect("jwk");
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[CLIENT_ID]);
        validation.set_issuer(&[ISSUER]);

        let decoded = jsonwebtoken::decode::<IdTokenClaims>(
            body["id_token"].as_str().expect("id_token"),
            &decoding_key,
            &validation,
        )
        .expect("verify");
        assert_eq!(decoded.claims.sub, "alice");
        assert_eq!(decoded.claims.nonce.as_deref(), Some("nonce-abc"));
    }

    #[tokio::test]
    async fn token_rejects_unsupported_grant_type() {
        let app = test_router();
        let response = app
            .oneshot(form_request(
                "/token",
                encode_query(&[("grant_type", "client_credentials"), ("code", "x")]),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body: serde_json::Value =
            serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["error"], "unsupported_grant_type");
    }

    #[tokio::test]
    async fn code_redemption_is_single_use() {
        let app = test_router();
        let code = obtain_code(&app, "st-6").await;

        let first = app
            .clone()
            .oneshot(form_request("/token", token_body(&code)))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app
            .oneshot(form_request("/token", token_body(&code)))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = serde_json::from_str(&body_string(second).await).unwrap();
        assert_eq!(body["error"], "invalid_grant");
    }

    #[tokio::test]
    async fn token_rejects_mismatched_client() {
        let app = test_router();
        let code = obtain_code(&app, "st-7").await;

        let response = app
            .oneshot(form_request(
                "/token",
                encode_query(&[
                    ("grant_type", "authorization_code"),
                    ("code", &code),
                    ("redirect_uri", REDIRECT_URI),
                    ("client_id", "some-other-client"),
                ]),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value =
            serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["error"], "invalid_grant");
    }

    #[tokio::test]
    async fn expired_code_yields_invalid_grant() {
        let app = test_router_with_ttl(Duration::from_millis(0));
        let code = obtain_code(&app, "st-8").await;

        tokio::time::sleep(Duration::from_millis(10)).await;

        let response = app
            .oneshot(form_request("/token", token_body(&code)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value =
            serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["error"], "invalid_grant");
    }

    #[tokio::test]
    async fn jwks_exposes_signing_key() {
        let app = test_router();
        let response = app
            .oneshot(Request::builder().uri("/jwks.json").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let jwks: crate::keys::JwkSet =
            serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(jwks.keys.len(), 1);
        assert_eq!(jwks.keys[0].kid, "1");
        assert_eq!(jwks.keys[0].kty, "RSA");
    }

    #[tokio::test]
    async fn health_reports_issuer_and_endpoints() {
        let app = test_router();
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: serde_json::Value =
            serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["issuer"], ISSUER);
        assert!(body["endpoints"]["token"].as_str().unwrap().ends_with("/token"));
    }
}
