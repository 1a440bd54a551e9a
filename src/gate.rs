//! Password gate in front of the HTTP surface.
//!
//! The password lives in a key-value secret store and is re-read on every
//! request, so rotating it there logs out every existing session at once.
//! A successful login sets `auth=<encoded password>`; each request's cookie is
//! compared against the value recomputed from the current password.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Form, Router};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::store::{KeyValueStore, MemoryStore};

pub const AUTH_COOKIE: &str = "auth";
pub const PASSWORD_KEY: &str = "password";
/// 32 hours.
pub const DEFAULT_COOKIE_TTL_SECONDS: u64 = 32 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateConfig {
    /// Key of the password in the secret store.
    pub password_key: String,
    pub cookie_ttl_seconds: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            password_key: PASSWORD_KEY.to_owned(),
            cookie_ttl_seconds: DEFAULT_COOKIE_TTL_SECONDS,
        }
    }
}

#[derive(Clone)]
pub struct Gate {
    secrets: Arc<dyn KeyValueStore>,
    config: Arc<GateConfig>,
}

impl Gate {
    pub fn new(secrets: Arc<dyn KeyValueStore>, config: GateConfig) -> Self {
        Self {
            secrets,
            config: Arc::new(config),
        }
    }

    /// A gate over a fixed in-memory password.
    pub fn with_password(password: &str, cookie_ttl_seconds: u64) -> Self {
        let config = GateConfig {
            cookie_ttl_seconds,
            ..GateConfig::default()
        };
        let secrets = MemoryStore::with_entry(&config.password_key, password);
        Self::new(Arc::new(secrets), config)
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    fn current_password(&self) -> Option<String> {
        // Secret files usually end with a newline no login form can submit.
        let stored = self
            .secrets
            .get(&self.config.password_key)
            .map(|value| value.map(|v| v.trim_end_matches(['\r', '\n']).to_owned()));
        match stored {
            Ok(Some(password)) if !password.is_empty() => Some(password),
            Ok(_) => {
                error!(key = %self.config.password_key, "no password configured, denying all requests");
                None
            }
            Err(err) => {
                error!(error = %err, "secret store unavailable, denying all requests");
                None
            }
        }
    }

    fn expected_token(&self) -> Option<String> {
        self.current_password().map(|p| encode_token(&p))
    }

    pub fn is_authorized(&self, headers: &HeaderMap) -> bool {
        let Some(presented) = cookie_value(headers, AUTH_COOKIE) else {
            return false;
        };
        self.expected_token()
            .is_some_and(|expected| same_bytes(presented.as_bytes(), expected.as_bytes()))
    }

    fn session_cookie(&self, token: &str) -> String {
        format!(
            "{AUTH_COOKIE}={token}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
            self.config.cookie_ttl_seconds
        )
    }

    /// Wrap `app` so every route of it requires a valid session, and add the
    /// login, status and logout routes, which do not.
    pub fn protect(self, app: Router) -> Router {
        let gated = app.layer(middleware::from_fn_with_state(self.clone(), require_auth));
        let open = Router::new()
            .route("/login", get(login_page).post(login))
            .route("/auth/status", get(status))
            .route("/logout", get(logout))
            .with_state(self);
        gated.merge(open)
    }
}

fn encode_token(password: &str) -> String {
    URL_SAFE_NO_PAD.encode(password.as_bytes())
}

fn cleared_cookie() -> String {
    format!("{AUTH_COOKIE}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax")
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name).then_some(value)
        })
}

/// Comparison whose duration does not depend on where the inputs differ.
fn same_bytes(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

async fn require_auth(State(gate): State<Gate>, request: Request, next: Next) -> Response {
    if gate.is_authorized(request.headers()) {
        return next.run(request).await;
    }
    (StatusCode::UNAUTHORIZED, Html(login_html(None))).into_response()
}

#[derive(Debug, Deserialize)]
struct LoginForm {
    password: String,
}

async fn login_page() -> Html<String> {
    Html(login_html(None))
}

async fn login(State(gate): State<Gate>, Form(form): Form<LoginForm>) -> Response {
    let Some(password) = gate.current_password() else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Html(login_html(Some("Login is currently unavailable."))),
        )
            .into_response();
    };
    if !same_bytes(form.password.as_bytes(), password.as_bytes()) {
        warn!("rejected login attempt");
        return (
            StatusCode::UNAUTHORIZED,
            Html(login_html(Some("Wrong password."))),
        )
            .into_response();
    }
    info!("login accepted");
    let cookie = gate.session_cookie(&encode_token(&password));
    ([(header::SET_COOKIE, cookie)], Redirect::to("/")).into_response()
}

async fn status(State(gate): State<Gate>, headers: HeaderMap) -> StatusCode {
    if gate.is_authorized(&headers) {
        StatusCode::OK
    } else {
        StatusCode::UNAUTHORIZED
    }
}

async fn logout() -> Response {
    ([(header::SET_COOKIE, cleared_cookie())], Redirect::to("/login")).into_response()
}

fn login_html(message: Option<&str>) -> String {
    let notice = message
        .map(|m| format!("<p class=\"error\">{m}</p>\n"))
        .unwrap_or_default();
    format!(
        "<!doctype html>\n<html>\n<head><meta charset=\"utf-8\"><title>Sign in</title></head>\n<body>\n{notice}<form method=\"post\" action=\"/login\">\n<input type=\"password\" name=\"password\" autofocus>\n<button type=\"submit\">Enter</button>\n</form>\n</body>\n</html>\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn app(secrets: Arc<dyn KeyValueStore>) -> Router {
        let gate = Gate::new(secrets, GateConfig::default());
        gate.protect(Router::new().route("/", get(|| async { "manuscript" })))
    }

    fn secrets(password: &str) -> Arc<MemoryStore> {
        Arc::new(MemoryStore::with_entry(PASSWORD_KEY, password))
    }

    async fn get_with_cookie(router: &Router, path: &str, cookie: Option<&str>) -> Response {
        let mut request = Request::get(path);
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        router
            .clone()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn login_with(router: &Router, password: &str) -> Response {
        router
            .clone()
            .oneshot(
                Request::post("/login")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from(format!("password={password}")))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    fn set_cookie(response: &Response) -> String {
        response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_owned()
    }

    #[tokio::test]
    async fn protected_routes_need_a_session() {
        let router = app(secrets("hunter2"));
        let response = get_with_cookie(&router, "/", None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let response = get_with_cookie(&router, "/auth/status", None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let response = get_with_cookie(&router, "/login", None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn login_sets_a_cookie_that_opens_the_gate() {
        let router = app(secrets("hunter2"));
        let response = login_with(&router, "hunter2").await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let cookie = set_cookie(&response);
        assert!(cookie.contains(&format!("Max-Age={DEFAULT_COOKIE_TTL_SECONDS}")));
        assert!(cookie.contains("HttpOnly"));

        let pair = cookie.split(';').next().unwrap().to_owned();
        let response = get_with_cookie(&router, "/", Some(&pair)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let with_others = format!("theme=dark; {pair}");
        let response = get_with_cookie(&router, "/auth/status", Some(&with_others)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let router = app(secrets("hunter2"));
        let response = login_with(&router, "hunter3").await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn rotating_the_password_ends_existing_sessions() {
        let store = secrets("old-secret");
        let router = app(store.clone());
        let cookie = format!("{AUTH_COOKIE}={}", encode_token("old-secret"));
        assert_eq!(
            get_with_cookie(&router, "/auth/status", Some(&cookie)).await.status(),
            StatusCode::OK
        );

        store.set(PASSWORD_KEY, "new-secret").unwrap();
        assert_eq!(
            get_with_cookie(&router, "/auth/status", Some(&cookie)).await.status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn missing_password_denies_everything() {
        let router = app(Arc::new(MemoryStore::new()));
        let cookie = format!("{AUTH_COOKIE}={}", encode_token(""));
        assert_eq!(
            get_with_cookie(&router, "/", Some(&cookie)).await.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            login_with(&router, "").await.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn logout_clears_the_cookie() {
        let router = app(secrets("hunter2"));
        let response = get_with_cookie(&router, "/logout", None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(set_cookie(&response).contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn secret_file_trailing_newline_is_ignored() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join(PASSWORD_KEY), "hunter2\n").unwrap();
        let router = app(Arc::new(crate::store::DirStore::new(dir.path())));

        let response = login_with(&router, "hunter2").await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let pair = set_cookie(&response).split(';').next().unwrap().to_owned();
        assert_eq!(pair, format!("{AUTH_COOKIE}={}", encode_token("hunter2")));
        assert_eq!(
            get_with_cookie(&router, "/", Some(&pair)).await.status(),
            StatusCode::OK
        );

        std::fs::write(dir.path().join(PASSWORD_KEY), "\r\n").unwrap();
        assert_eq!(
            login_with(&router, "").await.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn with_password_uses_the_given_ttl() {
        let gate = Gate::with_password("pw", 60);
        assert_eq!(gate.config().cookie_ttl_seconds, 60);
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            format!("auth={}", encode_token("pw")).parse().unwrap(),
        );
        assert!(gate.is_authorized(&headers));
    }
}
