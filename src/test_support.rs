// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-process mock of the CRM backend for tests.
//!
//! Serves the identity endpoints plus a few domain routes on an ephemeral
//! port and counts calls per endpoint. Exactly one access token is valid at
//! a time; [`MockBackend::expire_access_tokens`] rolls it over so the next
//! request with the old token gets a `401`.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Path, Query, RawQuery, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use crate::api::{CalendarApi, CrmClient, FilesApi, LeadsApi, OutreachApi};
use crate::auth::{
    AuthApi, AuthenticatedClient, IdentityResolver, RequestExecutor, SessionController,
    TokenRefresher,
};
use crate::state::SessionState;
use crate::storage::MemoryStore;

pub const MOCK_USER_ID: &str = "6f1c2b7e-4d5a-4e8b-9a0c-1d2e3f4a5b6c";
pub const MOCK_EMAIL: &str = "ada@example.com";
pub const MOCK_PASSWORD: &str = "correct horse battery staple";

/// How `POST /auth/refresh` answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshMode {
    /// New access token, no `refresh_token` in the response.
    #[default]
    KeepRefreshToken,
    /// New access token and a new refresh token.
    Rotate,
    /// `401 Invalid refresh token`.
    Reject,
}

#[derive(Default)]
struct MockState {
    token_epoch: AtomicU64,
    refresh_mode: Mutex<RefreshMode>,
    refresh_delay_ms: AtomicU64,
    me_delay_ms: AtomicU64,
    me_failing: AtomicBool,
    rotations: AtomicU64,
    refresh_calls: AtomicUsize,
    me_calls: AtomicUsize,
    echo_calls: AtomicUsize,
    logout_calls: AtomicUsize,
    last_logout_refresh_token: Mutex<Option<String>>,
}

impl MockState {
    fn valid_access_token(&self) -> String {
        format!("access-{}", self.token_epoch.load(Ordering::SeqCst))
    }

    fn authorize(&self, headers: &HeaderMap) -> Result<(), Response> {
        let expected = format!("Bearer {}", self.valid_access_token());
        let presented = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        if presented == Some(expected.as_str()) {
            Ok(())
        } else {
            Err(detail(StatusCode::UNAUTHORIZED, "Could not validate credentials"))
        }
    }
}

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}

fn user_json() -> Value {
    json!({
        "id": MOCK_USER_ID,
        "email": MOCK_EMAIL,
        "full_name": "Ada Lovelace",
        "is_active": true,
        "is_verified": true,
        "is_onboarding_complete": false,
        "created_at": "2026-01-02T03:04:05.123456",
        "last_login": null
    })
}

/// Every component of one session, built the same way [`CrmClient`] does.
pub struct TestSession {
    pub state: Arc<SessionState>,
    pub executor: RequestExecutor,
    pub client: AuthenticatedClient,
    pub auth: AuthApi,
    pub resolver: IdentityResolver,
    pub controller: SessionController,
    pub leads: LeadsApi,
    pub calendar: CalendarApi,
    pub files: FilesApi,
    pub outreach: OutreachApi,
}

impl From<CrmClient> for TestSession {
    fn from(crm: CrmClient) -> Self {
        Self {
            state: Arc::clone(crm.state()),
            executor: crm.executor().clone(),
            client: crm.client().clone(),
            auth: crm.auth().clone(),
            resolver: crm.resolver().clone(),
            controller: crm.session().clone(),
            leads: crm.leads().clone(),
            calendar: crm.calendar().clone(),
            files: crm.files().clone(),
            outreach: crm.outreach().clone(),
        }
    }
}

pub struct MockBackend {
    base_url: String,
    state: Arc<MockState>,
}

impl MockBackend {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        let app = router(Arc::clone(&state));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
        }
    }

    pub fn session(&self) -> TestSession {
        session_at(&self.base_url)
    }

    /// A session pointed at a port nothing listens on.
    pub fn session_for_unreachable_host(&self) -> TestSession {
        session_at(&unreachable_base_url())
    }

    pub fn client(&self) -> (Arc<SessionState>, AuthenticatedClient) {
        let session = self.session();
        (session.state, session.client)
    }

    pub fn refresher(&self) -> (Arc<SessionState>, TokenRefresher) {
        refresher_at(&self.base_url)
    }

    pub fn refresher_for_unreachable_host(&self) -> (Arc<SessionState>, TokenRefresher) {
        refresher_at(&unreachable_base_url())
    }

    // ========== Behaviour ==========

    pub fn valid_access_token(&self) -> String {
        self.state.valid_access_token()
    }

    /// Invalidate the current access token; refreshes hand out the next one.
    pub fn expire_access_tokens(&self) {
        self.state.token_epoch.fetch_add(1, Ordering::SeqCst);
    }

    pub fn set_refresh_mode(&self, mode: RefreshMode) {
        *self
            .state
            .refresh_mode
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = mode;
    }

    pub fn set_refresh_delay_ms(&self, ms: u64) {
        self.state.refresh_delay_ms.store(ms, Ordering::SeqCst);
    }

    pub fn set_me_delay_ms(&self, ms: u64) {
        self.state.me_delay_ms.store(ms, Ordering::SeqCst);
    }

    pub fn set_me_failing(&self, failing: bool) {
        self.state.me_failing.store(failing, Ordering::SeqCst);
    }

    // ========== Counters ==========

    pub fn refresh_calls(&self) -> usize {
        self.state.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn me_calls(&self) -> usize {
        self.state.me_calls.load(Ordering::SeqCst)
    }

    pub fn echo_calls(&self) -> usize {
        self.state.echo_calls.load(Ordering::SeqCst)
    }

    pub fn logout_calls(&self) -> usize {
        self.state.logout_calls.load(Ordering::SeqCst)
    }

    pub fn last_logout_refresh_token(&self) -> Option<String> {
        self.state
            .last_logout_refresh_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn session_at(base_url: &str) -> TestSession {
    CrmClient::with_http(reqwest::Client::new(), base_url, Arc::new(MemoryStore::new())).into()
}

fn refresher_at(base_url: &str) -> (Arc<SessionState>, TokenRefresher) {
    let session = session_at(base_url);
    let refresher = TokenRefresher::new(session.client.endpoint().clone(), Arc::clone(&session.state));
    (session.state, refresher)
}

fn unreachable_base_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

// ========== Routes ==========

type Shared = State<Arc<MockState>>;

fn router(state: Arc<MockState>) -> Router {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
        .route("/auth/verify-email", get(verify_email))
        .route("/auth/onboarding/status", get(onboarding_status))
        .route("/echo", any(echo))
        .route("/token-message", get(token_message))
        .route("/broken", get(broken))
        .route("/empty", delete(empty))
        .route("/leads", post(echo_body))
        .route("/leads/{user_id}", get(list_leads))
        .route("/leads/files/upload", post(upload_file))
        .route("/leads/files/{user_id}/history", get(echo))
        .route("/calendar/api/events", post(echo_body))
        .route("/calendar/api/users/{user_id}/events/upcoming", get(upcoming_events))
        .route("/calendar/api/users/{user_id}/events/{event_id}", delete(empty))
        .route(
            "/outreach/api/v1/outreach/user/{user_id}/send-message",
            post(echo_body),
        )
        .route(
            "/outreach/api/v1/campaigns/user/{user_id}/campaigns/{campaign_id}",
            get(campaign),
        )
        .with_state(state)
}

#[derive(Deserialize)]
struct Credentials {
    email: String,
    password: String,
}

async fn login(State(state): Shared, Json(credentials): Json<Credentials>) -> Response {
    if credentials.email != MOCK_EMAIL || credentials.password != MOCK_PASSWORD {
        return detail(StatusCode::UNAUTHORIZED, "Invalid email or password");
    }
    Json(json!({
        "access_token": state.valid_access_token(),
        "refresh_token": "refresh-0",
        "token_type": "bearer",
        "expires_in": 1800,
        "user": user_json()
    }))
    .into_response()
}

#[derive(Deserialize)]
struct RefreshBody {
    refresh_token: String,
}

async fn refresh(State(state): Shared, Json(body): Json<RefreshBody>) -> Response {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);
    let delay = state.refresh_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    let mode = *state
        .refresh_mode
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    if body.refresh_token.is_empty() || mode == RefreshMode::Reject {
        return detail(StatusCode::UNAUTHORIZED, "Invalid refresh token");
    }

    let mut response = json!({
        "access_token": state.valid_access_token(),
        "token_type": "bearer"
    });
    if mode == RefreshMode::Rotate {
        let n = state.rotations.fetch_add(1, Ordering::SeqCst) + 1;
        response["refresh_token"] = json!(format!("refresh-{n}"));
    }
    Json(response).into_response()
}

async fn logout(State(state): Shared, Json(body): Json<Value>) -> Response {
    state.logout_calls.fetch_add(1, Ordering::SeqCst);
    *state
        .last_logout_refresh_token
        .lock()
        .unwrap_or_else(PoisonError::into_inner) =
        body["refresh_token"].as_str().map(str::to_string);
    Json(json!({ "message": "Successfully logged out" })).into_response()
}

async fn me(State(state): Shared, headers: HeaderMap) -> Response {
    state.me_calls.fetch_add(1, Ordering::SeqCst);
    let delay = state.me_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    if let Err(rejection) = state.authorize(&headers) {
        return rejection;
    }
    if state.me_failing.load(Ordering::SeqCst) {
        return detail(StatusCode::SERVICE_UNAVAILABLE, "Identity service unavailable");
    }
    Json(user_json()).into_response()
}

#[derive(Deserialize)]
struct VerifyQuery {
    token: String,
}

async fn verify_email(Query(query): Query<VerifyQuery>) -> Response {
    Json(json!({ "message": format!("Email verified for {}", query.token) })).into_response()
}

async fn onboarding_status(State(state): Shared, headers: HeaderMap) -> Response {
    if let Err(rejection) = state.authorize(&headers) {
        return rejection;
    }
    Json(json!({
        "is_complete": false,
        "steps_completed": {
            "email_verified": true,
            "personal_info": false,
            "company_info": false
        },
        "next_step": "personal_info"
    }))
    .into_response()
}

/// Reflects what the client sent.
async fn echo(
    State(state): Shared,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Response {
    state.echo_calls.fetch_add(1, Ordering::SeqCst);
    if let Err(rejection) = state.authorize(&headers) {
        return rejection;
    }
    let header_str = |name: header::HeaderName| headers.get(name).and_then(|v| v.to_str().ok());
    Json(json!({
        "authorization": header_str(header::AUTHORIZATION),
        "content_type": header_str(header::CONTENT_TYPE),
        "query": query,
        "body": serde_json::from_slice::<Value>(&body).unwrap_or(Value::Null)
    }))
    .into_response()
}

async fn echo_body(State(state): Shared, headers: HeaderMap, Json(mut body): Json<Value>) -> Response {
    if let Err(rejection) = state.authorize(&headers) {
        return rejection;
    }
    body["id"] = json!(1);
    Json(body).into_response()
}

async fn token_message(State(state): Shared, headers: HeaderMap) -> Response {
    if state.authorize(&headers).is_err() {
        return detail(StatusCode::FORBIDDEN, "Token has expired");
    }
    Json(json!({ "ok": true })).into_response()
}

async fn broken(State(state): Shared, headers: HeaderMap) -> Response {
    if let Err(rejection) = state.authorize(&headers) {
        return rejection;
    }
    detail(StatusCode::INTERNAL_SERVER_ERROR, "database unavailable")
}

async fn empty(State(state): Shared, headers: HeaderMap) -> Response {
    if let Err(rejection) = state.authorize(&headers) {
        return rejection;
    }
    StatusCode::NO_CONTENT.into_response()
}

#[derive(Deserialize)]
struct PageQuery {
    page: Option<u32>,
}

async fn list_leads(
    State(state): Shared,
    headers: HeaderMap,
    Path(user_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    if let Err(rejection) = state.authorize(&headers) {
        return rejection;
    }
    Json(json!({
        "leads": [{ "id": 1, "first_name": "Ada", "user_id": user_id }],
        "total": 1,
        "page": query.page.unwrap_or(1),
        "per_page": 20,
        "total_pages": 1
    }))
    .into_response()
}

async fn upload_file(State(state): Shared, headers: HeaderMap, body: Bytes) -> Response {
    if let Err(rejection) = state.authorize(&headers) {
        return rejection;
    }
    let body = String::from_utf8_lossy(&body);
    let file_name = body
        .split("filename=\"")
        .nth(1)
        .and_then(|rest| rest.split('"').next())
        .map(str::to_string);
    Json(json!({ "success": true, "file_upload_id": 1, "file_name": file_name })).into_response()
}

#[derive(Deserialize)]
struct LimitQuery {
    limit: Option<String>,
}

async fn upcoming_events(
    State(state): Shared,
    headers: HeaderMap,
    Query(query): Query<LimitQuery>,
) -> Response {
    if let Err(rejection) = state.authorize(&headers) {
        return rejection;
    }
    Json(json!({ "events": [], "limit": query.limit })).into_response()
}

async fn campaign(
    State(state): Shared,
    headers: HeaderMap,
    Path((_user_id, campaign_id)): Path<(String, i64)>,
) -> Response {
    if let Err(rejection) = state.authorize(&headers) {
        return rejection;
    }
    if campaign_id == 404 {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": { "message": "Campaign not found" } })),
        )
            .into_response();
    }
    Json(json!({ "id": campaign_id })).into_response()
}
