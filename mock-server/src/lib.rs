//! In-memory trust management service.
//!
//! # Design
//! Serves the admin API under `/api/v1` with the same session rules as the
//! real service: cookie sessions, a `csrftoken` cookie that must be echoed
//! in `X-CSRFToken` on every state-changing request, and `{message}` error
//! bodies. Nothing is persisted and nothing is really signed; marks and
//! statements are opaque placeholder tokens.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use axum::{
    extract::{Path, Query, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{AppendHeaders, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{info, warn};
use uuid::Uuid;

pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "trustanchor";

pub const CSRF_COOKIE: &str = "csrftoken";
pub const CSRF_HEADER: &str = "x-csrftoken";
pub const SESSION_COOKIE: &str = "sessionid";

/// Hours a trust mark type (and anything issued under it) stays valid unless
/// told otherwise.
pub const DEFAULT_VALID_FOR: u32 = 8760;
pub const DEFAULT_RENEWAL_TIME: u32 = 48;
const DEFAULT_PAGE_SIZE: usize = 100;

pub type JsonObject = serde_json::Map<String, Value>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub email: String,
    pub is_staff: bool,
    pub is_superuser: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrustMarkType {
    pub id: u64,
    pub tmtype: String,
    pub autorenew: bool,
    pub valid_for: u32,
    pub renewal_time: u32,
    pub active: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrustMark {
    pub id: u64,
    pub tmt: u64,
    pub domain: String,
    pub expire_at: DateTime<Utc>,
    pub autorenew: bool,
    pub active: bool,
    pub valid_for: u32,
    pub renewal_time: u32,
    pub mark: Option<String>,
    pub additional_claims: Option<JsonObject>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Subordinate {
    pub id: u64,
    pub entityid: String,
    pub metadata: JsonObject,
    pub forced_metadata: JsonObject,
    pub jwks: JsonObject,
    pub required_trustmarks: Option<String>,
    pub valid_for: u32,
    pub autorenew: bool,
    pub active: bool,
    pub additional_claims: Option<JsonObject>,
}

/// A page of results plus the total number of matches.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub count: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub message: String,
}

impl Message {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Deserialize)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct NewTrustMarkType {
    pub tmtype: String,
    pub autorenew: Option<bool>,
    pub valid_for: Option<u32>,
    pub renewal_time: Option<u32>,
    pub active: Option<bool>,
}

#[derive(Deserialize)]
pub struct TrustMarkTypeChanges {
    pub autorenew: Option<bool>,
    pub valid_for: Option<u32>,
    pub renewal_time: Option<u32>,
    pub active: Option<bool>,
}

#[derive(Deserialize)]
pub struct NewTrustMark {
    pub tmt: u64,
    pub domain: String,
    pub autorenew: Option<bool>,
    pub valid_for: Option<u32>,
    pub renewal_time: Option<u32>,
    pub active: Option<bool>,
    pub additional_claims: Option<JsonObject>,
}

#[derive(Deserialize)]
pub struct TrustMarkChanges {
    pub autorenew: Option<bool>,
    pub active: Option<bool>,
    pub additional_claims: Option<JsonObject>,
}

#[derive(Deserialize)]
pub struct DomainQuery {
    pub domain: String,
}

#[derive(Deserialize)]
pub struct NewSubordinate {
    pub entityid: String,
    pub metadata: JsonObject,
    pub forced_metadata: Option<JsonObject>,
    pub jwks: JsonObject,
    pub required_trustmarks: Option<String>,
    pub valid_for: Option<u32>,
    pub autorenew: Option<bool>,
    pub active: Option<bool>,
    pub additional_claims: Option<JsonObject>,
}

#[derive(Deserialize)]
pub struct SubordinateChanges {
    pub metadata: Option<JsonObject>,
    pub forced_metadata: Option<JsonObject>,
    pub jwks: Option<JsonObject>,
    pub required_trustmarks: Option<String>,
    pub valid_for: Option<u32>,
    pub autorenew: Option<bool>,
    pub active: Option<bool>,
    pub additional_claims: Option<JsonObject>,
}

#[derive(Deserialize)]
pub struct FetchConfig {
    pub url: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Everything the service knows. One instance per router.
#[derive(Debug, Default)]
pub struct Store {
    sessions: HashMap<String, User>,
    trust_mark_types: BTreeMap<u64, TrustMarkType>,
    trust_marks: BTreeMap<u64, TrustMark>,
    subordinates: BTreeMap<u64, Subordinate>,
    statements: HashMap<u64, String>,
    entity_configs: HashMap<String, Value>,
    entity_statement: Option<String>,
    historical_key_syncs: u32,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `config` the entity configuration published at `url`, for
    /// `/subordinates/fetch-config`.
    pub fn with_entity_config(mut self, url: &str, config: Value) -> Self {
        self.entity_configs.insert(url.trim_end_matches('/').to_string(), config);
        self
    }

    pub fn historical_key_syncs(&self) -> u32 {
        self.historical_key_syncs
    }

    /// The signed statement currently held for subordinate `id`.
    pub fn statement(&self, id: u64) -> Option<&str> {
        self.statements.get(&id).map(String::as_str)
    }

    /// The last entity statement produced by `/server/entity`.
    pub fn entity_statement(&self) -> Option<&str> {
        self.entity_statement.as_deref()
    }

    fn session_user(&self, headers: &HeaderMap) -> Option<&User> {
        cookie(headers, SESSION_COOKIE).and_then(|id| self.sessions.get(&id))
    }
}

pub type Db = Arc<RwLock<Store>>;

/// Failure answered as `{status, {"message": ...}}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn not_found(what: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, format!("{what} could not be found."))
    }

    fn conflict(what: &str) -> Self {
        Self::new(StatusCode::CONFLICT, format!("{what} already exists."))
    }

    fn unauthenticated() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Not authenticated")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(Message::new(self.message))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

pub fn app() -> Router {
    app_with_store(Store::new())
}

pub fn app_with_store(store: Store) -> Router {
    router(Arc::new(RwLock::new(store)))
}

/// Builds the router around shared state, so tests can inspect the store.
pub fn router(db: Db) -> Router {
    let resources = Router::new()
        .route("/trustmarktypes", get(list_trust_mark_types).post(create_trust_mark_type))
        .route("/trustmarktypes/{id}", get(get_trust_mark_type).put(update_trust_mark_type))
        .route("/trustmarks", get(list_trust_marks).post(create_trust_mark))
        .route("/trustmarks/list", post(list_trust_marks_by_domain))
        .route("/trustmarks/{id}", get(get_trust_mark).put(update_trust_mark))
        .route("/trustmarks/{id}/renew", post(renew_trust_mark))
        .route("/subordinates", get(list_subordinates).post(create_subordinate))
        .route("/subordinates/fetch-config", post(fetch_entity_config))
        .route("/subordinates/{id}", get(get_subordinate).put(update_subordinate))
        .route("/subordinates/{id}/renew", post(renew_subordinate))
        .route("/server/entity", post(regenerate_entity))
        .route("/server/historical_keys", post(sync_historical_keys))
        .route_layer(middleware::from_fn_with_state(db.clone(), require_login));

    let api = Router::new()
        .route("/auth/csrf", get(csrf))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
        .merge(resources)
        .layer(middleware::from_fn(csrf_protect));

    Router::new().nest("/api/v1", api).with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    serve(listener, Store::new()).await
}

pub async fn serve(listener: TcpListener, store: Store) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_store(store)).await
}

// ---------------------------------------------------------------------------
// Middleware
// ---------------------------------------------------------------------------

/// Double-submit check: the `csrftoken` cookie must be echoed verbatim in
/// `X-CSRFToken`. No token state is kept server-side.
async fn csrf_protect(request: Request, next: Next) -> Response {
    if request.method().is_safe() {
        return next.run(request).await;
    }
    let token = cookie(request.headers(), CSRF_COOKIE);
    let echoed = request.headers().get(CSRF_HEADER).and_then(|v| v.to_str().ok());
    let reason = match (token.as_deref(), echoed) {
        (None, _) => Some("CSRF cookie not set."),
        (Some(_), None) => Some("CSRF token missing."),
        (Some(token), Some(echoed)) if token != echoed => Some("CSRF token incorrect."),
        _ => None,
    };
    match reason {
        Some(reason) => {
            warn!(method = %request.method(), uri = %request.uri(), reason, "CSRF check failed");
            ApiError::new(StatusCode::FORBIDDEN, format!("CSRF check Failed: {reason}")).into_response()
        }
        None => next.run(request).await,
    }
}

async fn require_login(State(db): State<Db>, request: Request, next: Next) -> Response {
    let known = db.read().await.session_user(request.headers()).is_some();
    if !known {
        return ApiError::unauthenticated().into_response();
    }
    next.run(request).await
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

async fn csrf() -> impl IntoResponse {
    let token = new_token();
    (
        [(header::SET_COOKIE, format!("{CSRF_COOKIE}={token}; Path=/; SameSite=Lax"))],
        Json(Message::new("CSRF cookie set")),
    )
}

async fn login(State(db): State<Db>, Json(input): Json<LoginInput>) -> ApiResult<impl IntoResponse> {
    if input.username != ADMIN_USERNAME || input.password != ADMIN_PASSWORD {
        warn!(username = %input.username, "rejected login");
        return Err(ApiError::new(StatusCode::UNAUTHORIZED, "Invalid credentials"));
    }

    let user = admin();
    let session = new_token();
    let rotated = new_token();
    db.write().await.sessions.insert(session.clone(), user.clone());
    info!(username = %user.username, "logged in");

    Ok((
        AppendHeaders([
            (header::SET_COOKIE, format!("{SESSION_COOKIE}={session}; Path=/; HttpOnly")),
            (header::SET_COOKIE, format!("{CSRF_COOKIE}={rotated}; Path=/; SameSite=Lax")),
        ]),
        Json(user),
    ))
}

async fn logout(State(db): State<Db>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(session) = cookie(&headers, SESSION_COOKIE) {
        db.write().await.sessions.remove(&session);
    }
    (
        [(header::SET_COOKIE, format!("{SESSION_COOKIE}=; Max-Age=0; Path=/"))],
        Json(Message::new("Logged out successfully")),
    )
}

async fn me(State(db): State<Db>, headers: HeaderMap) -> ApiResult<Json<User>> {
    let store = db.read().await;
    store.session_user(&headers).cloned().map(Json).ok_or_else(ApiError::unauthenticated)
}

// ---------------------------------------------------------------------------
// Trust mark types
// ---------------------------------------------------------------------------

async fn create_trust_mark_type(
    State(db): State<Db>,
    Json(input): Json<NewTrustMarkType>,
) -> ApiResult<(StatusCode, Json<TrustMarkType>)> {
    if input.tmtype.trim().is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "tmtype must not be empty."));
    }
    let mut store = db.write().await;
    if store.trust_mark_types.values().any(|t| t.tmtype == input.tmtype) {
        return Err(ApiError::conflict("TrustMarkType"));
    }
    let tmt = TrustMarkType {
        id: next_id(&store.trust_mark_types),
        tmtype: input.tmtype,
        autorenew: input.autorenew.unwrap_or(true),
        valid_for: input.valid_for.unwrap_or(DEFAULT_VALID_FOR),
        renewal_time: input.renewal_time.unwrap_or(DEFAULT_RENEWAL_TIME),
        active: input.active.unwrap_or(true),
    };
    store.trust_mark_types.insert(tmt.id, tmt.clone());
    info!(id = tmt.id, tmtype = %tmt.tmtype, "created trust mark type");
    Ok((StatusCode::CREATED, Json(tmt)))
}

async fn list_trust_mark_types(State(db): State<Db>, Query(page): Query<PageParams>) -> Json<Page<TrustMarkType>> {
    let store = db.read().await;
    Json(paginate(store.trust_mark_types.values(), &page))
}

async fn get_trust_mark_type(State(db): State<Db>, Path(id): Path<u64>) -> ApiResult<Json<TrustMarkType>> {
    let store = db.read().await;
    store
        .trust_mark_types
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::not_found("TrustMarkType"))
}

async fn update_trust_mark_type(
    State(db): State<Db>,
    Path(id): Path<u64>,
    Json(changes): Json<TrustMarkTypeChanges>,
) -> ApiResult<Json<TrustMarkType>> {
    let mut store = db.write().await;
    let tmt = store
        .trust_mark_types
        .get_mut(&id)
        .ok_or_else(|| ApiError::not_found("TrustMarkType"))?;
    if let Some(autorenew) = changes.autorenew {
        tmt.autorenew = autorenew;
    }
    if let Some(valid_for) = changes.valid_for {
        tmt.valid_for = valid_for;
    }
    if let Some(renewal_time) = changes.renewal_time {
        tmt.renewal_time = renewal_time;
    }
    if let Some(active) = changes.active {
        tmt.active = active;
    }
    Ok(Json(tmt.clone()))
}

// ---------------------------------------------------------------------------
// Trust marks
// ---------------------------------------------------------------------------

async fn create_trust_mark(
    State(db): State<Db>,
    Json(input): Json<NewTrustMark>,
) -> ApiResult<(StatusCode, Json<TrustMark>)> {
    let mut store = db.write().await;
    let tmt = store
        .trust_mark_types
        .get(&input.tmt)
        .cloned()
        .ok_or_else(|| ApiError::not_found("TrustMarkType"))?;

    let valid_for = input.valid_for.unwrap_or(tmt.valid_for);
    if valid_for > tmt.valid_for {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "valid_for is greater than allowed for the given TrustMarkType.",
        ));
    }
    let renewal_time = input.renewal_time.unwrap_or(tmt.renewal_time);
    if renewal_time > tmt.renewal_time {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "renewal_time is greater than allowed for the given TrustMarkType.",
        ));
    }
    if store
        .trust_marks
        .values()
        .any(|m| m.tmt == tmt.id && m.domain == input.domain)
    {
        return Err(ApiError::conflict("TrustMark"));
    }

    let mut mark = TrustMark {
        id: next_id(&store.trust_marks),
        tmt: tmt.id,
        domain: input.domain,
        expire_at: Utc::now(),
        autorenew: input.autorenew.unwrap_or(tmt.autorenew),
        active: input.active.unwrap_or(tmt.active),
        valid_for,
        renewal_time,
        mark: None,
        additional_claims: input.additional_claims,
    };
    sign_mark(&mut mark);
    store.trust_marks.insert(mark.id, mark.clone());
    info!(id = mark.id, domain = %mark.domain, tmt = mark.tmt, "issued trust mark");
    Ok((StatusCode::CREATED, Json(mark)))
}

async fn list_trust_marks(State(db): State<Db>, Query(page): Query<PageParams>) -> Json<Page<TrustMark>> {
    let store = db.read().await;
    Json(paginate(store.trust_marks.values(), &page))
}

async fn list_trust_marks_by_domain(
    State(db): State<Db>,
    Query(page): Query<PageParams>,
    Json(query): Json<DomainQuery>,
) -> Json<Page<TrustMark>> {
    let store = db.read().await;
    let matching = store.trust_marks.values().filter(|m| m.domain == query.domain);
    Json(paginate(matching, &page))
}

async fn get_trust_mark(State(db): State<Db>, Path(id): Path<u64>) -> ApiResult<Json<TrustMark>> {
    let store = db.read().await;
    store
        .trust_marks
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::not_found("TrustMark"))
}

async fn update_trust_mark(
    State(db): State<Db>,
    Path(id): Path<u64>,
    Json(changes): Json<TrustMarkChanges>,
) -> ApiResult<Json<TrustMark>> {
    let mut store = db.write().await;
    let mark = store
        .trust_marks
        .get_mut(&id)
        .ok_or_else(|| ApiError::not_found("TrustMark"))?;
    if let Some(autorenew) = changes.autorenew {
        mark.autorenew = autorenew;
    }
    if let Some(active) = changes.active {
        mark.active = active;
    }
    if changes.additional_claims.is_some() {
        mark.additional_claims = changes.additional_claims;
    }
    Ok(Json(mark.clone()))
}

async fn renew_trust_mark(State(db): State<Db>, Path(id): Path<u64>) -> ApiResult<Json<TrustMark>> {
    let mut store = db.write().await;
    let mark = store
        .trust_marks
        .get_mut(&id)
        .ok_or_else(|| ApiError::not_found("TrustMark"))?;
    sign_mark(mark);
    info!(id, expire_at = %mark.expire_at, "renewed trust mark");
    Ok(Json(mark.clone()))
}

// ---------------------------------------------------------------------------
// Subordinates
// ---------------------------------------------------------------------------

async fn create_subordinate(
    State(db): State<Db>,
    Json(input): Json<NewSubordinate>,
) -> ApiResult<(StatusCode, Json<Subordinate>)> {
    if !is_http_url(&input.entityid) {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "entityid must be an http(s) URL."));
    }
    let mut store = db.write().await;
    if store.subordinates.values().any(|s| s.entityid == input.entityid) {
        return Err(ApiError::conflict("Subordinate"));
    }
    let sub = Subordinate {
        id: next_id(&store.subordinates),
        entityid: input.entityid,
        metadata: input.metadata,
        forced_metadata: input.forced_metadata.unwrap_or_default(),
        jwks: input.jwks,
        required_trustmarks: input.required_trustmarks,
        valid_for: input.valid_for.unwrap_or(DEFAULT_VALID_FOR),
        autorenew: input.autorenew.unwrap_or(true),
        active: input.active.unwrap_or(true),
        additional_claims: input.additional_claims,
    };
    store.statements.insert(sub.id, placeholder_jws());
    store.subordinates.insert(sub.id, sub.clone());
    info!(id = sub.id, entityid = %sub.entityid, "added subordinate");
    Ok((StatusCode::CREATED, Json(sub)))
}

async fn list_subordinates(State(db): State<Db>, Query(page): Query<PageParams>) -> Json<Page<Subordinate>> {
    let store = db.read().await;
    Json(paginate(store.subordinates.values(), &page))
}

async fn get_subordinate(State(db): State<Db>, Path(id): Path<u64>) -> ApiResult<Json<Subordinate>> {
    let store = db.read().await;
    store
        .subordinates
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Subordinate"))
}

async fn update_subordinate(
    State(db): State<Db>,
    Path(id): Path<u64>,
    Json(changes): Json<SubordinateChanges>,
) -> ApiResult<Json<Subordinate>> {
    let mut store = db.write().await;
    let sub = store
        .subordinates
        .get_mut(&id)
        .ok_or_else(|| ApiError::not_found("Subordinate"))?;
    if let Some(metadata) = changes.metadata {
        sub.metadata = metadata;
    }
    if let Some(forced_metadata) = changes.forced_metadata {
        sub.forced_metadata = forced_metadata;
    }
    if let Some(jwks) = changes.jwks {
        sub.jwks = jwks;
    }
    if changes.required_trustmarks.is_some() {
        sub.required_trustmarks = changes.required_trustmarks;
    }
    if let Some(valid_for) = changes.valid_for {
        sub.valid_for = valid_for;
    }
    if let Some(autorenew) = changes.autorenew {
        sub.autorenew = autorenew;
    }
    if let Some(active) = changes.active {
        sub.active = active;
    }
    if changes.additional_claims.is_some() {
        sub.additional_claims = changes.additional_claims;
    }
    Ok(Json(sub.clone()))
}

async fn renew_subordinate(State(db): State<Db>, Path(id): Path<u64>) -> ApiResult<Json<Subordinate>> {
    let mut store = db.write().await;
    let sub = store
        .subordinates
        .get(&id)
        .cloned()
        .ok_or_else(|| ApiError::not_found("Subordinate"))?;
    store.statements.insert(id, placeholder_jws());
    info!(id, entityid = %sub.entityid, "re-signed subordinate statement");
    Ok(Json(sub))
}

async fn fetch_entity_config(State(db): State<Db>, Json(input): Json<FetchConfig>) -> ApiResult<Json<Value>> {
    if !is_http_url(&input.url) {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "url must be an http(s) URL."));
    }
    let store = db.read().await;
    store
        .entity_configs
        .get(input.url.trim_end_matches('/'))
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Entity configuration"))
}

// ---------------------------------------------------------------------------
// Server maintenance
// ---------------------------------------------------------------------------

async fn regenerate_entity(State(db): State<Db>) -> (StatusCode, Json<Value>) {
    let statement = placeholder_jws();
    db.write().await.entity_statement = Some(statement.clone());
    info!("regenerated entity statement");
    (StatusCode::CREATED, Json(serde_json::json!({ "entity_statement": statement })))
}

async fn sync_historical_keys(State(db): State<Db>) -> Json<Message> {
    db.write().await.historical_key_syncs += 1;
    Json(Message::new("Historical keys synced."))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn admin() -> User {
    User {
        id: 1,
        username: ADMIN_USERNAME.to_string(),
        email: "admin@example.org".to_string(),
        is_staff: true,
        is_superuser: true,
    }
}

/// Value of cookie `name` from the request's `Cookie` headers.
pub fn cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

fn new_token() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Three dot-separated segments, shaped like a compact JWS.
fn placeholder_jws() -> String {
    format!("mock.{}.{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

fn sign_mark(mark: &mut TrustMark) {
    mark.mark = Some(placeholder_jws());
    mark.expire_at = Utc::now() + Duration::hours(i64::from(mark.valid_for));
}

fn next_id<T>(table: &BTreeMap<u64, T>) -> u64 {
    table.keys().next_back().map_or(1, |last| last + 1)
}

fn is_http_url(value: &str) -> bool {
    ["http://", "https://"]
        .iter()
        .any(|scheme| value.strip_prefix(scheme).is_some_and(|rest| !rest.is_empty()))
}

fn paginate<'a, T: Clone + 'a>(items: impl IntoIterator<Item = &'a T>, page: &PageParams) -> Page<T> {
    let all: Vec<&T> = items.into_iter().collect();
    let count = all.len();
    let items = all
        .into_iter()
        .skip(page.offset.unwrap_or(0))
        .take(page.limit.unwrap_or(DEFAULT_PAGE_SIZE))
        .cloned()
        .collect();
    Page { items, count }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn cookie_lookup_splits_pairs() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("csrftoken=abc; sessionid=xyz"));
        assert_eq!(cookie(&headers, "sessionid").as_deref(), Some("xyz"));
        assert_eq!(cookie(&headers, "csrftoken").as_deref(), Some("abc"));
        assert!(cookie(&headers, "other").is_none());
    }

    #[test]
    fn paginate_reports_total_count() {
        let values = [1, 2, 3, 4, 5];
        let page = paginate(
            values.iter(),
            &PageParams {
                limit: Some(2),
                offset: Some(1),
            },
        );
        assert_eq!(page.items, vec![2, 3]);
        assert_eq!(page.count, 5);

        let past_end = paginate(
            values.iter(),
            &PageParams {
                limit: None,
                offset: Some(10),
            },
        );
        assert!(past_end.items.is_empty());
        assert_eq!(past_end.count, 5);
    }

    #[test]
    fn ids_continue_after_highest() {
        let mut table = BTreeMap::new();
        assert_eq!(next_id(&table), 1);
        table.insert(4, ());
        assert_eq!(next_id(&table), 5);
    }

    #[test]
    fn renewal_moves_expiry_forward() {
        let mut mark = TrustMark {
            id: 1,
            tmt: 1,
            domain: "https://rp.example.org".to_string(),
            expire_at: Utc::now() - Duration::hours(1),
            autorenew: true,
            active: true,
            valid_for: 24,
            renewal_time: 2,
            mark: None,
            additional_claims: None,
        };
        sign_mark(&mut mark);
        assert!(mark.expire_at > Utc::now() + Duration::hours(23));
        assert_eq!(mark.mark.as_deref().map(|m| m.split('.').count()), Some(3));
    }

    #[test]
    fn entity_config_lookup_ignores_trailing_slash() {
        let store = Store::new().with_entity_config("https://op.example.org/", serde_json::json!({"metadata": {}}));
        assert!(store.entity_configs.contains_key("https://op.example.org"));
    }

    #[test]
    fn http_url_check() {
        assert!(is_http_url("https://rp.example.org"));
        assert!(is_http_url("http://localhost:8080"));
        assert!(!is_http_url("ftp://rp.example.org"));
        assert!(!is_http_url("https://"));
    }
}
