use crate::agent::CalendarAgent;
use crate::error::AgentError;
use crate::history::validate_conversation_id;
use crate::models::chat::{ ChatRequest, ChatResponse };
use axum::{
    Json,
    Router,
    extract::{ rejection::JsonRejection, Path, Query, Request, State },
    http::{ header, HeaderMap, HeaderValue, StatusCode },
    middleware::{ self, Next },
    response::{ IntoResponse, Response },
    routing::{ get, post },
};
use governor::{ RateLimiter, Quota, state::{ InMemoryState, NotKeyed }, clock::DefaultClock };
use log::{ debug, error, info, warn };
use serde::Deserialize;
use serde_json::{ json, Value };
use std::num::NonZeroU32;
use std::sync::Arc;
use tower_http::cors::{ Any, CorsLayer };
use uuid::Uuid;

pub const CONVERSATION_HEADER: &str = "x-conversation-id";
const API_KEY_HEADER: &str = "x-api-key";
const VERIFIED_EMAIL_COOKIE: &str = "verified_email";
const VERIFIED_EMAIL_MAX_AGE: u32 = 3600;

const BAD_REQUEST_MESSAGE: &str = "Your request was not understood. Please check your input and try again.";
const INTERNAL_ERROR_MESSAGE: &str =
    "Sorry, something went wrong while processing your message. Please try again later.";

const ENDPOINTS: [&str; 8] = [
    "POST /api/chat",
    "GET /api/health",
    "GET /api/endpoints",
    "GET /api/history/{conversation_id}",
    "GET /api/history/search?q=",
    "POST /api/cal/request-verification-code",
    "POST /api/cal/verify-email-code",
    "GET /api/cal/scheduled-events",
];

type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

#[derive(Clone)]
pub struct AppState {
    agent: Arc<CalendarAgent>,
    api_key: Option<String>,
    limiter: Arc<Limiter>,
}

impl AppState {
    pub fn new(agent: CalendarAgent, api_key: Option<String>, requests_per_second: u32) -> Self {
        let per_second = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        Self {
            agent: Arc::new(agent),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            limiter: Arc::new(RateLimiter::direct(Quota::per_second(per_second))),
        }
    }
}

#[derive(Deserialize)]
struct SearchParams {
    q: Option<String>,
}

#[derive(Deserialize)]
struct EmailRequest {
    #[serde(default)]
    email: String,
}

#[derive(Deserialize)]
struct VerifyRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    code: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    let protected = Router::new()
        .route("/api/chat", post(chat_handler))
        .route("/api/endpoints", get(endpoints_handler))
        .route("/api/history/search", get(search_history_handler))
        .route("/api/history/{conversation_id}", get(load_history_handler))
        .route("/api/cal/request-verification-code", post(request_code_handler))
        .route("/api/cal/verify-email-code", post(verify_code_handler))
        .route("/api/cal/scheduled-events", get(scheduled_events_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        .route("/api/health", get(health_handler))
        .merge(protected)
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit))
        .layer(cors)
        .with_state(state)
}

async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if state.limiter.check().is_err() {
        warn!("Rate limit exceeded for {}", request.uri().path());
        return error_response(StatusCode::TOO_MANY_REQUESTS, "Too many requests. Please slow down.");
    }
    next.run(request).await
}

async fn require_api_key(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let expected = match &state.api_key {
        Some(key) => key,
        None => {
            return next.run(request).await;
        }
    };

    let from_header = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());
    let from_query = request
        .uri()
        .query()
        .and_then(|q| q.split('&').find_map(|pair| pair.strip_prefix("api_key=")));

    if from_header.or(from_query) == Some(expected.as_str()) {
        next.run(request).await
    } else {
        warn!("Rejected request to {} with missing or invalid API key", request.uri().path());
        error_response(StatusCode::UNAUTHORIZED, "Invalid or missing API key.")
    }
}

async fn health_handler() -> impl IntoResponse {
    debug!("Health check requested");
    Json(json!({ "status": "healthy" }))
}

async fn endpoints_handler() -> impl IntoResponse {
    info!("Endpoints listed");
    Json(json!({ "endpoints": ENDPOINTS }))
}

async fn chat_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<ChatRequest>, JsonRejection>
) -> Response {
    let conversation_id = match
        headers
            .get(CONVERSATION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
    {
        Some(id) => id.to_string(),
        None => Uuid::new_v4().to_string(),
    };
    if let Err(e) = validate_conversation_id(&conversation_id) {
        warn!("{}", e);
        return error_response(StatusCode::BAD_REQUEST, BAD_REQUEST_MESSAGE);
    }

    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            error!("[{}] JSON binding error: {}", conversation_id, rejection.body_text());
            return error_response(StatusCode::BAD_REQUEST, BAD_REQUEST_MESSAGE);
        }
    };
    if let Some(user_id) = &request.user_id {
        debug!("[{}] Chat request from user {}", conversation_id, user_id);
    }

    match state.agent.process_messages(&conversation_id, &request.messages).await {
        Ok(message) => {
            let mut response = Json(ChatResponse {
                message,
                conversation_id: conversation_id.clone(),
            }).into_response();
            if let Ok(value) = HeaderValue::from_str(&conversation_id) {
                response.headers_mut().insert(CONVERSATION_HEADER, value);
            }
            response
        }
        Err(e) if e.is_client_error() => {
            warn!("[{}] Rejected chat request: {}", conversation_id, e);
            let message = match e.root() {
                AgentError::InvalidRequest(msg) => msg.clone(),
                _ => BAD_REQUEST_MESSAGE.to_string(),
            };
            error_response(StatusCode::BAD_REQUEST, message)
        }
        Err(e) => {
            error!("[{}] Failed to process message: {}", conversation_id, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE)
        }
    }
}

async fn load_history_handler(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>
) -> Response {
    match state.agent.history().read_all(&conversation_id).await {
        Ok(history) => Json(json!({ "history": history })).into_response(),
        Err(AgentError::NotFound(_)) => error_response(StatusCode::NOT_FOUND, "Conversation not found."),
        Err(e @ AgentError::InvalidRequest(_)) => error_response(StatusCode::BAD_REQUEST, e.to_string()),
        Err(e) => {
            error!("Failed to load history for {}: {}", conversation_id, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to load history.")
        }
    }
}

async fn search_history_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>
) -> Response {
    let term = match params.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        Some(term) => term.to_string(),
        None => {
            return error_response(StatusCode::BAD_REQUEST, "Missing search term.");
        }
    };
    match state.agent.history().search(&term).await {
        Ok(matches) => Json(json!({ "matches": matches })).into_response(),
        Err(e) => {
            error!("History search for '{}' failed: {}", term, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Search failed.")
        }
    }
}

/// Emails end up in a cookie, so only header-safe addresses are accepted.
fn is_plausible_email(email: &str) -> bool {
    let email = email.trim();
    email.contains('@') &&
        email.len() <= 254 &&
        email.chars().all(|c| c.is_ascii_graphic() && !matches!(c, ';' | ',' | '"' | '\\'))
}

async fn request_code_handler(
    State(state): State<AppState>,
    payload: Result<Json<EmailRequest>, JsonRejection>
) -> Response {
    let email = match payload {
        Ok(Json(req)) if is_plausible_email(&req.email) => req.email.trim().to_string(),
        _ => {
            return error_response(StatusCode::BAD_REQUEST, "Missing or invalid email");
        }
    };
    match state.agent.calendar().request_verification_code(&email).await {
        Ok(body) => Json(body).into_response(),
        Err(e) => {
            error!("Verification code request failed: {}", e);
            error_response(StatusCode::BAD_GATEWAY, e.to_string())
        }
    }
}

async fn verify_code_handler(
    State(state): State<AppState>,
    payload: Result<Json<VerifyRequest>, JsonRejection>
) -> Response {
    let (email, code) = match payload {
        Ok(Json(req)) if is_plausible_email(&req.email) && !req.code.trim().is_empty() =>
            (req.email.trim().to_string(), req.code.trim().to_string()),
        _ => {
            return error_response(StatusCode::BAD_REQUEST, "Missing or invalid email/code");
        }
    };

    let body: Value = match state.agent.calendar().verify_email_code(&email, &code).await {
        Ok(body) => body,
        Err(e) => {
            error!("Email verification failed: {}", e);
            return error_response(StatusCode::BAD_GATEWAY, e.to_string());
        }
    };

    let mut response = Json(&body).into_response();
    if body.get("status").and_then(Value::as_str) == Some("success") {
        let cookie = format!(
            "{}={}; Max-Age={}; Path=/; Secure; HttpOnly",
            VERIFIED_EMAIL_COOKIE,
            email,
            VERIFIED_EMAIL_MAX_AGE
        );
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().insert(header::SET_COOKIE, value);
            info!("Email verified, session cookie issued");
        }
    }
    response
}

fn verified_email(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == VERIFIED_EMAIL_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

async fn scheduled_events_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let email = match verified_email(&headers) {
        Some(email) => email,
        None => {
            return error_response(StatusCode::UNAUTHORIZED, "Not verified or missing email in session");
        }
    };
    match state.agent.calendar().get_events(Some(&email)).await {
        Ok(events) => Json(json!({ "bookings": events })).into_response(),
        Err(e) => {
            error!("Fetching scheduled events failed: {}", e);
            error_response(StatusCode::BAD_GATEWAY, e.to_string())
        }
    }
}
