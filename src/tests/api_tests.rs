use crate::agent::CalendarAgent;
use crate::functions::Dispatcher;
use crate::history::MemoryHistoryStore;
use crate::mocks::mock_calendar::{ event, MockCalendar };
use crate::mocks::mock_chat_client::MockChatClient;
use crate::server::api::{ router, AppState, CONVERSATION_HEADER };
use axum::Router;
use axum::body::{ self, Body };
use axum::http::{ header, Request, StatusCode };
use axum::response::Response;
use serde_json::{ json, Value };
use std::sync::Arc;
use tower::ServiceExt;

#[cfg(test)]
mod tests {
    use super::*;

    fn app_with(chat: &MockChatClient, calendar: &MockCalendar, api_key: Option<&str>, rps: u32) -> Router {
        let agent = CalendarAgent::from_parts(
            Arc::new(chat.clone()),
            Dispatcher::new(Arc::new(calendar.clone())),
            Arc::new(MemoryHistoryStore::new()),
            1
        );
        router(AppState::new(agent, api_key.map(str::to_string), rps))
    }

    fn app(chat: &MockChatClient) -> Router {
        app_with(chat, &MockCalendar::new(), None, 1000)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app(&MockChatClient::new()).oneshot(get("/api/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({ "status": "healthy" }));
    }

    #[tokio::test]
    async fn test_endpoints_are_listed() {
        let response = app(&MockChatClient::new()).oneshot(get("/api/endpoints")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        let endpoints = body["endpoints"].as_array().unwrap();
        assert_eq!(endpoints.len(), 8);
        assert!(endpoints.contains(&json!("POST /api/chat")));
    }

    #[tokio::test]
    async fn test_chat_returns_reply_and_generated_conversation_id() {
        let chat = MockChatClient::new();
        chat.add_text_response("Hello there");

        let response = app(&chat)
            .oneshot(post_json("/api/chat", json!({ "messages": [{ "role": "user", "content": "hi" }] })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let header_id = response.headers().get(CONVERSATION_HEADER).unwrap().to_str().unwrap().to_string();
        let body = json_body(response).await;
        assert_eq!(body["message"], "Hello there");
        assert_eq!(body["conversationId"], header_id);
        assert_eq!(header_id.len(), 36);
    }

    #[tokio::test]
    async fn test_chat_echoes_supplied_conversation_id() {
        let chat = MockChatClient::new();
        chat.add_text_response("ok");
        let mut request = post_json("/api/chat", json!({ "messages": [{ "role": "user", "content": "hi" }] }));
        request.headers_mut().insert(CONVERSATION_HEADER, "session-42".parse().unwrap());

        let response = app(&chat).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get(CONVERSATION_HEADER).unwrap(), "session-42");
        assert_eq!(json_body(response).await["conversationId"], "session-42");
    }

    #[tokio::test]
    async fn test_chat_rejects_invalid_conversation_id() {
        let chat = MockChatClient::new();
        let mut request = post_json("/api/chat", json!({ "messages": [{ "role": "user", "content": "hi" }] }));
        request.headers_mut().insert(CONVERSATION_HEADER, "../escape".parse().unwrap());

        let response = app(&chat).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(chat.call_count(), 0);
    }

    #[tokio::test]
    async fn test_chat_with_no_messages_is_bad_request() {
        let chat = MockChatClient::new();
        let response = app(&chat).oneshot(post_json("/api/chat", json!({ "messages": [] }))).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await["error"],
            "Please provide at least one message in your request."
        );
        assert_eq!(chat.call_count(), 0);
    }

    #[tokio::test]
    async fn test_malformed_chat_body_is_bad_request() {
        let chat = MockChatClient::new();
        let request = Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"messages\": \"nope\""))
            .unwrap();

        let response = app(&chat).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await["error"],
            "Your request was not understood. Please check your input and try again."
        );
    }

    #[tokio::test]
    async fn test_model_failure_is_internal_error() {
        let chat = MockChatClient::new();
        chat.add_error_response("provider exploded");

        let response = app(&chat)
            .oneshot(post_json("/api/chat", json!({ "messages": [{ "role": "user", "content": "hi" }] })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert_eq!(
            body["error"],
            "Sorry, something went wrong while processing your message. Please try again later."
        );
    }

    #[tokio::test]
    async fn test_history_roundtrip_through_chat() {
        let chat = MockChatClient::new();
        chat.add_text_response("Booked for Tuesday");
        let app = app(&chat);

        let missing = app.clone().oneshot(get("/api/history/conv-a")).await.unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(missing).await["error"], "Conversation not found.");

        let mut request = post_json(
            "/api/chat",
            json!({ "messages": [{ "role": "user", "content": "Book Tuesday" }] })
        );
        request.headers_mut().insert(CONVERSATION_HEADER, "conv-a".parse().unwrap());
        assert_eq!(app.clone().oneshot(request).await.unwrap().status(), StatusCode::OK);

        let response = app.clone().oneshot(get("/api/history/conv-a")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let history = json_body(response).await["history"].as_array().unwrap().clone();
        assert_eq!(history.len(), 2);
        assert!(history[0].as_str().unwrap().ends_with("[user]: Book Tuesday"));

        let response = app.oneshot(get("/api/history/search?q=tuesday")).await.unwrap();
        assert_eq!(json_body(response).await, json!({ "matches": ["conv-a"] }));
    }

    #[tokio::test]
    async fn test_search_without_term_is_bad_request() {
        let response = app(&MockChatClient::new()).oneshot(get("/api/history/search")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "Missing search term.");
    }

    #[tokio::test]
    async fn test_api_key_guards_everything_but_health() {
        let app = app_with(&MockChatClient::new(), &MockCalendar::new(), Some("s3cret"), 1000);

        let response = app.clone().oneshot(get("/api/endpoints")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let mut request = get("/api/endpoints");
        request.headers_mut().insert("x-api-key", "s3cret".parse().unwrap());
        assert_eq!(app.clone().oneshot(request).await.unwrap().status(), StatusCode::OK);

        let response = app.clone().oneshot(get("/api/endpoints?api_key=s3cret")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(get("/api/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_rate_limit_rejects_burst() {
        let app = app_with(&MockChatClient::new(), &MockCalendar::new(), None, 1);

        assert_eq!(app.clone().oneshot(get("/api/health")).await.unwrap().status(), StatusCode::OK);
        let response = app.oneshot(get("/api/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_request_code_requires_email() {
        let calendar = MockCalendar::new();
        let app = app_with(&MockChatClient::new(), &calendar, None, 1000);

        let response = app
            .clone()
            .oneshot(post_json("/api/cal/request-verification-code", json!({ "email": "" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "Missing or invalid email");

        let response = app
            .oneshot(post_json("/api/cal/request-verification-code", json!({ "email": "ann@example.com" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(calendar.calls(), vec!["request_verification_code".to_string()]);
    }

    #[tokio::test]
    async fn test_provider_failure_on_verification_is_bad_gateway() {
        let calendar = MockCalendar::new();
        calendar.fail_on("request_verification_code", 500);
        let app = app_with(&MockChatClient::new(), &calendar, None, 1000);

        let response = app
            .oneshot(post_json("/api/cal/request-verification-code", json!({ "email": "ann@example.com" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_verified_email_unlocks_scheduled_events() {
        let calendar = MockCalendar::new().with_events(
            vec![event("1", "Standup", "2025-03-01T15:00:00Z", "2025-03-01T15:30:00Z")]
        );
        let app = app_with(&MockChatClient::new(), &calendar, None, 1000);

        let response = app.clone().oneshot(get("/api/cal/scheduled-events")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error"], "Not verified or missing email in session");

        let rejected = app
            .clone()
            .oneshot(
                post_json("/api/cal/verify-email-code", json!({ "email": "ann@example.com", "code": "000000" }))
            )
            .await
            .unwrap();
        assert_eq!(rejected.status(), StatusCode::OK);
        assert!(rejected.headers().get(header::SET_COOKIE).is_none());

        let accepted = app
            .clone()
            .oneshot(
                post_json("/api/cal/verify-email-code", json!({ "email": "ann@example.com", "code": "123456" }))
            )
            .await
            .unwrap();
        let cookie = accepted.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap().to_string();
        assert!(cookie.starts_with("verified_email=ann@example.com;"));
        assert!(cookie.contains("Max-Age=3600"));
        assert!(cookie.contains("HttpOnly"));

        let mut request = get("/api/cal/scheduled-events");
        request.headers_mut().insert(header::COOKIE, "theme=dark; verified_email=ann@example.com".parse().unwrap());
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["bookings"][0]["title"], "Standup");
        assert_eq!(
            *calendar.event_filters.lock().unwrap(),
            vec![Some("ann@example.com".to_string())]
        );
    }
}
