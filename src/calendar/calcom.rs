use async_trait::async_trait;
use chrono::{ DateTime, SecondsFormat, Utc };
use log::debug;
use reqwest::{ Client as HttpClient, Method, RequestBuilder, header::{ HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE } };
use serde::{ de::DeserializeOwned, Deserialize, Serialize };
use serde_json::{ json, Value };
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::time::Duration;

use super::CalendarApi;
use crate::cli::Args;
use crate::error::{ AgentError, Result };
use crate::models::calendar::{ BookingRequest, Event, EventType, EventTypeCreateRequest };

const VERIFICATION_REQUEST_PATH: &str = "/v2/verified-resources/emails/verification-code/request";
const VERIFICATION_VERIFY_PATH: &str = "/v2/verified-resources/emails/verification-code/verify";

#[derive(Debug, Clone)]
pub struct CalComConfig {
    pub api_key: String,
    pub base_url: String,
    pub username: String,
    pub verification_base_url: String,
    pub timeout: Duration,
}

impl CalComConfig {
    pub fn from_args(args: &Args) -> Self {
        Self {
            api_key: args.calcom_api_key.clone(),
            base_url: args.calcom_api_url.clone(),
            username: args.calcom_username.clone(),
            verification_base_url: args.calcom_verification_url.clone(),
            timeout: Duration::from_secs(args.calcom_timeout_secs),
        }
    }
}

/// REST client for Cal.com. Credentials travel both as a bearer header and as the
/// `apiKey` query parameter, since deployments differ in which one they read.
pub struct CalComClient {
    http: HttpClient,
    api_key: String,
    base_url: String,
    username: String,
    verification_base_url: String,
}

#[derive(Deserialize)]
struct BookingsResponse {
    #[serde(default)]
    bookings: Vec<Event>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BookingResponse {
    Wrapped {
        booking: Event,
    },
    Bare(Event),
}

impl BookingResponse {
    fn into_event(self) -> Event {
        match self {
            BookingResponse::Wrapped { booking } => booking,
            BookingResponse::Bare(event) => event,
        }
    }
}

#[derive(Deserialize)]
struct AvailabilityResponse {
    #[serde(default)]
    available: Vec<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct EventTypesResponse {
    #[serde(default, rename = "eventTypes", alias = "event_types")]
    event_types: Vec<EventType>,
}

#[derive(Deserialize)]
struct SchedulesResponse {
    #[serde(default)]
    schedules: Vec<Value>,
}

#[derive(Deserialize)]
struct SlotsResponse {
    #[serde(default)]
    slots: BTreeMap<String, Vec<Value>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TimeRange {
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
}

impl CalComClient {
    pub fn new(config: CalComConfig) -> std::result::Result<Self, Box<dyn StdError + Send + Sync>> {
        if config.api_key.trim().is_empty() {
            return Err("CALCOM_API_KEY is not set".into());
        }
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", config.api_key))
                .map_err(|e| format!("Invalid Cal.com API key format: {}", e))?
        );

        let http = HttpClient::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            http,
            api_key: config.api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            username: config.username,
            verification_base_url: config.verification_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn v1(&self, method: Method, path: &str) -> RequestBuilder {
        debug!("Cal.com request: {} {}", method, path);
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .query(&[("apiKey", self.api_key.as_str())])
    }

    fn v2(&self, method: Method, path: &str) -> RequestBuilder {
        debug!("Cal.com v2 request: {} {}", method, path);
        self.http.request(method, format!("{}{}", self.verification_base_url, path))
    }

    async fn execute(request: RequestBuilder) -> Result<String> {
        let resp = request.send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        debug!("Cal.com response status: {}", status);
        if !status.is_success() {
            return Err(AgentError::Provider { status: status.as_u16(), body });
        }
        Ok(body)
    }

    async fn fetch<T: DeserializeOwned>(request: RequestBuilder, what: &str) -> Result<T> {
        let body = Self::execute(request).await?;
        serde_json
            ::from_str(&body)
            .map_err(|e| AgentError::Decode(format!("{}: {}", what, e)))
    }
}

/// Identifiers end up in URL paths, so anything beyond a plain token is refused.
fn path_segment(id: &str) -> Result<&str> {
    let id = id.trim();
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(AgentError::Argument(format!("invalid identifier '{}'", id)));
    }
    Ok(id)
}

fn rfc3339(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub(crate) fn booking_payload(booking: &BookingRequest) -> Value {
    json!({
        "eventTypeId": booking.event_type_id,
        "start": rfc3339(&booking.start),
        "end": rfc3339(&booking.end),
        "responses": {
            "name": booking.name,
            "email": booking.email,
            "location": {
                "value": booking.location.clone().unwrap_or_default(),
                "optionValue": "",
            },
        },
        "timeZone": "UTC",
        "language": "en",
        "title": booking.title.clone().unwrap_or_default(),
        "description": booking.notes.clone().unwrap_or_default(),
        "status": "PENDING",
        "metadata": {},
    })
}

#[async_trait]
impl CalendarApi for CalComClient {
    async fn get_events(&self, email: Option<&str>) -> Result<Vec<Event>> {
        let mut request = self.v1(Method::GET, "/bookings");
        if let Some(email) = email.filter(|e| !e.is_empty()) {
            request = request.query(&[("email", email)]);
        }
        let resp: BookingsResponse = Self::fetch(request, "events").await?;
        Ok(resp.bookings)
    }

    async fn get_available_slots(
        &self,
        event_type_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>
    ) -> Result<Vec<DateTime<Utc>>> {
        let path = format!("/availability/{}/{}", self.username, event_type_id);
        let range = TimeRange { start_time: start, end_time: end };
        let resp: AvailabilityResponse = Self::fetch(
            self.v1(Method::POST, &path).json(&range),
            "available slots"
        ).await?;
        Ok(resp.available)
    }

    async fn book_event(&self, booking: &BookingRequest) -> Result<Event> {
        let resp: BookingResponse = Self::fetch(
            self.v1(Method::POST, "/bookings").json(&booking_payload(booking)),
            "booking response"
        ).await?;
        Ok(resp.into_event())
    }

    async fn cancel_event(&self, event_id: &str) -> Result<()> {
        let path = format!("/bookings/{}/cancel", path_segment(event_id)?);
        Self::execute(self.v1(Method::POST, &path)).await?;
        Ok(())
    }

    async fn reschedule_event(
        &self,
        event_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>
    ) -> Result<Event> {
        let path = format!("/bookings/{}/reschedule", path_segment(event_id)?);
        let body = json!({ "start": rfc3339(&start), "end": rfc3339(&end) });
        let resp: BookingResponse = Self::fetch(
            self.v1(Method::POST, &path).json(&body),
            "rescheduled booking"
        ).await?;
        Ok(resp.into_event())
    }

    async fn create_event_type(&self, request: &EventTypeCreateRequest) -> Result<Value> {
        Self::fetch(
            self.v1(Method::POST, "/event-types").json(request),
            "event type creation response"
        ).await
    }

    async fn get_event_types(&self) -> Result<Vec<EventType>> {
        let resp: EventTypesResponse = Self::fetch(
            self.v1(Method::GET, "/event-types"),
            "event types"
        ).await?;
        Ok(resp.event_types)
    }

    async fn list_schedules(&self) -> Result<Vec<Value>> {
        let resp: SchedulesResponse = Self::fetch(
            self.v1(Method::GET, "/schedules"),
            "schedules"
        ).await?;
        Ok(resp.schedules)
    }

    async fn create_schedule(&self, name: &str, time_zone: &str) -> Result<Value> {
        let body = json!({ "name": name, "timeZone": time_zone });
        Self::fetch(
            self.v1(Method::POST, "/schedules").json(&body),
            "schedule creation response"
        ).await
    }

    async fn edit_schedule(&self, schedule_id: &str, updates: &Value) -> Result<Value> {
        let path = format!("/schedules/{}", path_segment(schedule_id)?);
        Self::fetch(self.v1(Method::PATCH, &path).json(updates), "schedule edit response").await
    }

    async fn remove_schedule(&self, schedule_id: &str) -> Result<()> {
        let path = format!("/schedules/{}", path_segment(schedule_id)?);
        Self::execute(self.v1(Method::DELETE, &path)).await?;
        Ok(())
    }

    async fn get_bookable_slots(
        &self,
        start: &str,
        end: &str
    ) -> Result<BTreeMap<String, Vec<Value>>> {
        let request = self.v1(Method::GET, "/slots").query(&[("start", start), ("end", end)]);
        let resp: SlotsResponse = Self::fetch(request, "slots").await?;
        Ok(resp.slots)
    }

    async fn find_booking(&self, booking_id: &str) -> Result<Value> {
        let path = format!("/bookings/{}", path_segment(booking_id)?);
        Self::fetch(self.v1(Method::GET, &path), "booking").await
    }

    async fn edit_booking(&self, booking_id: &str, updates: &Value) -> Result<Value> {
        let path = format!("/bookings/{}", path_segment(booking_id)?);
        Self::fetch(self.v1(Method::PATCH, &path).json(updates), "booking edit response").await
    }

    async fn request_verification_code(&self, email: &str) -> Result<Value> {
        Self::fetch(
            self.v2(Method::POST, VERIFICATION_REQUEST_PATH).json(&json!({ "email": email })),
            "verification code response"
        ).await
    }

    async fn verify_email_code(&self, email: &str, code: &str) -> Result<Value> {
        let body = json!({ "email": email, "code": code });
        Self::fetch(
            self.v2(Method::POST, VERIFICATION_VERIFY_PATH).json(&body),
            "verification response"
        ).await
    }
}
