pub mod calcom;

use async_trait::async_trait;
use chrono::{ DateTime, Utc };
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::Result;
use crate::models::calendar::{ BookingRequest, Event, EventType, EventTypeCreateRequest };

pub use self::calcom::{ CalComClient, CalComConfig };

/// Operations offered by the scheduling provider. One call, one request: no
/// caching, no retries.
#[async_trait]
pub trait CalendarApi: Send + Sync {
    async fn get_events(&self, email: Option<&str>) -> Result<Vec<Event>>;

    async fn get_available_slots(
        &self,
        event_type_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>
    ) -> Result<Vec<DateTime<Utc>>>;

    async fn book_event(&self, booking: &BookingRequest) -> Result<Event>;

    async fn cancel_event(&self, event_id: &str) -> Result<()>;

    async fn reschedule_event(
        &self,
        event_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>
    ) -> Result<Event>;

    async fn create_event_type(&self, request: &EventTypeCreateRequest) -> Result<Value>;

    async fn get_event_types(&self) -> Result<Vec<EventType>>;

    async fn list_schedules(&self) -> Result<Vec<Value>>;

    async fn create_schedule(&self, name: &str, time_zone: &str) -> Result<Value>;

    async fn edit_schedule(&self, schedule_id: &str, updates: &Value) -> Result<Value>;

    async fn remove_schedule(&self, schedule_id: &str) -> Result<()>;

    /// Bookable slots between two provider-formatted datetimes, keyed by day.
    async fn get_bookable_slots(
        &self,
        start: &str,
        end: &str
    ) -> Result<BTreeMap<String, Vec<Value>>>;

    async fn find_booking(&self, booking_id: &str) -> Result<Value>;

    async fn edit_booking(&self, booking_id: &str, updates: &Value) -> Result<Value>;

    async fn request_verification_code(&self, email: &str) -> Result<Value>;

    async fn verify_email_code(&self, email: &str, code: &str) -> Result<Value>;
}
