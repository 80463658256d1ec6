use async_trait::async_trait;
use chrono::{ DateTime, Utc };
use serde_json::{ json, Value };
use std::collections::BTreeMap;
use std::sync::{ Arc, Mutex };

use crate::calendar::CalendarApi;
use crate::error::{ AgentError, Result };
use crate::models::calendar::{ BookingRequest, Event, EventType, EventTypeCreateRequest };

/// In-memory provider that records every call it receives.
#[derive(Clone, Default)]
pub struct MockCalendar {
    pub events: Arc<Mutex<Vec<Event>>>,
    pub event_types: Arc<Mutex<Vec<EventType>>>,
    pub slots: Arc<Mutex<Vec<DateTime<Utc>>>>,
    pub calls: Arc<Mutex<Vec<String>>>,
    pub bookings: Arc<Mutex<Vec<BookingRequest>>>,
    pub cancelled: Arc<Mutex<Vec<String>>>,
    pub slot_queries: Arc<Mutex<Vec<(i64, DateTime<Utc>, DateTime<Utc>)>>>,
    pub event_filters: Arc<Mutex<Vec<Option<String>>>>,
    failing: Arc<Mutex<Option<(String, u16)>>>,
}

pub fn event(id: &str, title: &str, start: &str, end: &str) -> Event {
    Event {
        id: id.to_string(),
        title: title.to_string(),
        description: None,
        start_time: start.parse().unwrap(),
        end_time: end.parse().unwrap(),
        status: "ACCEPTED".to_string(),
        location: None,
    }
}

pub fn event_type(id: i64, title: &str, slug: &str) -> EventType {
    EventType {
        id,
        title: title.to_string(),
        description: String::new(),
        slug: slug.to_string(),
        length: 30,
        length_unit: "minutes".to_string(),
    }
}

impl MockCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(self, events: Vec<Event>) -> Self {
        *self.events.lock().unwrap() = events;
        self
    }

    pub fn with_event_types(self, types: Vec<EventType>) -> Self {
        *self.event_types.lock().unwrap() = types;
        self
    }

    /// Makes the named operation answer with a provider error.
    pub fn fail_on(&self, operation: &str, status: u16) {
        *self.failing.lock().unwrap() = Some((operation.to_string(), status));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, operation: &str) -> Result<()> {
        self.calls.lock().unwrap().push(operation.to_string());
        match &*self.failing.lock().unwrap() {
            Some((op, status)) if op == operation =>
                Err(AgentError::Provider { status: *status, body: "mock failure".to_string() }),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl CalendarApi for MockCalendar {
    async fn get_events(&self, email: Option<&str>) -> Result<Vec<Event>> {
        self.record("get_events")?;
        self.event_filters.lock().unwrap().push(email.map(str::to_string));
        Ok(self.events.lock().unwrap().clone())
    }

    async fn get_available_slots(
        &self,
        event_type_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>
    ) -> Result<Vec<DateTime<Utc>>> {
        self.record("get_available_slots")?;
        self.slot_queries.lock().unwrap().push((event_type_id, start, end));
        Ok(self.slots.lock().unwrap().clone())
    }

    async fn book_event(&self, booking: &BookingRequest) -> Result<Event> {
        self.record("book_event")?;
        self.bookings.lock().unwrap().push(booking.clone());
        Ok(Event {
            id: "booking-1".to_string(),
            title: booking.title.clone().unwrap_or_default(),
            description: booking.notes.clone(),
            start_time: booking.start,
            end_time: booking.end,
            status: "ACCEPTED".to_string(),
            location: booking.location.clone(),
        })
    }

    async fn cancel_event(&self, event_id: &str) -> Result<()> {
        self.record("cancel_event")?;
        self.cancelled.lock().unwrap().push(event_id.to_string());
        Ok(())
    }

    async fn reschedule_event(
        &self,
        event_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>
    ) -> Result<Event> {
        self.record("reschedule_event")?;
        Ok(Event {
            id: event_id.to_string(),
            title: "Rescheduled".to_string(),
            description: None,
            start_time: start,
            end_time: end,
            status: "ACCEPTED".to_string(),
            location: None,
        })
    }

    async fn create_event_type(&self, request: &EventTypeCreateRequest) -> Result<Value> {
        self.record("create_event_type")?;
        Ok(json!({ "event_type": { "id": 99, "slug": request.slug } }))
    }

    async fn get_event_types(&self) -> Result<Vec<EventType>> {
        self.record("get_event_types")?;
        Ok(self.event_types.lock().unwrap().clone())
    }

    async fn list_schedules(&self) -> Result<Vec<Value>> {
        self.record("list_schedules")?;
        Ok(Vec::new())
    }

    async fn create_schedule(&self, name: &str, time_zone: &str) -> Result<Value> {
        self.record("create_schedule")?;
        Ok(json!({ "name": name, "timeZone": time_zone }))
    }

    async fn edit_schedule(&self, schedule_id: &str, updates: &Value) -> Result<Value> {
        self.record("edit_schedule")?;
        Ok(json!({ "id": schedule_id, "updates": updates }))
    }

    async fn remove_schedule(&self, _schedule_id: &str) -> Result<()> {
        self.record("remove_schedule")
    }

    async fn get_bookable_slots(
        &self,
        _start: &str,
        _end: &str
    ) -> Result<BTreeMap<String, Vec<Value>>> {
        self.record("get_bookable_slots")?;
        Ok(BTreeMap::new())
    }

    async fn find_booking(&self, booking_id: &str) -> Result<Value> {
        self.record("find_booking")?;
        Ok(json!({ "id": booking_id }))
    }

    async fn edit_booking(&self, booking_id: &str, updates: &Value) -> Result<Value> {
        self.record("edit_booking")?;
        Ok(json!({ "id": booking_id, "updates": updates }))
    }

    async fn request_verification_code(&self, email: &str) -> Result<Value> {
        self.record("request_verification_code")?;
        Ok(json!({ "status": "success", "email": email }))
    }

    async fn verify_email_code(&self, email: &str, code: &str) -> Result<Value> {
        self.record("verify_email_code")?;
        let status = if code == "123456" { "success" } else { "error" };
        Ok(json!({ "status": status, "email": email }))
    }
}
