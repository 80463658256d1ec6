use chrono::{ DateTime, Duration, NaiveDate, Timelike, Utc };
use log::{ error, info };
use rand::seq::SliceRandom;
use serde_json::{ json, Value };
use std::sync::Arc;

use super::call::{
    BookMeetingArgs,
    CalendarFunction,
    CancelEventArgs,
    CheckAvailabilityArgs,
    CreateEventTypeArgs,
    EventTypeSelector,
    FunctionCall,
    ListEventsArgs,
    RescheduleEventArgs,
};
use super::time_of_day::parse_time_of_day;
use crate::calendar::CalendarApi;
use crate::error::{ AgentError, Result };
use crate::models::calendar::{ BookingRequest, Event, EventType, EventTypeCreateRequest };

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

const DEFAULT_TITLE: &str = "Cal.com Meeting";

/// Result of a successfully executed function, ready to be shown to the model or the user.
#[derive(Clone, Debug, PartialEq)]
pub enum FunctionOutput {
    Booked(Event),
    Events(Vec<Event>),
    Cancelled {
        event_id: String,
        /// Set when the event was located by its start time.
        matched: Option<(String, String)>,
    },
    Availability(Vec<DateTime<Utc>>),
    Rescheduled(Event),
    EventTypeCreated(Value),
    EventTypes(Vec<EventType>),
}

impl FunctionOutput {
    pub fn render(&self) -> String {
        match self {
            FunctionOutput::Booked(event) | FunctionOutput::Rescheduled(event) => to_json(event),
            FunctionOutput::Events(events) => {
                if events.is_empty() {
                    return "You have no scheduled events.".to_string();
                }
                let mut out = String::from("Here are your scheduled events:\n");
                for event in events {
                    out.push_str(
                        &format!(
                            "- {}: {} to {}\n  {}\n",
                            event.title,
                            event.start_time.format("%Y-%m-%d %H:%M"),
                            event.end_time.format("%H:%M"),
                            event.description.as_deref().unwrap_or("")
                        )
                    );
                }
                out
            }
            FunctionOutput::Cancelled { matched: Some((title, at)), .. } =>
                format!("Event '{}' at {} has been canceled.", title, at),
            FunctionOutput::Cancelled { matched: None, .. } => json!({ "success": true }).to_string(),
            FunctionOutput::Availability(slots) => json!({ "availableSlots": slots }).to_string(),
            FunctionOutput::EventTypeCreated(value) => value.to_string(),
            FunctionOutput::EventTypes(types) => {
                if types.is_empty() {
                    return "You have no event types set up.".to_string();
                }
                let mut out = String::from("Here are your available event types:\n");
                for et in types {
                    out.push_str(
                        &format!(
                            "- {} ({}): {} [{} {}]\n",
                            et.title,
                            et.slug,
                            et.description,
                            et.length,
                            et.length_unit
                        )
                    );
                }
                out
            }
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| format!("{{\"error\":\"{}\"}}", e))
}

/// Turns validated function calls into calendar provider requests.
#[derive(Clone)]
pub struct Dispatcher {
    calendar: Arc<dyn CalendarApi>,
    clock: Clock,
}

impl Dispatcher {
    pub fn new(calendar: Arc<dyn CalendarApi>) -> Self {
        Self::with_clock(calendar, Arc::new(Utc::now))
    }

    /// Same as `new`, with "now" supplied by the caller.
    pub fn with_clock(calendar: Arc<dyn CalendarApi>, clock: Clock) -> Self {
        Self { calendar, clock }
    }

    pub fn calendar(&self) -> Arc<dyn CalendarApi> {
        Arc::clone(&self.calendar)
    }

    pub async fn dispatch(&self, call: &FunctionCall) -> Result<FunctionOutput> {
        info!("Function call received: {} {}", call.name, call.arguments);
        let function = CalendarFunction::parse(call).map_err(|e| {
            error!("Rejected function call '{}': {}", call.name, e);
            e
        })?;
        self.execute(function).await
    }

    pub async fn execute(&self, function: CalendarFunction) -> Result<FunctionOutput> {
        let name = function.name();
        let result = match function {
            CalendarFunction::BookMeeting(args) => self.book_meeting(args).await,
            CalendarFunction::ListEvents(args) => self.list_events(args).await,
            CalendarFunction::CancelEvent(args) => self.cancel_event(args).await,
            CalendarFunction::RescheduleEvent(args) => self.reschedule_event(args).await,
            CalendarFunction::CheckAvailability(args) => self.check_availability(args).await,
            CalendarFunction::CreateEventType(args) => self.create_event_type(args).await,
            CalendarFunction::ListEventTypes => self.list_event_types().await,
        };

        match &result {
            Ok(_) => info!("✅ {} completed", name),
            Err(e) => error!("{} failed: {}", name, e),
        }
        result
    }

    async fn book_meeting(&self, args: BookMeetingArgs) -> Result<FunctionOutput> {
        let email = if is_placeholder_email(&args.email) {
            let generated = format!("randomuser+{}@example.com", (self.clock)().timestamp());
            info!("bookMeeting: substituted placeholder email with {}", generated);
            generated
        } else {
            args.email.trim().to_string()
        };

        let start = parse_timestamp(&args.start_time, "start time")?;
        let end = parse_timestamp(&args.end_time, "end time")?;
        if end <= start {
            return Err(AgentError::Argument("endTime must be after startTime".to_string()));
        }

        let event_type_id = match args.event_type_id {
            EventTypeSelector::Id(id) => id,
            EventTypeSelector::Random => self.random_event_type().await?,
        };

        let existing = self.calendar
            .get_events(Some(&email)).await
            .map_err(|e| e.during("check existing events"))?;
        if let Some(clash) = existing.iter().find(|event| event.conflicts_with(start, end)) {
            return Err(AgentError::Conflict {
                title: clash.title.clone(),
                start: clash.start_time.format("%Y-%m-%d %H:%M").to_string(),
                end: clash.end_time.format("%H:%M").to_string(),
            });
        }

        let title = args.title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| {
                if args.name.trim().is_empty() {
                    DEFAULT_TITLE.to_string()
                } else {
                    format!("Meeting with {}", args.name)
                }
            });

        let booking = BookingRequest {
            event_type_id,
            start,
            end,
            name: args.name,
            email,
            notes: args.notes,
            location: args.location,
            title: Some(title),
        };
        info!(
            "bookMeeting: booking event type {} for {} from {} to {}",
            booking.event_type_id,
            booking.email,
            booking.start,
            booking.end
        );
        let event = self.calendar.book_event(&booking).await.map_err(|e| e.during("book event"))?;
        Ok(FunctionOutput::Booked(event))
    }

    /// Uniform pick over the configured event types. Not cryptographic.
    async fn random_event_type(&self) -> Result<i64> {
        let types = self.calendar
            .get_event_types().await
            .map_err(|e| e.during("fetch event types"))?;
        let chosen = types.choose(&mut rand::thread_rng()).ok_or(AgentError::NoEventTypes)?;
        info!("bookMeeting: selected random event type {}", chosen.id);
        Ok(chosen.id)
    }

    async fn list_events(&self, args: ListEventsArgs) -> Result<FunctionOutput> {
        let email = args.email.as_deref().map(str::trim).filter(|e| !e.is_empty());
        let events = self.calendar.get_events(email).await.map_err(|e| e.during("list events"))?;
        Ok(FunctionOutput::Events(events))
    }

    async fn cancel_event(&self, args: CancelEventArgs) -> Result<FunctionOutput> {
        if let Some(event_id) = args.event_id.filter(|id| !id.trim().is_empty()) {
            self.calendar.cancel_event(&event_id).await.map_err(|e| e.during("cancel event"))?;
            return Ok(FunctionOutput::Cancelled { event_id, matched: None });
        }

        let text = match args.time_text.filter(|t| !t.trim().is_empty()) {
            Some(text) => text,
            None => {
                return Err(
                    AgentError::NotFound(
                        "Please specify the event ID or the time of the event you want to cancel.".to_string()
                    )
                );
            }
        };
        let wanted = parse_time_of_day(&text).ok_or_else(||
            AgentError::NotFound("Could not parse time from your request.".to_string())
        )?;
        let at = format!("{:02}:{:02}", wanted.hour, wanted.minute);

        let today = (self.clock)().date_naive();
        let events = self.calendar.get_events(None).await.map_err(|e| e.during("list events"))?;
        let target = events
            .into_iter()
            .find(|event| {
                event.start_time.date_naive() == today &&
                    event.start_time.hour() == wanted.hour &&
                    event.start_time.minute() == wanted.minute
            })
            .ok_or_else(|| AgentError::NotFound(format!("I couldn't find an event at {} to cancel.", at)))?;

        self.calendar.cancel_event(&target.id).await.map_err(|e| e.during("cancel event"))?;
        Ok(FunctionOutput::Cancelled { event_id: target.id, matched: Some((target.title, at)) })
    }

    async fn reschedule_event(&self, args: RescheduleEventArgs) -> Result<FunctionOutput> {
        let start = parse_timestamp(&args.new_start_time, "new start time")?;
        let end = parse_timestamp(&args.new_end_time, "new end time")?;
        let event = self.calendar
            .reschedule_event(&args.event_id, start, end).await
            .map_err(|e| e.during("reschedule event"))?;
        Ok(FunctionOutput::Rescheduled(event))
    }

    async fn check_availability(&self, args: CheckAvailabilityArgs) -> Result<FunctionOutput> {
        let (start, end) = availability_window(&args.start_date, &args.end_date)?;
        info!(
            "checkAvailability: event type {} from {} to {}",
            args.event_type_id,
            args.start_date,
            args.end_date
        );
        let slots = self.calendar
            .get_available_slots(args.event_type_id, start, end).await
            .map_err(|e| e.during("check availability"))?;
        Ok(FunctionOutput::Availability(slots))
    }

    async fn create_event_type(&self, args: CreateEventTypeArgs) -> Result<FunctionOutput> {
        let request = EventTypeCreateRequest {
            title: args.title,
            slug: args.slug,
            description: args.description,
            length: args.length,
            length_unit: args.length_unit,
        };
        let created = self.calendar
            .create_event_type(&request).await
            .map_err(|e| e.during("create event type"))?;
        Ok(FunctionOutput::EventTypeCreated(created))
    }

    async fn list_event_types(&self) -> Result<FunctionOutput> {
        let types = self.calendar
            .get_event_types().await
            .map_err(|e| e.during("fetch event types"))?;
        Ok(FunctionOutput::EventTypes(types))
    }
}

fn is_placeholder_email(email: &str) -> bool {
    let lowered = email.trim().to_lowercase();
    lowered.is_empty() || lowered.contains("random") || lowered.contains("placeholder")
}

fn parse_timestamp(raw: &str, what: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| AgentError::Format(format!("invalid {} '{}': {}", what, raw, e)))
}

fn parse_date(raw: &str, what: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|e|
        AgentError::Format(format!("invalid {} '{}': {}", what, raw, e))
    )
}

/// Query range for a pair of calendar dates: midnight UTC of the start date up to
/// midnight of the day after the end date.
pub fn availability_window(
    start_date: &str,
    end_date: &str
) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let start = parse_date(start_date, "start date")?.and_hms_opt(0, 0, 0);
    let end = parse_date(end_date, "end date")?.and_hms_opt(0, 0, 0);
    match (start, end) {
        (Some(start), Some(end)) => Ok((start.and_utc(), end.and_utc() + Duration::days(1))),
        _ => Err(AgentError::Format(format!("invalid date range {}..{}", start_date, end_date))),
    }
}
