pub mod call;
pub mod dispatcher;
pub mod time_of_day;

use serde::Serialize;
use serde_json::{ json, Value };
use std::fmt;
use std::str::FromStr;

use crate::error::AgentError;

pub use self::call::{ CalendarFunction, FunctionCall };
pub use self::dispatcher::{ Dispatcher, FunctionOutput };

/// The fixed set of operations the model may call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FunctionName {
    BookMeeting,
    ListEvents,
    CancelEvent,
    RescheduleEvent,
    CheckAvailability,
    CreateEventType,
    ListEventTypes,
}

impl FunctionName {
    pub const ALL: [FunctionName; 7] = [
        FunctionName::BookMeeting,
        FunctionName::ListEvents,
        FunctionName::CancelEvent,
        FunctionName::RescheduleEvent,
        FunctionName::CheckAvailability,
        FunctionName::CreateEventType,
        FunctionName::ListEventTypes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FunctionName::BookMeeting => "bookMeeting",
            FunctionName::ListEvents => "listEvents",
            FunctionName::CancelEvent => "cancelEvent",
            FunctionName::RescheduleEvent => "rescheduleEvent",
            FunctionName::CheckAvailability => "checkAvailability",
            FunctionName::CreateEventType => "createEventType",
            FunctionName::ListEventTypes => "listEventTypes",
        }
    }
}

impl fmt::Display for FunctionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FunctionName {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FunctionName::ALL
            .iter()
            .copied()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| AgentError::UnknownFunction(s.to_string()))
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct FunctionDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

impl FunctionDefinition {
    pub fn required(&self) -> Vec<&str> {
        self.parameters["required"]
            .as_array()
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

/// Catalog advertised to the model alongside every completion that may call a function.
#[derive(Clone)]
pub struct FunctionRegistry {
    definitions: Vec<FunctionDefinition>,
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FunctionRegistry {
    pub fn new() -> Self {
        let definitions = FunctionName::ALL.iter().map(|name| definition(*name)).collect();
        Self { definitions }
    }

    pub fn definitions(&self) -> &[FunctionDefinition] {
        &self.definitions
    }

    pub fn get(&self, name: FunctionName) -> Option<&FunctionDefinition> {
        self.definitions.iter().find(|d| d.name == name.as_str())
    }
}

fn definition(name: FunctionName) -> FunctionDefinition {
    let (description, parameters) = match name {
        FunctionName::BookMeeting =>
            (
                "Book a new meeting or event in the user's Cal.com calendar.",
                json!({
                    "type": "object",
                    "properties": {
                        "eventTypeId": {
                            "type": "integer",
                            "description": "The ID of the event type to book. Use 0 to pick one at random."
                        },
                        "startTime": {
                            "type": "string",
                            "description": "The start time of the event in RFC3339 format."
                        },
                        "endTime": {
                            "type": "string",
                            "description": "The end time of the event in RFC3339 format."
                        },
                        "name": {
                            "type": "string",
                            "description": "The name of the attendee."
                        },
                        "email": {
                            "type": "string",
                            "description": "The email of the attendee."
                        },
                        "notes": {
                            "type": "string",
                            "description": "Optional notes or description for the event."
                        },
                        "location": {
                            "type": "string",
                            "description": "Optional meeting location."
                        },
                        "title": {
                            "type": "string",
                            "description": "Optional title; defaults to 'Meeting with <name>'."
                        }
                    },
                    "required": ["eventTypeId", "startTime", "endTime", "name", "email"]
                }),
            ),
        FunctionName::ListEvents =>
            (
                "List all scheduled events for a user.",
                json!({
                    "type": "object",
                    "properties": {
                        "email": {
                            "type": "string",
                            "description": "The email address to filter events (optional)."
                        }
                    }
                }),
            ),
        FunctionName::CancelEvent =>
            (
                "Cancel an existing event by its event ID, or by the time it starts today.",
                json!({
                    "type": "object",
                    "properties": {
                        "eventId": {
                            "type": "string",
                            "description": "The ID of the event to cancel."
                        },
                        "timeText": {
                            "type": "string",
                            "description": "Free-text start time of today's event, e.g. '3pm' or '14:30'."
                        }
                    }
                }),
            ),
        FunctionName::RescheduleEvent =>
            (
                "Reschedule an existing event to a new time.",
                json!({
                    "type": "object",
                    "properties": {
                        "eventId": {
                            "type": "string",
                            "description": "The ID of the event to reschedule."
                        },
                        "newStartTime": {
                            "type": "string",
                            "description": "The new start time in RFC3339 format."
                        },
                        "newEndTime": {
                            "type": "string",
                            "description": "The new end time in RFC3339 format."
                        }
                    },
                    "required": ["eventId", "newStartTime", "newEndTime"]
                }),
            ),
        FunctionName::CheckAvailability =>
            (
                "Check available time slots for a specific event type.",
                json!({
                    "type": "object",
                    "properties": {
                        "eventTypeId": {
                            "type": "integer",
                            "description": "The ID of the event type."
                        },
                        "startDate": {
                            "type": "string",
                            "description": "The start date (YYYY-MM-DD)."
                        },
                        "endDate": {
                            "type": "string",
                            "description": "The end date (YYYY-MM-DD), inclusive."
                        }
                    },
                    "required": ["eventTypeId", "startDate", "endDate"]
                }),
            ),
        FunctionName::CreateEventType =>
            (
                "Create a new event type for the user.",
                json!({
                    "type": "object",
                    "properties": {
                        "title": {
                            "type": "string",
                            "description": "The title of the event type."
                        },
                        "slug": {
                            "type": "string",
                            "description": "A unique slug for the event type."
                        },
                        "description": {
                            "type": "string",
                            "description": "A description for the event type."
                        },
                        "length": {
                            "type": "integer",
                            "description": "Length of the event in minutes."
                        },
                        "lengthUnit": {
                            "type": "string",
                            "description": "Unit for the length (should be 'minutes')."
                        }
                    },
                    "required": ["title", "slug", "length", "lengthUnit"]
                }),
            ),
        FunctionName::ListEventTypes =>
            (
                "List all event types available for booking.",
                json!({
                    "type": "object",
                    "properties": {}
                }),
            ),
    };

    FunctionDefinition { name: name.as_str(), description, parameters }
}
