use serde::{ de::{ self, DeserializeOwned }, Deserialize, Deserializer, Serialize };

use super::FunctionName;
use crate::error::{ AgentError, Result };
use crate::models::calendar::string_or_number;

/// A function invocation as emitted by the model: a registry name plus raw JSON arguments.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

impl FunctionCall {
    pub fn new(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self { name: name.into(), arguments: arguments.into() }
    }
}

/// Which event type a booking should use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum EventTypeSelector {
    Id(i64),
    #[default]
    Random,
}

impl<'de> Deserialize<'de> for EventTypeSelector {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
        where D: Deserializer<'de>
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(i64),
            Text(String),
            Null(()),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(0) | Raw::Null(()) => Ok(EventTypeSelector::Random),
            Raw::Number(id) => Ok(EventTypeSelector::Id(id)),
            Raw::Text(text) => {
                let text = text.trim();
                if text.is_empty() || text.to_lowercase().contains("random") {
                    return Ok(EventTypeSelector::Random);
                }
                match text.parse::<i64>() {
                    Ok(0) => Ok(EventTypeSelector::Random),
                    Ok(id) => Ok(EventTypeSelector::Id(id)),
                    Err(_) => Err(de::Error::custom(format!("invalid eventTypeId '{}'", text))),
                }
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookMeetingArgs {
    #[serde(default)]
    pub event_type_id: EventTypeSelector,
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Default, Deserialize)]
pub struct ListEventsArgs {
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelEventArgs {
    #[serde(default, deserialize_with = "optional_id")]
    pub event_id: Option<String>,
    #[serde(default)]
    pub time_text: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleEventArgs {
    #[serde(deserialize_with = "string_or_number")]
    pub event_id: String,
    pub new_start_time: String,
    pub new_end_time: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckAvailabilityArgs {
    pub event_type_id: i64,
    pub start_date: String,
    pub end_date: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventTypeArgs {
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    pub length: i64,
    #[serde(default = "default_length_unit")]
    pub length_unit: String,
}

fn default_length_unit() -> String {
    "minutes".to_string()
}

fn optional_id<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
    where D: Deserializer<'de>
{
    #[derive(Deserialize)]
    struct Wrapper(#[serde(deserialize_with = "string_or_number")] String);

    Ok(Option::<Wrapper>::deserialize(deserializer)?.map(|Wrapper(id)| id))
}

/// A validated function call, one variant per registry entry.
#[derive(Clone, Debug, PartialEq)]
pub enum CalendarFunction {
    BookMeeting(BookMeetingArgs),
    ListEvents(ListEventsArgs),
    CancelEvent(CancelEventArgs),
    RescheduleEvent(RescheduleEventArgs),
    CheckAvailability(CheckAvailabilityArgs),
    CreateEventType(CreateEventTypeArgs),
    ListEventTypes,
}

impl CalendarFunction {
    pub fn parse(call: &FunctionCall) -> Result<Self> {
        let name: FunctionName = call.name.parse()?;
        let raw = call.arguments.trim();
        let raw = if raw.is_empty() { "{}" } else { raw };

        Ok(match name {
            FunctionName::BookMeeting => CalendarFunction::BookMeeting(parse_args(name, raw)?),
            FunctionName::ListEvents => CalendarFunction::ListEvents(parse_args(name, raw)?),
            FunctionName::CancelEvent => CalendarFunction::CancelEvent(parse_args(name, raw)?),
            FunctionName::RescheduleEvent =>
                CalendarFunction::RescheduleEvent(parse_args(name, raw)?),
            FunctionName::CheckAvailability =>
                CalendarFunction::CheckAvailability(parse_args(name, raw)?),
            FunctionName::CreateEventType =>
                CalendarFunction::CreateEventType(parse_args(name, raw)?),
            FunctionName::ListEventTypes => {
                let _: serde_json::Value = parse_args(name, raw)?;
                CalendarFunction::ListEventTypes
            }
        })
    }

    pub fn name(&self) -> FunctionName {
        match self {
            CalendarFunction::BookMeeting(_) => FunctionName::BookMeeting,
            CalendarFunction::ListEvents(_) => FunctionName::ListEvents,
            CalendarFunction::CancelEvent(_) => FunctionName::CancelEvent,
            CalendarFunction::RescheduleEvent(_) => FunctionName::RescheduleEvent,
            CalendarFunction::CheckAvailability(_) => FunctionName::CheckAvailability,
            CalendarFunction::CreateEventType(_) => FunctionName::CreateEventType,
            CalendarFunction::ListEventTypes => FunctionName::ListEventTypes,
        }
    }
}

fn parse_args<T: DeserializeOwned>(name: FunctionName, raw: &str) -> Result<T> {
    serde_json
        ::from_str(raw)
        .map_err(|e| AgentError::Argument(format!("failed to parse {} parameters: {}", name, e)))
}
