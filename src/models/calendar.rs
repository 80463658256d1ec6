use chrono::{ DateTime, Utc };
use serde::{ Deserialize, Deserializer, Serialize };

/// A scheduled meeting as the calendar provider reports it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl Event {
    /// Half-open interval overlap, plus an exact start match.
    pub fn conflicts_with(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        (start < self.end_time && end > self.start_time) || start == self.start_time
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventType {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub length: i64,
    #[serde(default)]
    pub length_unit: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub event_type_id: i64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTypeCreateRequest {
    pub title: String,
    pub slug: String,
    pub description: String,
    pub length: i64,
    pub length_unit: String,
}

/// Provider identifiers show up as strings on some endpoints and integers on others.
pub fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
    where D: Deserializer<'de>
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(start: &str, end: &str) -> Event {
        Event {
            id: "1".into(),
            title: "Standup".into(),
            description: None,
            start_time: start.parse().unwrap(),
            end_time: end.parse().unwrap(),
            status: "ACCEPTED".into(),
            location: None,
        }
    }

    #[test]
    fn numeric_ids_are_accepted() {
        let json = r#"{"id":42,"title":"Sync","startTime":"2025-01-01T10:00:00Z","endTime":"2025-01-01T10:30:00Z","status":"ACCEPTED"}"#;
        let event: Event = serde_json::from_str(json).unwrap();
        assert_eq!(event.id, "42");
        assert_eq!(event.description, None);
    }

    #[test]
    fn overlap_is_half_open() {
        let existing = event("2025-01-01T10:00:00Z", "2025-01-01T11:00:00Z");
        let at = |s: &str| s.parse::<DateTime<Utc>>().unwrap();

        assert!(existing.conflicts_with(at("2025-01-01T10:30:00Z"), at("2025-01-01T11:30:00Z")));
        assert!(existing.conflicts_with(at("2025-01-01T09:30:00Z"), at("2025-01-01T10:01:00Z")));
        // touching intervals do not overlap
        assert!(!existing.conflicts_with(at("2025-01-01T11:00:00Z"), at("2025-01-01T12:00:00Z")));
        assert!(!existing.conflicts_with(at("2025-01-01T09:00:00Z"), at("2025-01-01T10:00:00Z")));
    }

    #[test]
    fn identical_start_conflicts_even_when_empty() {
        let existing = event("2025-01-01T10:00:00Z", "2025-01-01T10:00:00Z");
        let start: DateTime<Utc> = "2025-01-01T10:00:00Z".parse().unwrap();
        assert!(existing.conflicts_with(start, start));
    }
}
