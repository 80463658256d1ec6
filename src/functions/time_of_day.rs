use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref CLOCK_TIME: Regex = Regex::new(r"(\d{1,2})(?::(\d{2}))?\s*(am|pm)?").unwrap();
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeOfDay {
    pub hour: u32,
    pub minute: u32,
}

/// Pulls the first `H[:MM][am|pm]` out of free text. Without a meridiem the hour
/// is taken as written.
pub fn parse_time_of_day(text: &str) -> Option<TimeOfDay> {
    let lowered = text.to_lowercase();
    let caps = CLOCK_TIME.captures(&lowered)?;

    let mut hour: u32 = caps.get(1)?.as_str().parse().ok()?;
    let minute: u32 = match caps.get(2) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };

    match caps.get(3).map(|m| m.as_str()) {
        Some("pm") if hour < 12 => hour += 12,
        Some("am") if hour == 12 => hour = 0,
        _ => {}
    }

    if hour > 23 || minute > 59 {
        return None;
    }
    Some(TimeOfDay { hour, minute })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(hour: u32, minute: u32) -> Option<TimeOfDay> {
        Some(TimeOfDay { hour, minute })
    }

    #[test]
    fn meridiem_adjusts_hour() {
        assert_eq!(parse_time_of_day("3pm"), at(15, 0));
        assert_eq!(parse_time_of_day("12am"), at(0, 0));
        assert_eq!(parse_time_of_day("12pm"), at(12, 0));
        assert_eq!(parse_time_of_day("11:45 PM"), at(23, 45));
    }

    #[test]
    fn bare_times_are_left_alone() {
        assert_eq!(parse_time_of_day("9:30"), at(9, 30));
        assert_eq!(parse_time_of_day("14:00"), at(14, 0));
    }

    #[test]
    fn time_is_found_inside_sentences() {
        assert_eq!(parse_time_of_day("cancel my meeting at 4:15pm today"), at(16, 15));
    }

    #[test]
    fn no_time_or_out_of_range() {
        assert_eq!(parse_time_of_day("tomorrow afternoon"), None);
        assert_eq!(parse_time_of_day("25:00"), None);
        assert_eq!(parse_time_of_day("10:75"), None);
    }
}
