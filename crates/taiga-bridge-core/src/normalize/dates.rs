//! Date handling

use chrono::{DateTime, NaiveDate};
use serde_json::Value;

/// Calendar date of a date or datetime string
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(text) {
        return Some(datetime.date_naive());
    }
    text.get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
}

/// Date-only field with any embedded time component dropped
pub fn date_only(value: Option<&Value>) -> Option<String> {
    let text = value?.as_str()?.trim();
    if text.is_empty() {
        return None;
    }
    match parse_date(text) {
        Some(date) => Some(date.format("%Y-%m-%d").to_string()),
        None => Some(text.to_string()),
    }
}
